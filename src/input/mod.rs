// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 视频输入系统 (Video Input System)
///
/// - FrameSource:   顺序读取解码帧的统一接口
/// - MemorySource:  内存帧序列 (测试/合成视频)
/// - FfmpegSource:  FFmpeg 文件解码器 (feature = "ffmpeg")
/// - count_frames:  仅计数的解码遍历 (feature = "ffmpeg")
use std::collections::VecDeque;

use image::RgbImage;

use crate::error::{Error, Result};

#[cfg(feature = "ffmpeg")]
pub mod counter;
#[cfg(feature = "ffmpeg")]
pub mod decode_filter;
#[cfg(feature = "ffmpeg")]
pub mod decoder;

#[cfg(feature = "ffmpeg")]
pub use counter::count_frames;
#[cfg(feature = "ffmpeg")]
pub use decoder::FfmpegSource;

/// 视频元数据: 尺寸与帧率 (有理数)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VideoMeta {
    pub width: u32,
    pub height: u32,
    pub fps_num: i32,
    pub fps_den: i32,
}

impl VideoMeta {
    pub fn new(width: u32, height: u32, fps_num: i32, fps_den: i32) -> Self {
        Self {
            width,
            height,
            fps_num,
            fps_den,
        }
    }

    pub fn fps(&self) -> f64 {
        if self.fps_den == 0 {
            return 0.0;
        }
        self.fps_num as f64 / self.fps_den as f64
    }

    /// FFmpeg 选项格式的分辨率 "WxH"
    pub fn size_string(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }

    /// FFmpeg 选项格式的帧率 "num/den"
    pub fn rate_string(&self) -> String {
        format!("{}/{}", self.fps_num, self.fps_den)
    }

    /// 检查一帧是否与元数据尺寸一致
    pub fn check_frame(&self, frame: &RgbImage) -> Result<()> {
        if frame.dimensions() != (self.width, self.height) {
            return Err(Error::Video(format!(
                "帧尺寸 {}x{} 与视频尺寸 {} 不一致",
                frame.width(),
                frame.height(),
                self.size_string()
            )));
        }
        Ok(())
    }
}

/// 帧源: 惰性、有限、不可重启的解码帧序列
pub trait FrameSource {
    /// 视频元数据 (打开时读取一次)
    fn meta(&self) -> VideoMeta;

    /// 读取下一帧, `Ok(None)` 表示流结束
    fn read(&mut self) -> Result<Option<RgbImage>>;
}

impl<S: FrameSource + ?Sized> FrameSource for &mut S {
    fn meta(&self) -> VideoMeta {
        (**self).meta()
    }

    fn read(&mut self) -> Result<Option<RgbImage>> {
        (**self).read()
    }
}

/// 内存帧序列
#[derive(Clone, Debug)]
pub struct MemorySource {
    meta: VideoMeta,
    frames: VecDeque<RgbImage>,
}

impl MemorySource {
    /// 所有帧必须与 `meta` 尺寸一致
    pub fn new(meta: VideoMeta, frames: Vec<RgbImage>) -> Result<Self> {
        for frame in &frames {
            meta.check_frame(frame)?;
        }
        Ok(Self {
            meta,
            frames: frames.into(),
        })
    }

    /// 剩余帧数
    pub fn remaining(&self) -> usize {
        self.frames.len()
    }
}

impl FrameSource for MemorySource {
    fn meta(&self) -> VideoMeta {
        self.meta
    }

    fn read(&mut self) -> Result<Option<RgbImage>> {
        Ok(self.frames.pop_front())
    }
}
