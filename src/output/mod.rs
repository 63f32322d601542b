// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 视频输出系统 (Video Output System)
///
/// - FrameSink:   逐帧写出的统一接口
/// - MemorySink:  内存收集 (测试)
/// - FfmpegSink:  FFmpeg 编码到文件 (feature = "ffmpeg")
use image::RgbImage;

use crate::error::{Error, Result};
use crate::input::VideoMeta;

#[cfg(feature = "ffmpeg")]
pub mod encoder;

#[cfg(feature = "ffmpeg")]
pub use encoder::FfmpegSink;

/// 帧汇: 以源视频的尺寸和帧率追加帧
pub trait FrameSink {
    /// 追加一帧, 尺寸必须与构造时的元数据一致
    fn write(&mut self, frame: &RgbImage) -> Result<()>;

    /// 刷新并关闭输出
    fn finish(&mut self) -> Result<()>;
}

impl<K: FrameSink + ?Sized> FrameSink for &mut K {
    fn write(&mut self, frame: &RgbImage) -> Result<()> {
        (**self).write(frame)
    }

    fn finish(&mut self) -> Result<()> {
        (**self).finish()
    }
}

/// 内存帧汇
#[derive(Clone, Debug)]
pub struct MemorySink {
    meta: VideoMeta,
    frames: Vec<RgbImage>,
    finished: bool,
}

impl MemorySink {
    pub fn new(meta: VideoMeta) -> Self {
        Self {
            meta,
            frames: Vec::new(),
            finished: false,
        }
    }

    pub fn meta(&self) -> VideoMeta {
        self.meta
    }

    pub fn frames(&self) -> &[RgbImage] {
        &self.frames
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn into_frames(self) -> Vec<RgbImage> {
        self.frames
    }
}

impl FrameSink for MemorySink {
    fn write(&mut self, frame: &RgbImage) -> Result<()> {
        if self.finished {
            return Err(Error::Video("输出已关闭".to_string()));
        }
        self.meta.check_frame(frame)?;
        self.frames.push(frame.clone());
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.finished = true;
        Ok(())
    }
}
