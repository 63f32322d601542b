// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 视频文件解码器
/// Video file decoder: FFmpeg 在独立线程解码, 通过有界通道按需交付 RGB 帧
use std::path::Path;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Receiver};
use ez_ffmpeg::core::context::null_output::create_null_output;
use ez_ffmpeg::filter::frame_pipeline_builder::FramePipelineBuilder;
use ez_ffmpeg::stream_info::{find_video_stream_info, StreamInfo};
use ez_ffmpeg::{AVMediaType, FfmpegContext};
use image::RgbImage;
use tracing::info;

use super::decode_filter::DecodeFilter;
use super::{FrameSource, VideoMeta};
use crate::error::{Error, Result};

/// 解码线程领先主循环的最大帧数
const DECODE_QUEUE: usize = 8;

/// 检查输入文件并读取视频流元数据
pub(crate) fn probe(path: &Path) -> Result<VideoMeta> {
    std::fs::metadata(path).map_err(|e| Error::io(path, e))?;
    let url = path.to_string_lossy().to_string();

    let info = find_video_stream_info(url)
        .map_err(|e| Error::Video(format!("{}: {}", path.display(), e)))?;
    match info {
        Some(StreamInfo::Video {
            width,
            height,
            avg_frame_rate,
            ..
        }) if width > 0 && height > 0 => {
            let (num, den) = if avg_frame_rate.num > 0 && avg_frame_rate.den > 0 {
                (avg_frame_rate.num, avg_frame_rate.den)
            } else {
                (25, 1)
            };
            Ok(VideoMeta::new(width as u32, height as u32, num, den))
        }
        _ => Err(Error::Video(format!("{}: 没有可解码的视频流", path.display()))),
    }
}

/// FFmpeg 文件帧源
pub struct FfmpegSource {
    meta: VideoMeta,
    rx: Receiver<RgbImage>,
    worker: Option<JoinHandle<std::result::Result<(), String>>>,
}

impl FfmpegSource {
    /// 打开视频文件: 文件不存在/不可读 → Io, 无视频流 → Video
    pub fn open(path: &Path) -> Result<Self> {
        let meta = probe(path)?;
        let url = path.to_string_lossy().to_string();
        let (tx, rx) = bounded(DECODE_QUEUE);

        let worker = thread::Builder::new()
            .name("decoder".to_string())
            .spawn(move || -> std::result::Result<(), String> {
                let pipe: FramePipelineBuilder = AVMediaType::AVMEDIA_TYPE_VIDEO.into();
                let pipe = pipe.filter("decode", Box::new(DecodeFilter::new(tx)));
                let out = create_null_output().add_frame_pipeline(pipe);

                let ctx = FfmpegContext::builder()
                    .input(url.as_str())
                    .filter_desc("format=rgb24")
                    .output(out)
                    .build()
                    .map_err(|e| format!("构建失败: {}", e))?;
                let sch = ctx.start().map_err(|e| format!("启动失败: {}", e))?;
                sch.wait().map_err(|e| format!("解码失败: {}", e))
            })
            .map_err(|e| Error::io(path, e))?;

        info!(
            "📹 打开视频 {} ({}x{} @ {:.2}fps)",
            path.display(),
            meta.width,
            meta.height,
            meta.fps()
        );
        Ok(Self {
            meta,
            rx,
            worker: Some(worker),
        })
    }

    /// 等待解码线程退出并取回其结果
    fn join_worker(&mut self) -> Result<()> {
        let Some(worker) = self.worker.take() else {
            return Ok(());
        };
        match worker.join() {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(Error::Video(e)),
            Err(_) => Err(Error::Video("解码线程崩溃".to_string())),
        }
    }
}

impl FrameSource for FfmpegSource {
    fn meta(&self) -> VideoMeta {
        self.meta
    }

    fn read(&mut self) -> Result<Option<RgbImage>> {
        match self.rx.recv() {
            Ok(frame) => Ok(Some(frame)),
            // 发送端随解码线程一起释放: 流结束或解码出错
            Err(_) => {
                self.join_worker()?;
                Ok(None)
            }
        }
    }
}
