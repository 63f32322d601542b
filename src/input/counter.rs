// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 帧计数 (Frame counter)
//!
//! 完整解码一遍输入视频, 只统计帧数, 帧内容直接丢弃。

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use ez_ffmpeg::core::context::null_output::create_null_output;
use ez_ffmpeg::filter::frame_filter::FrameFilter;
use ez_ffmpeg::filter::frame_filter_context::FrameFilterContext;
use ez_ffmpeg::filter::frame_pipeline_builder::FramePipelineBuilder;
use ez_ffmpeg::{AVMediaType, FfmpegContext, Frame};
use tracing::debug;

use crate::error::{Error, Result};

/// 计数过滤器
struct CountFilter {
    count: Arc<AtomicU64>,
}

impl FrameFilter for CountFilter {
    fn media_type(&self) -> AVMediaType {
        AVMediaType::AVMEDIA_TYPE_VIDEO
    }

    fn filter_frame(
        &mut self,
        frame: Frame,
        _ctx: &FrameFilterContext,
    ) -> std::result::Result<Option<Frame>, String> {
        if !frame.is_empty() {
            self.count.fetch_add(1, Ordering::Relaxed);
        }
        Ok(None)
    }
}

/// 解码整个视频并返回帧数
pub fn count_frames(path: &Path) -> Result<u64> {
    std::fs::metadata(path).map_err(|e| Error::io(path, e))?;
    let count = Arc::new(AtomicU64::new(0));

    let pipe: FramePipelineBuilder = AVMediaType::AVMEDIA_TYPE_VIDEO.into();
    let pipe = pipe.filter(
        "count",
        Box::new(CountFilter {
            count: Arc::clone(&count),
        }),
    );
    let out = create_null_output().add_frame_pipeline(pipe);

    let url = path.to_string_lossy().to_string();
    let ctx = FfmpegContext::builder()
        .input(url.as_str())
        .output(out)
        .build()
        .map_err(|e| Error::Video(format!("构建失败: {}", e)))?;
    ctx.start()
        .map_err(|e| Error::Video(format!("启动失败: {}", e)))?
        .wait()
        .map_err(|e| Error::Video(format!("计数解码失败: {}", e)))?;

    let total = count.load(Ordering::Relaxed);
    debug!("{} 共 {} 帧", path.display(), total);
    Ok(total)
}
