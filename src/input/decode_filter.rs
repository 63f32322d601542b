// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// FFmpeg解码过滤器模块
/// FFmpeg decode filter module: RGB24 帧 → RgbImage → 通道
use crossbeam_channel::Sender;
use ez_ffmpeg::filter::frame_filter::FrameFilter;
use ez_ffmpeg::filter::frame_filter_context::FrameFilterContext;
use ez_ffmpeg::{AVMediaType, Frame};
use image::RgbImage;
use tracing::{debug, warn};

/// FFmpeg解码过滤器: 文件 → RGB帧
///
/// 上游滤镜链必须输出 rgb24 (`format=rgb24`)
pub struct DecodeFilter {
    tx: Sender<RgbImage>,
    total_frames: u64,
}

impl DecodeFilter {
    pub fn new(tx: Sender<RgbImage>) -> Self {
        Self { tx, total_frames: 0 }
    }
}

impl FrameFilter for DecodeFilter {
    fn media_type(&self) -> AVMediaType {
        AVMediaType::AVMEDIA_TYPE_VIDEO
    }

    fn init(&mut self, _ctx: &FrameFilterContext) -> Result<(), String> {
        debug!("✅ 解码线程启动");
        Ok(())
    }

    fn filter_frame(
        &mut self,
        frame: Frame,
        _ctx: &FrameFilterContext,
    ) -> Result<Option<Frame>, String> {
        unsafe {
            if frame.as_ptr().is_null() || frame.is_empty() {
                return Ok(None);
            }

            let w = (*frame.as_ptr()).width;
            let h = (*frame.as_ptr()).height;
            let data = (*frame.as_ptr()).data[0];
            let stride = (*frame.as_ptr()).linesize[0];

            if w <= 0 || h <= 0 || data.is_null() {
                return Err(format!("非法帧 #{}: {}x{}", self.total_frames + 1, w, h));
            }
            let (w, h) = (w as usize, h as usize);
            let row_bytes = w * 3;
            if (stride as usize) < row_bytes || stride <= 0 {
                return Err(format!(
                    "帧 #{} 步长异常: stride={} 需要 rgb24 宽度 {}",
                    self.total_frames + 1,
                    stride,
                    row_bytes
                ));
            }

            // 按行拷贝, 去掉行尾填充
            let mut buffer = Vec::with_capacity(row_bytes * h);
            for y in 0..h {
                let row = std::slice::from_raw_parts(data.add(y * stride as usize), row_bytes);
                buffer.extend_from_slice(row);
            }

            let Some(image) = RgbImage::from_raw(w as u32, h as u32, buffer) else {
                return Err("RGB缓冲区尺寸错误".to_string());
            };

            self.total_frames += 1;
            if self.tx.send(image).is_err() {
                // 读取端已关闭 (主循环提前退出)
                warn!("帧通道已关闭, 停止解码");
                return Err("frame receiver closed".to_string());
            }

            Ok(Some(frame))
        }
    }

    fn uninit(&mut self, _ctx: &FrameFilterContext) {
        debug!("✅ 解码线程退出, 共解码 {} 帧", self.total_frames);
    }
}
