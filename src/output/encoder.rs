// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 视频文件编码器
/// Video file encoder: 原始 rgb24 帧经通道送入 FFmpeg, 编码为 MPEG-4 Part 2 (DIVX)
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Receiver, Sender};
use ez_ffmpeg::{FfmpegContext, Input, Output};
use image::RgbImage;
use tracing::{debug, info};

use super::FrameSink;
use crate::error::{Error, Result};
use crate::input::VideoMeta;

/// 编码队列长度 (帧)
const ENCODE_QUEUE: usize = 8;

/// 输出视频编码器 ("DIVX" fourcc 对应的编码器)
pub const VIDEO_CODEC: &str = "mpeg4";

/// FFERRTAG('E','O','F',' ')
const AVERROR_EOF: i32 = -0x2046_4F45;

/// 把帧通道适配成 FFmpeg 的读回调
struct RawFrameReader {
    rx: Receiver<Vec<u8>>,
    current: Vec<u8>,
    offset: usize,
}

impl RawFrameReader {
    fn new(rx: Receiver<Vec<u8>>) -> Self {
        Self {
            rx,
            current: Vec::new(),
            offset: 0,
        }
    }

    /// 填充 buf, 返回写入字节数; 通道关闭且数据读完时返回 AVERROR_EOF
    fn read(&mut self, buf: &mut [u8]) -> i32 {
        loop {
            if self.offset < self.current.len() {
                let n = buf.len().min(self.current.len() - self.offset);
                buf[..n].copy_from_slice(&self.current[self.offset..self.offset + n]);
                self.offset += n;
                return n as i32;
            }
            match self.rx.recv() {
                Ok(chunk) => {
                    self.current = chunk;
                    self.offset = 0;
                }
                Err(_) => return AVERROR_EOF,
            }
        }
    }
}

/// FFmpeg 文件帧汇
pub struct FfmpegSink {
    path: PathBuf,
    meta: VideoMeta,
    tx: Option<Sender<Vec<u8>>>,
    worker: Option<JoinHandle<std::result::Result<(), String>>>,
    frames_written: u64,
}

impl FfmpegSink {
    /// 创建/覆盖输出文件, 尺寸和帧率与源视频一致
    pub fn create(path: &Path, meta: VideoMeta) -> Result<Self> {
        // 提前暴露不可写路径
        std::fs::File::create(path).map_err(|e| Error::io(path, e))?;

        let (tx, rx) = bounded::<Vec<u8>>(ENCODE_QUEUE);
        let url = path.to_string_lossy().to_string();
        let size = meta.size_string();
        let rate = meta.rate_string();

        let worker = thread::Builder::new()
            .name("encoder".to_string())
            .spawn(move || -> std::result::Result<(), String> {
                let mut reader = RawFrameReader::new(rx);
                let input = Input::new_by_read_callback(move |buf: &mut [u8]| reader.read(buf))
                    .set_format("rawvideo")
                    .set_input_opts(
                        [
                            ("pixel_format", "rgb24"),
                            ("video_size", size.as_str()),
                            ("framerate", rate.as_str()),
                        ]
                        .into(),
                    );
                let output = Output::from(url.as_str()).set_video_codec(VIDEO_CODEC);

                let ctx = FfmpegContext::builder()
                    .input(input)
                    .output(output)
                    .build()
                    .map_err(|e| format!("构建失败: {}", e))?;
                let sch = ctx.start().map_err(|e| format!("启动失败: {}", e))?;
                sch.wait().map_err(|e| format!("编码失败: {}", e))
            })
            .map_err(|e| Error::io(path, e))?;

        info!(
            "💾 输出视频 {} ({} {} @ {:.2}fps)",
            path.display(),
            VIDEO_CODEC,
            meta.size_string(),
            meta.fps()
        );
        Ok(Self {
            path: path.to_path_buf(),
            meta,
            tx: Some(tx),
            worker: Some(worker),
            frames_written: 0,
        })
    }

    /// 已送入编码器的帧数
    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    fn join_worker(&mut self) -> Result<()> {
        let Some(worker) = self.worker.take() else {
            return Ok(());
        };
        match worker.join() {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(Error::Video(format!("{}: {}", self.path.display(), e))),
            Err(_) => Err(Error::Video("编码线程崩溃".to_string())),
        }
    }
}

impl FrameSink for FfmpegSink {
    fn write(&mut self, frame: &RgbImage) -> Result<()> {
        self.meta.check_frame(frame)?;
        let Some(tx) = &self.tx else {
            return Err(Error::Video("输出已关闭".to_string()));
        };
        if tx.send(frame.as_raw().clone()).is_err() {
            // 编码线程已退出: 取回真实错误
            self.tx = None;
            self.join_worker()?;
            return Err(Error::Video("编码线程提前退出".to_string()));
        }
        self.frames_written += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        // 关闭通道 → 读回调返回 EOF → FFmpeg 写尾并退出
        self.tx = None;
        self.join_worker()?;
        debug!("编码完成: {} 帧", self.frames_written);
        Ok(())
    }
}

impl Drop for FfmpegSink {
    fn drop(&mut self) {
        self.tx = None;
        let _ = self.join_worker();
    }
}
