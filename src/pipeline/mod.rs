// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 视频处理流水线 (Video Processing Pipeline)
///
/// 单线程顺序处理, 每帧依次经过:
/// - Detector:  目标检测
/// - Filter:    只保留行人
/// - Tracker:   跟踪, 分配ID
/// - Annotator: 绘制跟踪框和ID
/// - Sink:      写入输出视频
///
/// 下一帧只有在上一帧写出之后才会读取。任何错误立即终止运行。
use std::io::Write;

use image::RgbImage;
use tracing::debug;

use crate::config::PipelineConfig;
use crate::detection::{BBox, ClassFilter, DetectParams, Detector, Tracker};
use crate::error::{Error, Result};
use crate::input::FrameSource;
use crate::output::FrameSink;
use crate::progress::ProgressReporter;
use crate::renderer::Annotator;

/// 主循环状态
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopState {
    Running,
    Done,
}

/// 一次运行的统计
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub frames_read: u64,
    pub frames_written: u64,
    /// 实际绘制的跟踪框总数
    pub tracked_boxes: u64,
}

/// 逐帧处理流水线
pub struct FramePipeline<D, T> {
    detector: D,
    tracker: T,
    filter: ClassFilter,
    annotator: Annotator,
    params: DetectParams,
    state: LoopState,
}

impl<D: Detector, T: Tracker> FramePipeline<D, T> {
    pub fn new(
        detector: D,
        tracker: T,
        filter: ClassFilter,
        annotator: Annotator,
        params: DetectParams,
    ) -> Self {
        Self {
            detector,
            tracker,
            filter,
            annotator,
            params,
            state: LoopState::Running,
        }
    }

    /// 按配置构建 (类别、检测参数、标注样式)
    pub fn from_config(config: &PipelineConfig, detector: D, tracker: T) -> Result<Self> {
        Ok(Self::new(
            detector,
            tracker,
            ClassFilter::new(config.class_id),
            Annotator::new(&config.annotation)?,
            config.detect_params(),
        ))
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn tracker(&self) -> &T {
        &self.tracker
    }

    /// 处理单帧: 检测 → 过滤 → 跟踪 → 原地标注
    ///
    /// 返回实际绘制的跟踪框数量
    pub fn process_frame(&mut self, frame: &mut RgbImage) -> Result<usize> {
        let detections = self.detector.detect(frame, &self.params)?;
        let persons = self.filter.apply(&detections);
        let boxes: Vec<BBox> = persons.iter().map(|d| d.bbox()).collect();
        let tracks = self.tracker.update(&boxes)?;
        let drawn = self.annotator.annotate(frame, &tracks);

        debug!(
            "检测 {} → 行人 {} → 跟踪 {} → 绘制 {}",
            detections.len(),
            persons.len(),
            tracks.len(),
            drawn
        );
        Ok(drawn)
    }

    /// 主循环: 读取直到流结束, 每帧处理后写出并推进进度
    ///
    /// 不会关闭 `sink`, 由调用方负责 `finish()`
    pub fn run<S, K, W>(
        &mut self,
        source: &mut S,
        sink: &mut K,
        progress: &mut ProgressReporter<W>,
    ) -> Result<RunSummary>
    where
        S: FrameSource + ?Sized,
        K: FrameSink + ?Sized,
        W: Write,
    {
        self.state = LoopState::Running;
        let mut summary = RunSummary::default();

        while self.state == LoopState::Running {
            let Some(mut frame) = source.read()? else {
                self.state = LoopState::Done;
                break;
            };
            summary.frames_read += 1;

            summary.tracked_boxes += self.process_frame(&mut frame)? as u64;

            sink.write(&frame)?;
            summary.frames_written += 1;
            progress.tick().map_err(|e| Error::io("<stdout>", e))?;
        }

        progress.finish().map_err(|e| Error::io("<stdout>", e))?;
        debug!("主循环结束: {:?}", summary);
        Ok(summary)
    }
}

/// 处理单个视频文件: 打开输入 → (可选) 统计总帧数 → 主循环 → 关闭输出
#[cfg(feature = "ffmpeg")]
pub fn process_video<D: Detector, T: Tracker>(
    config: &PipelineConfig,
    detector: D,
    tracker: T,
) -> Result<RunSummary> {
    use tracing::{info, warn};

    use crate::input::{count_frames, FfmpegSource};
    use crate::output::FfmpegSink;

    let in_path = config.in_path();
    let out_path = config.out_path();

    std::fs::create_dir_all(&config.output_dir)
        .map_err(|e| Error::io(&config.output_dir, e))?;

    let mut source = FfmpegSource::open(&in_path)?;
    let meta = source.meta();

    let total = if config.verbose {
        match count_frames(&in_path) {
            Ok(n) => Some(n),
            Err(e) => {
                warn!("⚠️ 统计总帧数失败, 进度将不显示总数: {}", e);
                None
            }
        }
    } else {
        None
    };

    let mut sink = FfmpegSink::create(&out_path, meta)?;
    let mut progress = ProgressReporter::stdout(config.verbose, total);
    let mut pipeline = FramePipeline::from_config(config, detector, tracker)?;

    info!("🎬 开始处理 {}", in_path.display());
    let summary = pipeline.run(&mut source, &mut sink, &mut progress)?;
    sink.finish()?;

    info!(
        "✅ {} → {} ({} 帧, {} 个跟踪框)",
        in_path.display(),
        out_path.display(),
        summary.frames_written,
        summary.tracked_boxes
    );
    Ok(summary)
}
