// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
pub mod config; // 流水线配置 + 命令行参数
pub mod detection; // 检测、类别过滤与跟踪
pub mod error; // 错误类型
pub mod input; // 视频输入 (帧源)
pub mod output; // 视频输出 (帧汇)
pub mod pipeline; // 逐帧处理主循环
pub mod progress; // 进度输出
pub mod renderer; // 跟踪框标注

pub use crate::config::{Args, PipelineConfig};
pub use crate::detection::{
    BBox, ClassFilter, DetectParams, Detection, Detector, IouTracker, TrackedBox, Tracker,
    TrackerConfig,
};
pub use crate::error::{Error, Result};
pub use crate::input::{FrameSource, MemorySource, VideoMeta};
pub use crate::output::{FrameSink, MemorySink};
#[cfg(feature = "ffmpeg")]
pub use crate::pipeline::process_video;
pub use crate::pipeline::{FramePipeline, LoopState, RunSummary};
pub use crate::progress::ProgressReporter;
pub use crate::renderer::{AnnotationStyle, Annotator};
