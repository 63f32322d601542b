/// 检测系统 (Detection System)
///
/// - Detector: 目标检测 (ONNX YOLO)
/// - Filter:   类别过滤 (只保留行人)
/// - Tracker:  目标追踪
pub mod detector;
pub mod filter;
pub mod tracker;
pub mod types;
pub mod yolo;

pub use detector::{DetectParams, Detector};
pub use filter::ClassFilter;
pub use tracker::{compute_iou, IouTracker, Tracker, TrackerConfig};
pub use types::{BBox, Detection, TrackedBox, PERSON_CLASS_ID};
#[cfg(feature = "onnx")]
pub use yolo::YoloDetector;
pub use yolo::{ModelConfig, OutputLayout};
