// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 检测器接口 (Detector)
//! 职责: 单帧图像 → 检测框 (带类别与置信度)

use image::RgbImage;

use super::types::Detection;
use crate::error::Result;

/// 单次检测参数
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DetectParams {
    /// 模型输入尺寸 (正方形边长)
    pub resolution: u32,
    /// 置信度阈值, 低于该值的检测被丢弃
    pub conf_threshold: f32,
    /// NMS IOU阈值
    pub nms_threshold: f32,
}

impl Default for DetectParams {
    fn default() -> Self {
        Self {
            resolution: 416,
            conf_threshold: 0.85,
            nms_threshold: 0.5,
        }
    }
}

/// 目标检测器统一接口
///
/// 模型在主循环开始前加载一次, 之后只读 (不可训练)。
/// 测试中可以用任意实现替换。
pub trait Detector {
    /// 检测一帧, 返回帧像素坐标下的 [x1, y1, x2, y2, class_id, confidence]
    fn detect(&mut self, frame: &RgbImage, params: &DetectParams) -> Result<Vec<Detection>>;
}

impl<D: Detector + ?Sized> Detector for Box<D> {
    fn detect(&mut self, frame: &RgbImage, params: &DetectParams) -> Result<Vec<Detection>> {
        (**self).detect(frame, params)
    }
}

impl<D: Detector + ?Sized> Detector for &mut D {
    fn detect(&mut self, frame: &RgbImage, params: &DetectParams) -> Result<Vec<Detection>> {
        (**self).detect(frame, params)
    }
}
