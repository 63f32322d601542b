// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
// YOLO 检测器 (ONNX Runtime)
// 包含: 模型配置、预处理 (letterbox)、后处理 (解码 + NMS)
//
// 网络本身是黑盒: 这里只负责把帧送进冻结的 ONNX 模型, 再把输出张量解码成检测框。

use std::fs;
use std::path::Path;

use image::{imageops::FilterType, RgbImage};
use ndarray::{Array, Array4, ArrayViewD};
use serde::{Deserialize, Serialize};

use super::detector::DetectParams;
use super::tracker::compute_iou;
use super::types::Detection;
use crate::error::{Error, Result};

/// letterbox 填充色 (与训练时一致的灰色)
const FILL_VALUE: f32 = 144.0 / 255.0;

/// 输出张量布局
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputLayout {
    /// [1, 4 + nc, N]: cx, cy, w, h, 各类别分数 (YOLOv8 风格, 无 objectness)
    Channels,
    /// [1, N, 5 + nc]: cx, cy, w, h, objectness, 各类别分数 (YOLOv3/v5 风格)
    Anchors,
}

/// 模型配置文件 (JSON)
///
/// ```json
/// { "layout": "anchors", "names": ["person", "bicycle", "car"] }
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModelConfig {
    pub layout: OutputLayout,
    /// 类别名称, 为空时从输出张量形状推断类别数
    #[serde(default)]
    pub names: Vec<String>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            layout: OutputLayout::Anchors,
            names: Vec::new(),
        }
    }
}

impl ModelConfig {
    /// 从JSON文件加载模型配置
    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        serde_json::from_str(&json)
            .map_err(|e| Error::ModelLoad(format!("{}: {}", path.display(), e)))
    }

    pub fn num_classes(&self) -> Option<usize> {
        if self.names.is_empty() {
            None
        } else {
            Some(self.names.len())
        }
    }
}

fn scale_wh(w0: f32, h0: f32, w1: f32, h1: f32) -> (f32, f32, f32) {
    let r = (w1 / w0).min(h1 / h0);
    (r, (w0 * r).round(), (h0 * r).round())
}

/// 预处理: 保持宽高比缩放到 size × size (左上角对齐, 其余灰色填充), NCHW, [0,1]
///
/// 返回输入张量和缩放比例 (用于坐标还原)
pub fn letterbox(frame: &RgbImage, size: u32) -> (Array4<f32>, f32) {
    let (w0, h0) = frame.dimensions();
    let (ratio, w_new, h_new) = scale_wh(w0 as f32, h0 as f32, size as f32, size as f32);
    let w_new = (w_new as u32).clamp(1, size);
    let h_new = (h_new as u32).clamp(1, size);
    let resized = image::imageops::resize(frame, w_new, h_new, FilterType::Triangle);

    let mut ys = Array::from_elem((1, 3, size as usize, size as usize), FILL_VALUE);
    for (x, y, rgb) in resized.enumerate_pixels() {
        let x = x as usize;
        let y = y as usize;
        let [r, g, b] = rgb.0;
        ys[[0, 0, y, x]] = (r as f32) / 255.0;
        ys[[0, 1, y, x]] = (g as f32) / 255.0;
        ys[[0, 2, y, x]] = (b as f32) / 255.0;
    }
    (ys, ratio)
}

/// 后处理: 输出张量 → 帧坐标下的检测框 (置信度过滤 + NMS)
pub fn decode_output(
    output: ArrayViewD<f32>,
    config: &ModelConfig,
    ratio: f32,
    frame_size: (u32, u32),
    params: &DetectParams,
) -> Result<Vec<Detection>> {
    let shape = output.shape().to_vec();
    if shape.len() != 3 || shape[0] != 1 {
        return Err(Error::Inference(format!("意外的输出形状 {:?}", shape)));
    }

    // (每个候选的字段数, 候选数量)
    let (fields, anchors) = match config.layout {
        OutputLayout::Channels => (shape[1], shape[2]),
        OutputLayout::Anchors => (shape[2], shape[1]),
    };
    let offset = match config.layout {
        OutputLayout::Channels => 4,
        OutputLayout::Anchors => 5,
    };
    if fields <= offset {
        return Err(Error::Inference(format!(
            "输出形状 {:?} 不足以容纳 {:?} 布局",
            shape, config.layout
        )));
    }
    let nc = config.num_classes().unwrap_or(fields - offset);
    if fields < offset + nc {
        return Err(Error::Inference(format!(
            "输出形状 {:?} 与类别数 {} 不匹配",
            shape, nc
        )));
    }

    let at = |field: usize, anchor: usize| -> f32 {
        match config.layout {
            OutputLayout::Channels => output[[0, field, anchor]],
            OutputLayout::Anchors => output[[0, anchor, field]],
        }
    };

    let (width, height) = (frame_size.0 as f32, frame_size.1 as f32);
    let mut candidates = Vec::new();
    for i in 0..anchors {
        let objectness = match config.layout {
            OutputLayout::Channels => 1.0,
            OutputLayout::Anchors => at(4, i),
        };
        let (class_id, score) = (0..nc)
            .map(|c| (c, at(offset + c, i)))
            .fold((0, f32::MIN), |best, x| if x.1 > best.1 { x } else { best });
        let confidence = objectness * score;
        if confidence < params.conf_threshold {
            continue;
        }

        let cx = at(0, i) / ratio;
        let cy = at(1, i) / ratio;
        let w = at(2, i) / ratio;
        let h = at(3, i) / ratio;
        candidates.push(Detection::new(
            (cx - w / 2.0).clamp(0.0, width),
            (cy - h / 2.0).clamp(0.0, height),
            (cx + w / 2.0).clamp(0.0, width),
            (cy + h / 2.0).clamp(0.0, height),
            class_id as u32,
            confidence,
        ));
    }

    Ok(non_max_suppression(candidates, params.nms_threshold))
}

/// 按类别的贪心 NMS: 置信度降序, 同类别 IOU 超过阈值的框被抑制
pub fn non_max_suppression(mut xs: Vec<Detection>, iou_threshold: f32) -> Vec<Detection> {
    xs.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut kept: Vec<Detection> = Vec::with_capacity(xs.len());
    for candidate in xs {
        let suppressed = kept.iter().any(|k| {
            k.class_id == candidate.class_id
                && compute_iou(&k.bbox(), &candidate.bbox()) > iou_threshold
        });
        if !suppressed {
            kept.push(candidate);
        }
    }
    kept
}

#[cfg(feature = "onnx")]
pub use onnx::YoloDetector;

#[cfg(feature = "onnx")]
mod onnx {
    use std::path::Path;

    use image::RgbImage;
    use ort::session::{builder::GraphOptimizationLevel, Session};
    use ort::value::TensorRef;
    use tracing::{debug, info};

    use super::{decode_output, letterbox, ModelConfig};
    use crate::detection::detector::{DetectParams, Detector};
    use crate::detection::types::Detection;
    use crate::error::{Error, Result};

    /// ONNX Runtime 驱动的 YOLO 检测器
    pub struct YoloDetector {
        session: Session,
        config: ModelConfig,
    }

    impl YoloDetector {
        /// 从模型配置文件和权重文件加载 (只加载一次)
        pub fn load(config_path: &Path, weights_path: &Path) -> Result<Self> {
            let config = ModelConfig::load(config_path)?;
            if !weights_path.is_file() {
                return Err(Error::io(
                    weights_path,
                    std::io::Error::new(std::io::ErrorKind::NotFound, "权重文件不存在"),
                ));
            }

            let session = Session::builder()
                .and_then(|b| b.with_optimization_level(GraphOptimizationLevel::Level3))
                .and_then(|b| b.commit_from_file(weights_path))
                .map_err(|e| Error::ModelLoad(format!("{}: {}", weights_path.display(), e)))?;

            info!(
                "✅ 检测模型加载成功: {} (布局 {:?}, 类别数 {})",
                weights_path.display(),
                config.layout,
                config
                    .num_classes()
                    .map_or_else(|| "自动".to_string(), |n| n.to_string())
            );
            Ok(Self { session, config })
        }
    }

    impl Detector for YoloDetector {
        fn detect(&mut self, frame: &RgbImage, params: &DetectParams) -> Result<Vec<Detection>> {
            let (input, ratio) = letterbox(frame, params.resolution);
            let tensor = TensorRef::from_array_view(input.view())
                .map_err(|e| Error::Inference(e.to_string()))?;
            let outputs = self
                .session
                .run(ort::inputs![tensor])
                .map_err(|e| Error::Inference(e.to_string()))?;
            let output = outputs[0]
                .try_extract_array::<f32>()
                .map_err(|e| Error::Inference(e.to_string()))?;

            let detections =
                decode_output(output, &self.config, ratio, frame.dimensions(), params)?;
            debug!("检测到 {} 个目标", detections.len());
            Ok(detections)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    #[test]
    fn test_letterbox_shape_and_ratio() {
        let frame = RgbImage::from_pixel(832, 416, image::Rgb([255, 0, 0]));
        let (x, ratio) = letterbox(&frame, 416);
        assert_eq!(x.shape(), &[1, 3, 416, 416]);
        assert!((ratio - 0.5).abs() < 1e-6);
        // 有效区域为红色, 下半部分为填充色
        assert!((x[[0, 0, 10, 10]] - 1.0).abs() < 1e-6);
        assert!((x[[0, 0, 300, 10]] - FILL_VALUE).abs() < 1e-6);
    }

    #[test]
    fn test_decode_channels_layout() {
        // 2 个类别, 3 个候选: [1, 6, 3]
        let mut out = Array3::<f32>::zeros((1, 6, 3));
        // 候选0: person 0.9, 中心 (50,50), 20x40
        for (f, v) in [50.0, 50.0, 20.0, 40.0, 0.9, 0.1].iter().enumerate() {
            out[[0, f, 0]] = *v;
        }
        // 候选1: 低分
        for (f, v) in [10.0, 10.0, 5.0, 5.0, 0.1, 0.2].iter().enumerate() {
            out[[0, f, 1]] = *v;
        }
        // 候选2: class 1
        for (f, v) in [80.0, 80.0, 10.0, 10.0, 0.0, 0.95].iter().enumerate() {
            out[[0, f, 2]] = *v;
        }
        let config = ModelConfig {
            layout: OutputLayout::Channels,
            names: vec![],
        };
        let params = DetectParams {
            resolution: 100,
            conf_threshold: 0.5,
            nms_threshold: 0.5,
        };
        let dets = decode_output(out.view().into_dyn(), &config, 1.0, (100, 100), &params).unwrap();
        assert_eq!(dets.len(), 2);
        assert_eq!(dets[0].class_id, 1);
        assert_eq!(dets[1].class_id, 0);
        assert!((dets[1].x1 - 40.0).abs() < 1e-4);
        assert!((dets[1].y2 - 70.0).abs() < 1e-4);
    }

    #[test]
    fn test_decode_anchors_layout_uses_objectness_and_ratio() {
        // [1, 1, 6]: cx, cy, w, h, obj, cls0
        let mut out = Array3::<f32>::zeros((1, 1, 6));
        for (f, v) in [20.0, 20.0, 10.0, 10.0, 0.5, 0.9].iter().enumerate() {
            out[[0, 0, f]] = *v;
        }
        let config = ModelConfig::default();
        let params = DetectParams {
            resolution: 416,
            conf_threshold: 0.4,
            nms_threshold: 0.5,
        };
        let dets = decode_output(out.view().into_dyn(), &config, 0.5, (200, 200), &params).unwrap();
        assert_eq!(dets.len(), 1);
        assert!((dets[0].confidence - 0.45).abs() < 1e-6);
        assert!((dets[0].x1 - 30.0).abs() < 1e-4);
        assert!((dets[0].x2 - 50.0).abs() < 1e-4);

        let strict = DetectParams {
            conf_threshold: 0.5,
            ..params
        };
        let dets = decode_output(out.view().into_dyn(), &config, 0.5, (200, 200), &strict).unwrap();
        assert!(dets.is_empty());
    }

    #[test]
    fn test_decode_rejects_bad_shape() {
        let out = Array3::<f32>::zeros((1, 3, 10));
        let config = ModelConfig {
            layout: OutputLayout::Channels,
            names: vec![],
        };
        let err = decode_output(
            out.view().into_dyn(),
            &config,
            1.0,
            (10, 10),
            &DetectParams::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Inference(_)));
    }

    #[test]
    fn test_nms_is_class_aware() {
        let dets = vec![
            Detection::new(0.0, 0.0, 10.0, 10.0, 0, 0.8),
            Detection::new(1.0, 1.0, 11.0, 11.0, 0, 0.9),
            Detection::new(1.0, 1.0, 11.0, 11.0, 1, 0.7),
            Detection::new(50.0, 50.0, 60.0, 60.0, 0, 0.6),
        ];
        let kept = non_max_suppression(dets, 0.5);
        assert_eq!(kept.len(), 3);
        assert!((kept[0].confidence - 0.9).abs() < 1e-6);
        assert!(kept.iter().any(|d| d.class_id == 1));
    }

    #[test]
    fn test_model_config_json() {
        let config: ModelConfig =
            serde_json::from_str(r#"{ "layout": "channels", "names": ["person", "car"] }"#)
                .unwrap();
        assert_eq!(config.layout, OutputLayout::Channels);
        assert_eq!(config.num_classes(), Some(2));
    }
}
