// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 检测/跟踪数据结构定义
/// Data structures shared by detector, class filter, tracker and annotator
///
/// 坐标约定: (x1, y1) 为左上角, (x2, y2) 为右下角, 单位为帧像素。
use ndarray::ArrayView2;

use crate::error::{Error, Result};

// ========== 公共常量 ==========

/// COCO "person" 类别ID
pub const PERSON_CLASS_ID: u32 = 0;

/// 检测记录字段数: [x1, y1, x2, y2, class_id, confidence]
pub const DETECTION_FIELDS: usize = 6;

/// 跟踪记录字段数: [x1, y1, x2, y2, track_id]
pub const TRACKED_FIELDS: usize = 5;

/// 解析整数字段 (类别ID / 跟踪ID)
///
/// `as` 转换会把 NaN、负数和小数静默变成合法ID, 这里一律拒绝
fn integral_field(kind: &'static str, field: &'static str, value: f32, max: u64) -> Result<u64> {
    if !value.is_finite() || value < 0.0 || value.fract() != 0.0 || value as f64 > max as f64 {
        return Err(Error::InvalidField { kind, field, value });
    }
    Ok(value as u64)
}

// ========== 数据结构 ==========

/// 检测框 (跟踪前)
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Detection {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub class_id: u32,
    pub confidence: f32,
}

impl Detection {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32, class_id: u32, confidence: f32) -> Self {
        Self {
            x1,
            y1,
            x2,
            y2,
            class_id,
            confidence,
        }
    }

    /// 从固定布局的行解析: [x1, y1, x2, y2, class_id, confidence]
    ///
    /// 字段不足时立即失败, 而不是默默放行。多余的列被忽略。
    pub fn from_row(row: &[f32]) -> Result<Self> {
        if row.len() < DETECTION_FIELDS {
            return Err(Error::MalformedRecord {
                kind: "detection",
                expected: DETECTION_FIELDS,
                actual: row.len(),
            });
        }
        let class_id = integral_field("detection", "class_id", row[4], u32::MAX as u64)?;
        Ok(Self::new(
            row[0],
            row[1],
            row[2],
            row[3],
            class_id as u32,
            row[5],
        ))
    }

    /// 去掉类别和置信度, 只保留跟踪器需要的框
    pub fn bbox(&self) -> BBox {
        BBox::new(self.x1, self.y1, self.x2, self.y2)
    }

}

/// 解析整张检测矩阵 (每行一个检测)
pub fn detections_from_rows(rows: ArrayView2<f32>) -> Result<Vec<Detection>> {
    if rows.ncols() < DETECTION_FIELDS {
        return Err(Error::MalformedRecord {
            kind: "detection",
            expected: DETECTION_FIELDS,
            actual: rows.ncols(),
        });
    }
    rows.rows()
        .into_iter()
        .map(|row| {
            let row = row.to_vec();
            Detection::from_row(&row)
        })
        .collect()
}

/// 跟踪器输入框 [x1, y1, x2, y2]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    pub fn area(&self) -> f32 {
        self.width().max(0.0) * self.height().max(0.0)
    }
}

/// 跟踪框 (跟踪后) [x1, y1, x2, y2, track_id]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TrackedBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub track_id: u64,
}

impl TrackedBox {
    pub fn new(bbox: BBox, track_id: u64) -> Self {
        Self {
            x1: bbox.x1,
            y1: bbox.y1,
            x2: bbox.x2,
            y2: bbox.y2,
            track_id,
        }
    }

    /// 从固定布局的行解析: [x1, y1, x2, y2, track_id]
    pub fn from_row(row: &[f32]) -> Result<Self> {
        if row.len() < TRACKED_FIELDS {
            return Err(Error::MalformedRecord {
                kind: "tracked box",
                expected: TRACKED_FIELDS,
                actual: row.len(),
            });
        }
        let track_id = integral_field("tracked box", "track_id", row[4], u64::MAX)?;
        Ok(Self {
            x1: row[0],
            y1: row[1],
            x2: row[2],
            y2: row[3],
            track_id,
        })
    }

    pub fn bbox(&self) -> BBox {
        BBox::new(self.x1, self.y1, self.x2, self.y2)
    }

    /// 标签文本: 整数形式的跟踪ID
    pub fn label(&self) -> String {
        self.track_id.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_detection_from_row() {
        let det = Detection::from_row(&[10.0, 20.0, 30.0, 40.0, 0.0, 0.9]).unwrap();
        assert_eq!(det.class_id, PERSON_CLASS_ID);
        assert_eq!(det.bbox(), BBox::new(10.0, 20.0, 30.0, 40.0));
        assert!((det.confidence - 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_detection_missing_fields() {
        let err = Detection::from_row(&[10.0, 20.0, 30.0, 40.0, 0.0]).unwrap_err();
        assert!(matches!(
            err,
            Error::MalformedRecord {
                expected: 6,
                actual: 5,
                ..
            }
        ));
    }

    #[test]
    fn test_detection_rejects_bad_class_id() {
        for class in [f32::NAN, f32::INFINITY, -1.0, 0.7, 5e10] {
            let err = Detection::from_row(&[10.0, 20.0, 30.0, 40.0, class, 0.9]).unwrap_err();
            assert!(
                matches!(err, Error::InvalidField { field: "class_id", .. }),
                "class {}",
                class
            );
        }
        let det = Detection::from_row(&[10.0, 20.0, 30.0, 40.0, 2.0, 0.9]).unwrap();
        assert_eq!(det.class_id, 2);
    }

    #[test]
    fn test_detections_from_rows_rejects_narrow_matrix() {
        let rows = array![[1.0f32, 2.0, 3.0, 4.0], [5.0, 6.0, 7.0, 8.0]];
        assert!(detections_from_rows(rows.view()).is_err());
    }

    #[test]
    fn test_tracked_box_label() {
        let tracked = TrackedBox::from_row(&[1.0, 2.0, 3.0, 4.0, 17.0]).unwrap();
        assert_eq!(tracked.label(), "17");
        assert!(TrackedBox::from_row(&[1.0, 2.0, 3.0, 4.0]).is_err());
    }

    #[test]
    fn test_tracked_box_rejects_bad_track_id() {
        for id in [f32::NAN, -3.0, 1.5] {
            let err = TrackedBox::from_row(&[1.0, 2.0, 3.0, 4.0, id]).unwrap_err();
            assert!(matches!(err, Error::InvalidField { field: "track_id", .. }));
        }
    }
}
