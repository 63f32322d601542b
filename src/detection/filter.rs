// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 类别过滤 (Class filter)
//!
//! 只保留 "person" 类别的检测, 其它类别在进入跟踪器之前被丢弃。

use ndarray::ArrayView2;

use super::types::{detections_from_rows, Detection, PERSON_CLASS_ID};
use crate::error::Result;

/// 按类别ID过滤检测结果
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClassFilter {
    class_id: u32,
}

impl Default for ClassFilter {
    fn default() -> Self {
        Self::person()
    }
}

impl ClassFilter {
    pub fn new(class_id: u32) -> Self {
        Self { class_id }
    }

    pub fn person() -> Self {
        Self::new(PERSON_CLASS_ID)
    }

    pub fn class_id(&self) -> u32 {
        self.class_id
    }

    /// 保留目标类别的检测 (保持原有顺序)
    pub fn apply(&self, detections: &[Detection]) -> Vec<Detection> {
        detections
            .iter()
            .filter(|d| d.class_id == self.class_id)
            .copied()
            .collect()
    }

    /// 原始矩阵版本: 列数不足 6 或类别不是非负整数时直接报错
    pub fn apply_rows(&self, rows: ArrayView2<f32>) -> Result<Vec<Detection>> {
        let detections = detections_from_rows(rows)?;
        Ok(self.apply(&detections))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use ndarray::array;

    fn sample() -> Vec<Detection> {
        vec![
            Detection::new(0.0, 0.0, 10.0, 10.0, 0, 0.9),
            Detection::new(5.0, 5.0, 15.0, 15.0, 2, 0.95),
            Detection::new(20.0, 20.0, 30.0, 30.0, 0, 0.88),
            Detection::new(40.0, 40.0, 50.0, 50.0, 16, 0.99),
        ]
    }

    #[test]
    fn test_keeps_only_person_in_order() {
        let kept = ClassFilter::person().apply(&sample());
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].x1, 0.0);
        assert_eq!(kept[1].x1, 20.0);
        assert!(kept.iter().all(|d| d.class_id == PERSON_CLASS_ID));
    }

    #[test]
    fn test_output_is_subset() {
        let input = sample();
        let kept = ClassFilter::new(2).apply(&input);
        assert!(kept.iter().all(|d| input.contains(d)));
        assert_eq!(kept.len(), 1);
    }

    #[test]
    fn test_no_person() {
        let input = vec![Detection::new(0.0, 0.0, 1.0, 1.0, 3, 0.9)];
        assert!(ClassFilter::person().apply(&input).is_empty());
        assert!(ClassFilter::person().apply(&[]).is_empty());
    }

    #[test]
    fn test_apply_rows() {
        let rows = array![
            [0.0f32, 0.0, 10.0, 10.0, 0.0, 0.9],
            [1.0, 1.0, 11.0, 11.0, 1.0, 0.9],
        ];
        let kept = ClassFilter::person().apply_rows(rows.view()).unwrap();
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].x2, 10.0);
    }

    #[test]
    fn test_apply_rows_rejects_non_integral_class() {
        // NaN / 负数 / 小数都不能被当作 person (0) 放行
        for class in [f32::NAN, -1.0, 0.7] {
            let rows = array![
                [0.0f32, 0.0, 10.0, 10.0, 0.0, 0.9],
                [1.0, 1.0, 11.0, 11.0, class, 0.9],
            ];
            let err = ClassFilter::person().apply_rows(rows.view()).unwrap_err();
            assert!(matches!(err, Error::InvalidField { .. }), "class {}", class);
        }
    }

    #[test]
    fn test_apply_rows_missing_class_column() {
        let rows = array![[0.0f32, 0.0, 10.0, 10.0, 0.9]];
        let err = ClassFilter::person().apply_rows(rows.view()).unwrap_err();
        assert!(matches!(err, Error::MalformedRecord { actual: 5, .. }));
    }
}
