// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 多目标跟踪公共组件
//! Common components for multi-object tracking

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::types::{BBox, TrackedBox};
use crate::error::Result;

// ========== 跟踪器统一接口 ==========

/// 多目标跟踪器 Trait
///
/// 每帧调用一次, 内部跨帧保持轨迹身份。
/// 任何跟踪算法 (SORT, ByteTrack 等) 都可以通过实现此接口接入流水线。
pub trait Tracker {
    /// 更新跟踪器
    ///
    /// # 参数
    /// - `boxes`: 当前帧过滤后的检测框 (不含类别和置信度)
    ///
    /// # 返回
    /// 当前帧需要输出的跟踪框 [x1, y1, x2, y2, track_id]
    fn update(&mut self, boxes: &[BBox]) -> Result<Vec<TrackedBox>>;
}

impl<T: Tracker + ?Sized> Tracker for Box<T> {
    fn update(&mut self, boxes: &[BBox]) -> Result<Vec<TrackedBox>> {
        (**self).update(boxes)
    }
}

impl<T: Tracker + ?Sized> Tracker for &mut T {
    fn update(&mut self, boxes: &[BBox]) -> Result<Vec<TrackedBox>> {
        (**self).update(boxes)
    }
}

// ========== IOU 关联跟踪器 ==========

/// 跟踪器参数 (默认值与 SORT 一致)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// 轨迹允许连续丢失的最大帧数
    pub max_age: u32,
    /// 轨迹输出前需要的连续命中次数
    pub min_hits: u32,
    /// 关联所需的最小 IOU
    pub iou_threshold: f32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            max_age: 1,
            min_hits: 3,
            iou_threshold: 0.3,
        }
    }
}

#[derive(Clone, Debug)]
struct Track {
    id: u64,
    bbox: BBox,
    /// 连续命中次数
    hit_streak: u32,
    /// 距上次匹配的帧数
    time_since_update: u32,
}

/// 轻量级 IOU 关联跟踪器
///
/// 与 SORT 相同的调用约定和轨迹生命周期, 但没有运动模型:
/// 每条轨迹用上一帧的框参与匹配。
#[derive(Clone, Debug)]
pub struct IouTracker {
    config: TrackerConfig,
    tracks: Vec<Track>,
    next_id: u64,
    frame_count: u64,
}

impl Default for IouTracker {
    fn default() -> Self {
        Self::new(TrackerConfig::default())
    }
}

impl IouTracker {
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            config,
            tracks: Vec::new(),
            next_id: 1,
            frame_count: 0,
        }
    }

    /// 当前存活的轨迹数量 (包括未输出的)
    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    /// 贪心匹配: 按 IOU 从高到低依次配对, 低于阈值的不配对
    ///
    /// 返回 (轨迹下标, 检测下标) 列表
    fn associate(&self, boxes: &[BBox]) -> Vec<(usize, usize)> {
        let mut pairs: Vec<(f32, usize, usize)> = Vec::new();
        for (t, track) in self.tracks.iter().enumerate() {
            for (d, bbox) in boxes.iter().enumerate() {
                let iou = compute_iou(&track.bbox, bbox);
                if iou >= self.config.iou_threshold {
                    pairs.push((iou, t, d));
                }
            }
        }
        pairs.sort_by(|a, b| b.0.total_cmp(&a.0));

        let mut track_used = vec![false; self.tracks.len()];
        let mut det_used = vec![false; boxes.len()];
        let mut matches = Vec::new();
        for (_, t, d) in pairs {
            if track_used[t] || det_used[d] {
                continue;
            }
            track_used[t] = true;
            det_used[d] = true;
            matches.push((t, d));
        }
        matches
    }
}

impl Tracker for IouTracker {
    fn update(&mut self, boxes: &[BBox]) -> Result<Vec<TrackedBox>> {
        self.frame_count += 1;

        for track in &mut self.tracks {
            track.time_since_update += 1;
        }

        let matches = self.associate(boxes);
        let mut det_matched = vec![false; boxes.len()];
        for &(t, d) in &matches {
            let track = &mut self.tracks[t];
            track.bbox = boxes[d];
            track.hit_streak = if track.time_since_update == 1 {
                track.hit_streak + 1
            } else {
                1
            };
            track.time_since_update = 0;
            det_matched[d] = true;
        }

        // 未匹配的检测开启新轨迹
        for (d, bbox) in boxes.iter().enumerate() {
            if det_matched[d] {
                continue;
            }
            self.tracks.push(Track {
                id: self.next_id,
                bbox: *bbox,
                hit_streak: 1,
                time_since_update: 0,
            });
            self.next_id += 1;
        }

        // 丢失太久的轨迹被移除
        let max_age = self.config.max_age;
        self.tracks.retain(|t| t.time_since_update <= max_age);

        let warming_up = self.frame_count <= u64::from(self.config.min_hits);
        let output: Vec<TrackedBox> = self
            .tracks
            .iter()
            .filter(|t| {
                t.time_since_update == 0 && (t.hit_streak >= self.config.min_hits || warming_up)
            })
            .map(|t| TrackedBox::new(t.bbox, t.id))
            .collect();

        debug!(
            "跟踪: 输入{}个框, 匹配{}, 活跃轨迹{}, 输出{}",
            boxes.len(),
            matches.len(),
            self.tracks.len(),
            output.len()
        );
        Ok(output)
    }
}

// ========== 工具函数 ==========

/// 计算两个边界框的IOU (Intersection over Union)
pub fn compute_iou(bbox1: &BBox, bbox2: &BBox) -> f32 {
    let x1 = bbox1.x1.max(bbox2.x1);
    let y1 = bbox1.y1.max(bbox2.y1);
    let x2 = bbox1.x2.min(bbox2.x2);
    let y2 = bbox1.y2.min(bbox2.y2);

    if x2 <= x1 || y2 <= y1 {
        return 0.0;
    }

    let intersection = (x2 - x1) * (y2 - y1);
    let union = bbox1.area() + bbox2.area() - intersection;

    if union <= 0.0 {
        return 0.0;
    }

    intersection / union
}
