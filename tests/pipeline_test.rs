// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 端到端流水线测试: 内存帧源/帧汇 + 脚本化检测器/跟踪器

use image::{Rgb, RgbImage};
use yolo_sort_rs::{
    Annotator, BBox, ClassFilter, DetectParams, Detection, Detector, Error, FramePipeline,
    IouTracker, LoopState, MemorySink, MemorySource, ProgressReporter, Result, TrackedBox, Tracker,
    VideoMeta,
};

const WIDTH: u32 = 64;
const HEIGHT: u32 = 48;
const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
const GREEN: Rgb<u8> = Rgb([0, 255, 0]);
const BLACK: Rgb<u8> = Rgb([0, 0, 0]);

/// 一个行人每帧右移 10 像素, 外加一个固定位置的非行人目标
struct ScriptedDetector {
    frame_index: u32,
    fail_at: Option<u32>,
}

impl ScriptedDetector {
    fn new() -> Self {
        Self {
            frame_index: 0,
            fail_at: None,
        }
    }

    fn failing_at(frame: u32) -> Self {
        Self {
            frame_index: 0,
            fail_at: Some(frame),
        }
    }
}

impl Detector for ScriptedDetector {
    fn detect(&mut self, _frame: &RgbImage, _params: &DetectParams) -> Result<Vec<Detection>> {
        let i = self.frame_index;
        self.frame_index += 1;
        if self.fail_at == Some(i) {
            return Err(Error::Inference("scripted failure".to_string()));
        }
        let dx = 10.0 * i as f32;
        Ok(vec![
            Detection::new(5.0 + dx, 10.0, 25.0 + dx, 40.0, 0, 0.9),
            Detection::new(40.0, 42.0, 60.0, 47.0, 2, 0.95),
        ])
    }
}

/// 所有框都分配ID 1, 并记录收到的输入
#[derive(Default)]
struct FixedIdTracker {
    received: Vec<Vec<BBox>>,
}

impl Tracker for FixedIdTracker {
    fn update(&mut self, boxes: &[BBox]) -> Result<Vec<TrackedBox>> {
        self.received.push(boxes.to_vec());
        Ok(boxes.iter().map(|b| TrackedBox::new(*b, 1)).collect())
    }
}

struct FailingTracker;

impl Tracker for FailingTracker {
    fn update(&mut self, _boxes: &[BBox]) -> Result<Vec<TrackedBox>> {
        Err(Error::Tracker("scripted failure".to_string()))
    }
}

fn meta() -> VideoMeta {
    VideoMeta::new(WIDTH, HEIGHT, 25, 1)
}

fn white_frames(n: usize) -> Vec<RgbImage> {
    vec![RgbImage::from_pixel(WIDTH, HEIGHT, WHITE); n]
}

fn pipeline<D: Detector, T: Tracker>(detector: D, tracker: T) -> FramePipeline<D, T> {
    FramePipeline::new(
        detector,
        tracker,
        ClassFilter::person(),
        Annotator::default(),
        DetectParams::default(),
    )
}

fn run_to_memory<D: Detector, T: Tracker>(
    p: &mut FramePipeline<D, T>,
    frames: Vec<RgbImage>,
) -> (Result<yolo_sort_rs::RunSummary>, MemorySink, String) {
    let total = frames.len() as u64;
    let mut source = MemorySource::new(meta(), frames).unwrap();
    let mut sink = MemorySink::new(meta());
    let mut progress = ProgressReporter::new(Vec::new(), true, Some(total));
    let result = p.run(&mut source, &mut sink, &mut progress);
    let printed = String::from_utf8(progress.into_inner()).unwrap();
    (result, sink, printed)
}

#[test]
fn test_three_frame_person_walk() {
    let mut p = pipeline(ScriptedDetector::new(), FixedIdTracker::default());
    let (result, sink, printed) = run_to_memory(&mut p, white_frames(3));
    let summary = result.unwrap();

    assert_eq!(summary.frames_read, 3);
    assert_eq!(summary.frames_written, 3);
    assert_eq!(summary.tracked_boxes, 3);
    assert_eq!(p.state(), LoopState::Done);
    assert!(printed.ends_with("\r3 of 3 processed"));

    // 非行人目标从未到达跟踪器
    for boxes in &p.tracker_inputs() {
        assert_eq!(boxes.len(), 1);
    }

    for (i, frame) in sink.frames().iter().enumerate() {
        let x1 = 5 + 10 * i as u32;

        // 左边框在 x1, 左侧一列未被绘制
        assert_eq!(*frame.get_pixel(x1, 30), GREEN, "frame {}", i);
        assert_eq!(*frame.get_pixel(x1 - 1, 30), WHITE, "frame {}", i);
        // 下边框
        assert_eq!(*frame.get_pixel(x1 + 10, 40), GREEN, "frame {}", i);

        // 标签: 底色锚定在左上角, "1" 的第一行点阵在第 3 列
        assert_eq!(*frame.get_pixel(x1, 10), GREEN, "frame {}", i);
        assert_eq!(*frame.get_pixel(x1 + 1 + 2, 10 + 2), BLACK, "frame {}", i);

        // 非行人区域保持原样
        for y in 42..HEIGHT {
            for x in 40..=60 {
                assert_eq!(*frame.get_pixel(x, y), WHITE, "frame {} ({}, {})", i, x, y);
            }
        }
    }
}

#[test]
fn test_zero_frame_input() {
    let mut p = pipeline(ScriptedDetector::new(), FixedIdTracker::default());
    let (result, sink, printed) = run_to_memory(&mut p, Vec::new());
    let summary = result.unwrap();

    assert_eq!(summary.frames_read, 0);
    assert_eq!(summary.frames_written, 0);
    assert!(sink.frames().is_empty());
    assert_eq!(printed, "\r0 of 0 processed");
    assert!(p.tracker_inputs().is_empty());
}

#[test]
fn test_frames_written_equals_frames_read() {
    let mut p = pipeline(ScriptedDetector::new(), IouTracker::default());
    let (result, sink, _) = run_to_memory(&mut p, white_frames(5));
    let summary = result.unwrap();

    assert_eq!(summary.frames_read, 5);
    assert_eq!(summary.frames_written, summary.frames_read);
    assert_eq!(sink.frames().len(), 5);
}

#[test]
fn test_detector_error_stops_run() {
    let mut p = pipeline(ScriptedDetector::failing_at(1), FixedIdTracker::default());
    let (result, sink, printed) = run_to_memory(&mut p, white_frames(3));

    assert!(matches!(result, Err(Error::Inference(_))));
    assert_eq!(sink.frames().len(), 1);
    assert_eq!(printed, "\r1 of 3 processed");
}

#[test]
fn test_tracker_error_stops_run() {
    let mut p = pipeline(ScriptedDetector::new(), FailingTracker);
    let (result, sink, _) = run_to_memory(&mut p, white_frames(2));

    assert!(matches!(result, Err(Error::Tracker(_))));
    assert!(sink.frames().is_empty());
}

#[test]
fn test_runs_are_idempotent() {
    let run = || {
        let mut p = pipeline(ScriptedDetector::new(), IouTracker::default());
        let (result, sink, _) = run_to_memory(&mut p, white_frames(4));
        result.unwrap();
        sink.into_frames()
    };
    assert_eq!(run(), run());
}

/// 跟踪器输入记录 (仅 FixedIdTracker)
trait TrackerInputs {
    fn tracker_inputs(&self) -> Vec<Vec<BBox>>;
}

impl<D: Detector> TrackerInputs for FramePipeline<D, FixedIdTracker> {
    fn tracker_inputs(&self) -> Vec<Vec<BBox>> {
        self.tracker().received.clone()
    }
}
