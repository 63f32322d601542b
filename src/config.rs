// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 流水线配置 - 命令行参数 + JSON 配置文件
//!
//! 不带任何参数运行时使用内置默认值 (模型、输入输出路径、阈值)。

use std::fs;
use std::path::{Path, PathBuf};

use clap::Parser;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::detection::{DetectParams, TrackerConfig, PERSON_CLASS_ID};
use crate::error::{Error, Result};
use crate::renderer::{AnnotationStyle, MAX_BUILTIN_SCALE};

/// YOLO 下采样步长, 输入尺寸必须是它的整数倍
pub const MODEL_STRIDE: u32 = 32;

/// 流水线参数配置
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    // === 模型 ===
    pub model_config: PathBuf, // 模型配置 (JSON)
    pub weights: PathBuf,      // 模型权重 (ONNX)

    // === 输入输出 ===
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub video_file: String,

    // === 检测参数 ===
    pub resolution: u32,     // 模型输入尺寸
    pub conf_threshold: f32, // 检测置信度阈值
    pub nms_threshold: f32,  // NMS IOU阈值
    pub class_id: u32,       // 保留的类别 (person)

    /// 打印进度 (会额外解码一遍视频统计总帧数)
    pub verbose: bool,

    pub tracker: TrackerConfig,
    pub annotation: AnnotationStyle,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            model_config: PathBuf::from("../config/yolov3.json"),
            weights: PathBuf::from("../weights/yolov3.onnx"),
            input_dir: PathBuf::from("../input"),
            output_dir: PathBuf::from("../output/yolov3_sort"),
            video_file: "campus4-c2.avi".to_string(),
            resolution: 416,
            conf_threshold: 0.85,
            nms_threshold: 0.5,
            class_id: PERSON_CLASS_ID,
            verbose: true,
            tracker: TrackerConfig::default(),
            annotation: AnnotationStyle::default(),
        }
    }
}

impl PipelineConfig {
    /// 从JSON文件加载配置 (缺失字段使用默认值)
    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let config: Self = serde_json::from_str(&json)?;
        info!("✅ 配置已从 {} 加载", path.display());
        Ok(config)
    }

    /// 保存配置到JSON文件
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).map_err(|e| Error::io(path, e))
    }

    pub fn in_path(&self) -> PathBuf {
        self.input_dir.join(&self.video_file)
    }

    /// 输出文件与输入同名, 位于输出目录
    pub fn out_path(&self) -> PathBuf {
        self.output_dir.join(&self.video_file)
    }

    pub fn detect_params(&self) -> DetectParams {
        DetectParams {
            resolution: self.resolution,
            conf_threshold: self.conf_threshold,
            nms_threshold: self.nms_threshold,
        }
    }

    /// 参数合法性检查
    pub fn validate(&self) -> Result<()> {
        if self.resolution == 0 || self.resolution % MODEL_STRIDE != 0 {
            return Err(Error::Config(format!(
                "resolution 必须是 {} 的正整数倍: {}",
                MODEL_STRIDE, self.resolution
            )));
        }
        for (name, value) in [
            ("conf_threshold", self.conf_threshold),
            ("nms_threshold", self.nms_threshold),
            ("tracker.iou_threshold", self.tracker.iou_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(Error::Config(format!("{} 必须在 [0, 1] 内: {}", name, value)));
            }
        }
        if self.tracker.max_age == 0 || self.tracker.min_hits == 0 {
            return Err(Error::Config(format!(
                "tracker.max_age / tracker.min_hits 必须至少为 1: {} / {}",
                self.tracker.max_age, self.tracker.min_hits
            )));
        }
        if !(1..=MAX_BUILTIN_SCALE).contains(&self.annotation.builtin_scale) {
            return Err(Error::Config(format!(
                "annotation.builtin_scale 必须在 [1, {}] 内: {}",
                MAX_BUILTIN_SCALE, self.annotation.builtin_scale
            )));
        }
        if self.video_file.is_empty() {
            return Err(Error::Config("video_file 不能为空".to_string()));
        }
        Ok(())
    }
}

/// 命令行参数 (全部可选, 覆盖配置文件/默认值中的对应字段)
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "YOLO + SORT 行人检测跟踪视频标注", long_about = None)]
pub struct Args {
    /// JSON配置文件
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// 模型配置文件 (JSON)
    #[arg(long)]
    pub model_config: Option<PathBuf>,

    /// 模型权重 (ONNX)
    #[arg(long)]
    pub weights: Option<PathBuf>,

    /// 输入视频目录
    #[arg(long)]
    pub input_dir: Option<PathBuf>,

    /// 输出目录 (不存在时自动创建)
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// 视频文件名
    #[arg(long)]
    pub video: Option<String>,

    /// 模型输入尺寸
    #[arg(long)]
    pub resolution: Option<u32>,

    /// 置信度阈值
    #[arg(long)]
    pub conf: Option<f32>,

    /// NMS IOU阈值
    #[arg(long)]
    pub nms: Option<f32>,

    /// 标签字体 (TrueType)
    #[arg(long)]
    pub font: Option<PathBuf>,

    /// 不打印进度
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    /// 合并: 配置文件 (或默认值) ← 命令行覆盖
    pub fn into_config(self) -> Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::load(path)?,
            None => PipelineConfig::default(),
        };

        if let Some(v) = self.model_config {
            config.model_config = v;
        }
        if let Some(v) = self.weights {
            config.weights = v;
        }
        if let Some(v) = self.input_dir {
            config.input_dir = v;
        }
        if let Some(v) = self.output_dir {
            config.output_dir = v;
        }
        if let Some(v) = self.video {
            config.video_file = v;
        }
        if let Some(v) = self.resolution {
            config.resolution = v;
        }
        if let Some(v) = self.conf {
            config.conf_threshold = v;
        }
        if let Some(v) = self.nms {
            config.nms_threshold = v;
        }
        if let Some(v) = self.font {
            config.annotation.font_path = Some(v);
        }
        if self.quiet {
            config.verbose = false;
        }

        config.validate()?;
        Ok(config)
    }
}
