// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 行人检测 + 跟踪视频标注
///
/// 直接运行 (使用默认路径): cargo run --bin yolo-sort --features ffmpeg,onnx --release
use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use yolo_sort_rs::detection::{IouTracker, YoloDetector};
use yolo_sort_rs::{process_video, Args};

fn main() -> anyhow::Result<()> {
    // 日志写 stderr, 避免与 stdout 上的进度行混在一起
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let config = Args::parse().into_config()?;

    info!("📦 模型配置: {}", config.model_config.display());
    info!("📦 模型权重: {}", config.weights.display());
    let detector = YoloDetector::load(&config.model_config, &config.weights)
        .context("加载检测模型失败")?;
    let tracker = IouTracker::new(config.tracker.clone());

    process_video(&config, detector, tracker)
        .with_context(|| format!("处理 {} 失败", config.in_path().display()))?;

    println!(" | {} processing completed", config.video_file);
    Ok(())
}
