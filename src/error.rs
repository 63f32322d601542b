// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 错误类型 (Error taxonomy)
//!
//! 流水线内不捕获任何错误: 任一错误都会直接终止整个处理过程。

use std::path::PathBuf;

/// 流水线错误
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// 文件读写失败 (输入视频缺失、输出路径不可写、目录创建失败)
    #[error("I/O 错误 {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// 视频流错误 (无视频流、解码/编码失败、帧尺寸不一致)
    #[error("视频错误: {0}")]
    Video(String),

    /// 模型加载失败 (配置/权重格式错误、推理会话创建失败)
    #[error("模型加载失败: {0}")]
    ModelLoad(String),

    /// 推理失败或输出张量形状异常
    #[error("推理失败: {0}")]
    Inference(String),

    /// 检测/跟踪记录字段数不符合固定布局
    #[error("{kind} 记录格式错误: 需要 {expected} 个字段, 实际 {actual} 个")]
    MalformedRecord {
        kind: &'static str,
        expected: usize,
        actual: usize,
    },

    /// 类别/跟踪ID字段不是合法的非负整数 (NaN、负数、小数、越界)
    #[error("{kind} 记录字段 {field} 非法: {value}")]
    InvalidField {
        kind: &'static str,
        field: &'static str,
        value: f32,
    },

    /// 跟踪器报告的错误
    #[error("跟踪器错误: {0}")]
    Tracker(String),

    /// 字体加载失败
    #[error("字体加载失败: {0}")]
    Font(String),

    /// 配置不合法
    #[error("配置错误: {0}")]
    Config(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
