use std::path::PathBuf;

use thiserror::Error;

/// OCR 工具错误
#[derive(Error, Debug)]
pub enum OcrError {
    #[error("OCR 引擎初始化失败: {0}")]
    EngineInit(#[source] anyhow::Error),
    #[error("图片文件不存在: {}", .0.display())]
    ImageNotFound(PathBuf),
    #[error("不支持的输出格式: {0}")]
    UnsupportedFormat(String),
    #[error("无效的语言配置: {0}")]
    InvalidLanguage(String),
    #[error("图片识别失败: {0}")]
    Recognition(#[source] anyhow::Error),
}
