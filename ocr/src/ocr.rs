use std::path::Path;

use anyhow::Result;

use crate::config::OcrConfig;

/// OCR 引擎原始输出
///
/// 不同引擎的输出结构各不相同, 由 [`crate::format_structured`] 和 [`crate::format_text`] 统一整理
pub type Prediction = serde_json::Value;

/// OCR 引擎接口
pub trait Ocr {
    /// 按配置创建引擎实例
    ///
    /// # 参数
    ///
    /// * `config` - OCR 配置
    fn init(config: &OcrConfig) -> Result<Self>
    where
        Self: Sized;

    /// 识别图片文件中的文字
    ///
    /// # 参数
    ///
    /// * `image_path` - 待识别的图片路径
    fn predict(&self, image_path: &Path) -> Result<Prediction>;
}
