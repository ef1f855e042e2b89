use std::{
    fmt::{self, Display},
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use anyhow::{Context, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::OcrError;

/// 识别语言
///
/// 由一个或多个语言名组成, 多个语言以 `+` 连接, 例如 `ch`, `en`, `ch+en`
#[derive(JsonSchema, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(try_from = "String", into = "String")]
pub struct LanguageProfile(String);

impl LanguageProfile {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 拆分后的语言名
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('+')
    }
}

impl Default for LanguageProfile {
    fn default() -> Self {
        LanguageProfile("ch".to_string())
    }
}

impl FromStr for LanguageProfile {
    type Err = OcrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let valid = !s.is_empty()
            && s.split('+').all(|segment| {
                !segment.is_empty()
                    && segment
                        .chars()
                        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
            });
        if !valid {
            return Err(OcrError::InvalidLanguage(s.to_string()));
        }
        Ok(LanguageProfile(s.to_string()))
    }
}

impl TryFrom<String> for LanguageProfile {
    type Error = OcrError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<LanguageProfile> for String {
    fn from(value: LanguageProfile) -> Self {
        value.0
    }
}

impl Display for LanguageProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 文本检测参数
#[derive(JsonSchema, Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct DetectionConfig {
    #[schemars(title = "输入图片最长边限制")]
    pub limit_side_len: u32,
    #[schemars(title = "概率图二值化阈值")]
    pub thresh: f32,
    #[schemars(title = "文本框得分阈值")]
    pub box_thresh: f32,
    #[schemars(title = "文本框扩张比例")]
    pub unclip_ratio: f32,
    #[schemars(title = "最大候选文本框数量")]
    pub max_candidates: usize,
    #[schemars(title = "文本框最短边长度")]
    pub min_size: f32,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            limit_side_len: 960,
            thresh: 0.3,
            box_thresh: 0.6,
            unclip_ratio: 1.5,
            max_candidates: 1000,
            min_size: 3.0,
        }
    }
}

/// 文本识别参数
#[derive(JsonSchema, Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct RecognitionConfig {
    #[schemars(title = "识别模型输入高度")]
    pub image_height: u32,
    #[schemars(title = "识别结果置信度阈值")]
    pub score_thresh: f32,
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            image_height: 48,
            score_thresh: 0.5,
        }
    }
}

/// 功能开关
///
/// 内置引擎不包含这些处理阶段, 全部保持关闭
#[derive(JsonSchema, Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(default)]
pub struct FeatureToggles {
    #[schemars(title = "文档方向分类")]
    pub use_doc_orientation_classify: bool,
    #[schemars(title = "文档扭曲矫正")]
    pub use_doc_unwarping: bool,
    #[schemars(title = "文本行方向分类")]
    pub use_textline_orientation: bool,
    #[schemars(title = "MKL-DNN 加速")]
    pub enable_mkldnn: bool,
}

/// OCR 配置
#[derive(JsonSchema, Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct OcrConfig {
    #[schemars(title = "识别语言")]
    pub lang: LanguageProfile,
    #[schemars(title = "模型目录")]
    pub model_dir: PathBuf,
    #[schemars(title = "推理线程数")]
    pub intra_threads: usize,
    #[schemars(title = "文本检测参数")]
    pub detection: DetectionConfig,
    #[schemars(title = "文本识别参数")]
    pub recognition: RecognitionConfig,
    #[schemars(title = "功能开关")]
    pub features: FeatureToggles,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            lang: LanguageProfile::default(),
            model_dir: PathBuf::from("models"),
            intra_threads: 4,
            detection: DetectionConfig::default(),
            recognition: RecognitionConfig::default(),
            features: FeatureToggles::default(),
        }
    }
}

impl OcrConfig {
    /// 通过语言创建默认配置
    ///
    /// # 参数
    ///
    /// * `lang` - 识别语言
    pub fn with_lang(lang: LanguageProfile) -> Self {
        Self {
            lang,
            ..Self::default()
        }
    }

    /// 通过文件名加载配置
    ///
    /// # 参数
    ///
    /// * `config_file` - 配置文件名
    pub fn load(config_file: impl AsRef<Path>) -> Result<Self> {
        let config_data = fs::read(config_file.as_ref()).context("读取配置文件失败")?;
        let config = serde_yaml::from_slice::<OcrConfig>(config_data.as_slice())
            .context("解析配置文件失败, 请检查格式是否正确")?;
        Ok(config)
    }

    /// 文本检测模型路径
    pub fn detection_model(&self) -> PathBuf {
        self.model_dir.join("det.onnx")
    }

    /// 文本识别模型路径
    pub fn recognition_model(&self) -> PathBuf {
        self.model_dir.join(self.lang.as_str()).join("rec.onnx")
    }

    /// 字符字典路径
    pub fn character_dict(&self) -> PathBuf {
        self.model_dir.join(self.lang.as_str()).join("dict.txt")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_profile_parse() {
        let lang: LanguageProfile = "ch+en".parse().unwrap();
        assert_eq!(lang.segments().collect::<Vec<_>>(), vec!["ch", "en"]);
        assert_eq!(lang.to_string(), "ch+en");

        for invalid in ["", "ch+", "+en", "ch en", "ch/../en"] {
            assert!(matches!(
                invalid.parse::<LanguageProfile>(),
                Err(OcrError::InvalidLanguage(_))
            ));
        }
    }

    #[test]
    fn test_config_from_yaml() {
        let config: OcrConfig = serde_yaml::from_str(
            "lang: en\nmodel_dir: /opt/models\ndetection:\n  box_thresh: 0.5\n",
        )
        .unwrap();
        assert_eq!(config.lang.as_str(), "en");
        assert_eq!(config.detection.box_thresh, 0.5);
        assert_eq!(config.detection.limit_side_len, 960);
        assert_eq!(config.recognition, RecognitionConfig::default());
        assert_eq!(config.features, FeatureToggles::default());
        assert_eq!(
            config.recognition_model(),
            PathBuf::from("/opt/models/en/rec.onnx")
        );
    }

    #[test]
    fn test_config_rejects_invalid_lang() {
        assert!(serde_yaml::from_str::<OcrConfig>("lang: \"ch+\"\n").is_err());
    }

    #[test]
    fn test_load_missing_config() {
        let err = OcrConfig::load("no-such-config.yaml").unwrap_err();
        assert_eq!(err.to_string(), "读取配置文件失败");
    }
}
