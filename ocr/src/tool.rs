use std::path::Path;

use tracing::{debug, error, info};

use crate::{
    config::{LanguageProfile, OcrConfig},
    error::OcrError,
    format::{OutputFormat, Recognition, format_prediction},
    ocr::Ocr,
    pp_ocr::PPOcr,
};

/// OCR 工具
///
/// 持有一个 OCR 引擎实例, 负责文件检查与结果整理
pub struct OcrTool<E: Ocr = PPOcr> {
    config: OcrConfig,
    engine: Option<E>,
}

impl<E: Ocr> OcrTool<E> {
    /// 创建 OCR 工具并立即初始化引擎
    ///
    /// # 参数
    ///
    /// * `config` - OCR 配置
    pub fn new(config: OcrConfig) -> Result<Self, OcrError> {
        let mut tool = Self::lazy(config);
        tool.initialize()?;
        Ok(tool)
    }

    /// 创建 OCR 工具, 引擎在首次识别时初始化
    pub fn lazy(config: OcrConfig) -> Self {
        Self {
            config,
            engine: None,
        }
    }

    /// 使用已创建的引擎
    pub fn with_engine(config: OcrConfig, engine: E) -> Self {
        Self {
            config,
            engine: Some(engine),
        }
    }

    pub fn language(&self) -> &LanguageProfile {
        &self.config.lang
    }

    pub fn is_initialized(&self) -> bool {
        self.engine.is_some()
    }

    /// 初始化引擎, 已初始化时不做任何操作
    pub fn initialize(&mut self) -> Result<(), OcrError> {
        self.engine()?;
        Ok(())
    }

    fn engine(&mut self) -> Result<&E, OcrError> {
        let engine = match self.engine.take() {
            Some(engine) => engine,
            None => {
                info!("初始化 OCR 工具, 语言: {}", self.config.lang);
                let engine = E::init(&self.config).map_err(|e| {
                    error!("OCR 工具初始化失败: {:?}", e);
                    OcrError::EngineInit(e)
                })?;
                info!("OCR 工具初始化成功");
                engine
            }
        };
        Ok(self.engine.insert(engine))
    }

    /// 识别图片中的文字
    ///
    /// # 参数
    ///
    /// * `image_path` - 本地图片路径
    /// * `format` - 输出格式
    pub fn recognize(
        &mut self,
        image_path: impl AsRef<Path>,
        format: OutputFormat,
    ) -> Result<Recognition, OcrError> {
        let image_path = image_path.as_ref();
        ensure_exists(image_path)?;

        let engine = self.engine()?;

        info!("开始识别图片: {}", image_path.display());
        let prediction = engine.predict(image_path).map_err(|e| {
            error!("图片识别失败: {:?}", e);
            OcrError::Recognition(e)
        })?;
        debug!("OCR 原始结果: {}", prediction);

        Ok(format_prediction(&prediction, format))
    }

    /// 识别图片中的文字, 输出格式为 `dict` 或 `text`
    ///
    /// # 参数
    ///
    /// * `image_path` - 本地图片路径
    /// * `output_format` - 输出格式名称
    pub fn recognize_text(
        &mut self,
        image_path: impl AsRef<Path>,
        output_format: &str,
    ) -> Result<Recognition, OcrError> {
        let image_path = image_path.as_ref();
        ensure_exists(image_path)?;
        let format = output_format.parse::<OutputFormat>()?;
        self.recognize(image_path, format)
    }
}

fn ensure_exists(image_path: &Path) -> Result<(), OcrError> {
    if !image_path.exists() {
        return Err(OcrError::ImageNotFound(image_path.to_path_buf()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::{
        cell::Cell,
        sync::atomic::{AtomicUsize, Ordering},
    };

    use anyhow::{Result, bail};
    use serde_json::{Value, json};

    use super::*;
    use crate::format::{StructuredResult, TextLine};

    const IMAGE: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/Cargo.toml");

    /// 返回固定结果的引擎
    struct StaticOcr {
        prediction: Value,
        calls: Cell<usize>,
    }

    impl StaticOcr {
        fn new(prediction: Value) -> Self {
            Self {
                prediction,
                calls: Cell::new(0),
            }
        }
    }

    impl Ocr for StaticOcr {
        fn init(_config: &OcrConfig) -> Result<Self> {
            bail!("没有可用的模型")
        }

        fn predict(&self, _image_path: &Path) -> Result<Value> {
            self.calls.set(self.calls.get() + 1);
            Ok(self.prediction.clone())
        }
    }

    static COUNTING_INITS: AtomicUsize = AtomicUsize::new(0);

    /// 统计初始化次数的引擎
    struct CountingOcr;

    impl Ocr for CountingOcr {
        fn init(_config: &OcrConfig) -> Result<Self> {
            COUNTING_INITS.fetch_add(1, Ordering::SeqCst);
            Ok(CountingOcr)
        }

        fn predict(&self, _image_path: &Path) -> Result<Value> {
            Ok(json!({"text": "OCR Tool Class", "confidence": 0.9}))
        }
    }

    /// 识别必定失败的引擎
    struct BrokenOcr;

    impl Ocr for BrokenOcr {
        fn init(_config: &OcrConfig) -> Result<Self> {
            Ok(BrokenOcr)
        }

        fn predict(&self, _image_path: &Path) -> Result<Value> {
            bail!("推理失败")
        }
    }

    fn static_tool(prediction: Value) -> OcrTool<StaticOcr> {
        OcrTool::with_engine(OcrConfig::default(), StaticOcr::new(prediction))
    }

    #[test]
    fn test_missing_image() {
        let mut tool = static_tool(json!({"text": "a"}));
        for format in ["dict", "text", "xml"] {
            let result = tool.recognize_text("no-such-image.png", format);
            assert!(matches!(result, Err(OcrError::ImageNotFound(_))));
        }
        assert!(matches!(
            tool.recognize("no-such-image.png", OutputFormat::Dict),
            Err(OcrError::ImageNotFound(_))
        ));
        assert_eq!(tool.engine.as_ref().unwrap().calls.get(), 0);
    }

    #[test]
    fn test_unsupported_format() {
        let mut tool = static_tool(json!({"text": "a"}));
        let result = tool.recognize_text(IMAGE, "xml");
        assert!(matches!(result, Err(OcrError::UnsupportedFormat(f)) if f == "xml"));
        assert_eq!(tool.engine.as_ref().unwrap().calls.get(), 0);
    }

    #[test]
    fn test_recognize_dict() {
        let bbox = json!([[0, 0], [8, 0], [8, 4], [0, 4]]);
        let mut tool = static_tool(json!({"text": "你好", "bbox": bbox, "confidence": 0.95}));
        let Recognition::Structured(result) = tool.recognize_text(IMAGE, "dict").unwrap() else {
            panic!("应为结构化结果");
        };
        let expected = [TextLine {
            text: "你好".to_string(),
            bbox,
            confidence: 0.95,
        }]
        .into_iter()
        .collect::<StructuredResult>();
        assert_eq!(result, expected);
    }

    #[test]
    fn test_recognize_text() {
        let mut tool = static_tool(json!([
            [[0, 0, 4, 2], ["Python OCR Demo", 0.99]],
            [[0, 3, 4, 5], ["包含中文和英文文字", 0.97]],
        ]));
        let result = tool.recognize(IMAGE, OutputFormat::Text).unwrap();
        assert_eq!(
            result,
            Recognition::Text("Python OCR Demo\n包含中文和英文文字".to_string())
        );
    }

    #[test]
    fn test_init_failure() {
        assert!(matches!(
            OcrTool::<StaticOcr>::new(OcrConfig::default()),
            Err(OcrError::EngineInit(_))
        ));

        let mut tool = OcrTool::<StaticOcr>::lazy(OcrConfig::default());
        assert!(matches!(
            tool.recognize(IMAGE, OutputFormat::Text),
            Err(OcrError::EngineInit(_))
        ));
        assert!(!tool.is_initialized());
    }

    #[test]
    fn test_lazy_initialization() {
        let mut tool = OcrTool::<CountingOcr>::lazy(OcrConfig::default());
        assert!(!tool.is_initialized());
        let before = COUNTING_INITS.load(Ordering::SeqCst);

        tool.recognize(IMAGE, OutputFormat::Text).unwrap();
        tool.recognize(IMAGE, OutputFormat::Dict).unwrap();
        tool.initialize().unwrap();

        assert!(tool.is_initialized());
        assert_eq!(COUNTING_INITS.load(Ordering::SeqCst) - before, 1);
    }

    #[test]
    fn test_recognition_failure() {
        let mut tool = OcrTool::<BrokenOcr>::new(OcrConfig::default()).unwrap();
        let err = tool.recognize(IMAGE, OutputFormat::Dict).unwrap_err();
        assert!(matches!(&err, OcrError::Recognition(e) if e.to_string() == "推理失败"));
        assert_eq!(err.to_string(), "图片识别失败: 推理失败");
    }

    #[test]
    fn test_language() {
        let config = OcrConfig::with_lang("ch+en".parse().unwrap());
        let tool = OcrTool::with_engine(config, CountingOcr);
        assert_eq!(tool.language().as_str(), "ch+en");
    }
}
