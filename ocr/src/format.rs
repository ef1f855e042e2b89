use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::{error::OcrError, ocr::Prediction};

/// 缺少置信度时使用的默认值
pub const DEFAULT_CONFIDENCE: f64 = 1.0;

/// 输出格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// 文本, 文本框, 置信度三个对齐的列表
    Dict,
    /// 按行拼接的纯文本
    Text,
}

impl FromStr for OutputFormat {
    type Err = OcrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dict" => Ok(OutputFormat::Dict),
            "text" => Ok(OutputFormat::Text),
            other => Err(OcrError::UnsupportedFormat(other.to_string())),
        }
    }
}

/// 单行识别结果
#[derive(Debug, Clone, PartialEq)]
pub struct TextLine {
    pub text: String,
    pub bbox: Value,
    pub confidence: f64,
}

/// 结构化识别结果
///
/// 三个列表按下标一一对应, 只能通过 [`StructuredResult::push`] 追加
#[derive(JsonSchema, Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(try_from = "UncheckedStructuredResult")]
pub struct StructuredResult {
    #[schemars(title = "识别文本")]
    texts: Vec<String>,
    #[schemars(title = "文本框")]
    bboxes: Vec<Value>,
    #[schemars(title = "置信度")]
    confidences: Vec<f64>,
}

/// 反序列化得到的结构化结果, 尚未检查列表长度
#[derive(JsonSchema, Deserialize)]
struct UncheckedStructuredResult {
    texts: Vec<String>,
    bboxes: Vec<Value>,
    confidences: Vec<f64>,
}

impl TryFrom<UncheckedStructuredResult> for StructuredResult {
    type Error = String;

    fn try_from(value: UncheckedStructuredResult) -> Result<Self, Self::Error> {
        let UncheckedStructuredResult {
            texts,
            bboxes,
            confidences,
        } = value;
        if texts.len() != bboxes.len() || texts.len() != confidences.len() {
            return Err(format!(
                "结构化结果列表长度不一致: texts={}, bboxes={}, confidences={}",
                texts.len(),
                bboxes.len(),
                confidences.len()
            ));
        }
        Ok(StructuredResult {
            texts,
            bboxes,
            confidences,
        })
    }
}

impl StructuredResult {
    pub fn push(&mut self, line: TextLine) {
        self.texts.push(line.text);
        self.bboxes.push(line.bbox);
        self.confidences.push(line.confidence);
    }

    pub fn texts(&self) -> &[String] {
        &self.texts
    }

    pub fn bboxes(&self) -> &[Value] {
        &self.bboxes
    }

    pub fn confidences(&self) -> &[f64] {
        &self.confidences
    }

    pub fn len(&self) -> usize {
        self.texts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.texts.is_empty()
    }

    /// 逐行遍历
    pub fn lines(&self) -> impl Iterator<Item = TextLine> + '_ {
        self.texts
            .iter()
            .zip(&self.bboxes)
            .zip(&self.confidences)
            .map(|((text, bbox), &confidence)| TextLine {
                text: text.clone(),
                bbox: bbox.clone(),
                confidence,
            })
    }
}

impl FromIterator<TextLine> for StructuredResult {
    fn from_iter<I: IntoIterator<Item = TextLine>>(iter: I) -> Self {
        let mut result = StructuredResult::default();
        for line in iter {
            result.push(line);
        }
        result
    }
}

/// 识别结果
#[derive(Debug, Clone, PartialEq)]
pub enum Recognition {
    Structured(StructuredResult),
    Text(String),
}

/// 按输出格式整理引擎原始输出
///
/// # 参数
///
/// * `prediction` - 引擎原始输出
/// * `format` - 输出格式
pub fn format_prediction(prediction: &Prediction, format: OutputFormat) -> Recognition {
    match format {
        OutputFormat::Dict => Recognition::Structured(format_structured(prediction)),
        OutputFormat::Text => Recognition::Text(format_text(prediction)),
    }
}

/// 整理为结构化结果
pub fn format_structured(prediction: &Prediction) -> StructuredResult {
    collect_lines(prediction).into_iter().collect()
}

/// 整理为纯文本, 每行一条识别文本
pub fn format_text(prediction: &Prediction) -> String {
    collect_lines(prediction)
        .iter()
        .map(|line| line.text.as_str())
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// 从引擎原始输出中提取所有文本行
///
/// 支持的结构:
///
/// * 单个映射: `{"text", "bbox", "confidence" | "prob"}`
/// * 页面映射: `{"rec_texts", "rec_scores", "rec_polys" | "rec_boxes"}`
/// * 映射列表
/// * `[bbox, [text, confidence]]` 或 `[bbox, text]` 形式的列表
pub fn collect_lines(prediction: &Prediction) -> Vec<TextLine> {
    let mut lines = Vec::new();
    match prediction {
        Value::Object(map) => lines_from_mapping(map, &mut lines),
        Value::Array(items) => {
            for item in items {
                match item {
                    Value::Object(map) => lines_from_mapping(map, &mut lines),
                    Value::Array(pair) if pair.len() >= 2 => {
                        lines.push(line_from_pair(&pair[0], &pair[1]))
                    }
                    other => debug!("忽略无法识别的结果项: {}", other),
                }
            }
        }
        Value::Null => {}
        other => debug!("忽略无法识别的结果: {}", other),
    }
    lines
}

fn lines_from_mapping(map: &Map<String, Value>, lines: &mut Vec<TextLine>) {
    if let Some(Value::Array(texts)) = map.get("rec_texts") {
        let scores = map.get("rec_scores").and_then(Value::as_array);
        let boxes = map
            .get("rec_polys")
            .or_else(|| map.get("rec_boxes"))
            .and_then(Value::as_array);
        for (i, text) in texts.iter().enumerate() {
            lines.push(TextLine {
                text: value_to_text(text),
                bbox: boxes
                    .and_then(|boxes| boxes.get(i))
                    .cloned()
                    .unwrap_or(Value::Null),
                confidence: scores
                    .and_then(|scores| scores.get(i))
                    .and_then(Value::as_f64)
                    .unwrap_or(DEFAULT_CONFIDENCE),
            });
        }
        return;
    }

    let Some(text) = map.get("text") else {
        return;
    };
    lines.push(TextLine {
        text: value_to_text(text),
        bbox: map.get("bbox").cloned().unwrap_or(Value::Null),
        confidence: map
            .get("confidence")
            .and_then(Value::as_f64)
            .or_else(|| map.get("prob").and_then(Value::as_f64))
            .unwrap_or(DEFAULT_CONFIDENCE),
    });
}

fn line_from_pair(bbox: &Value, second: &Value) -> TextLine {
    let (text, confidence) = match second {
        Value::Array(inner) if inner.len() >= 2 => (
            value_to_text(&inner[0]),
            inner[1].as_f64().unwrap_or(DEFAULT_CONFIDENCE),
        ),
        text => (value_to_text(text), DEFAULT_CONFIDENCE),
    };
    TextLine {
        text,
        bbox: bbox.clone(),
        confidence,
    }
}

fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
