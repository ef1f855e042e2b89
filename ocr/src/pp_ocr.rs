use std::{cell::RefCell, fs, path::Path};

use anyhow::{Context, Result, anyhow, ensure};
use common::region_to_quad;
use image::{
    RgbImage,
    imageops::{self, FilterType},
};
use ndarray::{Array, Array4, ArrayView2, Axis};
use ort::{
    session::{Session, builder::GraphOptimizationLevel},
    value::TensorRef,
};
use serde_json::json;
use tracing::{debug, info};

use crate::{
    config::{DetectionConfig, OcrConfig, RecognitionConfig},
    db::{self, DetectedRegion},
    ocr::{Ocr, Prediction},
};

/// 检测模型归一化均值 (BGR)
const DET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
/// 检测模型归一化标准差 (BGR)
const DET_STD: [f32; 3] = [0.229, 0.224, 0.225];
/// CTC 空白字符下标
const BLANK_INDEX: usize = 0;

/// 基于 PaddleOCR 的 OCR 实现
///
/// 文本检测与文本识别两个 ONNX 模型
pub struct PPOcr {
    det_session: RefCell<Session>,
    rec_session: RefCell<Session>,
    character_dict: Vec<String>,
    detection: DetectionConfig,
    recognition: RecognitionConfig,
}

impl PPOcr {
    /// 加载 ONNX 模型
    ///
    /// # 参数
    ///
    /// * `model` - 模型路径
    /// * `intra_threads` - 推理线程数
    fn load_session(model: &Path, intra_threads: usize) -> Result<Session> {
        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(intra_threads)?
            .commit_from_file(model)
            .with_context(|| format!("加载模型 {} 失败", model.display()))?;
        debug!("模型 {} 加载成功", model.display());
        Ok(session)
    }

    /// 将图像转换为检测模型输入
    ///
    /// # 参数
    ///
    /// * `image` - 输入图像
    /// * `width` - 输入宽度
    /// * `height` - 输入高度
    fn detection_tensor(image: &RgbImage, width: u32, height: u32) -> Array4<f32> {
        let resized_image = imageops::resize(image, width, height, FilterType::Triangle);
        let mut input = Array::zeros((1, 3, height as usize, width as usize));

        for (x, y, pixel) in resized_image.enumerate_pixels() {
            let [r, g, b] = pixel.0;
            for (c, value) in [b, g, r].into_iter().enumerate() {
                input[[0, c, y as usize, x as usize]] =
                    (value as f32 / 255.0 - DET_MEAN[c]) / DET_STD[c];
            }
        }
        input
    }

    /// 将文本行图像转换为识别模型输入
    ///
    /// # 参数
    ///
    /// * `image` - 文本行图像
    /// * `target_height` - 输入高度
    fn recognition_tensor(image: &RgbImage, target_height: u32) -> Array4<f32> {
        let (width, height) = image.dimensions();
        let target_width =
            (((width as f32 / height as f32) * target_height as f32).ceil() as u32).max(1);

        let resized_image =
            imageops::resize(image, target_width, target_height, FilterType::Triangle);
        let mut input = Array::zeros((1, 3, target_height as usize, target_width as usize));

        for (x, y, pixel) in resized_image.enumerate_pixels() {
            let [r, g, b] = pixel.0;
            for (c, value) in [b, g, r].into_iter().enumerate() {
                input[[0, c, y as usize, x as usize]] = (value as f32 / 255.0 - 0.5) / 0.5;
            }
        }
        input
    }

    /// 检测文本区域
    fn detect(&self, image: &RgbImage) -> Result<Vec<DetectedRegion>> {
        let (width, height) = image.dimensions();
        let (input_width, input_height) =
            detection_size(width, height, self.detection.limit_side_len);

        let tensor = PPOcr::detection_tensor(image, input_width, input_height);
        let tensor = TensorRef::from_array_view(tensor.view())?;
        let mut session = self.det_session.borrow_mut();
        let outputs = session.run(ort::inputs![tensor])?;
        let (output_shape, output_data) = outputs[0].try_extract_tensor::<f32>()?;

        if output_shape.len() != 4 {
            return Err(anyhow!("意想不到的检测输出形状: {:?}", output_shape));
        }

        let map_height = output_shape[2] as usize;
        let map_width = output_shape[3] as usize;
        if output_data.len() < map_height * map_width {
            return Err(anyhow!("意想不到的检测输出长度: {}", output_data.len()));
        }

        let pred = ArrayView2::from_shape(
            (map_height, map_width),
            &output_data[..map_height * map_width],
        )
        .map_err(|e| anyhow!("转换检测输出到数组视图失败: {}", e))?;

        let mut regions = db::boxes_from_bitmap(pred, width, height, &self.detection);
        db::sort_regions(&mut regions);
        Ok(regions)
    }

    /// 识别单个文本行
    fn recognize_line(&self, image: &RgbImage) -> Result<(String, f32)> {
        let tensor = PPOcr::recognition_tensor(image, self.recognition.image_height);
        let tensor = TensorRef::from_array_view(tensor.view())?;
        let mut session = self.rec_session.borrow_mut();
        let outputs = session.run(ort::inputs![tensor])?;
        let (output_shape, output_data) = outputs[0].try_extract_tensor::<f32>()?;

        if output_shape.len() != 3 {
            return Err(anyhow!("意想不到的输出形状: {:?}", output_shape));
        }

        let batch_size_out = output_shape[0] as usize;
        let seq_len = output_shape[1] as usize;
        let num_classes = output_shape[2] as usize;
        let expected_len = batch_size_out * seq_len * num_classes;

        if output_data.len() != expected_len {
            return Err(anyhow!("意想不到的输出长度: {}", output_data.len()));
        }

        let array_view =
            ndarray::ArrayView3::from_shape((batch_size_out, seq_len, num_classes), output_data)
                .map_err(|e| anyhow!("转换输出到数组视图失败: {}", e))?;

        Ok(decode_ctc(
            array_view.index_axis(Axis(0), 0),
            &self.character_dict,
        ))
    }
}

/// 计算检测模型输入尺寸
///
/// 最长边不超过 `limit_side_len`, 每条边取整到 32 的倍数
fn detection_size(width: u32, height: u32, limit_side_len: u32) -> (u32, u32) {
    let max_side = width.max(height);
    let ratio = if max_side > limit_side_len {
        limit_side_len as f32 / max_side as f32
    } else {
        1.0
    };
    let round = |side: u32| ((side as f32 * ratio / 32.0).round() as u32 * 32).max(32);
    (round(width), round(height))
}

/// CTC 贪心解码
///
/// 去除空白字符和连续重复字符, 置信度为保留字符概率的均值
///
/// # 参数
///
/// * `preds` - 识别模型输出 (序列长度 x 类别数)
/// * `character_dict` - 字符字典
fn decode_ctc(preds: ArrayView2<f32>, character_dict: &[String]) -> (String, f32) {
    let mut text = String::new();
    let mut probs = Vec::new();
    let mut last_idx = BLANK_INDEX;

    for row in preds.outer_iter() {
        let Some((idx, &prob)) = row
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.total_cmp(b))
        else {
            continue;
        };

        if idx != BLANK_INDEX && idx != last_idx {
            // 字典之外的最后一个类别为空格
            text.push_str(character_dict.get(idx - 1).map_or(" ", String::as_str));
            probs.push(prob);
        }
        last_idx = idx;
    }

    if probs.is_empty() {
        return (String::new(), 0.0);
    }

    let confidence = probs.iter().sum::<f32>() / probs.len() as f32;
    (text.trim().to_string(), confidence)
}

impl Ocr for PPOcr {
    /// 加载检测模型, 识别模型与字符字典
    fn init(config: &OcrConfig) -> Result<Self> {
        let features = config.features;
        ensure!(!features.use_doc_orientation_classify, "暂不支持文档方向分类");
        ensure!(!features.use_doc_unwarping, "暂不支持文档扭曲矫正");
        ensure!(!features.use_textline_orientation, "暂不支持文本行方向分类");
        ensure!(!features.enable_mkldnn, "暂不支持 MKL-DNN 加速");

        info!(
            "加载 PP-OCR 模型, 语言: {}, 模型目录: {}",
            config.lang,
            config.model_dir.display()
        );

        let dict_path = config.character_dict();
        let character_dict: Vec<String> = fs::read_to_string(&dict_path)
            .with_context(|| format!("读取字符字典 {} 失败", dict_path.display()))?
            .lines()
            .map(String::from)
            .collect();
        ensure!(!character_dict.is_empty(), "字符字典 {} 为空", dict_path.display());

        let det_session = PPOcr::load_session(&config.detection_model(), config.intra_threads)?;
        let rec_session = PPOcr::load_session(&config.recognition_model(), config.intra_threads)?;

        debug!("PP-OCR 模型加载成功, 字典字符数: {}", character_dict.len());

        Ok(PPOcr {
            det_session: RefCell::new(det_session),
            rec_session: RefCell::new(rec_session),
            character_dict,
            detection: config.detection.clone(),
            recognition: config.recognition.clone(),
        })
    }

    /// 检测并识别图像中的所有文本行
    fn predict(&self, image_path: &Path) -> Result<Prediction> {
        let image = image::open(image_path)
            .with_context(|| format!("读取图片 {} 失败", image_path.display()))?
            .to_rgb8();

        let regions = self.detect(&image)?;
        debug!("检测到 {} 个文本区域", regions.len());

        let mut rec_texts = Vec::new();
        let mut rec_scores = Vec::new();
        let mut rec_boxes = Vec::new();
        let mut rec_polys = Vec::new();

        for DetectedRegion { region, score: box_score } in regions {
            let line_image = imageops::crop_imm(
                &image,
                region.start.x as u32,
                region.start.y as u32,
                region.width() as u32,
                region.height() as u32,
            )
            .to_image();

            let (text, score) = self.recognize_line(&line_image)?;
            if text.is_empty() || score < self.recognition.score_thresh {
                debug!("丢弃识别结果: {:?}, 置信度: {}", text, score);
                continue;
            }

            debug!("识别结果: {}, 置信度: {}, 检测得分: {}", text, score, box_score);
            rec_texts.push(text);
            rec_scores.push(score);
            rec_boxes.push([region.start.x, region.start.y, region.end.x, region.end.y]);
            rec_polys.push(region_to_quad(&region).map(|p| [p.x, p.y]));
        }

        Ok(json!([{
            "input_path": image_path.display().to_string(),
            "rec_texts": rec_texts,
            "rec_scores": rec_scores,
            "rec_boxes": rec_boxes,
            "rec_polys": rec_polys,
        }]))
    }
}

#[cfg(test)]
mod tests {
    use ndarray::Array2;

    use super::*;
    use crate::config::FeatureToggles;

    fn init_error(config: &OcrConfig) -> String {
        match PPOcr::init(config) {
            Ok(_) => panic!("初始化不应成功"),
            Err(e) => e.to_string(),
        }
    }

    #[test]
    fn test_detection_size() {
        assert_eq!(detection_size(1920, 1080, 960), (960, 544));
        assert_eq!(detection_size(100, 50, 960), (96, 64));
        assert_eq!(detection_size(10, 10, 960), (32, 32));
    }

    #[test]
    fn test_decode_ctc() {
        let dict = vec!["宗".to_string(), "室".to_string()];
        // 每行最大值下标依次为: 1, 1, 0, 1, 2, 0
        let preds = Array2::from_shape_vec(
            (6, 3),
            vec![
                0.1, 0.8, 0.1, //
                0.1, 0.6, 0.3, //
                0.9, 0.05, 0.05, //
                0.2, 0.7, 0.1, //
                0.1, 0.2, 0.7, //
                0.8, 0.1, 0.1,
            ],
        )
        .unwrap();
        let (text, confidence) = decode_ctc(preds.view(), &dict);
        assert_eq!(text, "宗宗室");
        assert!((confidence - (0.8 + 0.7 + 0.7) / 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_decode_ctc_blank_only() {
        let preds = Array2::from_shape_vec((2, 2), vec![0.9, 0.1, 0.7, 0.3]).unwrap();
        assert_eq!(decode_ctc(preds.view(), &["a".to_string()]), (String::new(), 0.0));
    }

    #[test]
    fn test_decode_ctc_space_class() {
        let dict = vec!["a".to_string()];
        let preds = Array2::from_shape_vec(
            (3, 3),
            vec![0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 1.0, 0.0],
        )
        .unwrap();
        assert_eq!(decode_ctc(preds.view(), &dict).0, "a a");
    }

    #[test]
    fn test_recognition_tensor_shape() {
        let image = RgbImage::from_pixel(100, 20, image::Rgb([255, 0, 0]));
        let tensor = PPOcr::recognition_tensor(&image, 48);
        assert_eq!(tensor.shape(), &[1, 3, 48, 240]);
        // BGR 顺序, 红色位于第 2 通道
        assert_eq!(tensor[[0, 2, 10, 10]], 1.0);
        assert_eq!(tensor[[0, 0, 10, 10]], -1.0);
    }

    #[test]
    fn test_init_rejects_enabled_features() {
        let config = OcrConfig {
            features: FeatureToggles {
                enable_mkldnn: true,
                ..FeatureToggles::default()
            },
            ..OcrConfig::default()
        };
        assert_eq!(init_error(&config), "暂不支持 MKL-DNN 加速");
    }

    #[test]
    fn test_init_without_models() {
        let config = OcrConfig {
            model_dir: "no-such-models".into(),
            ..OcrConfig::default()
        };
        assert!(init_error(&config).starts_with("读取字符字典"));
    }
}
