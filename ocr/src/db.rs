//! DB (Differentiable Binarization) 文本检测后处理
//!
//! 将检测模型输出的概率图转换为原图坐标系下的文本区域

use std::collections::HashMap;

use common::{Region, region_clamp, region_expand};
use image::{GrayImage, Luma};
use imageproc::region_labelling::{Connectivity, connected_components};
use ndarray::ArrayView2;

use crate::config::DetectionConfig;

/// 同一行文本区域的最大上边缘差值 (像素)
const SAME_LINE_TOLERANCE: i32 = 10;

/// 检测到的文本区域
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectedRegion {
    pub region: Region,
    pub score: f32,
}

/// 从概率图中提取文本区域
///
/// # 参数
///
/// * `pred` - 概率图 (高 x 宽)
/// * `src_width` - 原图宽度
/// * `src_height` - 原图高度
/// * `config` - 检测参数
pub fn boxes_from_bitmap(
    pred: ArrayView2<f32>,
    src_width: u32,
    src_height: u32,
    config: &DetectionConfig,
) -> Vec<DetectedRegion> {
    let (height, width) = pred.dim();
    if height == 0 || width == 0 {
        return vec![];
    }
    let scale_x = src_width as f32 / width as f32;
    let scale_y = src_height as f32 / height as f32;

    let mut regions = Vec::new();
    for region in connected_regions(pred, config.thresh, config.max_candidates) {
        if (region.min_side() as f32) < config.min_size {
            continue;
        }

        let score = region_score(pred, &region);
        if score < config.box_thresh {
            continue;
        }

        let (w, h) = (region.width() as f32, region.height() as f32);
        let distance = w * h * config.unclip_ratio / (2.0 * (w + h));
        let region = region_expand(&region, distance.round() as i32);
        if (region.min_side() as f32) < config.min_size + 2.0 {
            continue;
        }

        let region = Region::new(
            (region.start.x as f32 * scale_x).round() as i32,
            (region.start.y as f32 * scale_y).round() as i32,
            (region.end.x as f32 * scale_x).round() as i32,
            (region.end.y as f32 * scale_y).round() as i32,
        );
        let region = region_clamp(&region, src_width as i32, src_height as i32);
        if region.width() <= 0 || region.height() <= 0 {
            continue;
        }
        regions.push(DetectedRegion { region, score });
    }
    regions
}

/// 按阅读顺序排序: 从上到下, 同一行内从左到右
pub fn sort_regions(regions: &mut [DetectedRegion]) {
    regions.sort_by_key(|r| (r.region.start.y, r.region.start.x));
    for i in 0..regions.len().saturating_sub(1) {
        for j in (0..=i).rev() {
            let (a, b) = (regions[j].region.start, regions[j + 1].region.start);
            if (b.y - a.y).abs() < SAME_LINE_TOLERANCE && b.x < a.x {
                regions.swap(j, j + 1);
            } else {
                break;
            }
        }
    }
}

/// 二值化后提取 8 连通区域的外接矩形
///
/// 区域按光栅扫描中首次出现的顺序排列, 最多保留 `max_candidates` 个
fn connected_regions(pred: ArrayView2<f32>, thresh: f32, max_candidates: usize) -> Vec<Region> {
    let (height, width) = pred.dim();
    let mask = GrayImage::from_fn(width as u32, height as u32, |x, y| {
        if pred[[y as usize, x as usize]] > thresh {
            Luma([255])
        } else {
            Luma([0])
        }
    });
    let labels = connected_components(&mask, Connectivity::Eight, Luma([0u8]));

    let mut slots: HashMap<u32, usize> = HashMap::new();
    let mut regions: Vec<Region> = Vec::new();
    for (x, y, label) in labels.enumerate_pixels() {
        let label = label[0];
        if label == 0 {
            continue;
        }

        let (x, y) = (x as i32, y as i32);
        match slots.get(&label) {
            Some(&slot) => {
                let region = &mut regions[slot];
                region.start.x = region.start.x.min(x);
                region.start.y = region.start.y.min(y);
                region.end.x = region.end.x.max(x + 1);
                region.end.y = region.end.y.max(y + 1);
            }
            None => {
                slots.insert(label, regions.len());
                regions.push(Region::new(x, y, x + 1, y + 1));
            }
        }
    }

    regions.truncate(max_candidates);
    regions
}

/// 区域内概率均值
fn region_score(pred: ArrayView2<f32>, region: &Region) -> f32 {
    let window = pred.slice(ndarray::s![
        region.start.y as usize..region.end.y as usize,
        region.start.x as usize..region.end.x as usize
    ]);
    window.mean().unwrap_or(0.0)
}
