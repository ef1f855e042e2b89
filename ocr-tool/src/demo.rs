use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use ocr::{Ocr, OcrConfig, OcrTool, Recognition};
use tracing::{info, warn};

use crate::args::Args;

/// 执行结果
#[derive(Debug)]
pub enum Outcome {
    /// 图片不存在, 未执行识别
    MissingImage(PathBuf),
    Recognized(Recognition),
}

/// 合并配置文件与命令行参数
///
/// 命令行中显式指定的语言和模型目录优先
///
/// # 参数
///
/// * `args` - 命令行参数
pub fn build_config(args: &Args) -> Result<OcrConfig> {
    let mut config = match &args.config {
        Some(config_file) => {
            if !config_file.exists() {
                bail!("配置文件 {} 不存在", config_file.display());
            }
            OcrConfig::load(config_file)?
        }
        None => OcrConfig::default(),
    };

    if let Some(lang) = &args.lang {
        config.lang = lang.parse()?;
    }
    if let Some(model_dir) = &args.model_dir {
        config.model_dir = model_dir.clone();
    }
    Ok(config)
}

/// 识别命令行指定的图片
///
/// 引擎初始化失败不会中断流程, 识别时会重新尝试初始化;
/// 图片不存在时给出提示并正常返回
///
/// # 参数
///
/// * `args` - 命令行参数
/// * `config` - OCR 配置
pub fn run<E: Ocr>(args: &Args, config: OcrConfig) -> Result<Outcome> {
    let mut tool = OcrTool::<E>::lazy(config);
    if let Err(e) = tool.initialize() {
        warn!("{}, 将在识别时重试", e);
    }

    let image = &args.image;
    if !image.exists() {
        warn!("示例图片不存在: {}", image.display());
        warn!("请将图片放在当前目录, 或通过 --image 指定图片路径");
        print_conversion_guide(image);
        return Ok(Outcome::MissingImage(image.clone()));
    }

    if is_svg(image) {
        warn!("OCR 引擎无法直接识别 SVG 格式图片");
        print_conversion_guide(image);
    }

    info!("示例图片: {}", image.display());
    let recognition = tool.recognize_text(image, &args.format)?;
    Ok(Outcome::Recognized(recognition))
}

fn is_svg(image: &Path) -> bool {
    image
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("svg"))
}

/// SVG 转换提示
fn print_conversion_guide(image: &Path) {
    warn!("建议将 SVG 图片转换为 PNG 或 JPG 格式后再进行识别, 例如:");
    for line in conversion_guide(image) {
        warn!("  {}", line);
    }
}

fn conversion_guide(image: &Path) -> [String; 2] {
    let svg = image.with_extension("svg");
    let png = image.with_extension("png");
    [
        format!("convert {} {}", svg.display(), png.display()),
        format!(
            "python -c \"import cairosvg; cairosvg.svg2png(url='{}', write_to='{}')\"",
            svg.display(),
            png.display()
        ),
    ]
}
