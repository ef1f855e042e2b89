use anyhow::Result;
use ocr::{PPOcr, Recognition};
use tracing::{error, info};

use crate::demo::Outcome;
use crate::log::init_log;
use crate::{args::Args, demo::build_config};

mod args;
mod demo;
mod log;

/// 打印识别结果
fn print_recognition(recognition: &Recognition) -> Result<()> {
    match recognition {
        Recognition::Structured(result) if result.is_empty() => println!("未识别到任何文字"),
        Recognition::Text(text) if text.is_empty() => println!("未识别到任何文字"),
        Recognition::Structured(result) => {
            info!("识别到 {} 段文字", result.len());
            println!("{}", serde_json::to_string_pretty(result)?);
        }
        Recognition::Text(text) => println!("{}", text),
    }
    Ok(())
}

/// 程序入口
fn application() -> Result<()> {
    let args = Args::new();

    init_log(&args)?;

    info!("欢迎使用 OCR 工具");

    let config = build_config(&args)?;
    match demo::run::<PPOcr>(&args, config)? {
        Outcome::MissingImage(_) => {}
        Outcome::Recognized(recognition) => print_recognition(&recognition)?,
    }
    Ok(())
}

fn main() {
    match application() {
        Ok(_) => info!("程序已执行完毕"),
        Err(e) => {
            error!("程序存在异常: {:?}", e);
            std::process::exit(1);
        }
    }
}
