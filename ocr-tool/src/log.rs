use std::fs::OpenOptions;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::Level;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::filter::Targets;
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::prelude::__tracing_subscriber_SubscriberExt;
use tracing_subscriber::{Layer, fmt, registry};

use crate::args::Args;

/// 日志时间格式
const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

fn timer() -> ChronoLocal {
    ChronoLocal::new(TIME_FORMAT.to_string())
}

/// 日志过滤器, `ort` 只输出错误日志
fn targets(level: Level) -> Targets {
    Targets::new()
        .with_default(LevelFilter::from_level(level))
        .with_target("ort", LevelFilter::ERROR)
}

/// 打开日志文件
///
/// # 参数
///
/// * `log_file` - 日志文件路径
/// * `append` - 是否追加写入
fn open_log_file(log_file: &Path, append: bool) -> Result<std::fs::File> {
    OpenOptions::new()
        .write(true)
        .append(append)
        .truncate(!append)
        .create(true)
        .open(log_file)
        .with_context(|| format!("打开日志文件 {} 失败", log_file.display()))
}

/// 初始化日志记录器
///
/// 控制台始终输出, 指定日志文件时同时写入文件
///
/// # 参数
///
/// * `args` - 命令行参数
pub fn init_log(args: &Args) -> Result<()> {
    let filter = targets(args.log_level.unwrap_or(Level::INFO));

    let console_layer = fmt::layer()
        .with_ansi(true)
        .with_timer(timer())
        .with_filter(filter.clone());

    let file_layer = match &args.log_file {
        Some(log_file) => Some(
            fmt::layer()
                .with_writer(open_log_file(log_file, args.append_log)?)
                .with_ansi(false)
                .with_timer(timer())
                .with_filter(filter),
        ),
        None => None,
    };

    let subscriber = registry().with(console_layer).with(file_layer);
    tracing::subscriber::set_global_default(subscriber).context("设置全局日志记录器失败")?;

    Ok(())
}
