use std::path::PathBuf;

use clap::Parser;
use tracing::Level;

/// OCR 工具: 识别图片中的文字内容
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// 待识别的图片路径
    #[arg(short, long, default_value = "example_image.png")]
    pub image: PathBuf,

    /// 识别语言, 多种语言以 + 连接, 例如 ch+en
    #[arg(short = 'L', long)]
    pub lang: Option<String>,

    /// 输出格式 (dict, text)
    #[arg(short, long, default_value = "dict")]
    pub format: String,

    /// 模型目录
    #[arg(short, long)]
    pub model_dir: Option<PathBuf>,

    /// 配置文件路径 (YAML)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// 日志等级 (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    pub log_level: Option<Level>,

    /// 日志文件路径, 不指定时只输出到控制台
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// 追加日志到文件
    #[arg(long, default_value_t = false)]
    pub append_log: bool,
}

impl Args {
    /// 创建命令行参数解析器
    pub fn new() -> Self {
        Self::parse()
    }
}
