mod config;
mod db;
mod error;
mod format;
mod ocr;
mod pp_ocr;
mod tool;

pub use config::*;
pub use error::OcrError;
pub use format::*;
pub use ocr::*;
pub use pp_ocr::PPOcr;
pub use tool::OcrTool;
