use std::{
    fs::{self, canonicalize},
    path::PathBuf,
};

use anyhow::{Context, Result};
use ocr::{OcrConfig, StructuredResult};
use schemars::schema_for;

const VSCODE_DIR: &str = "../.vscode";

fn main() -> Result<()> {
    let vscode_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join(VSCODE_DIR);
    fs::create_dir_all(&vscode_dir)?;
    let vscode_dir = canonicalize(vscode_dir).context("定位 .vscode 目录失败")?;

    let config_schema = serde_json::to_string_pretty(&schema_for!(OcrConfig))?;
    fs::write(vscode_dir.join("ocr_config.schema.json"), config_schema)?;

    let result_schema = serde_json::to_string_pretty(&schema_for!(StructuredResult))?;
    fs::write(
        vscode_dir.join("structured_result.schema.json"),
        result_schema,
    )?;
    Ok(())
}
