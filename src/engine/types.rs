use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDiag {
    pub exe: String,
    pub ok: bool,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineDiag {
    pub pdftoppm: ToolDiag,
    pub tesseract: ToolDiag,
    pub lang: String,
    pub lang_installed: bool,
    pub ok: bool,
}

/// A rasterized page waiting for OCR.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageImage {
    pub page: u32, // 1-based
    pub path: PathBuf,
}
