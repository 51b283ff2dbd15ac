use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub job: Job,
    #[serde(default)]
    pub render: Render,
    #[serde(default)]
    pub ocr: Ocr,
    #[serde(default)]
    pub normalize: Normalize,
    #[serde(default)]
    pub schedule: Schedule,
    #[serde(default)]
    pub output: Output,
    #[serde(default)]
    pub logging: Logging,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config: {}", path.display()))?;
        let cfg: Config = toml::from_str(&raw).with_context(|| "parsing TOML")?;
        Ok(cfg)
    }
}

/// The document and page range processed on every invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub pdf_path: String,
    pub first_page: u32, // 1-based inclusive
    pub last_page: u32,  // 1-based inclusive
}
impl Default for Job {
    fn default() -> Self {
        Self {
            pdf_path: "run-melos.pdf".into(),
            first_page: 1,
            last_page: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Render {
    pub pdftoppm_exe: String,
    pub dpi: u32,
    pub timeout_seconds: u64,
}
impl Default for Render {
    fn default() -> Self {
        Self {
            pdftoppm_exe: "pdftoppm".into(),
            dpi: 200,
            timeout_seconds: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ocr {
    pub tesseract_exe: String,
    pub lang: String,
    #[serde(default)]
    pub psm: Option<u32>,
    #[serde(default)]
    pub extra_args: Vec<String>,
    pub timeout_seconds: u64,
    #[serde(default)]
    pub env: std::collections::BTreeMap<String, String>,
}
impl Default for Ocr {
    fn default() -> Self {
        Self {
            tesseract_exe: "tesseract".into(),
            lang: "jpn".into(),
            psm: None,
            extra_args: Vec::new(),
            timeout_seconds: 0,
            env: Default::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Normalize {
    pub unicode_nfkc: bool,
    pub remove_newlines: bool,
    pub collapse_cjk_whitespace: bool,
}
impl Default for Normalize {
    fn default() -> Self {
        Self {
            unicode_nfkc: false,
            remove_newlines: true,
            collapse_cjk_whitespace: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schedule {
    pub interval_seconds: u64,
    pub run_on_start: bool,
    /// 0 means run until the process is stopped.
    pub max_runs: u64,
    pub stop_on_error: bool,
}
impl Default for Schedule {
    fn default() -> Self {
        Self {
            interval_seconds: 3600,
            run_on_start: true,
            max_runs: 0,
            stop_on_error: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Banner,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Output {
    pub format: OutputFormat,
    pub print_summary: bool,
}
impl Default for Output {
    fn default() -> Self {
        Self {
            format: OutputFormat::Banner,
            print_summary: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Logging {
    pub level: String,
    pub json: bool,
    pub write_to_file: bool,
    pub file_path: String,
}
impl Default for Logging {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json: false,
            write_to_file: false,
            file_path: "logs/scheduled-ocr.log".into(),
        }
    }
}
