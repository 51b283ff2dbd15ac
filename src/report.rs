use serde::{Deserialize, Serialize};

const RULE: &str = "----------------------------------------";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobReport {
    pub input: String,
    pub first_page: u32,
    pub last_page: u32,
    pub started: String,
    pub finished: String,
    pub duration_seconds: f64,
    pub pages: Vec<PageReport>,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageReport {
    pub page: u32,
    pub chars: usize,
    pub ocr_ms: u64,
}

impl JobReport {
    /// Whole seconds elapsed, truncated.
    pub fn whole_seconds(&self) -> u64 {
        self.duration_seconds.max(0.0).trunc() as u64
    }

    /// The human-readable block emitted at the end of every invocation.
    pub fn summary(&self) -> String {
        [
            RULE.to_string(),
            format!("Start: {}", self.started),
            format!("End: {}", self.finished),
            format!("Duration: {} seconds", self.whole_seconds()),
            format!("Result: {}", self.text),
            RULE.to_string(),
        ]
        .join("\n")
    }
}
