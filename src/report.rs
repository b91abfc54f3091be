use crate::convert::ConversionOutcome;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub started: String,
    pub finished: String,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub documents: Vec<DocumentReport>,
}

impl BatchReport {
    pub fn failed_documents(&self) -> impl Iterator<Item = &DocumentReport> {
        self.documents.iter().filter(|d| !d.outcome.succeeded())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentReport {
    pub source: PathBuf,
    pub name: String,
    pub bytes: u64,
    #[serde(default)]
    pub sha256: Option<String>,
    pub started: String,
    pub finished: String,
    pub outcome: ConversionOutcome,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanReport {
    pub documents: usize,
    pub pages_scanned: usize,
    pub pages_failed: usize,
    pub pages_matched: usize,
    pub findings_written: usize,
}
