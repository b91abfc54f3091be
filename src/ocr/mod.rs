pub mod runner;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub use runner::ScriptOcr;

/// One detected text region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextLine {
    pub text: String,
    /// In `[0, 1]`.
    pub confidence: f64,
}

pub trait OcrEngine {
    fn recognize(&self, image: &Path) -> Result<Vec<TextLine>>;

    /// Recognizes several images; one result per input, in input order.
    fn recognize_many(&self, images: &[PathBuf]) -> Vec<Result<Vec<TextLine>>> {
        images.iter().map(|p| self.recognize(p)).collect()
    }
}
