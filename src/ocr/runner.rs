use super::{OcrEngine, TextLine};
use crate::{
    config::{Config, seconds},
    script,
};
use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

/// OCR through `scripts/ocr_runner.py`, one subprocess per batch of images.
pub struct ScriptOcr {
    python_exe: PathBuf,
    script: PathBuf,
    lang: String,
    use_angle_cls: bool,
    timeout: Option<Duration>,
}

#[derive(Debug, Serialize)]
struct OcrRequest<'a> {
    cmd: &'a str,
    images: Vec<String>,
    lang: &'a str,
    use_angle_cls: bool,
}

#[derive(Debug, Deserialize)]
struct OcrReply {
    ok: bool,
    #[serde(default)]
    results: Vec<ImageReply>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ImageReply {
    image: String,
    #[serde(default)]
    lines: Vec<TextLine>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrDiag {
    pub ok: bool,
    #[serde(default)]
    pub python_version: Option<String>,
    #[serde(default)]
    pub paddleocr_version: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ScriptOcr {
    pub fn new(cfg: &Config) -> Result<Self> {
        Ok(Self {
            python_exe: script::resolve_python_exe(&cfg.paths.python_exe),
            script: script::locate(cfg, &cfg.ocr.script)?,
            lang: cfg.ocr.lang.clone(),
            use_angle_cls: cfg.ocr.use_angle_cls,
            timeout: seconds(cfg.ocr.timeout_seconds),
        })
    }

    pub fn doctor(&self) -> Result<OcrDiag> {
        let req = OcrRequest {
            cmd: "doctor",
            images: Vec::new(),
            lang: &self.lang,
            use_angle_cls: self.use_angle_cls,
        };
        script::run_json(&self.python_exe, &self.script, &req, Some(Duration::from_secs(120)))
    }

    fn run(&self, images: &[PathBuf]) -> Result<Vec<ImageReply>> {
        let req = OcrRequest {
            cmd: "recognize",
            images: images.iter().map(|p| p.display().to_string()).collect(),
            lang: &self.lang,
            use_angle_cls: self.use_angle_cls,
        };
        let reply: OcrReply = script::run_json(&self.python_exe, &self.script, &req, self.timeout)?;
        if !reply.ok {
            return Err(anyhow!(
                "ocr runner error: {}",
                reply.error.unwrap_or_else(|| "unspecified".into())
            ));
        }
        if reply.results.len() != images.len() {
            return Err(anyhow!(
                "ocr runner returned {} results for {} images",
                reply.results.len(),
                images.len()
            ));
        }
        Ok(reply.results)
    }
}

impl OcrEngine for ScriptOcr {
    fn recognize(&self, image: &Path) -> Result<Vec<TextLine>> {
        let mut results = self.run(&[image.to_path_buf()])?;
        let reply = results.remove(0);
        match reply.error {
            Some(err) => Err(anyhow!("ocr failed for {}: {err}", reply.image)),
            None => Ok(reply.lines),
        }
    }

    fn recognize_many(&self, images: &[PathBuf]) -> Vec<Result<Vec<TextLine>>> {
        if images.is_empty() {
            return Vec::new();
        }
        match self.run(images) {
            Ok(results) => results
                .into_iter()
                .map(|r| match r.error {
                    Some(err) => Err(anyhow!("ocr failed for {}: {err}", r.image)),
                    None => Ok(r.lines),
                })
                .collect(),
            Err(err) => {
                warn!("batched ocr failed, retrying image by image: {err:#}");
                images.iter().map(|p| self.recognize(p)).collect()
            }
        }
    }
}
