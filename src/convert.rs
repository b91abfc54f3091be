//! Drives one deck through open, per-page export and close, with retries.
//!
//! Each attempt stages a fresh copy, leases a fresh engine session and
//! releases both before the next attempt begins. Page export is best-effort:
//! a page that fails is skipped, and only failures to launch, open, enumerate
//! or close (or a session-ending engine error) fail the attempt.

use crate::{
    config::{Config, Timings},
    discover::InputDocument,
    engine::EngineProcessManager,
    error::AttemptError,
    staging::StagingArea,
    util::settle,
    validate,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

pub fn page_file_name(index: u32) -> String {
    format!("slide_{index}.png")
}

fn is_page_file(name: &str) -> bool {
    name.strip_prefix("slide_")
        .and_then(|rest| rest.strip_suffix(".png"))
        .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
}

/// Removes `slide_<N>.png` files from `output_dir`. Other files are kept.
pub fn clear_page_images(output_dir: &Path) -> std::io::Result<usize> {
    let entries = match std::fs::read_dir(output_dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(err) => return Err(err),
    };
    let mut removed = 0;
    for entry in entries {
        let entry = entry?;
        if entry.file_type()?.is_file() && is_page_file(&entry.file_name().to_string_lossy()) {
            std::fs::remove_file(entry.path())?;
            removed += 1;
        }
    }
    Ok(removed)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageTally {
    pub total: u32,
    pub exported: Vec<u32>,
    pub failed: Vec<u32>,
}

impl PageTally {
    pub fn success_count(&self) -> u32 {
        self.exported.len() as u32
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ConversionOutcome {
    Converted {
        attempts: u32,
        output_dir: PathBuf,
        pages: PageTally,
    },
    /// Failed validation; nothing was staged or launched.
    Rejected { reason: String },
    /// Staging is structural, so it is not retried.
    StagingFailed { attempt: u32, reason: String },
    Exhausted { attempts: u32, last_error: String },
}

impl ConversionOutcome {
    pub fn succeeded(&self) -> bool {
        matches!(self, ConversionOutcome::Converted { .. })
    }

    pub fn attempts(&self) -> u32 {
        match self {
            ConversionOutcome::Converted { attempts, .. } => *attempts,
            ConversionOutcome::Rejected { .. } => 0,
            ConversionOutcome::StagingFailed { attempt, .. } => *attempt,
            ConversionOutcome::Exhausted { attempts, .. } => *attempts,
        }
    }
}

pub struct Converter {
    manager: EngineProcessManager,
    staging: StagingArea,
    output_root: PathBuf,
    min_bytes: u64,
    max_retries: u32,
    require_exported_pages: bool,
    timings: Timings,
}

impl Converter {
    pub fn new(cfg: &Config, manager: EngineProcessManager) -> Self {
        let output_root = cfg.output_dir();
        let output_root = std::path::absolute(&output_root).unwrap_or(output_root);
        Self {
            manager,
            staging: StagingArea::new(cfg.work_dir(), cfg.validation.min_bytes),
            output_root,
            min_bytes: cfg.validation.min_bytes,
            max_retries: cfg.conversion.max_retries.max(1),
            require_exported_pages: cfg.conversion.require_exported_pages,
            timings: cfg.timings.clone(),
        }
    }

    pub fn manager(&self) -> &EngineProcessManager {
        &self.manager
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    pub fn convert(&mut self, doc: &InputDocument) -> ConversionOutcome {
        let source = std::path::absolute(&doc.path).unwrap_or_else(|_| doc.path.clone());
        if let Err(err) = validate::inspect(&source, self.min_bytes) {
            error!("rejecting {}: {err}", source.display());
            return ConversionOutcome::Rejected {
                reason: err.to_string(),
            };
        }

        let output_dir = self.output_root.join(&doc.name);
        let mut last_error = String::new();

        for attempt in 1..=self.max_retries {
            self.manager.ensure_clean();

            let staged = match self.staging.stage(&source) {
                Ok(staged) => staged,
                Err(err) => {
                    error!("staging failed for {}: {err}", source.display());
                    return ConversionOutcome::StagingFailed {
                        attempt,
                        reason: err.to_string(),
                    };
                }
            };

            let result = run_attempt(
                &mut self.manager,
                staged.path(),
                &output_dir,
                &self.timings,
                self.require_exported_pages,
            );
            staged.release();

            match result {
                Ok(pages) => {
                    info!(
                        "converted {}: {}/{} pages",
                        doc.name,
                        pages.success_count(),
                        pages.total
                    );
                    return ConversionOutcome::Converted {
                        attempts: attempt,
                        output_dir,
                        pages,
                    };
                }
                Err(err) => {
                    error!(
                        "conversion attempt {attempt}/{} failed for {}: {err}",
                        self.max_retries, doc.name
                    );
                    last_error = err.to_string();
                    discard_pages(&output_dir);
                    if attempt < self.max_retries {
                        settle(self.timings.retry_backoff_ms);
                    }
                }
            }
        }

        // Only succeeds when no files remain.
        let _ = std::fs::remove_dir(&output_dir);
        ConversionOutcome::Exhausted {
            attempts: self.max_retries,
            last_error,
        }
    }
}

fn discard_pages(output_dir: &Path) {
    match clear_page_images(output_dir) {
        Ok(0) => {}
        Ok(n) => info!("discarded {n} page image(s) from {}", output_dir.display()),
        Err(err) => warn!("clearing {} failed: {err}", output_dir.display()),
    }
}

/// One open/export/close cycle. The lease stops the engine on every return path.
fn run_attempt(
    manager: &mut EngineProcessManager,
    staged: &Path,
    output_dir: &Path,
    timings: &Timings,
    require_exported_pages: bool,
) -> Result<PageTally, AttemptError> {
    let mut session = manager.start().map_err(AttemptError::Launch)?;

    info!("opening {}", staged.display());
    let doc = session.open(staged).map_err(AttemptError::Open)?;
    settle(timings.open_settle_ms);

    std::fs::create_dir_all(output_dir).map_err(|source| AttemptError::Output {
        path: output_dir.to_path_buf(),
        source,
    })?;

    clear_page_images(output_dir).map_err(|source| AttemptError::Output {
        path: output_dir.to_path_buf(),
        source,
    })?;

    let total = session.page_count(&doc).map_err(AttemptError::PageCount)?;
    let mut pages = PageTally {
        total,
        ..PageTally::default()
    };

    for index in 1..=total {
        let dest = output_dir.join(page_file_name(index));
        match session.export_page(&doc, index, &dest) {
            Ok(()) => {
                pages.exported.push(index);
                settle(timings.page_settle_ms);
            }
            Err(err) if err.is_fatal() => {
                return Err(AttemptError::Export {
                    page: index,
                    source: err,
                });
            }
            Err(err) => {
                warn!("page {index}/{total} export failed: {err}");
                pages.failed.push(index);
            }
        }
    }

    settle(timings.close_settle_ms);
    session.close(doc).map_err(AttemptError::Close)?;

    if require_exported_pages && total > 0 && pages.exported.is_empty() {
        return Err(AttemptError::NoPagesExported { total });
    }
    Ok(pages)
}
