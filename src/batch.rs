//! Sequential conversion of every discovered deck.

use crate::{
    config::Config,
    convert::Converter,
    discover::InputDocument,
    report::{BatchReport, DocumentReport},
    util::{ensure_dir, hash_file, now_rfc3339, settle},
};
use anyhow::{Context, Result};
use tracing::{info, warn};

pub struct BatchRunner {
    cfg: Config,
    converter: Converter,
}

impl BatchRunner {
    pub fn new(cfg: &Config, converter: Converter) -> Self {
        Self {
            cfg: cfg.clone(),
            converter,
        }
    }

    /// Converts `docs` in order, one engine session at a time. Only failing to
    /// create the top-level directories is an error; per-document failures
    /// are recorded in the report.
    pub fn run(&mut self, docs: &[InputDocument]) -> Result<BatchReport> {
        ensure_dir(self.converter.output_root()).with_context(|| "creating output directory")?;
        ensure_dir(&self.cfg.work_dir()).with_context(|| "creating work directory")?;

        let started = now_rfc3339();
        self.converter.manager().ensure_clean();

        let mut documents = Vec::with_capacity(docs.len());
        for (i, doc) in docs.iter().enumerate() {
            info!(
                "converting [{}/{}] {}",
                i + 1,
                docs.len(),
                doc.path.display()
            );
            let doc_started = now_rfc3339();
            let sha256 = match hash_file(&doc.path) {
                Ok(h) => Some(h),
                Err(err) => {
                    warn!("could not hash {}: {err:#}", doc.path.display());
                    None
                }
            };

            let outcome = self.converter.convert(doc);
            info!(
                "{} {}",
                if outcome.succeeded() { "ok" } else { "FAILED" },
                doc.name
            );

            documents.push(DocumentReport {
                source: doc.path.clone(),
                name: doc.name.clone(),
                bytes: doc.bytes,
                sha256,
                started: doc_started,
                finished: now_rfc3339(),
                outcome,
            });

            if i + 1 < docs.len() {
                settle(self.cfg.timings.between_documents_ms);
            }
        }

        let succeeded = documents.iter().filter(|d| d.outcome.succeeded()).count();
        let report = BatchReport {
            started,
            finished: now_rfc3339(),
            total: documents.len(),
            succeeded,
            failed: documents.len() - succeeded,
            documents,
        };
        info!("conversion finished: {}/{} succeeded", report.succeeded, report.total);

        if self.cfg.conversion.write_report_json {
            let path = self
                .converter
                .output_root()
                .join(&self.cfg.conversion.report_filename);
            match serde_json::to_string_pretty(&report) {
                Ok(raw) => {
                    if let Err(err) = std::fs::write(&path, raw) {
                        warn!("failed to write {}: {err}", path.display());
                    }
                }
                Err(err) => warn!("failed to serialize conversion report: {err}"),
            }
        }

        Ok(report)
    }
}
