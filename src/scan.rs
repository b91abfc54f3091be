//! Second pass over exported page images: OCR, keyword matching, findings.

use crate::{
    config::Config,
    ocr::{OcrEngine, TextLine},
    report::ScanReport,
    util::ensure_dir,
};
use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Question-type labels searched for in recognized text.
pub const TARGET_KEYWORDS: [&str; 10] = [
    "单选题", "判断题", "填空题", "多选题", "简答题", "论述题", "计算题", "分析题", "应用题", "综合题",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognitionRecord {
    pub texts: Vec<TextLine>,
    pub found_keywords: Vec<String>,
    pub contains_target: bool,
}

impl RecognitionRecord {
    pub fn from_lines(texts: Vec<TextLine>, keywords: &[&str]) -> Self {
        let found_keywords = match_keywords(&texts, keywords);
        Self {
            contains_target: !found_keywords.is_empty(),
            found_keywords,
            texts,
        }
    }
}

/// Keywords contained in any line, each once, in order of first appearance.
pub fn match_keywords(lines: &[TextLine], keywords: &[&str]) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    for line in lines {
        for kw in keywords {
            if line.text.contains(kw) && !found.iter().any(|f| f == kw) {
                found.push((*kw).to_string());
            }
        }
    }
    found
}

pub fn finding_file_name(keyword: &str, document: &str, page_label: &str) -> String {
    format!("{keyword}-{document}-{page_label}.png")
}

#[derive(Debug, Clone)]
pub struct PageImage {
    pub file_name: String,
    pub path: PathBuf,
    /// Page number for `slide_<N>.png`, otherwise the file stem.
    pub label: String,
    page: Option<u32>,
}

fn slide_pattern() -> &'static Regex {
    static SLIDE: OnceLock<Regex> = OnceLock::new();
    SLIDE.get_or_init(|| Regex::new(r"^slide_(\d+)\.png$").expect("valid slide pattern"))
}

/// `.png` files in `folder`, numbered slides first in page order.
pub fn list_page_images(folder: &Path) -> Result<Vec<PageImage>> {
    let mut pages = Vec::new();
    for entry in std::fs::read_dir(folder).with_context(|| format!("read_dir {}", folder.display()))? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let file_name = entry.file_name().to_string_lossy().into_owned();
        if !file_name.to_ascii_lowercase().ends_with(".png") {
            continue;
        }
        let page = slide_pattern()
            .captures(&file_name)
            .and_then(|c| c[1].parse::<u32>().ok());
        let label = match page {
            Some(n) => n.to_string(),
            None => Path::new(&file_name)
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default(),
        };
        pages.push(PageImage {
            path: entry.path(),
            file_name,
            label,
            page,
        });
    }
    pages.sort_by(|a, b| match (a.page, b.page) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => a.file_name.cmp(&b.file_name),
    });
    Ok(pages)
}

#[derive(Debug, Clone, Default)]
pub struct DocumentScan {
    pub name: String,
    pub records: BTreeMap<String, RecognitionRecord>,
    pub findings: Vec<PathBuf>,
    pub failed_pages: Vec<String>,
}

pub struct RecognitionScanner<'a> {
    ocr: &'a dyn OcrEngine,
    findings_dir: PathBuf,
    results_filename: String,
    keywords: &'a [&'a str],
}

impl<'a> RecognitionScanner<'a> {
    pub fn new(cfg: &Config, ocr: &'a dyn OcrEngine) -> Self {
        Self {
            ocr,
            findings_dir: cfg.findings_dir(),
            results_filename: cfg.ocr.results_filename.clone(),
            keywords: &TARGET_KEYWORDS,
        }
    }

    pub fn findings_dir(&self) -> &Path {
        &self.findings_dir
    }

    /// Scans every document folder under `output_root`, in name order.
    pub fn scan_all(&self, output_root: &Path) -> Result<ScanReport> {
        ensure_dir(&self.findings_dir).with_context(|| "creating findings directory")?;

        let mut folders = Vec::new();
        for entry in std::fs::read_dir(output_root)
            .with_context(|| format!("read_dir {}", output_root.display()))?
        {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                folders.push(entry.path());
            }
        }
        folders.sort();

        let mut report = ScanReport::default();
        for folder in &folders {
            match self.scan_document(folder) {
                Ok(scan) => {
                    report.documents += 1;
                    report.pages_scanned += scan.records.len();
                    report.pages_failed += scan.failed_pages.len();
                    report.pages_matched +=
                        scan.records.values().filter(|r| r.contains_target).count();
                    report.findings_written += scan.findings.len();
                }
                Err(err) => warn!("scan failed for {}: {err:#}", folder.display()),
            }
        }
        info!(
            "scan finished: {} documents, {} pages, {} findings",
            report.documents, report.pages_scanned, report.findings_written
        );
        Ok(report)
    }

    /// Scans one document folder and rewrites its results file.
    pub fn scan_document(&self, folder: &Path) -> Result<DocumentScan> {
        let name = folder
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        ensure_dir(&self.findings_dir)?;

        let pages = list_page_images(folder)?;
        let paths: Vec<PathBuf> = pages.iter().map(|p| p.path.clone()).collect();
        let recognized = self.ocr.recognize_many(&paths);

        let mut scan = DocumentScan {
            name: name.clone(),
            ..DocumentScan::default()
        };

        for (page, result) in pages.iter().zip(recognized) {
            info!("OCR {}", page.path.display());
            let lines = match result {
                Ok(lines) => lines,
                Err(err) => {
                    warn!("OCR failed for {}: {err:#}", page.path.display());
                    scan.failed_pages.push(page.file_name.clone());
                    continue;
                }
            };

            let record = RecognitionRecord::from_lines(lines, self.keywords);
            for keyword in &record.found_keywords {
                let dest = self
                    .findings_dir
                    .join(finding_file_name(keyword, &name, &page.label));
                match std::fs::copy(&page.path, &dest) {
                    Ok(_) => {
                        info!("found '{keyword}', copied to {}", dest.display());
                        scan.findings.push(dest);
                    }
                    Err(err) => warn!(
                        "found '{keyword}' but copy {} -> {} failed: {err}",
                        page.path.display(),
                        dest.display()
                    ),
                }
            }
            scan.records.insert(page.file_name.clone(), record);
        }

        let results_path = folder.join(&self.results_filename);
        std::fs::write(&results_path, serde_json::to_string_pretty(&scan.records)?)
            .with_context(|| format!("writing {}", results_path.display()))?;
        info!("OCR results saved to {}", results_path.display());

        Ok(scan)
    }
}
