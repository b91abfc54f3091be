use crate::util::clean_name;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::warn;
use walkdir::WalkDir;

/// A source deck found under the input directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputDocument {
    /// Absolute source path.
    pub path: PathBuf,
    /// Output folder name, derived from the file stem.
    pub name: String,
    pub bytes: u64,
}

impl InputDocument {
    pub fn from_path(path: &Path) -> Result<Self> {
        let path = std::path::absolute(path)
            .with_context(|| format!("absolute path of {}", path.display()))?;
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let bytes = std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
        Ok(Self {
            name: clean_name(&stem),
            path,
            bytes,
        })
    }
}

/// Walks `input_dir` recursively, keeping files whose extension matches one of
/// `extensions` (case-insensitive). Results are sorted by path.
pub fn discover_documents(input_dir: &Path, extensions: &[String]) -> Result<Vec<InputDocument>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(input_dir).follow_links(false) {
        let entry = entry.with_context(|| format!("walking {}", input_dir.display()))?;
        if entry.file_type().is_file() && has_extension(entry.path(), extensions) {
            files.push(entry.into_path());
        }
    }
    files.sort();

    let docs = files
        .iter()
        .map(|p| InputDocument::from_path(p))
        .collect::<Result<Vec<_>>>()?;

    let mut seen: HashMap<&str, &Path> = HashMap::new();
    for doc in &docs {
        if let Some(prev) = seen.insert(doc.name.as_str(), doc.path.as_path()) {
            warn!(
                "documents {} and {} share the output name '{}'; the later one overwrites",
                prev.display(),
                doc.path.display(),
                doc.name
            );
        }
    }
    Ok(docs)
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| extensions.iter().any(|want| want.eq_ignore_ascii_case(e)))
}
