//! Disposable per-attempt copies of input decks.
//!
//! Every `stage` call creates its own `stage-<uuid>` directory under the work
//! root, so retried attempts never share a file. A `StagedCopy` removes its
//! file and directory on `release` or, failing that, on drop.

use crate::{error::StagingError, validate};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;

pub struct StagingArea {
    work_root: PathBuf,
    min_bytes: u64,
}

#[derive(Debug)]
pub struct StagedCopy {
    dir: PathBuf,
    path: PathBuf,
    released: bool,
}

impl StagingArea {
    pub fn new(work_root: impl Into<PathBuf>, min_bytes: u64) -> Self {
        Self {
            work_root: work_root.into(),
            min_bytes,
        }
    }

    pub fn work_root(&self) -> &Path {
        &self.work_root
    }

    pub fn stage(&self, source: &Path) -> Result<StagedCopy, StagingError> {
        let id = Uuid::new_v4().simple().to_string();
        let dir = self.work_root.join(format!("stage-{id}"));
        let ext = source
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{e}"))
            .unwrap_or_default();
        let path = dir.join(format!("{id}{ext}"));

        info!("staging {} -> {}", source.display(), path.display());

        let result = self.populate(source, &dir, &path);
        if let Err(err) = result {
            remove_artifacts(&path, &dir);
            return Err(err);
        }

        Ok(StagedCopy {
            dir,
            path,
            released: false,
        })
    }

    fn populate(&self, source: &Path, dir: &Path, path: &Path) -> Result<(), StagingError> {
        std::fs::create_dir_all(&self.work_root).map_err(|source| StagingError::Io {
            step: "create work root",
            path: self.work_root.clone(),
            source,
        })?;
        std::fs::create_dir(dir).map_err(|source| StagingError::Io {
            step: "create stage dir",
            path: dir.to_path_buf(),
            source,
        })?;
        std::fs::copy(source, path).map_err(|e| StagingError::Io {
            step: "copy",
            path: source.to_path_buf(),
            source: e,
        })?;

        validate::inspect(path, self.min_bytes)?;

        grant_full_access(path).map_err(|source| StagingError::Io {
            step: "set permissions",
            path: path.to_path_buf(),
            source,
        })?;
        Ok(())
    }
}

#[cfg(unix)]
fn grant_full_access(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o777))
}

#[cfg(not(unix))]
fn grant_full_access(path: &Path) -> std::io::Result<()> {
    let mut perms = std::fs::metadata(path)?.permissions();
    perms.set_readonly(false);
    std::fs::set_permissions(path, perms)
}

/// File first, then its directory. Failures are logged, never returned.
fn remove_artifacts(path: &Path, dir: &Path) {
    if path.exists() {
        if let Err(err) = std::fs::remove_file(path) {
            warn!("failed to remove staged file {}: {err}", path.display());
        }
    }
    if dir.exists() {
        if let Err(err) = std::fs::remove_dir_all(dir) {
            warn!("failed to remove staging dir {}: {err}", dir.display());
        }
    }
}

impl StagedCopy {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn release(mut self) {
        self.cleanup();
    }

    fn cleanup(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        debug!("releasing staged copy {}", self.path.display());
        remove_artifacts(&self.path, &self.dir);
    }
}

impl Drop for StagedCopy {
    fn drop(&mut self) {
        self.cleanup();
    }
}
