//! Typed failures for the conversion pipeline.
//!
//! Page-level problems stay inside an attempt; attempt-level problems feed the
//! retry loop; validation and staging problems end a document immediately.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("file not found: '{path}'")]
    NotFound { path: PathBuf },

    #[error("cannot read '{path}': {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("'{path}' is {bytes} bytes, below the {min} byte minimum")]
    TooSmall { path: PathBuf, bytes: u64, min: u64 },

    #[error("'{path}' is not a presentation container; leading bytes {magic:02X?}")]
    UnknownSignature { path: PathBuf, magic: Vec<u8> },
}

#[derive(Debug, Error)]
pub enum StagingError {
    #[error("staging step '{step}' failed for '{path}': {source}")]
    Io {
        step: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("staged copy failed re-validation: {0}")]
    Invalid(#[from] ValidationError),
}

/// Failures reported by the rendering engine boundary.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("engine launch failed: {0}")]
    Launch(String),

    #[error("engine operation '{op}' timed out after {after:?}")]
    Timeout { op: &'static str, after: Duration },

    #[error("engine session is gone: {0}")]
    Disconnected(String),

    #[error("engine protocol error: {0}")]
    Protocol(String),

    #[error("engine operation '{op}' failed: {message}")]
    Operation { op: &'static str, message: String },
}

impl EngineError {
    /// Whether the session can no longer be trusted for further requests.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, EngineError::Operation { .. })
    }
}

/// Why one open/export/close cycle failed.
#[derive(Debug, Error)]
pub enum AttemptError {
    #[error("launch: {0}")]
    Launch(#[source] EngineError),

    #[error("open: {0}")]
    Open(#[source] EngineError),

    #[error("page enumeration: {0}")]
    PageCount(#[source] EngineError),

    #[error("output folder '{path}': {source}")]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("export aborted at page {page}: {source}")]
    Export {
        page: u32,
        #[source]
        source: EngineError,
    },

    #[error("close: {0}")]
    Close(#[source] EngineError),

    #[error("no pages exported out of {total}")]
    NoPagesExported { total: u32 },
}
