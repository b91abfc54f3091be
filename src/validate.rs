//! Cheap read-only probe that rejects files the engine should never see.

use crate::error::ValidationError;
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::Path;
use tracing::debug;

/// Compound File Binary header used by legacy `.ppt` decks.
pub const OLE2_SIGNATURE: [u8; 8] = [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];
/// ZIP local file header used by `.pptx` decks.
pub const ZIP_SIGNATURE: [u8; 4] = *b"PK\x03\x04";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContainerFormat {
    Legacy,
    Modern,
}

impl ContainerFormat {
    pub fn detect(header: &[u8]) -> Option<Self> {
        if header.starts_with(&OLE2_SIGNATURE) {
            Some(Self::Legacy)
        } else if header.starts_with(&ZIP_SIGNATURE) {
            Some(Self::Modern)
        } else {
            None
        }
    }
}

pub fn inspect(path: &Path, min_bytes: u64) -> Result<ContainerFormat, ValidationError> {
    let meta = match std::fs::metadata(path) {
        Ok(meta) if meta.is_file() => meta,
        Ok(_) => {
            return Err(ValidationError::NotFound {
                path: path.to_path_buf(),
            });
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ValidationError::NotFound {
                path: path.to_path_buf(),
            });
        }
        Err(source) => {
            return Err(ValidationError::Unreadable {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    if meta.len() < min_bytes {
        return Err(ValidationError::TooSmall {
            path: path.to_path_buf(),
            bytes: meta.len(),
            min: min_bytes,
        });
    }

    let mut header = Vec::with_capacity(OLE2_SIGNATURE.len());
    std::fs::File::open(path)
        .and_then(|f| f.take(OLE2_SIGNATURE.len() as u64).read_to_end(&mut header))
        .map_err(|source| ValidationError::Unreadable {
            path: path.to_path_buf(),
            source,
        })?;

    ContainerFormat::detect(&header).ok_or_else(|| ValidationError::UnknownSignature {
        path: path.to_path_buf(),
        magic: header,
    })
}

/// Never errors; any problem is reported as `false`.
pub fn validate(path: &Path, min_bytes: u64) -> bool {
    match inspect(path, min_bytes) {
        Ok(format) => {
            debug!("validated {} as {:?}", path.display(), format);
            true
        }
        Err(err) => {
            debug!("validation rejected: {err}");
            false
        }
    }
}
