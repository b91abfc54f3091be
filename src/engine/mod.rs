pub mod bridge;
pub mod process;
pub mod types;

use crate::error::EngineError;
use anyhow::Result;
use std::path::Path;

pub use process::{EngineLease, EngineProcessManager, SystemProcessTable};
pub use types::DocumentHandle;

/// Something that can bring up a fresh presentation application instance,
/// already configured to suppress alerts and stay hidden.
pub trait RenderEngine {
    fn launch(&self) -> Result<Box<dyn EngineSession>, EngineError>;
}

/// One live application instance.
pub trait EngineSession {
    /// Opens read-only, without a window.
    fn open(&mut self, path: &Path) -> Result<DocumentHandle, EngineError>;
    fn page_count(&mut self, doc: &DocumentHandle) -> Result<u32, EngineError>;
    /// `index` is 1-based.
    fn export_page(
        &mut self,
        doc: &DocumentHandle,
        index: u32,
        dest: &Path,
    ) -> Result<(), EngineError>;
    fn close(&mut self, doc: DocumentHandle) -> Result<(), EngineError>;
    fn quit(&mut self) -> Result<(), EngineError>;
}

/// The OS process table, narrowed to what the pipeline needs.
pub trait ProcessTable {
    /// Forcibly kills every process whose image name matches one of `names`.
    /// Returns how many names had a match. Absence of a match is not an error.
    fn kill_by_name(&self, names: &[String]) -> Result<usize>;
}
