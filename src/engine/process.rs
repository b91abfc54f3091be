//! Lifecycle of the single external engine instance.
//!
//! `EngineProcessManager::start` borrows the manager mutably for as long as
//! the returned `EngineLease` lives, so a second session cannot be started
//! while one is alive. Dropping the lease always runs `stop`.

use super::{EngineSession, ProcessTable, RenderEngine};
use crate::{config::Timings, error::EngineError, util::settle};
use anyhow::{Context, Result};
use std::ops::{Deref, DerefMut};
use std::process::{Command, Stdio};
use tracing::{debug, info, warn};

pub struct SystemProcessTable;

impl ProcessTable for SystemProcessTable {
    fn kill_by_name(&self, names: &[String]) -> Result<usize> {
        let mut matched = 0;
        for name in names {
            let status = kill_command(name)
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .with_context(|| format!("running process kill for {name}"))?;
            if status.success() {
                debug!("killed processes named {name}");
                matched += 1;
            }
        }
        Ok(matched)
    }
}

#[cfg(windows)]
fn kill_command(name: &str) -> Command {
    let mut cmd = Command::new("taskkill");
    cmd.args(["/F", "/T", "/IM", name]);
    cmd
}

#[cfg(not(windows))]
fn kill_command(name: &str) -> Command {
    let mut cmd = Command::new("pkill");
    cmd.args(["-9", "-x", name]);
    cmd
}

pub struct EngineProcessManager {
    engine: Box<dyn RenderEngine>,
    processes: Box<dyn ProcessTable>,
    process_names: Vec<String>,
    timings: Timings,
}

impl EngineProcessManager {
    pub fn new(
        engine: Box<dyn RenderEngine>,
        processes: Box<dyn ProcessTable>,
        process_names: Vec<String>,
        timings: Timings,
    ) -> Self {
        Self {
            engine,
            processes,
            process_names,
            timings,
        }
    }

    /// Kills leftover engine processes, then waits the kill settle interval.
    /// Safe to call when nothing is running.
    pub fn ensure_clean(&self) {
        match self.processes.kill_by_name(&self.process_names) {
            Ok(0) => debug!("no stale engine processes"),
            Ok(n) => info!("terminated stale engine processes ({n} name(s) matched)"),
            Err(err) => warn!("engine process sweep failed: {err:#}"),
        }
        settle(self.timings.kill_settle_ms);
    }

    pub fn start(&mut self) -> Result<EngineLease<'_>, EngineError> {
        let session = self.engine.launch()?;
        settle(self.timings.launch_settle_ms);
        info!("engine session started");
        Ok(EngineLease {
            manager: self,
            session,
        })
    }

    /// Graceful quit, then an unconditional sweep. Never fails.
    pub fn stop(&self, session: &mut dyn EngineSession) {
        if let Err(err) = session.quit() {
            warn!("engine quit failed: {err}");
        }
        settle(self.timings.quit_settle_ms);
        self.ensure_clean();
        info!("engine session stopped");
    }
}

/// A live engine session that is stopped when dropped.
pub struct EngineLease<'m> {
    manager: &'m EngineProcessManager,
    session: Box<dyn EngineSession>,
}

impl Deref for EngineLease<'_> {
    type Target = dyn EngineSession;

    fn deref(&self) -> &Self::Target {
        self.session.as_ref()
    }
}

impl DerefMut for EngineLease<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.session.as_mut()
    }
}

impl Drop for EngineLease<'_> {
    fn drop(&mut self) {
        self.manager.stop(self.session.as_mut());
    }
}
