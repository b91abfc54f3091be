//! Presentation application driven through `scripts/slide_bridge.py`.
//!
//! The helper hosts the application's automation object and answers one JSON
//! line per request. Every request is bounded by the timeout configured for
//! its operation; a timeout leaves the session unusable and is fatal.

use super::types::{BridgeReply, BridgeRequest, DocumentHandle};
use super::{EngineSession, RenderEngine};
use crate::{
    config::{Config, Timeouts, seconds},
    error::EngineError,
    script,
};
use anyhow::Result;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

pub struct BridgeEngine {
    python_exe: PathBuf,
    script: PathBuf,
    timeouts: Timeouts,
    display_alerts: bool,
    visible: bool,
    export_format: String,
    keep_stderr: bool,
}

impl BridgeEngine {
    pub fn new(cfg: &Config) -> Result<Self> {
        let script = script::locate(cfg, &cfg.engine.bridge_script)?;
        Ok(Self {
            python_exe: script::resolve_python_exe(&cfg.paths.python_exe),
            script,
            timeouts: cfg.timeouts.clone(),
            display_alerts: cfg.engine.display_alerts,
            visible: cfg.engine.visible,
            export_format: cfg.engine.export_format.clone(),
            keep_stderr: cfg.engine.keep_bridge_stderr,
        })
    }

    pub fn python_exe(&self) -> &Path {
        &self.python_exe
    }

    pub fn script(&self) -> &Path {
        &self.script
    }

    /// Flags passed to the bridge script after its path.
    pub fn launch_flags(&self) -> Vec<&'static str> {
        let mut flags = Vec::new();
        if !self.display_alerts {
            flags.push("--no-alerts");
        }
        if !self.visible {
            flags.push("--hidden");
        }
        flags
    }
}

impl RenderEngine for BridgeEngine {
    fn launch(&self) -> Result<Box<dyn EngineSession>, EngineError> {
        let mut cmd = Command::new(&self.python_exe);
        cmd.arg(&self.script);
        cmd.args(self.launch_flags());
        cmd.env("PYTHONIOENCODING", "utf-8");
        cmd.env("PYTHONUNBUFFERED", "1");
        cmd.stdin(Stdio::piped());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(|e| {
            EngineError::Launch(format!("spawning {}: {e}", self.script.display()))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| EngineError::Launch("bridge has no stdin".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| EngineError::Launch("bridge has no stdout".into()))?;

        let (tx, replies) = mpsc::channel();
        std::thread::spawn(move || {
            for line in BufReader::new(stdout).lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
        });

        if let Some(stderr) = child.stderr.take() {
            let keep = self.keep_stderr;
            std::thread::spawn(move || {
                for line in BufReader::new(stderr).lines() {
                    let Ok(line) = line else { break };
                    if keep {
                        debug!("bridge stderr: {line}");
                    }
                }
            });
        }

        let mut session = BridgeSession {
            child,
            stdin,
            replies,
            timeouts: self.timeouts.clone(),
            export_format: self.export_format.clone(),
            with_window: self.visible,
        };

        let ready = session
            .await_reply("launch", seconds(self.timeouts.launch_seconds))
            .map_err(|e| EngineError::Launch(e.to_string()))?;
        if !ready.ok {
            return Err(EngineError::Launch(
                ready.error.unwrap_or_else(|| "bridge reported not ready".into()),
            ));
        }
        info!(
            "bridge ready pid={:?} event={:?}",
            ready.pid,
            ready.event.as_deref()
        );
        Ok(Box::new(session))
    }
}

pub struct BridgeSession {
    child: Child,
    stdin: ChildStdin,
    replies: Receiver<String>,
    timeouts: Timeouts,
    export_format: String,
    with_window: bool,
}

impl BridgeSession {
    fn request(
        &mut self,
        req: &BridgeRequest,
        timeout: Option<Duration>,
    ) -> Result<BridgeReply, EngineError> {
        let op = req.op();
        let mut line =
            serde_json::to_string(req).map_err(|e| EngineError::Protocol(e.to_string()))?;
        line.push('\n');
        debug!("bridge -> {}", line.trim_end());

        self.stdin
            .write_all(line.as_bytes())
            .and_then(|_| self.stdin.flush())
            .map_err(|e| EngineError::Disconnected(format!("writing '{op}': {e}")))?;

        let reply = self.await_reply(op, timeout)?;
        if !reply.ok {
            return Err(EngineError::Operation {
                op,
                message: reply.error.unwrap_or_else(|| "unspecified error".into()),
            });
        }
        Ok(reply)
    }

    /// Reads stdout lines until one parses as a reply. Stray output is logged.
    fn await_reply(
        &mut self,
        op: &'static str,
        timeout: Option<Duration>,
    ) -> Result<BridgeReply, EngineError> {
        let deadline = timeout.map(|t| Instant::now() + t);
        loop {
            let line = match deadline {
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    match self.replies.recv_timeout(remaining) {
                        Ok(line) => line,
                        Err(RecvTimeoutError::Timeout) => {
                            return Err(EngineError::Timeout {
                                op,
                                after: timeout.unwrap_or_default(),
                            });
                        }
                        Err(RecvTimeoutError::Disconnected) => {
                            return Err(EngineError::Disconnected(format!(
                                "bridge exited during '{op}'"
                            )));
                        }
                    }
                }
                None => self.replies.recv().map_err(|_| {
                    EngineError::Disconnected(format!("bridge exited during '{op}'"))
                })?,
            };

            let trimmed = line.trim();
            if !trimmed.starts_with('{') {
                debug!("bridge stdout: {trimmed}");
                continue;
            }
            return serde_json::from_str(trimmed)
                .map_err(|e| EngineError::Protocol(format!("'{op}' reply {trimmed:?}: {e}")));
        }
    }

    fn doc_id(reply: &BridgeReply, op: &'static str) -> Result<u64, EngineError> {
        reply
            .doc
            .ok_or_else(|| EngineError::Protocol(format!("'{op}' reply without document id")))
    }
}

impl EngineSession for BridgeSession {
    fn open(&mut self, path: &Path) -> Result<DocumentHandle, EngineError> {
        let req = BridgeRequest::Open {
            path: path.display().to_string(),
            read_only: true,
            with_window: self.with_window,
        };
        let reply = self.request(&req, seconds(self.timeouts.open_seconds))?;
        Ok(DocumentHandle(Self::doc_id(&reply, "open")?))
    }

    fn page_count(&mut self, doc: &DocumentHandle) -> Result<u32, EngineError> {
        let req = BridgeRequest::PageCount { doc: doc.0 };
        let reply = self.request(&req, seconds(self.timeouts.page_count_seconds))?;
        reply
            .pages
            .ok_or_else(|| EngineError::Protocol("page_count reply without pages".into()))
    }

    fn export_page(
        &mut self,
        doc: &DocumentHandle,
        index: u32,
        dest: &Path,
    ) -> Result<(), EngineError> {
        let req = BridgeRequest::Export {
            doc: doc.0,
            index,
            path: dest.display().to_string(),
            format: self.export_format.clone(),
        };
        self.request(&req, seconds(self.timeouts.export_seconds))?;
        Ok(())
    }

    fn close(&mut self, doc: DocumentHandle) -> Result<(), EngineError> {
        let req = BridgeRequest::Close { doc: doc.0 };
        self.request(&req, seconds(self.timeouts.close_seconds))?;
        Ok(())
    }

    fn quit(&mut self) -> Result<(), EngineError> {
        let limit = seconds(self.timeouts.quit_seconds);
        let result = self.request(&BridgeRequest::Quit, limit).map(|_| ());
        if !script::wait_for_exit(&mut self.child, limit.unwrap_or(Duration::from_secs(5))) {
            warn!("bridge did not exit after quit; killing it");
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
        result
    }
}

impl Drop for BridgeSession {
    fn drop(&mut self) {
        if let Ok(None) = self.child.try_wait() {
            debug!("killing bridge process {}", self.child.id());
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}
