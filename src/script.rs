//! Plumbing for the Python helper scripts under `scripts/`.

use crate::config::Config;
use anyhow::{Context, Result, anyhow};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Output, Stdio};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

pub fn resolve_python_exe(raw: &str) -> PathBuf {
    let raw = raw.trim();
    if raw.is_empty() || raw.eq_ignore_ascii_case("auto") {
        if let Ok(env_val) = std::env::var("SLIDE_SCAN_PYTHON") {
            let p = expand_tilde(&env_val);
            if p.exists() {
                return p;
            }
        }
        return PathBuf::from(if cfg!(windows) { "python" } else { "python3" });
    }
    expand_tilde(raw)
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        let home = std::env::var("HOME").or_else(|_| std::env::var("USERPROFILE"));
        if let Ok(home) = home {
            return PathBuf::from(home).join(rest);
        }
    }
    PathBuf::from(path)
}

/// Locates a helper script, failing early when it is missing.
pub fn locate(cfg: &Config, name: &str) -> Result<PathBuf> {
    let path = cfg.scripts_dir().join(name);
    if !path.exists() {
        return Err(anyhow!("missing script: {}", path.display()));
    }
    Ok(path)
}

/// Runs a script once: JSON in on stdin, JSON out on stdout.
pub fn run_json<I: serde::Serialize, O: for<'de> serde::Deserialize<'de>>(
    python_exe: &Path,
    script: &Path,
    input: &I,
    timeout: Option<Duration>,
) -> Result<O> {
    debug!("python run {} timeout={:?}", script.display(), timeout);
    let mut cmd = Command::new(python_exe);
    cmd.arg(script);
    cmd.env("PYTHONIOENCODING", "utf-8");
    cmd.stdin(Stdio::piped());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());

    let mut child = cmd
        .spawn()
        .with_context(|| format!("spawning python: {}", script.display()))?;

    {
        let mut stdin = child.stdin.take().ok_or_else(|| anyhow!("no stdin"))?;
        let bytes = serde_json::to_vec(input)?;
        stdin.write_all(&bytes)?;
        stdin.flush().ok();
    }

    let output = match timeout {
        Some(limit) => wait_with_timeout(&mut child, limit)?,
        None => child
            .wait_with_output()
            .with_context(|| "waiting for python")?,
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(anyhow!(
            "python script failed: {}\n{}",
            script.display(),
            stderr
        ));
    }

    if !output.stderr.is_empty() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        debug!("python stderr {}: {}", script.display(), stderr.trim());
    }

    let out: O = serde_json::from_slice(&output.stdout)
        .with_context(|| format!("parsing python JSON output: {}", script.display()))?;
    Ok(out)
}

/// Waits for `child` while draining its pipes; kills it past `timeout`.
pub fn wait_with_timeout(child: &mut Child, timeout: Duration) -> Result<Output> {
    let stdout_reader = child.stdout.take();
    let stderr_reader = child.stderr.take();

    let stdout_thread = std::thread::spawn(move || -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        if let Some(mut out) = stdout_reader {
            out.read_to_end(&mut buf).with_context(|| "read stdout")?;
        }
        Ok(buf)
    });

    let stderr_thread = std::thread::spawn(move || -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        if let Some(mut err) = stderr_reader {
            err.read_to_end(&mut buf).with_context(|| "read stderr")?;
        }
        Ok(buf)
    });

    let start = Instant::now();
    loop {
        if let Some(status) = child.try_wait().with_context(|| "try_wait")? {
            let stdout = stdout_thread
                .join()
                .map_err(|_| anyhow!("stdout reader thread panicked"))??;
            let stderr = stderr_thread
                .join()
                .map_err(|_| anyhow!("stderr reader thread panicked"))??;
            return Ok(Output {
                status,
                stdout,
                stderr,
            });
        }

        if start.elapsed() > timeout {
            warn!("python process timed out after {:?}", timeout);
            let _ = child.kill();
            child.wait().with_context(|| "wait after kill")?;
            let stderr = stderr_thread
                .join()
                .map_err(|_| anyhow!("stderr reader thread panicked"))??;
            return Err(anyhow!(
                "python process exceeded timeout ({:?}); stderr: {}",
                timeout,
                String::from_utf8_lossy(&stderr)
            ));
        }

        std::thread::sleep(Duration::from_millis(50));
    }
}

/// Polls `child` until it exits or `limit` passes. Returns whether it exited.
pub fn wait_for_exit(child: &mut Child, limit: Duration) -> bool {
    let start = Instant::now();
    loop {
        match child.try_wait() {
            Ok(Some(_)) => return true,
            Ok(None) if start.elapsed() < limit => std::thread::sleep(Duration::from_millis(50)),
            Ok(None) => return false,
            Err(err) => {
                warn!("polling helper process failed: {err}");
                return false;
            }
        }
    }
}
