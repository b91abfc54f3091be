use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub global: Global,
    #[serde(default)]
    pub paths: Paths,
    #[serde(default)]
    pub validation: Validation,
    #[serde(default)]
    pub engine: Engine,
    #[serde(default)]
    pub timings: Timings,
    #[serde(default)]
    pub timeouts: Timeouts,
    #[serde(default)]
    pub conversion: Conversion,
    #[serde(default)]
    pub ocr: Ocr,
    #[serde(default)]
    pub logging: Logging,
    #[serde(default)]
    pub debug: Debug,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config: {}", path.display()))?;
        let cfg: Config = toml::from_str(&raw).with_context(|| "parsing TOML")?;
        Ok(cfg)
    }

    pub fn root(&self) -> PathBuf {
        PathBuf::from(&self.paths.root)
    }

    /// Resolves a configured path against `paths.root` unless it is absolute.
    pub fn resolve(&self, raw: &str) -> PathBuf {
        let p = PathBuf::from(raw);
        if p.is_absolute() { p } else { self.root().join(p) }
    }

    pub fn input_dir(&self) -> PathBuf {
        self.resolve(&self.paths.input_dir)
    }

    pub fn output_dir(&self) -> PathBuf {
        self.resolve(&self.paths.output_dir)
    }

    pub fn findings_dir(&self) -> PathBuf {
        self.resolve(&self.paths.findings_dir)
    }

    pub fn scripts_dir(&self) -> PathBuf {
        self.resolve(&self.paths.scripts_dir)
    }

    pub fn work_dir(&self) -> PathBuf {
        if self.paths.work_dir.is_empty() {
            std::env::temp_dir().join("SlideConversion")
        } else {
            self.resolve(&self.paths.work_dir)
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Global {
    pub print_summary: bool,
}
impl Default for Global {
    fn default() -> Self {
        Self {
            print_summary: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paths {
    pub root: String,
    pub input_dir: String,
    pub output_dir: String,
    pub findings_dir: String,
    /// Empty means `<system temp>/SlideConversion`.
    pub work_dir: String,
    pub scripts_dir: String,
    pub python_exe: String,
}
impl Default for Paths {
    fn default() -> Self {
        Self {
            root: ".".into(),
            input_dir: "input".into(),
            output_dir: "output".into(),
            findings_dir: "FinalOutput".into(),
            work_dir: "".into(),
            scripts_dir: "scripts".into(),
            python_exe: "auto".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Validation {
    pub min_bytes: u64,
    pub extensions: Vec<String>,
}
impl Default for Validation {
    fn default() -> Self {
        Self {
            min_bytes: 100,
            extensions: vec!["ppt".into(), "pptx".into()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Engine {
    pub bridge_script: String,
    pub process_names: Vec<String>,
    pub display_alerts: bool,
    pub visible: bool,
    pub export_format: String,
    pub keep_bridge_stderr: bool,
}
impl Default for Engine {
    fn default() -> Self {
        Self {
            bridge_script: "slide_bridge.py".into(),
            process_names: vec!["POWERPNT.EXE".into(), "powerpoint.exe".into()],
            display_alerts: false,
            visible: false,
            export_format: "PNG".into(),
            keep_bridge_stderr: true,
        }
    }
}

/// Settle intervals in milliseconds. Zero skips the wait.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Timings {
    pub kill_settle_ms: u64,
    pub launch_settle_ms: u64,
    pub open_settle_ms: u64,
    pub page_settle_ms: u64,
    pub close_settle_ms: u64,
    pub quit_settle_ms: u64,
    pub retry_backoff_ms: u64,
    pub between_documents_ms: u64,
}
impl Default for Timings {
    fn default() -> Self {
        Self {
            kill_settle_ms: 3000,
            launch_settle_ms: 2000,
            open_settle_ms: 1000,
            page_settle_ms: 500,
            close_settle_ms: 1000,
            quit_settle_ms: 1000,
            retry_backoff_ms: 2000,
            between_documents_ms: 3000,
        }
    }
}

impl Timings {
    /// All waits disabled.
    pub fn zero() -> Self {
        Self {
            kill_settle_ms: 0,
            launch_settle_ms: 0,
            open_settle_ms: 0,
            page_settle_ms: 0,
            close_settle_ms: 0,
            quit_settle_ms: 0,
            retry_backoff_ms: 0,
            between_documents_ms: 0,
        }
    }
}

/// Per-operation engine timeouts in seconds. Zero waits forever.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Timeouts {
    pub launch_seconds: u64,
    pub open_seconds: u64,
    pub page_count_seconds: u64,
    pub export_seconds: u64,
    pub close_seconds: u64,
    pub quit_seconds: u64,
}
impl Default for Timeouts {
    fn default() -> Self {
        Self {
            launch_seconds: 60,
            open_seconds: 120,
            page_count_seconds: 30,
            export_seconds: 60,
            close_seconds: 60,
            quit_seconds: 15,
        }
    }
}

pub fn seconds(raw: u64) -> Option<Duration> {
    (raw > 0).then(|| Duration::from_secs(raw))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversion {
    pub max_retries: u32,
    /// Treat an attempt that exported zero pages of a non-empty deck as failed.
    pub require_exported_pages: bool,
    pub write_report_json: bool,
    pub report_filename: String,
}
impl Default for Conversion {
    fn default() -> Self {
        Self {
            max_retries: 3,
            require_exported_pages: false,
            write_report_json: true,
            report_filename: "conversion_report.json".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ocr {
    pub script: String,
    pub lang: String,
    pub use_angle_cls: bool,
    pub timeout_seconds: u64,
    pub results_filename: String,
}
impl Default for Ocr {
    fn default() -> Self {
        Self {
            script: "ocr_runner.py".into(),
            lang: "ch".into(),
            use_angle_cls: true,
            timeout_seconds: 1800,
            results_filename: "ocr_results.json".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Logging {
    pub level: String,
    pub json: bool,
    pub write_to_file: bool,
    pub file_path: String,
    pub append: bool,
}
impl Default for Logging {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json: false,
            write_to_file: true,
            file_path: "".into(),
            append: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Debug {
    pub dump_effective_config: bool,
}
impl Default for Debug {
    fn default() -> Self {
        Self {
            dump_effective_config: false,
        }
    }
}
