use crate::{
    batch::BatchRunner,
    config::Config,
    convert::Converter,
    discover::discover_documents,
    engine::{EngineProcessManager, SystemProcessTable, bridge::BridgeEngine},
    ocr::ScriptOcr,
    report::{BatchReport, ScanReport},
    scan::RecognitionScanner,
    script,
    util::ensure_dir,
};
use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "slide-scan")]
#[command(about = "Convert slide decks to page images and collect pages matching question-type keywords")]
pub struct Args {
    #[command(subcommand)]
    pub cmd: Command,

    /// Path to config TOML. If omitted, uses ./slide-scan.toml if present.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override log level (trace/debug/info/warn/error).
    #[arg(long)]
    pub log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print resolved paths and helper availability.
    Doctor {},
    /// Convert every deck under <root>/input into page images.
    Convert {
        #[arg(long)]
        root: Option<PathBuf>,
    },
    /// OCR the page images under <root>/output and collect findings.
    Scan {
        #[arg(long)]
        root: Option<PathBuf>,
    },
    /// Convert, then scan.
    Run {
        #[arg(long)]
        root: Option<PathBuf>,
    },
}

pub fn dispatch(args: Args) -> Result<()> {
    let mut cfg = load_config(args.config.as_deref())?;

    let root = match &args.cmd {
        Command::Doctor {} => None,
        Command::Convert { root } | Command::Scan { root } | Command::Run { root } => {
            root.clone()
        }
    };
    if let Some(root) = root {
        cfg.paths.root = root.display().to_string();
    }

    let log_path = resolve_log_path(&cfg);
    let _guard = init_logging(&args, &cfg, log_path.as_deref())?;

    if cfg.debug.dump_effective_config {
        info!("effective config:\n{}", toml::to_string(&cfg).unwrap_or_default());
    }

    match &args.cmd {
        Command::Doctor {} => doctor(&cfg),
        Command::Convert { .. } => convert(&cfg).map(|_| ()),
        Command::Scan { .. } => scan(&cfg).map(|_| ()),
        Command::Run { .. } => {
            convert(&cfg)?;
            if cfg.output_dir().is_dir() {
                scan(&cfg)?;
            } else {
                info!("nothing to scan under {}", cfg.output_dir().display());
            }
            Ok(())
        }
    }
}

fn load_config(user: Option<&Path>) -> Result<Config> {
    if let Some(p) = user {
        return Config::load(p);
    }
    let default = PathBuf::from("slide-scan.toml");
    if default.exists() {
        Config::load(&default)
    } else {
        Ok(Config::default())
    }
}

fn init_logging(args: &Args, cfg: &Config, file_path: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let level = args
        .log_level
        .as_deref()
        .unwrap_or(cfg.logging.level.as_str());

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let stdout_layer = if cfg.logging.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .boxed()
    };

    let (file_layer, guard) = if let Some(path) = file_path {
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        ensure_dir(parent)?;
        let file = std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .append(cfg.logging.append)
            .truncate(!cfg.logging.append)
            .open(path)
            .with_context(|| format!("open log file: {}", path.display()))?;
        let (non_blocking, guard) = tracing_appender::non_blocking(file);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_target(true)
            .boxed();
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow!("failed to init logging: {e}"))?;

    Ok(guard)
}

fn resolve_log_path(cfg: &Config) -> Option<PathBuf> {
    if !cfg.logging.write_to_file {
        return None;
    }
    if !cfg.logging.file_path.is_empty() {
        return Some(cfg.resolve(&cfg.logging.file_path));
    }
    Some(cfg.root().join("slide-scan.log"))
}

fn doctor(cfg: &Config) -> Result<()> {
    let python = script::resolve_python_exe(&cfg.paths.python_exe);
    let bridge = cfg.scripts_dir().join(&cfg.engine.bridge_script);
    let ocr_script = cfg.scripts_dir().join(&cfg.ocr.script);

    let ocr = match ScriptOcr::new(cfg).and_then(|o| o.doctor()) {
        Ok(diag) => serde_json::to_value(diag)?,
        Err(err) => serde_json::json!({ "ok": false, "error": format!("{err:#}") }),
    };

    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
            "python_exe": python,
            "input_dir": cfg.input_dir(),
            "input_dir_exists": cfg.input_dir().is_dir(),
            "output_dir": cfg.output_dir(),
            "findings_dir": cfg.findings_dir(),
            "work_dir": cfg.work_dir(),
            "bridge_script": bridge,
            "bridge_script_exists": bridge.exists(),
            "ocr_script": ocr_script,
            "ocr_script_exists": ocr_script.exists(),
            "engine_process_names": cfg.engine.process_names,
            "ocr": ocr,
        }))?
    );
    Ok(())
}

/// Returns `None` when there was nothing to convert.
fn convert(cfg: &Config) -> Result<Option<BatchReport>> {
    let input_dir = cfg.input_dir();
    if !input_dir.exists() {
        ensure_dir(&input_dir)?;
        info!("created input folder {}; add decks and run again", input_dir.display());
        return Ok(None);
    }

    let docs = discover_documents(&input_dir, &cfg.validation.extensions)?;
    if docs.is_empty() {
        info!("no decks found under {}", input_dir.display());
        return Ok(None);
    }
    info!("discovered {} deck(s)", docs.len());

    let engine = BridgeEngine::new(cfg)?;
    let manager = EngineProcessManager::new(
        Box::new(engine),
        Box::new(SystemProcessTable),
        cfg.engine.process_names.clone(),
        cfg.timings.clone(),
    );
    let mut runner = BatchRunner::new(cfg, Converter::new(cfg, manager));
    let report = runner.run(&docs)?;

    for doc in report.failed_documents() {
        warn!("not converted: {}", doc.source.display());
    }

    if cfg.global.print_summary {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "command": "convert",
                "total": report.total,
                "succeeded": report.succeeded,
                "failed": report.failed,
            }))?
        );
    }
    Ok(Some(report))
}

fn scan(cfg: &Config) -> Result<ScanReport> {
    let output_dir = cfg.output_dir();
    if !output_dir.is_dir() {
        return Err(anyhow!("output directory not found: {}", output_dir.display()));
    }

    let ocr = ScriptOcr::new(cfg)?;
    let scanner = RecognitionScanner::new(cfg, &ocr);
    let report = scanner.scan_all(&output_dir)?;

    if cfg.global.print_summary {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "command": "scan",
                "findings_dir": scanner.findings_dir(),
                "report": report,
            }))?
        );
    }
    Ok(report)
}
