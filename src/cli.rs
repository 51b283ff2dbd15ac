use crate::{
    config::{Config, OutputFormat},
    engine::{Engine, external::ExternalEngine},
    normalize,
    pipeline::Pipeline,
    report::JobReport,
    schedule,
    util::ensure_dir,
};
use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_CONFIG: &str = "scheduled-ocr.toml";

#[derive(Parser, Debug)]
#[command(name = "scheduled-ocr")]
#[command(about = "Scheduled PDF page OCR job (pdftoppm + tesseract)")]
pub struct Args {
    #[command(subcommand)]
    pub cmd: Command,

    /// Path to config TOML. If omitted, uses ./scheduled-ocr.toml if present.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override log level (trace/debug/info/warn/error).
    #[arg(long)]
    pub log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Check that pdftoppm, tesseract and the OCR language are installed.
    Doctor {},
    /// Run the job once.
    Run {},
    /// Run the job on a fixed interval.
    Schedule {
        #[arg(long)]
        interval_seconds: Option<u64>,
        #[arg(long)]
        max_runs: Option<u64>,
    },
    /// Normalize text from a file (or stdin) and print it.
    Normalize {
        #[arg(long)]
        input: Option<PathBuf>,
    },
}

pub fn dispatch(args: Args) -> Result<()> {
    let mut cfg = load_config(args.config.as_deref())?;
    let _guard = init_logging(&args, &cfg)?;

    match &args.cmd {
        Command::Doctor {} => doctor(&cfg),
        Command::Run {} => run_once(&cfg),
        Command::Schedule {
            interval_seconds,
            max_runs,
        } => {
            if let Some(secs) = interval_seconds {
                cfg.schedule.interval_seconds = *secs;
            }
            if let Some(n) = max_runs {
                cfg.schedule.max_runs = *n;
            }
            let runs = schedule::run_every(&cfg.schedule, |_| run_once(&cfg))?;
            info!("schedule finished after {runs} runs");
            Ok(())
        }
        Command::Normalize { input } => normalize_cmd(&cfg, input.as_deref()),
    }
}

fn load_config(user: Option<&Path>) -> Result<Config> {
    if let Some(p) = user {
        return Config::load(p);
    }
    let default = PathBuf::from(DEFAULT_CONFIG);
    if default.exists() {
        Config::load(&default)
    } else {
        Ok(Config::default())
    }
}

fn init_logging(args: &Args, cfg: &Config) -> Result<Option<WorkerGuard>> {
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

    let (file_layer, guard) = if cfg.logging.write_to_file && !cfg.logging.file_path.is_empty() {
        let path = Path::new(&cfg.logging.file_path);
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        ensure_dir(parent)?;
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
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

fn doctor(cfg: &Config) -> Result<()> {
    let engine = ExternalEngine::new(cfg);
    let diag = engine.doctor()?;
    println!("{}", serde_json::to_string_pretty(&diag)?);
    Ok(())
}

fn run_once(cfg: &Config) -> Result<()> {
    let pipeline = Pipeline::new(cfg, ExternalEngine::new(cfg));
    let report = pipeline.run_job()?;

    info!(
        start = %report.started,
        end = %report.finished,
        duration_seconds = report.whole_seconds(),
        result = %report.text,
        "ocr job finished"
    );

    if cfg.output.print_summary {
        println!("{}", render_report(cfg, &report)?);
    }
    Ok(())
}

fn render_report(cfg: &Config, report: &JobReport) -> Result<String> {
    match cfg.output.format {
        OutputFormat::Banner => Ok(report.summary()),
        OutputFormat::Json => Ok(serde_json::to_string_pretty(report)?),
    }
}

fn normalize_cmd(cfg: &Config, input: Option<&Path>) -> Result<()> {
    let raw = match input {
        Some(p) => std::fs::read_to_string(p)
            .with_context(|| format!("reading {}", p.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .with_context(|| "reading stdin")?;
            buf
        }
    };
    println!("{}", normalize::normalize(cfg, &raw));
    Ok(())
}
