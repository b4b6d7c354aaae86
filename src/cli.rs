use crate::{
    config::Config,
    engine::system::SystemLauncher,
    fs::StdFileSystem,
    pipeline::{run_to_completion, ConversionPipeline},
    state::PollResult,
    util::{ensure_dir, job_dir_name, looks_like_url, now_rfc3339, sha256_hex},
};
use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

#[derive(Parser, Debug)]
#[command(name = "slidepush")]
#[command(about = "Convert presentations and documents into numbered slide images")]
pub struct Args {
    #[command(subcommand)]
    pub cmd: Command,

    /// Path to config TOML. If omitted, uses ./slidepush.toml if present.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override log level (trace/debug/info/warn/error).
    #[arg(long)]
    pub log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Check that the office and raster tools can be executed.
    Doctor {},
    /// Report whether an input is accepted and which tools it will need.
    Classify {
        #[arg(long)]
        input: PathBuf,
    },
    /// Convert an input into slide images.
    Convert {
        #[arg(long)]
        input: PathBuf,
        /// Empty or missing directory to convert into. Defaults to a fresh
        /// directory under paths.work_dir.
        #[arg(long)]
        work_dir: Option<PathBuf>,
    },
}

pub fn dispatch(args: Args) -> Result<()> {
    let cfg = match resolve_config_path(args.config.as_deref()) {
        Some(path) => Config::load(&path)?,
        None => Config::default(),
    };

    let log_path = resolve_log_path(&cfg);
    let _guard = init_logging(&args, &cfg, log_path.as_deref())?;

    match &args.cmd {
        Command::Doctor {} => doctor(&cfg),
        Command::Classify { input } => classify(&cfg, input),
        Command::Convert { input, work_dir } => convert(&cfg, input, work_dir.as_deref()),
    }
}

fn resolve_config_path(user: Option<&Path>) -> Option<PathBuf> {
    if let Some(p) = user {
        return Some(p.to_path_buf());
    }
    let default = PathBuf::from("slidepush.toml");
    default.exists().then_some(default)
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
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed()
    };

    let (file_layer, guard) = if let Some(path) = file_path {
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        ensure_dir(parent)?;
        let file = std::fs::File::create(path)
            .with_context(|| format!("create log file: {}", path.display()))?;
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
    let diag = SystemLauncher::new().doctor(cfg);
    for tool in diag.iter().filter(|t| !t.available) {
        warn!("{} is not usable: {}", tool.program, tool.error.as_deref().unwrap_or("unknown"));
    }
    println!("{}", serde_json::to_string_pretty(&diag)?);
    Ok(())
}

fn classify(cfg: &Config, input: &Path) -> Result<()> {
    let accepted = cfg.pipeline.accepts(input);
    let skip_office = accepted && cfg.pipeline.is_intermediate(input);
    let route = match (accepted, skip_office) {
        (false, _) => "rejected",
        (true, true) => "raster",
        (true, false) => "office+raster",
    };
    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
            "input": input,
            "exists": input.is_file(),
            "accepted": accepted,
            "route": route,
        }))?
    );
    Ok(())
}

fn convert(cfg: &Config, input: &Path, work_override: Option<&Path>) -> Result<()> {
    validate_input(cfg, input)?;

    let work_dir = match work_override {
        Some(p) => p.to_path_buf(),
        None => {
            let root = PathBuf::from(&cfg.paths.work_dir);
            ensure_dir(&root)?;
            let cfg_hash = sha256_hex(cfg.normalized_for_hash().as_bytes());
            root.join(job_dir_name(&cfg_hash, input)?)
        }
    };

    let mut pipeline = ConversionPipeline::new(cfg, SystemLauncher::new(), StdFileSystem);
    let started = now_rfc3339();
    let handle = pipeline.start(input, &work_dir)?;
    info!("{handle} work_dir={}", work_dir.display());

    let deadline = (cfg.limits.job_timeout_seconds > 0)
        .then(|| Duration::from_secs(cfg.limits.job_timeout_seconds));
    let interval = Duration::from_millis(cfg.pipeline.poll_interval_ms.max(1));
    let outcome = run_to_completion(&mut pipeline, handle, interval, deadline)?;
    let report = pipeline.report(handle)?;

    match outcome {
        PollResult::Finished => {
            let slides = pipeline.collect_slides(handle)?;
            info!("{handle} produced {} slides", slides.len());
            if cfg.global.print_summary {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&serde_json::json!({
                        "status": "ok",
                        "started": started,
                        "finished": now_rfc3339(),
                        "work_dir": work_dir,
                        "slides": slides.slides,
                        "report": report,
                    }))?
                );
            }
            Ok(())
        }
        PollResult::Failed(failure) => {
            if cfg.global.print_summary {
                println!("{}", serde_json::to_string_pretty(&report)?);
            }
            Err(anyhow!("unable to process {}: {}", input.display(), failure.reason))
        }
        PollResult::Cancelled => Err(anyhow!(
            "conversion of {} cancelled after {}s",
            input.display(),
            cfg.limits.job_timeout_seconds
        )),
        PollResult::InProgress(_) => Err(anyhow!("conversion stopped before completing")),
    }
}

fn validate_input(cfg: &Config, input: &Path) -> Result<()> {
    let input_str = input.display().to_string();

    if cfg.security.reject_url_inputs && looks_like_url(&input_str) {
        return Err(anyhow!("URL inputs are disabled: {input_str}"));
    }

    if !input.exists() {
        return Err(anyhow!("input does not exist: {}", input.display()));
    }

    Ok(())
}

fn resolve_log_path(cfg: &Config) -> Option<PathBuf> {
    if !cfg.logging.write_to_file {
        return None;
    }

    if !cfg.logging.file_path.is_empty() {
        return Some(PathBuf::from(&cfg.logging.file_path));
    }

    // Never inside a job directory: those must start out empty.
    Some(PathBuf::from(&cfg.paths.work_dir).join("slidepush.log"))
}
