use crate::{
    batch::run_batch,
    classify::scan_dir,
    config::Config,
    engine::{Engine, python::MineruEngine},
    pipeline::Pipeline,
    storage::ImageStore,
    util::ensure_dir,
};
use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "mineru-batch")]
#[command(about = "Batch-convert PDFs, office documents and images with MinerU")]
pub struct Args {
    #[command(subcommand)]
    pub cmd: Command,

    /// Path to config TOML. If omitted, uses ./mineru-batch.toml if present.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override log level (trace/debug/info/warn/error).
    #[arg(long)]
    pub log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Check the python environment behind the runner script.
    Doctor {},
    /// Classify a directory without converting anything.
    Scan {
        #[arg(long)]
        input: Option<PathBuf>,
    },
    /// Convert every supported file in the input directory.
    Run {
        #[arg(long)]
        input: Option<PathBuf>,
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },
}

pub fn dispatch(args: Args) -> Result<()> {
    let cfg_path = resolve_config_path(args.config.as_deref());
    let cfg = if cfg_path.exists() {
        Config::load(&cfg_path)?
    } else {
        Config::default()
    };

    match &args.cmd {
        Command::Doctor {} => {
            let _guard = init_logging(&args, &cfg, None)?;
            doctor(&cfg)
        }
        Command::Scan { input } => {
            let _guard = init_logging(&args, &cfg, None)?;
            let input = resolve_input(&cfg, input.as_deref())?;
            scan(&cfg, &input)
        }
        Command::Run { input, out_dir } => {
            let input = resolve_input(&cfg, input.as_deref())?;
            let out_dir = out_dir
                .clone()
                .unwrap_or_else(|| PathBuf::from(&cfg.paths.out_dir));
            run(&args, &cfg, &input, &out_dir)
        }
    }
}

fn resolve_config_path(user: Option<&Path>) -> PathBuf {
    if let Some(p) = user {
        return p.to_path_buf();
    }
    let default = PathBuf::from("mineru-batch.toml");
    if default.exists() {
        default
    } else {
        PathBuf::from("mineru-batch.example.toml")
    }
}

fn resolve_input(cfg: &Config, user: Option<&Path>) -> Result<PathBuf> {
    let input = user
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(&cfg.paths.input_dir));
    if cfg.security.reject_url_inputs && looks_like_url(&input.display().to_string()) {
        return Err(anyhow!("URL inputs are disabled: {}", input.display()));
    }
    Ok(input)
}

fn init_logging(
    args: &Args,
    cfg: &Config,
    file_path: Option<&Path>,
) -> Result<Option<WorkerGuard>> {
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
        tracing_subscriber::fmt::layer().with_target(true).boxed()
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
    let engine = MineruEngine::new(cfg)?;
    let diag = engine.doctor()?;
    println!("{}", serde_json::to_string_pretty(&diag)?);
    Ok(())
}

fn scan(cfg: &Config, input: &Path) -> Result<()> {
    if !input.is_dir() {
        return Err(anyhow!("input directory does not exist: {}", input.display()));
    }
    let result = scan_dir(cfg, input)?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

fn run(args: &Args, cfg: &Config, input: &Path, out_dir: &Path) -> Result<()> {
    ensure_dir(out_dir)?;
    let log_path = resolve_log_path(cfg, out_dir);
    let _guard = init_logging(args, cfg, log_path.as_deref())?;

    info!("input={} out={}", input.display(), out_dir.display());

    if cfg.debug.dump_effective_config {
        let raw = toml::to_string(cfg).unwrap_or_default();
        std::fs::write(out_dir.join("effective-config.toml"), raw)?;
    }

    let engine = MineruEngine::new(cfg)?;
    let store = ImageStore::from_config(cfg)?;
    let pipeline = Pipeline::new(cfg, engine, store);

    let report = run_batch(cfg, &pipeline, input, out_dir)?;

    if cfg.global.write_batch_report {
        std::fs::write(
            out_dir.join(&cfg.global.batch_report_filename),
            serde_json::to_string_pretty(&report)?,
        )?;
    }

    if cfg.global.print_summary {
        println!("{}", serde_json::to_string_pretty(&report.summary())?);
    }

    Ok(())
}

fn looks_like_url(s: &str) -> bool {
    let s = s.to_ascii_lowercase();
    s.starts_with("http://") || s.starts_with("https://") || s.starts_with("file://")
}

fn resolve_log_path(cfg: &Config, out_dir: &Path) -> Option<PathBuf> {
    if !cfg.logging.write_to_file {
        return None;
    }

    if !cfg.logging.file_path.is_empty() {
        return Some(PathBuf::from(&cfg.logging.file_path));
    }

    Some(out_dir.join("mineru-batch.log"))
}
