use crate::{
    config::Config,
    job_file::JobFile,
    report::{SplitReport, queue_summary},
    splitter::{StageSplitter, current_stage},
    store::{InMemoryCatalog, InMemoryStore},
    util::{ensure_dir, now_rfc3339, sha256_hex},
};
use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "stage-split")]
#[command(about = "Split a media-analysis job stage into routed work units")]
pub struct Args {
    #[command(subcommand)]
    pub cmd: Command,

    /// Path to config TOML. If omitted, uses ./stage-split.toml if present, else built-in defaults.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override log level (trace/debug/info/warn/error).
    #[arg(long)]
    pub log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the effective configuration.
    Config {},
    /// Print resolved properties and segmenting plans per medium and action.
    Plan {
        #[arg(long)]
        job: PathBuf,
        /// Stage index to plan; defaults to the job's current stage.
        #[arg(long)]
        stage: Option<usize>,
    },
    /// Split a stage into work units.
    Split {
        #[arg(long)]
        job: PathBuf,
        /// Stage index to split; defaults to the job's current stage.
        #[arg(long)]
        stage: Option<usize>,
        /// Write the report here instead of stdout.
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

pub fn dispatch(args: Args) -> Result<()> {
    let cfg = match resolve_config_path(args.config.as_deref()) {
        Some(path) => Config::load(&path)?,
        None => Config::default(),
    };
    let _guard = init_logging(&args, &cfg)?;

    if cfg.debug.dump_effective_config {
        info!("effective config:\n{}", cfg.normalized_for_hash());
    }

    match &args.cmd {
        Command::Config {} => {
            println!("{}", toml::to_string(&cfg)?);
            Ok(())
        }
        Command::Plan { job, stage } => plan(&cfg, job, *stage),
        Command::Split { job, stage, out } => split(&cfg, job, *stage, out.as_deref()),
    }
}

fn resolve_config_path(user: Option<&Path>) -> Option<PathBuf> {
    if let Some(p) = user {
        return Some(p.to_path_buf());
    }
    let default = PathBuf::from("stage-split.toml");
    default.exists().then_some(default)
}

fn init_logging(args: &Args, cfg: &Config) -> Result<Option<WorkerGuard>> {
    let level = args
        .log_level
        .as_deref()
        .unwrap_or(cfg.logging.level.as_str());

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // stdout carries the JSON output, so console logs go to stderr.
    let console_layer = if cfg.logging.json {
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

    let (file_layer, guard) = if let Some(path) = resolve_log_path(cfg) {
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        ensure_dir(parent)?;
        let file = std::fs::File::create(&path)
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
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow!("failed to init logging: {e}"))?;

    Ok(guard)
}

fn resolve_log_path(cfg: &Config) -> Option<PathBuf> {
    if !cfg.logging.write_to_file {
        return None;
    }
    if cfg.logging.file_path.is_empty() {
        return Some(PathBuf::from("stage-split.log"));
    }
    Some(PathBuf::from(&cfg.logging.file_path))
}

fn load_job(path: &Path, stage: Option<usize>) -> Result<JobFile> {
    let mut file = JobFile::load(path)?;
    if let Some(stage) = stage {
        file.job.current_stage = stage;
    }
    Ok(file)
}

fn plan(cfg: &Config, job_path: &Path, stage: Option<usize>) -> Result<()> {
    let file = load_job(job_path, stage)?;
    let splitter = StageSplitter::new(
        cfg,
        InMemoryCatalog::new(file.algorithms),
        InMemoryStore::with_tracks(file.tracks),
    );
    let stage = current_stage(&file.job)?;
    let plans = splitter.plan(&file.job, stage)?;
    print_json(cfg, &plans)
}

fn split(cfg: &Config, job_path: &Path, stage: Option<usize>, out: Option<&Path>) -> Result<()> {
    let JobFile {
        mut job,
        algorithms,
        tracks,
    } = load_job(job_path, stage)?;

    let splitter = StageSplitter::new(
        cfg,
        InMemoryCatalog::new(algorithms),
        InMemoryStore::with_tracks(tracks),
    );
    let stage_name = current_stage(&job)?.name.clone();
    let units = splitter.split_current_stage(&mut job)?;

    let mut persisted_media: Vec<u64> = splitter
        .store()
        .persist_calls()
        .into_iter()
        .map(|(_, medium_id)| medium_id)
        .collect();
    persisted_media.dedup();

    let report = SplitReport {
        job_id: job.id,
        stage_index: job.current_stage,
        stage_name,
        generated_at: now_rfc3339(),
        config_hash: sha256_hex(cfg.normalized_for_hash().as_bytes()),
        work_unit_count: units.len(),
        queues: queue_summary(&units),
        persisted_media,
        work_units: if cfg.output.include_work_units {
            units
        } else {
            Vec::new()
        },
    };

    info!(
        "job_id={} stage={} work_units={}",
        report.job_id, report.stage_index, report.work_unit_count
    );

    match out {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                ensure_dir(parent)?;
            }
            std::fs::write(path, to_json(cfg, &report)?)
                .with_context(|| format!("writing report: {}", path.display()))
        }
        None => print_json(cfg, &report),
    }
}

fn to_json<T: Serialize>(cfg: &Config, value: &T) -> Result<String> {
    Ok(if cfg.output.pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    })
}

fn print_json<T: Serialize>(cfg: &Config, value: &T) -> Result<()> {
    println!("{}", to_json(cfg, value)?);
    Ok(())
}
