use std::fs::{self, File};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::Level;
use tracing_appender::non_blocking::{self, WorkerGuard};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::{LoggingConfig, ResolvedOutputs};

pub const TELEMETRY_FILE: &str = "telemetry.jsonl";
/// Overrides the telemetry filter with a full `EnvFilter` directive string.
pub const LOG_ENV: &str = "TWENTYQ_BENCH_LOG";

/// Keeps the background writer alive; dropping it flushes `telemetry.jsonl`.
pub struct LoggingGuard {
    _guard: WorkerGuard,
    pub telemetry_path: PathBuf,
}

/// Dependencies stay at `warn`; the engine and the harness log at `level`.
pub fn telemetry_directives(level: Level) -> String {
    let level = level.as_str().to_ascii_lowercase();
    format!("warn,twentyq_core={level},twentyq_bench={level}")
}

fn telemetry_filter(level: Level) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(telemetry_directives(level)))
}

fn create_telemetry_file(dir: &Path) -> Result<(File, PathBuf)> {
    fs::create_dir_all(dir)
        .with_context(|| format!("creating telemetry directory at {}", dir.display()))?;
    let path = dir.join(TELEMETRY_FILE);
    let file = File::create(&path)
        .with_context(|| format!("creating telemetry file at {}", path.display()))?;
    Ok((file, path))
}

/// Installs a JSON subscriber writing next to the summary when structured
/// logging is enabled.
pub fn init_logging(
    logging: &LoggingConfig,
    outputs: &ResolvedOutputs,
) -> Result<Option<LoggingGuard>> {
    if !logging.enable_structured {
        return Ok(None);
    }

    let (file, telemetry_path) = create_telemetry_file(&outputs.report_dir())?;
    let (writer, guard) = non_blocking::NonBlockingBuilder::default()
        .lossy(false)
        .finish(file);

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(telemetry_filter(logging.level().unwrap_or(Level::INFO)))
        .json()
        .with_current_span(false)
        .with_span_events(FmtSpan::NONE)
        .with_writer(writer)
        .finish();

    // Tests share one process; only the first install wins.
    let _ = tracing::subscriber::set_global_default(subscriber);

    Ok(Some(LoggingGuard {
        _guard: guard,
        telemetry_path,
    }))
}
