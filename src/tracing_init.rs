//! Install a `tracing` subscriber that writes through a [`RotatingWriter`].

use std::sync::{Mutex, PoisonError};

use once_cell::sync::Lazy;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::{Error, FileLogConfig, LogConfig, Result, RotatingWriter};

static LOG_GUARD: Lazy<Mutex<Option<WorkerGuard>>> = Lazy::new(|| Mutex::new(None));

/// Initialize logging with the given configuration and optional CLI verbosity override.
///
/// File output goes through a background worker, so the rotating writer never
/// runs on the thread that emitted the event. Call [`shutdown_logging`] before
/// exit to flush buffered lines.
pub fn init_logging(config: &LogConfig, cli_verbose: Option<u8>) -> Result<()> {
    let rust_log = std::env::var("RUST_LOG").ok();
    let log_spec = effective_log_spec(config, cli_verbose, rust_log.as_deref());
    let env_filter = EnvFilter::try_new(&log_spec).map_err(|e| Error::Init(e.to_string()))?;

    let console_layer = config.console.then(|| fmt::layer().with_target(false));

    let file_layer = match &config.file {
        Some(file_config) => Some(
            fmt::layer()
                .with_writer(file_writer(file_config)?)
                .with_ansi(false)
                .with_target(false),
        ),
        None => None,
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| Error::Init(e.to_string()))
}

/// Flush and stop the file logging worker, if one is running.
pub fn shutdown_logging() {
    let guard = LOG_GUARD
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .take();
    drop(guard);
}

fn file_writer(file_config: &FileLogConfig) -> Result<NonBlocking> {
    let writer = RotatingWriter::new(&file_config.path, file_config.rotation.clone())?;
    let (non_blocking, guard) = tracing_appender::non_blocking(writer);

    *LOG_GUARD.lock().unwrap_or_else(PoisonError::into_inner) = Some(guard);

    Ok(non_blocking)
}

/// Determine the effective filter directive. `RUST_LOG` takes precedence over everything.
fn effective_log_spec(
    config: &LogConfig,
    cli_verbose: Option<u8>,
    rust_log: Option<&str>,
) -> String {
    if let Some(rust_log) = rust_log
        && !rust_log.is_empty()
    {
        return rust_log.to_string();
    }

    let level = if config.level.is_empty() {
        "info"
    } else {
        config.level.as_str()
    };

    match cli_verbose {
        None | Some(0) => level.to_string(),
        Some(1) => format!("{},logroll=debug", level),
        Some(2) => format!("{},logroll=trace", level),
        Some(_) => "trace".to_string(),
    }
}
