//! Tracing subscriber setup.
//!
//! Console output goes to stderr so command output on stdout stays
//! scriptable. File output rotates daily and can be JSON.

use std::path::Path;
use tracing_appender::rolling;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;
use crate::error::{GalaError, GalaResult};

/// Directives appended to every filter. The websocket and HTTP stacks
/// are chatty at debug level and drown out frame-level client logs.
const QUIET_DEPENDENCIES: &[&str] = &["tungstenite=warn", "tokio_tungstenite=warn", "hyper=warn", "reqwest=warn"];

fn build_filter(level: &str) -> EnvFilter {
    let mut filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
    for directive in QUIET_DEPENDENCIES {
        if let Ok(d) = directive.parse() {
            filter = filter.add_directive(d);
        }
    }
    filter
}

/// Initialize the global tracing subscriber from the logging config.
///
/// Sets up stderr console output plus a daily-rotated file in `log_dir`.
pub fn init_logging(config: &LoggingConfig, log_dir: &Path) -> GalaResult<LogGuard> {
    std::fs::create_dir_all(log_dir)?;

    let file_appender = rolling::daily(log_dir, "gala.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .compact();

    let registry = tracing_subscriber::registry()
        .with(build_filter(&config.level))
        .with(console_layer);

    let result = if config.json_output {
        registry
            .with(
                fmt::layer()
                    .with_writer(non_blocking)
                    .json()
                    .with_target(true)
                    .with_file(true)
                    .with_line_number(true),
            )
            .try_init()
    } else {
        registry
            .with(
                fmt::layer()
                    .with_writer(non_blocking)
                    .with_ansi(false)
                    .with_target(true)
                    .with_file(true)
                    .with_line_number(true),
            )
            .try_init()
    };
    result.map_err(|e| GalaError::Internal(format!("logging already initialized: {e}")))?;

    tracing::info!(
        "logging initialized at level={}, dir={}",
        config.level,
        log_dir.display()
    );

    Ok(LogGuard { _guard: guard })
}

/// Keeps the file writer's worker alive; dropping it flushes pending records.
pub struct LogGuard {
    _guard: tracing_appender::non_blocking::WorkerGuard,
}

/// Console-only logger, used when the log directory is unusable.
pub fn init_console_logging(level: &str) {
    let _ = tracing_subscriber::registry()
        .with(build_filter(level))
        .with(fmt::layer().with_writer(std::io::stderr).with_target(true).compact())
        .try_init();
}
