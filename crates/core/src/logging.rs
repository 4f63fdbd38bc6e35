//! Logging infrastructure for docrag.
//!
//! Logs go to stderr so stdout stays clean for chunk listings and answers.
//! A log file can be attached as a second, uncolored sink.

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::{AppError, AppResult};

/// Initialize the tracing subscriber.
///
/// # Arguments
/// * `log_level` - Optional filter override (e.g., "debug", "docrag_knowledge=trace")
/// * `no_color` - Disable colored output on stderr
/// * `log_file` - Optional file that receives a copy of every event (appended)
///
/// # Example
/// ```no_run
/// use docrag_core::logging::init_logging;
///
/// init_logging(None, false, None).expect("Failed to initialize logging");
/// ```
pub fn init_logging(
    log_level: Option<&str>,
    no_color: bool,
    log_file: Option<&Path>,
) -> AppResult<()> {
    let default_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let filter_str = log_level.unwrap_or(&default_level);

    let env_filter = EnvFilter::try_new(filter_str)
        .map_err(|e| AppError::Config(format!("Invalid log filter: {}", e)))?;

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_ansi(!no_color && supports_color());

    let file_layer = match log_file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let file = OpenOptions::new().create(true).append(true).open(path).map_err(|e| {
                AppError::Config(format!("Failed to open log file {:?}: {}", path, e))
            })?;
            Some(
                fmt::layer()
                    .with_writer(Mutex::new(file))
                    .with_target(true)
                    .with_ansi(false),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| AppError::Config(format!("Failed to init logging: {}", e)))?;

    Ok(())
}

/// Check if the terminal supports color output.
fn supports_color() -> bool {
    std::env::var("NO_COLOR").is_err()
}
