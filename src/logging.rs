//! Logging configuration for satrag

use std::path::Path;

use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Registry;

use crate::Result;

/// Initialize logging with the level from configuration, or the environment
/// default when no configuration is supplied.
pub fn init_logging(config: Option<&crate::config::AppConfig>) -> Result<()> {
    let env_filter = match config {
        Some(config) => {
            let level = &config.logging.level;
            EnvFilter::new(format!("{level},satrag={level}"))
        }
        None => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("info,satrag=debug")),
    };
    init_with_filter(env_filter)
}

/// Initialize logging with an explicit level string (e.g. "debug")
pub fn init_logging_with_level(level: &str) -> Result<()> {
    init_with_filter(EnvFilter::new(format!("{level},satrag={level}")))
}

fn init_with_filter(env_filter: EnvFilter) -> Result<()> {
    let logs_dir = Path::new("logs");
    if !logs_dir.exists() {
        std::fs::create_dir_all(logs_dir)?;
    }

    let file_appender = tracing_appender::rolling::daily("logs", "satrag.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let console_layer = fmt::layer()
        .with_target(true)
        .with_writer(std::io::stderr);

    let file_layer = fmt::layer()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_writer(non_blocking)
        .with_ansi(false);

    Registry::default()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    tracing::info!("Logging initialized; file output under logs/satrag.log.YYYY-MM-DD");

    // The appender guard must outlive the process or buffered lines are lost.
    std::mem::forget(guard);

    Ok(())
}

/// Minimal console-only logging for tests and examples
pub fn init_simple_logging() -> Result<()> {
    tracing_subscriber::fmt()
        .with_target(true)
        .with_max_level(tracing::Level::INFO)
        .init();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_logging_does_not_panic() {
        // Repeated init returns an error from the subscriber; we only care
        // that nothing panics.
        let _ = init_simple_logging();
    }
}
