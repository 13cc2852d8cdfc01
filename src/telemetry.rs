//! Logging setup.
//!
//! `RUST_LOG` wins over the configured level; `--verbose` forces debug for
//! this crate. Optional daily-rolling files go to `logging.dir`.

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{LogFormat, Settings};

/// Keeps the file writer flushing until dropped. Hold it for the life of `main`.
pub struct TelemetryGuard {
    _file: Option<WorkerGuard>,
}

/// Filter directive for the given level and verbosity.
pub fn filter_directive(level: &str, verbose: bool) -> String {
    if verbose {
        "daveops=debug,tower_http=debug,info".to_string()
    } else {
        format!("daveops={level},warn")
    }
}

fn env_filter(level: &str, verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter_directive(level, verbose)))
}

/// Install the global subscriber. Call once.
pub fn init(settings: &Settings, verbose: bool) -> Result<TelemetryGuard> {
    let level = settings.logging.level.as_str();

    let (file_layer, file_guard) = match settings.log_dir() {
        Some(dir) => {
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
            let appender = tracing_appender::rolling::daily(&dir, "daveops.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .json()
                .with_writer(writer)
                .with_filter(env_filter(level, verbose));
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let registry = tracing_subscriber::registry().with(file_layer);
    let result = match settings.logging.format {
        LogFormat::Pretty => registry
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(false)
                    .with_filter(env_filter(level, verbose)),
            )
            .try_init(),
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_filter(env_filter(level, verbose)),
            )
            .try_init(),
    };
    result.context("Failed to install tracing subscriber")?;

    Ok(TelemetryGuard { _file: file_guard })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_directive_uses_level() {
        assert_eq!(filter_directive("warn", false), "daveops=warn,warn");
    }

    #[test]
    fn test_verbose_forces_debug() {
        assert!(filter_directive("error", true).starts_with("daveops=debug"));
    }

    #[test]
    fn test_directives_parse() {
        for directive in [filter_directive("info", false), filter_directive("info", true)] {
            assert!(EnvFilter::try_new(&directive).is_ok(), "{}", directive);
        }
    }
}
