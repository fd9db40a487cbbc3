//! Tracing setup: stdout always, plus a daily rolling file when
//! `Config::file_logs` is on.

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;

const LOG_FILE_PREFIX: &str = "vocab-builder.log";

/// Keeps the non-blocking file writer flushing; hold it until exit.
pub struct FileLogGuard {
    _guard: WorkerGuard,
}

/// Installs the global subscriber for the binary.
pub fn init_tracing(config: &Config) -> Option<FileLogGuard> {
    let env_filter =
        EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    let (file_layer, guard) = match file_writer(config) {
        Some((writer, guard)) => {
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true);
            (Some(layer), Some(FileLogGuard { _guard: guard }))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true))
        .with(file_layer)
        .init();

    guard
}

/// File sink under `config.log_dir`; `None` when disabled or the directory
/// cannot be created.
fn file_writer(config: &Config) -> Option<(NonBlocking, WorkerGuard)> {
    if !config.file_logs {
        return None;
    }
    if let Err(err) = std::fs::create_dir_all(&config.log_dir) {
        eprintln!(
            "failed to create log directory {}: {err}",
            config.log_dir.display()
        );
        return None;
    }

    let appender = RollingFileAppender::new(Rotation::DAILY, &config.log_dir, LOG_FILE_PREFIX);
    Some(tracing_appender::non_blocking(appender))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_sink_is_off_by_default() {
        assert!(file_writer(&Config::default()).is_none());
    }

    #[test]
    fn file_sink_creates_the_log_dir() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            file_logs: true,
            log_dir: dir.path().join("nested").join("logs"),
            ..Config::default()
        };

        assert!(file_writer(&config).is_some());
        assert!(config.log_dir.is_dir());
    }
}
