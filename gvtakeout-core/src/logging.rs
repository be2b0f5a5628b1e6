//! Logging for the gvtakeout binaries
//!
//! Everything goes to a daily-rotated file under `$XDG_STATE_HOME/gvtakeout/`.
//! Nothing is written to stdout, which `gvtakeout-import` uses for JSON lines.
//!
//! The level comes from `[logging] level` unless `RUST_LOG` is set. The HTML
//! tree builder reports every recoverable markup error at debug level; its
//! targets are capped at `warn`.

use crate::config::{Config, LoggingConfig};
use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Tree-builder crates whose chatter is capped.
const QUIET_TARGETS: &[&str] = &["html5ever", "markup5ever", "markup5ever_rcdom"];

/// Keeps the background log writer alive; pending lines are flushed on drop.
pub struct LoggingGuard {
    _guard: WorkerGuard,
}

/// Install the file subscriber for a binary.
pub fn init(config: &LoggingConfig) -> Result<LoggingGuard> {
    let log_dir = Config::state_dir();
    std::fs::create_dir_all(&log_dir)?;

    let (writer, guard) = tracing_appender::non_blocking(appender(&log_dir, config.max_files)?);

    tracing_subscriber::registry()
        .with(filter(&config.level))
        .with(
            fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true)
                .with_line_number(true),
        )
        .init();

    tracing::info!(log_dir = %log_dir.display(), level = %config.level, "Logging initialized");
    Ok(LoggingGuard { _guard: guard })
}

/// Route logs to the test harness output. Safe to call from every test.
pub fn init_test() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter("debug"))
        .with_test_writer()
        .try_init();
}

/// Path of the log file the binaries write to
pub fn log_file_path() -> PathBuf {
    Config::log_path()
}

fn appender(dir: &Path, max_files: usize) -> Result<RollingFileAppender> {
    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("gvtakeout.log")
        .max_log_files(max_files.max(1))
        .build(dir)
        .map_err(|e| Error::Config(format!("failed to create log appender: {}", e)))
}

/// `RUST_LOG` if set, otherwise `level` with the tree builder capped at warn.
fn filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directives(level)))
}

fn directives(level: &str) -> String {
    let mut out = level.to_string();
    for target in QUIET_TARGETS {
        out.push_str(&format!(",{}=warn", target));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_file_path() {
        assert!(log_file_path().ends_with("gvtakeout.log"));
    }

    #[test]
    fn test_directives_cap_tree_builder() {
        let d = directives("debug");
        assert!(d.starts_with("debug,"));
        assert!(d.contains("html5ever=warn"));
        assert!(d.contains("markup5ever_rcdom=warn"));
        // must be a filter EnvFilter accepts
        assert!(EnvFilter::try_new(&d).is_ok());
    }

    #[test]
    fn test_appender_builds_in_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert!(appender(dir.path(), 0).is_ok());
    }
}
