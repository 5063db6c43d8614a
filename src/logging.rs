//! Logging setup for `glance-exec`.
//!
//! The plan and run snapshot go to stdout and logs to stderr, so piping
//! `--format json` into another tool stays clean. With `--log-file` the logs
//! move to a file instead; editor integrations that drive the executor over
//! stdio use the same switch. `RUST_LOG` overrides the `info` default, e.g.
//! `RUST_LOG=glance_executor::execution=debug` shows every synchronization.

use std::fs::{self, File};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initializes logging to the file from [`get_log_path`]; used for `--log-file`.
///
/// The file is truncated on every start, so it only ever holds the last
/// session. If it cannot be opened, logs go to stderr instead and `None` is
/// returned; otherwise the path written to.
pub fn init_file_logging() -> Option<PathBuf> {
    let log_path = get_log_path();

    let opened = log_path
        .parent()
        .map_or(Ok(()), fs::create_dir_all)
        .and_then(|()| File::create(&log_path));

    match opened {
        Ok(log_file) => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter())
                .with_writer(log_file)
                .with_ansi(false)
                .init();
            Some(log_path)
        }
        Err(e) => {
            eprintln!(
                "Warning: Could not open log file {}: {e}; logging to stderr",
                log_path.display()
            );
            init_stderr_logging();
            None
        }
    }
}

/// Initializes logging to stderr; the default for `glance-exec`.
pub fn init_stderr_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr)
        .init();
}

/// Returns the log file path: the state directory
/// (`~/.local/state/glance-executor/glance-executor.log` on Linux), falling
/// back to the config directory and then the temp directory.
pub fn get_log_path() -> PathBuf {
    if let Some(state_dir) = dirs::state_dir() {
        return state_dir.join("glance-executor").join("glance-executor.log");
    }

    if let Some(config_dir) = dirs::config_dir() {
        return config_dir.join("glance-executor").join("glance-executor.log");
    }

    std::env::temp_dir().join("glance-executor.log")
}
