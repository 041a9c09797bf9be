//! File logging for namesync-ctl.
//!
//! stdout belongs to command output, so logs go to a daily file under
//! `~/.namesync/logs`. If the directory cannot be created logging is skipped.

use std::env;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

const LOG_FILE_PREFIX: &str = "namesync-ctl.log";

pub fn init() -> Option<WorkerGuard> {
    let log_dir = log_dir()?;
    fs_err::create_dir_all(&log_dir).ok()?;

    let appender = tracing_appender::rolling::daily(&log_dir, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let filter = EnvFilter::try_from_env("NAMESYNC_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .try_init()
        .ok()?;

    Some(guard)
}

fn log_dir() -> Option<PathBuf> {
    if let Ok(home) = env::var("NAMESYNC_HOME") {
        if !home.trim().is_empty() {
            return Some(PathBuf::from(home).join("logs"));
        }
    }
    dirs::home_dir().map(|home| home.join(".namesync").join("logs"))
}
