//! Log file setup.
//!
//! The terminal belongs to the spinner, so logs only go to a file, and only
//! when `TWIRL_LOG` is set. Its value is an `EnvFilter` directive such as
//! `debug` or `twirl=trace`.

use anyhow::{Context, Result, anyhow};
use std::fs;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::UtcTime;

pub const LOG_ENV: &str = "TWIRL_LOG";
const LOG_FILE: &str = "twirl.log";

/// Install the file logger if `TWIRL_LOG` is set.
///
/// The returned guard flushes buffered lines on drop and must be held for the
/// life of the program.
pub fn init() -> Result<Option<WorkerGuard>> {
    let Ok(directives) = std::env::var(LOG_ENV) else {
        return Ok(None);
    };

    let dir = log_dir()?;
    fs::create_dir_all(&dir).context("Failed to create log directory")?;

    let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(
        &dir, LOG_FILE,
    ));
    tracing_subscriber::fmt()
        .with_env_filter(filter_from(&directives))
        .with_writer(writer)
        .with_ansi(false)
        .with_timer(UtcTime::rfc_3339())
        .try_init()
        .map_err(|e| anyhow!("Failed to initialize logging: {}", e))?;

    tracing::debug!(path = %dir.join(LOG_FILE).display(), "logger:initialized");
    Ok(Some(guard))
}

/// Falls back to `info` when the directive string does not parse.
fn filter_from(directives: &str) -> EnvFilter {
    EnvFilter::try_new(directives).unwrap_or_else(|_| EnvFilter::new("info"))
}

fn log_dir() -> Result<PathBuf> {
    Ok(state_dir()?.join("twirl"))
}

fn state_dir() -> Result<PathBuf> {
    if let Ok(state_home) = std::env::var("XDG_STATE_HOME") {
        return Ok(PathBuf::from(state_home));
    }

    if let Some(home_dir) = home::home_dir() {
        return Ok(home_dir.join(".local/state"));
    }

    anyhow::bail!("Could not determine state directory")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_accepts_directives() {
        assert_eq!(filter_from("twirl=trace").to_string(), "twirl=trace");
    }

    #[test]
    fn filter_falls_back_to_info() {
        assert_eq!(filter_from("twirl=notalevel").to_string(), "info");
    }
}
