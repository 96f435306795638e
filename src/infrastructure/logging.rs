use crate::infrastructure::error::InfraError;
use std::fs::{self, OpenOptions};
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub const LOG_FILTER_ENV: &str = "TASKFLOW_LOG";
pub const LOG_FILE_NAME: &str = "taskflow.log";
const DEFAULT_FILTER: &str = "info";
const MAX_FILTER_LEN: usize = 4096;

/// Invalid, blank or oversized filters fall back to `info`.
pub fn resolve_filter(raw: Option<&str>) -> EnvFilter {
    raw.and_then(|raw| {
        let raw = raw.trim();
        if raw.is_empty() || raw.len() > MAX_FILTER_LEN {
            return None;
        }
        EnvFilter::try_new(raw).ok()
    })
    .unwrap_or_else(|| EnvFilter::new(DEFAULT_FILTER))
}

/// Installs the global subscriber writing JSON lines to `logs_dir/taskflow.log`.
/// Returns `false` when a subscriber was already installed.
pub fn init_logging(logs_dir: &Path, filter: Option<&str>) -> Result<bool, InfraError> {
    fs::create_dir_all(logs_dir)?;
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(logs_dir.join(LOG_FILE_NAME))?;

    let installed = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .json()
                .with_ansi(false)
                .with_current_span(false)
                .with_writer(Mutex::new(file)),
        )
        .with(resolve_filter(filter))
        .try_init()
        .is_ok();
    Ok(installed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn falls_back_to_info_for_unusable_filters() {
        for raw in [None, Some(""), Some("   "), Some("taskflow=notalevel")] {
            assert_eq!(resolve_filter(raw).to_string(), DEFAULT_FILTER);
        }
        let oversized = "a".repeat(MAX_FILTER_LEN + 1);
        assert_eq!(resolve_filter(Some(&oversized)).to_string(), DEFAULT_FILTER);
    }

    #[test]
    fn keeps_valid_filters() {
        assert_eq!(resolve_filter(Some("taskflow=debug")).to_string(), "taskflow=debug");
    }
}
