use std::path::PathBuf;

use thiserror::Error;

/// Error surface for scheduled-job generation and launchd management.
#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid schedule time {hour:02}:{minute:02}; hour must be 0-23 and minute 0-59")]
    InvalidTime { hour: u8, minute: u8 },

    #[error("launchd error: {0}")]
    Launchd(String),
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> ScheduleError {
    ScheduleError::Io {
        path: path.into(),
        source,
    }
}
