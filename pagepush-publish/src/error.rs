//! Error types for pagepush-publish.

use std::path::PathBuf;

use thiserror::Error;

use pagepush_core::ConfigError;
use pagepush_notify::NotifyError;

/// Fatal errors of a publish run. Degraded stages (poll timeout, failed
/// notification) are not errors; they live in the run report.
#[derive(Debug, Error)]
pub enum PublishError {
    /// The hand-edited source document does not exist yet.
    #[error("source file not found at {path}; run `pagepush init` to create it from the template")]
    MissingSource { path: PathBuf },

    /// `init` needs a template to copy from.
    #[error("template file not found at {path}")]
    MissingTemplate { path: PathBuf },

    /// `init` refuses to clobber an existing source without `--force`.
    #[error("source file already exists at {path}; pass --force to overwrite it")]
    SourceExists { path: PathBuf },

    /// The repository root is not inside a git work tree.
    #[error("{path} is not a git repository: {detail}")]
    NotARepository { path: PathBuf, detail: String },

    /// The push was rejected or could not reach the remote. The commit stays local.
    #[error("git push failed (the commit is kept locally): {detail}")]
    Push { detail: String },

    /// Any other git invocation failed.
    #[error("`git {command}` failed: {detail}")]
    Git { command: String, detail: String },

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Notification preconditions, checked before anything is committed.
    #[error("notification setup error: {0}")]
    Notify(#[from] NotifyError),
}

/// A single fetch of the published page did not yield a body.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("HTTP status {0}")]
    Status(u16),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("failed to read response body: {0}")]
    Body(String),
}

/// Convenience constructor for [`PublishError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> PublishError {
    PublishError::Io {
        path: path.into(),
        source,
    }
}
