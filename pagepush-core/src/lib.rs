//! Shared domain types and configuration for pagepush.
//!
//! - [`types`]: stamps, markers, notification targets, stage outcomes
//! - [`config`]: `pagepush.yaml` + environment overlay
//! - [`error`]: [`ConfigError`]

pub mod config;
pub mod error;
pub mod types;

pub use config::{NotifyConfig, PagesConfig, PollConfig};
pub use error::ConfigError;
pub use types::{
    cache_bust_url, BuildMarker, DispatchOutcome, DispatchReport, NotificationTarget,
    PollOutcome, PublishRequest, TargetId, TargetKind, VersionStamp,
};
