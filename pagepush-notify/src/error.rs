//! Error types for pagepush-notify.

use thiserror::Error;

/// Precondition failures that stop a dispatch before any network call.
///
/// Per-target HTTP failures are not errors; they are recorded as failed
/// [`DispatchOutcome`](pagepush_core::DispatchOutcome)s.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NotifyError {
    #[error("CHANNEL_ACCESS_TOKEN is not set; cannot authenticate with the messaging API")]
    MissingCredential,

    #[error("no notification target configured; set BROADCAST, TO_GROUP_IDS, TO_GROUP_ID or TO_USER_ID")]
    NoTargetConfigured,
}

/// The request never produced an HTTP response (DNS, refused, timeout, TLS).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("transport error: {0}")]
pub struct TransportError(pub String);
