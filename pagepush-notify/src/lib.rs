//! # pagepush-notify
//!
//! Messaging notification for a finished publish.
//!
//! Call [`dispatch`] with the cache-bust URL and a label. The notification
//! mode is resolved from [`NotifyConfig`](pagepush_core::NotifyConfig) with
//! fixed priority (broadcast, group list, single group, single user) and
//! every send is issued sequentially through a [`MessagingClient`].

pub mod client;
pub mod dispatcher;
pub mod error;
pub mod targets;

pub use client::{HttpResponse, MessagingClient, UreqMessagingClient};
pub use dispatcher::{dispatch, preflight, Dispatch};
pub use error::{NotifyError, TransportError};
pub use targets::{parse_target_list, resolve_target};
