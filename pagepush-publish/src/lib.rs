//! # pagepush-publish
//!
//! The publish workflow: copy the source document over the published file,
//! stamp it with a build marker, commit and push, then wait for the pages host
//! to serve the new marker and notify subscribers.
//!
//! Entry point is [`publish`]. Git, page fetching and messaging are reached
//! through the [`Vcs`], [`Fetcher`] and
//! [`MessagingClient`](pagepush_notify::MessagingClient) seams.

pub mod content;
pub mod error;
pub mod git;
pub mod orchestrator;
pub mod poller;

pub use content::{
    current_marker, embed_marker, fill_created_date, scaffold_source, split_marker, stage_source,
    ContentSync,
};
pub use error::{FetchError, PublishError};
pub use git::{GitRepo, Vcs};
pub use orchestrator::{
    publish, Collaborators, NotificationStage, PublishEvent, PublishReport, PublishedRun,
};
pub use poller::{nonce_url, wait_for_reflection, Fetcher, UreqFetcher};
