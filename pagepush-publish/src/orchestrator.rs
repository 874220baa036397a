//! Publish orchestration.
//!
//! ## Stages
//!
//! 1. Preconditions: source exists, repository, base URL, notification setup.
//! 2. Copy source → published file.
//! 3. Stage all; empty diff → [`PublishReport::NoChanges`], unless an earlier
//!    run committed but never pushed, in which case that commit is pushed.
//! 4. Stamp, embed marker, re-stage, commit, push (push failure is fatal).
//! 5. Cache-bust URL.
//! 6. Poll for reflection (timeout is degraded, not fatal).
//! 7. Notify (failure is degraded, not fatal).

use std::path::Path;
use std::time::Duration;

use pagepush_core::{
    cache_bust_url, BuildMarker, DispatchReport, PagesConfig, PollOutcome, PublishRequest,
    VersionStamp,
};
use pagepush_notify::{self as notify, Dispatch, MessagingClient, NotifyError};

use crate::content::{self, ContentSync};
use crate::error::PublishError;
use crate::git::Vcs;
use crate::poller::{self, Fetcher};

/// External collaborators of a run.
pub struct Collaborators<'a> {
    pub vcs: &'a dyn Vcs,
    pub fetcher: &'a dyn Fetcher,
    pub messenger: &'a dyn MessagingClient,
}

/// Progress notifications, emitted in stage order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishEvent {
    ContentStaged(ContentSync),
    NoChanges { url: String },
    Committed { message: String, marker: BuildMarker },
    /// Source unchanged but an earlier commit is still local; pushing it.
    ResumingPush { marker: BuildMarker },
    Pushed,
    UrlReady { url: String },
    PollStarted { timeout: Duration },
    PollFinished(PollOutcome),
    Notified(NotificationStage),
}

/// How the notification stage ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationStage {
    /// `AUTO_SEND` off.
    Skipped,
    /// Every target received the message.
    Delivered(DispatchReport),
    /// At least one target failed.
    Incomplete(DispatchReport),
    /// The dispatcher refused to run.
    Error(NotifyError),
}

impl NotificationStage {
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            NotificationStage::Incomplete(_) | NotificationStage::Error(_)
        )
    }
}

impl From<Result<Dispatch, NotifyError>> for NotificationStage {
    fn from(result: Result<Dispatch, NotifyError>) -> Self {
        match result {
            Ok(Dispatch::Skipped) => NotificationStage::Skipped,
            Ok(Dispatch::Sent(report)) if report.is_success() => {
                NotificationStage::Delivered(report)
            }
            Ok(Dispatch::Sent(report)) => NotificationStage::Incomplete(report),
            Err(err) => NotificationStage::Error(err),
        }
    }
}

/// A run that pushed. `commit_message` is `None` when the run only pushed
/// a commit left behind by an earlier failed push.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedRun {
    pub marker: BuildMarker,
    pub url: String,
    pub commit_message: Option<String>,
    pub poll: PollOutcome,
    pub notification: NotificationStage,
}

impl PublishedRun {
    pub fn is_degraded(&self) -> bool {
        !self.poll.succeeded || self.notification.is_failure()
    }

    /// Human-readable warnings for each degraded stage, combined when both are.
    pub fn warnings(&self) -> Vec<String> {
        let poll_failed = !self.poll.succeeded;
        let notify_failed = self.notification.is_failure();
        let mut warnings = Vec::new();

        if poll_failed {
            warnings.push(format!(
                "reflection not confirmed after {}s ({} attempts); the push succeeded, the host may still be propagating",
                self.poll.elapsed_seconds(),
                self.poll.attempts
            ));
        }
        match &self.notification {
            NotificationStage::Incomplete(report) => warnings.push(format!(
                "notification incomplete: sent {}, failed {} of {} targets",
                report.sent_count(),
                report.failed_count(),
                report.valid_target_count()
            )),
            NotificationStage::Error(err) => {
                warnings.push(format!("notification not sent: {err}"))
            }
            NotificationStage::Skipped | NotificationStage::Delivered(_) => {}
        }
        if poll_failed && notify_failed {
            warnings.push(
                "neither reflection nor notification could be confirmed; check the page manually"
                    .to_string(),
            );
        }
        warnings
    }
}

/// Outcome of a publish invocation that did not fail fatally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishReport {
    /// Nothing to publish; `url` points at the version already served.
    NoChanges { url: String },
    Published(PublishedRun),
}

impl PublishReport {
    pub fn is_degraded(&self) -> bool {
        match self {
            PublishReport::NoChanges { .. } => false,
            PublishReport::Published(run) => run.is_degraded(),
        }
    }
}

/// Run the whole publish workflow for the repository at `root`.
pub fn publish(
    root: &Path,
    config: &PagesConfig,
    request: &PublishRequest,
    deps: &Collaborators<'_>,
    on_event: &mut dyn FnMut(&PublishEvent),
) -> Result<PublishReport, PublishError> {
    // 1. Preconditions. Nothing below runs unless all of them hold.
    let source = config.source_path(root);
    if !source.is_file() {
        return Err(PublishError::MissingSource { path: source });
    }
    deps.vcs.ensure_repository()?;
    let base_url = config.base_url()?.to_string();
    notify::preflight(&config.notify)?;

    // 2, 3. Copy and detect a no-op.
    let published = config.published_path(root);
    let previous = content::current_marker(&published)?;
    let staged = content::stage_source(&source, &published)?;
    on_event(&PublishEvent::ContentStaged(staged));

    deps.vcs.stage_all()?;
    if !deps.vcs.has_staged_changes()? {
        if let Some(marker) = previous {
            if deps.vcs.has_unpushed_commits()? {
                tracing::info!(%marker, "resuming push of an earlier commit");
                on_event(&PublishEvent::ResumingPush { marker });
                return deliver(&base_url, marker, None, config, deps, on_event);
            }
        }
        let stamp = previous
            .map(|m| m.stamp())
            .unwrap_or_else(|| VersionStamp::at(&request.timestamp));
        let url = cache_bust_url(&base_url, &stamp);
        tracing::info!(%url, "nothing to publish");
        on_event(&PublishEvent::NoChanges { url: url.clone() });
        return Ok(PublishReport::NoChanges { url });
    }

    // 4. One stamp per run, strictly after the one already served.
    let mut stamp = VersionStamp::at(&request.timestamp);
    if let Some(prev) = previous {
        if prev.stamp() >= stamp {
            stamp = prev.stamp().successor();
        }
    }
    let marker = BuildMarker::new(stamp);
    content::embed_marker(&source, &published, &marker)?;

    deps.vcs.stage_all()?;
    let commit_message = request.commit_message();
    deps.vcs.commit(&commit_message)?;
    tracing::info!(message = %commit_message, "committed");
    on_event(&PublishEvent::Committed {
        message: commit_message.clone(),
        marker,
    });

    deliver(&base_url, marker, Some(commit_message), config, deps, on_event)
}

/// Push, then poll for `marker` and notify. Shared by fresh and resumed runs.
fn deliver(
    base_url: &str,
    marker: BuildMarker,
    commit_message: Option<String>,
    config: &PagesConfig,
    deps: &Collaborators<'_>,
    on_event: &mut dyn FnMut(&PublishEvent),
) -> Result<PublishReport, PublishError> {
    deps.vcs.push()?;
    tracing::info!("pushed");
    on_event(&PublishEvent::Pushed);

    // 5.
    let url = cache_bust_url(base_url, &marker.stamp());
    on_event(&PublishEvent::UrlReady { url: url.clone() });

    // 6.
    on_event(&PublishEvent::PollStarted {
        timeout: config.poll.timeout,
    });
    let poll = poller::wait_for_reflection(
        deps.fetcher,
        &url,
        &marker.token(),
        config.poll.timeout,
        config.poll.interval,
    );
    on_event(&PublishEvent::PollFinished(poll));

    // 7.
    let notification = NotificationStage::from(notify::dispatch(
        &url,
        &config.label,
        &config.notify,
        deps.messenger,
    ));
    on_event(&PublishEvent::Notified(notification.clone()));

    Ok(PublishReport::Published(PublishedRun {
        marker,
        url,
        commit_message,
        poll,
        notification,
    }))
}
