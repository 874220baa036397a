//! Domain types for a publish run.
//!
//! Everything here is transient: values are built at the start of a run and
//! dropped when it ends. Timestamps that reach the published page are rendered
//! in Japan Standard Time (UTC+09:00).

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Timelike, Utc};

/// Offset of Japan Standard Time from UTC, in seconds.
pub const JST_OFFSET_SECONDS: i32 = 9 * 3600;

/// Token prefix of the build marker embedded in published content.
pub const MARKER_PREFIX: &str = "PAGES_BUILD_JST:";

/// Namespace tag prepended to every publish commit message.
pub const COMMIT_PREFIX: &str = "pages: ";

/// The fixed UTC+09:00 offset.
pub fn jst() -> FixedOffset {
    FixedOffset::east_opt(JST_OFFSET_SECONDS).expect("+09:00 is a valid UTC offset")
}

// ---------------------------------------------------------------------------
// VersionStamp / BuildMarker
// ---------------------------------------------------------------------------

/// Second-granularity JST wall-clock time, rendered as `YYYYMMDD-HHMMSS`.
///
/// One stamp is generated per publish run and is shared by the cache-bust
/// URL and the embedded [`BuildMarker`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VersionStamp(NaiveDateTime);

impl VersionStamp {
    pub const FORMAT: &'static str = "%Y%m%d-%H%M%S";

    /// Stamp for `instant`, converted to JST and truncated to the second.
    pub fn at<Tz: TimeZone>(instant: &DateTime<Tz>) -> Self {
        let local = instant.with_timezone(&jst()).naive_local();
        Self(local.with_nanosecond(0).unwrap_or(local))
    }

    /// Parse a rendered stamp. Returns `None` for anything not matching
    /// `YYYYMMDD-HHMMSS` exactly.
    pub fn parse(s: &str) -> Option<Self> {
        if s.len() != 15 {
            return None;
        }
        NaiveDateTime::parse_from_str(s, Self::FORMAT).ok().map(Self)
    }

    /// The stamp one second later.
    pub fn successor(&self) -> Self {
        Self(self.0 + chrono::Duration::seconds(1))
    }
}

impl fmt::Display for VersionStamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.format(Self::FORMAT).fmt(f)
    }
}

/// The per-run freshness token: `PAGES_BUILD_JST:<stamp>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BuildMarker(VersionStamp);

impl BuildMarker {
    pub fn new(stamp: VersionStamp) -> Self {
        Self(stamp)
    }

    pub fn stamp(&self) -> VersionStamp {
        self.0
    }

    /// The literal token the poller searches for.
    pub fn token(&self) -> String {
        format!("{MARKER_PREFIX}{}", self.0)
    }

    /// HTML comment line placed at the top of the published file.
    pub fn comment_line(&self) -> String {
        format!("<!-- {} -->", self.token())
    }

    /// Recognise a line produced by [`BuildMarker::comment_line`].
    pub fn from_comment_line(line: &str) -> Option<Self> {
        let inner = line
            .trim()
            .strip_prefix("<!--")?
            .strip_suffix("-->")?
            .trim()
            .strip_prefix(MARKER_PREFIX)?;
        VersionStamp::parse(inner.trim()).map(Self)
    }
}

impl fmt::Display for BuildMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{MARKER_PREFIX}{}", self.0)
    }
}

/// `<base_url>?v=<stamp>`, or `&v=` when the base already carries a query.
pub fn cache_bust_url(base_url: &str, stamp: &VersionStamp) -> String {
    let separator = if base_url.contains('?') { '&' } else { '?' };
    format!("{base_url}{separator}v={stamp}")
}

// ---------------------------------------------------------------------------
// PublishRequest
// ---------------------------------------------------------------------------

/// Immutable input of one orchestrator invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishRequest {
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl PublishRequest {
    /// Build a request; an absent or blank message defaults to the JST date.
    pub fn new(message: Option<String>, timestamp: DateTime<Utc>) -> Self {
        let message = match message {
            Some(m) if !m.trim().is_empty() => m.trim().to_string(),
            _ => timestamp.with_timezone(&jst()).format("%Y-%m-%d").to_string(),
        };
        Self { message, timestamp }
    }

    pub fn commit_message(&self) -> String {
        format!("{COMMIT_PREFIX}{}", self.message)
    }
}

// ---------------------------------------------------------------------------
// Notification targets
// ---------------------------------------------------------------------------

/// A messaging recipient id (user or group).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TargetId(pub String);

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for TargetId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for TargetId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Resolved notification mode. Exactly one is chosen per dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationTarget {
    Broadcast,
    GroupList(Vec<TargetId>),
    SingleGroup(TargetId),
    SingleUser(TargetId),
}

impl NotificationTarget {
    /// One entry per send, in send order. Broadcast has a single id-less entry.
    pub fn recipients(&self) -> Vec<(TargetKind, Option<&TargetId>)> {
        match self {
            NotificationTarget::Broadcast => vec![(TargetKind::Broadcast, None)],
            NotificationTarget::GroupList(ids) => {
                ids.iter().map(|id| (TargetKind::Group, Some(id))).collect()
            }
            NotificationTarget::SingleGroup(id) => vec![(TargetKind::Group, Some(id))],
            NotificationTarget::SingleUser(id) => vec![(TargetKind::User, Some(id))],
        }
    }

    pub fn mode_name(&self) -> &'static str {
        match self {
            NotificationTarget::Broadcast => "broadcast",
            NotificationTarget::GroupList(_) => "group list",
            NotificationTarget::SingleGroup(_) => "group",
            NotificationTarget::SingleUser(_) => "user",
        }
    }
}

/// Kind of recipient a single send was addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    Broadcast,
    Group,
    User,
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetKind::Broadcast => write!(f, "broadcast"),
            TargetKind::Group => write!(f, "group"),
            TargetKind::User => write!(f, "user"),
        }
    }
}

// ---------------------------------------------------------------------------
// Stage outcomes
// ---------------------------------------------------------------------------

/// Result of one messaging API call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchOutcome {
    pub target_type: TargetKind,
    pub target_id: Option<TargetId>,
    pub success: bool,
    /// `None` when the request never produced an HTTP response.
    pub http_status: Option<u16>,
    /// Bounded response body (or transport error text) for failed sends.
    pub body_snippet_on_failure: Option<String>,
}

/// Aggregate of a dispatch: every attempted send plus the run-level tally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchReport {
    pub target: NotificationTarget,
    pub outcomes: Vec<DispatchOutcome>,
}

impl DispatchReport {
    pub fn sent_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.success).count()
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.success).count()
    }

    pub fn valid_target_count(&self) -> usize {
        self.target.recipients().len()
    }

    /// Successful only when every valid target was reached.
    pub fn is_success(&self) -> bool {
        self.valid_target_count() > 0
            && self.failed_count() == 0
            && self.sent_count() == self.valid_target_count()
    }

    pub fn is_partial(&self) -> bool {
        self.sent_count() > 0 && self.failed_count() > 0
    }
}

/// Result of waiting for the published page to serve the new marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollOutcome {
    pub succeeded: bool,
    pub elapsed: Duration,
    pub attempts: u32,
}

impl PollOutcome {
    pub fn elapsed_seconds(&self) -> u64 {
        self.elapsed.as_secs()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
