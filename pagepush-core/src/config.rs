//! Run configuration.
//!
//! # Sources
//!
//! 1. `<repo>/pagepush.yaml` (optional; every field has a default)
//! 2. environment overrides, passed in explicitly as a map
//!
//! Components never read process state themselves: the CLI collects the
//! environment once and hands the resolved [`PagesConfig`] down.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{io_err, ConfigError};

pub const CONFIG_FILE: &str = "pagepush.yaml";

pub const DEFAULT_API_BASE: &str = "https://api.line.me/v2/bot/message";
pub const DEFAULT_LABEL: &str = "Event summary updated";

/// Recognised environment variable names.
pub mod env_keys {
    pub const AUTO_SEND: &str = "AUTO_SEND";
    pub const CHANNEL_ACCESS_TOKEN: &str = "CHANNEL_ACCESS_TOKEN";
    pub const TO_USER_ID: &str = "TO_USER_ID";
    pub const TO_GROUP_ID: &str = "TO_GROUP_ID";
    pub const TO_GROUP_IDS: &str = "TO_GROUP_IDS";
    pub const BROADCAST: &str = "BROADCAST";
    pub const POLL_TIMEOUT_SECONDS: &str = "POLL_TIMEOUT_SECONDS";
    pub const POLL_INTERVAL_SECONDS: &str = "POLL_INTERVAL_SECONDS";
    pub const PAGES_BASE_URL: &str = "PAGES_BASE_URL";
    pub const MESSAGING_API_BASE: &str = "MESSAGING_API_BASE";
}

// ---------------------------------------------------------------------------
// Structs
// ---------------------------------------------------------------------------

/// Resolved configuration for one invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PagesConfig {
    /// Hand-edited source document, relative to the repository root.
    pub source: PathBuf,
    /// File served by the pages host.
    pub published: PathBuf,
    /// Template used by `pagepush init`.
    pub template: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// First line of the notification text.
    pub label: String,
    pub poll: PollConfig,
    pub notify: NotifyConfig,
}

impl Default for PagesConfig {
    fn default() -> Self {
        Self {
            source: PathBuf::from("event-summary.html"),
            published: PathBuf::from("index.html"),
            template: PathBuf::from("event-summary.template.html"),
            base_url: None,
            label: DEFAULT_LABEL.to_string(),
            poll: PollConfig::default(),
            notify: NotifyConfig::default(),
        }
    }
}

/// Reflection polling limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    #[serde(rename = "timeout_seconds", with = "seconds")]
    pub timeout: Duration,
    #[serde(rename = "interval_seconds", with = "seconds")]
    pub interval: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(180),
            interval: Duration::from_secs(5),
        }
    }
}

/// Messaging settings. `auto_send == false` skips dispatch entirely.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    pub auto_send: bool,
    pub channel_access_token: Option<String>,
    pub to_user_id: Option<String>,
    pub to_group_id: Option<String>,
    /// Raw, delimiter-tolerant list; parsed by the dispatcher.
    pub to_group_ids: Option<String>,
    pub broadcast: bool,
    pub api_base: String,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            auto_send: false,
            channel_access_token: None,
            to_user_id: None,
            to_group_id: None,
            to_group_ids: None,
            broadcast: false,
            api_base: DEFAULT_API_BASE.to_string(),
        }
    }
}

impl NotifyConfig {
    /// Token with everything but the last four characters masked.
    pub fn redacted_token(&self) -> Option<String> {
        self.channel_access_token.as_deref().map(redact)
    }
}

impl fmt::Debug for NotifyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotifyConfig")
            .field("auto_send", &self.auto_send)
            .field("channel_access_token", &self.redacted_token())
            .field("to_user_id", &self.to_user_id)
            .field("to_group_id", &self.to_group_id)
            .field("to_group_ids", &self.to_group_ids)
            .field("broadcast", &self.broadcast)
            .field("api_base", &self.api_base)
            .finish()
    }
}

fn redact(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 4 {
        return "*".repeat(chars.len());
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}{tail}", "*".repeat(8))
}

mod seconds {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_secs)
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl PagesConfig {
    /// `<root>/pagepush.yaml`. Pure, no I/O.
    pub fn file_path_at(root: &Path) -> PathBuf {
        root.join(CONFIG_FILE)
    }

    /// Load `<root>/pagepush.yaml` (defaults if absent), overlay `env`, validate.
    pub fn load_at(root: &Path, env: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let path = Self::file_path_at(root);
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
            if contents.trim().is_empty() {
                Self::default()
            } else {
                serde_yaml::from_str(&contents)
                    .map_err(|source| ConfigError::Parse { path, source })?
            }
        } else {
            Self::default()
        };
        config.apply_env(env)?;
        config.validate()?;
        Ok(config)
    }

    /// Overlay recognised environment variables. Blank values are ignored.
    pub fn apply_env(&mut self, env: &HashMap<String, String>) -> Result<(), ConfigError> {
        use env_keys::*;

        let get = |key: &str| {
            env.get(key)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
                .map(str::to_owned)
        };

        if let Some(v) = get(AUTO_SEND) {
            self.notify.auto_send = parse_bool(AUTO_SEND, &v)?;
        }
        if let Some(v) = get(BROADCAST) {
            self.notify.broadcast = parse_bool(BROADCAST, &v)?;
        }
        if let Some(v) = get(CHANNEL_ACCESS_TOKEN) {
            self.notify.channel_access_token = Some(v);
        }
        if let Some(v) = get(TO_USER_ID) {
            self.notify.to_user_id = Some(v);
        }
        if let Some(v) = get(TO_GROUP_ID) {
            self.notify.to_group_id = Some(v);
        }
        if let Some(v) = get(TO_GROUP_IDS) {
            self.notify.to_group_ids = Some(v);
        }
        if let Some(v) = get(MESSAGING_API_BASE) {
            self.notify.api_base = v;
        }
        if let Some(v) = get(PAGES_BASE_URL) {
            self.base_url = Some(v);
        }
        if let Some(v) = get(POLL_TIMEOUT_SECONDS) {
            self.poll.timeout = Duration::from_secs(parse_seconds(POLL_TIMEOUT_SECONDS, &v)?);
        }
        if let Some(v) = get(POLL_INTERVAL_SECONDS) {
            self.poll.interval = Duration::from_secs(parse_seconds(POLL_INTERVAL_SECONDS, &v)?);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll.interval.is_zero() {
            return Err(ConfigError::InvalidValue {
                key: env_keys::POLL_INTERVAL_SECONDS.to_string(),
                value: "0".to_string(),
                expected: "a positive number of seconds",
            });
        }
        Ok(())
    }

    pub fn source_path(&self, root: &Path) -> PathBuf {
        root.join(&self.source)
    }

    pub fn published_path(&self, root: &Path) -> PathBuf {
        root.join(&self.published)
    }

    pub fn template_path(&self, root: &Path) -> PathBuf {
        root.join(&self.template)
    }

    pub fn base_url(&self) -> Result<&str, ConfigError> {
        self.base_url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .ok_or(ConfigError::MissingBaseUrl)
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            expected: "a boolean (1/0, true/false, yes/no, on/off)",
        }),
    }
}

fn parse_seconds(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        expected: "a whole number of seconds",
    })
}

// ---------------------------------------------------------------------------
// Pages URL derivation
// ---------------------------------------------------------------------------

/// Public URL of the GitHub Pages site served from `remote`.
///
/// Accepts `git@github.com:owner/repo.git`, `ssh://git@github.com/owner/repo`
/// and `https://github.com/owner/repo(.git)`. Returns `None` for other hosts.
pub fn derive_github_pages_url(remote: &str) -> Option<String> {
    let remote = remote.trim();
    let path = remote
        .strip_prefix("git@github.com:")
        .or_else(|| remote.strip_prefix("ssh://git@github.com/"))
        .or_else(|| remote.strip_prefix("https://github.com/"))
        .or_else(|| remote.strip_prefix("http://github.com/"))?;
    let path = path.trim_end_matches('/');
    let path = path.strip_suffix(".git").unwrap_or(path);

    let mut parts = path.split('/');
    let owner = parts.next().filter(|s| !s.is_empty())?;
    let repo = parts.next().filter(|s| !s.is_empty())?;
    if parts.next().is_some() {
        return None;
    }

    let host = format!("{}.github.io", owner.to_ascii_lowercase());
    if repo.eq_ignore_ascii_case(&host) {
        Some(format!("https://{host}/"))
    } else {
        Some(format!("https://{host}/{repo}/"))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
