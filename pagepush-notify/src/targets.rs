//! Target-list parsing and notification mode resolution.

use std::collections::HashSet;

use pagepush_core::{NotificationTarget, NotifyConfig, TargetId};

use crate::error::NotifyError;

/// Accepted list separators: comma, semicolon, full-width comma, newlines.
const SEPARATORS: [char; 5] = [',', ';', '，', '\n', '\r'];

/// Quoting stripped from each entry.
const QUOTES: [char; 3] = ['"', '\'', '`'];

/// Parse a delimiter-tolerant id list.
///
/// Entries are trimmed of whitespace and quoting; empty entries are dropped
/// silently, duplicates keep their first position, and entries with interior
/// whitespace are dropped as malformed.
pub fn parse_target_list(raw: &str) -> Vec<TargetId> {
    let mut seen = HashSet::new();
    let mut ids = Vec::new();

    for piece in raw.split(SEPARATORS) {
        let id = piece.trim().trim_matches(QUOTES).trim();
        if id.is_empty() {
            continue;
        }
        if id.chars().any(char::is_whitespace) {
            tracing::warn!(entry = id, "skipping malformed target id");
            continue;
        }
        if seen.insert(id.to_owned()) {
            ids.push(TargetId::from(id));
        }
    }
    ids
}

/// Pick exactly one notification mode from `config`.
///
/// Priority: broadcast > group list > single group > single user. A group
/// list that parses to nothing counts as unset.
pub fn resolve_target(config: &NotifyConfig) -> Result<NotificationTarget, NotifyError> {
    if config.broadcast {
        return Ok(NotificationTarget::Broadcast);
    }

    if let Some(raw) = config.to_group_ids.as_deref() {
        let ids = parse_target_list(raw);
        if !ids.is_empty() {
            return Ok(NotificationTarget::GroupList(ids));
        }
        tracing::warn!("TO_GROUP_IDS is set but contains no valid ids; falling back");
    }

    if let Some(id) = single_id(config.to_group_id.as_deref()) {
        return Ok(NotificationTarget::SingleGroup(id));
    }
    if let Some(id) = single_id(config.to_user_id.as_deref()) {
        return Ok(NotificationTarget::SingleUser(id));
    }

    Err(NotifyError::NoTargetConfigured)
}

fn single_id(raw: Option<&str>) -> Option<TargetId> {
    raw.map(|s| s.trim().trim_matches(QUOTES).trim())
        .filter(|s| !s.is_empty())
        .map(TargetId::from)
}
