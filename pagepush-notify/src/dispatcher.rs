//! Notification dispatch.
//!
//! ## Policy
//!
//! - `auto_send` off → [`Dispatch::Skipped`], no network.
//! - token missing → [`NotifyError::MissingCredential`], no network.
//! - no target → [`NotifyError::NoTargetConfigured`], no network.
//! - otherwise one sequential POST per recipient; a failed recipient never
//!   stops the rest, and the report is failed unless every recipient succeeded.

use pagepush_core::{
    DispatchOutcome, DispatchReport, NotificationTarget, NotifyConfig, TargetId, TargetKind,
};
use serde_json::{json, Value};

use crate::client::MessagingClient;
use crate::error::NotifyError;
use crate::targets::resolve_target;

/// Maximum characters of a failed response body kept for reporting.
pub const BODY_SNIPPET_CHARS: usize = 300;

/// What a dispatch did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// Notification disabled by configuration. Not a failure.
    Skipped,
    /// Sends were attempted; inspect the report for the tally.
    Sent(DispatchReport),
}

impl Dispatch {
    pub fn is_failure(&self) -> bool {
        match self {
            Dispatch::Skipped => false,
            Dispatch::Sent(report) => !report.is_success(),
        }
    }
}

/// Validate notification preconditions without sending anything.
///
/// Returns the resolved target, or `None` when notification is disabled.
pub fn preflight(config: &NotifyConfig) -> Result<Option<NotificationTarget>, NotifyError> {
    if !config.auto_send {
        return Ok(None);
    }
    require_token(config)?;
    resolve_target(config).map(Some)
}

/// Send `label` + `url` to the configured recipients.
pub fn dispatch(
    url: &str,
    label: &str,
    config: &NotifyConfig,
    client: &dyn MessagingClient,
) -> Result<Dispatch, NotifyError> {
    if !config.auto_send {
        tracing::info!("AUTO_SEND is off; skipping notification");
        return Ok(Dispatch::Skipped);
    }
    let token = require_token(config)?;
    let target = resolve_target(config)?;
    tracing::info!(mode = target.mode_name(), "dispatching notification");

    let messages = json!([{ "type": "text", "text": format!("{label}\n{url}") }]);
    let base = config.api_base.trim_end_matches('/');

    let mut outcomes = Vec::new();
    for (kind, id) in target.recipients() {
        let (endpoint, payload) = match id {
            None => (format!("{base}/broadcast"), json!({ "messages": messages })),
            Some(id) => (
                format!("{base}/push"),
                json!({ "to": id.0, "messages": messages }),
            ),
        };
        outcomes.push(send_one(client, &endpoint, token, &payload, kind, id));
    }

    let report = DispatchReport { target, outcomes };
    if report.is_success() {
        tracing::info!(sent = report.sent_count(), "notification delivered");
    } else {
        tracing::warn!(
            sent = report.sent_count(),
            failed = report.failed_count(),
            targets = report.valid_target_count(),
            "notification incomplete"
        );
    }
    Ok(Dispatch::Sent(report))
}

fn require_token(config: &NotifyConfig) -> Result<&str, NotifyError> {
    config
        .channel_access_token
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(NotifyError::MissingCredential)
}

fn send_one(
    client: &dyn MessagingClient,
    endpoint: &str,
    token: &str,
    payload: &Value,
    kind: TargetKind,
    id: Option<&TargetId>,
) -> DispatchOutcome {
    let label = id.map(|i| i.0.as_str()).unwrap_or("*");
    match client.post_json(endpoint, token, payload) {
        Ok(response) if response.is_success() => {
            tracing::debug!(target_id = label, status = response.status, "sent");
            DispatchOutcome {
                target_type: kind,
                target_id: id.cloned(),
                success: true,
                http_status: Some(response.status),
                body_snippet_on_failure: None,
            }
        }
        Ok(response) => {
            tracing::warn!(target_id = label, status = response.status, "send rejected");
            DispatchOutcome {
                target_type: kind,
                target_id: id.cloned(),
                success: false,
                http_status: Some(response.status),
                body_snippet_on_failure: Some(snippet(&response.body)),
            }
        }
        Err(err) => {
            tracing::warn!(target_id = label, error = %err, "send failed");
            DispatchOutcome {
                target_type: kind,
                target_id: id.cloned(),
                success: false,
                http_status: None,
                body_snippet_on_failure: Some(snippet(&err.to_string())),
            }
        }
    }
}

fn snippet(body: &str) -> String {
    let trimmed = body.trim();
    match trimmed.char_indices().nth(BODY_SNIPPET_CHARS) {
        Some((cut, _)) => format!("{}…", &trimmed[..cut]),
        None => trimmed.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::HashMap;

    use super::*;
    use crate::client::HttpResponse;
    use crate::error::TransportError;

    /// Records every call; answers per `to` id (or "*" for broadcast).
    #[derive(Default)]
    struct ScriptedClient {
        calls: RefCell<Vec<(String, Value)>>,
        statuses: HashMap<String, u16>,
        unreachable: Vec<String>,
    }

    impl ScriptedClient {
        fn failing(id: &str, status: u16) -> Self {
            let mut client = Self::default();
            client.statuses.insert(id.to_string(), status);
            client
        }
    }

    impl MessagingClient for ScriptedClient {
        fn post_json(
            &self,
            url: &str,
            token: &str,
            body: &Value,
        ) -> Result<HttpResponse, TransportError> {
            assert_eq!(token, "tok");
            self.calls.borrow_mut().push((url.to_string(), body.clone()));
            let key = body["to"].as_str().unwrap_or("*").to_string();
            if self.unreachable.contains(&key) {
                return Err(TransportError("connection refused".into()));
            }
            let status = self.statuses.get(&key).copied().unwrap_or(200);
            Ok(HttpResponse {
                status,
                body: format!("{{\"status\":{status}}}"),
            })
        }
    }

    fn enabled() -> NotifyConfig {
        NotifyConfig {
            auto_send: true,
            channel_access_token: Some("tok".into()),
            api_base: "https://msg.test/v2/bot/message/".into(),
            ..NotifyConfig::default()
        }
    }

    const URL: &str = "https://kei.github.io/events/?v=20260302-000405";

    #[test]
    fn disabled_dispatch_is_skipped_without_calls() {
        let client = ScriptedClient::default();
        let cfg = NotifyConfig {
            auto_send: false,
            to_user_id: Some("U1".into()),
            ..enabled()
        };
        let result = dispatch(URL, "label", &cfg, &client).unwrap();
        assert_eq!(result, Dispatch::Skipped);
        assert!(!result.is_failure());
        assert!(client.calls.borrow().is_empty());
    }

    #[test]
    fn missing_token_fails_before_any_call() {
        let client = ScriptedClient::default();
        let cfg = NotifyConfig {
            channel_access_token: None,
            to_user_id: Some("U1".into()),
            ..enabled()
        };
        assert_eq!(
            dispatch(URL, "label", &cfg, &client),
            Err(NotifyError::MissingCredential)
        );
        assert!(client.calls.borrow().is_empty());
    }

    #[test]
    fn no_target_fails_before_any_call() {
        let client = ScriptedClient::default();
        assert_eq!(
            dispatch(URL, "label", &enabled(), &client),
            Err(NotifyError::NoTargetConfigured)
        );
        assert!(client.calls.borrow().is_empty());
    }

    #[test]
    fn broadcast_makes_one_call_without_recipient() {
        let client = ScriptedClient::default();
        let cfg = NotifyConfig {
            broadcast: true,
            to_group_ids: Some("C1,C2,C3".into()),
            ..enabled()
        };
        let Dispatch::Sent(report) = dispatch(URL, "Today", &cfg, &client).unwrap() else {
            panic!("expected a send");
        };
        assert!(report.is_success());

        let calls = client.calls.borrow();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "https://msg.test/v2/bot/message/broadcast");
        assert!(calls[0].1.get("to").is_none());
        assert_eq!(calls[0].1["messages"][0]["type"], "text");
        assert_eq!(calls[0].1["messages"][0]["text"], format!("Today\n{URL}"));
    }

    #[test]
    fn group_list_fans_out_and_ignores_single_group() {
        let client = ScriptedClient::default();
        let cfg = NotifyConfig {
            to_group_ids: Some("C1; C2".into()),
            to_group_id: Some("C9".into()),
            ..enabled()
        };
        let Dispatch::Sent(report) = dispatch(URL, "label", &cfg, &client).unwrap() else {
            panic!("expected a send");
        };
        assert!(report.is_success());
        assert_eq!(report.sent_count(), 2);

        let calls = client.calls.borrow();
        let recipients: Vec<_> = calls.iter().map(|(_, b)| b["to"].clone()).collect();
        assert_eq!(recipients, vec!["C1", "C2"]);
        assert!(calls
            .iter()
            .all(|(url, _)| url == "https://msg.test/v2/bot/message/push"));
    }

    #[test]
    fn partial_failure_is_counted_and_marks_dispatch_failed() {
        let client = ScriptedClient::failing("C2", 400);
        let cfg = NotifyConfig {
            to_group_ids: Some("C1,C2,C3".into()),
            ..enabled()
        };
        let result = dispatch(URL, "label", &cfg, &client).unwrap();
        assert!(result.is_failure());
        let Dispatch::Sent(report) = result else {
            panic!("expected a send");
        };

        assert_eq!(client.calls.borrow().len(), 3, "failure must not stop fan-out");
        assert_eq!(report.sent_count(), 2);
        assert_eq!(report.failed_count(), 1);
        assert_eq!(report.valid_target_count(), 3);

        let failed = report.outcomes.iter().find(|o| !o.success).unwrap();
        assert_eq!(failed.target_id, Some(TargetId::from("C2")));
        assert_eq!(failed.http_status, Some(400));
        assert_eq!(
            failed.body_snippet_on_failure.as_deref(),
            Some("{\"status\":400}")
        );
    }

    #[test]
    fn transport_failure_counts_as_failed_send() {
        let mut client = ScriptedClient::default();
        client.unreachable.push("U1".into());
        let cfg = NotifyConfig {
            to_user_id: Some("U1".into()),
            ..enabled()
        };
        let Dispatch::Sent(report) = dispatch(URL, "label", &cfg, &client).unwrap() else {
            panic!("expected a send");
        };
        assert!(!report.is_success());
        assert_eq!(report.outcomes[0].target_type, TargetKind::User);
        assert_eq!(report.outcomes[0].http_status, None);
        assert!(report.outcomes[0]
            .body_snippet_on_failure
            .as_deref()
            .unwrap()
            .contains("connection refused"));
    }

    #[test]
    fn preflight_reports_disabled_and_resolved_targets() {
        assert_eq!(preflight(&NotifyConfig::default()), Ok(None));
        let cfg = NotifyConfig {
            to_user_id: Some("U1".into()),
            ..enabled()
        };
        assert_eq!(
            preflight(&cfg),
            Ok(Some(NotificationTarget::SingleUser(TargetId::from("U1"))))
        );
        let no_token = NotifyConfig {
            channel_access_token: Some("  ".into()),
            ..cfg
        };
        assert_eq!(preflight(&no_token), Err(NotifyError::MissingCredential));
    }

    #[test]
    fn snippet_is_bounded_on_char_boundaries() {
        let long = "あ".repeat(BODY_SNIPPET_CHARS + 10);
        let cut = snippet(&long);
        assert_eq!(cut.chars().count(), BODY_SNIPPET_CHARS + 1);
        assert!(cut.ends_with('…'));
        assert_eq!(snippet("  short  "), "short");
    }
}
