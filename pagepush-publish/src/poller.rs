//! Reflection poller: wait until the pages host serves this run's marker.

use std::thread;
use std::time::{Duration, Instant};

use chrono::Utc;
use pagepush_core::PollOutcome;

use crate::error::FetchError;

/// Query parameter carrying the per-attempt cache-defeating nonce.
pub const NONCE_PARAM: &str = "_pagepush";

/// Browser-like agent string; some CDNs treat bare library agents differently.
pub const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/145.0 Safari/537.36";

/// Read-only fetch of a public URL.
pub trait Fetcher {
    /// Body of a 2xx response; anything else is an error. A request still
    /// pending after `timeout` fails with [`FetchError::Transport`].
    fn fetch(&self, url: &str, timeout: Duration) -> Result<String, FetchError>;
}

/// Blocking [`Fetcher`] backed by a `ureq` agent.
pub struct UreqFetcher {
    agent: ureq::Agent,
}

impl UreqFetcher {
    /// Upper bound on a single request, whatever the poll budget.
    pub const TIMEOUT: Duration = Duration::from_secs(20);

    pub fn new() -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Self::TIMEOUT)
            .user_agent(USER_AGENT)
            .build();
        Self { agent }
    }
}

impl Default for UreqFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Fetcher for UreqFetcher {
    fn fetch(&self, url: &str, timeout: Duration) -> Result<String, FetchError> {
        let response = self
            .agent
            .get(url)
            .timeout(timeout.min(Self::TIMEOUT))
            .set("Cache-Control", "no-cache")
            .set("Pragma", "no-cache")
            .call()
            .map_err(|err| match err {
                ureq::Error::Status(status, _) => FetchError::Status(status),
                ureq::Error::Transport(t) => FetchError::Transport(t.to_string()),
            })?;
        let status = response.status();
        if !(200..300).contains(&status) {
            return Err(FetchError::Status(status));
        }
        response
            .into_string()
            .map_err(|e| FetchError::Body(e.to_string()))
    }
}

/// `url` plus a nonce parameter unique to this attempt.
pub fn nonce_url(url: &str, attempt: u32) -> String {
    let separator = if url.contains('?') { '&' } else { '?' };
    format!(
        "{url}{separator}{NONCE_PARAM}={}-{attempt}",
        Utc::now().timestamp_millis()
    )
}

/// Fetch `url` until its body contains `marker` or `timeout` elapses.
///
/// Fetch errors count as "not yet reflected". Sleeps `interval` between
/// attempts; the first attempt is immediate. Each request is bounded by the
/// remaining budget (at least one `interval`), so a host that never answers
/// cannot hold the run past the deadline.
pub fn wait_for_reflection(
    fetcher: &dyn Fetcher,
    url: &str,
    marker: &str,
    timeout: Duration,
    interval: Duration,
) -> PollOutcome {
    let started = Instant::now();
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        let budget = timeout.saturating_sub(started.elapsed()).max(interval);
        match fetcher.fetch(&nonce_url(url, attempts), budget) {
            Ok(body) if body.contains(marker) => {
                let elapsed = started.elapsed();
                tracing::info!(attempts, elapsed_s = elapsed.as_secs(), "page reflected");
                return PollOutcome {
                    succeeded: true,
                    elapsed,
                    attempts,
                };
            }
            Ok(_) => tracing::debug!(attempts, "marker not served yet"),
            Err(err) => tracing::debug!(attempts, error = %err, "fetch failed; will retry"),
        }

        let elapsed = started.elapsed();
        if elapsed >= timeout {
            tracing::warn!(
                attempts,
                timeout_s = timeout.as_secs(),
                "page not reflected before timeout"
            );
            return PollOutcome {
                succeeded: false,
                elapsed,
                attempts,
            };
        }
        thread::sleep(interval);
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::VecDeque;

    use super::*;

    /// Plays back scripted responses, then repeats the last one.
    struct ScriptedFetcher {
        script: RefCell<VecDeque<Result<String, FetchError>>>,
        last: Result<String, FetchError>,
        urls: RefCell<Vec<String>>,
        budgets: RefCell<Vec<Duration>>,
    }

    impl ScriptedFetcher {
        fn new(script: Vec<Result<String, FetchError>>, last: Result<String, FetchError>) -> Self {
            Self {
                script: RefCell::new(script.into()),
                last,
                urls: RefCell::new(Vec::new()),
                budgets: RefCell::new(Vec::new()),
            }
        }
    }

    impl Fetcher for ScriptedFetcher {
        fn fetch(&self, url: &str, timeout: Duration) -> Result<String, FetchError> {
            self.urls.borrow_mut().push(url.to_string());
            self.budgets.borrow_mut().push(timeout);
            self.script
                .borrow_mut()
                .pop_front()
                .unwrap_or_else(|| self.last.clone())
        }
    }

    const URL: &str = "https://kei.github.io/events/?v=20260302-000405";
    const MARKER: &str = "PAGES_BUILD_JST:20260302-000405";

    #[test]
    fn first_attempt_hit_returns_immediately() {
        let fetcher = ScriptedFetcher::new(vec![], Ok(format!("<!-- {MARKER} -->")));
        let outcome = wait_for_reflection(
            &fetcher,
            URL,
            MARKER,
            Duration::from_secs(5),
            Duration::from_secs(5),
        );
        assert!(outcome.succeeded);
        assert_eq!(outcome.attempts, 1);
        assert!(outcome.elapsed < Duration::from_secs(1));
    }

    #[test]
    fn errors_and_stale_pages_are_retried() {
        let fetcher = ScriptedFetcher::new(
            vec![
                Err(FetchError::Transport("dns".into())),
                Err(FetchError::Status(404)),
                Ok("<!-- PAGES_BUILD_JST:20260301-235959 -->".into()),
            ],
            Ok(format!("<!-- {MARKER} -->\n<html>")),
        );
        let outcome = wait_for_reflection(
            &fetcher,
            URL,
            MARKER,
            Duration::from_secs(5),
            Duration::from_millis(10),
        );
        assert!(outcome.succeeded);
        assert_eq!(outcome.attempts, 4);
    }

    #[test]
    fn previous_runs_marker_never_satisfies_the_wait() {
        let fetcher = ScriptedFetcher::new(
            vec![],
            Ok("<!-- PAGES_BUILD_JST:20260302-000404 -->".into()),
        );
        let outcome = wait_for_reflection(
            &fetcher,
            URL,
            MARKER,
            Duration::from_millis(60),
            Duration::from_millis(20),
        );
        assert!(!outcome.succeeded);
    }

    #[test]
    fn timeout_boundary_allows_one_interval_of_slack() {
        let timeout = Duration::from_millis(300);
        let interval = Duration::from_millis(150);
        let fetcher = ScriptedFetcher::new(vec![], Ok("stale".into()));

        let outcome = wait_for_reflection(&fetcher, URL, MARKER, timeout, interval);

        assert!(!outcome.succeeded);
        assert!(outcome.attempts >= 2, "attempts = {}", outcome.attempts);
        assert!(outcome.elapsed >= timeout, "elapsed = {:?}", outcome.elapsed);
        assert!(
            outcome.elapsed <= timeout + interval + Duration::from_millis(100),
            "elapsed = {:?}",
            outcome.elapsed
        );
    }

    #[test]
    fn every_attempt_carries_a_distinct_nonce() {
        let fetcher = ScriptedFetcher::new(vec![], Ok("stale".into()));
        wait_for_reflection(
            &fetcher,
            URL,
            MARKER,
            Duration::from_millis(30),
            Duration::from_millis(10),
        );
        let urls = fetcher.urls.borrow();
        assert!(urls.len() >= 2);
        for url in urls.iter() {
            assert!(url.starts_with(&format!("{URL}&{NONCE_PARAM}=")), "got: {url}");
        }
        let unique: std::collections::HashSet<_> = urls.iter().collect();
        assert_eq!(unique.len(), urls.len());
    }

    #[test]
    fn request_budget_shrinks_with_the_remaining_time() {
        let timeout = Duration::from_millis(200);
        let interval = Duration::from_millis(50);
        let fetcher = ScriptedFetcher::new(vec![], Ok("stale".into()));

        wait_for_reflection(&fetcher, URL, MARKER, timeout, interval);

        let budgets = fetcher.budgets.borrow();
        assert!(budgets.len() >= 2);
        assert!(budgets[0] <= timeout);
        assert!(budgets.windows(2).all(|w| w[1] <= w[0]), "got: {budgets:?}");
        assert!(budgets.iter().all(|b| *b >= interval), "got: {budgets:?}");
    }

    #[test]
    fn nonce_url_without_query_uses_question_mark() {
        let url = nonce_url("https://kei.github.io/", 3);
        assert!(url.starts_with("https://kei.github.io/?_pagepush="));
        assert!(url.ends_with("-3"));
    }
}
