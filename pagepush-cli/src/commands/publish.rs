//! `pagepush publish [-m <message>]`

use std::process::ExitCode;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Args;
use colored::Colorize;

use pagepush_core::PublishRequest;
use pagepush_notify::UreqMessagingClient;
use pagepush_publish::{
    publish, Collaborators, ContentSync, NotificationStage, PublishEvent, PublishReport,
    UreqFetcher,
};

use super::{exit_status, Workspace};

/// Publish the source page.
#[derive(Args, Debug)]
pub struct PublishArgs {
    /// Commit annotation; defaults to today's date.
    #[arg(long, short = 'm')]
    pub message: Option<String>,
}

impl PublishArgs {
    pub fn run(self, workspace: &Workspace) -> Result<ExitCode> {
        let config = workspace.load_config()?;
        let request = PublishRequest::new(self.message, Utc::now());

        let repo = workspace.repo();
        let fetcher = UreqFetcher::new();
        let messenger = UreqMessagingClient::new();
        let deps = Collaborators {
            vcs: &repo,
            fetcher: &fetcher,
            messenger: &messenger,
        };

        let report = publish(&workspace.root, &config, &request, &deps, &mut print_event)
            .context("publish failed")?;

        match &report {
            PublishReport::NoChanges { .. } => {}
            PublishReport::Published(run) => {
                let warnings = run.warnings();
                if warnings.is_empty() {
                    println!("{} Published {}", "✓".green(), run.url);
                } else {
                    for warning in &warnings {
                        println!("{} {warning}", "!".yellow());
                    }
                    println!("{} Published with warnings: {}", "!".yellow(), run.url);
                }
            }
        }
        Ok(exit_status(report.is_degraded()))
    }
}

fn print_event(event: &PublishEvent) {
    match event {
        PublishEvent::ContentStaged(ContentSync::Written { path }) => {
            println!("{} Updated {}", "✓".green(), path.display());
        }
        PublishEvent::ContentStaged(ContentSync::Unchanged { path }) => {
            println!("{} {} already matches the source", "·".dimmed(), path.display());
        }
        PublishEvent::NoChanges { url } => {
            println!("{} Nothing to publish", "·".dimmed());
            println!("  Current URL: {url}");
        }
        PublishEvent::Committed { message, marker } => {
            println!("{} Committed '{message}' ({marker})", "✓".green());
        }
        PublishEvent::ResumingPush { marker } => {
            println!(
                "{} Source unchanged; pushing the earlier unpushed commit ({marker})",
                "…".cyan()
            );
        }
        PublishEvent::Pushed => println!("{} Pushed", "✓".green()),
        PublishEvent::UrlReady { url } => println!("  URL: {url}"),
        PublishEvent::PollStarted { timeout } => {
            println!(
                "{} Waiting up to {}s for the page to go live",
                "…".cyan(),
                timeout.as_secs()
            );
        }
        PublishEvent::PollFinished(outcome) if outcome.succeeded => {
            println!(
                "{} Live after {}s ({} checks)",
                "✓".green(),
                outcome.elapsed_seconds(),
                outcome.attempts
            );
        }
        PublishEvent::PollFinished(outcome) => {
            println!(
                "{} Not live after {}s ({} checks)",
                "!".yellow(),
                outcome.elapsed_seconds(),
                outcome.attempts
            );
        }
        PublishEvent::Notified(stage) => print_notification(stage),
    }
}

pub(crate) fn print_notification(stage: &NotificationStage) {
    match stage {
        NotificationStage::Skipped => {
            println!("{} Notification skipped (AUTO_SEND is off)", "·".dimmed());
        }
        NotificationStage::Delivered(report) => {
            println!(
                "{} Notified {} target(s) via {}",
                "✓".green(),
                report.sent_count(),
                report.target.mode_name()
            );
        }
        NotificationStage::Incomplete(report) => {
            println!(
                "{} Notification incomplete: {} sent, {} failed",
                "!".yellow(),
                report.sent_count(),
                report.failed_count()
            );
            for outcome in report.outcomes.iter().filter(|o| !o.success) {
                let id = outcome
                    .target_id
                    .as_ref()
                    .map(|id| id.to_string())
                    .unwrap_or_else(|| "broadcast".to_string());
                let status = outcome
                    .http_status
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "no response".to_string());
                let body = outcome.body_snippet_on_failure.as_deref().unwrap_or("");
                println!("    {id}: {status} {body}");
            }
        }
        NotificationStage::Error(err) => {
            println!("{} Notification not sent: {err}", "!".yellow());
        }
    }
}
