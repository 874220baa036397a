//! `pagepush notify [--url <url>] [--label <label>]`

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Args;

use pagepush_core::cache_bust_url;
use pagepush_notify::{dispatch, NotifyError, UreqMessagingClient};
use pagepush_publish::{current_marker, NotificationStage};

use super::publish::print_notification;
use super::{exit_status, Workspace};

/// Re-send the notification without publishing.
#[derive(Args, Debug)]
pub struct NotifyArgs {
    /// URL to announce. Defaults to the cache-bust URL of the published page.
    #[arg(long)]
    pub url: Option<String>,

    /// Message label shown above the URL.
    #[arg(long)]
    pub label: Option<String>,
}

impl NotifyArgs {
    pub fn run(self, workspace: &Workspace) -> Result<ExitCode> {
        let config = workspace.load_config()?;

        let url = match self.url {
            Some(url) => url,
            None => {
                let base = config.base_url().context("cannot build the page URL")?;
                let published = config.published_path(&workspace.root);
                match current_marker(&published)? {
                    Some(marker) => cache_bust_url(base, &marker.stamp()),
                    None => base.to_string(),
                }
            }
        };
        let label = self.label.unwrap_or_else(|| config.label.clone());

        let client = UreqMessagingClient::new();
        let dispatched =
            dispatch(&url, &label, &config.notify, &client).context("notification not sent")?;
        let stage = NotificationStage::from(Ok::<_, NotifyError>(dispatched));
        print_notification(&stage);
        Ok(exit_status(stage.is_failure()))
    }
}
