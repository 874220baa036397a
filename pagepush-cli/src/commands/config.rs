//! `pagepush config`: resolved settings as a table, secrets masked.

use anyhow::Result;
use clap::Args;
use tabled::{settings::Style, Table, Tabled};

use pagepush_core::PagesConfig;
use pagepush_notify::preflight;

use super::Workspace;

#[derive(Args, Debug)]
pub struct ConfigArgs {}

#[derive(Tabled)]
struct ConfigRow {
    #[tabled(rename = "setting")]
    key: &'static str,
    #[tabled(rename = "value")]
    value: String,
}

impl ConfigArgs {
    pub fn run(self, workspace: &Workspace) -> Result<()> {
        let config = workspace.load_config()?;
        let rows = rows(workspace, &config);
        println!("{}", Table::new(rows).with(Style::rounded()));
        Ok(())
    }
}

fn rows(workspace: &Workspace, config: &PagesConfig) -> Vec<ConfigRow> {
    let file = PagesConfig::file_path_at(&workspace.root);
    let notify = &config.notify;
    let unset = || "(unset)".to_string();
    let row = |key, value| ConfigRow { key, value };

    let target = match preflight(notify) {
        Ok(None) => "(notification off)".to_string(),
        Ok(Some(target)) => target.mode_name().to_string(),
        Err(err) => format!("error: {err}"),
    };

    vec![
        row("repository", workspace.root.display().to_string()),
        row(
            "config file",
            if file.exists() {
                file.display().to_string()
            } else {
                "(none, defaults)".to_string()
            },
        ),
        row("source", config.source.display().to_string()),
        row("published", config.published.display().to_string()),
        row("template", config.template.display().to_string()),
        row(
            "base url",
            config.base_url.clone().unwrap_or_else(unset),
        ),
        row("label", config.label.clone()),
        row("poll timeout", format!("{}s", config.poll.timeout.as_secs())),
        row("poll interval", format!("{}s", config.poll.interval.as_secs())),
        row("auto send", notify.auto_send.to_string()),
        row("access token", notify.redacted_token().unwrap_or_else(unset)),
        row("broadcast", notify.broadcast.to_string()),
        row("group ids", notify.to_group_ids.clone().unwrap_or_else(unset)),
        row("group id", notify.to_group_id.clone().unwrap_or_else(unset)),
        row("user id", notify.to_user_id.clone().unwrap_or_else(unset)),
        row("target mode", target),
        row("api base", notify.api_base.clone()),
    ]
}
