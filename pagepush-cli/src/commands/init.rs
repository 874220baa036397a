//! `pagepush init [--force]`

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Args;
use colored::Colorize;

use pagepush_core::types::jst;
use pagepush_publish::scaffold_source;

use super::Workspace;

/// Create the source page from its template.
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Overwrite an existing source page.
    #[arg(long)]
    pub force: bool,
}

impl InitArgs {
    pub fn run(self, workspace: &Workspace) -> Result<()> {
        let config = workspace.load_config()?;
        let template = config.template_path(&workspace.root);
        let source = config.source_path(&workspace.root);
        let today = Utc::now().with_timezone(&jst()).format("%Y-%m-%d").to_string();

        scaffold_source(&template, &source, &today, self.force)
            .with_context(|| format!("failed to create {}", source.display()))?;

        println!(
            "{} Created {} from {}",
            "✓".green(),
            config.source.display(),
            config.template.display()
        );
        println!("  Edit it, then run `pagepush publish`.");
        Ok(())
    }
}
