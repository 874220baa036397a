//! `pagepush schedule`: daily publish via a launchd agent.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use colored::Colorize;

use pagepush_schedule::{generate_plist, install, uninstall, ScheduleTime};

use super::Workspace;

#[derive(Subcommand, Debug)]
pub enum ScheduleCommand {
    /// Write and load the launchd agent.
    Install(TimeArgs),
    /// Boot out and remove the launchd agent.
    Uninstall,
    /// Print the plist that `install` would write.
    Show(TimeArgs),
}

#[derive(Args, Debug)]
pub struct TimeArgs {
    /// Hour of day (0-23, local time).
    #[arg(long, default_value_t = 9)]
    pub hour: u8,

    /// Minute of the hour (0-59).
    #[arg(long, default_value_t = 0)]
    pub minute: u8,
}

impl TimeArgs {
    fn schedule_time(&self) -> Result<ScheduleTime> {
        Ok(ScheduleTime::new(self.hour, self.minute)?)
    }
}

pub fn run(command: ScheduleCommand, workspace: &Workspace) -> Result<()> {
    match command {
        ScheduleCommand::Install(args) => {
            let at = args.schedule_time()?;
            let home = dirs::home_dir().context("could not determine home directory")?;
            let binary = current_binary()?;
            let path = install(&home, &binary, &workspace.root, at)
                .context("failed to install scheduled publish")?;
            println!(
                "{} Scheduled daily publish at {:02}:{:02}",
                "✓".green(),
                at.hour(),
                at.minute()
            );
            println!("  Agent: {}", path.display());
        }
        ScheduleCommand::Uninstall => {
            let home = dirs::home_dir().context("could not determine home directory")?;
            if uninstall(&home).context("failed to uninstall scheduled publish")? {
                println!("{} Removed scheduled publish", "✓".green());
            } else {
                println!("{} No scheduled publish installed", "·".dimmed());
            }
        }
        ScheduleCommand::Show(args) => {
            let at = args.schedule_time()?;
            print!("{}", generate_plist(&current_binary()?, &workspace.root, at));
        }
    }
    Ok(())
}

fn current_binary() -> Result<PathBuf> {
    std::env::current_exe().context("cannot locate the pagepush executable")
}
