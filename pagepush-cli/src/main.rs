//! pagepush: publish a hand-edited HTML page to a git-hosted pages site.
//!
//! # Usage
//!
//! ```text
//! pagepush [--repo <dir>] [--verbose] publish [-m <message>]
//! pagepush notify [--url <url>] [--label <label>]
//! pagepush init [--force]
//! pagepush config
//! pagepush schedule install --hour <H> --minute <M>
//! pagepush schedule uninstall
//! pagepush schedule show [--hour <H>] [--minute <M>]
//! ```
//!
//! Exit status: 0 on success or nothing to do, 1 on a fatal error, 2 when the
//! push went out but reflection or notification could not be confirmed.

mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{
    config::ConfigArgs, init::InitArgs, notify::NotifyArgs, publish::PublishArgs,
    schedule::ScheduleCommand, Workspace,
};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "pagepush",
    version,
    about = "Publish a hand-edited HTML page, wait for it to go live, and notify subscribers",
    long_about = None,
)]
struct Cli {
    /// Repository root. Defaults to the git top-level of the current directory.
    #[arg(long, global = true, value_name = "DIR")]
    repo: Option<PathBuf>,

    /// Log stage transitions (equivalent to RUST_LOG=info).
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Copy the source page, commit, push, wait for it to go live, notify.
    Publish(PublishArgs),

    /// Send the notification for the current (or given) URL without publishing.
    Notify(NotifyArgs),

    /// Create the source page from its template.
    Init(InitArgs),

    /// Print the resolved configuration.
    Config(ConfigArgs),

    /// Manage the daily scheduled publish (macOS launchd).
    Schedule {
        #[command(subcommand)]
        command: ScheduleCommand,
    },
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let workspace = Workspace::resolve(cli.repo)?;
    match cli.command {
        Commands::Publish(args) => args.run(&workspace),
        Commands::Notify(args) => args.run(&workspace),
        Commands::Init(args) => args.run(&workspace).map(|()| ExitCode::SUCCESS),
        Commands::Config(args) => args.run(&workspace).map(|()| ExitCode::SUCCESS),
        Commands::Schedule { command } => {
            commands::schedule::run(command, &workspace).map(|()| ExitCode::SUCCESS)
        }
    }
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = if verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
