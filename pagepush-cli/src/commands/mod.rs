pub mod config;
pub mod init;
pub mod notify;
pub mod publish;
pub mod schedule;

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};

use pagepush_core::config::derive_github_pages_url;
use pagepush_core::PagesConfig;
use pagepush_publish::GitRepo;

/// Exit status for a publish that went out but was not fully confirmed.
pub const EXIT_DEGRADED: u8 = 2;

pub fn exit_status(degraded: bool) -> ExitCode {
    if degraded {
        ExitCode::from(EXIT_DEGRADED)
    } else {
        ExitCode::SUCCESS
    }
}

/// Repository root plus the process environment, captured once per run.
#[derive(Debug)]
pub struct Workspace {
    pub root: PathBuf,
    pub env: HashMap<String, String>,
}

impl Workspace {
    /// `--repo` as given, else the enclosing git top-level, else the current dir.
    pub fn resolve(repo: Option<PathBuf>) -> Result<Self> {
        let root = match repo {
            Some(dir) => dir,
            None => {
                let cwd = std::env::current_dir().context("cannot read current directory")?;
                match GitRepo::discover(&cwd) {
                    Ok(repo) => repo.root().to_path_buf(),
                    Err(err) => {
                        tracing::debug!(error = %err, "not inside a git work tree; using {}", cwd.display());
                        cwd
                    }
                }
            }
        };
        Ok(Self {
            root,
            env: std::env::vars().collect(),
        })
    }

    pub fn repo(&self) -> GitRepo {
        GitRepo::new(&self.root)
    }

    /// Load configuration; fill `base_url` from a GitHub `origin` when unset.
    pub fn load_config(&self) -> Result<PagesConfig> {
        let mut config = PagesConfig::load_at(&self.root, &self.env).with_context(|| {
            format!(
                "failed to load configuration from {}",
                PagesConfig::file_path_at(&self.root).display()
            )
        })?;
        if config.base_url.is_none() {
            config.base_url = self
                .repo()
                .remote_url("origin")
                .and_then(|remote| derive_github_pages_url(&remote));
        }
        Ok(config)
    }
}
