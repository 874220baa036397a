//! Version-control driver.
//!
//! Every invocation is pinned to the repository root with `git -C <root>`,
//! so the process working directory is never changed.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use crate::error::{io_err, PublishError};

/// The version-control operations a publish run needs.
pub trait Vcs {
    /// Fail with [`PublishError::NotARepository`] unless the root is a work tree.
    fn ensure_repository(&self) -> Result<(), PublishError>;
    /// Stage every working-tree change (`add -A`).
    fn stage_all(&self) -> Result<(), PublishError>;
    /// `true` when the index differs from `HEAD`.
    fn has_staged_changes(&self) -> Result<bool, PublishError>;
    fn commit(&self, message: &str) -> Result<(), PublishError>;
    /// Push the current branch to its configured upstream.
    fn push(&self) -> Result<(), PublishError>;
    /// `true` when `HEAD` has commits its upstream lacks. No upstream is `false`.
    fn has_unpushed_commits(&self) -> Result<bool, PublishError>;
}

/// [`Vcs`] backed by the `git` executable.
#[derive(Debug, Clone)]
pub struct GitRepo {
    root: PathBuf,
}

impl GitRepo {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Top-level directory of the work tree containing `start`.
    pub fn discover(start: &Path) -> Result<Self, PublishError> {
        let output = Command::new("git")
            .arg("-C")
            .arg(start)
            .args(["rev-parse", "--show-toplevel"])
            .output()
            .map_err(|e| io_err("git", e))?;
        if !output.status.success() {
            return Err(PublishError::NotARepository {
                path: start.to_path_buf(),
                detail: describe(&output),
            });
        }
        let top = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok(Self::new(top))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// URL of the named remote, if it exists.
    pub fn remote_url(&self, remote: &str) -> Option<String> {
        let output = self.run(&["remote", "get-url", remote]).ok()?;
        if !output.status.success() {
            return None;
        }
        let url = String::from_utf8_lossy(&output.stdout).trim().to_string();
        (!url.is_empty()).then_some(url)
    }

    fn run(&self, args: &[&str]) -> Result<Output, PublishError> {
        tracing::debug!(root = %self.root.display(), "git {}", args.join(" "));
        Command::new("git")
            .arg("-C")
            .arg(&self.root)
            .args(args)
            .output()
            .map_err(|e| io_err("git", e))
    }

    fn run_checked(&self, args: &[&str]) -> Result<Output, PublishError> {
        let output = self.run(args)?;
        if output.status.success() {
            return Ok(output);
        }
        Err(PublishError::Git {
            command: args.join(" "),
            detail: describe(&output),
        })
    }
}

impl Vcs for GitRepo {
    fn ensure_repository(&self) -> Result<(), PublishError> {
        let output = self.run(&["rev-parse", "--is-inside-work-tree"])?;
        let inside = String::from_utf8_lossy(&output.stdout).trim() == "true";
        if output.status.success() && inside {
            return Ok(());
        }
        Err(PublishError::NotARepository {
            path: self.root.clone(),
            detail: describe(&output),
        })
    }

    fn stage_all(&self) -> Result<(), PublishError> {
        self.run_checked(&["add", "-A"]).map(|_| ())
    }

    fn has_staged_changes(&self) -> Result<bool, PublishError> {
        let output = self.run(&["diff", "--cached", "--quiet"])?;
        match output.status.code() {
            Some(0) => Ok(false),
            Some(1) => Ok(true),
            _ => Err(PublishError::Git {
                command: "diff --cached --quiet".to_string(),
                detail: describe(&output),
            }),
        }
    }

    fn commit(&self, message: &str) -> Result<(), PublishError> {
        self.run_checked(&["commit", "-m", message]).map(|_| ())
    }

    fn push(&self) -> Result<(), PublishError> {
        let output = self.run(&["push"])?;
        if output.status.success() {
            return Ok(());
        }
        Err(PublishError::Push {
            detail: describe(&output),
        })
    }

    fn has_unpushed_commits(&self) -> Result<bool, PublishError> {
        let output = self.run(&["rev-list", "--count", "@{upstream}..HEAD"])?;
        if !output.status.success() {
            tracing::debug!(detail = %describe(&output), "no upstream to compare against");
            return Ok(false);
        }
        let count = String::from_utf8_lossy(&output.stdout).trim().to_string();
        count
            .parse::<u64>()
            .map(|n| n > 0)
            .map_err(|_| PublishError::Git {
                command: "rev-list --count @{upstream}..HEAD".to_string(),
                detail: format!("unexpected output: {count}"),
            })
    }
}

fn describe(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
    match (stderr.is_empty(), stdout.is_empty()) {
        (false, _) => stderr,
        (true, false) => stdout,
        (true, true) => format!("exited with {}", output.status),
    }
}
