use std::path::{Path, PathBuf};

pub const JOB_LABEL: &str = "dev.pagepush.publish";

pub const JOB_STDOUT_LOG: &str = "publish.log";
pub const JOB_STDERR_LOG: &str = "publish-err.log";

/// Per-repository state directory, `<root>/.pagepush`.
pub fn state_dir(repo_root: &Path) -> PathBuf {
    repo_root.join(".pagepush")
}

pub fn logs_dir(repo_root: &Path) -> PathBuf {
    state_dir(repo_root).join("logs")
}

pub fn launch_agents_dir(home: &Path) -> PathBuf {
    home.join("Library").join("LaunchAgents")
}

pub fn launchd_plist_path(home: &Path) -> PathBuf {
    launch_agents_dir(home).join(format!("{JOB_LABEL}.plist"))
}
