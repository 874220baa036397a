use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use crate::error::{io_err, ScheduleError};
use crate::paths::{
    launch_agents_dir, launchd_plist_path, logs_dir, state_dir, JOB_LABEL, JOB_STDERR_LOG,
    JOB_STDOUT_LOG,
};

/// Daily wall-clock time at which the publish job fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleTime {
    hour: u8,
    minute: u8,
}

impl ScheduleTime {
    pub fn new(hour: u8, minute: u8) -> Result<Self, ScheduleError> {
        if hour > 23 || minute > 59 {
            return Err(ScheduleError::InvalidTime { hour, minute });
        }
        Ok(Self { hour, minute })
    }

    pub fn hour(&self) -> u8 {
        self.hour
    }

    pub fn minute(&self) -> u8 {
        self.minute
    }
}

/// Generate a launchd plist that runs `pagepush publish` for `repo_root` daily.
pub fn generate_plist(binary_path: &Path, repo_root: &Path, at: ScheduleTime) -> String {
    let logs = logs_dir(repo_root);
    let stdout = escape(&logs.join(JOB_STDOUT_LOG).display().to_string());
    let stderr = escape(&logs.join(JOB_STDERR_LOG).display().to_string());
    let binary = escape(&binary_path.display().to_string());
    let root = escape(&repo_root.display().to_string());

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
  <key>Label</key>
  <string>{label}</string>
  <key>ProgramArguments</key>
  <array>
    <string>{binary}</string>
    <string>--repo</string>
    <string>{root}</string>
    <string>publish</string>
  </array>
  <key>WorkingDirectory</key>
  <string>{root}</string>
  <key>StartCalendarInterval</key>
  <dict>
    <key>Hour</key>
    <integer>{hour}</integer>
    <key>Minute</key>
    <integer>{minute}</integer>
  </dict>
  <key>RunAtLoad</key>
  <false/>
  <key>StandardOutPath</key>
  <string>{stdout}</string>
  <key>StandardErrorPath</key>
  <string>{stderr}</string>
</dict>
</plist>
"#,
        label = JOB_LABEL,
        hour = at.hour,
        minute = at.minute,
    )
}

/// Write the plist under `home` and load it into the user's launchd domain.
///
/// Also creates `<root>/.pagepush/logs` with a catch-all `.gitignore`, so job
/// logs never show up as publishable changes.
pub fn install(
    home: &Path,
    binary_path: &Path,
    repo_root: &Path,
    at: ScheduleTime,
) -> Result<PathBuf, ScheduleError> {
    ensure_macos()?;

    let launch_agents = launch_agents_dir(home);
    fs::create_dir_all(&launch_agents).map_err(|e| io_err(&launch_agents, e))?;

    let logs = logs_dir(repo_root);
    fs::create_dir_all(&logs).map_err(|e| io_err(&logs, e))?;
    let ignore = state_dir(repo_root).join(".gitignore");
    if !ignore.exists() {
        fs::write(&ignore, "*\n").map_err(|e| io_err(&ignore, e))?;
    }

    let plist = launchd_plist_path(home);
    fs::write(&plist, generate_plist(binary_path, repo_root, at))
        .map_err(|e| io_err(&plist, e))?;

    let domain = launchctl_domain()?;
    let service = format!("{domain}/{JOB_LABEL}");

    // Replace any previously loaded version.
    let _ = run_launchctl(&["bootout", &service], true);
    run_launchctl(&["bootstrap", &domain, &plist.display().to_string()], false)?;

    tracing::info!(
        plist = %plist.display(),
        "scheduled daily publish at {:02}:{:02}",
        at.hour,
        at.minute
    );
    Ok(plist)
}

/// Boot out the job and remove its plist. Returns `false` if none was installed.
pub fn uninstall(home: &Path) -> Result<bool, ScheduleError> {
    ensure_macos()?;

    let plist = launchd_plist_path(home);
    if !plist.exists() {
        return Ok(false);
    }
    let domain = launchctl_domain()?;
    let service = format!("{domain}/{JOB_LABEL}");
    let _ = run_launchctl(&["bootout", &service], true);
    fs::remove_file(&plist).map_err(|e| io_err(&plist, e))?;
    tracing::info!(plist = %plist.display(), "removed scheduled publish");
    Ok(true)
}

#[cfg(target_os = "macos")]
fn ensure_macos() -> Result<(), ScheduleError> {
    Ok(())
}

#[cfg(not(target_os = "macos"))]
fn ensure_macos() -> Result<(), ScheduleError> {
    Err(ScheduleError::Launchd(
        "launchd scheduling is only supported on macOS".to_string(),
    ))
}

fn run_launchctl(args: &[&str], ignore_failure: bool) -> Result<(), ScheduleError> {
    let output = Command::new("launchctl")
        .args(args)
        .output()
        .map_err(|e| io_err("launchctl", e))?;
    if output.status.success() || ignore_failure {
        return Ok(());
    }
    Err(ScheduleError::Launchd(format!(
        "`launchctl {}` rejected the publish agent: {}",
        args.join(" "),
        output_detail(&output)
    )))
}

/// `gui/<uid>`, the per-login launchd domain the publish agent lives in.
fn launchctl_domain() -> Result<String, ScheduleError> {
    let output = Command::new("id")
        .arg("-u")
        .output()
        .map_err(|e| io_err("id -u", e))?;
    let uid = String::from_utf8_lossy(&output.stdout).trim().to_string();
    match (output.status.success(), uid.parse::<u32>()) {
        (true, Ok(uid)) => Ok(format!("gui/{uid}")),
        _ => Err(ScheduleError::Launchd(format!(
            "cannot resolve the login uid for the launchd gui domain: {}",
            output_detail(&output)
        ))),
    }
}

fn output_detail(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    if !stderr.is_empty() {
        return stderr;
    }
    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if !stdout.is_empty() {
        return stdout;
    }
    format!("exited with {}", output.status)
}

fn escape(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use plist::Value;
    use rstest::rstest;

    fn parse(xml: &str) -> plist::Dictionary {
        Value::from_reader_xml(xml.as_bytes())
            .expect("parse plist")
            .into_dictionary()
            .expect("plist root dict")
    }

    #[cfg(unix)]
    #[test]
    fn failure_detail_prefers_stderr_then_stdout_then_status() {
        use std::os::unix::process::ExitStatusExt;

        let output = |stdout: &str, stderr: &str| Output {
            status: std::process::ExitStatus::from_raw(5 << 8),
            stdout: stdout.as_bytes().to_vec(),
            stderr: stderr.as_bytes().to_vec(),
        };

        assert_eq!(
            output_detail(&output("ignored", "Bootstrap failed: 5: Input/output error\n")),
            "Bootstrap failed: 5: Input/output error"
        );
        assert_eq!(output_detail(&output("  no such service\n", "")), "no such service");
        assert!(output_detail(&output("", "")).starts_with("exited with"));
    }

    #[test]
    fn plist_runs_publish_for_the_repository_daily() {
        let binary = Path::new("/usr/local/bin/pagepush");
        let root = Path::new("/Users/kei/events");
        let dict = parse(&generate_plist(binary, root, ScheduleTime::new(7, 30).unwrap()));

        assert_eq!(
            dict.get("Label").and_then(Value::as_string),
            Some("dev.pagepush.publish")
        );
        assert_eq!(dict.get("RunAtLoad").and_then(Value::as_boolean), Some(false));
        assert_eq!(
            dict.get("WorkingDirectory").and_then(Value::as_string),
            Some("/Users/kei/events")
        );

        let args: Vec<&str> = dict
            .get("ProgramArguments")
            .and_then(Value::as_array)
            .expect("ProgramArguments array")
            .iter()
            .map(|v| v.as_string().expect("program arg as string"))
            .collect();
        assert_eq!(
            args,
            vec!["/usr/local/bin/pagepush", "--repo", "/Users/kei/events", "publish"]
        );

        let interval = dict
            .get("StartCalendarInterval")
            .and_then(Value::as_dictionary)
            .expect("StartCalendarInterval dict");
        assert_eq!(
            interval.get("Hour").and_then(Value::as_unsigned_integer),
            Some(7)
        );
        assert_eq!(
            interval.get("Minute").and_then(Value::as_unsigned_integer),
            Some(30)
        );

        assert_eq!(
            dict.get("StandardOutPath").and_then(Value::as_string),
            Some("/Users/kei/events/.pagepush/logs/publish.log")
        );
        assert_eq!(
            dict.get("StandardErrorPath").and_then(Value::as_string),
            Some("/Users/kei/events/.pagepush/logs/publish-err.log")
        );
    }

    #[test]
    fn paths_with_markup_characters_survive() {
        let root = Path::new("/Users/kei/R&D <drafts>");
        let dict = parse(&generate_plist(
            Path::new("/opt/pagepush"),
            root,
            ScheduleTime::new(0, 0).unwrap(),
        ));
        assert_eq!(
            dict.get("WorkingDirectory").and_then(Value::as_string),
            Some("/Users/kei/R&D <drafts>")
        );
    }

    #[rstest]
    #[case(24, 0)]
    #[case(0, 60)]
    #[case(255, 255)]
    fn out_of_range_times_are_rejected(#[case] hour: u8, #[case] minute: u8) {
        assert!(matches!(
            ScheduleTime::new(hour, minute),
            Err(ScheduleError::InvalidTime { .. })
        ));
    }

    #[test]
    fn boundary_times_are_accepted() {
        assert!(ScheduleTime::new(0, 0).is_ok());
        assert!(ScheduleTime::new(23, 59).is_ok());
    }

    #[cfg(not(target_os = "macos"))]
    #[test]
    fn install_is_refused_off_macos() {
        let home = tempfile::TempDir::new().unwrap();
        let err = install(
            home.path(),
            Path::new("/usr/local/bin/pagepush"),
            home.path(),
            ScheduleTime::new(7, 0).unwrap(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("only supported on macOS"));
        assert!(!launchd_plist_path(home.path()).exists());
    }
}
