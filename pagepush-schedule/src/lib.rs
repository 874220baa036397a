//! Periodic `pagepush publish` runs via a per-user launchd agent.

mod error;
pub mod launchd;
pub mod paths;

pub use error::ScheduleError;
pub use launchd::{generate_plist, install, uninstall, ScheduleTime};
