//! The monitoring engine: detection, formatting, checkers, error
//! classification, the per-repository orchestrator loop, and the task
//! supervisor.

use std::time::Duration;

use crate::config::Config;

pub mod checker;
pub mod classify;
pub mod detect;
pub mod format;
pub mod orchestrator;
pub mod supervisor;

/// Tuning knobs shared by every repository task.
#[derive(Debug, Clone)]
pub struct MonitorSettings {
    /// Poll interval for rows without a per-repo override; also the base of
    /// the exponential backoff.
    pub base_interval: Duration,
    /// Transient-error retries before a monitor stops permanently.
    pub max_retries: u32,
    /// Items requested per API page.
    pub per_page: u32,
    pub max_commits_to_list: usize,
    pub max_issues_to_list: usize,
    pub max_tags_to_list: usize,
}

impl MonitorSettings {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            base_interval: Duration::from_secs(cfg.app.default_check_interval_secs),
            max_retries: cfg.app.max_check_retries,
            per_page: cfg.app.api_page_size,
            max_commits_to_list: cfg.app.notification_caps.commits,
            max_issues_to_list: cfg.app.notification_caps.issues,
            max_tags_to_list: cfg.app.notification_caps.tags,
        }
    }
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            base_interval: Duration::from_secs(300),
            max_retries: 5,
            per_page: 30,
            max_commits_to_list: 4,
            max_issues_to_list: 4,
            max_tags_to_list: 3,
        }
    }
}
