use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One chat+repository subscription, as persisted in `monitored_repos`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MonitoredRepo {
    pub id: i64,
    pub chat_id: i64,
    pub repo_url: String,
    pub owner: String,
    pub repo_name: String,
    pub branch: Option<String>,
    pub check_interval: Option<i64>,
    pub monitor_commits: bool,
    pub monitor_issues: bool,
    pub monitor_tags: bool,
    pub last_commit_sha: Option<String>,
    pub commit_etag: Option<String>,
    pub last_known_issue_number: Option<i64>,
    pub issue_etag: Option<String>,
    pub last_closed_issue_update_ts: Option<String>,
    pub closed_issue_etag: Option<String>,
    pub last_known_tag_name: Option<String>,
    pub tag_etag: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl MonitoredRepo {
    /// Effective poll interval in seconds, falling back to `default_secs`
    /// when the row carries no per-repo override.
    pub fn effective_interval(&self, default_secs: u64) -> u64 {
        self.check_interval
            .filter(|v| *v > 0)
            .map(|v| v as u64)
            .unwrap_or(default_secs)
    }
}

/// Fields for a new subscription row. Cursor and ETag columns always start
/// out NULL; the first check cycle establishes the baseline.
#[derive(Debug, Clone)]
pub struct NewRepo {
    pub chat_id: i64,
    pub repo_url: String,
    pub owner: String,
    pub repo_name: String,
    pub branch: Option<String>,
    pub check_interval: Option<i64>,
}

/// Partial update descriptor for `monitored_repos`.
///
/// Outer `None` leaves the column untouched; `Some(None)` writes NULL.
/// Each checker only ever touches its own columns, so concurrent updates
/// from different checkers cannot clobber each other.
#[derive(Debug, Clone, Default)]
pub struct RepoUpdate {
    pub check_interval: Option<Option<i64>>,
    pub monitor_commits: Option<bool>,
    pub monitor_issues: Option<bool>,
    pub monitor_tags: Option<bool>,
    pub last_commit_sha: Option<Option<String>>,
    pub commit_etag: Option<Option<String>>,
    pub last_known_issue_number: Option<Option<i64>>,
    pub issue_etag: Option<Option<String>>,
    pub last_closed_issue_update_ts: Option<Option<String>>,
    pub closed_issue_etag: Option<Option<String>>,
    pub last_known_tag_name: Option<Option<String>>,
    pub tag_etag: Option<Option<String>>,
}

impl RepoUpdate {
    pub fn is_empty(&self) -> bool {
        self.check_interval.is_none()
            && self.monitor_commits.is_none()
            && self.monitor_issues.is_none()
            && self.monitor_tags.is_none()
            && self.last_commit_sha.is_none()
            && self.commit_etag.is_none()
            && self.last_known_issue_number.is_none()
            && self.issue_etag.is_none()
            && self.last_closed_issue_update_ts.is_none()
            && self.closed_issue_etag.is_none()
            && self.last_known_tag_name.is_none()
            && self.tag_etag.is_none()
    }
}
