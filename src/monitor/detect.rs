//! Pure detection functions. Each takes the latest API page (newest first)
//! and the last-known cursor, and computes what is new. No I/O, no errors:
//! malformed input degrades to an empty result.

use crate::github::model::{Issue, RepoCommit, Tag};

/// Outcome of scanning a newest-first page against a string cursor
/// (commit SHA or tag name).
#[derive(Debug, Clone, PartialEq)]
pub struct PageScan<T> {
    /// Items newer than the cursor, newest first.
    pub new_items: Vec<T>,
    /// Identifier of the newest item on the page.
    pub latest: Option<String>,
    /// The cursor was unset; this page establishes the baseline.
    pub is_initial: bool,
    /// The cursor did not appear anywhere in the page: history was rewritten
    /// or more items arrived than one page holds.
    pub cursor_missing: bool,
}

impl<T> PageScan<T> {
    fn empty() -> Self {
        Self {
            new_items: Vec::new(),
            latest: None,
            is_initial: false,
            cursor_missing: false,
        }
    }
}

fn scan_by_key<T: Clone>(
    page: &[T],
    key: impl Fn(&T) -> &str,
    cursor: Option<&str>,
) -> PageScan<T> {
    let Some(first) = page.first() else {
        return PageScan::empty();
    };
    let latest = key(first);
    if latest.is_empty() {
        return PageScan::empty();
    }
    let latest = latest.to_string();

    let Some(cursor) = cursor else {
        return PageScan {
            new_items: Vec::new(),
            latest: Some(latest),
            is_initial: true,
            cursor_missing: false,
        };
    };

    if latest == cursor {
        return PageScan {
            new_items: Vec::new(),
            latest: Some(latest),
            is_initial: false,
            cursor_missing: false,
        };
    }

    let mut new_items = Vec::new();
    let mut found_cursor = false;
    for item in page {
        if key(item) == cursor {
            found_cursor = true;
            break;
        }
        new_items.push(item.clone());
    }

    PageScan {
        new_items,
        latest: Some(latest),
        is_initial: false,
        cursor_missing: !found_cursor,
    }
}

/// Scans a commits page against the last-known SHA.
pub fn scan_commits(page: &[RepoCommit], last_sha: Option<&str>) -> PageScan<RepoCommit> {
    scan_by_key(page, |c| c.sha.as_str(), last_sha)
}

/// Scans a tags page against the last-known tag name.
pub fn scan_tags(page: &[Tag], last_tag: Option<&str>) -> PageScan<Tag> {
    scan_by_key(page, |t| t.name.as_str(), last_tag)
}

/// Outcome of scanning an open-issues page (sorted by creation, newest first)
/// against the last-known issue number.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenIssueScan {
    /// Issues with a number above the cursor, newest first.
    pub new_issues: Vec<Issue>,
    pub latest_number: Option<i64>,
    pub is_initial: bool,
}

/// Issue numbers increase strictly with creation order, so the scan stops at
/// the first number at or below the cursor; no cursor-missing flag needed.
pub fn scan_open_issues(page: &[Issue], last_number: Option<i64>) -> OpenIssueScan {
    let Some(first) = page.first() else {
        return OpenIssueScan {
            new_issues: Vec::new(),
            latest_number: None,
            is_initial: false,
        };
    };
    let latest_number = first.number;

    let Some(last_number) = last_number else {
        return OpenIssueScan {
            new_issues: Vec::new(),
            latest_number: Some(latest_number),
            is_initial: true,
        };
    };

    let mut new_issues = Vec::new();
    for issue in page {
        if issue.number <= last_number {
            break;
        }
        new_issues.push(issue.clone());
    }

    OpenIssueScan {
        new_issues,
        latest_number: Some(latest_number),
        is_initial: false,
    }
}

/// Outcome of scanning a closed-issues page (sorted by update, newest first)
/// against the last processed `updated_at` timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct ClosedIssueScan {
    /// Closed issues updated strictly after the cursor, newest first.
    pub newly_closed: Vec<Issue>,
    /// Newest `updated_at` on the page, used as the next cursor.
    pub latest_update_ts: Option<String>,
    pub is_initial: bool,
}

/// ISO-8601 UTC timestamps compare correctly as strings, which keeps this a
/// pure string scan like its siblings.
pub fn scan_closed_issues(page: &[Issue], last_ts: Option<&str>) -> ClosedIssueScan {
    let latest_update_ts = page.first().and_then(|i| i.updated_at.clone());
    if latest_update_ts.is_none() {
        return ClosedIssueScan {
            newly_closed: Vec::new(),
            latest_update_ts: None,
            is_initial: false,
        };
    }

    let Some(last_ts) = last_ts else {
        return ClosedIssueScan {
            newly_closed: Vec::new(),
            latest_update_ts,
            is_initial: true,
        };
    };

    let mut newly_closed = Vec::new();
    for issue in page {
        let Some(updated_at) = issue.updated_at.as_deref() else {
            continue;
        };
        if updated_at <= last_ts {
            // Page is sorted by update desc; nothing further can be newer.
            break;
        }
        if issue.is_closed() {
            newly_closed.push(issue.clone());
        }
    }

    ClosedIssueScan {
        newly_closed,
        latest_update_ts,
        is_initial: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::model::{CommitDetail, TagCommit};

    fn commit(sha: &str) -> RepoCommit {
        RepoCommit {
            sha: sha.into(),
            html_url: Some(format!("https://github.com/o/r/commit/{sha}")),
            commit: CommitDetail {
                message: format!("commit {sha}"),
                author: None,
            },
            parents: Vec::new(),
        }
    }

    fn tag(name: &str) -> Tag {
        Tag {
            name: name.into(),
            commit: Some(TagCommit {
                sha: "0123456789".into(),
            }),
        }
    }

    fn issue(number: i64, state: &str, updated_at: &str) -> Issue {
        Issue {
            number,
            title: Some(format!("issue {number}")),
            html_url: Some(format!("https://github.com/o/r/issues/{number}")),
            state: Some(state.into()),
            updated_at: Some(updated_at.into()),
            user: None,
        }
    }

    #[test]
    fn commits_empty_page_yields_nothing() {
        let scan = scan_commits(&[], Some("abc"));
        assert!(scan.new_items.is_empty());
        assert_eq!(scan.latest, None);
        assert!(!scan.is_initial);
        assert!(!scan.cursor_missing);
    }

    #[test]
    fn commits_initial_run_sets_baseline_without_items() {
        let page = vec![commit("def5678"), commit("abc1234")];
        let scan = scan_commits(&page, None);
        assert!(scan.is_initial);
        assert!(scan.new_items.is_empty());
        assert_eq!(scan.latest.as_deref(), Some("def5678"));
        assert!(!scan.cursor_missing);
    }

    #[test]
    fn commits_no_change_when_head_matches_cursor() {
        let page = vec![commit("abc1234"), commit("older")];
        let scan = scan_commits(&page, Some("abc1234"));
        assert!(scan.new_items.is_empty());
        assert!(!scan.is_initial);
        assert!(!scan.cursor_missing);
        assert_eq!(scan.latest.as_deref(), Some("abc1234"));
    }

    #[test]
    fn commits_collects_everything_above_cursor_newest_first() {
        let page = vec![
            commit("new_3"),
            commit("new_2"),
            commit("new_1"),
            commit("known"),
            commit("old"),
        ];
        let scan = scan_commits(&page, Some("known"));
        let shas: Vec<&str> = scan.new_items.iter().map(|c| c.sha.as_str()).collect();
        assert_eq!(shas, vec!["new_3", "new_2", "new_1"]);
        assert!(!scan.cursor_missing);
    }

    #[test]
    fn commits_single_new_commit_scenario() {
        let page = vec![commit("def5678"), commit("abc1234")];
        let scan = scan_commits(&page, Some("abc1234"));
        let shas: Vec<&str> = scan.new_items.iter().map(|c| c.sha.as_str()).collect();
        assert_eq!(shas, vec!["def5678"]);
        assert_eq!(scan.latest.as_deref(), Some("def5678"));
    }

    #[test]
    fn commits_missing_cursor_flags_force_push_and_returns_page() {
        let page = vec![commit("c3"), commit("c2"), commit("c1")];
        let scan = scan_commits(&page, Some("vanished"));
        assert!(scan.cursor_missing);
        assert_eq!(scan.new_items.len(), 3);
    }

    #[test]
    fn tags_follow_the_commit_algorithm() {
        let page = vec![tag("v1.2.0"), tag("v1.1.0"), tag("v1.0.0")];
        let scan = scan_tags(&page, Some("v1.1.0"));
        let names: Vec<&str> = scan.new_items.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["v1.2.0"]);
        assert!(!scan.cursor_missing);

        let scan = scan_tags(&page, Some("v0.9.0"));
        assert!(scan.cursor_missing);
        assert_eq!(scan.new_items.len(), 3);

        let scan = scan_tags(&page, None);
        assert!(scan.is_initial);
        assert_eq!(scan.latest.as_deref(), Some("v1.2.0"));
    }

    #[test]
    fn open_issues_initial_run_reports_nothing() {
        let page = vec![issue(44, "open", "t")];
        let scan = scan_open_issues(&page, None);
        assert!(scan.is_initial);
        assert!(scan.new_issues.is_empty());
        assert_eq!(scan.latest_number, Some(44));
    }

    #[test]
    fn open_issues_collects_numbers_above_cursor() {
        let page = vec![
            issue(44, "open", "t"),
            issue(43, "open", "t"),
            issue(42, "open", "t"),
        ];
        let scan = scan_open_issues(&page, Some(42));
        let numbers: Vec<i64> = scan.new_issues.iter().map(|i| i.number).collect();
        assert_eq!(numbers, vec![44, 43]);
        assert_eq!(scan.latest_number, Some(44));
    }

    #[test]
    fn open_issues_short_circuits_below_cursor() {
        // A reopened old issue below the cursor must not resurface.
        let page = vec![issue(44, "open", "t"), issue(10, "open", "t")];
        let scan = scan_open_issues(&page, Some(42));
        let numbers: Vec<i64> = scan.new_issues.iter().map(|i| i.number).collect();
        assert_eq!(numbers, vec![44]);
    }

    #[test]
    fn open_issues_empty_page() {
        let scan = scan_open_issues(&[], Some(42));
        assert!(scan.new_issues.is_empty());
        assert_eq!(scan.latest_number, None);
        assert!(!scan.is_initial);
    }

    #[test]
    fn closed_issues_initial_poll_sets_baseline() {
        let page = vec![issue(7, "closed", "2024-03-01T10:00:00Z")];
        let scan = scan_closed_issues(&page, None);
        assert!(scan.is_initial);
        assert!(scan.newly_closed.is_empty());
        assert_eq!(scan.latest_update_ts.as_deref(), Some("2024-03-01T10:00:00Z"));
    }

    #[test]
    fn closed_issues_collects_strictly_newer_closed_items() {
        let page = vec![
            issue(9, "closed", "2024-03-01T12:00:00Z"),
            issue(8, "closed", "2024-03-01T11:00:00Z"),
            issue(7, "closed", "2024-03-01T10:00:00Z"),
        ];
        let scan = scan_closed_issues(&page, Some("2024-03-01T10:00:00Z"));
        let numbers: Vec<i64> = scan.newly_closed.iter().map(|i| i.number).collect();
        assert_eq!(numbers, vec![9, 8]);
        assert_eq!(scan.latest_update_ts.as_deref(), Some("2024-03-01T12:00:00Z"));
    }

    #[test]
    fn closed_issues_skip_non_closed_entries() {
        let page = vec![
            issue(9, "open", "2024-03-01T12:00:00Z"),
            issue(8, "closed", "2024-03-01T11:00:00Z"),
        ];
        let scan = scan_closed_issues(&page, Some("2024-03-01T10:00:00Z"));
        let numbers: Vec<i64> = scan.newly_closed.iter().map(|i| i.number).collect();
        assert_eq!(numbers, vec![8]);
        // Cursor still advances past the open item's newer timestamp.
        assert_eq!(scan.latest_update_ts.as_deref(), Some("2024-03-01T12:00:00Z"));
    }

    #[test]
    fn closed_issues_stop_at_cursor_boundary() {
        let page = vec![
            issue(9, "closed", "2024-03-01T12:00:00Z"),
            issue(7, "closed", "2024-03-01T09:00:00Z"),
            // Sorted desc, so the scan must not reach this entry at all.
            issue(6, "closed", "2024-03-01T13:00:00Z"),
        ];
        let scan = scan_closed_issues(&page, Some("2024-03-01T10:00:00Z"));
        let numbers: Vec<i64> = scan.newly_closed.iter().map(|i| i.number).collect();
        assert_eq!(numbers, vec![9]);
    }
}
