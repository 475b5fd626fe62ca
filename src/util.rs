use once_cell::sync::Lazy;
use regex::Regex;

use crate::github::model::RepoCommit;

static MERGE_PR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^Merge pull request #(\d+)").expect("valid merge-PR regex"));

/// Parses a GitHub repository URL into `(owner, repo)`.
/// Accepts `https://github.com/owner/repo` with optional `.git` suffix and
/// trailing path segments.
pub fn parse_repo_url(url: &str) -> Option<(String, String)> {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))?;
    let rest = rest.strip_prefix("www.").unwrap_or(rest);
    let path = rest.strip_prefix("github.com/")?;

    let mut parts = path.split('/').filter(|p| !p.is_empty());
    let owner = parts.next()?;
    let repo = parts.next()?.trim_end_matches(".git");
    if owner.is_empty() || repo.is_empty() {
        return None;
    }
    Some((owner.to_string(), repo.to_string()))
}

/// How a multi-parent commit entered the history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeKind {
    /// `Merge pull request #N` with at least two parents.
    PullRequest(u64),
    /// Any other commit with at least two parents.
    Plain,
}

/// Classifies a commit as a merge. Returns `None` for ordinary
/// single-parent commits.
pub fn merge_kind(commit: &RepoCommit) -> Option<MergeKind> {
    if commit.parents.len() < 2 {
        return None;
    }
    if let Some(caps) = MERGE_PR_RE.captures(&commit.commit.message) {
        if let Ok(number) = caps[1].parse::<u64>() {
            return Some(MergeKind::PullRequest(number));
        }
    }
    Some(MergeKind::Plain)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::model::{CommitDetail, CommitParent, CommitPerson};

    fn commit(message: &str, parents: usize) -> RepoCommit {
        RepoCommit {
            sha: "abcdef1234567890".into(),
            html_url: Some("https://github.com/o/r/commit/abcdef1".into()),
            commit: CommitDetail {
                message: message.into(),
                author: Some(CommitPerson {
                    name: Some("Alice".into()),
                }),
            },
            parents: (0..parents)
                .map(|i| CommitParent {
                    sha: format!("parent{i}"),
                })
                .collect(),
        }
    }

    #[test]
    fn parses_plain_url() {
        assert_eq!(
            parse_repo_url("https://github.com/rust-lang/rust"),
            Some(("rust-lang".into(), "rust".into()))
        );
    }

    #[test]
    fn parses_git_suffix_and_extra_path() {
        assert_eq!(
            parse_repo_url("https://github.com/owner/repo.git"),
            Some(("owner".into(), "repo".into()))
        );
        assert_eq!(
            parse_repo_url("https://github.com/owner/repo/tree/main"),
            Some(("owner".into(), "repo".into()))
        );
    }

    #[test]
    fn rejects_non_github_and_short_urls() {
        assert_eq!(parse_repo_url("https://gitlab.com/owner/repo"), None);
        assert_eq!(parse_repo_url("https://github.com/owner"), None);
        assert_eq!(parse_repo_url(""), None);
    }

    #[test]
    fn merge_kind_detects_pr_merges() {
        let c = commit("Merge pull request #42 from owner/feature", 2);
        assert_eq!(merge_kind(&c), Some(MergeKind::PullRequest(42)));
    }

    #[test]
    fn merge_kind_detects_plain_merges() {
        let c = commit("Merge branch 'release' into main", 2);
        assert_eq!(merge_kind(&c), Some(MergeKind::Plain));
    }

    #[test]
    fn merge_kind_ignores_single_parent_commits() {
        let c = commit("Merge pull request #42 from owner/feature", 1);
        assert_eq!(merge_kind(&c), None);
        let plain = commit("fix typo", 1);
        assert_eq!(merge_kind(&plain), None);
    }
}
