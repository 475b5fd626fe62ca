//! Renders detection output into notification HTML. All user- and
//! API-provided fields are escaped; URLs built here only interpolate
//! escaped components.

use teloxide::utils::html::escape;

use crate::github::model::{Issue, RepoCommit, Tag};
use crate::strings::{render, Strings};
use crate::util::{merge_kind, MergeKind};

fn merge_indicator(commit: &RepoCommit, owner: &str, repo: &str, compact: bool) -> String {
    match merge_kind(commit) {
        Some(MergeKind::PullRequest(number)) => {
            let pr_url = format!("https://github.com/{owner}/{repo}/pull/{number}");
            if compact {
                format!(" [<a href=\"{pr_url}\">PR #{number}</a>]")
            } else {
                format!(" [<a href=\"{pr_url}\">PR #{number} merged</a>]")
            }
        }
        Some(MergeKind::Plain) => {
            if compact {
                " [Merge]".to_string()
            } else {
                " [Merge commit]".to_string()
            }
        }
        None => String::new(),
    }
}

pub fn commit_message(commit: &RepoCommit, owner: &str, repo: &str, strings: &Strings) -> String {
    render(
        &strings.monitor.new_commit,
        &[
            ("owner", &escape(owner)),
            ("repo", &escape(repo)),
            ("author", &escape(commit.author_name())),
            ("message", &escape(commit.summary())),
            ("merge_indicator", &merge_indicator(commit, owner, repo, false)),
            ("sha", commit.short_sha()),
            ("commit_url", &escape(commit.html_url.as_deref().unwrap_or("#"))),
        ],
    )
}

/// Multi-commit notification: a capped oldest-first list, plus a compare link
/// when more commits arrived than the list shows.
pub fn commit_batch_message(
    commits: &[RepoCommit],
    owner: &str,
    repo: &str,
    strings: &Strings,
    previous_sha: Option<&str>,
    max_to_list: usize,
) -> String {
    let count = commits.len();
    let lines: Vec<String> = commits
        .iter()
        .take(max_to_list)
        .rev()
        .map(|commit| {
            render(
                &strings.monitor.commit_line,
                &[
                    ("url", &escape(commit.html_url.as_deref().unwrap_or("#"))),
                    ("sha", commit.short_sha()),
                    ("message", &escape(commit.summary())),
                    ("merge_indicator", &merge_indicator(commit, owner, repo, true)),
                    ("author", &escape(commit.author_name())),
                ],
            )
        })
        .collect();

    let mut text = render(
        &strings.monitor.multiple_new_commits,
        &[
            ("count", &count.to_string()),
            ("owner", &escape(owner)),
            ("repo", &escape(repo)),
            ("commit_list", &lines.join("\n")),
        ],
    );

    if count > max_to_list {
        // Prefer the stored cursor as the compare base; on a missing cursor
        // fall back to the oldest commit collected.
        let head = &commits[0].sha;
        let base = previous_sha
            .map(str::to_string)
            .or_else(|| (count > 1).then(|| commits[count - 1].sha.clone()));
        if let Some(base) = base.filter(|b| b != head) {
            let compare_url = format!("https://github.com/{owner}/{repo}/compare/{base}...{head}");
            text.push_str(&render(
                &strings.monitor.more_commits,
                &[
                    ("compare_url", &escape(&compare_url)),
                    ("more_count", &(count - max_to_list).to_string()),
                ],
            ));
        }
    }
    text
}

pub fn issue_message(issue: &Issue, owner: &str, repo: &str, strings: &Strings) -> String {
    render(
        &strings.monitor.new_issue,
        &[
            ("owner", &escape(owner)),
            ("repo", &escape(repo)),
            ("author", &escape(issue.author_login())),
            ("title", &escape(issue.title_line())),
            ("number", &issue.number.to_string()),
            ("issue_url", &escape(issue.html_url.as_deref().unwrap_or("#"))),
        ],
    )
}

pub fn issue_batch_message(
    issues: &[Issue],
    owner: &str,
    repo: &str,
    strings: &Strings,
    max_to_list: usize,
) -> String {
    let count = issues.len();
    let lines: Vec<String> = issues
        .iter()
        .take(max_to_list)
        .rev()
        .map(|issue| {
            render(
                &strings.monitor.issue_line,
                &[
                    ("url", &escape(issue.html_url.as_deref().unwrap_or("#"))),
                    ("number", &issue.number.to_string()),
                    ("title", &escape(issue.title_line())),
                    ("author", &escape(issue.author_login())),
                ],
            )
        })
        .collect();

    render(
        &strings.monitor.multiple_new_issues,
        &[
            ("count", &count.to_string()),
            ("owner", &escape(owner)),
            ("repo", &escape(repo)),
            ("issue_list", &lines.join("\n")),
        ],
    )
}

pub fn closed_issue_message(issue: &Issue, owner: &str, repo: &str, strings: &Strings) -> String {
    render(
        &strings.monitor.closed_issue,
        &[
            ("owner", &escape(owner)),
            ("repo", &escape(repo)),
            ("title", &escape(issue.title_line())),
            ("number", &issue.number.to_string()),
            ("issue_url", &escape(issue.html_url.as_deref().unwrap_or("#"))),
        ],
    )
}

fn tag_url(owner: &str, repo: &str, name: &str) -> String {
    format!("https://github.com/{owner}/{repo}/releases/tag/{name}")
}

pub fn tag_message(tag: &Tag, owner: &str, repo: &str, strings: &Strings) -> String {
    render(
        &strings.monitor.new_tag,
        &[
            ("owner", &escape(owner)),
            ("repo", &escape(repo)),
            ("tag_name", &escape(&tag.name)),
            ("sha_short", tag.short_sha()),
            ("tag_url", &escape(&tag_url(owner, repo, &tag.name))),
        ],
    )
}

pub fn tag_batch_message(
    tags: &[Tag],
    owner: &str,
    repo: &str,
    strings: &Strings,
    max_to_list: usize,
) -> String {
    let count = tags.len();
    let lines: Vec<String> = tags
        .iter()
        .take(max_to_list)
        .rev()
        .map(|tag| {
            render(
                &strings.monitor.tag_line,
                &[
                    ("url", &escape(&tag_url(owner, repo, &tag.name))),
                    ("name", &escape(&tag.name)),
                    ("sha_short", tag.short_sha()),
                ],
            )
        })
        .collect();

    let mut text = render(
        &strings.monitor.multiple_new_tags,
        &[
            ("count", &count.to_string()),
            ("owner", &escape(owner)),
            ("repo", &escape(repo)),
            ("tag_list", &lines.join("\n")),
        ],
    );

    if count > max_to_list {
        let tags_page = format!("https://github.com/{owner}/{repo}/tags");
        text.push_str(&render(
            &strings.monitor.more_tags,
            &[("tags_page_url", &escape(&tags_page))],
        ));
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::model::{CommitDetail, CommitParent, CommitPerson, IssueAuthor, TagCommit};

    fn strings() -> Strings {
        Strings::default()
    }

    fn commit(sha: &str, message: &str, parents: usize) -> RepoCommit {
        RepoCommit {
            sha: sha.into(),
            html_url: Some(format!("https://github.com/o/r/commit/{sha}")),
            commit: CommitDetail {
                message: message.into(),
                author: Some(CommitPerson {
                    name: Some("Alice <dev>".into()),
                }),
            },
            parents: (0..parents)
                .map(|i| CommitParent {
                    sha: format!("p{i}"),
                })
                .collect(),
        }
    }

    #[test]
    fn single_commit_escapes_html_and_shortens_sha() {
        let c = commit("def5678abcdef", "fix <script> issue", 1);
        let msg = commit_message(&c, "o", "r", &strings());
        assert!(msg.contains("fix &lt;script&gt; issue"));
        assert!(msg.contains("Alice &lt;dev&gt;"));
        assert!(msg.contains(">def5678</a>"));
        assert!(!msg.contains("{"));
    }

    #[test]
    fn pr_merge_commit_gets_annotated() {
        let c = commit("def5678", "Merge pull request #12 from o/fix", 2);
        let msg = commit_message(&c, "o", "r", &strings());
        assert!(msg.contains("PR #12 merged"));
        assert!(msg.contains("https://github.com/o/r/pull/12"));
    }

    #[test]
    fn plain_merge_commit_gets_annotated() {
        let c = commit("def5678", "Merge branch 'dev'", 2);
        let msg = commit_message(&c, "o", "r", &strings());
        assert!(msg.contains("[Merge commit]"));
    }

    #[test]
    fn batch_lists_oldest_first_and_caps() {
        let commits = vec![
            commit("c4", "fourth", 1),
            commit("c3", "third", 1),
            commit("c2", "second", 1),
            commit("c1", "first", 1),
        ];
        let msg = commit_batch_message(&commits, "o", "r", &strings(), Some("base"), 2);
        // Oldest of the capped window first: c3 before c4.
        let pos_third = msg.find("third").unwrap();
        let pos_fourth = msg.find("fourth").unwrap();
        assert!(pos_third < pos_fourth);
        assert!(!msg.contains("first"));
        assert!(msg.contains("4 new commits"));
        assert!(msg.contains("compare/base...c4"));
        assert!(msg.contains("2 more"));
    }

    #[test]
    fn batch_without_overflow_has_no_compare_link() {
        let commits = vec![commit("c2", "second", 1), commit("c1", "first", 1)];
        let msg = commit_batch_message(&commits, "o", "r", &strings(), Some("base"), 4);
        assert!(!msg.contains("compare"));
    }

    #[test]
    fn batch_with_missing_cursor_falls_back_to_oldest_collected() {
        let commits = vec![
            commit("c3", "third", 1),
            commit("c2", "second", 1),
            commit("c1", "first", 1),
        ];
        let msg = commit_batch_message(&commits, "o", "r", &strings(), None, 1);
        assert!(msg.contains("compare/c1...c3"));
    }

    #[test]
    fn issue_messages_render() {
        let issue = Issue {
            number: 44,
            title: Some("Crash <on> startup".into()),
            html_url: Some("https://github.com/o/r/issues/44".into()),
            state: Some("open".into()),
            updated_at: None,
            user: Some(IssueAuthor {
                login: Some("bob".into()),
            }),
        };
        let msg = issue_message(&issue, "o", "r", &strings());
        assert!(msg.contains("#44"));
        assert!(msg.contains("Crash &lt;on&gt; startup"));

        let closed = closed_issue_message(&issue, "o", "r", &strings());
        assert!(closed.contains("closed"));

        let batch = issue_batch_message(
            &[issue.clone(), Issue { number: 43, ..issue }],
            "o",
            "r",
            &strings(),
            4,
        );
        assert!(batch.contains("2 new issues"));
    }

    #[test]
    fn tag_messages_render_with_overflow_link() {
        let tags: Vec<Tag> = (0..5)
            .map(|i| Tag {
                name: format!("v1.{}.0", 4 - i),
                commit: Some(TagCommit {
                    sha: "0123456789".into(),
                }),
            })
            .collect();
        let single = tag_message(&tags[0], "o", "r", &strings());
        assert!(single.contains("v1.4.0"));
        assert!(single.contains("releases/tag/v1.4.0"));

        let batch = tag_batch_message(&tags, "o", "r", &strings(), 3);
        assert!(batch.contains("5 new tags"));
        assert!(batch.contains("https://github.com/o/r/tags"));
    }
}
