//! Message templates, keyed by category → key. Loadable from YAML so
//! deployments can reword notifications without a rebuild.
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Root of the template mapping.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Strings {
    pub monitor: MonitorStrings,
}

/// Templates used by the monitoring engine. Placeholders use `{name}` form.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MonitorStrings {
    pub new_commit: String,
    pub commit_line: String,
    pub multiple_new_commits: String,
    pub more_commits: String,
    pub new_issue: String,
    pub issue_line: String,
    pub multiple_new_issues: String,
    pub closed_issue: String,
    pub new_tag: String,
    pub tag_line: String,
    pub multiple_new_tags: String,
    pub more_tags: String,
    pub repo_not_found: String,
    pub auth_error: String,
    pub rate_limit_error: String,
    pub network_error: String,
    pub invalid_data_error: String,
    pub internal_error: String,
}

const DEFAULT_STRINGS_YAML: &str = r#"monitor:
  new_commit: "🔨 <b>{owner}/{repo}</b>: new commit by <b>{author}</b>{merge_indicator}\n<i>{message}</i>\n<a href=\"{commit_url}\">{sha}</a>"
  commit_line: "• <a href=\"{url}\">{sha}</a> {message}{merge_indicator} ({author})"
  multiple_new_commits: "🔨 <b>{owner}/{repo}</b>: {count} new commits\n{commit_list}"
  more_commits: "\n…and <a href=\"{compare_url}\">{more_count} more</a>"
  new_issue: "🐛 <b>{owner}/{repo}</b>: new issue <a href=\"{issue_url}\">#{number}</a> by <b>{author}</b>\n<i>{title}</i>"
  issue_line: "• <a href=\"{url}\">#{number}</a> {title} ({author})"
  multiple_new_issues: "🐛 <b>{owner}/{repo}</b>: {count} new issues\n{issue_list}"
  closed_issue: "✅ <b>{owner}/{repo}</b>: issue <a href=\"{issue_url}\">#{number}</a> closed\n<i>{title}</i>"
  new_tag: "🏷 <b>{owner}/{repo}</b>: new tag <a href=\"{tag_url}\">{tag_name}</a> ({sha_short})"
  tag_line: "• <a href=\"{url}\">{name}</a> ({sha_short})"
  multiple_new_tags: "🏷 <b>{owner}/{repo}</b>: {count} new tags\n{tag_list}"
  more_tags: "\n…and more: <a href=\"{tags_page_url}\">all tags</a>"
  repo_not_found: "❌ Repository {repo_url} was not found (deleted or renamed?). Monitoring stopped and the subscription was removed."
  auth_error: "❌ Access to {repo_url} was denied (check the configured token). Monitoring stopped and the subscription was removed."
  rate_limit_error: "⏳ GitHub keeps rate-limiting requests for {repo_url}. Monitoring stopped after repeated retries; the subscription was removed."
  network_error: "🌐 Repeated network failures while checking {repo_url}. Monitoring stopped and the subscription was removed."
  invalid_data_error: "⚠️ GitHub kept returning unreadable data for {repo_url}. Monitoring stopped and the subscription was removed."
  internal_error: "⚠️ An internal error occurred while monitoring {repo_url}. Monitoring stopped and the subscription was removed."
"#;

impl Default for Strings {
    fn default() -> Self {
        serde_yaml::from_str(DEFAULT_STRINGS_YAML).expect("valid embedded strings")
    }
}

impl Strings {
    /// Load templates from a YAML file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)?;
        let strings: Strings = serde_yaml::from_str(&content)?;
        Ok(strings)
    }
}

/// Substitutes `{name}` placeholders. Unknown placeholders are left as-is so
/// a template typo shows up verbatim in the output instead of panicking.
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = template.to_string();
    for (name, value) in vars {
        out = out.replace(&format!("{{{name}}}"), value);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn default_strings_parse() {
        let strings = Strings::default();
        assert!(strings.monitor.new_commit.contains("{owner}"));
        assert!(strings.monitor.repo_not_found.contains("{repo_url}"));
    }

    #[test]
    fn render_substitutes_named_fields() {
        let out = render(
            "commit {sha} by {author}",
            &[("sha", "abc1234"), ("author", "Alice")],
        );
        assert_eq!(out, "commit abc1234 by Alice");
    }

    #[test]
    fn render_leaves_unknown_placeholders() {
        let out = render("{known} and {unknown}", &[("known", "x")]);
        assert_eq!(out, "x and {unknown}");
    }

    #[test]
    fn load_from_file_overrides_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        let yaml = DEFAULT_STRINGS_YAML.replace("🔨", "⚒");
        file.write_all(yaml.as_bytes()).unwrap();
        let strings = Strings::load(file.path()).unwrap();
        assert!(strings.monitor.new_commit.starts_with('⚒'));
    }
}
