use serde::{Deserialize, Serialize};

/// One entry of `GET /repos/{owner}/{repo}/commits`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoCommit {
    pub sha: String,
    #[serde(default)]
    pub html_url: Option<String>,
    pub commit: CommitDetail,
    #[serde(default)]
    pub parents: Vec<CommitParent>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitDetail {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub author: Option<CommitPerson>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitPerson {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitParent {
    pub sha: String,
}

impl RepoCommit {
    pub fn short_sha(&self) -> &str {
        let end = self.sha.len().min(7);
        &self.sha[..end]
    }

    pub fn author_name(&self) -> &str {
        self.commit
            .author
            .as_ref()
            .and_then(|a| a.name.as_deref())
            .unwrap_or("Unknown")
    }

    /// First line of the commit message.
    pub fn summary(&self) -> &str {
        self.commit
            .message
            .lines()
            .next()
            .unwrap_or("No message")
    }
}

/// One entry of `GET /repos/{owner}/{repo}/branches`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Branch {
    pub name: String,
}

/// One entry of `GET /repos/{owner}/{repo}/issues`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    pub number: i64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub html_url: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub user: Option<IssueAuthor>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueAuthor {
    #[serde(default)]
    pub login: Option<String>,
}

impl Issue {
    pub fn title_line(&self) -> &str {
        self.title
            .as_deref()
            .and_then(|t| t.lines().next())
            .unwrap_or("No Title")
    }

    pub fn author_login(&self) -> &str {
        self.user
            .as_ref()
            .and_then(|u| u.login.as_deref())
            .unwrap_or("Unknown")
    }

    pub fn is_closed(&self) -> bool {
        self.state.as_deref() == Some("closed")
    }
}

/// One entry of `GET /repos/{owner}/{repo}/tags`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
    #[serde(default)]
    pub commit: Option<TagCommit>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagCommit {
    pub sha: String,
}

impl Tag {
    pub fn short_sha(&self) -> &str {
        match &self.commit {
            Some(c) => {
                let end = c.sha.len().min(7);
                &c.sha[..end]
            }
            None => "N/A",
        }
    }
}
