use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info, warn};

use crate::db::{self, Pool};
use crate::github::{GithubApi, IssueQuery};
use crate::model::{MonitoredRepo, RepoUpdate};
use crate::monitor::detect::{scan_closed_issues, scan_commits, scan_open_issues, scan_tags};
use crate::monitor::format;
use crate::monitor::MonitorSettings;
use crate::notifier::Notifier;
use crate::strings::Strings;

/// The entity types a repository can be watched for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckerKind {
    Commits,
    Issues,
    Tags,
}

/// Shared collaborators handed to every checker of one repository task.
#[derive(Clone)]
pub struct CheckerContext {
    pub api: Arc<dyn GithubApi>,
    pub pool: Pool,
    pub notifier: Arc<dyn Notifier>,
    pub strings: Arc<Strings>,
    pub settings: MonitorSettings,
}

/// One entity type's poll-detect-notify-persist cycle.
///
/// `check` is the unit of idempotent work: it performs exactly one
/// fetch-detect-notify-persist pass and is safe to call repeatedly. API
/// errors propagate to the orchestrator; persistence and delivery failures
/// are logged and swallowed here.
#[async_trait]
pub trait Checker: Send + Sync {
    fn kind(&self) -> CheckerKind;

    /// Copies cursor/ETag state from the repository snapshot.
    fn load_initial_state(&mut self, repo: &MonitoredRepo);

    async fn check(&mut self) -> anyhow::Result<()>;

    /// Nulls out ETag state in storage when the entity type is disabled, so
    /// a later re-enable performs a full fetch instead of an instant 304.
    async fn clear_state_on_disable(&mut self);
}

async fn persist(pool: &Pool, repo_id: i64, updates: &RepoUpdate) {
    if updates.is_empty() {
        return;
    }
    if let Err(err) = db::update_repo_fields(pool, repo_id, updates).await {
        error!(?err, repo_id, "failed to persist checker state; in-memory cursor kept");
    }
}

async fn send_best_effort(notifier: &dyn Notifier, chat_id: i64, text: &str) {
    if let Err(err) = notifier.send_message(chat_id, text, true).await {
        error!(?err, chat_id, "failed to deliver notification");
    }
}

pub struct CommitChecker {
    ctx: CheckerContext,
    repo_db_id: i64,
    chat_id: i64,
    owner: String,
    repo_name: String,
    branch: Option<String>,
    last_sha: Option<String>,
    etag: Option<String>,
}

impl CommitChecker {
    pub fn new(ctx: CheckerContext, repo: &MonitoredRepo) -> Self {
        Self {
            ctx,
            repo_db_id: repo.id,
            chat_id: repo.chat_id,
            owner: repo.owner.clone(),
            repo_name: repo.repo_name.clone(),
            branch: repo.branch.clone(),
            last_sha: None,
            etag: None,
        }
    }
}

#[async_trait]
impl Checker for CommitChecker {
    fn kind(&self) -> CheckerKind {
        CheckerKind::Commits
    }

    fn load_initial_state(&mut self, repo: &MonitoredRepo) {
        self.last_sha = repo.last_commit_sha.clone();
        self.etag = repo.commit_etag.clone();
        self.branch = repo.branch.clone();
    }

    async fn check(&mut self) -> anyhow::Result<()> {
        let response = self
            .ctx
            .api
            .fetch_commits(
                &self.owner,
                &self.repo_name,
                self.etag.as_deref(),
                self.ctx.settings.per_page,
                self.branch.as_deref(),
            )
            .await?;

        let mut updates = RepoUpdate::default();
        let mut notification: Option<String> = None;

        if response.is_not_modified() {
            if let Some(etag) = response.etag {
                if self.etag.as_deref() != Some(etag.as_str()) {
                    self.etag = Some(etag.clone());
                    updates.commit_etag = Some(Some(etag));
                }
            }
        } else if let Some(page) = response.data {
            if page.is_empty() || page[0].sha.is_empty() {
                warn!(
                    owner = %self.owner,
                    repo = %self.repo_name,
                    "empty or malformed commit payload on 200 OK; skipping cycle"
                );
            } else {
                let scan = scan_commits(&page, self.last_sha.as_deref());
                if scan.is_initial {
                    if let Some(latest) = scan.latest {
                        let short = &latest[..latest.len().min(7)];
                        info!(
                            owner = %self.owner,
                            repo = %self.repo_name,
                            sha = short,
                            "initial commit baseline"
                        );
                        self.last_sha = Some(latest.clone());
                        updates.last_commit_sha = Some(Some(latest));
                    }
                } else if !scan.new_items.is_empty() {
                    if scan.cursor_missing {
                        warn!(
                            owner = %self.owner,
                            repo = %self.repo_name,
                            "known SHA absent from page; force push or more commits than one page"
                        );
                    }
                    info!(
                        owner = %self.owner,
                        repo = %self.repo_name,
                        count = scan.new_items.len(),
                        "new commits"
                    );
                    let previous_sha = self.last_sha.clone();
                    let newest = scan.new_items[0].sha.clone();
                    self.last_sha = Some(newest.clone());
                    updates.last_commit_sha = Some(Some(newest));

                    let text = if scan.new_items.len() == 1 {
                        format::commit_message(
                            &scan.new_items[0],
                            &self.owner,
                            &self.repo_name,
                            &self.ctx.strings,
                        )
                    } else {
                        format::commit_batch_message(
                            &scan.new_items,
                            &self.owner,
                            &self.repo_name,
                            &self.ctx.strings,
                            previous_sha.as_deref(),
                            self.ctx.settings.max_commits_to_list,
                        )
                    };
                    notification = Some(text);
                } else if let Some(latest) = scan.latest {
                    // Head moved but no boundary was found: adopt silently
                    // rather than spam on ambiguous force-push data.
                    if self.last_sha.as_deref() != Some(latest.as_str()) {
                        self.last_sha = Some(latest.clone());
                        updates.last_commit_sha = Some(Some(latest));
                    }
                }
            }

            if let Some(etag) = response.etag {
                if self.etag.as_deref() != Some(etag.as_str()) {
                    self.etag = Some(etag.clone());
                    updates.commit_etag = Some(Some(etag));
                }
            }
        }

        persist(&self.ctx.pool, self.repo_db_id, &updates).await;
        if let Some(text) = notification {
            send_best_effort(self.ctx.notifier.as_ref(), self.chat_id, &text).await;
        }
        Ok(())
    }

    async fn clear_state_on_disable(&mut self) {
        if self.etag.is_some() {
            let updates = RepoUpdate {
                commit_etag: Some(None),
                ..Default::default()
            };
            persist(&self.ctx.pool, self.repo_db_id, &updates).await;
        }
        self.etag = None;
    }
}

/// Watches both newly opened and newly closed issues. The two sub-cycles
/// keep independent cursor/ETag pairs because one sorted view cannot serve
/// both questions.
pub struct IssueChecker {
    ctx: CheckerContext,
    repo_db_id: i64,
    chat_id: i64,
    owner: String,
    repo_name: String,
    last_issue_number: Option<i64>,
    issue_etag: Option<String>,
    last_closed_ts: Option<String>,
    closed_etag: Option<String>,
}

impl IssueChecker {
    pub fn new(ctx: CheckerContext, repo: &MonitoredRepo) -> Self {
        Self {
            ctx,
            repo_db_id: repo.id,
            chat_id: repo.chat_id,
            owner: repo.owner.clone(),
            repo_name: repo.repo_name.clone(),
            last_issue_number: None,
            issue_etag: None,
            last_closed_ts: None,
            closed_etag: None,
        }
    }

    async fn check_open(&mut self) -> anyhow::Result<()> {
        let response = self
            .ctx
            .api
            .fetch_issues(
                &self.owner,
                &self.repo_name,
                self.issue_etag.as_deref(),
                self.ctx.settings.per_page,
                IssueQuery::open_by_creation(),
            )
            .await?;

        let mut updates = RepoUpdate::default();
        let mut notification: Option<String> = None;

        if response.is_not_modified() {
            if let Some(etag) = response.etag {
                if self.issue_etag.as_deref() != Some(etag.as_str()) {
                    self.issue_etag = Some(etag.clone());
                    updates.issue_etag = Some(Some(etag));
                }
            }
        } else if let Some(page) = response.data {
            let scan = scan_open_issues(&page, self.last_issue_number);
            if scan.is_initial {
                if let Some(latest) = scan.latest_number {
                    info!(
                        owner = %self.owner,
                        repo = %self.repo_name,
                        number = latest,
                        "initial open-issue baseline"
                    );
                    self.last_issue_number = Some(latest);
                    updates.last_known_issue_number = Some(Some(latest));
                }
            } else if !scan.new_issues.is_empty() {
                info!(
                    owner = %self.owner,
                    repo = %self.repo_name,
                    count = scan.new_issues.len(),
                    "new open issues"
                );
                let newest = scan.new_issues[0].number;
                self.last_issue_number = Some(newest);
                updates.last_known_issue_number = Some(Some(newest));

                let text = if scan.new_issues.len() == 1 {
                    format::issue_message(
                        &scan.new_issues[0],
                        &self.owner,
                        &self.repo_name,
                        &self.ctx.strings,
                    )
                } else {
                    format::issue_batch_message(
                        &scan.new_issues,
                        &self.owner,
                        &self.repo_name,
                        &self.ctx.strings,
                        self.ctx.settings.max_issues_to_list,
                    )
                };
                notification = Some(text);
            } else if let Some(latest) = scan.latest_number {
                // Numbers only grow; a silent gap still advances the cursor.
                if latest > self.last_issue_number.unwrap_or(0) {
                    self.last_issue_number = Some(latest);
                    updates.last_known_issue_number = Some(Some(latest));
                }
            }

            if let Some(etag) = response.etag {
                if self.issue_etag.as_deref() != Some(etag.as_str()) {
                    self.issue_etag = Some(etag.clone());
                    updates.issue_etag = Some(Some(etag));
                }
            }
        }

        persist(&self.ctx.pool, self.repo_db_id, &updates).await;
        if let Some(text) = notification {
            send_best_effort(self.ctx.notifier.as_ref(), self.chat_id, &text).await;
        }
        Ok(())
    }

    async fn check_closed(&mut self) -> anyhow::Result<()> {
        let response = self
            .ctx
            .api
            .fetch_issues(
                &self.owner,
                &self.repo_name,
                self.closed_etag.as_deref(),
                self.ctx.settings.per_page,
                IssueQuery::closed_by_update(self.last_closed_ts.clone()),
            )
            .await?;

        let mut updates = RepoUpdate::default();
        let mut notifications: Vec<String> = Vec::new();

        if response.is_not_modified() {
            if let Some(etag) = response.etag {
                if self.closed_etag.as_deref() != Some(etag.as_str()) {
                    self.closed_etag = Some(etag.clone());
                    updates.closed_issue_etag = Some(Some(etag));
                }
            }
        } else if let Some(page) = response.data {
            let scan = scan_closed_issues(&page, self.last_closed_ts.as_deref());
            if scan.is_initial {
                info!(
                    owner = %self.owner,
                    repo = %self.repo_name,
                    baseline = scan.latest_update_ts.as_deref().unwrap_or("none"),
                    "initial closed-issue baseline"
                );
            } else if !scan.newly_closed.is_empty() {
                info!(
                    owner = %self.owner,
                    repo = %self.repo_name,
                    count = scan.newly_closed.len(),
                    "newly closed issues"
                );
                // One message per closed issue, oldest first.
                for issue in scan.newly_closed.iter().rev() {
                    notifications.push(format::closed_issue_message(
                        issue,
                        &self.owner,
                        &self.repo_name,
                        &self.ctx.strings,
                    ));
                }
            }

            if let Some(latest) = scan.latest_update_ts {
                // Never regress: the page can lag behind a since-filtered view.
                if self.last_closed_ts.as_deref().map_or(true, |cur| latest.as_str() > cur) {
                    self.last_closed_ts = Some(latest.clone());
                    updates.last_closed_issue_update_ts = Some(Some(latest));
                }
            }

            if let Some(etag) = response.etag {
                if self.closed_etag.as_deref() != Some(etag.as_str()) {
                    self.closed_etag = Some(etag.clone());
                    updates.closed_issue_etag = Some(Some(etag));
                }
            }
        }

        persist(&self.ctx.pool, self.repo_db_id, &updates).await;
        for text in notifications {
            send_best_effort(self.ctx.notifier.as_ref(), self.chat_id, &text).await;
        }
        Ok(())
    }
}

#[async_trait]
impl Checker for IssueChecker {
    fn kind(&self) -> CheckerKind {
        CheckerKind::Issues
    }

    fn load_initial_state(&mut self, repo: &MonitoredRepo) {
        self.last_issue_number = repo.last_known_issue_number;
        self.issue_etag = repo.issue_etag.clone();
        self.last_closed_ts = repo.last_closed_issue_update_ts.clone();
        self.closed_etag = repo.closed_issue_etag.clone();
    }

    async fn check(&mut self) -> anyhow::Result<()> {
        self.check_open().await?;
        self.check_closed().await?;
        Ok(())
    }

    async fn clear_state_on_disable(&mut self) {
        let mut updates = RepoUpdate::default();
        if self.issue_etag.take().is_some() {
            updates.issue_etag = Some(None);
        }
        if self.closed_etag.take().is_some() {
            updates.closed_issue_etag = Some(None);
        }
        persist(&self.ctx.pool, self.repo_db_id, &updates).await;
    }
}

pub struct TagChecker {
    ctx: CheckerContext,
    repo_db_id: i64,
    chat_id: i64,
    owner: String,
    repo_name: String,
    last_tag: Option<String>,
    etag: Option<String>,
}

impl TagChecker {
    pub fn new(ctx: CheckerContext, repo: &MonitoredRepo) -> Self {
        Self {
            ctx,
            repo_db_id: repo.id,
            chat_id: repo.chat_id,
            owner: repo.owner.clone(),
            repo_name: repo.repo_name.clone(),
            last_tag: None,
            etag: None,
        }
    }
}

#[async_trait]
impl Checker for TagChecker {
    fn kind(&self) -> CheckerKind {
        CheckerKind::Tags
    }

    fn load_initial_state(&mut self, repo: &MonitoredRepo) {
        self.last_tag = repo.last_known_tag_name.clone();
        self.etag = repo.tag_etag.clone();
    }

    async fn check(&mut self) -> anyhow::Result<()> {
        let response = self
            .ctx
            .api
            .fetch_tags(
                &self.owner,
                &self.repo_name,
                self.etag.as_deref(),
                self.ctx.settings.per_page,
            )
            .await?;

        let mut updates = RepoUpdate::default();
        let mut notification: Option<String> = None;

        if response.is_not_modified() {
            if let Some(etag) = response.etag {
                if self.etag.as_deref() != Some(etag.as_str()) {
                    self.etag = Some(etag.clone());
                    updates.tag_etag = Some(Some(etag));
                }
            }
        } else if let Some(page) = response.data {
            if page.is_empty() {
                warn!(
                    owner = %self.owner,
                    repo = %self.repo_name,
                    "empty tag payload on 200 OK; skipping cycle"
                );
            } else {
                let scan = scan_tags(&page, self.last_tag.as_deref());
                if scan.is_initial {
                    if let Some(latest) = scan.latest {
                        info!(
                            owner = %self.owner,
                            repo = %self.repo_name,
                            tag = %latest,
                            "initial tag baseline"
                        );
                        self.last_tag = Some(latest.clone());
                        updates.last_known_tag_name = Some(Some(latest));
                    }
                } else if !scan.new_items.is_empty() {
                    if scan.cursor_missing {
                        warn!(
                            owner = %self.owner,
                            repo = %self.repo_name,
                            "known tag absent from page; tags rewritten or more than one page"
                        );
                    }
                    info!(
                        owner = %self.owner,
                        repo = %self.repo_name,
                        count = scan.new_items.len(),
                        "new tags"
                    );
                    let newest = scan.new_items[0].name.clone();
                    self.last_tag = Some(newest.clone());
                    updates.last_known_tag_name = Some(Some(newest));

                    let text = if scan.new_items.len() == 1 {
                        format::tag_message(
                            &scan.new_items[0],
                            &self.owner,
                            &self.repo_name,
                            &self.ctx.strings,
                        )
                    } else {
                        format::tag_batch_message(
                            &scan.new_items,
                            &self.owner,
                            &self.repo_name,
                            &self.ctx.strings,
                            self.ctx.settings.max_tags_to_list,
                        )
                    };
                    notification = Some(text);
                } else if let Some(latest) = scan.latest {
                    if self.last_tag.as_deref() != Some(latest.as_str()) {
                        self.last_tag = Some(latest.clone());
                        updates.last_known_tag_name = Some(Some(latest));
                    }
                }
            }

            if let Some(etag) = response.etag {
                if self.etag.as_deref() != Some(etag.as_str()) {
                    self.etag = Some(etag.clone());
                    updates.tag_etag = Some(Some(etag));
                }
            }
        }

        persist(&self.ctx.pool, self.repo_db_id, &updates).await;
        if let Some(text) = notification {
            send_best_effort(self.ctx.notifier.as_ref(), self.chat_id, &text).await;
        }
        Ok(())
    }

    async fn clear_state_on_disable(&mut self) {
        if self.etag.is_some() {
            let updates = RepoUpdate {
                tag_etag: Some(None),
                ..Default::default()
            };
            persist(&self.ctx.pool, self.repo_db_id, &updates).await;
        }
        self.etag = None;
    }
}
