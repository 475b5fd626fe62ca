use std::time::Duration;

use teloxide::utils::html::escape;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::db;
use crate::model::MonitoredRepo;
use crate::monitor::checker::{
    Checker, CheckerContext, CheckerKind, CommitChecker, IssueChecker, TagChecker,
};
use crate::monitor::classify::{classify, Notice};
use crate::strings::{render, Strings};

/// Per-repository monitoring loop.
///
/// Each iteration reloads the persisted row (live reconfiguration), rebuilds
/// the checker set when the monitoring flags diverge from what is
/// instantiated, runs every active checker in sequence, and sleeps either
/// the poll interval or the classifier-computed backoff.
pub struct RepoMonitor {
    ctx: CheckerContext,
    chat_id: i64,
    repo_db_id: i64,
    owner: String,
    repo_name: String,
    repo_url: String,
    checkers: Vec<Box<dyn Checker>>,
    retry_attempt: u32,
}

impl RepoMonitor {
    pub fn new(ctx: CheckerContext, repo: &MonitoredRepo) -> Self {
        Self {
            ctx,
            chat_id: repo.chat_id,
            repo_db_id: repo.id,
            owner: repo.owner.clone(),
            repo_name: repo.repo_name.clone(),
            repo_url: repo.repo_url.clone(),
            checkers: Vec::new(),
            retry_attempt: 0,
        }
    }

    /// Runs until cancelled or permanently stopped.
    ///
    /// Returns `true` when the caller must delete the persisted subscription
    /// (permanent failure), `false` when the task was cancelled and state
    /// must be left intact.
    pub async fn run(mut self, mut cancel: watch::Receiver<bool>) -> bool {
        info!(
            owner = %self.owner,
            repo = %self.repo_name,
            chat_id = self.chat_id,
            "starting repository monitor"
        );

        let mut first_iteration = true;
        loop {
            if *cancel.borrow() {
                info!(owner = %self.owner, repo = %self.repo_name, "monitor cancelled");
                return false;
            }

            let repo = match db::get_repo_by_id(&self.ctx.pool, self.repo_db_id).await {
                Ok(Some(repo)) => repo,
                Ok(None) => {
                    info!(
                        repo_id = self.repo_db_id,
                        "subscription row gone; stopping monitor"
                    );
                    return true;
                }
                Err(err) => {
                    error!(?err, repo_id = self.repo_db_id, "failed to reload subscription");
                    self.send_notice(Notice::Internal).await;
                    return true;
                }
            };

            let desired = desired_kinds(&repo);
            let current: Vec<CheckerKind> = self.checkers.iter().map(|c| c.kind()).collect();
            if first_iteration || desired != current {
                info!(
                    owner = %self.owner,
                    repo = %self.repo_name,
                    ?desired,
                    "(re)initializing checkers"
                );
                self.rebuild_checkers(&repo).await;
                first_iteration = false;
            }

            let interval = Duration::from_secs(
                repo.effective_interval(self.ctx.settings.base_interval.as_secs()),
            );

            if self.checkers.is_empty() {
                // Everything disabled: idle, but keep watching the flags.
                if pause(&mut cancel, interval).await {
                    return false;
                }
                continue;
            }

            let result = tokio::select! {
                biased;
                _ = cancel.changed() => {
                    info!(owner = %self.owner, repo = %self.repo_name, "monitor cancelled mid-cycle");
                    return false;
                }
                result = run_cycle(&mut self.checkers) => result,
            };

            match result {
                Ok(()) => {
                    self.retry_attempt = 0;
                    if pause(&mut cancel, interval).await {
                        return false;
                    }
                }
                Err(err) => {
                    self.retry_attempt += 1;
                    let directive = classify(
                        &err,
                        self.retry_attempt,
                        self.ctx.settings.max_retries,
                        interval,
                    );
                    warn!(
                        owner = %self.owner,
                        repo = %self.repo_name,
                        attempt = self.retry_attempt,
                        stop = directive.stop_permanently,
                        wait_secs = directive.wait.as_secs_f64(),
                        error = %err,
                        "check cycle failed"
                    );

                    if directive.stop_permanently {
                        if let Some(notice) = directive.notice {
                            self.send_notice(notice).await;
                        }
                        return true;
                    }
                    if pause(&mut cancel, directive.wait).await {
                        return false;
                    }
                }
            }
        }
    }

    async fn rebuild_checkers(&mut self, repo: &MonitoredRepo) {
        self.checkers.clear();
        for kind in [CheckerKind::Commits, CheckerKind::Issues, CheckerKind::Tags] {
            let mut checker: Box<dyn Checker> = match kind {
                CheckerKind::Commits => Box::new(CommitChecker::new(self.ctx.clone(), repo)),
                CheckerKind::Issues => Box::new(IssueChecker::new(self.ctx.clone(), repo)),
                CheckerKind::Tags => Box::new(TagChecker::new(self.ctx.clone(), repo)),
            };
            checker.load_initial_state(repo);
            if enabled_for(repo, kind) {
                self.checkers.push(checker);
            } else {
                checker.clear_state_on_disable().await;
            }
        }
    }

    async fn send_notice(&self, notice: Notice) {
        let template = notice_template(&self.ctx.strings, notice);
        let text = render(template, &[("repo_url", &escape(&self.repo_url))]);
        if let Err(err) = self
            .ctx
            .notifier
            .send_message(self.chat_id, &text, true)
            .await
        {
            warn!(?err, chat_id = self.chat_id, "failed to deliver stop notice");
        }
    }
}

async fn run_cycle(checkers: &mut [Box<dyn Checker>]) -> anyhow::Result<()> {
    // Sequential on purpose: one connection-pool user at a time, and a
    // failure is attributable to the checker that raised it.
    for checker in checkers.iter_mut() {
        checker.check().await?;
    }
    Ok(())
}

/// Sleeps for `duration`, returning `true` if cancellation arrived first.
async fn pause(cancel: &mut watch::Receiver<bool>, duration: Duration) -> bool {
    tokio::select! {
        biased;
        _ = cancel.changed() => true,
        _ = tokio::time::sleep(duration) => false,
    }
}

fn desired_kinds(repo: &MonitoredRepo) -> Vec<CheckerKind> {
    [CheckerKind::Commits, CheckerKind::Issues, CheckerKind::Tags]
        .into_iter()
        .filter(|kind| enabled_for(repo, *kind))
        .collect()
}

fn enabled_for(repo: &MonitoredRepo, kind: CheckerKind) -> bool {
    match kind {
        CheckerKind::Commits => repo.monitor_commits,
        CheckerKind::Issues => repo.monitor_issues,
        CheckerKind::Tags => repo.monitor_tags,
    }
}

fn notice_template(strings: &Strings, notice: Notice) -> &str {
    match notice {
        Notice::RepoNotFound => &strings.monitor.repo_not_found,
        Notice::AuthFailed => &strings.monitor.auth_error,
        Notice::RateLimited => &strings.monitor.rate_limit_error,
        Notice::NetworkFailure => &strings.monitor.network_error,
        Notice::InvalidData => &strings.monitor.invalid_data_error,
        Notice::Internal => &strings.monitor.internal_error,
    }
}
