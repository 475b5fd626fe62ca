use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::db;
use crate::model::MonitoredRepo;
use crate::monitor::checker::CheckerContext;
use crate::monitor::orchestrator::RepoMonitor;

type RepoKey = (i64, i64); // (chat_id, repo_id)

struct MonitorHandle {
    generation: Uuid,
    cancel: watch::Sender<bool>,
    join: JoinHandle<()>,
}

/// Process-lifetime registry of monitoring tasks, addressed by
/// `(chat_id, repo_id)`. Exactly one task runs per subscription; starting a
/// replacement always awaits the predecessor's cancellation first so two
/// loops never race on the same storage row.
#[derive(Clone)]
pub struct Supervisor {
    ctx: CheckerContext,
    tasks: Arc<Mutex<HashMap<RepoKey, MonitorHandle>>>,
}

impl Supervisor {
    pub fn new(ctx: CheckerContext) -> Self {
        Self {
            ctx,
            tasks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Spawns (or replaces) the monitoring task for a subscription.
    pub async fn start_task(&self, repo: &MonitoredRepo) {
        let key = (repo.chat_id, repo.id);

        let previous = self.tasks.lock().await.remove(&key);
        if let Some(handle) = previous {
            info!(chat_id = key.0, repo_id = key.1, "replacing running monitor task");
            cancel_and_join(handle).await;
        }

        let generation = Uuid::new_v4();
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let monitor = RepoMonitor::new(self.ctx.clone(), repo);
        let pool = self.ctx.pool.clone();
        let tasks = Arc::clone(&self.tasks);
        let (chat_id, repo_id) = key;

        // Hold the registry lock across spawn+insert: if the task finishes
        // instantly, its self-removal blocks until the handle is registered.
        let mut registry = self.tasks.lock().await;
        let join = tokio::spawn(async move {
            let delete = monitor.run(cancel_rx).await;
            if delete {
                match db::delete_repo_entry(&pool, chat_id, repo_id).await {
                    Ok(true) => {
                        info!(chat_id, repo_id, "removed subscription after permanent stop")
                    }
                    Ok(false) => {}
                    Err(err) => {
                        error!(?err, chat_id, repo_id, "failed to remove subscription")
                    }
                }
            }
            let mut tasks = tasks.lock().await;
            if tasks.get(&key).map(|h| h.generation) == Some(generation) {
                tasks.remove(&key);
            }
        });
        registry.insert(
            key,
            MonitorHandle {
                generation,
                cancel: cancel_tx,
                join,
            },
        );
    }

    /// Cancels a subscription's task, awaiting its termination. Persisted
    /// state is left intact. Returns whether a task was registered.
    pub async fn stop_task(&self, chat_id: i64, repo_id: i64) -> bool {
        let handle = self.tasks.lock().await.remove(&(chat_id, repo_id));
        match handle {
            Some(handle) => {
                cancel_and_join(handle).await;
                true
            }
            None => false,
        }
    }

    pub async fn is_running(&self, chat_id: i64, repo_id: i64) -> bool {
        self.tasks.lock().await.contains_key(&(chat_id, repo_id))
    }

    pub async fn active_count(&self) -> usize {
        self.tasks.lock().await.len()
    }

    /// Spawns one task per persisted subscription. Called once at startup.
    pub async fn reconcile(&self) -> anyhow::Result<usize> {
        let repos = db::get_all_active_repos(&self.ctx.pool).await?;
        let count = repos.len();
        for repo in &repos {
            self.start_task(repo).await;
        }
        info!(count, "reconciled monitoring tasks from storage");
        Ok(count)
    }

    /// Cancels every task and awaits them all.
    pub async fn shutdown(&self) {
        let handles: Vec<MonitorHandle> = {
            let mut tasks = self.tasks.lock().await;
            tasks.drain().map(|(_, handle)| handle).collect()
        };
        let count = handles.len();
        futures::future::join_all(handles.into_iter().map(cancel_and_join)).await;
        info!(count, "supervisor shut down");
    }
}

async fn cancel_and_join(handle: MonitorHandle) {
    let _ = handle.cancel.send(true);
    if let Err(err) = handle.join.await {
        if !err.is_cancelled() {
            warn!(?err, "monitor task ended abnormally");
        }
    }
}
