use crate::model::{MonitoredRepo, NewRepo, RepoUpdate};
use anyhow::Result;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use tracing::instrument;

pub type Pool = SqlitePool;

pub async fn init_pool(database_url: &str) -> Result<Pool> {
    let normalized = prepare_sqlite_url(database_url);
    let pool = SqlitePool::connect(&normalized).await?;
    // Enable WAL and stricter durability.
    sqlx::query("PRAGMA journal_mode=WAL;")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA synchronous=FULL;")
        .execute(&pool)
        .await?;
    Ok(pool)
}

/// If using a file-backed SQLite URL, expand a leading `~/` and ensure the parent
/// directory exists. Leaves in-memory URLs untouched. Returns possibly-updated URL.
fn prepare_sqlite_url(url: &str) -> String {
    if !url.starts_with("sqlite:") {
        return url.to_string();
    }

    // In-memory URLs like sqlite::memory: or sqlite::memory:?cache=shared
    if url.starts_with("sqlite::memory") {
        return url.to_string();
    }

    let rest = &url["sqlite:".len()..];
    let path_with_query = rest.strip_prefix("//").unwrap_or(rest);

    let (path_part, query_part) = match path_with_query.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (path_with_query, None),
    };

    if path_part.is_empty() {
        return url.to_string();
    }

    let expanded_path = if let Some(rest) = path_part.strip_prefix("~/") {
        if let Ok(home) = std::env::var("HOME") {
            format!("{}/{}", home.trim_end_matches('/'), rest)
        } else {
            path_part.to_string()
        }
    } else {
        path_part.to_string()
    };

    if let Some(parent) = std::path::Path::new(&expanded_path).parent() {
        if !parent.as_os_str().is_empty() {
            let _ = std::fs::create_dir_all(parent);
        }
    }

    let mut rebuilt = String::from("sqlite://");
    rebuilt.push_str(&expanded_path);
    if let Some(q) = query_part {
        rebuilt.push('?');
        rebuilt.push_str(q);
    }
    rebuilt
}

pub async fn run_migrations(pool: &Pool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

#[instrument(skip_all)]
pub async fn get_repo_by_id(pool: &Pool, repo_id: i64) -> Result<Option<MonitoredRepo>> {
    let repo = sqlx::query_as::<_, MonitoredRepo>("SELECT * FROM monitored_repos WHERE id = ?")
        .bind(repo_id)
        .fetch_optional(pool)
        .await?;
    Ok(repo)
}

#[instrument(skip_all)]
pub async fn get_repo_by_url(
    pool: &Pool,
    chat_id: i64,
    repo_url: &str,
) -> Result<Option<MonitoredRepo>> {
    let repo = sqlx::query_as::<_, MonitoredRepo>(
        "SELECT * FROM monitored_repos WHERE chat_id = ? AND repo_url = ?",
    )
    .bind(chat_id)
    .bind(repo_url)
    .fetch_optional(pool)
    .await?;
    Ok(repo)
}

#[instrument(skip_all)]
pub async fn get_repos_for_chat(pool: &Pool, chat_id: i64) -> Result<Vec<MonitoredRepo>> {
    let repos = sqlx::query_as::<_, MonitoredRepo>(
        "SELECT * FROM monitored_repos WHERE chat_id = ? ORDER BY repo_url",
    )
    .bind(chat_id)
    .fetch_all(pool)
    .await?;
    Ok(repos)
}

#[instrument(skip_all)]
pub async fn get_all_active_repos(pool: &Pool) -> Result<Vec<MonitoredRepo>> {
    let repos = sqlx::query_as::<_, MonitoredRepo>("SELECT * FROM monitored_repos ORDER BY id")
        .fetch_all(pool)
        .await?;
    Ok(repos)
}

#[instrument(skip_all)]
pub async fn create_repo_entry(pool: &Pool, new_repo: &NewRepo) -> Result<MonitoredRepo> {
    let id: i64 = sqlx::query(
        "INSERT INTO monitored_repos (chat_id, repo_url, owner, repo_name, branch, check_interval) \
         VALUES (?, ?, ?, ?, ?, ?) RETURNING id",
    )
    .bind(new_repo.chat_id)
    .bind(&new_repo.repo_url)
    .bind(&new_repo.owner)
    .bind(&new_repo.repo_name)
    .bind(&new_repo.branch)
    .bind(new_repo.check_interval)
    .fetch_one(pool)
    .await?
    .get("id");

    let repo = get_repo_by_id(pool, id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("repo row {id} vanished after insert"))?;
    Ok(repo)
}

#[instrument(skip_all)]
pub async fn delete_repo_entry(pool: &Pool, chat_id: i64, repo_id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM monitored_repos WHERE id = ? AND chat_id = ?")
        .bind(repo_id)
        .bind(chat_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Applies a partial update. Columns absent from `update` are untouched;
/// `Some(None)` writes NULL. Returns whether a row was changed.
#[instrument(skip_all)]
pub async fn update_repo_fields(pool: &Pool, repo_id: i64, update: &RepoUpdate) -> Result<bool> {
    if update.is_empty() {
        return Ok(true);
    }

    let mut qb = QueryBuilder::<Sqlite>::new("UPDATE monitored_repos SET ");
    {
        let mut sep = qb.separated(", ");
        if let Some(v) = &update.check_interval {
            sep.push("check_interval = ").push_bind_unseparated(*v);
        }
        if let Some(v) = update.monitor_commits {
            sep.push("monitor_commits = ").push_bind_unseparated(v);
        }
        if let Some(v) = update.monitor_issues {
            sep.push("monitor_issues = ").push_bind_unseparated(v);
        }
        if let Some(v) = update.monitor_tags {
            sep.push("monitor_tags = ").push_bind_unseparated(v);
        }
        if let Some(v) = &update.last_commit_sha {
            sep.push("last_commit_sha = ")
                .push_bind_unseparated(v.clone());
        }
        if let Some(v) = &update.commit_etag {
            sep.push("commit_etag = ").push_bind_unseparated(v.clone());
        }
        if let Some(v) = &update.last_known_issue_number {
            sep.push("last_known_issue_number = ")
                .push_bind_unseparated(*v);
        }
        if let Some(v) = &update.issue_etag {
            sep.push("issue_etag = ").push_bind_unseparated(v.clone());
        }
        if let Some(v) = &update.last_closed_issue_update_ts {
            sep.push("last_closed_issue_update_ts = ")
                .push_bind_unseparated(v.clone());
        }
        if let Some(v) = &update.closed_issue_etag {
            sep.push("closed_issue_etag = ")
                .push_bind_unseparated(v.clone());
        }
        if let Some(v) = &update.last_known_tag_name {
            sep.push("last_known_tag_name = ")
                .push_bind_unseparated(v.clone());
        }
        if let Some(v) = &update.tag_etag {
            sep.push("tag_etag = ").push_bind_unseparated(v.clone());
        }
    }
    qb.push(" WHERE id = ").push_bind(repo_id);

    let result = qb.build().execute(pool).await?;
    Ok(result.rows_affected() > 0)
}

/// Changes the monitored branch. The commit cursor and ETag are reset so the
/// next cycle re-baselines against the new branch head.
#[instrument(skip_all)]
pub async fn set_repo_branch(pool: &Pool, repo_id: i64, branch: Option<&str>) -> Result<bool> {
    let result = sqlx::query(
        "UPDATE monitored_repos SET branch = ?, last_commit_sha = NULL, commit_etag = NULL \
         WHERE id = ?",
    )
    .bind(branch)
    .bind(repo_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

#[instrument(skip_all)]
pub async fn set_repo_interval(pool: &Pool, repo_id: i64, interval_secs: i64) -> Result<bool> {
    let result = sqlx::query("UPDATE monitored_repos SET check_interval = ? WHERE id = ?")
        .bind(interval_secs)
        .bind(repo_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
