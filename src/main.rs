use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use teloxide::prelude::*;
use tracing::info;

use tg_gitwatch::config;
use tg_gitwatch::db;
use tg_gitwatch::github::GithubClient;
use tg_gitwatch::monitor::checker::CheckerContext;
use tg_gitwatch::monitor::supervisor::Supervisor;
use tg_gitwatch::monitor::MonitorSettings;
use tg_gitwatch::notifier::TelegramNotifier;
use tg_gitwatch::strings::Strings;

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let cfg = config::load(Some(&args.config))?;
    cfg.ensure_dirs()?;

    let database_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| format!("sqlite://{}/gitwatch.db", cfg.app.data_dir));

    let pool = db::init_pool(&database_url).await?;
    db::run_migrations(&pool).await?;

    let strings = match &cfg.app.strings_file {
        Some(path) => Strings::load(std::path::Path::new(path))?,
        None => Strings::default(),
    };

    let bot = Bot::new(cfg.telegram.bot_token.clone());
    let ctx = CheckerContext {
        api: Arc::new(GithubClient::new(cfg.github.token.as_deref())),
        pool,
        notifier: Arc::new(TelegramNotifier::new(bot)),
        strings: Arc::new(strings),
        settings: MonitorSettings::from_config(&cfg),
    };

    let supervisor = Supervisor::new(ctx);
    let started = supervisor.reconcile().await?;
    info!(started, "gitwatch monitors running");

    tokio::signal::ctrl_c().await?;
    info!("shutdown requested");
    supervisor.shutdown().await;

    Ok(())
}
