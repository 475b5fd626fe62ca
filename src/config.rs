//! Configuration loader and validator for the GitHub→Telegram watch bot.
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Root configuration struct mirroring the YAML schema exactly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    pub app: App,
    pub telegram: Telegram,
    pub github: Github,
}

/// App-level settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct App {
    pub data_dir: String,
    /// Poll interval used when a repository row has no per-repo override.
    pub default_check_interval_secs: u64,
    /// Transient-error retries before a monitor gives up permanently.
    pub max_check_retries: u32,
    /// Items requested per API page.
    pub api_page_size: u32,
    pub notification_caps: NotificationCaps,
    /// Optional path to a YAML file overriding the built-in message templates.
    #[serde(default)]
    pub strings_file: Option<String>,
}

/// Upper bounds on how many items a multi-item notification lists.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NotificationCaps {
    pub commits: usize,
    pub issues: usize,
    pub tags: usize,
}

/// Telegram bot settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Telegram {
    pub bot_token: String,
}

/// GitHub API settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Github {
    /// Personal access token; anonymous requests are allowed but rate-limited.
    #[serde(default)]
    pub token: Option<String>,
    pub api_base: String,
}

impl Config {
    /// Ensure required directories exist (creates `app.data_dir` if missing).
    pub fn ensure_dirs(&self) -> Result<(), std::io::Error> {
        if self.app.data_dir.trim().is_empty() {
            return Ok(());
        }
        fs::create_dir_all(&self.app.data_dir)
    }
}

/// Load configuration from a YAML file and validate it.
/// - If `path` is None, uses `config.yaml` in the current working directory.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or_else(|| Path::new("config.yaml"));
    let content = fs::read_to_string(path)?;
    let cfg: Config = serde_yaml::from_str(&content)?;
    validate(&cfg)?;
    Ok(cfg)
}

/// Validate a configuration instance.
fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.app.data_dir.trim().is_empty() {
        return Err(ConfigError::Invalid("app.data_dir must be non-empty"));
    }
    if cfg.app.default_check_interval_secs == 0 {
        return Err(ConfigError::Invalid(
            "app.default_check_interval_secs must be > 0",
        ));
    }
    if cfg.app.max_check_retries == 0 {
        return Err(ConfigError::Invalid("app.max_check_retries must be > 0"));
    }
    if cfg.app.api_page_size == 0 {
        return Err(ConfigError::Invalid("app.api_page_size must be > 0"));
    }
    let caps = &cfg.app.notification_caps;
    if caps.commits == 0 || caps.issues == 0 || caps.tags == 0 {
        return Err(ConfigError::Invalid(
            "app.notification_caps entries must be > 0",
        ));
    }

    if cfg.telegram.bot_token.trim().is_empty() {
        return Err(ConfigError::Invalid("telegram.bot_token must be non-empty"));
    }

    if cfg.github.api_base.trim().is_empty() {
        return Err(ConfigError::Invalid("github.api_base must be non-empty"));
    }
    if let Some(token) = &cfg.github.token {
        if token.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "github.token must be non-empty when present",
            ));
        }
    }

    Ok(())
}

/// Returns the canonical example YAML content.
pub fn example() -> &'static str {
    r#"app:
  data_dir: "./data"
  default_check_interval_secs: 300
  max_check_retries: 5
  api_page_size: 30
  notification_caps:
    commits: 4
    issues: 4
    tags: 3

telegram:
  bot_token: "YOUR_TELEGRAM_BOT_TOKEN"

github:
  token: "YOUR_GITHUB_TOKEN"
  api_base: "https://api.github.com"
"#
}
