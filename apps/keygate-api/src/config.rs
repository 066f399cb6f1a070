use anyhow::{Context, Result};
use chrono::FixedOffset;
use clap::Parser;

/// Service configuration, read from flags or the environment (`.env` is honoured).
#[derive(Parser, Clone)]
#[command(author, version, about = "Issues, verifies and renews access keys", long_about = None)]
pub struct AppConfig {
    /// GitHub token with write access to the keys repository
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub github_token: String,

    /// Owner of the keys repository
    #[arg(long, env = "GITHUB_OWNER")]
    pub github_owner: String,

    /// Name of the keys repository
    #[arg(long, env = "GITHUB_REPO")]
    pub github_repo: String,

    /// Branch holding the keys file (repository default when unset)
    #[arg(long, env = "GITHUB_BRANCH")]
    pub github_branch: Option<String>,

    #[arg(long, env = "GITHUB_API_URL", default_value = "https://api.github.com")]
    pub github_api_url: String,

    /// Path of the keys document inside the repository
    #[arg(long = "keys-file", env = "KEYS_FILE_PATH", default_value = "keys.json")]
    pub keys_file: String,

    /// Bearer secret required by the cleanup endpoint
    #[arg(long, env = "CRON_SECRET", hide_env_values = true)]
    pub cron_secret: Option<String>,

    #[arg(long, env = "LISTEN_PORT", default_value_t = 3000)]
    pub listen_port: u16,

    /// Tries per write before a concurrent modification is reported
    #[arg(long, env = "STORE_MAX_ATTEMPTS", default_value_t = 3)]
    pub store_max_attempts: u32,

    #[arg(long, env = "STORE_TIMEOUT_SECS", default_value_t = 30)]
    pub store_timeout_secs: u64,

    /// Run cleanup in-process every N seconds
    #[arg(long, env = "CLEANUP_INTERVAL_SECS")]
    pub cleanup_interval_secs: Option<u64>,

    /// UTC offset for human readable expiry strings
    #[arg(
        long,
        env = "DISPLAY_UTC_OFFSET_HOURS",
        default_value_t = 0,
        allow_hyphen_values = true
    )]
    pub display_utc_offset_hours: i32,
}

impl AppConfig {
    pub fn load() -> Self {
        if let Err(e) = dotenvy::dotenv() {
            tracing::debug!("No .env file loaded: {}", e);
        }
        Self::parse()
    }

    pub fn display_offset(&self) -> Result<FixedOffset> {
        FixedOffset::east_opt(self.display_utc_offset_hours * 3600).with_context(|| {
            format!(
                "DISPLAY_UTC_OFFSET_HOURS out of range: {}",
                self.display_utc_offset_hours
            )
        })
    }

    /// The cleanup secret, ignoring blank values.
    pub fn cron_secret(&self) -> Option<&str> {
        self.cron_secret
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}
