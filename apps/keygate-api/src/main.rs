use anyhow::Context;
use keygate_api::config::AppConfig;
use keygate_api::github_client::GitHubStore;
use keygate_api::{AppState, build_router, scheduler};
use keygate_core::{KeyRepository, KeyService, SystemClock};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "keygate_api=debug,keygate_core=debug,tower_http=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::load();
    tracing::info!("Keygate API starting...");
    tracing::info!(
        "Keys document: {}/{}:{} ({})",
        config.github_owner,
        config.github_repo,
        config.keys_file,
        config.github_branch.as_deref().unwrap_or("default branch")
    );

    let store = GitHubStore::new(
        &config.github_api_url,
        &config.github_owner,
        &config.github_repo,
        config.github_branch.clone(),
        &config.github_token,
        Duration::from_secs(config.store_timeout_secs),
    )
    .context("Failed to build GitHub client")?;

    let repo = KeyRepository::new(Arc::new(store), config.keys_file.clone());
    let keys = KeyService::new(repo, Arc::new(SystemClock))
        .with_max_attempts(config.store_max_attempts)
        .with_display_offset(config.display_offset()?);

    let cron_secret = config.cron_secret().map(str::to_string);
    if cron_secret.is_none() {
        tracing::warn!("CRON_SECRET is not set, /api/cleanup will reject every request");
    }

    if let Some(secs) = config.cleanup_interval_secs.filter(|s| *s > 0) {
        tracing::info!("Scheduled cleanup every {}s", secs);
        scheduler::start_cleanup_loop(keys.clone(), Duration::from_secs(secs));
    }

    let app = build_router(AppState { keys, cron_secret });

    let addr = SocketAddr::from(([0, 0, 0, 0], config.listen_port));
    tracing::info!("Keygate listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
