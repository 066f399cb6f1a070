use keygate_core::KeyService;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Runs cleanup every `every`, starting one period after launch.
pub fn start_cleanup_loop(keys: KeyService, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(every);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        tick.tick().await;

        loop {
            tick.tick().await;
            match keys.cleanup().await {
                Ok(report) if report.deleted > 0 => tracing::info!(
                    "Scheduled cleanup removed {} key(s), {} remaining",
                    report.deleted,
                    report.remaining
                ),
                Ok(_) => tracing::debug!("Scheduled cleanup found nothing to remove"),
                Err(e) => tracing::warn!("Scheduled cleanup failed: {}", e),
            }
        }
    })
}
