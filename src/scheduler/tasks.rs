use std::sync::Arc;

use tracing::info;

use crate::config::CacheConfig;
use crate::events::EventBus;
use crate::games::ActiveGames;
use crate::metadata::MetadataCache;
use crate::scheduler::Scheduler;

/// Register built-in background tasks
pub async fn register_builtin_tasks(
    scheduler: &Scheduler,
    cache: &CacheConfig,
    metadata: Arc<MetadataCache>,
    games: ActiveGames,
    bus: EventBus,
) -> anyhow::Result<()> {
    let sweep_cache = metadata.clone();
    scheduler
        .add_cron_job(&cache.sweep_cron, "metadata-sweep", move || {
            let metadata = sweep_cache.clone();
            async move {
                let evicted = metadata.sweep().await;
                if evicted > 0 {
                    info!("Evicted {} stale group roster(s)", evicted);
                }
            }
        })
        .await?;

    // Heartbeat: log that the bot is alive every hour
    scheduler
        .add_cron_job("0 0 * * * *", "heartbeat", move || {
            let metadata = metadata.clone();
            let games = games.clone();
            let bus = bus.clone();
            async move {
                info!(
                    "Heartbeat: {} cached roster(s), {} active game(s), {} listener(s)",
                    metadata.len().await,
                    games.len(),
                    bus.listener_count()
                );
            }
        })
        .await?;

    Ok(())
}
