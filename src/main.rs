mod bot;
mod bridge;
mod config;
mod events;
mod games;
mod jid;
mod llm;
mod message;
mod metadata;
mod plugins;
mod router;
mod scheduler;
mod socket;
#[cfg(test)]
mod testing;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::bot::Bot;
use crate::bridge::BridgeSocket;
use crate::config::Config;
use crate::events::EventBus;
use crate::games::ActiveGames;
use crate::llm::LlmClient;
use crate::message::{BotContext, SessionInfo};
use crate::metadata::MetadataCache;
use crate::router::Router;
use crate::scheduler::Scheduler;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,wabot=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    std::panic::set_hook(Box::new(|panic| {
        error!("Unhandled panic: {}", panic);
    }));

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    info!("Loading configuration from: {}", config_path.display());
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    info!("Configuration loaded successfully");
    info!("  Bot: {} (prefix '{}')", config.bot.name, config.bot.prefix);
    info!("  Bridge: {}", config.bridge.base_url);
    info!("  Owners: {:?}", config.bot.owners);
    match &config.llm {
        Some(llm) => info!("  AI relay: {} via {}", llm.model, llm.provider),
        None => info!("  AI relay: disabled"),
    }
    let config = Arc::new(config);

    let socket = Arc::new(BridgeSocket::connect(&config.bridge).await?);
    let metadata = Arc::new(MetadataCache::new(config.cache.ttl()));
    let mut ctx = BotContext::new(socket, metadata.clone(), &config.bot.name);
    if config.session.save_media {
        ctx = ctx.with_session(SessionInfo {
            id: config.session.id.clone(),
            media_dir: config.session.media_dir.clone(),
        });
    }

    let bus = EventBus::new();
    let games = ActiveGames::new();
    let llm = config.llm.clone().map(|c| Arc::new(LlmClient::new(c)));

    let mut router = Router::new(&config.bot.prefix);
    plugins::register_builtin(&mut router, &config, &bus, &games, llm);

    // The router listens first so commands are seen before any game phase
    let sub = bus.subscribe("router");

    let mut scheduler = Scheduler::new().await?;
    scheduler::tasks::register_builtin_tasks(
        &scheduler,
        &config.cache,
        metadata,
        games,
        bus.clone(),
    )
    .await?;
    scheduler.start().await?;

    let bot = Bot::new(ctx, router, config.clone());
    tokio::spawn(async move {
        bot.run(sub).await;
    });

    info!("Bot is starting...");
    tokio::select! {
        result = bridge::serve(&config.bridge, bus) => result?,
        _ = tokio::signal::ctrl_c() => info!("Received Ctrl-C, shutting down"),
    }

    scheduler.shutdown().await?;
    Ok(())
}
