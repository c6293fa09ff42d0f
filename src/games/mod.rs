//! Per-chat mini-games.
//!
//! Every game family shares one [`ActiveGames`] registry, so a chat runs at most
//! one game at a time. A claimed slot is a [`GameSlot`] guard: it carries the
//! stop signal for the running game and frees the chat when dropped.

pub mod guess;
pub mod konami;
pub mod squid;
pub mod tictactoe;

use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use futures::FutureExt;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{error, info};
use uuid::Uuid;

use crate::events::Subscription;
use crate::message::{inspect, BotContext, Envelope};

pub const GENERIC_FAILURE: &str = "⚠️ Something went wrong, the game has been cancelled.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameKind {
    SquidGame,
    KonamiMatch,
    GuessNumber,
    TicTacToe,
}

impl std::fmt::Display for GameKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GameKind::SquidGame => write!(f, "Squid Game"),
            GameKind::KonamiMatch => write!(f, "Konami Match"),
            GameKind::GuessNumber => write!(f, "Guess Number"),
            GameKind::TicTacToe => write!(f, "Tic-Tac-Toe"),
        }
    }
}

struct Slot {
    id: Uuid,
    kind: GameKind,
    stop: Arc<Notify>,
}

/// Which game, if any, owns each chat
#[derive(Clone, Default)]
pub struct ActiveGames {
    slots: Arc<Mutex<HashMap<String, Slot>>>,
}

impl ActiveGames {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the chat for `kind`. Fails with the occupying family if the chat is busy.
    pub fn claim(&self, chat_id: &str, kind: GameKind) -> Result<GameSlot, GameKind> {
        let mut slots = self.lock();
        if let Some(existing) = slots.get(chat_id) {
            return Err(existing.kind);
        }
        let id = Uuid::new_v4();
        let stop = Arc::new(Notify::new());
        slots.insert(
            chat_id.to_string(),
            Slot {
                id,
                kind,
                stop: stop.clone(),
            },
        );
        info!("{} started in {} ({})", kind, chat_id, id);
        Ok(GameSlot {
            id,
            chat_id: chat_id.to_string(),
            kind,
            stop,
            games: self.clone(),
        })
    }

    pub fn occupant(&self, chat_id: &str) -> Option<GameKind> {
        self.lock().get(chat_id).map(|s| s.kind)
    }

    /// Ask the chat's running game to stop. Returns the family that was asked.
    pub fn request_stop(&self, chat_id: &str) -> Option<GameKind> {
        let slots = self.lock();
        let slot = slots.get(chat_id)?;
        slot.stop.notify_one();
        Some(slot.kind)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    fn release(&self, chat_id: &str, id: Uuid) {
        let mut slots = self.lock();
        if slots.get(chat_id).is_some_and(|s| s.id == id) {
            slots.remove(chat_id);
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Slot>> {
        self.slots
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// A chat's claim on the registry; frees the chat on drop
pub struct GameSlot {
    id: Uuid,
    chat_id: String,
    kind: GameKind,
    stop: Arc<Notify>,
    games: ActiveGames,
}

impl GameSlot {
    pub fn chat_id(&self) -> &str {
        &self.chat_id
    }

    /// Resolves once a stop has been requested for this game
    pub async fn stopped(&self) {
        self.stop.notified().await
    }
}

impl Drop for GameSlot {
    fn drop(&mut self) {
        self.games.release(&self.chat_id, self.id);
        info!("{} finished in {} ({})", self.kind, self.chat_id, self.id);
    }
}

/// Run a game on its own task. Errors and panics are logged and reported to the
/// chat; the game's slot is dropped with its future either way.
pub fn spawn_game<F>(ctx: BotContext, chat_id: String, kind: GameKind, game: F) -> JoinHandle<()>
where
    F: Future<Output = Result<()>> + Send + 'static,
{
    tokio::spawn(async move {
        let failure = match AssertUnwindSafe(game).catch_unwind().await {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(format!("{:#}", e)),
            Err(panic) => Some(crate::router::panic_message(panic.as_ref())),
        };
        if let Some(reason) = failure {
            error!("{} in {} failed: {}", kind, chat_id, reason);
            ctx.send_text(&chat_id, GENERIC_FAILURE).await;
        }
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowEnd {
    Elapsed,
    Stopped,
}

/// Feed every message sent to `chat_id` by someone other than the bot to
/// `on_message` until `window` elapses or a stop is requested.
///
/// The subscription is dropped before this returns, so nothing arriving after
/// the window closes is attributed to it.
pub async fn listen_window(
    mut sub: Subscription,
    chat_id: &str,
    bot_id: &str,
    window: Duration,
    slot: &GameSlot,
    mut on_message: impl FnMut(Envelope),
) -> WindowEnd {
    let deadline = tokio::time::sleep(window);
    tokio::pin!(deadline);

    let end = loop {
        tokio::select! {
            _ = &mut deadline => break WindowEnd::Elapsed,
            _ = slot.stopped() => break WindowEnd::Stopped,
            event = sub.recv() => {
                let Some(event) = event else {
                    break WindowEnd::Stopped;
                };
                for raw in event.notified_messages() {
                    match inspect(raw, bot_id) {
                        Some(env) if env.chat_id == chat_id && !env.from_me => on_message(env),
                        _ => {}
                    }
                }
            }
        }
    };
    drop(sub);
    end
}

/// `@user` tags for a list of JIDs, one per line
pub fn mention_lines(ids: &[String]) -> String {
    ids.iter()
        .map(|id| format!("• {}", crate::jid::mention_tag(id)))
        .collect::<Vec<_>>()
        .join("\n")
}
