use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::Mutex;
use tracing::info;

use super::{Category, Manifest, Plugin};
use crate::events::EventBus;
use crate::games::guess::{self, GuessNumber};
use crate::games::konami::{self, Ballot};
use crate::games::squid::{self, SquidGame};
use crate::games::tictactoe::{parse_cell, Mark, MoveOutcome, TicTacToe};
use crate::games::{spawn_game, ActiveGames, GameKind, GameSlot};
use crate::jid;
use crate::message::Message;
use crate::router::Command;

/// Claim the chat or tell the sender which game is in the way
async fn claim(games: &ActiveGames, msg: &Message, kind: GameKind) -> Option<GameSlot> {
    match games.claim(&msg.chat_id, kind) {
        Ok(slot) => Some(slot),
        Err(occupant) => {
            msg.react("⏳").await;
            msg.reply(format!(
                "A {} game is already running here. Finish it or use stopgame first.",
                occupant
            ))
            .await;
            None
        }
    }
}

pub struct SquidGameCommand {
    bus: EventBus,
    games: ActiveGames,
}

impl SquidGameCommand {
    pub fn new(bus: EventBus, games: ActiveGames) -> Self {
        Self { bus, games }
    }
}

#[async_trait]
impl Plugin for SquidGameCommand {
    fn manifest(&self) -> Manifest {
        Manifest::command("squidgame", Category::Game, "Red light, green light elimination game")
            .aliases(&["squid"])
            .usage("start")
    }

    async fn execute(&self, msg: &Message, cmd: &Command) -> Result<()> {
        match cmd.args.first().map(String::as_str) {
            None | Some("start") => {}
            Some(_) => {
                msg.reply("Usage: squidgame start").await;
                return Ok(());
            }
        }
        if !msg.is_group {
            msg.reply("Squid Game can only be played in groups.").await;
            return Ok(());
        }
        let (Some(roster), Some(ctx)) = (msg.group_info.as_ref(), msg.context()) else {
            msg.reply("Couldn't load the member list, try again later.").await;
            return Ok(());
        };
        if !msg.is_sender_admin() {
            msg.react("❌").await;
            msg.reply("Only group admins can start Squid Game.").await;
            return Ok(());
        }
        if !msg.is_bot_admin() {
            msg.react("❌").await;
            msg.reply("I need to be an admin to eliminate players.").await;
            return Ok(());
        }

        let players = squid::select_players(roster, &ctx.bot_id());
        if players.len() < squid::MIN_PLAYERS {
            msg.reply(format!(
                "Squid Game needs at least {} non-admin members, this group has {}.",
                squid::MIN_PLAYERS,
                players.len()
            ))
            .await;
            return Ok(());
        }

        let Some(slot) = claim(&self.games, msg, GameKind::SquidGame).await else {
            return Ok(());
        };
        let game = SquidGame::new(players);
        spawn_game(
            ctx.clone(),
            msg.chat_id.clone(),
            GameKind::SquidGame,
            squid::run(ctx.clone(), self.bus.clone(), slot, game, StdRng::from_entropy()),
        );
        Ok(())
    }
}

pub struct KonamiCommand {
    bus: EventBus,
    games: ActiveGames,
}

impl KonamiCommand {
    pub fn new(bus: EventBus, games: ActiveGames) -> Self {
        Self { bus, games }
    }
}

#[async_trait]
impl Plugin for KonamiCommand {
    fn manifest(&self) -> Manifest {
        Manifest::command("konami", Category::Game, "Vote on a random football match")
            .aliases(&["match"])
    }

    async fn execute(&self, msg: &Message, _cmd: &Command) -> Result<()> {
        let Some(ctx) = msg.context() else {
            return Ok(());
        };
        let Some(slot) = claim(&self.games, msg, GameKind::KonamiMatch).await else {
            return Ok(());
        };
        let mut rng = StdRng::from_entropy();
        let ballot = Ballot::draw(&mut rng);
        spawn_game(
            ctx.clone(),
            msg.chat_id.clone(),
            GameKind::KonamiMatch,
            konami::run(ctx.clone(), self.bus.clone(), slot, ballot, rng),
        );
        Ok(())
    }
}

pub struct GuessCommand {
    bus: EventBus,
    games: ActiveGames,
}

impl GuessCommand {
    pub fn new(bus: EventBus, games: ActiveGames) -> Self {
        Self { bus, games }
    }
}

#[async_trait]
impl Plugin for GuessCommand {
    fn manifest(&self) -> Manifest {
        Manifest::command("guess", Category::Game, "Guess the secret number together")
            .aliases(&["tebak"])
    }

    async fn execute(&self, msg: &Message, _cmd: &Command) -> Result<()> {
        let Some(ctx) = msg.context() else {
            return Ok(());
        };
        let Some(slot) = claim(&self.games, msg, GameKind::GuessNumber).await else {
            return Ok(());
        };
        let game = GuessNumber::random(&mut StdRng::from_entropy());
        let sub = self.bus.subscribe("guess-number");
        spawn_game(
            ctx.clone(),
            msg.chat_id.clone(),
            GameKind::GuessNumber,
            guess::run(ctx.clone(), sub, slot, game),
        );
        Ok(())
    }
}

struct TicTacToeSession {
    game: TicTacToe,
    /// Held for the session's lifetime; removing the session frees the chat
    _slot: GameSlot,
}

/// Running Tic-Tac-Toe boards by chat, shared with `stopgame`
#[derive(Clone, Default)]
pub struct TicTacToeSessions {
    inner: Arc<Mutex<HashMap<String, TicTacToeSession>>>,
}

impl TicTacToeSessions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop the chat's board. Returns whether one existed.
    pub async fn end(&self, chat_id: &str) -> bool {
        self.inner.lock().await.remove(chat_id).is_some()
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }
}

pub struct TicTacToeCommand {
    games: ActiveGames,
    sessions: TicTacToeSessions,
    owners: Arc<Vec<String>>,
}

impl TicTacToeCommand {
    pub fn new(games: ActiveGames, sessions: TicTacToeSessions, owners: Arc<Vec<String>>) -> Self {
        Self {
            games,
            sessions,
            owners,
        }
    }

    async fn start(&self, msg: &Message) {
        let Some(slot) = claim(&self.games, msg, GameKind::TicTacToe).await else {
            return;
        };
        let game = TicTacToe::new(&msg.sender_id);
        let text = format!(
            "❌⭕ *TIC-TAC-TOE*\n\n{} plays ❌. The first other player to move takes ⭕.\n\
             Send a number from 1 to 9 to place your mark.\n\n{}",
            jid::mention_tag(game.player_x()),
            game.render()
        );
        self.sessions.inner.lock().await.insert(
            msg.chat_id.clone(),
            TicTacToeSession { game, _slot: slot },
        );
        msg.reply_mentions(text, vec![msg.sender_id.clone()]).await;
    }

    async fn end(&self, msg: &Message) {
        let mut sessions = self.sessions.inner.lock().await;
        let Some(session) = sessions.get(&msg.chat_id) else {
            msg.reply("No Tic-Tac-Toe game is running here.").await;
            return;
        };
        let seated = jid::same_user(&msg.sender_id, session.game.player_x())
            || session
                .game
                .player_o()
                .is_some_and(|o| jid::same_user(&msg.sender_id, o));
        if !seated && !msg.is_sender_admin() && !msg.is_owner(&self.owners) {
            msg.reply("Only the players or an admin can end this game.").await;
            return;
        }
        sessions.remove(&msg.chat_id);
        drop(sessions);
        msg.reply("🛑 Tic-Tac-Toe ended.").await;
    }

    async fn board(&self, msg: &Message) {
        let sessions = self.sessions.inner.lock().await;
        let text = match sessions.get(&msg.chat_id) {
            Some(session) => session.game.render(),
            None => "No Tic-Tac-Toe game is running here.".to_string(),
        };
        drop(sessions);
        msg.reply(text).await;
    }
}

#[async_trait]
impl Plugin for TicTacToeCommand {
    fn manifest(&self) -> Manifest {
        Manifest::command("ttt", Category::Game, "Play Tic-Tac-Toe")
            .aliases(&["tictactoe"])
            .usage("[end | board]")
            .observer()
    }

    async fn execute(&self, msg: &Message, cmd: &Command) -> Result<()> {
        match cmd.args.first().map(|a| a.to_lowercase()).as_deref() {
            None | Some("start") => self.start(msg).await,
            Some("end") | Some("stop") => self.end(msg).await,
            Some("board") => self.board(msg).await,
            Some(_) => {
                msg.reply("Usage: ttt [end | board]").await;
            }
        }
        Ok(())
    }

    /// Plain `1`-`9` messages are moves in the chat's running game
    async fn on_message(&self, msg: &Message) -> Result<()> {
        if msg.from_me {
            return Ok(());
        }
        let Some(cell) = parse_cell(&msg.body) else {
            return Ok(());
        };
        let mut sessions = self.sessions.inner.lock().await;
        let Some(session) = sessions.get_mut(&msg.chat_id) else {
            return Ok(());
        };
        if !session.game.is_player(&msg.sender_id) {
            return Ok(());
        }

        let outcome = match session.game.play(&msg.sender_id, cell) {
            Ok(outcome) => outcome,
            Err(e) => {
                drop(sessions);
                msg.reply(e.to_string()).await;
                return Ok(());
            }
        };
        let board = session.game.render();
        let text = match outcome {
            MoveOutcome::Continue { next } => {
                let next_player = match next {
                    Mark::X => Some(session.game.player_x().to_string()),
                    Mark::O => session.game.player_o().map(str::to_string),
                };
                let turn = match next_player {
                    Some(p) => format!("{}'s turn", jid::mention_tag(&p)),
                    None => "Waiting for ⭕ to join".to_string(),
                };
                format!("{}\n\n{}", board, turn)
            }
            MoveOutcome::Win { player, .. } => {
                format!("{}\n\n🏆 {} wins!", board, jid::mention_tag(&player))
            }
            MoveOutcome::Draw => format!("{}\n\n🤝 It's a draw!", board),
        };
        if session.game.is_finished() {
            info!("Tic-Tac-Toe finished in {}", msg.chat_id);
            sessions.remove(&msg.chat_id);
        }
        drop(sessions);
        msg.reply(text).await;
        Ok(())
    }
}

pub struct StopGame {
    games: ActiveGames,
    sessions: TicTacToeSessions,
    owners: Arc<Vec<String>>,
}

impl StopGame {
    pub fn new(games: ActiveGames, sessions: TicTacToeSessions, owners: Arc<Vec<String>>) -> Self {
        Self {
            games,
            sessions,
            owners,
        }
    }
}

#[async_trait]
impl Plugin for StopGame {
    fn manifest(&self) -> Manifest {
        Manifest::command("stopgame", Category::Game, "Stop the game running in this chat")
            .aliases(&["endgame"])
    }

    async fn execute(&self, msg: &Message, _cmd: &Command) -> Result<()> {
        if msg.is_group && !msg.is_sender_admin() && !msg.is_owner(&self.owners) {
            msg.react("❌").await;
            msg.reply("Only group admins can stop a game.").await;
            return Ok(());
        }
        match self.games.occupant(&msg.chat_id) {
            None => {
                msg.reply("No game is running here.").await;
            }
            Some(GameKind::TicTacToe) => {
                self.sessions.end(&msg.chat_id).await;
                msg.reply("🛑 Tic-Tac-Toe ended.").await;
            }
            Some(_) => {
                if let Some(kind) = self.games.request_stop(&msg.chat_id) {
                    msg.reply(format!("Stopping {}...", kind)).await;
                }
            }
        }
        Ok(())
    }
}
