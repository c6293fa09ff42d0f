use std::collections::HashSet;
use std::time::Duration;

use anyhow::Result;
use rand::rngs::StdRng;
use rand::Rng;
use tracing::{info, warn};

use super::{listen_window, mention_lines, GameSlot, WindowEnd};
use crate::events::EventBus;
use crate::jid;
use crate::message::BotContext;
use crate::socket::{GroupMetadata, OutgoingContent, ParticipantAction};

pub const COUNTDOWN: Duration = Duration::from_secs(15);
pub const ROUND_WINDOW: Duration = Duration::from_secs(7);
pub const MAX_ROUNDS: u32 = 10;
pub const MIN_PLAYERS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Light {
    /// Players must talk to survive
    Green,
    /// Players must stay silent to survive
    Red,
}

impl Light {
    fn announcement(self) -> &'static str {
        match self {
            Light::Green => "🟢 GREEN LIGHT! Send any message to survive!",
            Light::Red => "🔴 RED LIGHT! Stay silent or be eliminated!",
        }
    }
}

/// Players of a Squid Game: the roster's non-admins, without the bot.
pub fn select_players(roster: &GroupMetadata, bot_id: &str) -> Vec<String> {
    roster
        .participants
        .iter()
        .filter(|p| !p.role.is_admin() && !jid::same_user(&p.id, bot_id))
        .map(|p| jid::normalize(&p.id))
        .collect()
}

/// Who loses a round: silent players under green, talkers under red.
pub fn eliminated(light: Light, players: &[String], speakers: &HashSet<String>) -> Vec<String> {
    players
        .iter()
        .filter(|p| match light {
            Light::Green => !speakers.contains(*p),
            Light::Red => speakers.contains(*p),
        })
        .cloned()
        .collect()
}

/// Round-by-round state of one game
#[derive(Debug, Clone)]
pub struct SquidGame {
    players: Vec<String>,
    round: u32,
}

impl SquidGame {
    pub fn new(players: Vec<String>) -> Self {
        Self { players, round: 0 }
    }

    pub fn players(&self) -> &[String] {
        &self.players
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn is_over(&self) -> bool {
        self.players.len() <= 1 || self.round >= MAX_ROUNDS
    }

    /// Apply one round's result and return the eliminated players
    pub fn play_round(&mut self, light: Light, speakers: &HashSet<String>) -> Vec<String> {
        self.round += 1;
        let out = eliminated(light, &self.players, speakers);
        self.players.retain(|p| !out.contains(p));
        out
    }

    pub fn winner(&self) -> Option<&str> {
        match self.players.as_slice() {
            [only] => Some(only.as_str()),
            _ => None,
        }
    }
}

pub async fn run(
    ctx: BotContext,
    bus: EventBus,
    slot: GameSlot,
    mut game: SquidGame,
    mut rng: StdRng,
) -> Result<()> {
    let chat_id = slot.chat_id().to_string();
    let bot_id = ctx.bot_id();

    let intro = format!(
        "🦑 *SQUID GAME* 🦑\n\n\
         Rules:\n\
         🟢 Green light: send any message to survive\n\
         🔴 Red light: stay silent to survive\n\
         Each round lasts {} seconds, up to {} rounds.\n\n\
         Players:\n{}\n\n\
         Starting in {} seconds...",
        ROUND_WINDOW.as_secs(),
        MAX_ROUNDS,
        mention_lines(game.players()),
        COUNTDOWN.as_secs()
    );
    ctx.send(&chat_id, OutgoingContent::mentions(intro, game.players().to_vec()), None)
        .await;

    tokio::select! {
        _ = tokio::time::sleep(COUNTDOWN) => {}
        _ = slot.stopped() => {
            ctx.send_text(&chat_id, "🛑 Squid Game was stopped.").await;
            return Ok(());
        }
    }

    while !game.is_over() {
        let light = if rng.gen_bool(0.5) {
            Light::Green
        } else {
            Light::Red
        };

        let sub = bus.subscribe("squid-game");
        ctx.send_text(
            &chat_id,
            format!("Round {}/{}\n{}", game.round() + 1, MAX_ROUNDS, light.announcement()),
        )
        .await;

        let mut speakers = HashSet::new();
        let end = listen_window(sub, &chat_id, &bot_id, ROUND_WINDOW, &slot, |env| {
            speakers.insert(env.sender_id);
        })
        .await;
        if end == WindowEnd::Stopped {
            ctx.send_text(&chat_id, "🛑 Squid Game was stopped.").await;
            return Ok(());
        }

        let out = game.play_round(light, &speakers);
        info!(
            "Squid Game {} round {}: {:?} light, {} eliminated, {} left",
            chat_id,
            game.round(),
            light,
            out.len(),
            game.players().len()
        );

        if out.is_empty() {
            ctx.send_text(&chat_id, "✅ Everyone survived this round!").await;
            continue;
        }

        if let Err(e) = ctx
            .socket
            .group_participants_update(&chat_id, &out, ParticipantAction::Remove)
            .await
        {
            warn!("Failed to remove eliminated players from {}: {:#}", chat_id, e);
        }
        let text = format!(
            "💀 Eliminated:\n{}\n\n{} player(s) remaining.",
            mention_lines(&out),
            game.players().len()
        );
        ctx.send(&chat_id, OutgoingContent::mentions(text, out), None)
            .await;
    }

    match game.winner() {
        Some(winner) => {
            let text = format!(
                "🏆 {} is the last one standing and wins Squid Game!",
                jid::mention_tag(winner)
            );
            ctx.send(&chat_id, OutgoingContent::mentions(text, vec![winner.to_string()]), None)
                .await;
        }
        None => {
            ctx.send_text(
                &chat_id,
                format!(
                    "🏁 Squid Game over: no winner, {} player(s) survived.",
                    game.players().len()
                ),
            )
            .await;
        }
    }

    Ok(())
}
