use std::time::Duration;

use anyhow::Result;
use rand::rngs::StdRng;
use rand::Rng;
use tracing::info;

use super::GameSlot;
use crate::events::Subscription;
use crate::jid;
use crate::message::{inspect, BotContext};
use crate::socket::OutgoingContent;

pub const MIN: i64 = 1;
pub const MAX: i64 = 20;
pub const ATTEMPTS: u32 = 5;
pub const TIME_LIMIT: Duration = Duration::from_secs(120);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuessOutcome {
    Correct { attempts_used: u32 },
    TooHigh { attempts_left: u32 },
    TooLow { attempts_left: u32 },
    /// Out of range guesses do not use an attempt
    OutOfRange,
    /// The shared budget ran out on this guess
    Exhausted { target: i64 },
    /// The game already ended
    Inactive,
}

/// A secret number with an attempt budget shared by the whole chat
#[derive(Debug, Clone)]
pub struct GuessNumber {
    target: i64,
    attempts_left: u32,
    active: bool,
}

impl GuessNumber {
    pub fn new(target: i64) -> Self {
        Self {
            target,
            attempts_left: ATTEMPTS,
            active: true,
        }
    }

    pub fn random(rng: &mut StdRng) -> Self {
        Self::new(rng.gen_range(MIN..=MAX))
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn attempts_left(&self) -> u32 {
        self.attempts_left
    }

    pub fn guess(&mut self, n: i64) -> GuessOutcome {
        if !self.active {
            return GuessOutcome::Inactive;
        }
        if !(MIN..=MAX).contains(&n) {
            return GuessOutcome::OutOfRange;
        }
        self.attempts_left -= 1;
        if n == self.target {
            self.active = false;
            return GuessOutcome::Correct {
                attempts_used: ATTEMPTS - self.attempts_left,
            };
        }
        if self.attempts_left == 0 {
            self.active = false;
            return GuessOutcome::Exhausted {
                target: self.target,
            };
        }
        if n > self.target {
            GuessOutcome::TooHigh {
                attempts_left: self.attempts_left,
            }
        } else {
            GuessOutcome::TooLow {
                attempts_left: self.attempts_left,
            }
        }
    }

    /// End the game on timeout. Returns the target if the game was still running.
    pub fn expire(&mut self) -> Option<i64> {
        if !self.active {
            return None;
        }
        self.active = false;
        Some(self.target)
    }
}

pub fn parse_guess(body: &str) -> Option<i64> {
    body.trim().parse().ok()
}

fn describe(outcome: GuessOutcome, player: &str) -> Option<String> {
    let tag = jid::mention_tag(player);
    let text = match outcome {
        GuessOutcome::Correct { attempts_used } => format!(
            "🎉 {} guessed it! Found in {} attempt(s).",
            tag, attempts_used
        ),
        GuessOutcome::TooHigh { attempts_left } => {
            format!("📉 {}: too high! {} attempt(s) left.", tag, attempts_left)
        }
        GuessOutcome::TooLow { attempts_left } => {
            format!("📈 {}: too low! {} attempt(s) left.", tag, attempts_left)
        }
        GuessOutcome::OutOfRange => {
            format!("{}: pick a number between {} and {}.", tag, MIN, MAX)
        }
        GuessOutcome::Exhausted { target } => format!(
            "💥 Out of attempts! The number was *{}*.",
            target
        ),
        GuessOutcome::Inactive => return None,
    };
    Some(text)
}

/// Play until someone guesses right, the budget runs out, the time limit hits or
/// a stop is requested. `sub` must be registered before the game is announced.
pub async fn run(
    ctx: BotContext,
    mut sub: Subscription,
    slot: GameSlot,
    mut game: GuessNumber,
) -> Result<()> {
    let chat_id = slot.chat_id().to_string();
    let bot_id = ctx.bot_id();

    ctx.send_text(
        &chat_id,
        format!(
            "🔢 *GUESS THE NUMBER*\n\nI'm thinking of a number between {} and {}.\n\
             You have {} attempts together and {} minutes. Send your guess!",
            MIN,
            MAX,
            ATTEMPTS,
            TIME_LIMIT.as_secs() / 60
        ),
    )
    .await;

    let deadline = tokio::time::sleep(TIME_LIMIT);
    tokio::pin!(deadline);

    'game: loop {
        tokio::select! {
            _ = &mut deadline => {
                if let Some(target) = game.expire() {
                    let text = format!("⏰ Time's up! The number was *{}*.", target);
                    ctx.send_text(&chat_id, text).await;
                }
                break 'game;
            }
            _ = slot.stopped() => {
                if game.expire().is_some() {
                    ctx.send_text(&chat_id, "🛑 Guess Number was stopped.").await;
                }
                break 'game;
            }
            event = sub.recv() => {
                let Some(event) = event else {
                    break 'game;
                };
                for raw in event.notified_messages() {
                    let Some(env) = inspect(raw, &bot_id) else {
                        continue;
                    };
                    if env.chat_id != chat_id || env.from_me {
                        continue;
                    }
                    let Some(n) = parse_guess(&env.body) else {
                        continue;
                    };
                    let outcome = game.guess(n);
                    info!(
                        "Guess Number {}: {} guessed {} -> {:?}",
                        chat_id, env.sender_id, n, outcome
                    );
                    if let Some(text) = describe(outcome, &env.sender_id) {
                        let reply = OutgoingContent::mentions(text, vec![env.sender_id.clone()]);
                        ctx.send(&chat_id, reply, None).await;
                    }
                    if !game.is_active() {
                        break 'game;
                    }
                }
            }
        }
    }

    drop(sub);
    Ok(())
}
