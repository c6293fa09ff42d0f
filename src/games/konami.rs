use std::collections::HashMap;
use std::time::Duration;

use anyhow::Result;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::info;

use super::{listen_window, GameSlot, WindowEnd};
use crate::events::EventBus;
use crate::message::BotContext;

pub const VOTING_WINDOW: Duration = Duration::from_secs(30);

pub const TEAMS: &[&str] = &[
    "Barcelona",
    "Real Madrid",
    "Manchester United",
    "Liverpool",
    "Bayern Munich",
    "Juventus",
    "AC Milan",
    "Inter Milan",
    "Paris Saint-Germain",
    "Chelsea",
    "Arsenal",
    "Borussia Dortmund",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchResult {
    pub winner: &'static str,
    pub loser: &'static str,
    pub votes: [usize; 2],
    pub margin: usize,
    pub voters: usize,
    /// The winner was picked at random from an exact tie
    pub tie_break: bool,
}

/// Votes for one match between two teams
#[derive(Debug, Clone)]
pub struct Ballot {
    options: [&'static str; 2],
    votes: HashMap<String, usize>,
}

impl Ballot {
    pub fn new(home: &'static str, away: &'static str) -> Self {
        Self {
            options: [home, away],
            votes: HashMap::new(),
        }
    }

    /// Two distinct random teams from [`TEAMS`]
    pub fn draw(rng: &mut StdRng) -> Self {
        let picked: Vec<&'static str> = TEAMS.choose_multiple(rng, 2).copied().collect();
        Self::new(picked[0], picked[1])
    }

    pub fn options(&self) -> [&'static str; 2] {
        self.options
    }

    /// Record `voter`'s choice. Only `1` or `2` counts, and only the first vote per voter.
    pub fn cast(&mut self, voter: &str, token: &str) -> bool {
        let choice = match token.trim() {
            "1" => 0,
            "2" => 1,
            _ => return false,
        };
        if self.votes.contains_key(voter) {
            return false;
        }
        self.votes.insert(voter.to_string(), choice);
        true
    }

    pub fn tally(&self) -> [usize; 2] {
        let mut counts = [0, 0];
        for choice in self.votes.values() {
            counts[*choice] += 1;
        }
        counts
    }

    pub fn decide(&self, rng: &mut StdRng) -> MatchResult {
        let votes = self.tally();
        let (winner, tie_break) = match votes[0].cmp(&votes[1]) {
            std::cmp::Ordering::Greater => (0, false),
            std::cmp::Ordering::Less => (1, false),
            std::cmp::Ordering::Equal => (rng.gen_range(0..2), true),
        };
        MatchResult {
            winner: self.options[winner],
            loser: self.options[1 - winner],
            votes,
            margin: votes[0].abs_diff(votes[1]),
            voters: self.votes.len(),
            tie_break,
        }
    }
}

pub async fn run(
    ctx: BotContext,
    bus: EventBus,
    slot: GameSlot,
    mut ballot: Ballot,
    mut rng: StdRng,
) -> Result<()> {
    let chat_id = slot.chat_id().to_string();
    let [home, away] = ballot.options();

    let sub = bus.subscribe("konami-match");
    ctx.send_text(
        &chat_id,
        format!(
            "⚽ *KONAMI MATCH* ⚽\n\n1️⃣ {}\n       vs\n2️⃣ {}\n\n\
             Vote by sending *1* or *2*. Voting closes in {} seconds!",
            home,
            away,
            VOTING_WINDOW.as_secs()
        ),
    )
    .await;

    let end = listen_window(sub, &chat_id, &ctx.bot_id(), VOTING_WINDOW, &slot, |env| {
        ballot.cast(&env.sender_id, &env.body);
    })
    .await;
    if end == WindowEnd::Stopped {
        ctx.send_text(&chat_id, "🛑 Konami Match was cancelled.").await;
        return Ok(());
    }

    let result = ballot.decide(&mut rng);
    info!(
        "Konami Match {}: {} beat {} ({:?}, {} voters)",
        chat_id, result.winner, result.loser, result.votes, result.voters
    );

    let mut text = format!(
        "🏁 *FULL TIME*\n\n{}: {} vote(s)\n{}: {} vote(s)\n\n🏆 {} wins",
        home, result.votes[0], away, result.votes[1], result.winner
    );
    if result.tie_break {
        text.push_str(" on a coin toss after a tie!");
    } else {
        text.push_str(&format!(" by {} vote(s)!", result.margin));
    }
    text.push_str(&format!("\nTotal voters: {}", result.voters));
    ctx.send_text(&chat_id, text).await;

    Ok(())
}
