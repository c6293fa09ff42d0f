pub mod ai;
pub mod games;
pub mod general;
pub mod group;
pub mod media;

use std::fmt;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::config::Config;
use crate::events::EventBus;
use crate::games::ActiveGames;
use crate::llm::LlmClient;
use crate::message::Message;
use crate::router::{Command, Router};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Category {
    General,
    Group,
    Game,
    Ai,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::General => write!(f, "general"),
            Category::Group => write!(f, "group"),
            Category::Game => write!(f, "game"),
            Category::Ai => write!(f, "ai"),
        }
    }
}

/// What a plugin declares about itself at registration
#[derive(Debug, Clone)]
pub struct Manifest {
    pub name: &'static str,
    pub aliases: &'static [&'static str],
    pub description: &'static str,
    /// Usage hint shown in the menu, without prefix or name
    pub usage: &'static str,
    pub category: Category,
    /// Invoked through `<prefix><name>`
    pub command: bool,
    /// Sees every non-status message
    pub observer: bool,
    /// Sees `status@broadcast` messages too
    pub status_observer: bool,
}

impl Manifest {
    pub fn command(name: &'static str, category: Category, description: &'static str) -> Self {
        Self {
            name,
            aliases: &[],
            description,
            usage: "",
            category,
            command: true,
            observer: false,
            status_observer: false,
        }
    }

    pub fn aliases(mut self, aliases: &'static [&'static str]) -> Self {
        self.aliases = aliases;
        self
    }

    pub fn usage(mut self, usage: &'static str) -> Self {
        self.usage = usage;
        self
    }

    pub fn observer(mut self) -> Self {
        self.observer = true;
        self
    }

    pub fn status_observer(mut self) -> Self {
        self.observer = true;
        self.status_observer = true;
        self
    }

    /// Names this manifest claims in the command table
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        std::iter::once(self.name).chain(self.aliases.iter().copied())
    }
}

/// A unit of bot behavior. Commands implement `execute`, observers `on_message`.
#[async_trait]
pub trait Plugin: Send + Sync {
    fn manifest(&self) -> Manifest;

    async fn execute(&self, _msg: &Message, _cmd: &Command) -> Result<()> {
        Ok(())
    }

    async fn on_message(&self, _msg: &Message) -> Result<()> {
        Ok(())
    }
}

/// The bundled plugins, in registration order
pub fn builtin(
    config: &Config,
    bus: &EventBus,
    active: &ActiveGames,
    llm: Option<Arc<LlmClient>>,
) -> Vec<Arc<dyn Plugin>> {
    let owners = Arc::new(config.bot.owners.clone());
    let boards = games::TicTacToeSessions::new();
    let mut plugins: Vec<Arc<dyn Plugin>> = vec![
        Arc::new(general::Ping),
        Arc::new(media::Reveal),
        Arc::new(group::Membership::kick(owners.clone())),
        Arc::new(group::Membership::add(owners.clone())),
        Arc::new(group::Membership::promote(owners.clone())),
        Arc::new(group::Membership::demote(owners.clone())),
        Arc::new(group::TagAll::new(owners.clone())),
        Arc::new(group::Delete),
        Arc::new(games::SquidGameCommand::new(bus.clone(), active.clone())),
        Arc::new(games::KonamiCommand::new(bus.clone(), active.clone())),
        Arc::new(games::GuessCommand::new(bus.clone(), active.clone())),
        Arc::new(games::TicTacToeCommand::new(active.clone(), boards.clone(), owners.clone())),
        Arc::new(games::StopGame::new(active.clone(), boards, owners)),
    ];
    if let Some(llm) = llm {
        plugins.push(Arc::new(ai::Ask::new(llm, &config.bot.prefix)));
    }
    plugins
}

/// Register the bundled plugins, then a menu of the ones the router accepted
pub fn register_builtin(
    router: &mut Router,
    config: &Config,
    bus: &EventBus,
    active: &ActiveGames,
    llm: Option<Arc<LlmClient>>,
) {
    router.register_all(builtin(config, bus, active, llm));
    general::register_menu(router, &config.bot.name);
}
