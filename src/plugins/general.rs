use std::collections::BTreeMap;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tracing::error;

use super::{Category, Manifest, Plugin};
use crate::message::Message;
use crate::router::{Command, Router};

pub struct Ping;

#[async_trait]
impl Plugin for Ping {
    fn manifest(&self) -> Manifest {
        Manifest::command("ping", Category::General, "Check that the bot is alive")
    }

    async fn execute(&self, msg: &Message, _cmd: &Command) -> Result<()> {
        msg.reply(format!("🏓 Pong! {} ms", msg.age_ms())).await;
        Ok(())
    }
}

/// Command list grouped by category
pub struct Menu {
    text: String,
}

impl Menu {
    pub fn new(prefix: String, bot_name: String, mut manifests: Vec<Manifest>) -> Self {
        manifests.push(Self::own_manifest());
        Self {
            text: render(&prefix, &bot_name, &manifests),
        }
    }

    fn own_manifest() -> Manifest {
        Manifest::command("menu", Category::General, "Show this list").aliases(&["help"])
    }
}

/// Add the menu last, listing only what the router actually registered
pub fn register_menu(router: &mut Router, bot_name: &str) {
    let menu = Menu::new(router.prefix().to_string(), bot_name.to_string(), router.manifests());
    if let Err(e) = router.register(Arc::new(menu)) {
        error!("Skipping menu: {:#}", e);
    }
}

fn render(prefix: &str, bot_name: &str, manifests: &[Manifest]) -> String {
    let mut by_category: BTreeMap<Category, Vec<&Manifest>> = BTreeMap::new();
    for manifest in manifests.iter().filter(|m| m.command) {
        by_category.entry(manifest.category).or_default().push(manifest);
    }

    let mut text = format!("🤖 *{}*\n", bot_name);
    for (category, commands) in by_category {
        text.push_str(&format!("\n*{}*\n", category.to_string().to_uppercase()));
        for m in commands {
            text.push_str(&format!("• {}{}", prefix, m.name));
            if !m.usage.is_empty() {
                text.push_str(&format!(" {}", m.usage));
            }
            text.push_str(&format!(" - {}\n", m.description));
        }
    }
    text
}

#[async_trait]
impl Plugin for Menu {
    fn manifest(&self) -> Manifest {
        Self::own_manifest()
    }

    async fn execute(&self, msg: &Message, _cmd: &Command) -> Result<()> {
        msg.reply(self.text.as_str()).await;
        Ok(())
    }
}
