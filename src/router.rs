//! Prefix command dispatch and observer fan-out.

use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use anyhow::{bail, Result};
use futures::FutureExt;
use tracing::{debug, error, info, warn};

use crate::message::Message;
use crate::plugins::{Manifest, Plugin};

pub const GENERIC_FAILURE: &str = "⚠️ Something went wrong while running that command.";

/// A parsed `<prefix><name> <args...>` invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// Lowercased command name as typed (may be an alias)
    pub name: String,
    pub args: Vec<String>,
}

impl Command {
    /// The arguments joined back with single spaces
    pub fn text(&self) -> String {
        self.args.join(" ")
    }
}

pub fn parse_command(prefix: &str, body: &str) -> Option<Command> {
    let rest = body.strip_prefix(prefix)?;
    let mut tokens = rest.split_whitespace();
    let name = tokens.next()?.to_lowercase();
    Some(Command {
        name,
        args: tokens.map(str::to_string).collect(),
    })
}

/// Best-effort text of a caught panic payload
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panic: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panic: {}", s)
    } else {
        "panic".to_string()
    }
}

pub struct Router {
    prefix: String,
    plugins: Vec<Arc<dyn Plugin>>,
    commands: HashMap<&'static str, Arc<dyn Plugin>>,
    observers: Vec<Arc<dyn Plugin>>,
}

impl Router {
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            plugins: Vec::new(),
            commands: HashMap::new(),
            observers: Vec::new(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Validate a plugin's manifest and add it. A plugin whose name or any
    /// alias is already taken is rejected whole.
    pub fn register(&mut self, plugin: Arc<dyn Plugin>) -> Result<()> {
        let manifest = plugin.manifest();
        validate(&manifest)?;

        if manifest.command {
            for name in manifest.names() {
                if self.commands.contains_key(name) {
                    bail!(
                        "Plugin '{}' conflicts with an existing command '{}'",
                        manifest.name,
                        name
                    );
                }
            }
            for name in manifest.names() {
                self.commands.insert(name, plugin.clone());
            }
        }
        if manifest.observer {
            self.observers.push(plugin.clone());
        }
        info!("Registered plugin: {} ({})", manifest.name, manifest.category);
        self.plugins.push(plugin);
        Ok(())
    }

    /// Register every plugin, logging and skipping the ones that fail validation
    pub fn register_all(&mut self, plugins: Vec<Arc<dyn Plugin>>) {
        for plugin in plugins {
            if let Err(e) = self.register(plugin) {
                error!("Skipping plugin: {:#}", e);
            }
        }
    }

    pub fn resolve(&self, name: &str) -> Option<&Arc<dyn Plugin>> {
        self.commands.get(name)
    }

    pub fn manifests(&self) -> Vec<Manifest> {
        self.plugins.iter().map(|p| p.manifest()).collect()
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    /// Command path first, then every observer in registration order
    pub async fn dispatch(&self, msg: &Message) {
        if let Some(cmd) = parse_command(&self.prefix, &msg.body) {
            match self.resolve(&cmd.name) {
                Some(plugin) => self.run_command(plugin.as_ref(), msg, &cmd).await,
                None => debug!("Unknown command '{}' in {}", cmd.name, msg.chat_id),
            }
        }
        for observer in &self.observers {
            run_observer(observer.as_ref(), msg).await;
        }
    }

    /// Status broadcasts only reach observers that opted in
    pub async fn observe_status(&self, msg: &Message) {
        for observer in self
            .observers
            .iter()
            .filter(|p| p.manifest().status_observer)
        {
            run_observer(observer.as_ref(), msg).await;
        }
    }

    async fn run_command(&self, plugin: &dyn Plugin, msg: &Message, cmd: &Command) {
        info!(
            "Command '{}' from {} in {}",
            cmd.name, msg.sender_id, msg.chat_id
        );
        let failure = match AssertUnwindSafe(plugin.execute(msg, cmd))
            .catch_unwind()
            .await
        {
            Ok(Ok(())) => return,
            Ok(Err(e)) => format!("{:#}", e),
            Err(panic) => panic_message(panic.as_ref()),
        };
        error!(
            "Command '{}' failed in {}: {}",
            cmd.name, msg.chat_id, failure
        );
        msg.reply(GENERIC_FAILURE).await;
    }
}

async fn run_observer(plugin: &dyn Plugin, msg: &Message) {
    match AssertUnwindSafe(plugin.on_message(msg)).catch_unwind().await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(
            "Observer '{}' failed on {}: {:#}",
            plugin.manifest().name,
            msg.id,
            e
        ),
        Err(panic) => error!(
            "Observer '{}' panicked on {}: {}",
            plugin.manifest().name,
            msg.id,
            panic_message(panic.as_ref())
        ),
    }
}

fn validate(manifest: &Manifest) -> Result<()> {
    for name in manifest.names() {
        if name.is_empty() || name.chars().any(char::is_whitespace) || name != name.to_lowercase() {
            bail!("Invalid command name '{}' in plugin '{}'", name, manifest.name);
        }
    }
    if !manifest.command && !manifest.observer {
        bail!("Plugin '{}' is neither a command nor an observer", manifest.name);
    }
    Ok(())
}
