//! Group administration commands.
//!
//! Precondition failures are answered with a ❌ reaction and a short hint
//! before any membership change is attempted.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;

use super::{Category, Manifest, Plugin};
use crate::jid;
use crate::message::Message;
use crate::router::Command;
use crate::socket::{OutgoingContent, ParticipantAction};

async fn reject(msg: &Message, text: &str) {
    msg.react("❌").await;
    msg.reply(text).await;
}

/// Shared gate for admin commands: group chat, sender is admin or owner.
/// With `need_bot_admin` the bot itself must be admin too.
async fn admin_gate(msg: &Message, owners: &[String], need_bot_admin: bool) -> bool {
    if !msg.is_group {
        reject(msg, "This command only works in groups.").await;
        return false;
    }
    if !msg.is_sender_admin() && !msg.is_owner(owners) {
        reject(msg, "Only group admins can use this command.").await;
        return false;
    }
    if need_bot_admin && !msg.is_bot_admin() {
        reject(msg, "I need to be an admin to do that.").await;
        return false;
    }
    true
}

#[derive(Debug, PartialEq, Eq)]
pub enum Targets {
    Found(Vec<String>),
    /// An argument that is neither a mention nor a phone number
    Invalid(String),
    None,
}

/// Who a membership command applies to: mentions first, then the quoted
/// message's author, then phone-number arguments.
pub fn resolve_targets(msg: &Message, cmd: &Command) -> Targets {
    if !msg.mentioned_ids.is_empty() {
        return Targets::Found(msg.mentioned_ids.iter().map(|m| jid::normalize(m)).collect());
    }
    if let Some(quoted) = &msg.quoted {
        if !quoted.from_me {
            return Targets::Found(vec![quoted.sender_id.clone()]);
        }
    }
    let mut found = Vec::new();
    for arg in &cmd.args {
        match jid::from_phone(arg) {
            Some(id) => found.push(id),
            None => return Targets::Invalid(arg.clone()),
        }
    }
    if found.is_empty() {
        Targets::None
    } else {
        Targets::Found(found)
    }
}

/// `kick`, `add`, `promote` and `demote`: one plugin type, four actions
pub struct Membership {
    action: ParticipantAction,
    owners: Arc<Vec<String>>,
}

impl Membership {
    pub fn kick(owners: Arc<Vec<String>>) -> Self {
        Self { action: ParticipantAction::Remove, owners }
    }

    pub fn add(owners: Arc<Vec<String>>) -> Self {
        Self { action: ParticipantAction::Add, owners }
    }

    pub fn promote(owners: Arc<Vec<String>>) -> Self {
        Self { action: ParticipantAction::Promote, owners }
    }

    pub fn demote(owners: Arc<Vec<String>>) -> Self {
        Self { action: ParticipantAction::Demote, owners }
    }

    fn done_text(&self) -> &'static str {
        match self.action {
            ParticipantAction::Remove => "👋 Removed",
            ParticipantAction::Add => "✅ Added",
            ParticipantAction::Promote => "⬆️ Promoted",
            ParticipantAction::Demote => "⬇️ Demoted",
        }
    }
}

#[async_trait]
impl Plugin for Membership {
    fn manifest(&self) -> Manifest {
        match self.action {
            ParticipantAction::Remove => {
                Manifest::command("kick", Category::Group, "Remove members from the group")
                    .usage("@user | number")
            }
            ParticipantAction::Add => {
                Manifest::command("add", Category::Group, "Add members by phone number")
                    .usage("number")
            }
            ParticipantAction::Promote => {
                Manifest::command("promote", Category::Group, "Make members admins")
                    .usage("@user | number")
            }
            ParticipantAction::Demote => {
                Manifest::command("demote", Category::Group, "Revoke admin rights")
                    .usage("@user | number")
            }
        }
    }

    async fn execute(&self, msg: &Message, cmd: &Command) -> Result<()> {
        if !admin_gate(msg, &self.owners, true).await {
            return Ok(());
        }

        let targets = match resolve_targets(msg, cmd) {
            Targets::Found(targets) => targets,
            Targets::Invalid(arg) => {
                reject(msg, &format!("'{}' is not a valid phone number.", arg)).await;
                return Ok(());
            }
            Targets::None => {
                reject(
                    msg,
                    "Mention someone, reply to their message or give a phone number.",
                )
                .await;
                return Ok(());
            }
        };

        let Some(ctx) = msg.context() else {
            return Ok(());
        };
        let bot_id = ctx.bot_id();
        let targets: Vec<String> = targets
            .into_iter()
            .filter(|t| !jid::same_user(t, &bot_id))
            .collect();
        if targets.is_empty() {
            reject(msg, "I can't do that to myself.").await;
            return Ok(());
        }

        ctx.socket
            .group_participants_update(&msg.chat_id, &targets, self.action)
            .await
            .with_context(|| format!("{:?} failed in {}", self.action, msg.chat_id))?;
        ctx.metadata.invalidate(ctx.socket.as_ref(), &msg.chat_id).await;

        let tags: Vec<String> = targets.iter().map(|t| jid::mention_tag(t)).collect();
        msg.reply_mentions(format!("{} {}", self.done_text(), tags.join(" ")), targets)
            .await;
        Ok(())
    }
}

pub struct TagAll {
    owners: Arc<Vec<String>>,
}

impl TagAll {
    pub fn new(owners: Arc<Vec<String>>) -> Self {
        Self { owners }
    }
}

#[async_trait]
impl Plugin for TagAll {
    fn manifest(&self) -> Manifest {
        Manifest::command("tagall", Category::Group, "Mention every member")
            .aliases(&["everyone"])
            .usage("[text]")
    }

    async fn execute(&self, msg: &Message, cmd: &Command) -> Result<()> {
        if !admin_gate(msg, &self.owners, false).await {
            return Ok(());
        }
        let Some(roster) = msg.group_info.as_ref() else {
            reject(msg, "Couldn't load the member list, try again later.").await;
            return Ok(());
        };

        let ids: Vec<String> = roster.participants.iter().map(|p| jid::normalize(&p.id)).collect();
        let header = if cmd.args.is_empty() {
            "📢 Attention everyone!".to_string()
        } else {
            format!("📢 {}", cmd.text())
        };
        let lines: Vec<String> = ids.iter().map(|id| jid::mention_tag(id)).collect();
        msg.send(OutgoingContent::mentions(
            format!("{}\n\n{}", header, lines.join("\n")),
            ids,
        ))
        .await;
        Ok(())
    }
}

/// Delete the quoted message
pub struct Delete;

#[async_trait]
impl Plugin for Delete {
    fn manifest(&self) -> Manifest {
        Manifest::command("del", Category::Group, "Delete the message you reply to")
            .aliases(&["delete"])
    }

    async fn execute(&self, msg: &Message, _cmd: &Command) -> Result<()> {
        if msg.quoted.is_none() {
            reject(msg, "Reply to the message you want deleted.").await;
            return Ok(());
        }
        let own_message = msg
            .quoted
            .as_ref()
            .is_some_and(|q| q.sender_id == msg.sender_id);
        if msg.is_group && !msg.is_sender_admin() && !own_message {
            reject(msg, "Only group admins can delete other people's messages.").await;
            return Ok(());
        }
        if !msg.delete_quoted().await {
            reject(msg, "I can't delete that message.").await;
            return Ok(());
        }
        // the command goes too
        msg.delete().await;
        Ok(())
    }
}
