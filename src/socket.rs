use anyhow::Result;
use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::message::content::MessageContent;

/// Identifies one message inside a chat
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageKey {
    #[serde(default)]
    pub remote_jid: String,
    #[serde(default)]
    pub from_me: bool,
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub participant: Option<String>,
}

/// Canonical participant role. The bridge reports `null`, `"admin"` or `"superadmin"`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "Option<String>")]
pub enum Role {
    #[default]
    Member,
    Admin,
    SuperAdmin,
}

impl From<Option<String>> for Role {
    fn from(value: Option<String>) -> Self {
        match value.as_deref() {
            Some("superadmin") => Role::SuperAdmin,
            Some("admin") => Role::Admin,
            _ => Role::Member,
        }
    }
}

impl Role {
    pub fn is_admin(self) -> bool {
        matches!(self, Role::Admin | Role::SuperAdmin)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Participant {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "admin")]
    pub role: Role,
}

/// Group roster snapshot
#[derive(Debug, Clone, Deserialize)]
pub struct GroupMetadata {
    pub id: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub participants: Vec<Participant>,
}

impl GroupMetadata {
    pub fn participant(&self, jid: &str) -> Option<&Participant> {
        self.participants
            .iter()
            .find(|p| crate::jid::same_user(&p.id, jid))
    }

    pub fn role_of(&self, jid: &str) -> Role {
        self.participant(jid).map(|p| p.role).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParticipantAction {
    Add,
    Remove,
    Promote,
    Demote,
}

/// Payload posted to a chat
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutgoingContent {
    Text {
        text: String,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        mentions: Vec<String>,
    },
    Reaction {
        key: MessageKey,
        emoji: String,
    },
    Delete {
        key: MessageKey,
    },
    Forward {
        message: Value,
    },
    /// Media re-sent from downloaded bytes; `data` is base64
    Media {
        media_type: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        mimetype: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        caption: Option<String>,
        data: String,
    },
}

impl OutgoingContent {
    pub fn text(text: impl Into<String>) -> Self {
        OutgoingContent::Text {
            text: text.into(),
            mentions: Vec::new(),
        }
    }

    pub fn mentions(text: impl Into<String>, mentions: Vec<String>) -> Self {
        OutgoingContent::Text {
            text: text.into(),
            mentions,
        }
    }

    pub fn media(
        media_type: &str,
        mimetype: Option<String>,
        caption: Option<String>,
        bytes: &[u8],
    ) -> Self {
        OutgoingContent::Media {
            media_type: media_type.to_string(),
            mimetype,
            caption: caption.filter(|c| !c.is_empty()),
            data: base64::engine::general_purpose::STANDARD.encode(bytes),
        }
    }
}

/// Everything the bridge needs to locate and decrypt a media payload
#[derive(Debug, Clone, Serialize)]
pub struct MediaRef {
    pub key: MessageKey,
    pub message: MessageContent,
}

/// The protocol collaborator. Every method is a suspension point and may fail;
/// callers in the message layer degrade failures to `None`.
#[async_trait]
pub trait WaSocket: Send + Sync {
    /// The bot's own JID (may carry a device suffix)
    fn user_id(&self) -> String;

    async fn send_message(
        &self,
        chat_id: &str,
        content: OutgoingContent,
        quoted: Option<&Value>,
    ) -> Result<MessageKey>;

    async fn group_metadata(&self, chat_id: &str) -> Result<GroupMetadata>;

    async fn group_participants_update(
        &self,
        chat_id: &str,
        participants: &[String],
        action: ParticipantAction,
    ) -> Result<()>;

    async fn download_media(&self, media: &MediaRef) -> Result<Vec<u8>>;

    async fn read_messages(&self, keys: &[MessageKey]) -> Result<()>;
}
