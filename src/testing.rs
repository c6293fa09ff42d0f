//! Shared test doubles

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::{json, Value};

use crate::message::BotContext;
use crate::metadata::MetadataCache;
use crate::socket::{
    GroupMetadata, MediaRef, MessageKey, OutgoingContent, Participant, ParticipantAction, Role,
    WaSocket,
};

/// In-memory socket that records every outbound call
pub struct MockSocket {
    user: String,
    groups: HashMap<String, GroupMetadata>,
    media: Option<Vec<u8>>,
    fail_sends: bool,
    fetches: AtomicUsize,
    sent: Mutex<Vec<(String, OutgoingContent)>>,
    updates: Mutex<Vec<(String, Vec<String>, ParticipantAction)>>,
    downloads: Mutex<Vec<MessageKey>>,
    reads: Mutex<Vec<MessageKey>>,
}

impl MockSocket {
    pub fn new(user: &str) -> Self {
        Self {
            user: user.to_string(),
            groups: HashMap::new(),
            media: None,
            fail_sends: false,
            fetches: AtomicUsize::new(0),
            sent: Mutex::new(Vec::new()),
            updates: Mutex::new(Vec::new()),
            downloads: Mutex::new(Vec::new()),
            reads: Mutex::new(Vec::new()),
        }
    }

    /// Add a group; members are (phone number, role) pairs
    pub fn with_group(mut self, chat_id: &str, members: &[(&str, Option<&str>)]) -> Self {
        let participants = members
            .iter()
            .map(|(number, role)| Participant {
                id: format!("{}@s.whatsapp.net", number),
                name: None,
                role: Role::from(role.map(str::to_string)),
            })
            .collect();
        self.groups.insert(
            chat_id.to_string(),
            GroupMetadata {
                id: chat_id.to_string(),
                subject: "Test Group".to_string(),
                participants,
            },
        );
        self
    }

    pub fn with_media(mut self, bytes: Vec<u8>) -> Self {
        self.media = Some(bytes);
        self
    }

    pub fn failing_sends(mut self) -> Self {
        self.fail_sends = true;
        self
    }

    pub fn metadata_fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn sent(&self) -> Vec<(String, OutgoingContent)> {
        self.sent.lock().unwrap().clone()
    }

    /// Text of every text message sent, in order
    pub fn sent_texts(&self) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|(_, content)| match content {
                OutgoingContent::Text { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn updates(&self) -> Vec<(String, Vec<String>, ParticipantAction)> {
        self.updates.lock().unwrap().clone()
    }

    pub fn downloads(&self) -> Vec<MessageKey> {
        self.downloads.lock().unwrap().clone()
    }

    pub fn reads(&self) -> Vec<MessageKey> {
        self.reads.lock().unwrap().clone()
    }
}

#[async_trait]
impl WaSocket for MockSocket {
    fn user_id(&self) -> String {
        self.user.clone()
    }

    async fn send_message(
        &self,
        chat_id: &str,
        content: OutgoingContent,
        _quoted: Option<&Value>,
    ) -> Result<MessageKey> {
        if self.fail_sends {
            return Err(anyhow!("send failed"));
        }
        let mut sent = self.sent.lock().unwrap();
        sent.push((chat_id.to_string(), content));
        Ok(MessageKey {
            remote_jid: chat_id.to_string(),
            from_me: true,
            id: format!("out-{}", sent.len()),
            participant: None,
        })
    }

    async fn group_metadata(&self, chat_id: &str) -> Result<GroupMetadata> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.groups
            .get(chat_id)
            .cloned()
            .ok_or_else(|| anyhow!("unknown group {}", chat_id))
    }

    async fn group_participants_update(
        &self,
        chat_id: &str,
        participants: &[String],
        action: ParticipantAction,
    ) -> Result<()> {
        self.updates
            .lock()
            .unwrap()
            .push((chat_id.to_string(), participants.to_vec(), action));
        Ok(())
    }

    async fn download_media(&self, media: &MediaRef) -> Result<Vec<u8>> {
        self.downloads.lock().unwrap().push(media.key.clone());
        self.media.clone().ok_or_else(|| anyhow!("no media"))
    }

    async fn read_messages(&self, keys: &[MessageKey]) -> Result<()> {
        self.reads.lock().unwrap().extend_from_slice(keys);
        Ok(())
    }
}

pub fn context(socket: Arc<MockSocket>) -> BotContext {
    BotContext::new(socket, Arc::new(MetadataCache::default()), "TestBot")
}

/// Raw upsert entry as the bridge would post it
pub fn raw_message(chat_id: &str, participant: Option<&str>, id: &str, message: Value) -> Value {
    let mut key = json!({
        "remoteJid": chat_id,
        "fromMe": false,
        "id": id,
    });
    if let Some(p) = participant {
        key["participant"] = json!(p);
    }
    json!({
        "key": key,
        "message": message,
        "pushName": "Tester",
        "messageTimestamp": 1_700_000_000,
    })
}

pub fn text_from(chat_id: &str, sender: &str, id: &str, text: &str) -> Value {
    let participant = crate::jid::is_group(chat_id).then_some(sender);
    raw_message(chat_id, participant, id, json!({ "conversation": text }))
}
