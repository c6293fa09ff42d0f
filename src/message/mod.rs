pub mod content;

use std::path::PathBuf;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::jid;
use crate::metadata::MetadataCache;
use crate::socket::{GroupMetadata, MediaRef, MessageKey, OutgoingContent, Role, WaSocket};

pub use content::{content_kind, extract_body, ContentKind, MessageContent, WebMessage};

/// Where downloaded media is copied when running under a named session
#[derive(Debug, Clone)]
pub struct SessionInfo {
    pub id: String,
    pub media_dir: PathBuf,
}

impl SessionInfo {
    pub fn dir(&self) -> PathBuf {
        self.media_dir.join(&self.id)
    }
}

/// Process-scoped handles every message action needs
#[derive(Clone)]
pub struct BotContext {
    pub socket: Arc<dyn WaSocket>,
    pub metadata: Arc<MetadataCache>,
    pub session: Option<Arc<SessionInfo>>,
    pub bot_name: String,
}

impl BotContext {
    pub fn new(socket: Arc<dyn WaSocket>, metadata: Arc<MetadataCache>, bot_name: &str) -> Self {
        Self {
            socket,
            metadata,
            session: None,
            bot_name: bot_name.to_string(),
        }
    }

    pub fn with_session(mut self, session: SessionInfo) -> Self {
        self.session = Some(Arc::new(session));
        self
    }

    /// The bot's own JID without device suffix
    pub fn bot_id(&self) -> String {
        jid::normalize(&self.socket.user_id())
    }

    /// Send a payload, logging instead of failing
    pub async fn send(
        &self,
        chat_id: &str,
        content: OutgoingContent,
        quoted: Option<&Value>,
    ) -> Option<MessageKey> {
        match self.socket.send_message(chat_id, content, quoted).await {
            Ok(key) => Some(key),
            Err(e) => {
                warn!("Failed to send message to {}: {:#}", chat_id, e);
                None
            }
        }
    }

    pub async fn send_text(&self, chat_id: &str, text: impl Into<String>) -> Option<MessageKey> {
        self.send(chat_id, OutgoingContent::text(text), None).await
    }

    /// Delete rule: groups need the bot to be admin in a known roster,
    /// direct chats only allow deleting the bot's own messages.
    async fn can_delete(&self, chat_id: &str, target_from_me: bool) -> bool {
        if !jid::is_group(chat_id) {
            return target_from_me;
        }
        match self.metadata.get(self.socket.as_ref(), chat_id).await {
            Some(roster) => roster.role_of(&self.bot_id()).is_admin(),
            None => false,
        }
    }

    async fn fetch_media(
        &self,
        key: &MessageKey,
        content: &MessageContent,
        kind: &ContentKind,
        timestamp: i64,
    ) -> Option<Vec<u8>> {
        let media = MediaRef {
            key: key.clone(),
            message: content.media_payload().clone(),
        };
        match self.socket.download_media(&media).await {
            Ok(bytes) => {
                if let (Some(session), Some((label, ext))) = (&self.session, kind.media_label()) {
                    let file_name =
                        format!("{}_{}_{}.{}", timestamp, file_safe(&key.id), label, ext);
                    persist_media(session.clone(), file_name, bytes.clone());
                }
                Some(bytes)
            }
            Err(e) => {
                warn!("Failed to download {} for message {}: {:#}", kind, key.id, e);
                None
            }
        }
    }
}

/// Message ids come from the sending client; keep them inside the media directory
fn file_safe(id: &str) -> String {
    id.replace(['/', '\\'], "_").replace("..", "_")
}

/// Fire-and-forget copy of downloaded media into the session directory
fn persist_media(session: Arc<SessionInfo>, file_name: String, bytes: Vec<u8>) {
    tokio::spawn(async move {
        let dir = session.dir();
        if let Err(e) = tokio::fs::create_dir_all(&dir).await {
            warn!("Failed to create media directory {}: {}", dir.display(), e);
            return;
        }
        let path = dir.join(file_name);
        match tokio::fs::write(&path, &bytes).await {
            Ok(()) => debug!("Saved media to {}", path.display()),
            Err(e) => warn!("Failed to save media to {}: {}", path.display(), e),
        }
    });
}

/// A message this one replies to
pub struct QuotedMessage {
    pub id: String,
    pub chat_id: String,
    pub sender_id: String,
    pub body: String,
    pub kind: ContentKind,
    pub is_media: bool,
    pub from_me: bool,
    content: MessageContent,
    /// Quoted media is fetched with the replying message's key
    parent_key: MessageKey,
    parent_timestamp: i64,
    ctx: BotContext,
}

impl QuotedMessage {
    pub async fn download(&self) -> Option<Vec<u8>> {
        if !self.is_media {
            return None;
        }
        self.ctx
            .fetch_media(&self.parent_key, &self.content, &self.kind, self.parent_timestamp)
            .await
    }

    /// Key addressing the quoted message itself
    pub fn key(&self) -> MessageKey {
        MessageKey {
            remote_jid: self.chat_id.clone(),
            from_me: self.from_me,
            id: self.id.clone(),
            participant: jid::is_group(&self.chat_id).then(|| self.sender_id.clone()),
        }
    }

    pub fn content(&self) -> &MessageContent {
        &self.content
    }
}

/// The normalized view of one inbound event
pub struct Message {
    pub id: String,
    pub chat_id: String,
    pub sender_id: String,
    pub display_name: String,
    pub is_group: bool,
    pub group_info: Option<Arc<GroupMetadata>>,
    pub body: String,
    pub kind: ContentKind,
    pub is_media: bool,
    pub quoted: Option<QuotedMessage>,
    pub mentioned_ids: Vec<String>,
    pub timestamp: i64,
    pub from_me: bool,
    pub raw: Arc<Value>,
    key: MessageKey,
    content: Option<MessageContent>,
    /// `None` for degraded records: every action becomes a no-op
    ctx: Option<BotContext>,
}

/// Body and kind of an optional payload
fn describe(content: Option<&MessageContent>) -> (String, ContentKind) {
    match content {
        Some(c) => (extract_body(c), content_kind(c)),
        None => (String::new(), ContentKind::Unknown),
    }
}

fn resolve_sender(web: &WebMessage, bot_id: &str) -> String {
    let chat_id = &web.key.remote_jid;
    if web.key.from_me {
        bot_id.to_string()
    } else if jid::is_group(chat_id) || jid::is_status(chat_id) {
        web.key
            .participant
            .as_deref()
            .or(web.participant.as_deref())
            .map(jid::normalize)
            .unwrap_or_else(|| chat_id.clone())
    } else {
        jid::normalize(chat_id)
    }
}

fn now_secs() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Build the canonical record for one raw event. Never fails: unparseable
/// payloads produce a degraded record with kind [`ContentKind::Error`].
pub async fn normalize(raw: Arc<Value>, ctx: &BotContext) -> Message {
    let web = match WebMessage::deserialize(raw.as_ref()) {
        Ok(web) if !web.key.remote_jid.is_empty() => web,
        Ok(_) => {
            warn!("Dropping message without a chat id");
            return Message::degraded(raw);
        }
        Err(e) => {
            warn!("Failed to parse incoming message: {}", e);
            return Message::degraded(raw);
        }
    };

    let bot_id = ctx.bot_id();
    let chat_id = web.key.remote_jid.clone();
    let is_group = jid::is_group(&chat_id);
    let sender_id = resolve_sender(&web, &bot_id);
    let group_info = if is_group {
        ctx.metadata.get(ctx.socket.as_ref(), &chat_id).await
    } else {
        None
    };

    let (body, kind) = describe(web.message.as_ref());
    let is_media = kind.is_media();
    let timestamp = web.timestamp().unwrap_or_else(now_secs);

    let display_name = if web.key.from_me {
        ctx.bot_name.clone()
    } else {
        web.push_name
            .clone()
            .filter(|n| !n.trim().is_empty())
            .or_else(|| {
                group_info
                    .as_ref()
                    .and_then(|g| g.participant(&sender_id))
                    .and_then(|p| p.name.clone())
            })
            .unwrap_or_else(|| jid::user_part(&sender_id).to_string())
    };

    let context = web.message.as_ref().and_then(|m| m.context_info());
    let mentioned_ids = context
        .map(|c| {
            c.mentioned_jid
                .iter()
                .filter(|j| !jid::is_status(j))
                .cloned()
                .collect()
        })
        .unwrap_or_default();

    let quoted = context.and_then(|info| {
        let id = info.stanza_id.clone()?;
        let payload = info.quoted_message.as_deref()?;
        let sender_id = info
            .participant
            .as_deref()
            .map(jid::normalize)
            .unwrap_or_else(|| chat_id.clone());
        let (body, kind) = describe(Some(payload));
        Some(QuotedMessage {
            id,
            chat_id: chat_id.clone(),
            from_me: jid::same_user(&sender_id, &bot_id),
            sender_id,
            body,
            is_media: kind.is_media(),
            kind,
            content: payload.clone(),
            parent_key: web.key.clone(),
            parent_timestamp: timestamp,
            ctx: ctx.clone(),
        })
    });

    Message {
        id: web.key.id.clone(),
        chat_id,
        sender_id,
        display_name,
        is_group,
        group_info,
        body,
        kind,
        is_media,
        quoted,
        mentioned_ids,
        timestamp,
        from_me: web.key.from_me,
        raw,
        key: web.key,
        content: web.message,
        ctx: Some(ctx.clone()),
    }
}

impl Message {
    fn degraded(raw: Arc<Value>) -> Self {
        let field = |pointer: &str| {
            raw.pointer(pointer)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        let id = field("/key/id");
        let chat_id = field("/key/remoteJid");
        Self {
            key: MessageKey {
                remote_jid: chat_id.clone(),
                id: id.clone(),
                ..Default::default()
            },
            id,
            is_group: jid::is_group(&chat_id),
            sender_id: chat_id.clone(),
            display_name: jid::user_part(&chat_id).to_string(),
            chat_id,
            group_info: None,
            body: String::new(),
            kind: ContentKind::Error,
            is_media: false,
            quoted: None,
            mentioned_ids: Vec::new(),
            timestamp: now_secs(),
            from_me: false,
            raw,
            content: None,
            ctx: None,
        }
    }

    pub fn key(&self) -> &MessageKey {
        &self.key
    }

    pub fn content(&self) -> Option<&MessageContent> {
        self.content.as_ref()
    }

    pub fn is_degraded(&self) -> bool {
        self.ctx.is_none()
    }

    pub fn context(&self) -> Option<&BotContext> {
        self.ctx.as_ref()
    }

    pub async fn send(&self, content: OutgoingContent) -> Option<MessageKey> {
        let ctx = self.ctx.as_ref()?;
        ctx.send(&self.chat_id, content, None).await
    }

    /// Reply in the same chat, quoting this message
    pub async fn reply(&self, text: impl Into<String>) -> Option<MessageKey> {
        let ctx = self.ctx.as_ref()?;
        ctx.send(&self.chat_id, OutgoingContent::text(text), Some(&self.raw))
            .await
    }

    pub async fn reply_mentions(
        &self,
        text: impl Into<String>,
        mentions: Vec<String>,
    ) -> Option<MessageKey> {
        let ctx = self.ctx.as_ref()?;
        ctx.send(
            &self.chat_id,
            OutgoingContent::mentions(text, mentions),
            Some(&self.raw),
        )
        .await
    }

    pub async fn react(&self, emoji: &str) -> Option<MessageKey> {
        let ctx = self.ctx.as_ref()?;
        let reaction = OutgoingContent::Reaction {
            key: self.key.clone(),
            emoji: emoji.to_string(),
        };
        ctx.send(&self.chat_id, reaction, None).await
    }

    pub async fn forward(&self, to: &str) -> Option<MessageKey> {
        let ctx = self.ctx.as_ref()?;
        let forward = OutgoingContent::Forward {
            message: self.raw.as_ref().clone(),
        };
        ctx.send(to, forward, None).await
    }

    /// Delete this message for everyone, if the delete rule allows it.
    pub async fn delete(&self) -> bool {
        let Some(ctx) = self.ctx.as_ref() else {
            return false;
        };
        if !ctx.can_delete(&self.chat_id, self.from_me).await {
            debug!("Declined to delete message {} in {}", self.id, self.chat_id);
            return false;
        }
        let delete = OutgoingContent::Delete {
            key: self.key.clone(),
        };
        ctx.send(&self.chat_id, delete, None).await.is_some()
    }

    /// Delete the message this one replies to, under the same rule as [`Message::delete`]
    pub async fn delete_quoted(&self) -> bool {
        let (Some(ctx), Some(quoted)) = (self.ctx.as_ref(), self.quoted.as_ref()) else {
            return false;
        };
        if !ctx.can_delete(&self.chat_id, quoted.from_me).await {
            return false;
        }
        let delete = OutgoingContent::Delete { key: quoted.key() };
        ctx.send(&self.chat_id, delete, None).await.is_some()
    }

    pub async fn download(&self) -> Option<Vec<u8>> {
        if !self.is_media {
            return None;
        }
        let ctx = self.ctx.as_ref()?;
        let content = self.content.as_ref()?;
        ctx.fetch_media(&self.key, content, &self.kind, self.timestamp)
            .await
    }

    pub fn mentions(&self, target: &str) -> bool {
        self.mentioned_ids.iter().any(|m| jid::same_user(m, target))
    }

    /// Whether the sender is in the owner allow-list (numbers or JIDs)
    pub fn is_owner(&self, owners: &[String]) -> bool {
        owners
            .iter()
            .any(|o| jid::user_part(o) == jid::user_part(&self.sender_id))
    }

    /// Milliseconds since the message was sent
    pub fn age_ms(&self) -> i64 {
        (chrono::Utc::now().timestamp_millis() - self.timestamp * 1000).max(0)
    }

    pub fn sender_role(&self) -> Role {
        self.group_info
            .as_ref()
            .map(|g| g.role_of(&self.sender_id))
            .unwrap_or_default()
    }

    pub fn is_sender_admin(&self) -> bool {
        self.sender_role().is_admin()
    }

    pub fn is_bot_admin(&self) -> bool {
        match (&self.group_info, &self.ctx) {
            (Some(roster), Some(ctx)) => roster.role_of(&ctx.bot_id()).is_admin(),
            _ => false,
        }
    }
}

/// The few fields a transient game listener needs, read without any I/O
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub id: String,
    pub chat_id: String,
    pub sender_id: String,
    pub body: String,
    pub from_me: bool,
}

pub fn inspect(raw: &Value, bot_id: &str) -> Option<Envelope> {
    let web = WebMessage::deserialize(raw).ok()?;
    if web.key.remote_jid.is_empty() {
        return None;
    }
    let (body, _) = describe(web.message.as_ref());
    Some(Envelope {
        sender_id: resolve_sender(&web, bot_id),
        id: web.key.id,
        chat_id: web.key.remote_jid,
        body,
        from_me: web.key.from_me,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{self, MockSocket};
    use serde_json::json;

    const GROUP: &str = "120363000@g.us";
    const BOT: &str = "999@s.whatsapp.net";

    fn setup() -> (Arc<MockSocket>, BotContext) {
        let socket = Arc::new(
            MockSocket::new("999:4@s.whatsapp.net")
                .with_group(GROUP, &[("999", Some("admin")), ("1", None), ("2", Some("admin"))])
                .with_media(vec![1, 2, 3]),
        );
        let ctx = testing::context(socket.clone());
        (socket, ctx)
    }

    #[tokio::test]
    async fn test_normalize_group_text() {
        let (_, ctx) = setup();
        let raw = testing::raw_message(
            GROUP,
            Some("1@s.whatsapp.net"),
            "m1",
            json!({"conversation": ".ping"}),
        );
        let msg = normalize(Arc::new(raw), &ctx).await;

        assert_eq!(msg.id, "m1");
        assert_eq!(msg.chat_id, GROUP);
        assert_eq!(msg.sender_id, "1@s.whatsapp.net");
        assert!(msg.is_group);
        assert!(msg.group_info.is_some());
        assert_eq!(msg.body, ".ping");
        assert_eq!(msg.kind, ContentKind::Conversation);
        assert!(!msg.is_media);
        assert_eq!(msg.display_name, "Tester");
        assert_eq!(msg.timestamp, 1_700_000_000);
        assert!(msg.quoted.is_none());
        assert!(!msg.is_sender_admin());
        assert!(msg.is_bot_admin());
    }

    #[tokio::test]
    async fn test_normalize_is_idempotent() {
        let (_, ctx) = setup();
        let raw = Arc::new(testing::raw_message(
            GROUP,
            Some("2@s.whatsapp.net"),
            "m2",
            json!({"viewOnceMessageV2": {"message": {"videoMessage": {"caption": "clip"}}}}),
        ));
        let first = normalize(raw.clone(), &ctx).await;
        let second = normalize(raw, &ctx).await;

        assert_eq!(first.body, second.body);
        assert_eq!(first.kind, second.kind);
        assert_eq!(first.is_media, second.is_media);
        assert_eq!(first.kind, ContentKind::Video);
        assert!(first.is_media);
    }

    #[tokio::test]
    async fn test_direct_chat_sender_and_no_roster() {
        let (socket, ctx) = setup();
        let raw = testing::raw_message(
            "628123@s.whatsapp.net",
            None,
            "d1",
            json!({"conversation": "hi"}),
        );
        let msg = normalize(Arc::new(raw), &ctx).await;

        assert!(!msg.is_group);
        assert!(msg.group_info.is_none());
        assert_eq!(msg.sender_id, "628123@s.whatsapp.net");
        assert_eq!(socket.metadata_fetches(), 0);
    }

    #[tokio::test]
    async fn test_from_me_resolves_to_bot() {
        let (_, ctx) = setup();
        let mut raw = testing::raw_message(
            "628123@s.whatsapp.net",
            None,
            "d2",
            json!({"conversation": "hi"}),
        );
        raw["key"]["fromMe"] = json!(true);
        raw["pushName"] = Value::Null;
        let msg = normalize(Arc::new(raw), &ctx).await;

        assert!(msg.from_me);
        assert_eq!(msg.sender_id, BOT);
        assert_eq!(msg.display_name, "TestBot");
    }

    #[tokio::test]
    async fn test_quoted_message_and_mentions() {
        let (socket, ctx) = setup();
        let raw = testing::raw_message(
            GROUP,
            Some("1@s.whatsapp.net"),
            "m3",
            json!({
                "extendedTextMessage": {
                    "text": "look @2",
                    "contextInfo": {
                        "stanzaId": "orig-1",
                        "participant": "2@s.whatsapp.net",
                        "quotedMessage": {"imageMessage": {"caption": "pic"}},
                        "mentionedJid": ["2@s.whatsapp.net", "status@broadcast"]
                    }
                }
            }),
        );
        let msg = normalize(Arc::new(raw), &ctx).await;

        assert_eq!(msg.mentioned_ids, vec!["2@s.whatsapp.net".to_string()]);
        assert!(msg.mentions("2:7@s.whatsapp.net"));

        let quoted = msg.quoted.as_ref().unwrap();
        assert_eq!(quoted.id, "orig-1");
        assert_eq!(quoted.sender_id, "2@s.whatsapp.net");
        assert_eq!(quoted.body, "pic");
        assert_eq!(quoted.kind, ContentKind::Image);
        assert!(quoted.is_media);

        assert_eq!(quoted.download().await, Some(vec![1, 2, 3]));
        let downloads = socket.downloads();
        assert_eq!(downloads.len(), 1);
        assert_eq!(downloads[0].id, "m3");
    }

    #[tokio::test]
    async fn test_reply_without_context_has_no_quote() {
        let (_, ctx) = setup();
        let raw = testing::raw_message(
            GROUP,
            Some("1@s.whatsapp.net"),
            "m4",
            json!({"extendedTextMessage": {"text": "x", "contextInfo": {"mentionedJid": []}}}),
        );
        let msg = normalize(Arc::new(raw), &ctx).await;
        assert!(msg.quoted.is_none());
    }

    #[tokio::test]
    async fn test_degraded_record_on_bad_payload() {
        let (socket, ctx) = setup();
        let raw = json!({"key": {"remoteJid": GROUP, "id": "bad", "fromMe": "nope"}});
        let msg = normalize(Arc::new(raw), &ctx).await;

        assert!(msg.is_degraded());
        assert_eq!(msg.kind, ContentKind::Error);
        assert_eq!(msg.id, "bad");
        assert_eq!(msg.chat_id, GROUP);
        assert_eq!(msg.body, "");
        assert!(msg.reply("hello").await.is_none());
        assert!(!msg.delete().await);
        assert!(socket.sent().is_empty());
    }

    #[tokio::test]
    async fn test_download_non_media_is_none() {
        let (socket, ctx) = setup();
        let raw = testing::raw_message(
            GROUP,
            Some("1@s.whatsapp.net"),
            "m5",
            json!({"conversation": "x"}),
        );
        let msg = normalize(Arc::new(raw), &ctx).await;
        assert!(msg.download().await.is_none());
        assert!(socket.downloads().is_empty());
    }

    #[tokio::test]
    async fn test_download_failure_resolves_to_none() {
        let socket = Arc::new(MockSocket::new(BOT));
        let ctx = testing::context(socket.clone());
        let raw = testing::raw_message("1@s.whatsapp.net", None, "m6", json!({"imageMessage": {}}));
        let msg = normalize(Arc::new(raw), &ctx).await;

        assert!(msg.is_media);
        assert!(msg.download().await.is_none());
        assert!(msg.download().await.is_none());
        assert_eq!(socket.downloads().len(), 2);
    }

    #[tokio::test]
    async fn test_delete_rules() {
        // group, bot is admin
        let (socket, ctx) = setup();
        let raw = testing::raw_message(
            GROUP,
            Some("1@s.whatsapp.net"),
            "g1",
            json!({"conversation": "spam"}),
        );
        let msg = normalize(Arc::new(raw), &ctx).await;
        assert!(msg.delete().await);
        assert_eq!(socket.sent().len(), 1);

        // direct chat, not sent by the bot
        let raw = testing::raw_message(
            "1@s.whatsapp.net",
            None,
            "d1",
            json!({"conversation": "x"}),
        );
        let msg = normalize(Arc::new(raw), &ctx).await;
        assert!(!msg.delete().await);

        // direct chat, sent by the bot
        let mut raw = testing::raw_message(
            "1@s.whatsapp.net",
            None,
            "d2",
            json!({"conversation": "x"}),
        );
        raw["key"]["fromMe"] = json!(true);
        let msg = normalize(Arc::new(raw), &ctx).await;
        assert!(msg.delete().await);

        // group where the bot is not admin
        let plain = Arc::new(MockSocket::new(BOT).with_group(GROUP, &[("999", None), ("1", None)]));
        let ctx = testing::context(plain.clone());
        let raw = testing::raw_message(
            GROUP,
            Some("1@s.whatsapp.net"),
            "g2",
            json!({"conversation": "x"}),
        );
        let msg = normalize(Arc::new(raw), &ctx).await;
        assert!(!msg.delete().await);
        assert!(plain.sent().is_empty());
    }

    #[tokio::test]
    async fn test_failed_send_is_swallowed() {
        let socket = Arc::new(MockSocket::new(BOT).failing_sends());
        let ctx = testing::context(socket.clone());
        let raw = testing::raw_message(
            "1@s.whatsapp.net",
            None,
            "f1",
            json!({"conversation": "x"}),
        );
        let msg = normalize(Arc::new(raw), &ctx).await;

        assert!(msg.reply("hello").await.is_none());
        assert!(msg.react("👍").await.is_none());
    }

    #[tokio::test]
    async fn test_owner_and_age() {
        let (_, ctx) = setup();
        let raw = testing::raw_message(
            GROUP,
            Some("1:3@s.whatsapp.net"),
            "o1",
            json!({"conversation": "x"}),
        );
        let msg = normalize(Arc::new(raw), &ctx).await;

        assert!(msg.is_owner(&["1".to_string()]));
        assert!(msg.is_owner(&["1@s.whatsapp.net".to_string()]));
        assert!(!msg.is_owner(&["2".to_string()]));
        assert!(msg.age_ms() > 0);
    }

    #[test]
    fn test_inspect_envelope() {
        let raw = testing::raw_message(
            GROUP,
            Some("1:2@s.whatsapp.net"),
            "e1",
            json!({"conversation": "7"}),
        );
        let env = inspect(&raw, BOT).unwrap();
        assert_eq!(env.chat_id, GROUP);
        assert_eq!(env.sender_id, "1@s.whatsapp.net");
        assert_eq!(env.body, "7");
        assert!(!env.from_me);

        assert!(inspect(&json!({"key": 5}), BOT).is_none());
    }

    fn temp_media_dir() -> PathBuf {
        std::env::temp_dir().join(format!("wabot-media-{}", uuid::Uuid::new_v4()))
    }

    async fn wait_for(path: &std::path::Path) -> bool {
        for _ in 0..100 {
            if path.exists() {
                return true;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        false
    }

    #[tokio::test]
    async fn test_download_is_saved_under_session_dir() {
        let socket = Arc::new(MockSocket::new(BOT).with_media(vec![7, 8, 9]));
        let media_dir = temp_media_dir();
        let ctx = testing::context(socket.clone()).with_session(SessionInfo {
            id: "s1".to_string(),
            media_dir: media_dir.clone(),
        });
        let raw = testing::raw_message(
            "1@s.whatsapp.net",
            None,
            "../m7",
            json!({"imageMessage": {}}),
        );
        let msg = normalize(Arc::new(raw), &ctx).await;

        assert_eq!(msg.download().await, Some(vec![7, 8, 9]));

        let saved = media_dir.join("s1").join("1700000000___m7_image.jpg");
        assert!(wait_for(&saved).await);
        assert_eq!(tokio::fs::read(&saved).await.unwrap(), vec![7, 8, 9]);
        tokio::fs::remove_dir_all(&media_dir).await.unwrap();
    }

    #[tokio::test]
    async fn test_unwritable_media_dir_does_not_fail_download() {
        let socket = Arc::new(MockSocket::new(BOT).with_media(vec![1]));
        // a plain file where the media directory should be
        let blocker = temp_media_dir();
        tokio::fs::write(&blocker, b"x").await.unwrap();
        let ctx = testing::context(socket.clone()).with_session(SessionInfo {
            id: "s1".to_string(),
            media_dir: blocker.clone(),
        });
        let raw = testing::raw_message("1@s.whatsapp.net", None, "m8", json!({"audioMessage": {}}));
        let msg = normalize(Arc::new(raw), &ctx).await;

        assert_eq!(msg.download().await, Some(vec![1]));
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(blocker.is_file());
        tokio::fs::remove_file(&blocker).await.unwrap();
    }

    #[test]
    fn test_file_safe_ids() {
        assert_eq!(file_safe("3EB0C767D26A"), "3EB0C767D26A");
        assert_eq!(file_safe("../a/b\\c"), "__a_b_c");
    }

    #[tokio::test]
    async fn test_forward_sends_raw_payload() {
        let (socket, ctx) = setup();
        let raw = testing::raw_message(
            GROUP,
            Some("1@s.whatsapp.net"),
            "fw1",
            json!({"conversation": "news"}),
        );
        let msg = normalize(Arc::new(raw.clone()), &ctx).await;

        assert!(msg.forward("555@s.whatsapp.net").await.is_some());

        let sent = socket.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "555@s.whatsapp.net");
        assert_eq!(sent[0].1, OutgoingContent::Forward { message: raw });
    }
}
