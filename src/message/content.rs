//! Raw message payloads as delivered by the bridge, and the pure functions that
//! turn them into a body text and a [`ContentKind`].
//!
//! The precedence of both [`extract_body`] and [`content_kind`] lives here and
//! nowhere else.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::socket::MessageKey;

/// One inbound message event
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebMessage {
    pub key: MessageKey,
    #[serde(default)]
    pub message: Option<MessageContent>,
    #[serde(default)]
    pub push_name: Option<String>,
    #[serde(default)]
    pub message_timestamp: Option<Value>,
    #[serde(default)]
    pub participant: Option<String>,
}

impl WebMessage {
    /// Seconds since epoch; the bridge sends either a number or a numeric string.
    pub fn timestamp(&self) -> Option<i64> {
        match self.message_timestamp.as_ref()? {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.parse().ok(),
            Value::Object(o) => o.get("low").and_then(Value::as_i64),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extended_text_message: Option<ExtendedText>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_message: Option<MediaMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_message: Option<MediaMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_message: Option<MediaMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_message: Option<MediaMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sticker_message: Option<MediaMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ptv_message: Option<MediaMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buttons_response_message: Option<ButtonsResponse>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list_response_message: Option<ListResponse>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_button_reply_message: Option<TemplateButtonReply>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interactive_response_message: Option<InteractiveResponse>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view_once_message: Option<Box<FutureProofMessage>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view_once_message_v2: Option<Box<FutureProofMessage>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_message: Option<LocationMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_message: Option<ContactMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_message: Option<ProductMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reaction_message: Option<ReactionMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll_creation_message: Option<PollCreation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll_update_message: Option<Value>,
    /// Variants the bot does not model explicitly
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stanza_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub participant: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quoted_message: Option<Box<MessageContent>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mentioned_jid: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtendedText {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_info: Option<ContextInfo>,
}

/// Image, video, document, audio, sticker and ptv payloads share this shape
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mimetype: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_info: Option<ContextInfo>,
    /// Keys, hashes and URLs the bridge needs for decryption
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ButtonsResponse {
    #[serde(default)]
    pub selected_button_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_info: Option<ContextInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListResponse {
    #[serde(default)]
    pub single_select_reply: Option<SingleSelectReply>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_info: Option<ContextInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SingleSelectReply {
    #[serde(default)]
    pub selected_row_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateButtonReply {
    #[serde(default)]
    pub selected_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_info: Option<ContextInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractiveResponse {
    #[serde(default)]
    pub native_flow_response_message: Option<NativeFlowResponse>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_info: Option<ContextInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NativeFlowResponse {
    /// JSON-encoded object carrying the selected button `id`
    #[serde(default)]
    pub params_json: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct FutureProofMessage {
    #[serde(default)]
    pub message: Option<MessageContent>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationMessage {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactMessage {
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductMessage {
    #[serde(default)]
    pub product: Option<ProductSnapshot>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSnapshot {
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReactionMessage {
    #[serde(default)]
    pub key: Option<MessageKey>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PollCreation {
    #[serde(default)]
    pub name: Option<String>,
}

/// Fields that travel alongside the real content and never name a kind
const BOOKKEEPING_FIELDS: &[&str] = &["messageContextInfo", "senderKeyDistributionMessage"];

/// Coarse tag naming which variant supplied a message
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ContentKind {
    Conversation,
    ExtendedText,
    Image,
    Video,
    Document,
    Audio,
    Sticker,
    Ptv,
    ButtonsResponse,
    ListResponse,
    TemplateButtonReply,
    InteractiveResponse,
    ViewOnce,
    ViewOnceV2,
    Reaction,
    PollCreation,
    PollUpdate,
    Location,
    Contact,
    Product,
    Other(String),
    Unknown,
    /// The payload could not be parsed at all
    Error,
}

impl ContentKind {
    pub fn is_media(&self) -> bool {
        matches!(
            self,
            ContentKind::Image
                | ContentKind::Video
                | ContentKind::Document
                | ContentKind::Audio
                | ContentKind::Sticker
                | ContentKind::Ptv
        )
    }

    pub fn as_str(&self) -> &str {
        match self {
            ContentKind::Conversation => "conversation",
            ContentKind::ExtendedText => "extendedTextMessage",
            ContentKind::Image => "imageMessage",
            ContentKind::Video => "videoMessage",
            ContentKind::Document => "documentMessage",
            ContentKind::Audio => "audioMessage",
            ContentKind::Sticker => "stickerMessage",
            ContentKind::Ptv => "ptvMessage",
            ContentKind::ButtonsResponse => "buttonsResponseMessage",
            ContentKind::ListResponse => "listResponseMessage",
            ContentKind::TemplateButtonReply => "templateButtonReplyMessage",
            ContentKind::InteractiveResponse => "interactiveResponseMessage",
            ContentKind::ViewOnce => "viewOnceMessage",
            ContentKind::ViewOnceV2 => "viewOnceMessageV2",
            ContentKind::Reaction => "reactionMessage",
            ContentKind::PollCreation => "pollCreationMessage",
            ContentKind::PollUpdate => "pollUpdateMessage",
            ContentKind::Location => "locationMessage",
            ContentKind::Contact => "contactMessage",
            ContentKind::Product => "productMessage",
            ContentKind::Other(name) => name,
            ContentKind::Unknown => "unknown",
            ContentKind::Error => "error",
        }
    }

    /// Short media label used in saved file names
    pub fn media_label(&self) -> Option<(&'static str, &'static str)> {
        match self {
            ContentKind::Image => Some(("image", "jpg")),
            ContentKind::Video => Some(("video", "mp4")),
            ContentKind::Document => Some(("document", "bin")),
            ContentKind::Audio => Some(("audio", "ogg")),
            ContentKind::Sticker => Some(("sticker", "webp")),
            ContentKind::Ptv => Some(("ptv", "mp4")),
            _ => None,
        }
    }
}

impl std::fmt::Display for ContentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl MessageContent {
    /// The inner content of a view-once wrapper, either generation
    fn view_once_inner(&self) -> Option<&MessageContent> {
        self.view_once_message
            .as_deref()
            .or(self.view_once_message_v2.as_deref())
            .and_then(|w| w.message.as_ref())
    }

    fn media_messages(&self) -> [Option<&MediaMessage>; 6] {
        [
            self.image_message.as_ref(),
            self.video_message.as_ref(),
            self.document_message.as_ref(),
            self.audio_message.as_ref(),
            self.sticker_message.as_ref(),
            self.ptv_message.as_ref(),
        ]
    }

    /// Reply/mention context from whichever variant carries one
    pub fn context_info(&self) -> Option<&ContextInfo> {
        if let Some(inner) = self.view_once_inner() {
            if let Some(ctx) = inner.context_info() {
                return Some(ctx);
            }
        }
        self.extended_text_message
            .as_ref()
            .and_then(|m| m.context_info.as_ref())
            .or_else(|| {
                self.media_messages()
                    .into_iter()
                    .flatten()
                    .find_map(|m| m.context_info.as_ref())
            })
            .or_else(|| {
                self.buttons_response_message
                    .as_ref()
                    .and_then(|m| m.context_info.as_ref())
            })
            .or_else(|| {
                self.list_response_message
                    .as_ref()
                    .and_then(|m| m.context_info.as_ref())
            })
            .or_else(|| {
                self.template_button_reply_message
                    .as_ref()
                    .and_then(|m| m.context_info.as_ref())
            })
            .or_else(|| {
                self.interactive_response_message
                    .as_ref()
                    .and_then(|m| m.context_info.as_ref())
            })
    }

    /// The content the media bytes belong to (view-once payloads are unwrapped)
    pub fn media_payload(&self) -> &MessageContent {
        self.view_once_inner().unwrap_or(self)
    }

    /// The media variant of the payload, looking through view-once wrappers
    pub fn media_message(&self) -> Option<&MediaMessage> {
        self.media_payload()
            .media_messages()
            .into_iter()
            .flatten()
            .next()
    }
}

fn non_empty(s: Option<&String>) -> Option<String> {
    s.filter(|s| !s.is_empty()).cloned()
}

fn native_flow_id(resp: &InteractiveResponse) -> Option<String> {
    let params = resp.native_flow_response_message.as_ref()?.params_json.as_ref()?;
    let parsed: Value = serde_json::from_str(params).ok()?;
    parsed
        .get("id")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Plain text of a message. First matching rule wins; `""` when none apply.
pub fn extract_body(content: &MessageContent) -> String {
    if let Some(id) = content
        .interactive_response_message
        .as_ref()
        .and_then(native_flow_id)
    {
        return id;
    }
    if let Some(inner) = content.view_once_inner() {
        let body = extract_body(inner);
        if !body.is_empty() {
            return body;
        }
    }
    if let Some(text) = non_empty(content.conversation.as_ref()) {
        return text;
    }
    if let Some(text) = content
        .extended_text_message
        .as_ref()
        .and_then(|m| non_empty(m.text.as_ref()))
    {
        return text;
    }
    let captioned = [
        content.image_message.as_ref(),
        content.video_message.as_ref(),
        content.document_message.as_ref(),
        content.ptv_message.as_ref(),
    ];
    if let Some(caption) = captioned
        .into_iter()
        .flatten()
        .find_map(|m| non_empty(m.caption.as_ref()))
    {
        return caption;
    }
    if let Some(id) = content
        .buttons_response_message
        .as_ref()
        .and_then(|m| non_empty(m.selected_button_id.as_ref()))
    {
        return id;
    }
    if let Some(id) = content
        .list_response_message
        .as_ref()
        .and_then(|m| m.single_select_reply.as_ref())
        .and_then(|r| non_empty(r.selected_row_id.as_ref()))
    {
        return id;
    }
    if let Some(id) = content
        .template_button_reply_message
        .as_ref()
        .and_then(|m| non_empty(m.selected_id.as_ref()))
    {
        return id;
    }
    if let Some(loc) = &content.location_message {
        if let Some(text) = non_empty(loc.name.as_ref())
            .or_else(|| non_empty(loc.address.as_ref()))
            .or_else(|| non_empty(loc.comment.as_ref()))
        {
            return text;
        }
    }
    if let Some(name) = content
        .contact_message
        .as_ref()
        .and_then(|c| non_empty(c.display_name.as_ref()))
    {
        return name;
    }
    if let Some(title) = content
        .product_message
        .as_ref()
        .and_then(|p| p.product.as_ref())
        .and_then(|p| non_empty(p.title.as_ref()))
    {
        return title;
    }
    String::new()
}

/// Content kind of a message, mirroring the precedence of [`extract_body`].
pub fn content_kind(content: &MessageContent) -> ContentKind {
    if content.interactive_response_message.is_some() {
        return ContentKind::InteractiveResponse;
    }
    if let Some(wrapper) = &content.view_once_message {
        return match &wrapper.message {
            Some(inner) => content_kind(inner),
            None => ContentKind::ViewOnce,
        };
    }
    if let Some(wrapper) = &content.view_once_message_v2 {
        return match &wrapper.message {
            Some(inner) => content_kind(inner),
            None => ContentKind::ViewOnceV2,
        };
    }
    if content.reaction_message.is_some() {
        return ContentKind::Reaction;
    }
    if content.poll_creation_message.is_some() {
        return ContentKind::PollCreation;
    }
    if content.poll_update_message.is_some() {
        return ContentKind::PollUpdate;
    }
    if content.conversation.is_some() {
        return ContentKind::Conversation;
    }
    if content.extended_text_message.is_some() {
        return ContentKind::ExtendedText;
    }
    let media = [
        (content.image_message.is_some(), ContentKind::Image),
        (content.video_message.is_some(), ContentKind::Video),
        (content.document_message.is_some(), ContentKind::Document),
        (content.audio_message.is_some(), ContentKind::Audio),
        (content.sticker_message.is_some(), ContentKind::Sticker),
        (content.ptv_message.is_some(), ContentKind::Ptv),
        (
            content.buttons_response_message.is_some(),
            ContentKind::ButtonsResponse,
        ),
        (
            content.list_response_message.is_some(),
            ContentKind::ListResponse,
        ),
        (
            content.template_button_reply_message.is_some(),
            ContentKind::TemplateButtonReply,
        ),
        (content.location_message.is_some(), ContentKind::Location),
        (content.contact_message.is_some(), ContentKind::Contact),
        (content.product_message.is_some(), ContentKind::Product),
    ];
    if let Some((_, kind)) = media.into_iter().find(|(present, _)| *present) {
        return kind;
    }
    content
        .other
        .keys()
        .find(|k| !BOOKKEEPING_FIELDS.contains(&k.as_str()))
        .map(|k| ContentKind::Other(k.clone()))
        .unwrap_or(ContentKind::Unknown)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn content(value: Value) -> MessageContent {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_plain_and_extended_text() {
        let c = content(json!({"conversation": "hello"}));
        assert_eq!(extract_body(&c), "hello");
        assert_eq!(content_kind(&c), ContentKind::Conversation);

        let c = content(json!({"extendedTextMessage": {"text": "with link"}}));
        assert_eq!(extract_body(&c), "with link");
        assert_eq!(content_kind(&c), ContentKind::ExtendedText);
    }

    #[test]
    fn test_caption_and_media_kind() {
        let c = content(json!({"imageMessage": {"caption": ".sticker", "mimetype": "image/jpeg"}}));
        assert_eq!(extract_body(&c), ".sticker");
        assert_eq!(content_kind(&c), ContentKind::Image);
        assert!(content_kind(&c).is_media());

        let c = content(json!({"audioMessage": {"seconds": 3}}));
        assert_eq!(extract_body(&c), "");
        assert_eq!(content_kind(&c), ContentKind::Audio);
    }

    #[test]
    fn test_interactive_reply_wins_over_text() {
        let c = content(json!({
            "conversation": "ignored",
            "interactiveResponseMessage": {
                "nativeFlowResponseMessage": {"paramsJson": "{\"id\":\".menu\"}"}
            }
        }));
        assert_eq!(extract_body(&c), ".menu");
        assert_eq!(content_kind(&c), ContentKind::InteractiveResponse);
    }

    #[test]
    fn test_view_once_unwraps_both_generations() {
        for wrapper in ["viewOnceMessage", "viewOnceMessageV2"] {
            let mut map = Map::new();
            map.insert(
                wrapper.to_string(),
                json!({"message": {"imageMessage": {"caption": "secret"}}}),
            );
            let c = content(Value::Object(map));
            assert_eq!(extract_body(&c), "secret");
            assert_eq!(content_kind(&c), ContentKind::Image);
            assert_eq!(content_kind(c.media_payload()), ContentKind::Image);
        }

        let empty = content(json!({"viewOnceMessageV2": {}}));
        assert_eq!(content_kind(&empty), ContentKind::ViewOnceV2);
        assert_eq!(extract_body(&empty), "");
    }

    #[test]
    fn test_reply_identifiers() {
        let c = content(json!({"buttonsResponseMessage": {"selectedButtonId": "btn-1"}}));
        assert_eq!(extract_body(&c), "btn-1");
        assert_eq!(content_kind(&c), ContentKind::ButtonsResponse);

        let c = content(json!({
            "listResponseMessage": {"singleSelectReply": {"selectedRowId": "row-2"}}
        }));
        assert_eq!(extract_body(&c), "row-2");

        let c = content(json!({"templateButtonReplyMessage": {"selectedId": "tpl"}}));
        assert_eq!(extract_body(&c), "tpl");
        assert_eq!(content_kind(&c), ContentKind::TemplateButtonReply);
    }

    #[test]
    fn test_fallback_captions() {
        let c = content(json!({"locationMessage": {"address": "Main St"}}));
        assert_eq!(extract_body(&c), "Main St");
        assert_eq!(content_kind(&c), ContentKind::Location);

        let c = content(json!({"contactMessage": {"displayName": "Budi"}}));
        assert_eq!(extract_body(&c), "Budi");

        let c = content(json!({"productMessage": {"product": {"title": "Shoes"}}}));
        assert_eq!(extract_body(&c), "Shoes");
        assert_eq!(content_kind(&c), ContentKind::Product);
    }

    #[test]
    fn test_reaction_and_poll_tagged_explicitly() {
        let c = content(json!({
            "messageContextInfo": {},
            "reactionMessage": {"text": "👍", "key": {"id": "abc"}}
        }));
        assert_eq!(content_kind(&c), ContentKind::Reaction);
        assert_eq!(extract_body(&c), "");

        let c = content(json!({"pollCreationMessage": {"name": "Lunch?"}}));
        assert_eq!(content_kind(&c), ContentKind::PollCreation);

        let c = content(json!({"pollUpdateMessage": {"vote": {}}}));
        assert_eq!(content_kind(&c), ContentKind::PollUpdate);
    }

    #[test]
    fn test_unmodelled_field_falls_back_to_name() {
        let c = content(json!({
            "messageContextInfo": {},
            "protocolMessage": {"type": 0}
        }));
        assert_eq!(
            content_kind(&c),
            ContentKind::Other("protocolMessage".to_string())
        );
        assert_eq!(content_kind(&MessageContent::default()), ContentKind::Unknown);
    }

    #[test]
    fn test_media_allow_list() {
        let media = [
            ContentKind::Image,
            ContentKind::Video,
            ContentKind::Document,
            ContentKind::Audio,
            ContentKind::Sticker,
            ContentKind::Ptv,
        ];
        let others = [
            ContentKind::Conversation,
            ContentKind::ExtendedText,
            ContentKind::ButtonsResponse,
            ContentKind::ListResponse,
            ContentKind::TemplateButtonReply,
            ContentKind::InteractiveResponse,
            ContentKind::ViewOnce,
            ContentKind::ViewOnceV2,
            ContentKind::Reaction,
            ContentKind::PollCreation,
            ContentKind::PollUpdate,
            ContentKind::Location,
            ContentKind::Contact,
            ContentKind::Product,
            ContentKind::Other("protocolMessage".to_string()),
            ContentKind::Unknown,
            ContentKind::Error,
        ];
        assert!(media.iter().all(ContentKind::is_media));
        assert!(others.iter().all(|k| !k.is_media()));
    }

    #[test]
    fn test_context_info_from_media_caption() {
        let c = content(json!({
            "imageMessage": {
                "caption": "look",
                "contextInfo": {"mentionedJid": ["1@s.whatsapp.net"]}
            }
        }));
        let ctx = c.context_info().unwrap();
        assert_eq!(ctx.mentioned_jid, vec!["1@s.whatsapp.net".to_string()]);
    }

    #[test]
    fn test_timestamp_variants() {
        let mut msg = WebMessage {
            message_timestamp: Some(json!(1700000000)),
            ..Default::default()
        };
        assert_eq!(msg.timestamp(), Some(1700000000));
        msg.message_timestamp = Some(json!("1700000001"));
        assert_eq!(msg.timestamp(), Some(1700000001));
        msg.message_timestamp = Some(json!({"low": 1700000002, "high": 0}));
        assert_eq!(msg.timestamp(), Some(1700000002));
        msg.message_timestamp = None;
        assert_eq!(msg.timestamp(), None);
    }

    #[test]
    fn test_media_message_through_view_once() {
        let c = content(json!({"viewOnceMessage": {"message": {
            "imageMessage": {"mimetype": "image/jpeg", "caption": "secret"}
        }}}));
        let media = c.media_message().unwrap();
        assert_eq!(media.mimetype.as_deref(), Some("image/jpeg"));
        assert!(content(json!({"conversation": "hi"})).media_message().is_none());
    }
}
