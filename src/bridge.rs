//! HTTP adapter to the protocol bridge.
//!
//! Outbound calls go to the bridge's REST API through [`BridgeSocket`]; the
//! bridge posts inbound events to the webhook served by [`serve`].

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use base64::Engine;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::config::BridgeConfig;
use crate::events::{
    EventBus, IncomingEvent, MembershipAction, MessagesUpsert, ParticipantsUpdate, UpsertKind,
};
use crate::socket::{
    GroupMetadata, MediaRef, MessageKey, OutgoingContent, ParticipantAction, WaSocket,
};

#[derive(Debug, Deserialize)]
struct Identity {
    id: String,
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    key: MessageKey,
}

#[derive(Debug, Deserialize)]
struct MediaResponse {
    data: String,
}

pub struct BridgeSocket {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    user_id: String,
}

impl BridgeSocket {
    /// Connect to the bridge and learn the logged-in account's JID
    pub async fn connect(config: &BridgeConfig) -> Result<Self> {
        let mut socket = Self {
            client: Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone().filter(|k| !k.is_empty()),
            user_id: String::new(),
        };
        let me: Identity = socket
            .call(socket.request(Method::GET, "/me"))
            .await
            .context("Failed to fetch bridge identity")?
            .json()
            .await
            .context("Failed to parse bridge identity")?;
        info!("Connected to bridge at {} as {}", socket.base_url, me.id);
        socket.user_id = me.id;
        Ok(socket)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let builder = self.client.request(method, url);
        match &self.api_key {
            Some(key) => builder.header("Authorization", format!("Bearer {}", key)),
            None => builder,
        }
    }

    async fn call(&self, builder: RequestBuilder) -> Result<Response> {
        let response = builder.send().await.context("Bridge request failed")?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Bridge error ({}): {}", status, body);
        }
        Ok(response)
    }
}

#[async_trait]
impl WaSocket for BridgeSocket {
    fn user_id(&self) -> String {
        self.user_id.clone()
    }

    async fn send_message(
        &self,
        chat_id: &str,
        content: OutgoingContent,
        quoted: Option<&Value>,
    ) -> Result<MessageKey> {
        let body = json!({
            "jid": chat_id,
            "content": content,
            "quoted": quoted,
        });
        let sent: SendResponse = self
            .call(self.request(Method::POST, "/messages").json(&body))
            .await?
            .json()
            .await
            .context("Failed to parse send response")?;
        debug!("Sent message {} to {}", sent.key.id, chat_id);
        Ok(sent.key)
    }

    async fn group_metadata(&self, chat_id: &str) -> Result<GroupMetadata> {
        self.call(self.request(Method::GET, &format!("/groups/{}", chat_id)))
            .await?
            .json()
            .await
            .with_context(|| format!("Failed to parse metadata for {}", chat_id))
    }

    async fn group_participants_update(
        &self,
        chat_id: &str,
        participants: &[String],
        action: ParticipantAction,
    ) -> Result<()> {
        let body = json!({ "participants": participants, "action": action });
        self.call(
            self.request(Method::POST, &format!("/groups/{}/participants", chat_id))
                .json(&body),
        )
        .await?;
        Ok(())
    }

    async fn download_media(&self, media: &MediaRef) -> Result<Vec<u8>> {
        let payload: MediaResponse = self
            .call(self.request(Method::POST, "/media/download").json(media))
            .await?
            .json()
            .await
            .context("Failed to parse media response")?;
        base64::engine::general_purpose::STANDARD
            .decode(payload.data)
            .context("Media payload is not valid base64")
    }

    async fn read_messages(&self, keys: &[MessageKey]) -> Result<()> {
        self.call(
            self.request(Method::POST, "/messages/read")
                .json(&json!({ "keys": keys })),
        )
        .await?;
        Ok(())
    }
}

/// Inbound webhook body, tagged by `event`
#[derive(Debug, Deserialize)]
#[serde(tag = "event")]
pub enum BridgeEvent {
    #[serde(rename = "messages.upsert")]
    MessagesUpsert {
        #[serde(rename = "type")]
        kind: UpsertKind,
        #[serde(default)]
        messages: Vec<Value>,
    },
    #[serde(rename = "group-participants.update")]
    ParticipantsUpdate {
        id: String,
        #[serde(default)]
        participants: Vec<String>,
        action: MembershipAction,
    },
}

impl From<BridgeEvent> for IncomingEvent {
    fn from(event: BridgeEvent) -> Self {
        match event {
            BridgeEvent::MessagesUpsert { kind, messages } => {
                IncomingEvent::Messages(Arc::new(MessagesUpsert {
                    kind,
                    messages: messages.into_iter().map(Arc::new).collect(),
                }))
            }
            BridgeEvent::ParticipantsUpdate {
                id,
                participants,
                action,
            } => IncomingEvent::Participants(Arc::new(ParticipantsUpdate {
                chat_id: id,
                participants,
                action,
            })),
        }
    }
}

#[derive(Clone)]
struct WebhookState {
    bus: EventBus,
    api_key: Option<String>,
}

fn authorized(headers: &HeaderMap, api_key: Option<&str>) -> bool {
    let Some(key) = api_key else {
        return true;
    };
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .is_some_and(|token| token == key)
}

async fn handle_event(
    State(state): State<WebhookState>,
    headers: HeaderMap,
    Json(event): Json<BridgeEvent>,
) -> StatusCode {
    if !authorized(&headers, state.api_key.as_deref()) {
        warn!("Rejected webhook call with a bad token");
        return StatusCode::UNAUTHORIZED;
    }
    state.bus.publish(event.into());
    StatusCode::ACCEPTED
}

async fn health() -> &'static str {
    "ok"
}

pub fn webhook(bus: EventBus, api_key: Option<String>) -> Router {
    Router::new()
        .route("/events", post(handle_event))
        .route("/health", get(health))
        .with_state(WebhookState { bus, api_key })
}

/// Serve the inbound webhook until the process exits
pub async fn serve(config: &BridgeConfig, bus: EventBus) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(&config.listen)
        .await
        .with_context(|| format!("Failed to bind webhook to {}", config.listen))?;
    info!("Webhook listening on {}", config.listen);

    let api_key = config.api_key.clone().filter(|k| !k.is_empty());
    axum::serve(listener, webhook(bus, api_key))
        .await
        .context("Webhook server error")?;
    Ok(())
}
