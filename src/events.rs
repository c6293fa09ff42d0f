//! Ordered fan-out of inbound bridge events.
//!
//! The router holds a permanent [`Subscription`]; game phases hold transient
//! ones. Dropping a `Subscription` deregisters it, so a phase that returns
//! early (or panics) never leaves a listener behind.

use std::sync::{Arc, Mutex};

use serde::Deserialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpsertKind {
    /// New messages that should be acted on
    Notify,
    /// History sync and the bot's own echoes
    Append,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MembershipAction {
    Add,
    Remove,
    Promote,
    Demote,
}

#[derive(Debug, Clone)]
pub struct MessagesUpsert {
    pub kind: UpsertKind,
    pub messages: Vec<Arc<Value>>,
}

#[derive(Debug, Clone)]
pub struct ParticipantsUpdate {
    pub chat_id: String,
    pub participants: Vec<String>,
    pub action: MembershipAction,
}

#[derive(Debug, Clone)]
pub enum IncomingEvent {
    Messages(Arc<MessagesUpsert>),
    Participants(Arc<ParticipantsUpdate>),
}

impl IncomingEvent {
    pub fn notify(messages: Vec<Value>) -> Self {
        IncomingEvent::Messages(Arc::new(MessagesUpsert {
            kind: UpsertKind::Notify,
            messages: messages.into_iter().map(Arc::new).collect(),
        }))
    }

    /// Raw messages of a `notify` upsert; empty for anything else
    pub fn notified_messages(&self) -> &[Arc<Value>] {
        match self {
            IncomingEvent::Messages(upsert) if upsert.kind == UpsertKind::Notify => {
                &upsert.messages
            }
            _ => &[],
        }
    }
}

struct Listener {
    id: Uuid,
    label: String,
    tx: mpsc::UnboundedSender<IncomingEvent>,
}

/// Event source shared by the webhook, the router and the game engines
#[derive(Clone, Default)]
pub struct EventBus {
    listeners: Arc<Mutex<Vec<Listener>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener. Listeners receive events in registration order.
    pub fn subscribe(&self, label: &str) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();
        self.lock().push(Listener {
            id,
            label: label.to_string(),
            tx,
        });
        debug!("Listener '{}' subscribed ({})", label, id);
        Subscription {
            id,
            rx,
            bus: self.clone(),
        }
    }

    pub fn publish(&self, event: IncomingEvent) {
        let mut listeners = self.lock();
        listeners.retain(|l| {
            let alive = l.tx.send(event.clone()).is_ok();
            if !alive {
                debug!("Pruning closed listener '{}'", l.label);
            }
            alive
        });
    }

    pub fn listener_count(&self) -> usize {
        self.lock().len()
    }

    fn unsubscribe(&self, id: Uuid) {
        self.lock().retain(|l| l.id != id);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Listener>> {
        // A poisoned list is still structurally valid
        self.listeners
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Handle to a registered listener; deregisters on drop
pub struct Subscription {
    id: Uuid,
    rx: mpsc::UnboundedReceiver<IncomingEvent>,
    bus: EventBus,
}

impl Subscription {
    pub async fn recv(&mut self) -> Option<IncomingEvent> {
        self.rx.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.bus.unsubscribe(self.id);
    }
}
