use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::events::{IncomingEvent, MembershipAction, ParticipantsUpdate, Subscription};
use crate::jid;
use crate::message::{normalize, BotContext, Message};
use crate::router::Router;
use crate::socket::OutgoingContent;

/// Consumes the router's bus subscription, one event at a time
pub struct Bot {
    ctx: BotContext,
    router: Router,
    config: Arc<Config>,
}

impl Bot {
    pub fn new(ctx: BotContext, router: Router, config: Arc<Config>) -> Self {
        Self {
            ctx,
            router,
            config,
        }
    }

    pub async fn run(&self, mut sub: Subscription) {
        info!(
            "{} is listening with prefix '{}' ({} plugins)",
            self.ctx.bot_name,
            self.router.prefix(),
            self.router.len()
        );
        while let Some(event) = sub.recv().await {
            self.handle(event).await;
        }
        info!("Event bus closed, stopping");
    }

    pub async fn handle(&self, event: IncomingEvent) {
        match &event {
            IncomingEvent::Messages(_) => {
                for raw in event.notified_messages() {
                    self.handle_message(raw.clone()).await;
                }
            }
            IncomingEvent::Participants(update) => self.handle_participants(update).await,
        }
    }

    async fn handle_message(&self, raw: Arc<Value>) {
        let msg = normalize(raw, &self.ctx).await;
        if msg.is_degraded() {
            return;
        }
        if jid::is_status(&msg.chat_id) {
            self.handle_status(msg).await;
            return;
        }
        if msg.from_me {
            return;
        }
        debug!(
            "Message {} from {} in {} ({})",
            msg.id, msg.display_name, msg.chat_id, msg.kind
        );
        self.router.dispatch(&msg).await;
    }

    async fn handle_status(&self, msg: Message) {
        if msg.from_me {
            return;
        }
        let status = &self.config.status;
        if status.auto_view {
            match self.ctx.socket.read_messages(&[msg.key().clone()]).await {
                Ok(()) => debug!("Viewed status {} from {}", msg.id, msg.sender_id),
                Err(e) => warn!("Failed to view status {}: {:#}", msg.id, e),
            }
        }
        if status.auto_react {
            msg.react(&status.react_emoji).await;
        }
        if msg.is_media && self.ctx.session.is_some() {
            // saved under the session's media directory as a side effect
            msg.download().await;
        }
        if let Some(target) = &status.forward_to {
            msg.forward(target).await;
        }
        self.router.observe_status(&msg).await;
    }

    async fn handle_participants(&self, update: &ParticipantsUpdate) {
        let socket = self.ctx.socket.as_ref();
        self.ctx.metadata.invalidate(socket, &update.chat_id).await;
        info!(
            "Membership {:?} in {}: {} participant(s)",
            update.action,
            update.chat_id,
            update.participants.len()
        );

        let group = &self.config.group;
        if update.action != MembershipAction::Add || !group.welcome {
            return;
        }
        let bot_id = self.ctx.bot_id();
        let newcomers: Vec<String> = update
            .participants
            .iter()
            .filter(|p| !jid::same_user(p, &bot_id))
            .map(|p| jid::normalize(p))
            .collect();
        if newcomers.is_empty() {
            return;
        }

        let subject = self
            .ctx
            .metadata
            .get(socket, &update.chat_id)
            .await
            .map(|g| g.subject.clone())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "the group".to_string());
        let tags: Vec<String> = newcomers.iter().map(|p| jid::mention_tag(p)).collect();
        let text = group.render_welcome(&tags.join(" "), &subject);
        self.ctx
            .send(&update.chat_id, OutgoingContent::mentions(text, newcomers), None)
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{MessagesUpsert, UpsertKind};
    use crate::message::SessionInfo;
    use crate::plugins::{Category, Manifest, Plugin};
    use crate::router::Command;
    use crate::testing::{self, MockSocket};
    use anyhow::Result;
    use async_trait::async_trait;
    use std::sync::Mutex;

    const GROUP: &str = "120363000@g.us";

    #[derive(Default)]
    struct Tracker {
        seen: Mutex<Vec<String>>,
        status: bool,
    }

    #[async_trait]
    impl Plugin for Tracker {
        fn manifest(&self) -> Manifest {
            let manifest = Manifest::command("tracker", Category::General, "");
            if self.status {
                manifest.status_observer()
            } else {
                manifest.observer()
            }
        }

        async fn execute(&self, msg: &Message, _cmd: &Command) -> Result<()> {
            self.seen.lock().unwrap().push(format!("cmd:{}", msg.id));
            Ok(())
        }

        async fn on_message(&self, msg: &Message) -> Result<()> {
            self.seen.lock().unwrap().push(format!("obs:{}", msg.id));
            Ok(())
        }
    }

    fn bot(socket: Arc<MockSocket>, config: &str, tracker: Arc<Tracker>) -> Bot {
        let config = format!("[bridge]\nbase_url = \"http://bridge\"\n{}", config);
        let config = Config::parse(&config).unwrap();
        let mut router = Router::new(&config.bot.prefix);
        router.register(tracker).unwrap();
        Bot::new(testing::context(socket), router, Arc::new(config))
    }

    fn status_from(sender: &str, id: &str) -> Value {
        testing::raw_message(
            jid::STATUS_BROADCAST,
            Some(sender),
            id,
            serde_json::json!({"imageMessage": {"caption": "sunset"}}),
        )
    }

    #[tokio::test]
    async fn test_command_and_observer_path() {
        let socket = Arc::new(MockSocket::new("999@s.whatsapp.net"));
        let tracker = Arc::new(Tracker::default());
        let bot = bot(socket, "", tracker.clone());

        bot.handle(IncomingEvent::notify(vec![
            testing::text_from("1@s.whatsapp.net", "1@s.whatsapp.net", "m1", ".tracker"),
            testing::text_from("1@s.whatsapp.net", "1@s.whatsapp.net", "m2", "hello"),
        ]))
        .await;

        assert_eq!(
            *tracker.seen.lock().unwrap(),
            vec!["cmd:m1".to_string(), "obs:m1".to_string(), "obs:m2".to_string()]
        );
    }

    #[tokio::test]
    async fn test_append_and_own_messages_are_ignored() {
        let socket = Arc::new(MockSocket::new("999@s.whatsapp.net"));
        let tracker = Arc::new(Tracker::default());
        let bot = bot(socket, "", tracker.clone());

        bot.handle(IncomingEvent::Messages(Arc::new(MessagesUpsert {
            kind: UpsertKind::Append,
            messages: vec![Arc::new(testing::text_from(
                "1@s.whatsapp.net",
                "1@s.whatsapp.net",
                "h1",
                ".tracker",
            ))],
        })))
        .await;
        let mut own = testing::text_from("1@s.whatsapp.net", "1@s.whatsapp.net", "o1", ".tracker");
        own["key"]["fromMe"] = serde_json::json!(true);
        bot.handle(IncomingEvent::notify(vec![own])).await;

        assert!(tracker.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_status_is_viewed_reacted_and_observed() {
        let socket = Arc::new(MockSocket::new("999@s.whatsapp.net"));
        let plain = Arc::new(Tracker::default());
        let config = "[status]\nauto_react = true\nreact_emoji = \"🔥\"\n";
        let bot = bot(socket.clone(), config, plain.clone());

        bot.handle(IncomingEvent::notify(vec![status_from("1@s.whatsapp.net", "s1")]))
            .await;

        let reads = socket.reads();
        assert_eq!(reads.len(), 1);
        assert_eq!(reads[0].id, "s1");
        match &socket.sent()[0].1 {
            OutgoingContent::Reaction { emoji, .. } => assert_eq!(emoji, "🔥"),
            other => panic!("unexpected {:?}", other),
        }
        // a plain observer never sees status events
        assert!(plain.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_status_reaches_status_observer_without_commands() {
        let socket = Arc::new(MockSocket::new("999@s.whatsapp.net"));
        let tracker = Arc::new(Tracker {
            status: true,
            ..Default::default()
        });
        let bot = bot(socket.clone(), "[status]\nauto_view = false\n", tracker.clone());

        let mut raw = status_from("1@s.whatsapp.net", "s2");
        raw["message"] = serde_json::json!({"conversation": ".tracker"});
        bot.handle(IncomingEvent::notify(vec![raw])).await;

        assert!(socket.reads().is_empty());
        assert!(socket.sent().is_empty());
        assert_eq!(*tracker.seen.lock().unwrap(), vec!["obs:s2".to_string()]);
    }

    #[tokio::test]
    async fn test_status_is_forwarded_to_configured_chat() {
        let socket = Arc::new(MockSocket::new("999@s.whatsapp.net"));
        let config = "[status]\nauto_view = false\nforward_to = \"555@s.whatsapp.net\"\n";
        let bot = bot(socket.clone(), config, Arc::new(Tracker::default()));

        let raw = status_from("1@s.whatsapp.net", "s3");
        bot.handle(IncomingEvent::notify(vec![raw.clone()])).await;

        let sent = socket.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "555@s.whatsapp.net");
        assert_eq!(sent[0].1, OutgoingContent::Forward { message: raw });
        // no session configured, so nothing is fetched
        assert!(socket.downloads().is_empty());
    }

    #[tokio::test]
    async fn test_status_media_is_saved_with_session() {
        let socket = Arc::new(MockSocket::new("999@s.whatsapp.net").with_media(vec![4, 2]));
        let media_dir = std::env::temp_dir().join(format!("wabot-status-{}", uuid::Uuid::new_v4()));
        let config = Config::parse("[bridge]\nbase_url = \"http://bridge\"\n").unwrap();
        let ctx = testing::context(socket.clone()).with_session(SessionInfo {
            id: "s1".to_string(),
            media_dir: media_dir.clone(),
        });
        let bot = Bot::new(ctx, Router::new("."), Arc::new(config));

        bot.handle(IncomingEvent::notify(vec![status_from("1@s.whatsapp.net", "st1")]))
            .await;

        assert_eq!(socket.downloads()[0].id, "st1");
        let saved = media_dir.join("s1").join("1700000000_st1_image.jpg");
        for _ in 0..100 {
            if saved.exists() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(std::fs::read(&saved).unwrap(), vec![4, 2]);
        std::fs::remove_dir_all(&media_dir).ok();
    }

    #[tokio::test]
    async fn test_membership_change_invalidates_and_welcomes() {
        let socket = Arc::new(
            MockSocket::new("999@s.whatsapp.net")
                .with_group(GROUP, &[("999", Some("admin")), ("1", None)]),
        );
        let bot = bot(
            socket.clone(),
            "[group]\nwelcome = true\nwelcome_text = \"Hi {user} in {group}\"\n",
            Arc::new(Tracker::default()),
        );
        bot.ctx.metadata.get(bot.ctx.socket.as_ref(), GROUP).await;
        assert_eq!(socket.metadata_fetches(), 1);

        bot.handle(IncomingEvent::Participants(Arc::new(ParticipantsUpdate {
            chat_id: GROUP.to_string(),
            participants: vec!["5:2@s.whatsapp.net".to_string()],
            action: MembershipAction::Add,
        })))
        .await;

        assert_eq!(socket.metadata_fetches(), 2);
        match &socket.sent()[0].1 {
            OutgoingContent::Text { text, mentions } => {
                assert_eq!(text, "Hi @5 in Test Group");
                assert_eq!(mentions, &vec!["5@s.whatsapp.net".to_string()]);
            }
            other => panic!("unexpected {:?}", other),
        }

        bot.handle(IncomingEvent::Participants(Arc::new(ParticipantsUpdate {
            chat_id: GROUP.to_string(),
            participants: vec!["1@s.whatsapp.net".to_string()],
            action: MembershipAction::Remove,
        })))
        .await;
        assert_eq!(socket.sent().len(), 1);
    }
}
