use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

use super::{Category, Manifest, Plugin};
use crate::jid;
use crate::llm::LlmClient;
use crate::message::Message;
use crate::router::Command;

/// WhatsApp rejects very long texts; replies are cut here
const MAX_REPLY_CHARS: usize = 4000;

/// `ai` command; also answers group messages that @-mention the bot
pub struct Ask {
    llm: Arc<LlmClient>,
    prefix: String,
}

impl Ask {
    pub fn new(llm: Arc<LlmClient>, prefix: &str) -> Self {
        Self {
            llm,
            prefix: prefix.to_string(),
        }
    }

    async fn answer(&self, msg: &Message, prompt: &str) -> Result<()> {
        info!(
            "AI prompt from {} ({} chars) via {}",
            msg.sender_id,
            prompt.len(),
            self.llm.model()
        );
        msg.react("🤔").await;
        let answer = self.llm.ask(prompt).await?;
        msg.reply(truncate(&answer)).await;
        Ok(())
    }
}

/// The text of a group message addressed to the bot by mention, without the tag.
/// Commands are left to the command path.
fn mention_question(msg: &Message, prefix: &str) -> Option<String> {
    let bot_id = msg.context()?.bot_id();
    if !msg.is_group || msg.from_me || msg.body.starts_with(prefix) || !msg.mentions(&bot_id) {
        return None;
    }
    let body = msg.body.replace(&jid::mention_tag(&bot_id), " ");
    Some(body.split_whitespace().collect::<Vec<_>>().join(" "))
}

/// The question plus the quoted text it refers to, if any
pub fn build_prompt(question: &str, quoted: Option<&str>) -> Option<String> {
    let question = question.trim();
    let quoted = quoted.map(str::trim).filter(|q| !q.is_empty());
    match (question.is_empty(), quoted) {
        (true, None) => None,
        (true, Some(q)) => Some(q.to_string()),
        (false, None) => Some(question.to_string()),
        (false, Some(q)) => Some(format!("{}\n\nContext:\n\"{}\"", question, q)),
    }
}

fn truncate(text: &str) -> String {
    if text.chars().count() <= MAX_REPLY_CHARS {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(MAX_REPLY_CHARS).collect();
    cut.push('…');
    cut
}

#[async_trait]
impl Plugin for Ask {
    fn manifest(&self) -> Manifest {
        Manifest::command("ai", Category::Ai, "Ask the AI assistant")
            .aliases(&["ask", "gpt"])
            .usage("question")
            .observer()
    }

    async fn execute(&self, msg: &Message, cmd: &Command) -> Result<()> {
        let quoted = msg.quoted.as_ref().map(|q| q.body.as_str());
        let Some(prompt) = build_prompt(&cmd.text(), quoted) else {
            msg.reply("Ask me something, e.g. ai what is the capital of France?")
                .await;
            return Ok(());
        };
        self.answer(msg, &prompt).await
    }

    async fn on_message(&self, msg: &Message) -> Result<()> {
        let Some(question) = mention_question(msg, &self.prefix) else {
            return Ok(());
        };
        let quoted = msg.quoted.as_ref().map(|q| q.body.as_str());
        match build_prompt(&question, quoted) {
            Some(prompt) => self.answer(msg, &prompt).await,
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::normalize;
    use crate::testing::{self, MockSocket};
    use serde_json::json;

    const GROUP: &str = "120363000@g.us";

    async fn mentioning(sender: &str, text: &str, mentioned: &[&str]) -> Message {
        let socket = Arc::new(
            MockSocket::new("999@s.whatsapp.net")
                .with_group(GROUP, &[("999", None), ("1", None)]),
        );
        let ctx = testing::context(socket);
        let raw = testing::raw_message(
            GROUP,
            Some(sender),
            "q1",
            json!({"extendedTextMessage": {
                "text": text,
                "contextInfo": {"mentionedJid": mentioned}
            }}),
        );
        normalize(Arc::new(raw), &ctx).await
    }

    #[test]
    fn test_build_prompt() {
        assert_eq!(build_prompt("  ", None), None);
        assert_eq!(build_prompt("", Some("  ")), None);
        assert_eq!(build_prompt("why?", None).as_deref(), Some("why?"));
        assert_eq!(build_prompt("", Some("the sky is blue")).as_deref(), Some("the sky is blue"));
        assert_eq!(
            build_prompt("is this true?", Some("the sky is green")).as_deref(),
            Some("is this true?\n\nContext:\n\"the sky is green\"")
        );
    }

    #[test]
    fn test_truncate_long_replies() {
        let long = "a".repeat(MAX_REPLY_CHARS + 10);
        let cut = truncate(&long);
        assert_eq!(cut.chars().count(), MAX_REPLY_CHARS + 1);
        assert!(cut.ends_with('…'));
        assert_eq!(truncate("short"), "short");
    }

    #[tokio::test]
    async fn test_mention_of_bot_becomes_question() {
        let msg =
            mentioning("1@s.whatsapp.net", "@999  what is rust?", &["999@s.whatsapp.net"]).await;
        assert_eq!(mention_question(&msg, ".").as_deref(), Some("what is rust?"));

        let other = mentioning("1@s.whatsapp.net", "@2 hello", &["2@s.whatsapp.net"]).await;
        assert_eq!(mention_question(&other, "."), None);

        // commands that happen to mention the bot go through the command path
        let cmd = mentioning("1@s.whatsapp.net", ".ai @999 hi", &["999@s.whatsapp.net"]).await;
        assert_eq!(mention_question(&cmd, "."), None);
    }
}
