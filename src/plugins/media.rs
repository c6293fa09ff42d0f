use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

use super::{Category, Manifest, Plugin};
use crate::message::{ContentKind, Message, MessageContent};
use crate::router::Command;
use crate::socket::OutgoingContent;

/// Re-send a media message (view-once included) as a regular one
pub struct Reveal;

fn outgoing(
    kind: &ContentKind,
    content: &MessageContent,
    caption: &str,
    bytes: &[u8],
) -> Option<OutgoingContent> {
    let (label, _) = kind.media_label()?;
    let mimetype = content.media_message().and_then(|m| m.mimetype.clone());
    Some(OutgoingContent::media(label, mimetype, Some(caption.to_string()), bytes))
}

#[async_trait]
impl Plugin for Reveal {
    fn manifest(&self) -> Manifest {
        Manifest::command("reveal", Category::General, "Re-send a media or view-once message")
            .aliases(&["rvo", "viewonce"])
            .usage("(reply to media)")
    }

    async fn execute(&self, msg: &Message, _cmd: &Command) -> Result<()> {
        let resend = match (&msg.quoted, msg.content()) {
            (Some(quoted), _) if quoted.is_media => {
                let Some(bytes) = quoted.download().await else {
                    msg.reply("Couldn't download that media.").await;
                    return Ok(());
                };
                outgoing(&quoted.kind, quoted.content(), &quoted.body, &bytes)
            }
            (_, Some(content)) if msg.is_media => {
                let Some(bytes) = msg.download().await else {
                    msg.reply("Couldn't download that media.").await;
                    return Ok(());
                };
                // the caption is the command itself
                outgoing(&msg.kind, content, "", &bytes)
            }
            _ => None,
        };

        match resend {
            Some(content) => {
                info!("Re-sending {} media in {}", msg.kind, msg.chat_id);
                msg.send(content).await;
            }
            None => {
                msg.reply("Reply to an image, video, audio, sticker or document.").await;
            }
        }
        Ok(())
    }
}
