//! Deleting the bot's messages, and dropping stored spoilers whose message
//! is gone.

use tracing::{debug, info};

use super::Handlers;
use crate::error::SlackResult;
use crate::events::{MessageActionPayload, MessageEvent, PayloadMessage};
use crate::store::SpoilerStore;

const SLACKBOT: &str = "USLACKBOT";

/// Posted by an app or by Slackbot rather than a person.
fn is_app_message(message: &PayloadMessage) -> bool {
    message.bot_id.is_some()
        || message.subtype.as_deref() == Some("bot_message")
        || message.user.as_deref() == Some(SLACKBOT)
}

/// `poster` recorded in the message's metadata.
fn metadata_poster(message: &PayloadMessage) -> Option<&str> {
    message
        .metadata
        .as_ref()?
        .get("event_payload")?
        .get("poster")?
        .as_str()
}

impl Handlers {
    /// The "Delete message" shortcut. Whoever the bot posted a message for
    /// may delete it, and so may channel managers.
    pub(super) async fn delete_message_shortcut(
        &self,
        payload: &MessageActionPayload,
    ) -> SlackResult<()> {
        let channel = &payload.channel.id;
        let user = &payload.user.id;
        let message = &payload.message;
        let response_url = payload.response_url.as_deref();

        if !is_app_message(message) {
            return self
                .notify(
                    response_url,
                    channel,
                    user,
                    "Only messages from Slackbot or apps can be deleted",
                )
                .await;
        }

        let stored = self.store.get(channel, &message.ts).await?;
        let posted_for_user = stored.as_ref().is_some_and(|spoiler| &spoiler.user == user)
            || metadata_poster(message) == Some(user.as_str());
        if !posted_for_user && !self.is_channel_manager(user, channel).await? {
            return self
                .notify(
                    response_url,
                    channel,
                    user,
                    "Only the channel manager can delete these messages",
                )
                .await;
        }

        match self.api.delete_message(channel, &message.ts).await {
            Ok(()) => {}
            Err(e) if e.api_code() == Some("cant_delete_message") => {
                return self
                    .notify(
                        response_url,
                        channel,
                        user,
                        "i can only delete messages i posted myself :(",
                    )
                    .await;
            }
            Err(e) => return Err(e),
        }
        info!(channel = %channel, ts = %message.ts, user = %user, "Deleted message");

        if stored.is_some() {
            self.store.delete(channel, &message.ts).await?;
        }
        Ok(())
    }

    /// `message_deleted`: the reveal button went with the message.
    pub(super) async fn forget_deleted_message(&self, event: &MessageEvent) -> SlackResult<()> {
        let Some(ts) = event.deleted_ts.as_deref() else {
            return Ok(());
        };
        if self.store.delete(&event.channel, ts).await? {
            debug!(channel = %event.channel, ts, "Forgot deleted spoiler");
        }
        Ok(())
    }
}
