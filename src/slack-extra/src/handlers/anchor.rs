//! Anchors: a message the bot re-posts at the bottom of a channel whenever
//! something new is posted there.

use serde_json::{Value, json};
use tracing::{debug, info, warn};

use super::Handlers;
use crate::api::UserInfo;
use crate::commands::{AnchorAction, CommandContext};
use crate::error::{SlackError, SlackResult};
use crate::events::{MessageEvent, ViewSubmissionPayload};
use crate::messages::{
    ANCHOR_EVENT_TYPE, ANCHOR_INPUT_ID, AnchorTarget, SlackBlock, SlackMessageContent,
    configure_anchor_view,
};
use crate::store::{AnchorConfig, AnchorStore};

/// Message subtypes that push the anchor down. Edits, deletions and other
/// hidden subtypes leave it in place.
const ANCHOR_SUBTYPES: &[&str] = &[
    "bot_message",
    "file_share",
    "me_message",
    "thread_broadcast",
    "channel_convert_to_private",
    "channel_convert_to_public",
    "channel_join",
    "channel_leave",
    "channel_name",
    "channel_purpose",
    "channel_posting_permissions",
    "channel_topic",
    "channel_unarchive",
    "group_join",
    "group_leave",
    "group_name",
    "group_purpose",
    "group_topic",
    "group_unarchive",
];

const ANCHOR_FALLBACK: &str = "anchored message";

pub(super) const NOT_A_MANAGER: &str =
    "looks like you're not a channel manager! only channel managers can configure Anchor.";

const ANCHOR_THREAD_REPLY: &str =
    "Hey! Please don't reply directly to the anchor message. Instead, start a new thread.";

/// Errors after which posting as the configured anchor can't succeed again.
fn disables_anchor(err: &SlackError) -> bool {
    matches!(err, SlackError::Auth(_))
        || matches!(
            err.api_code(),
            Some("invalid_auth" | "no_permission" | "token_expired" | "token_revoked")
        )
}

impl Handlers {
    /// `/se anchor [enable|disable]`.
    pub(super) async fn anchor_command(
        &self,
        action: Option<AnchorAction>,
        context: &CommandContext,
    ) -> SlackResult<()> {
        let channel = &context.channel_id;
        if !self.is_channel_manager(&context.user_id, channel).await? {
            return self
                .reply(
                    &context.response_url,
                    format!("{}{}", NOT_A_MANAGER, context.ran()),
                )
                .await;
        }

        let existing = self.store.anchor(channel).await?;
        if let (Some(action), Some(mut anchor)) = (action, existing.clone()) {
            anchor.enabled = action == AnchorAction::Enable;
            anchor.touch();
            self.store.save_anchor(&anchor).await?;
            info!(channel = %channel, enabled = anchor.enabled, "Anchor toggled");

            let text = if anchor.enabled {
                "yay! i've enabled anchor for this channel :D"
            } else {
                "hey! i've disabled anchor for this channel :)"
            };
            return self.reply(&context.response_url, text).await;
        }

        let view = configure_anchor_view(channel, existing.map(|anchor| anchor.enabled));
        self.api.open_view(&context.trigger_id, &view).await
    }

    /// Submission of the anchor configuration modal.
    pub(super) async fn configure_anchor(&self, payload: &ViewSubmissionPayload) -> SlackResult<()> {
        let target = AnchorTarget::decode(&payload.view.private_metadata).ok_or_else(|| {
            SlackError::InvalidPayload(format!(
                "Bad anchor metadata: {}",
                payload.view.private_metadata
            ))
        })?;
        let user_id = &payload.user.id;
        let content = payload
            .view
            .state
            .input(ANCHOR_INPUT_ID, ANCHOR_INPUT_ID)
            .and_then(|input| input.get("rich_text_value"))
            .cloned()
            .ok_or_else(|| SlackError::InvalidPayload("Anchor modal without text".to_string()))?;

        let existing = self.store.anchor(&target.channel).await?;
        if target.editing && existing.is_none() {
            let text = match &self.maintainer_id {
                Some(maintainer) => format!(
                    "No existing Anchor configuration found for this channel. Please message <@{}>",
                    maintainer
                ),
                None => "No existing Anchor configuration found for this channel.".to_string(),
            };
            return self.direct_message(user_id, text).await;
        }

        let poster = self.api.user_info(user_id).await?;
        let ts = self.post_anchor(&target.channel, &content, &poster).await?;

        let anchor = match existing {
            Some(mut anchor) => {
                if let Err(e) = self.api.delete_message(&target.channel, &anchor.message_ts).await {
                    warn!(channel = %target.channel, error = %e, "Failed to remove previous anchor");
                }
                anchor.message = content;
                anchor.message_ts = ts;
                anchor.user = user_id.clone();
                anchor.touch();
                anchor
            }
            None => AnchorConfig::new(&target.channel, content, ts, user_id),
        };
        self.store.save_anchor(&anchor).await?;
        info!(channel = %anchor.channel, ts = %anchor.message_ts, "Anchor configured");
        Ok(())
    }

    /// Post the anchor under the poster's name and pin it. Returns its ts.
    async fn post_anchor(&self, channel: &str, content: &Value, poster: &UserInfo) -> SlackResult<String> {
        let message = SlackMessageContent::new()
            .with_text(ANCHOR_FALLBACK)
            .with_blocks(SlackBlock::from_document(content)?)
            .with_metadata(ANCHOR_EVENT_TYPE, json!({ "channel": channel }))
            .as_user(poster.display_name(), poster.avatar().map(str::to_string))
            .unfurl();
        let ts = self.api.post_message(channel, &message).await?;

        if let Err(e) = self.api.pin_message(channel, &ts).await {
            warn!(channel, ts = %ts, error = %e, "Failed to pin anchor");
        }
        Ok(ts)
    }

    /// Move the channel's anchor below a newly posted message.
    pub(super) async fn keep_anchor_at_bottom(&self, event: &MessageEvent) -> SlackResult<()> {
        if let Some(subtype) = event.subtype.as_deref()
            && !ANCHOR_SUBTYPES.contains(&subtype)
        {
            return Ok(());
        }
        if event.metadata_type() == Some(ANCHOR_EVENT_TYPE) {
            return Ok(());
        }

        let channel = &event.channel;
        let Some(mut anchor) = self.store.anchor(channel).await? else {
            return Ok(());
        };
        if !anchor.enabled || event.ts == anchor.message_ts {
            return Ok(());
        }

        if event.thread_ts.as_deref() == Some(anchor.message_ts.as_str()) {
            if let Some(user) = &event.user {
                self.api.post_ephemeral(channel, user, ANCHOR_THREAD_REPLY).await?;
            }
            return Ok(());
        }
        if event.is_thread_reply() && event.subtype.as_deref() != Some("thread_broadcast") {
            return Ok(());
        }

        if let Err(e) = self.api.delete_message(channel, &anchor.message_ts).await {
            if e.api_code() == Some("message_not_found") {
                debug!(channel = %channel, "Previous anchor already gone");
            } else {
                warn!(channel = %channel, error = %e, "Failed to delete anchor");
                self.heartbeat(
                    &format!("Failed to delete anchor message in channel <#{}>: {}", channel, e),
                    &[],
                )
                .await;
            }
        }

        let poster = self.api.user_info(&anchor.user).await?;
        match self.post_anchor(channel, &anchor.message, &poster).await {
            Ok(ts) => {
                debug!(channel = %channel, ts = %ts, "Anchor re-posted");
                anchor.message_ts = ts;
                anchor.touch();
                self.store.save_anchor(&anchor).await
            }
            Err(e) => {
                warn!(channel = %channel, error = %e, "Failed to re-post anchor");
                self.heartbeat(
                    &format!(
                        "Failed to post anchor message in channel <#{}> with error {}.",
                        channel, e
                    ),
                    &[],
                )
                .await;

                if !disables_anchor(&e) {
                    return Ok(());
                }
                anchor.enabled = false;
                anchor.touch();
                self.store.save_anchor(&anchor).await?;
                info!(channel = %channel, "Anchor disabled after failure");
                self.direct_message(
                    &anchor.user,
                    format!(
                        "hey! i had to disable anchor messages in <#{}> because i got this error - `{}`.\nif you're confused, try turning it back on with the anchor command!",
                        channel, e
                    ),
                )
                .await
            }
        }
    }
}
