//! Spoiler flows: the slash command, the message shortcut, the modal
//! submission and the reveal button.

use serde::Deserialize;
use serde_json::json;
use tracing::{debug, error, info, warn};

use super::Handlers;
use crate::api::{ConversationInfo, UploadFile};
use crate::commands::CommandContext;
use crate::error::{SlackError, SlackResult};
use crate::events::{BlockActionsPayload, MessageActionPayload, ViewSubmissionPayload};
use crate::messages::{
    MessageMetadata, REVEAL_FROM_METADATA, REVEAL_FROM_STORE, SPOILER_EVENT_TYPE,
    SPOILER_FILES_ID, SPOILER_INPUT_ID, SlackBlock, SlackBlockElement, SlackMessageBuilder,
    SlackMessageContent, SpoilerTarget, VIEW_SPOILER_ACTION, create_spoiler_view, error_view,
    reveal_text_view, reveal_view,
};
use crate::spoiler::{split_plain, split_spoilers};
use crate::store::{SpoilerStore, StoredSpoiler};

/// Fallback text of posted rich-text spoilers.
const SPOILER_FALLBACK: &str = "spoiler :hehe:";

/// A file attached in the create-spoiler modal.
#[derive(Debug, Deserialize)]
struct SubmittedFile {
    name: String,
    url_private_download: String,
}

/// `text` and `poster` of a plain-text spoiler's metadata.
#[derive(Debug, Deserialize)]
struct PlainSpoilerPayload {
    text: String,
    poster: String,
}

impl PlainSpoilerPayload {
    fn from_metadata(metadata: &MessageMetadata) -> Option<Self> {
        if metadata.event_type != SPOILER_EVENT_TYPE {
            return None;
        }
        serde_json::from_value(metadata.event_payload.clone()).ok()
    }
}

impl Handlers {
    /// `/se spoiler [text]`.
    pub(super) async fn spoiler_command(
        &self,
        text: Option<&str>,
        context: &CommandContext,
    ) -> SlackResult<()> {
        let ran = context.ran();
        let Some(channel) = self.channel_access(context, &ran).await? else {
            return Ok(());
        };
        if !channel.is_channel {
            return self
                .reply(
                    &context.response_url,
                    format!("I need access to the channel! Please add me :3{}", ran),
                )
                .await;
        }

        let Some(text) = text.filter(|t| !t.trim().is_empty()) else {
            let view = create_spoiler_view(&SpoilerTarget::channel(&context.channel_id));
            return self.api.open_view(&context.trigger_id, &view).await;
        };

        let spoiler = split_plain(text);
        let button =
            SlackBlockElement::button(spoiler.button_label(), VIEW_SPOILER_ACTION, REVEAL_FROM_METADATA);
        let user = self.api.user_info(&context.user_id).await?;
        let message = SlackMessageBuilder::new()
            .fallback(spoiler.visible.clone())
            .section_with_button(spoiler.visible.clone(), button)
            .build()
            .with_metadata(
                SPOILER_EVENT_TYPE,
                json!({ "text": spoiler.revealed, "poster": context.user_id }),
            )
            .as_user(user.display_name(), user.avatar().map(str::to_string));

        let ts = self.api.post_message(&context.channel_id, &message).await?;
        info!(
            channel = %context.channel_id,
            ts = %ts,
            phrases = spoiler.phrases,
            "Posted plain-text spoiler"
        );
        Ok(())
    }

    /// Look the invoking channel up, joining it when the bot is not a
    /// member. `None` means the user has already been told why not.
    async fn channel_access(
        &self,
        context: &CommandContext,
        ran: &str,
    ) -> SlackResult<Option<ConversationInfo>> {
        match self.api.conversation_info(&context.channel_id).await {
            Ok(info) => Ok(Some(info)),
            Err(e) => match e.api_code() {
                Some("channel_not_found") => {
                    self.reply(
                        &context.response_url,
                        format!(
                            "i couldn't find that channel :(\ntry making sure i'm in the channel?{}",
                            ran
                        ),
                    )
                    .await?;
                    Ok(None)
                }
                Some("not_in_channel") => {
                    debug!(channel = %context.channel_id, "Joining channel");
                    Ok(Some(self.api.join_conversation(&context.channel_id).await?))
                }
                _ => {
                    self.reply(
                        &context.response_url,
                        format!("oops, something went wrong fetching that channel!{}", ran),
                    )
                    .await?;
                    self.report("Error in spoiler_command", &e).await;
                    Ok(None)
                }
            },
        }
    }

    /// The "Spoiler" message shortcut: the modal, bound to the message's
    /// thread.
    pub(super) async fn spoiler_shortcut(&self, payload: &MessageActionPayload) -> SlackResult<()> {
        let thread_ts = payload
            .message
            .thread_ts
            .as_deref()
            .unwrap_or(&payload.message.ts);
        let target = SpoilerTarget::thread(&payload.channel.id, thread_ts);
        debug!(target = %target.encode(), "Opening spoiler modal from shortcut");
        self.api
            .open_view(&payload.trigger_id, &create_spoiler_view(&target))
            .await
    }

    /// Submission of the create-spoiler modal.
    pub(super) async fn create_spoiler(&self, payload: &ViewSubmissionPayload) -> SlackResult<()> {
        let target = SpoilerTarget::decode(&payload.view.private_metadata);
        let user_id = &payload.user.id;
        let state = &payload.view.state;

        let rich_text = state
            .input(SPOILER_INPUT_ID, SPOILER_INPUT_ID)
            .and_then(|input| input.get("rich_text_value"))
            .ok_or_else(|| SlackError::InvalidPayload("Spoiler modal without text".to_string()))?;
        let files: Vec<SubmittedFile> = match state
            .input(SPOILER_FILES_ID, SPOILER_FILES_ID)
            .and_then(|input| input.get("files"))
        {
            Some(files) if !files.is_null() => serde_json::from_value(files.clone())?,
            _ => Vec::new(),
        };

        let mut uploads = Vec::with_capacity(files.len());
        for file in &files {
            match self.api.download_file(&file.url_private_download).await {
                Ok(data) => uploads.push(UploadFile::new(&file.name, data)),
                Err(e) => {
                    warn!(file = %file.name, error = %e, "Failed to download spoiler file");
                    return self
                        .api
                        .post_ephemeral(
                            &target.channel,
                            user_id,
                            &format!(
                                "i couldn't download the file {} :(\nplease try uploading it again!",
                                file.name
                            ),
                        )
                        .await;
                }
            }
        }

        let variants = split_spoilers(rich_text);

        let mut blocks = SlackBlock::from_document(&variants.redacted)?;
        blocks.push(SlackBlock::Actions {
            elements: vec![SlackBlockElement::button(
                "View spoiler",
                VIEW_SPOILER_ACTION,
                REVEAL_FROM_STORE,
            )],
        });

        let user = self.api.user_info(user_id).await?;
        let mut message = SlackMessageContent::new()
            .with_text(SPOILER_FALLBACK)
            .with_blocks(blocks)
            .as_user(user.display_name(), user.avatar().map(str::to_string))
            .unfurl();
        if let Some(thread_ts) = &target.thread_ts {
            message = message.in_thread(thread_ts);
        }

        let ts = self.api.post_message(&target.channel, &message).await?;
        let record = StoredSpoiler::new(&target.channel, &ts, variants.revealed, user_id);
        if let Err(e) = self.store.save(&record).await {
            // The button would have nothing to reveal.
            error!(channel = %target.channel, ts = %ts, error = %e, "Failed to store posted spoiler");
            if let Err(delete_error) = self.api.delete_message(&target.channel, &ts).await {
                warn!(
                    channel = %target.channel,
                    ts = %ts,
                    error = %delete_error,
                    "Failed to remove unstored spoiler"
                );
            }
            return Err(e);
        }
        info!(channel = %target.channel, ts = %ts, files = uploads.len(), "Posted spoiler");

        self.api
            .upload_files(&target.channel, target.thread_ts.as_deref(), uploads)
            .await
    }

    /// The "View spoiler" button.
    pub(super) async fn view_spoiler(&self, payload: &BlockActionsPayload) -> SlackResult<()> {
        let value = payload
            .actions
            .iter()
            .find(|action| action.action_id == VIEW_SPOILER_ACTION)
            .and_then(|action| action.value.as_deref())
            .unwrap_or_default();
        let (Some(channel), Some(message)) = (&payload.channel, &payload.message) else {
            return Err(SlackError::InvalidPayload(
                "view_spoiler without channel or message".to_string(),
            ));
        };

        match value {
            REVEAL_FROM_STORE => {
                let view = match self.store.get(&channel.id, &message.ts).await? {
                    Some(stored) => {
                        reveal_view(SlackBlock::from_document(&stored.message)?, &stored.user)
                    }
                    None => error_view(
                        "spoiler not found",
                        "i couldn't find that spoiler :(\nit may have been deleted.",
                    ),
                };
                self.api.open_view(&payload.trigger_id, &view).await
            }
            REVEAL_FROM_METADATA => {
                let inline = message
                    .metadata
                    .clone()
                    .and_then(|m| serde_json::from_value::<MessageMetadata>(m).ok());
                let metadata = match inline {
                    Some(metadata) => Some(metadata),
                    None => {
                        let Some(fetched) = self
                            .fetch_metadata(&channel.id, &message.ts, &payload.user.id)
                            .await?
                        else {
                            return Ok(());
                        };
                        fetched
                    }
                };

                let view = match metadata.as_ref().and_then(PlainSpoilerPayload::from_metadata) {
                    Some(spoiler) => reveal_text_view(&spoiler.text, &spoiler.poster),
                    None => error_view(
                        "spoiler not found",
                        "that message doesn't carry a spoiler anymore :(",
                    ),
                };
                self.api.open_view(&payload.trigger_id, &view).await
            }
            other => {
                debug!(value = other, "Unhandled view_spoiler value");
                self.notify(
                    payload.response_url.as_deref(),
                    &channel.id,
                    &payload.user.id,
                    "oops, i can't handle this yet!",
                )
                .await
            }
        }
    }

    /// Message metadata from history, joining the channel if needed.
    /// The outer `None` means the user has already been told about a failure.
    async fn fetch_metadata(
        &self,
        channel: &str,
        ts: &str,
        user: &str,
    ) -> SlackResult<Option<Option<MessageMetadata>>> {
        let error = match self.api.message_metadata(channel, ts).await {
            Ok(metadata) => return Ok(Some(metadata)),
            Err(e) => e,
        };

        match error.api_code() {
            Some("not_in_channel") => {
                self.api.join_conversation(channel).await?;
                Ok(Some(self.api.message_metadata(channel, ts).await?))
            }
            Some("message_not_found") => {
                self.api
                    .post_ephemeral(
                        channel,
                        user,
                        "i couldn't find that message :(\ntry making sure i'm still in the channel?",
                    )
                    .await?;
                Ok(None)
            }
            _ => {
                self.api
                    .post_ephemeral(channel, user, "oops, something went wrong fetching that message!")
                    .await?;
                self.report("Error in view_spoiler", &error).await;
                Ok(None)
            }
        }
    }
}

