//! Request handlers.
//!
//! [`Handlers`] receives already-acknowledged Socket Mode payloads and
//! drives the Web API and the store. Failures are logged and, when a
//! heartbeat channel is configured, reported there.

mod anchor;
mod channel;
mod delete;
mod group;
mod info;
mod mover;
mod spoiler;


use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::api::SlackApi;
use crate::commands::{
    ChannelArg, DelayedResponse, ParsedCommand, SlashCommandPayload, help_text, parse_command,
};
use crate::config::{Environment, SlackConfig};
use crate::error::{SlackError, SlackResult};
use crate::events::{EventPayload, InteractivePayload, SlackEvent, parse_event};
use crate::messages::{
    CONFIGURE_ANCHOR_CALLBACK, CREATE_MOVER_ACTION, CREATE_SPOILER_CALLBACK, EDIT_MOVER_CALLBACK,
    EDIT_MOVERS_ACTION, SETUP_MOVER_CALLBACK, SlackMessageContent, VIEW_SPOILER_ACTION, error_view,
    section,
};
use crate::store::Store;

pub use channel::JOIN_GREETING;

/// Callback id of the "Spoiler" message shortcut.
pub const SPOILER_SHORTCUT_CALLBACK: &str = "spoiler";
/// Callback id of the "Delete message" message shortcut.
pub const DELETE_MESSAGE_CALLBACK: &str = "delete_message";

/// Everything a handler needs, shared across tasks.
pub struct Handlers {
    api: Arc<dyn SlackApi>,
    store: Arc<dyn Store>,
    environment: Environment,
    maintainer_id: Option<String>,
    heartbeat_channel: Option<String>,
}

/// The Slack error code of `err`, or its message when it has none.
fn error_code(err: &SlackError) -> String {
    err.api_code()
        .map(str::to_string)
        .unwrap_or_else(|| err.to_string())
}

impl Handlers {
    pub fn new(api: Arc<dyn SlackApi>, store: Arc<dyn Store>, environment: Environment) -> Self {
        Self {
            api,
            store,
            environment,
            maintainer_id: None,
            heartbeat_channel: None,
        }
    }

    pub fn from_config(config: &SlackConfig, api: Arc<dyn SlackApi>, store: Arc<dyn Store>) -> Self {
        Self {
            api,
            store,
            environment: config.environment(),
            maintainer_id: config.maintainer_id().map(str::to_string),
            heartbeat_channel: config.heartbeat_channel().map(str::to_string),
        }
    }

    pub fn with_maintainer(mut self, user_id: impl Into<String>) -> Self {
        self.maintainer_id = Some(user_id.into());
        self
    }

    pub fn with_heartbeat_channel(mut self, channel: impl Into<String>) -> Self {
        self.heartbeat_channel = Some(channel.into());
        self
    }

    pub fn command_prefix(&self) -> &'static str {
        self.environment.command_prefix()
    }

    /// Post a notice to the heartbeat channel, if one is configured.
    pub async fn heartbeat(&self, heartbeat: &str, messages: &[String]) {
        let Some(channel) = &self.heartbeat_channel else {
            return;
        };

        let mut text = heartbeat.to_string();
        for message in messages {
            text.push('\n');
            text.push_str(message);
        }
        let content = SlackMessageContent::new().with_text(text);
        if let Err(e) = self.api.post_message(channel, &content).await {
            warn!(channel = %channel, error = %e, "Failed to send heartbeat");
        }
    }

    async fn report(&self, heartbeat: &str, err: &SlackError) {
        error!(error = %err, "{}", heartbeat);
        self.heartbeat(heartbeat, &[format!("Error details: {}", err)])
            .await;
    }

    /// Reply through a slash command's `response_url`.
    async fn reply(&self, response_url: &str, text: impl Into<String>) -> SlackResult<()> {
        let response = DelayedResponse::new().with_text(text);
        self.api.respond(response_url, &response).await
    }

    /// Reply with the text as a single mrkdwn section.
    async fn reply_section(&self, response_url: &str, text: String) -> SlackResult<()> {
        let blocks = serde_json::to_value(vec![section(text.as_str())])?;
        let response = DelayedResponse::new().with_text(text).with_blocks(blocks);
        self.api.respond(response_url, &response).await
    }

    /// Tell the user who clicked or used a shortcut something, through the
    /// action's `response_url` when there is one.
    async fn notify(
        &self,
        response_url: Option<&str>,
        channel: &str,
        user: &str,
        text: &str,
    ) -> SlackResult<()> {
        match response_url {
            Some(url) => self.reply(url, text).await,
            None => self.api.post_ephemeral(channel, user, text).await,
        }
    }

    /// Message someone in their DM with the bot.
    async fn direct_message(&self, user: &str, text: impl Into<String>) -> SlackResult<()> {
        let content = SlackMessageContent::new().with_text(text);
        self.api.post_message(user, &content).await?;
        Ok(())
    }

    /// The maintainer manages every channel; otherwise the creator does.
    async fn is_channel_manager(&self, user: &str, channel: &str) -> SlackResult<bool> {
        if self.maintainer_id.as_deref() == Some(user) {
            return Ok(true);
        }
        let info = self.api.conversation_info(channel).await?;
        Ok(info.creator.as_deref() == Some(user))
    }

    /// Channel id behind a command argument; `None` when no channel has
    /// that name.
    async fn resolve_channel(&self, channel: &ChannelArg) -> SlackResult<Option<String>> {
        match channel {
            ChannelArg::Id(id) => Ok(Some(id.clone())),
            ChannelArg::Name(name) => self.api.find_channel(name).await,
        }
    }

    pub async fn handle_slash_command(&self, payload: SlashCommandPayload) {
        info!(
            command = %payload.command,
            user = %payload.user_id,
            channel = %payload.channel_id,
            "Handling slash command"
        );

        let prefix = self.command_prefix();
        let parsed = parse_command(&payload, prefix);
        let context = parsed.context().clone();

        let result = match parsed {
            ParsedCommand::Info {
                user,
                channel,
                context,
            } => self.info_command(user, channel, &context).await,
            ParsedCommand::Spoiler { text, context } => {
                self.spoiler_command(text.as_deref(), &context).await
            }
            ParsedCommand::Anchor { action, context } => {
                self.anchor_command(action, &context).await
            }
            ParsedCommand::Group {
                action,
                group,
                context,
            } => self.group_command(action, &group, &context).await,
            ParsedCommand::Move {
                start,
                end,
                context,
            } => self.move_command(start, end, &context).await,
            ParsedCommand::Help { context } => {
                self.reply(
                    &context.response_url,
                    format!("{}{}", help_text(prefix), context.ran()),
                )
                .await
            }
            ParsedCommand::Invalid { errors, context } => {
                self.reply(
                    &context.response_url,
                    format!("{}{}", errors.join("\n"), context.ran()),
                )
                .await
            }
            ParsedCommand::Unknown { command, .. } => {
                warn!(command = %command, expected = prefix, "Slash command for another instance");
                Ok(())
            }
        };

        if let Err(e) = result {
            self.report("Error in slash command handler", &e).await;
            if let Err(e) = self
                .reply(
                    &context.response_url,
                    format!("oops, something went wrong!{}", context.ran()),
                )
                .await
            {
                warn!(error = %e, "Failed to report command failure");
            }
        }
    }

    pub async fn handle_interactive(&self, payload: InteractivePayload) {
        let (result, trigger_id) = match payload {
            InteractivePayload::BlockActions(payload) => {
                let trigger_id = Some(payload.trigger_id.clone());
                let result = if payload.action(VIEW_SPOILER_ACTION).is_some() {
                    self.view_spoiler(&payload).await
                } else if payload.action(CREATE_MOVER_ACTION).is_some() {
                    self.open_mover_setup(&payload).await
                } else if payload.action(EDIT_MOVERS_ACTION).is_some() {
                    self.open_mover_picker(&payload).await
                } else {
                    debug!("Ignoring block action");
                    return;
                };
                (result, trigger_id)
            }
            InteractivePayload::ViewSubmission(payload) => {
                let trigger_id = payload.trigger_id.clone();
                let result = match payload.view.callback_id.as_str() {
                    CREATE_SPOILER_CALLBACK => self.create_spoiler(&payload).await,
                    CONFIGURE_ANCHOR_CALLBACK => self.configure_anchor(&payload).await,
                    SETUP_MOVER_CALLBACK => self.setup_mover(&payload).await,
                    EDIT_MOVER_CALLBACK => self.edit_mover(&payload).await,
                    other => {
                        debug!(callback_id = %other, "Ignoring view submission");
                        return;
                    }
                };
                (result, trigger_id)
            }
            InteractivePayload::MessageAction(payload) => {
                let trigger_id = Some(payload.trigger_id.clone());
                let result = match payload.callback_id.as_str() {
                    SPOILER_SHORTCUT_CALLBACK => self.spoiler_shortcut(&payload).await,
                    DELETE_MESSAGE_CALLBACK => self.delete_message_shortcut(&payload).await,
                    other => {
                        debug!(callback_id = %other, "Ignoring message shortcut");
                        return;
                    }
                };
                (result, trigger_id)
            }
            InteractivePayload::Shortcut(payload) => {
                debug!(callback_id = %payload.callback_id, "Ignoring global shortcut");
                return;
            }
            InteractivePayload::Unknown => {
                debug!("Ignoring unknown interactive payload");
                return;
            }
        };

        if let Err(e) = result {
            self.report("Error in interactive handler", &e).await;
            if let Some(trigger_id) = trigger_id {
                let view = error_view("something broke", &e.to_string());
                if let Err(e) = self.api.open_view(&trigger_id, &view).await {
                    warn!(error = %e, "Failed to open error view");
                }
            }
        }
    }

    pub async fn handle_event(&self, payload: EventPayload) {
        let result = match parse_event(&payload) {
            Ok(SlackEvent::ChannelCreated(event)) => self.join_channel(&event).await,
            Ok(SlackEvent::Message(event)) => {
                if event.subtype.as_deref() == Some("message_deleted") {
                    self.forget_deleted_message(&event).await
                } else {
                    self.keep_anchor_at_bottom(&event).await
                }
            }
            Ok(SlackEvent::MemberJoinedChannel(event)) => self.move_new_member(&event).await,
            Ok(SlackEvent::Unknown) => {
                debug!("Received unknown event type");
                Ok(())
            }
            Err(e) => {
                warn!("Failed to parse event: {}", e);
                Ok(())
            }
        };

        if let Err(e) = result {
            self.report("Error in event handler", &e).await;
        }
    }
}
