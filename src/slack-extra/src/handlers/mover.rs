//! Moving members between channels: `/se move` in bulk, and movers that
//! add anyone joining one channel of a set to all the others.

use std::time::Duration;

use tracing::{debug, info, warn};

use super::{Handlers, error_code};
use crate::commands::{ChannelArg, CommandContext};
use crate::error::{SlackError, SlackResult};
use crate::events::{BlockActionsPayload, MemberJoinedChannelEvent, ViewSubmissionPayload};
use crate::messages::{
    MOVER_CHANNELS_ID, MOVER_CONFIG_ID, MOVER_NAME_ID, MoverTarget, edit_movers_view, error_view,
    mover_home_view, setup_mover_view,
};
use crate::store::{MoverConfig, MoverStore};

/// Users per `conversations.invite` call.
pub(super) const INVITE_BATCH: usize = 100;
const INVITE_RETRIES: usize = 3;
const UNNAMED_MOVER: &str = "Unnamed mover";

impl Handlers {
    /// `/se move [start] [end]`. Without both channels, opens the mover
    /// management modal.
    pub(super) async fn move_command(
        &self,
        start: Option<ChannelArg>,
        end: Option<ChannelArg>,
        context: &CommandContext,
    ) -> SlackResult<()> {
        let ran = context.ran();
        let (Some(start), Some(end)) = (start, end) else {
            if let Err(e) = self.api.open_view(&context.trigger_id, &mover_home_view()).await {
                warn!(error = %e, "Failed to open mover modal");
                return self
                    .reply(
                        &context.response_url,
                        format!("Error opening modal: {}{}", error_code(&e), ran),
                    )
                    .await;
            }
            return Ok(());
        };

        let mut resolved = Vec::with_capacity(2);
        for channel in [&start, &end] {
            match self.resolve_channel(channel).await? {
                Some(id) => resolved.push(id),
                None => {
                    return self
                        .reply(
                            &context.response_url,
                            format!("i couldn't find the channel {}{}", channel.display(), ran),
                        )
                        .await;
                }
            }
        }
        let (from, to) = (&resolved[0], &resolved[1]);
        if from == to {
            return self
                .reply(&context.response_url, format!("those are the same channel!{}", ran))
                .await;
        }

        for channel in [from, to] {
            if !self.is_channel_manager(&context.user_id, channel).await? {
                return self
                    .reply(
                        &context.response_url,
                        format!(
                            "You need to be a channel manager of both channels to move users{}",
                            ran
                        ),
                    )
                    .await;
            }
        }
        for channel in [from, to] {
            if let Err(e) = self.api.join_conversation(channel).await {
                return self
                    .reply(
                        &context.response_url,
                        format!("Failed to join <#{}> - `{}`{}", channel, error_code(&e), ran),
                    )
                    .await;
            }
        }

        let members = self.api.conversation_members(from).await?;
        self.heartbeat(
            &format!(
                "<@{}> - {} members fetched from <#{}>! Adding to <#{}>",
                context.user_id,
                members.len(),
                from,
                to
            ),
            &[],
        )
        .await;

        self.invite_in_batches(to, &members).await;
        info!(from = %from, to = %to, members = members.len(), "Moved channel members");
        self.reply(
            &context.response_url,
            format!("Moved {} members from <#{}> to <#{}>", members.len(), from, to),
        )
        .await
    }

    /// Invite `users` to `channel`, waiting out rate limits. Other failures
    /// are reported and the next batch goes ahead.
    async fn invite_in_batches(&self, channel: &str, users: &[String]) {
        for batch in users.chunks(INVITE_BATCH) {
            let mut attempt = 0;
            loop {
                match self.api.invite_users(channel, batch).await {
                    Ok(()) => break,
                    Err(SlackError::RateLimited { retry_after_secs }) if attempt < INVITE_RETRIES => {
                        attempt += 1;
                        debug!(channel, retry_after_secs, attempt, "Invite rate limited");
                        tokio::time::sleep(Duration::from_secs(retry_after_secs)).await;
                    }
                    Err(e) if e.api_code() == Some("already_in_channel") => break,
                    Err(e) => {
                        warn!(channel, error = %e, "Failed to invite batch");
                        self.heartbeat(
                            &format!("Error inviting users to <#{}>: {}", channel, e),
                            &[],
                        )
                        .await;
                        break;
                    }
                }
            }
        }
    }

    /// "Create Mover" button.
    pub(super) async fn open_mover_setup(&self, payload: &BlockActionsPayload) -> SlackResult<()> {
        let view = setup_mover_view(&MoverTarget::Create, None, &[]);
        self.api.push_view(&payload.trigger_id, &view).await
    }

    /// "Edit Movers" button: the clicking user's movers.
    pub(super) async fn open_mover_picker(&self, payload: &BlockActionsPayload) -> SlackResult<()> {
        let mine: Vec<(String, String)> = self
            .store
            .movers()
            .await?
            .into_iter()
            .filter(|mover| mover.user == payload.user.id)
            .map(|mover| (mover.id, mover.name))
            .collect();
        self.api
            .push_view(&payload.trigger_id, &edit_movers_view(&mine))
            .await
    }

    /// Submission of the mover setup form.
    pub(super) async fn setup_mover(&self, payload: &ViewSubmissionPayload) -> SlackResult<()> {
        let user = &payload.user.id;
        let state = &payload.view.state;
        let target = MoverTarget::decode(&payload.view.private_metadata);

        let name = state
            .text(MOVER_NAME_ID, MOVER_NAME_ID)
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(UNNAMED_MOVER)
            .to_string();
        let channels = state.selected_channels(MOVER_CHANNELS_ID, MOVER_CHANNELS_ID);
        if channels.len() < 2 {
            return self
                .direct_message(user, "Please select at least two channels to set up a mover.")
                .await;
        }

        for channel in &channels {
            if !self.is_channel_manager(user, channel).await? {
                return self
                    .direct_message(
                        user,
                        "You must be a channel manager of all selected channels to set up migrations.",
                    )
                    .await;
            }
        }

        let editing = match &target {
            MoverTarget::Edit(id) => Some(id.as_str()),
            MoverTarget::Create => None,
        };
        let movers = self.store.movers().await?;
        let taken: Vec<String> = channels
            .iter()
            .filter(|channel| {
                movers
                    .iter()
                    .filter(|mover| Some(mover.id.as_str()) != editing)
                    .any(|mover| mover.contains(channel))
            })
            .map(|channel| format!("<#{}>", channel))
            .collect();
        if !taken.is_empty() {
            return self
                .direct_message(
                    user,
                    format!(
                        "These channels are already configured for migration: {}",
                        taken.join(", ")
                    ),
                )
                .await;
        }

        for channel in &channels {
            if let Err(e) = self.api.join_conversation(channel).await {
                warn!(channel = %channel, error = %e, "Failed to join mover channel");
                return self
                    .direct_message(
                        user,
                        format!(
                            "An unexpected error occurred while joining <#{}>. Please ensure the bot is invited to the channel and try again.",
                            channel
                        ),
                    )
                    .await;
            }
        }

        let mover = match editing {
            Some(id) => {
                let Some(mut mover) = self.store.mover(id).await? else {
                    return self
                        .direct_message(user, "That mover doesn't exist anymore. Try creating a new one!")
                        .await;
                };
                mover.name = name;
                mover.channels = channels;
                mover
            }
            None => MoverConfig::new(name, user, channels),
        };
        self.store.save_mover(&mover).await?;
        info!(id = %mover.id, channels = mover.channels.len(), "Mover saved");
        self.direct_message(user, "Your migration has been setup successfully :D")
            .await
    }

    /// Submission of the mover picker: open the chosen mover's form.
    pub(super) async fn edit_mover(&self, payload: &ViewSubmissionPayload) -> SlackResult<()> {
        let trigger_id = payload
            .trigger_id
            .as_deref()
            .ok_or_else(|| SlackError::InvalidPayload("Mover picker without trigger".to_string()))?;

        let chosen = payload
            .view
            .state
            .selected_option(MOVER_CONFIG_ID, MOVER_CONFIG_ID);
        let mover = match chosen {
            Some(id) => self.store.mover(id).await?,
            None => None,
        };
        let view = match mover.filter(|mover| mover.user == payload.user.id) {
            Some(mover) => setup_mover_view(
                &MoverTarget::Edit(mover.id.clone()),
                Some(&mover.name),
                &mover.channels,
            ),
            None => error_view("No config found", "That mover doesn't exist anymore."),
        };
        self.api.open_view(trigger_id, &view).await
    }

    /// Add someone who joined a mover channel to the rest of its channels.
    pub(super) async fn move_new_member(&self, event: &MemberJoinedChannelEvent) -> SlackResult<()> {
        let movers = self.store.movers().await?;
        let mut targets: Vec<&str> = Vec::new();
        for mover in movers.iter().filter(|mover| mover.contains(&event.channel)) {
            for channel in &mover.channels {
                if *channel != event.channel && !targets.contains(&channel.as_str()) {
                    targets.push(channel);
                }
            }
        }
        if targets.is_empty() {
            return Ok(());
        }

        let user = std::slice::from_ref(&event.user);
        let mut added = Vec::new();
        for channel in targets {
            match self.api.invite_users(channel, user).await {
                Ok(()) => added.push(format!("<#{}>", channel)),
                Err(e) if e.api_code() == Some("already_in_channel") => {
                    debug!(channel, user = %event.user, "Already a member");
                }
                Err(e) => {
                    warn!(channel, user = %event.user, error = %e, "Mover invite failed");
                    self.heartbeat(
                        &format!(
                            "Error inviting user {} to channel {}: {}",
                            event.user, channel, e
                        ),
                        &[],
                    )
                    .await;
                }
            }
        }

        if added.is_empty() {
            return Ok(());
        }
        info!(user = %event.user, channels = added.len(), "Moved new member");
        self.api
            .post_ephemeral(
                &event.channel,
                &event.user,
                &format!(
                    "hi! i've just added you to {}!\nyou should check them out :)",
                    added.join(", ")
                ),
            )
            .await
    }
}
