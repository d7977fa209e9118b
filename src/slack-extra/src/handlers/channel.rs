//! Joining newly created channels.

use tracing::{debug, info};

use super::Handlers;
use crate::config::Environment;
use crate::error::SlackResult;
use crate::events::ChannelCreatedEvent;

/// Ephemeral introduction sent to a channel's creator after joining.
pub const JOIN_GREETING: &str = "Hey! I provide useful features to improve your experience on Slack! If you don't want me here please bear in mind that several features may stop working. You can remove me using `/kick @Slack Extra`";

impl Handlers {
    /// Production instances join every new channel; others only join the
    /// maintainer's.
    fn should_join(&self, creator: &str) -> bool {
        self.environment == Environment::Production
            || self.maintainer_id.as_deref() == Some(creator)
    }

    pub(super) async fn join_channel(&self, event: &ChannelCreatedEvent) -> SlackResult<()> {
        let channel = &event.channel;
        if !self.should_join(&channel.creator) {
            debug!(channel = %channel.id, creator = %channel.creator, "Not joining new channel");
            return Ok(());
        }

        self.api.join_conversation(&channel.id).await?;
        info!(channel = %channel.id, name = %channel.name, "Joined new channel");
        self.api
            .post_ephemeral(&channel.id, &channel.creator, JOIN_GREETING)
            .await
    }
}
