//! `/se info`: what Slack knows about a user or a channel.

use std::fmt::Write as _;

use tracing::warn;

use super::Handlers;
use crate::commands::{ChannelArg, CommandContext, UserArg};
use crate::error::SlackResult;

const NOT_AVAILABLE: &str = "N/A";

fn yes_no(flag: bool) -> &'static str {
    if flag { "yes" } else { "no" }
}

impl Handlers {
    /// Without arguments this describes the invoking user.
    pub(super) async fn info_command(
        &self,
        user: Option<UserArg>,
        channel: Option<ChannelArg>,
        context: &CommandContext,
    ) -> SlackResult<()> {
        let user = match (&user, &channel) {
            (None, None) => Some(UserArg::Id(context.user_id.clone())),
            _ => user,
        };

        let mut text = String::new();
        if let Some(user) = user {
            text.push_str(&self.user_info_section(&user).await);
        }
        if let Some(channel) = channel {
            if !text.is_empty() {
                text.push('\n');
            }
            text.push_str(&self.channel_info_section(&channel).await?);
        }

        self.reply_section(&context.response_url, text).await
    }

    async fn user_info_section(&self, user: &UserArg) -> String {
        let lookup = match user {
            UserArg::Id(id) => self.api.user_info(id).await,
            UserArg::Email(email) => self.api.user_by_email(email).await,
        };

        let info = match lookup {
            Ok(info) => info,
            Err(e) => {
                warn!(user = ?user, error = %e, "User lookup failed");
                let header = match user {
                    UserArg::Id(id) => format!("*User Info for <@{}>:*\n", id),
                    UserArg::Email(email) => format!("*User Info for {}:*\n", email),
                };
                return format!("{}- Could not fetch user info from Slack API.\n", header);
            }
        };

        let mut text = format!("*User Info for <@{}>:*\n", info.id);
        let _ = writeln!(
            text,
            "- :globe_with_meridians: *Timezone:* {}",
            info.tz.as_deref().unwrap_or(NOT_AVAILABLE)
        );
        let _ = writeln!(
            text,
            "- :slack: *Slack Email:* {}",
            info.profile.email.as_deref().unwrap_or(NOT_AVAILABLE)
        );
        let _ = writeln!(
            text,
            "- :slack: *Slack Username:* {}",
            info.name.as_deref().unwrap_or(NOT_AVAILABLE)
        );
        let _ = writeln!(text, "- :slack: *Slack ID:* {}", info.id);
        text
    }

    async fn channel_info_section(&self, channel: &ChannelArg) -> SlackResult<String> {
        let Some(id) = self.resolve_channel(channel).await? else {
            return Ok(format!(
                "*Channel Info for {}:*\n- Could not find that channel.\n",
                channel.display()
            ));
        };

        let mut text = format!("*Channel Info for <#{}>:*\n", id);
        let info = match self.api.conversation_info(&id).await {
            Ok(info) => info,
            Err(e) => {
                warn!(channel = %id, error = %e, "Channel lookup failed");
                text.push_str("- Could not fetch channel info from Slack API.\n");
                return Ok(text);
            }
        };

        let _ = writeln!(
            text,
            "- :hash: *Name:* {}",
            info.name.as_deref().unwrap_or(NOT_AVAILABLE)
        );
        let _ = writeln!(text, "- :id: *Channel ID:* {}", info.id);
        let _ = writeln!(text, "- :lock: *Private:* {}", yes_no(info.is_private));
        if info.is_archived {
            let _ = writeln!(text, "- :file_cabinet: *Archived:* yes");
        }
        match &info.creator {
            Some(creator) => {
                let _ = writeln!(text, "- :bust_in_silhouette: *Created by:* <@{}>", creator);
            }
            None => {
                let _ = writeln!(text, "- :bust_in_silhouette: *Created by:* {}", NOT_AVAILABLE);
            }
        }
        if let Some(members) = info.num_members {
            let _ = writeln!(text, "- :busts_in_silhouette: *Members:* {}", members);
        }
        Ok(text)
    }
}
