//! `/se group`: joining and leaving user groups.

use tracing::{info, warn};

use super::{Handlers, error_code};
use crate::commands::{CommandContext, GroupAction};
use crate::error::SlackResult;

impl Handlers {
    pub(super) async fn group_command(
        &self,
        action: GroupAction,
        group: &str,
        context: &CommandContext,
    ) -> SlackResult<()> {
        let ran = context.ran();
        let user = &context.user_id;

        let mut members = match self.api.usergroup_members(group).await {
            Ok(members) => members,
            Err(e) => {
                warn!(group, error = %e, "Failed to list group members");
                return self
                    .reply(
                        &context.response_url,
                        format!("Error fetching group members: {}{}", error_code(&e), ran),
                    )
                    .await;
            }
        };
        let is_member = members.iter().any(|member| member == user);

        let reply = match action {
            GroupAction::Join if is_member => {
                format!("you're already in <!subteam^{}>!{}", group, ran)
            }
            GroupAction::Join => {
                members.push(user.clone());
                match self.api.update_usergroup(group, &members).await {
                    Ok(()) => {
                        info!(group, user = %user, "Added user to group");
                        format!("i just added you to <!subteam^{}>!", group)
                    }
                    Err(e) => format!("Error adding you to the group: {}{}", error_code(&e), ran),
                }
            }
            GroupAction::Leave if !is_member => {
                format!("how do you expect to leave a group you're not in? :p{}", ran)
            }
            GroupAction::Leave => {
                members.retain(|member| member != user);
                match self.api.update_usergroup(group, &members).await {
                    Ok(()) => {
                        info!(group, user = %user, "Removed user from group");
                        format!("just removed you from <!subteam^{}> :)", group)
                    }
                    Err(e) => {
                        format!("Error removing you from the group: {}{}", error_code(&e), ran)
                    }
                }
            }
        };

        self.reply(&context.response_url, reply).await
    }
}
