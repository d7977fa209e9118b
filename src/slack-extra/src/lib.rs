//! Slack Extra: a Slack workspace bot.
//!
//! This crate provides:
//! - Spoilers: `||text||` hidden behind a "View spoiler" button, from the
//!   slash command (plain mrkdwn) or from a modal (rich text and files)
//! - `info`, `group`, `anchor` and `move` sub-commands, the "Delete message"
//!   shortcut, and movers that follow `member_joined_channel`
//! - A Socket Mode bot that acknowledges and dispatches events, slash
//!   commands and interactive payloads
//! - OAuth routes for workspace installation
//!
//! # Architecture
//!
//! [`SlackExtraBot`] owns the WebSocket connection and hands every payload to
//! [`Handlers`], which talk to Slack through the [`SlackApi`] trait and keep
//! spoilers, anchors and movers in a [`store::Store`]. The rich-text splitter in
//! [`spoiler`] is pure and has no I/O.
//!
//! # Example
//!
//! ```rust,ignore
//! use slack_extra::{SlackConfig, SlackExtraBot};
//!
//! let config = SlackConfig::from_env()?;
//! let bot = SlackExtraBot::new(config)?;
//! bot.start().await?;
//! ```
//!
//! # Configuration
//!
//! Required environment variables:
//! - `SLACK_BOT_TOKEN` - Bot OAuth token (xoxb-...)
//! - `SLACK_APP_TOKEN` - App-level token for Socket Mode (xapp-...)
//! - `SLACK_SIGNING_SECRET` - Signing secret for request verification
//!
//! Optional:
//! - `SLACK_CLIENT_ID`, `SLACK_CLIENT_SECRET`, `SLACK_REDIRECT_URI` - OAuth flow
//! - `SLACK_EXTRA_ENVIRONMENT` - `production` answers `/se`, anything else `/dev-se`
//! - `SLACK_EXTRA_DATA_DIR` - where spoilers, anchors and movers are kept
//! - `SLACK_EXTRA_MAINTAINER_ID`, `SLACK_EXTRA_HEARTBEAT_CHANNEL`

pub mod api;
pub mod bot;
pub mod commands;
pub mod config;
pub mod error;
pub mod events;
pub mod handlers;
pub mod mentions;
pub mod messages;
pub mod oauth;
pub mod spoiler;
pub mod store;

// Re-export main types
pub use api::{SlackApi, SlackClient};
pub use bot::SlackExtraBot;
pub use config::{Environment, SlackConfig};
pub use error::{SlackError, SlackResult};
pub use events::{InteractivePayload, SlackEvent};
pub use handlers::Handlers;
pub use messages::{SlackMessageBuilder, SlackView};
pub use spoiler::{SpoilerVariants, split_spoilers};
