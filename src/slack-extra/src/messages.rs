//! Block Kit messages and modal views.
//!
//! Provides:
//! - Typed blocks and elements for what the bot posts and opens
//! - `SlackMessageContent` for `chat.postMessage`
//! - The spoiler modals (create, reveal), the anchor and mover modals, and
//!   the error modal

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{SlackError, SlackResult};

/// Callback id of the create-spoiler modal.
pub const CREATE_SPOILER_CALLBACK: &str = "create_spoiler";
/// Block and action id of the rich-text input.
pub const SPOILER_INPUT_ID: &str = "spoiler_input";
/// Block and action id of the file input.
pub const SPOILER_FILES_ID: &str = "spoiler_files";
/// Action id of every "View spoiler" button.
pub const VIEW_SPOILER_ACTION: &str = "view_spoiler";
/// Button value: revealed content lives in the spoiler store.
pub const REVEAL_FROM_STORE: &str = "db";
/// Button value: revealed content lives in the message metadata.
pub const REVEAL_FROM_METADATA: &str = "metadata";
/// Message metadata event type of plain-text spoilers.
pub const SPOILER_EVENT_TYPE: &str = "spoiler";
/// Callback id of the anchor configuration modal.
pub const CONFIGURE_ANCHOR_CALLBACK: &str = "configure_anchor";
/// Block and action id of the anchor content input.
pub const ANCHOR_INPUT_ID: &str = "anchor_input";
/// Message metadata event type of posted anchors.
pub const ANCHOR_EVENT_TYPE: &str = "anchor";
pub const CREATE_MOVER_ACTION: &str = "create_mover";
pub const EDIT_MOVERS_ACTION: &str = "edit_movers";
/// Callback id of the mover setup modal.
pub const SETUP_MOVER_CALLBACK: &str = "setup_move";
/// Callback id of the mover picker modal.
pub const EDIT_MOVER_CALLBACK: &str = "edit_move";
pub const MOVER_NAME_ID: &str = "name";
pub const MOVER_CHANNELS_ID: &str = "channels";
pub const MOVER_CONFIG_ID: &str = "config";

/// Slack Block Kit block types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SlackBlock {
    Header { text: SlackTextObject },
    Section {
        text: SlackTextObject,
        #[serde(skip_serializing_if = "Option::is_none")]
        accessory: Option<SlackBlockElement>,
        #[serde(skip_serializing_if = "Option::is_none")]
        fields: Option<Vec<SlackTextObject>>,
    },
    Divider {},
    /// Context block (small text/images).
    Context { elements: Vec<SlackContextElement> },
    /// Actions block (buttons, menus).
    Actions { elements: Vec<SlackBlockElement> },
    /// Input block (modals only).
    Input {
        #[serde(skip_serializing_if = "Option::is_none")]
        block_id: Option<String>,
        label: SlackTextObject,
        element: SlackInputElement,
        #[serde(skip_serializing_if = "Option::is_none")]
        optional: Option<bool>,
    },
    /// User-authored rich text, carried as raw elements.
    RichText {
        #[serde(skip_serializing_if = "Option::is_none")]
        block_id: Option<String>,
        elements: Vec<Value>,
    },
}

impl SlackBlock {
    /// Blocks from a rich-text document: one block, or a list of them.
    pub fn from_document(document: &Value) -> SlackResult<Vec<SlackBlock>> {
        let parse = |value: &Value| {
            serde_json::from_value::<SlackBlock>(value.clone())
                .map_err(|e| SlackError::InvalidPayload(format!("Not a block: {}", e)))
        };
        match document {
            Value::Array(items) => items.iter().map(parse).collect(),
            single => Ok(vec![parse(single)?]),
        }
    }
}

/// Slack text object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlackTextObject {
    #[serde(rename = "type")]
    pub text_type: String,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emoji: Option<bool>,
}

impl SlackTextObject {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text_type: "plain_text".to_string(),
            text: text.into(),
            emoji: Some(true),
        }
    }

    pub fn mrkdwn(text: impl Into<String>) -> Self {
        Self {
            text_type: "mrkdwn".to_string(),
            text: text.into(),
            emoji: None,
        }
    }
}

/// Slack context element (for context blocks).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SlackContextElement {
    PlainText { text: String },
    Mrkdwn { text: String },
    Image { image_url: String, alt_text: String },
}

/// Slack block element (buttons, etc.).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SlackBlockElement {
    Button {
        text: SlackTextObject,
        action_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        value: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        url: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        style: Option<String>,
    },
}

impl SlackBlockElement {
    pub fn button(
        text: impl Into<String>,
        action_id: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        SlackBlockElement::Button {
            text: SlackTextObject::plain(text),
            action_id: action_id.into(),
            value: Some(value.into()),
            url: None,
            style: None,
        }
    }

    /// A button without a value.
    pub fn action(text: impl Into<String>, action_id: impl Into<String>) -> Self {
        SlackBlockElement::Button {
            text: SlackTextObject::plain(text),
            action_id: action_id.into(),
            value: None,
            url: None,
            style: None,
        }
    }

    /// Render as a `primary` button.
    pub fn primary(self) -> Self {
        match self {
            SlackBlockElement::Button {
                text,
                action_id,
                value,
                url,
                ..
            } => SlackBlockElement::Button {
                text,
                action_id,
                value,
                url,
                style: Some("primary".to_string()),
            },
        }
    }
}

/// One choice of a select menu.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlackOption {
    pub text: SlackTextObject,
    pub value: String,
}

impl SlackOption {
    pub fn new(text: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            text: SlackTextObject::plain(text),
            value: value.into(),
        }
    }
}

/// Elements of input blocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SlackInputElement {
    RichTextInput {
        action_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        placeholder: Option<SlackTextObject>,
    },
    FileInput {
        action_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        max_files: Option<u32>,
    },
    PlainTextInput {
        action_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        initial_value: Option<String>,
    },
    MultiChannelsSelect {
        action_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        initial_channels: Option<Vec<String>>,
    },
    StaticSelect {
        action_id: String,
        options: Vec<SlackOption>,
    },
}

/// Message metadata attached to a posted message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageMetadata {
    pub event_type: String,
    pub event_payload: Value,
}

/// Slack message content with blocks.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SlackMessageContent {
    /// Fallback text for notifications.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocks: Option<Vec<SlackBlock>>,
    /// Thread timestamp (for replies).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_ts: Option<String>,
    /// Whether to also send to channel when in thread.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_broadcast: Option<bool>,
    /// Display name to post under instead of the bot's.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<MessageMetadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unfurl_links: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unfurl_media: Option<bool>,
}

impl SlackMessageContent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_blocks(mut self, blocks: Vec<SlackBlock>) -> Self {
        self.blocks = Some(blocks);
        self
    }

    /// Set thread timestamp (for replies).
    pub fn in_thread(mut self, thread_ts: impl Into<String>) -> Self {
        self.thread_ts = Some(thread_ts.into());
        self
    }

    /// Broadcast to channel as well as thread.
    pub fn broadcast(mut self) -> Self {
        self.reply_broadcast = Some(true);
        self
    }

    /// Post under someone else's name and avatar.
    pub fn as_user(mut self, username: impl Into<String>, icon_url: Option<String>) -> Self {
        self.username = Some(username.into());
        self.icon_url = icon_url;
        self
    }

    pub fn with_metadata(mut self, event_type: impl Into<String>, event_payload: Value) -> Self {
        self.metadata = Some(MessageMetadata {
            event_type: event_type.into(),
            event_payload,
        });
        self
    }

    pub fn unfurl(mut self) -> Self {
        self.unfurl_links = Some(true);
        self.unfurl_media = Some(true);
        self
    }
}

/// A modal view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlackView {
    #[serde(rename = "type")]
    pub view_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callback_id: Option<String>,
    pub title: SlackTextObject,
    pub blocks: Vec<SlackBlock>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submit: Option<SlackTextObject>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub close: Option<SlackTextObject>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_metadata: Option<String>,
}

impl SlackView {
    /// A modal with the given title (at most 24 characters).
    pub fn modal(title: impl Into<String>) -> Self {
        Self {
            view_type: "modal".to_string(),
            callback_id: None,
            title: SlackTextObject::plain(title),
            blocks: Vec::new(),
            submit: None,
            close: None,
            private_metadata: None,
        }
    }

    pub fn callback_id(mut self, callback_id: impl Into<String>) -> Self {
        self.callback_id = Some(callback_id.into());
        self
    }

    pub fn block(mut self, block: SlackBlock) -> Self {
        self.blocks.push(block);
        self
    }

    pub fn blocks(mut self, blocks: impl IntoIterator<Item = SlackBlock>) -> Self {
        self.blocks.extend(blocks);
        self
    }

    pub fn submit(mut self, text: impl Into<String>) -> Self {
        self.submit = Some(SlackTextObject::plain(text));
        self
    }

    pub fn close(mut self, text: impl Into<String>) -> Self {
        self.close = Some(SlackTextObject::plain(text));
        self
    }

    pub fn private_metadata(mut self, metadata: impl Into<String>) -> Self {
        self.private_metadata = Some(metadata.into());
        self
    }
}

/// Builder for messages made of simple blocks.
pub struct SlackMessageBuilder {
    blocks: Vec<SlackBlock>,
    fallback_text: Option<String>,
}

impl SlackMessageBuilder {
    pub fn new() -> Self {
        Self {
            blocks: Vec::new(),
            fallback_text: None,
        }
    }

    /// Set fallback text for notifications.
    pub fn fallback(mut self, text: impl Into<String>) -> Self {
        self.fallback_text = Some(text.into());
        self
    }

    pub fn header(mut self, text: impl Into<String>) -> Self {
        self.blocks.push(header(text));
        self
    }

    /// Add a section with mrkdwn text.
    pub fn section(mut self, text: impl Into<String>) -> Self {
        self.blocks.push(section(text));
        self
    }

    /// Add a mrkdwn section with a button beside it.
    pub fn section_with_button(mut self, text: impl Into<String>, button: SlackBlockElement) -> Self {
        self.blocks.push(SlackBlock::Section {
            text: SlackTextObject::mrkdwn(text),
            accessory: Some(button),
            fields: None,
        });
        self
    }

    pub fn divider(mut self) -> Self {
        self.blocks.push(SlackBlock::Divider {});
        self
    }

    pub fn context(mut self, text: impl Into<String>) -> Self {
        self.blocks.push(context(text));
        self
    }

    pub fn actions(mut self, elements: Vec<SlackBlockElement>) -> Self {
        self.blocks.push(SlackBlock::Actions { elements });
        self
    }

    /// Append arbitrary blocks.
    pub fn blocks(mut self, blocks: impl IntoIterator<Item = SlackBlock>) -> Self {
        self.blocks.extend(blocks);
        self
    }

    pub fn build(self) -> SlackMessageContent {
        SlackMessageContent {
            text: self.fallback_text,
            blocks: Some(self.blocks),
            ..Default::default()
        }
    }
}

impl Default for SlackMessageBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn header(text: impl Into<String>) -> SlackBlock {
    SlackBlock::Header {
        text: SlackTextObject::plain(text),
    }
}

/// A mrkdwn section.
pub fn section(text: impl Into<String>) -> SlackBlock {
    SlackBlock::Section {
        text: SlackTextObject::mrkdwn(text),
        accessory: None,
        fields: None,
    }
}

fn context(text: impl Into<String>) -> SlackBlock {
    SlackBlock::Context {
        elements: vec![SlackContextElement::Mrkdwn { text: text.into() }],
    }
}

/// Where a spoiler created from the modal is posted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpoilerTarget {
    pub channel: String,
    pub thread_ts: Option<String>,
}

impl SpoilerTarget {
    pub fn channel(channel: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            thread_ts: None,
        }
    }

    pub fn thread(channel: impl Into<String>, thread_ts: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            thread_ts: Some(thread_ts.into()),
        }
    }

    /// `channel` or `channel;thread_ts`.
    pub fn encode(&self) -> String {
        match &self.thread_ts {
            Some(ts) => format!("{};{}", self.channel, ts),
            None => self.channel.clone(),
        }
    }

    /// Inverse of [`encode`](Self::encode). An empty or `None` thread part
    /// means no thread.
    pub fn decode(metadata: &str) -> Self {
        match metadata.split_once(';') {
            Some((channel, ts)) if !ts.is_empty() && ts != "None" => Self::thread(channel, ts),
            Some((channel, _)) => Self::channel(channel),
            None => Self::channel(metadata),
        }
    }
}

/// Where an anchor configuration modal applies, carried in
/// `private_metadata` as `channel|create` or `channel|edit`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnchorTarget {
    pub channel: String,
    /// Whether a configuration already exists.
    pub editing: bool,
}

impl AnchorTarget {
    pub fn encode(&self) -> String {
        let mode = if self.editing { "edit" } else { "create" };
        format!("{}|{}", self.channel, mode)
    }

    pub fn decode(metadata: &str) -> Option<Self> {
        let (channel, mode) = metadata.split_once('|')?;
        let editing = match mode {
            "edit" => true,
            "create" => false,
            _ => return None,
        };
        Some(Self {
            channel: channel.to_string(),
            editing,
        })
    }
}

/// What a mover setup modal does on submit: `create` or `edit:<id>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoverTarget {
    Create,
    Edit(String),
}

impl MoverTarget {
    pub fn encode(&self) -> String {
        match self {
            MoverTarget::Create => "create".to_string(),
            MoverTarget::Edit(id) => format!("edit:{}", id),
        }
    }

    pub fn decode(metadata: &str) -> Self {
        match metadata.strip_prefix("edit:") {
            Some(id) if !id.is_empty() => MoverTarget::Edit(id.to_string()),
            _ => MoverTarget::Create,
        }
    }
}

/// The "Send Spoiler" modal.
pub fn create_spoiler_view(target: &SpoilerTarget) -> SlackView {
    SlackView::modal("Send Spoiler 👀")
        .callback_id(CREATE_SPOILER_CALLBACK)
        .block(section(
            "Please wrap the phrases you want spoilered in `||` (double vertical bars). For example, `This is a ||spoiler||.`",
        ))
        .block(SlackBlock::Input {
            block_id: Some(SPOILER_INPUT_ID.to_string()),
            label: SlackTextObject::plain("Text"),
            element: SlackInputElement::RichTextInput {
                action_id: SPOILER_INPUT_ID.to_string(),
                placeholder: Some(SlackTextObject::plain(
                    "did you know? orpheus loves ||heidi||!",
                )),
            },
            optional: None,
        })
        .block(SlackBlock::Input {
            block_id: Some(SPOILER_FILES_ID.to_string()),
            label: SlackTextObject::plain("Files!"),
            element: SlackInputElement::FileInput {
                action_id: SPOILER_FILES_ID.to_string(),
                max_files: None,
            },
            optional: Some(true),
        })
        .private_metadata(target.encode())
        .submit("Send Spoiler")
        .close("Cancel")
}

/// The reveal modal: revealed content plus who spoilered it.
pub fn reveal_view(content: Vec<SlackBlock>, poster: &str) -> SlackView {
    SlackView::modal("Spoiler 👀")
        .blocks(content)
        .block(context(format!("spoilered by <@{}>", poster)))
        .close("Close")
}

/// Reveal modal for plain mrkdwn text.
pub fn reveal_text_view(text: &str, poster: &str) -> SlackView {
    reveal_view(vec![section(text)], poster)
}

/// The anchor configuration modal. `enabled` is the current state, `None`
/// when the channel has no anchor yet.
pub fn configure_anchor_view(channel: &str, enabled: Option<bool>) -> SlackView {
    let status = match enabled {
        Some(true) => ":neodog: Anchor is enabled for this channel!".to_string(),
        Some(false) => ":neodog: Anchor is disabled for this channel!".to_string(),
        None => ":neodog: Anchor is not yet configured for this channel.".to_string(),
    };
    let target = AnchorTarget {
        channel: channel.to_string(),
        editing: enabled.is_some(),
    };

    SlackView::modal("Anchor Configuration")
        .callback_id(CONFIGURE_ANCHOR_CALLBACK)
        .block(section(format!(
            "_You are editing the Anchor configuration for <#{}>._",
            channel
        )))
        .block(SlackBlock::Divider {})
        .block(section(status))
        .block(SlackBlock::Input {
            block_id: Some(ANCHOR_INPUT_ID.to_string()),
            label: SlackTextObject::plain("Anchored message content"),
            element: SlackInputElement::RichTextInput {
                action_id: ANCHOR_INPUT_ID.to_string(),
                placeholder: Some(SlackTextObject::plain(
                    "deep at the bottom of the ocean lies....",
                )),
            },
            optional: None,
        })
        .private_metadata(target.encode())
        .submit(if target.editing { "Edit" } else { "Create" })
        .close("Cancel")
}

/// Landing modal of `/se move` without channels.
pub fn mover_home_view() -> SlackView {
    SlackView::modal("Manage Auto Movers")
        .block(section("Setup automatic moving channels here!"))
        .block(SlackBlock::Actions {
            elements: vec![
                SlackBlockElement::action("Create Mover", CREATE_MOVER_ACTION).primary(),
                SlackBlockElement::action("Edit Movers", EDIT_MOVERS_ACTION),
            ],
        })
        .close("Nevermind")
}

/// Mover setup form, prefilled when editing.
pub fn setup_mover_view(target: &MoverTarget, name: Option<&str>, channels: &[String]) -> SlackView {
    SlackView::modal("Setup Mover")
        .callback_id(SETUP_MOVER_CALLBACK)
        .block(section(
            "Users who join any of the channels you select will be added to all other selected channels automatically. You must be a workspace admin or channel manager of all selected channels to set this up.",
        ))
        .block(SlackBlock::Input {
            block_id: Some(MOVER_NAME_ID.to_string()),
            label: SlackTextObject::plain("Name"),
            element: SlackInputElement::PlainTextInput {
                action_id: MOVER_NAME_ID.to_string(),
                initial_value: name.map(str::to_string),
            },
            optional: None,
        })
        .block(SlackBlock::Input {
            block_id: Some(MOVER_CHANNELS_ID.to_string()),
            label: SlackTextObject::plain("Channels"),
            element: SlackInputElement::MultiChannelsSelect {
                action_id: MOVER_CHANNELS_ID.to_string(),
                initial_channels: (!channels.is_empty()).then(|| channels.to_vec()),
            },
            optional: None,
        })
        .private_metadata(target.encode())
        .submit("Setup!")
        .close("Cancel")
}

/// Picker over the user's movers as `(id, name)` pairs.
pub fn edit_movers_view(movers: &[(String, String)]) -> SlackView {
    let view = SlackView::modal("Edit Movers")
        .block(section("You can edit your existing auto move configs here!"))
        .close("Back");

    if movers.is_empty() {
        return view.block(SlackBlock::Actions {
            elements: vec![SlackBlockElement::action(
                "No configs found! Create one?",
                CREATE_MOVER_ACTION,
            )],
        });
    }

    view.callback_id(EDIT_MOVER_CALLBACK)
        .block(SlackBlock::Input {
            block_id: Some(MOVER_CONFIG_ID.to_string()),
            label: SlackTextObject::plain("Config"),
            element: SlackInputElement::StaticSelect {
                action_id: MOVER_CONFIG_ID.to_string(),
                options: movers
                    .iter()
                    .map(|(id, name)| SlackOption::new(name, id))
                    .collect(),
            },
            optional: None,
        })
        .submit("Edit!")
}

/// A modal reporting a failure.
pub fn error_view(title: &str, body: &str) -> SlackView {
    SlackView::modal("Slack Extra")
        .block(header(format!("wuh woh - {} :rac_ded:", title)))
        .block(section(body))
        .close("Close")
}
