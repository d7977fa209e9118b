//! Socket Mode envelopes and the payloads they carry.
//!
//! Three envelope kinds reach the handlers:
//! - `events_api` - workspace events (`channel_created`, `message`,
//!   `member_joined_channel`)
//! - `slash_commands` - the bot's slash command
//! - `interactive` - button clicks, modal submissions and shortcuts

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::commands::SlashCommandPayload;
use crate::error::{SlackError, SlackResult};

/// Workspace events the bot reacts to.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SlackEvent {
    /// A new channel was created.
    ChannelCreated(ChannelCreatedEvent),
    /// A message was posted, changed or deleted in a channel the bot is in.
    Message(MessageEvent),
    /// Someone joined a channel the bot is in.
    MemberJoinedChannel(MemberJoinedChannelEvent),
    /// Unknown event type (for forward compatibility).
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelCreatedEvent {
    pub channel: CreatedChannel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_ts: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatedChannel {
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// User who created the channel.
    pub creator: String,
}

/// A `message` event, with or without a subtype.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageEvent {
    pub channel: String,
    #[serde(default)]
    pub ts: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtype: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_ts: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    /// ts of the removed message, on `message_deleted`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_ts: Option<String>,
}

impl MessageEvent {
    /// `event_type` of the message's metadata.
    pub fn metadata_type(&self) -> Option<&str> {
        self.metadata.as_ref()?.get("event_type")?.as_str()
    }

    /// A reply inside a thread rather than a top-level message.
    pub fn is_thread_reply(&self) -> bool {
        self.thread_ts.as_deref().is_some_and(|thread| thread != self.ts)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberJoinedChannelEvent {
    pub user: String,
    pub channel: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inviter: Option<String>,
}

/// Socket Mode envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SocketModeEnvelope {
    /// Envelope ID for acknowledgment. Absent on `hello` and `disconnect`.
    #[serde(default)]
    pub envelope_id: String,
    /// Type of payload.
    #[serde(rename = "type")]
    pub envelope_type: String,
    /// Raw payload; its shape depends on `envelope_type`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accepts_response_payload: Option<bool>,
}

impl SocketModeEnvelope {
    fn payload_as<T: serde::de::DeserializeOwned>(&self) -> SlackResult<T> {
        let payload = self.payload.clone().ok_or_else(|| {
            SlackError::InvalidPayload(format!("{} envelope without payload", self.envelope_type))
        })?;
        Ok(serde_json::from_value(payload)?)
    }

    /// Payload of an `events_api` envelope.
    pub fn event_payload(&self) -> SlackResult<EventPayload> {
        self.payload_as()
    }

    /// Payload of a `slash_commands` envelope.
    pub fn slash_command(&self) -> SlackResult<SlashCommandPayload> {
        self.payload_as()
    }

    /// Payload of an `interactive` envelope.
    pub fn interactive(&self) -> SlackResult<InteractivePayload> {
        let payload = self.payload.as_ref().ok_or_else(|| {
            SlackError::InvalidPayload("interactive envelope without payload".to_string())
        })?;
        parse_interactive(payload)
    }
}

/// Event callback payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_app_id: Option<String>,
    /// The actual event.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(rename = "type")]
    pub payload_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_time: Option<u64>,
}

/// Socket Mode acknowledgment response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SocketModeAck {
    /// Envelope ID being acknowledged.
    pub envelope_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

impl SocketModeAck {
    pub fn new(envelope_id: impl Into<String>) -> Self {
        Self {
            envelope_id: envelope_id.into(),
            payload: None,
        }
    }

    /// Acknowledgment carrying a response, e.g. `response_action` errors for
    /// a modal submission.
    pub fn with_payload(envelope_id: impl Into<String>, payload: Value) -> Self {
        Self {
            envelope_id: envelope_id.into(),
            payload: Some(payload),
        }
    }
}

/// Parse a raw event from an `events_api` payload.
pub fn parse_event(payload: &EventPayload) -> SlackResult<SlackEvent> {
    let event_json = payload
        .event
        .as_ref()
        .ok_or_else(|| SlackError::InvalidPayload("Missing event field".to_string()))?;

    let event_type = event_json
        .get("type")
        .and_then(|t| t.as_str())
        .unwrap_or("unknown");

    debug!("Parsing event type: {}", event_type);

    match event_type {
        "channel_created" | "message" | "member_joined_channel" => {
            Ok(serde_json::from_value(event_json.clone())?)
        }
        _ => {
            debug!("Ignoring event type: {}", event_type);
            Ok(SlackEvent::Unknown)
        }
    }
}

/// User reference in interactive payloads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayloadUser {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayloadChannel {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// The message an action or shortcut was invoked on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayloadMessage {
    pub ts: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_ts: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    /// Set when an app posted the message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtype: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

/// One clicked element of a `block_actions` payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockAction {
    pub action_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockActionsPayload {
    pub user: PayloadUser,
    pub trigger_id: String,
    #[serde(default)]
    pub actions: Vec<BlockAction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<PayloadChannel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<PayloadMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_url: Option<String>,
}

impl BlockActionsPayload {
    /// The clicked element with `action_id`, if any.
    pub fn action(&self, action_id: &str) -> Option<&BlockAction> {
        self.actions.iter().find(|action| action.action_id == action_id)
    }
}

/// A submitted modal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmittedView {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub callback_id: String,
    #[serde(default)]
    pub private_metadata: String,
    #[serde(default)]
    pub state: ViewState,
}

/// `state.values`, keyed by block id then action id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ViewState {
    #[serde(default)]
    pub values: Value,
}

impl ViewState {
    /// Value of one input element.
    pub fn input(&self, block_id: &str, action_id: &str) -> Option<&Value> {
        self.values.get(block_id)?.get(action_id)
    }

    /// Typed text of a `plain_text_input`.
    pub fn text(&self, block_id: &str, action_id: &str) -> Option<&str> {
        self.input(block_id, action_id)?.get("value")?.as_str()
    }

    /// Channels picked in a `multi_channels_select`.
    pub fn selected_channels(&self, block_id: &str, action_id: &str) -> Vec<String> {
        self.input(block_id, action_id)
            .and_then(|input| input.get("selected_channels"))
            .and_then(Value::as_array)
            .map(|channels| {
                channels
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Value of the option picked in a `static_select`.
    pub fn selected_option(&self, block_id: &str, action_id: &str) -> Option<&str> {
        self.input(block_id, action_id)?
            .get("selected_option")?
            .get("value")?
            .as_str()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewSubmissionPayload {
    pub user: PayloadUser,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger_id: Option<String>,
    pub view: SubmittedView,
}

/// A global shortcut.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShortcutPayload {
    pub callback_id: String,
    pub trigger_id: String,
    pub user: PayloadUser,
}

/// A message shortcut.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageActionPayload {
    pub callback_id: String,
    pub trigger_id: String,
    pub user: PayloadUser,
    pub channel: PayloadChannel,
    pub message: PayloadMessage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_url: Option<String>,
}

/// Payloads delivered in `interactive` envelopes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InteractivePayload {
    BlockActions(BlockActionsPayload),
    ViewSubmission(ViewSubmissionPayload),
    Shortcut(ShortcutPayload),
    MessageAction(MessageActionPayload),
    #[serde(other)]
    Unknown,
}

/// Parse an interactive payload.
pub fn parse_interactive(payload: &Value) -> SlackResult<InteractivePayload> {
    let kind = payload
        .get("type")
        .and_then(Value::as_str)
        .unwrap_or("unknown");
    debug!("Parsing interactive payload: {}", kind);

    serde_json::from_value(payload.clone()).map_err(|e| {
        warn!("Malformed {} payload: {}", kind, e);
        SlackError::InvalidPayload(format!("{}: {}", kind, e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_socket_mode_ack() {
        let ack = SocketModeAck::new("env-123");
        assert_eq!(ack.envelope_id, "env-123");
        assert!(ack.payload.is_none());
        assert_eq!(
            serde_json::to_value(&ack).unwrap(),
            json!({"envelope_id": "env-123"})
        );

        let ack_with_payload =
            SocketModeAck::with_payload("env-456", json!({"response_action": "clear"}));
        assert_eq!(ack_with_payload.envelope_id, "env-456");
        assert!(ack_with_payload.payload.is_some());
    }

    #[test]
    fn test_hello_envelope_has_no_id() {
        let envelope: SocketModeEnvelope =
            serde_json::from_str(r#"{"type": "hello", "num_connections": 1}"#).unwrap();
        assert_eq!(envelope.envelope_type, "hello");
        assert!(envelope.envelope_id.is_empty());
    }

    #[test]
    fn test_parse_channel_created() {
        let payload = EventPayload {
            token: None,
            team_id: Some("T1".to_string()),
            api_app_id: None,
            event: Some(json!({
                "type": "channel_created",
                "channel": {"id": "C024BE91L", "name": "fun", "created": 1360782804, "creator": "U024BE7LH"}
            })),
            payload_type: Some("event_callback".to_string()),
            event_id: None,
            event_time: None,
        };

        match parse_event(&payload).unwrap() {
            SlackEvent::ChannelCreated(event) => {
                assert_eq!(event.channel.id, "C024BE91L");
                assert_eq!(event.channel.creator, "U024BE7LH");
            }
            other => panic!("Expected ChannelCreated event, got {:?}", other),
        }
    }

    fn event(event: Value) -> EventPayload {
        EventPayload {
            token: None,
            team_id: None,
            api_app_id: None,
            event: Some(event),
            payload_type: Some("event_callback".to_string()),
            event_id: None,
            event_time: None,
        }
    }

    #[test]
    fn test_parse_message_events() {
        let payload = event(json!({
            "type": "message",
            "channel": "C1",
            "user": "U1",
            "ts": "1.3",
            "thread_ts": "1.1",
            "metadata": {"event_type": "anchor", "event_payload": {"channel": "C1"}}
        }));
        let SlackEvent::Message(message) = parse_event(&payload).unwrap() else {
            panic!("expected a message event");
        };
        assert!(message.is_thread_reply());
        assert_eq!(message.metadata_type(), Some("anchor"));

        let payload = event(json!({
            "type": "message",
            "subtype": "message_deleted",
            "channel": "C1",
            "ts": "1.9",
            "deleted_ts": "1.2",
            "hidden": true
        }));
        let SlackEvent::Message(message) = parse_event(&payload).unwrap() else {
            panic!("expected a message event");
        };
        assert_eq!(message.subtype.as_deref(), Some("message_deleted"));
        assert_eq!(message.deleted_ts.as_deref(), Some("1.2"));
        assert!(!message.is_thread_reply());
    }

    #[test]
    fn test_parse_member_joined_channel() {
        let payload = event(json!({
            "type": "member_joined_channel",
            "user": "U5",
            "channel": "C2",
            "channel_type": "C",
            "team": "T1"
        }));
        match parse_event(&payload).unwrap() {
            SlackEvent::MemberJoinedChannel(joined) => {
                assert_eq!(joined.user, "U5");
                assert_eq!(joined.channel, "C2");
            }
            other => panic!("Expected MemberJoinedChannel, got {:?}", other),
        }
    }

    #[test]
    fn test_view_state_helpers() {
        let state: ViewState = serde_json::from_value(json!({"values": {
            "name": {"name": {"type": "plain_text_input", "value": "pair"}},
            "channels": {"channels": {"type": "multi_channels_select", "selected_channels": ["C1", "C2"]}},
            "config": {"config": {"type": "static_select", "selected_option": {"value": "a1"}}}
        }}))
        .unwrap();

        assert_eq!(state.text("name", "name"), Some("pair"));
        assert_eq!(state.selected_channels("channels", "channels"), vec!["C1", "C2"]);
        assert_eq!(state.selected_option("config", "config"), Some("a1"));
        assert!(state.selected_channels("name", "missing").is_empty());
    }

    #[test]
    fn test_parse_event_unknown_and_missing() {
        let mut payload = EventPayload {
            token: None,
            team_id: None,
            api_app_id: None,
            event: Some(json!({"type": "reaction_added"})),
            payload_type: None,
            event_id: None,
            event_time: None,
        };
        assert!(matches!(parse_event(&payload).unwrap(), SlackEvent::Unknown));

        payload.event = None;
        assert!(matches!(
            parse_event(&payload),
            Err(SlackError::InvalidPayload(_))
        ));
    }

    #[test]
    fn test_envelope_slash_command() {
        let envelope: SocketModeEnvelope = serde_json::from_value(json!({
            "envelope_id": "e1",
            "type": "slash_commands",
            "payload": {
                "team_id": "T1",
                "channel_id": "C1",
                "user_id": "U1",
                "command": "/se",
                "text": "spoiler hi",
                "response_url": "https://hooks.slack.com/commands/1",
                "trigger_id": "t1"
            }
        }))
        .unwrap();

        let command = envelope.slash_command().unwrap();
        assert_eq!(command.command, "/se");
        assert_eq!(command.text, "spoiler hi");
    }

    #[test]
    fn test_parse_block_actions() {
        let payload = parse_interactive(&json!({
            "type": "block_actions",
            "user": {"id": "U1", "username": "amber"},
            "trigger_id": "trig",
            "channel": {"id": "C1", "name": "lounge"},
            "message": {"ts": "1700000000.000100", "type": "message"},
            "actions": [{"action_id": "view_spoiler", "block_id": "b", "value": "db", "type": "button"}]
        }))
        .unwrap();

        match payload {
            InteractivePayload::BlockActions(actions) => {
                assert_eq!(actions.user.id, "U1");
                assert_eq!(actions.actions[0].action_id, "view_spoiler");
                assert_eq!(actions.actions[0].value.as_deref(), Some("db"));
                assert_eq!(actions.message.unwrap().ts, "1700000000.000100");
            }
            other => panic!("Expected BlockActions, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_view_submission_state() {
        let payload = parse_interactive(&json!({
            "type": "view_submission",
            "user": {"id": "U1"},
            "view": {
                "id": "V1",
                "callback_id": "create_spoiler",
                "private_metadata": "C1;1700000000.000100",
                "state": {"values": {
                    "spoiler_input": {"spoiler_input": {"type": "rich_text_input", "rich_text_value": {"type": "rich_text"}}}
                }}
            }
        }))
        .unwrap();

        match payload {
            InteractivePayload::ViewSubmission(submission) => {
                assert_eq!(submission.view.callback_id, "create_spoiler");
                let input = submission.view.state.input("spoiler_input", "spoiler_input");
                assert_eq!(input.unwrap()["rich_text_value"]["type"], "rich_text");
                assert!(submission.view.state.input("spoiler_files", "spoiler_files").is_none());
            }
            other => panic!("Expected ViewSubmission, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_message_action_and_unknown() {
        let payload = parse_interactive(&json!({
            "type": "message_action",
            "callback_id": "spoiler",
            "trigger_id": "trig",
            "user": {"id": "U1"},
            "channel": {"id": "C1"},
            "message": {"ts": "1.2"}
        }))
        .unwrap();
        assert!(matches!(payload, InteractivePayload::MessageAction(_)));

        let payload = parse_interactive(&json!({"type": "view_closed"})).unwrap();
        assert!(matches!(payload, InteractivePayload::Unknown));

        assert!(parse_interactive(&json!({"type": "block_actions"})).is_err());
    }
}
