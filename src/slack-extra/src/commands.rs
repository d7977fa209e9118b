//! Slash command handling.
//!
//! The bot answers to a single slash command (`/se`, or `/dev-se` outside
//! production) whose first word picks a sub-command:
//! - `info [user] [channel]` - what Slack knows about a user or channel
//! - `spoiler [text]` - send text behind a spoiler button, or open the
//!   spoiler modal when no text is given
//! - `anchor [enable|disable]` - keep a message at the bottom of the channel
//! - `group <join|leave> <group>` - join or leave a user group
//! - `move [start] [end]` - copy a channel's members into another, or set
//!   up automatic movers
//!
//! Anything else gets the help text. Replies go out through `response_url`.

use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::error::{SlackError, SlackResult};
use crate::mentions::{
    assign_tokens, extract_mailto, looks_like_email, normalize_channel, normalize_subteam,
    normalize_user,
};

/// Slack slash command payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlashCommandPayload {
    /// Command token (deprecated, use signing secret instead).
    #[serde(default)]
    pub token: String,
    pub team_id: String,
    #[serde(default)]
    pub team_domain: String,
    /// Enterprise ID (for Enterprise Grid).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enterprise_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enterprise_name: Option<String>,
    /// Channel ID where command was invoked.
    pub channel_id: String,
    #[serde(default)]
    pub channel_name: String,
    /// User ID who invoked the command.
    pub user_id: String,
    #[serde(default)]
    pub user_name: String,
    /// The command (e.g., "/se").
    pub command: String,
    /// Text after the command.
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub api_app_id: String,
    #[serde(default)]
    pub is_enterprise_install: bool,
    /// URL for delayed responses.
    pub response_url: String,
    /// Trigger ID for opening modals.
    pub trigger_id: String,
}

/// Response type for slash command responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ResponseType {
    /// Only visible to the user who invoked the command.
    #[default]
    Ephemeral,
    /// Visible to everyone in the channel.
    InChannel,
}

/// Delayed response sent via response_url.
///
/// Can be sent up to 30 minutes after the original command.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DelayedResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_type: Option<ResponseType>,
    /// Whether to replace the original message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replace_original: Option<bool>,
    /// Whether to delete the original message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delete_original: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocks: Option<serde_json::Value>,
}

impl DelayedResponse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_blocks(mut self, blocks: serde_json::Value) -> Self {
        self.blocks = Some(blocks);
        self
    }

    pub fn in_channel(mut self) -> Self {
        self.response_type = Some(ResponseType::InChannel);
        self
    }

    pub fn replace_original(mut self) -> Self {
        self.replace_original = Some(true);
        self
    }

    pub fn delete_original(mut self) -> Self {
        self.delete_original = Some(true);
        self
    }
}

/// Send a delayed response to the response_url.
pub async fn send_delayed_response(
    client: &reqwest::Client,
    response_url: &str,
    response: &DelayedResponse,
) -> SlackResult<()> {
    debug!("Sending delayed response to: {}", response_url);

    let resp = client.post(response_url).json(response).send().await?;

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        error!("Failed to send delayed response: {} - {}", status, body);
        return Err(SlackError::Api {
            code: format!("http_{}", status.as_u16()),
            message: format!("Failed to send delayed response: {}", body),
        });
    }

    debug!("Delayed response sent successfully");
    Ok(())
}

/// How a parameter's raw token is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    String,
    User,
    Channel,
    Subteam,
    /// One of a fixed set of words, matched case-insensitively.
    Choice(&'static [&'static str]),
}

impl ParamKind {
    /// The canonical choice `token` names, if this is a choice listing it.
    pub fn matches_choice(&self, token: &str) -> Option<&'static str> {
        match self {
            ParamKind::Choice(choices) => choices
                .iter()
                .copied()
                .find(|choice| choice.eq_ignore_ascii_case(token)),
            _ => None,
        }
    }
}

/// A declared sub-command parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamKind,
    pub description: Option<&'static str>,
    pub required: bool,
}

impl ParamSpec {
    pub const fn required(name: &'static str, kind: ParamKind) -> Self {
        Self {
            name,
            kind,
            description: None,
            required: true,
        }
    }

    pub const fn optional(name: &'static str, kind: ParamKind) -> Self {
        Self {
            name,
            kind,
            description: None,
            required: false,
        }
    }

    pub const fn with_description(mut self, description: &'static str) -> Self {
        self.description = Some(description);
        self
    }

    /// `<name>` when required, `[name]` otherwise; choices render as
    /// `name=a|b`.
    pub fn display(&self) -> String {
        let label = match self.kind {
            ParamKind::Choice(choices) if !choices.is_empty() => {
                format!("{}={}", self.name, choices.join("|"))
            }
            _ => self.name.to_string(),
        };
        if self.required {
            format!("<{}>", label)
        } else {
            format!("[{}]", label)
        }
    }
}

/// A sub-command of the slash command.
#[derive(Debug, Clone, Copy)]
pub struct CommandSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub params: &'static [ParamSpec],
}

impl CommandSpec {
    /// One help line, e.g. ``- `/se spoiler [spoiler]`: ...``.
    pub fn help_line(&self, prefix: &str) -> String {
        let params: Vec<String> = self.params.iter().map(ParamSpec::display).collect();
        let usage = if params.is_empty() {
            format!("{} {}", prefix, self.name)
        } else {
            format!("{} {} {}", prefix, self.name, params.join(" "))
        };
        format!("- `{}`: {}\n", usage, self.description)
    }
}

const ANCHOR_ACTIONS: &[&str] = &["enable", "disable"];
const GROUP_ACTIONS: &[&str] = &["join", "leave"];

/// Registered sub-commands, in help order.
pub const COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        name: "info",
        description: "Get info about users or channels",
        params: &[
            ParamSpec::optional("user", ParamKind::User)
                .with_description("Can be a user mention, ID or email"),
            ParamSpec::optional("channel", ParamKind::Channel)
                .with_description("Channel mention or id"),
        ],
    },
    CommandSpec {
        name: "spoiler",
        description: "Send a message hidden behind a spoiler button",
        params: &[ParamSpec::optional("spoiler", ParamKind::String).with_description("Text to hide!")],
    },
    CommandSpec {
        name: "anchor",
        description: "Anchor a message in the current channel",
        params: &[ParamSpec::optional("action", ParamKind::Choice(ANCHOR_ACTIONS))],
    },
    CommandSpec {
        name: "group",
        description: "Join or leave a user group!",
        params: &[
            ParamSpec::required("action", ParamKind::Choice(GROUP_ACTIONS))
                .with_description("Join or leave a user group"),
            ParamSpec::required("group", ParamKind::Subteam)
                .with_description("The user group to join or leave"),
        ],
    },
    CommandSpec {
        name: "move",
        description: "Automatically move users from one channel to another",
        params: &[
            ParamSpec::optional("start", ParamKind::Channel)
                .with_description("Origin channel with all the users in"),
            ParamSpec::optional("end", ParamKind::Channel)
                .with_description("End channel that users will be moved to"),
        ],
    },
];

/// Look up a sub-command by name.
pub fn find_command(name: &str) -> Option<&'static CommandSpec> {
    COMMANDS.iter().find(|command| command.name == name)
}

/// The help text listing every sub-command.
pub fn help_text(prefix: &str) -> String {
    let mut help = String::from("Available commands:\n");
    for command in COMMANDS {
        help.push_str(&command.help_line(prefix));
    }
    help
}

/// Footer echoing what was typed; empty for a bare command.
pub fn you_ran(prefix: &str, text: &str) -> String {
    if text.is_empty() {
        String::new()
    } else {
        format!("\n_You ran `{} {}`_", prefix, text)
    }
}

static TOKEN_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(<[^>\s]+>)|("([^"\\]|\\.)*")|(\S+)"#).expect("Invalid token regex")
});

/// One word of command text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// The word, with surrounding quotes removed and escapes decoded.
    pub value: String,
    /// Byte range of the raw word in the command text.
    pub span: Range<usize>,
}

/// Split command text into words.
///
/// `<...>` Slack tokens stay whole, double-quoted strings form one word,
/// everything else splits on whitespace.
pub fn tokenize(text: &str) -> Vec<Token> {
    TOKEN_PATTERN
        .find_iter(text)
        .map(|found| Token {
            value: unquote(found.as_str()),
            span: found.range(),
        })
        .collect()
}

fn unquote(raw: &str) -> String {
    let Some(inner) = raw
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
    else {
        return raw.to_string();
    };

    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

/// A validated argument value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgValue {
    Text(String),
    User(String),
    /// An email given for a user parameter, to be looked up by the caller.
    Email(String),
    Channel(String),
    /// A bare `#name` or `name` given for a channel parameter.
    ChannelName(String),
    Subteam(String),
    Choice(&'static str),
}

/// A user argument: an id, or an email still to be looked up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserArg {
    Id(String),
    Email(String),
}

/// A channel argument: an id, or a name still to be resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelArg {
    Id(String),
    Name(String),
}

impl ChannelArg {
    /// What the user typed, for error messages.
    pub fn display(&self) -> String {
        match self {
            ChannelArg::Id(id) => format!("<#{}>", id),
            ChannelArg::Name(name) => format!("#{}", name),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnchorAction {
    Enable,
    Disable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupAction {
    Join,
    Leave,
}

/// Arguments bound to a sub-command's parameters; absent optionals are
/// missing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoundArgs {
    values: Vec<(&'static str, ArgValue)>,
}

impl BoundArgs {
    pub fn get(&self, name: &str) -> Option<&ArgValue> {
        self.values
            .iter()
            .find(|(param, _)| *param == name)
            .map(|(_, value)| value)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        match self.get(name) {
            Some(ArgValue::Text(text)) => Some(text),
            _ => None,
        }
    }

    pub fn user(&self, name: &str) -> Option<UserArg> {
        match self.get(name)? {
            ArgValue::User(id) => Some(UserArg::Id(id.clone())),
            ArgValue::Email(email) => Some(UserArg::Email(email.clone())),
            _ => None,
        }
    }

    pub fn channel(&self, name: &str) -> Option<ChannelArg> {
        match self.get(name)? {
            ArgValue::Channel(id) => Some(ChannelArg::Id(id.clone())),
            ArgValue::ChannelName(channel) => Some(ChannelArg::Name(channel.clone())),
            _ => None,
        }
    }

    pub fn subteam(&self, name: &str) -> Option<&str> {
        match self.get(name)? {
            ArgValue::Subteam(id) => Some(id),
            _ => None,
        }
    }

    pub fn choice(&self, name: &str) -> Option<&'static str> {
        match self.get(name)? {
            ArgValue::Choice(choice) => Some(choice),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Bind argument words to `params`.
///
/// `raw` is the text the spans in `args` point into. When the last parameter
/// is a string it takes everything from its first word to the end of the
/// text, spacing kept. Remaining words are assigned by shape, then each value
/// is validated against its parameter kind.
pub fn bind_arguments(raw: &str, args: &[Token], params: &[ParamSpec]) -> Result<BoundArgs, Vec<String>> {
    let mut words: Vec<String> = args.iter().map(|token| token.value.clone()).collect();

    if let Some(last) = params.last()
        && last.kind == ParamKind::String
    {
        let leading = params.len() - 1;
        if args.len() > leading {
            let rest = raw[args[leading].span.start..].trim_end().to_string();
            words.truncate(leading);
            words.push(rest);
        }
    }

    let assigned = assign_tokens(&words, params);

    let mut bound = BoundArgs::default();
    let mut errors = Vec::new();
    for (param, raw_value) in params.iter().zip(assigned) {
        let raw_value = match raw_value {
            Some(value) if !value.is_empty() => value,
            _ => {
                if param.required {
                    errors.push(format!("Parameter '{}' is required.", param.name));
                }
                continue;
            }
        };

        match validate(param, raw_value.trim()) {
            Ok(Some(value)) => bound.values.push((param.name, value)),
            Ok(None) => {}
            Err(message) => errors.push(message),
        }
    }

    if errors.is_empty() {
        Ok(bound)
    } else {
        Err(errors)
    }
}

fn validate(param: &ParamSpec, raw: &str) -> Result<Option<ArgValue>, String> {
    let name = param.name;
    let value = match param.kind {
        ParamKind::String => ArgValue::Text(raw.to_string()),
        ParamKind::User => {
            if let Some(id) = normalize_user(raw) {
                ArgValue::User(id)
            } else if let Some(email) = extract_mailto(raw) {
                ArgValue::Email(email)
            } else if looks_like_email(raw) {
                ArgValue::Email(raw.to_string())
            } else {
                // Unresolvable users are left unset.
                return Ok(None);
            }
        }
        ParamKind::Channel => match normalize_channel(raw) {
            Some(id) => ArgValue::Channel(id),
            None => {
                let bare = raw.trim_start_matches('#');
                if bare.is_empty() {
                    return Err(format!(
                        "Parameter '{}' must be a channel mention or ID (e.g. <#C06R5NKVCG5>) or a channel name.",
                        name
                    ));
                }
                ArgValue::ChannelName(bare.to_string())
            }
        },
        ParamKind::Subteam => normalize_subteam(raw).map(ArgValue::Subteam).ok_or_else(|| {
            format!(
                "Parameter '{}' must be a usergroup mention or ID (e.g. <!subteam^S12345|@groupname> or S12345).",
                name
            )
        })?,
        ParamKind::Choice(choices) => param
            .kind
            .matches_choice(raw)
            .map(ArgValue::Choice)
            .ok_or_else(|| {
                format!("Parameter '{}' must be one of: {}.", name, choices.join(", "))
            })?,
    };
    Ok(Some(value))
}

/// Parsed slash command.
#[derive(Debug, Clone)]
pub enum ParsedCommand {
    /// `info [user] [channel]`.
    Info {
        user: Option<UserArg>,
        channel: Option<ChannelArg>,
        context: CommandContext,
    },
    /// `spoiler [text]`; no text opens the modal.
    Spoiler {
        text: Option<String>,
        context: CommandContext,
    },
    /// `anchor [enable|disable]`; no action opens the configuration modal.
    Anchor {
        action: Option<AnchorAction>,
        context: CommandContext,
    },
    /// `group <join|leave> <group>`.
    Group {
        action: GroupAction,
        group: String,
        context: CommandContext,
    },
    /// `move [start] [end]`; without both channels opens the mover modal.
    Move {
        start: Option<ChannelArg>,
        end: Option<ChannelArg>,
        context: CommandContext,
    },
    /// No or unrecognized sub-command.
    Help { context: CommandContext },
    /// Arguments failed validation.
    Invalid {
        errors: Vec<String>,
        context: CommandContext,
    },
    /// A slash command this bot does not own.
    Unknown {
        command: String,
        text: String,
        context: CommandContext,
    },
}

impl ParsedCommand {
    pub fn context(&self) -> &CommandContext {
        match self {
            ParsedCommand::Info { context, .. }
            | ParsedCommand::Spoiler { context, .. }
            | ParsedCommand::Anchor { context, .. }
            | ParsedCommand::Group { context, .. }
            | ParsedCommand::Move { context, .. }
            | ParsedCommand::Help { context }
            | ParsedCommand::Invalid { context, .. }
            | ParsedCommand::Unknown { context, .. } => context,
        }
    }
}

/// Context information from a slash command.
#[derive(Debug, Clone)]
pub struct CommandContext {
    pub user_id: String,
    pub channel_id: String,
    pub team_id: String,
    pub response_url: String,
    pub trigger_id: String,
    /// `<prefix> <text>` as typed, for reply footers.
    pub raw_command: String,
}

impl CommandContext {
    pub fn from_payload(payload: &SlashCommandPayload) -> Self {
        Self {
            user_id: payload.user_id.clone(),
            channel_id: payload.channel_id.clone(),
            team_id: payload.team_id.clone(),
            response_url: payload.response_url.clone(),
            trigger_id: payload.trigger_id.clone(),
            raw_command: format!("{} {}", payload.command, payload.text),
        }
    }

    /// `_You ran ..._` footer for this invocation.
    pub fn ran(&self) -> String {
        match self.raw_command.split_once(' ') {
            Some((prefix, text)) => you_ran(prefix, text),
            None => String::new(),
        }
    }
}

/// Parse a slash command payload addressed to `prefix`.
pub fn parse_command(payload: &SlashCommandPayload, prefix: &str) -> ParsedCommand {
    let context = CommandContext::from_payload(payload);

    if !payload.command.eq_ignore_ascii_case(prefix) {
        return ParsedCommand::Unknown {
            command: payload.command.clone(),
            text: payload.text.clone(),
            context,
        };
    }

    let tokens = tokenize(&payload.text);
    let Some((name, args)) = tokens.split_first() else {
        return ParsedCommand::Help { context };
    };
    let Some(sub_command) = find_command(&name.value) else {
        debug!(sub_command = %name.value, "Unrecognized sub-command");
        return ParsedCommand::Help { context };
    };

    debug!(
        sub_command = sub_command.name,
        user = %payload.user_id,
        tokens = tokens.len(),
        "Parsed slash command"
    );

    let bound = match bind_arguments(&payload.text, args, sub_command.params) {
        Ok(bound) => bound,
        Err(errors) => return ParsedCommand::Invalid { errors, context },
    };

    match sub_command.name {
        "info" => ParsedCommand::Info {
            user: bound.user("user"),
            channel: bound.channel("channel"),
            context,
        },
        "spoiler" => ParsedCommand::Spoiler {
            text: bound.text("spoiler").map(str::to_string),
            context,
        },
        "anchor" => ParsedCommand::Anchor {
            action: bound.choice("action").map(|action| match action {
                "disable" => AnchorAction::Disable,
                _ => AnchorAction::Enable,
            }),
            context,
        },
        "group" => match (bound.choice("action"), bound.subteam("group")) {
            (Some(action), Some(group)) => ParsedCommand::Group {
                action: if action == "leave" {
                    GroupAction::Leave
                } else {
                    GroupAction::Join
                },
                group: group.to_string(),
                context,
            },
            _ => ParsedCommand::Help { context },
        },
        "move" => ParsedCommand::Move {
            start: bound.channel("start"),
            end: bound.channel("end"),
            context,
        },
        _ => ParsedCommand::Help { context },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_payload(command: &str, text: &str) -> SlashCommandPayload {
        SlashCommandPayload {
            token: "test-token".to_string(),
            team_id: "T12345".to_string(),
            team_domain: "test".to_string(),
            enterprise_id: None,
            enterprise_name: None,
            channel_id: "C67890".to_string(),
            channel_name: "general".to_string(),
            user_id: "U11111".to_string(),
            user_name: "testuser".to_string(),
            command: command.to_string(),
            text: text.to_string(),
            api_app_id: "A22222".to_string(),
            is_enterprise_install: false,
            response_url: "https://hooks.slack.com/commands/xxx".to_string(),
            trigger_id: "trigger123".to_string(),
        }
    }

    fn values(tokens: &[Token]) -> Vec<&str> {
        tokens.iter().map(|t| t.value.as_str()).collect()
    }

    #[test]
    fn test_tokenize_keeps_slack_tokens_and_quotes() {
        let tokens = tokenize(r#"info <@U1|amber> "two words" <#C1|x> plain"#);
        assert_eq!(
            values(&tokens),
            vec!["info", "<@U1|amber>", "two words", "<#C1|x>", "plain"]
        );
    }

    #[test]
    fn test_tokenize_unescapes_quoted() {
        let tokens = tokenize(r#""say \"hi\"\n""#);
        assert_eq!(values(&tokens), vec!["say \"hi\"\n"]);
        assert_eq!(tokens[0].span, 0..14);
    }

    #[test]
    fn test_parse_spoiler_keeps_spacing() {
        let payload = create_test_payload("/se", "spoiler orpheus  loves\n||heidi|| ");
        match parse_command(&payload, "/se") {
            ParsedCommand::Spoiler { text, context } => {
                assert_eq!(text.as_deref(), Some("orpheus  loves\n||heidi||"));
                assert_eq!(context.user_id, "U11111");
                assert_eq!(context.channel_id, "C67890");
            }
            other => panic!("Expected Spoiler command, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_spoiler_without_text() {
        let payload = create_test_payload("/dev-se", "spoiler");
        match parse_command(&payload, "/dev-se") {
            ParsedCommand::Spoiler { text, .. } => assert_eq!(text, None),
            other => panic!("Expected Spoiler command, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_help() {
        let payload = create_test_payload("/se", "");
        assert!(matches!(parse_command(&payload, "/se"), ParsedCommand::Help { .. }));

        let payload = create_test_payload("/se", "dance now");
        assert!(matches!(parse_command(&payload, "/se"), ParsedCommand::Help { .. }));
    }

    #[test]
    fn test_parse_unknown_command() {
        let payload = create_test_payload("/unknown", "some text");
        match parse_command(&payload, "/se") {
            ParsedCommand::Unknown { command, text, .. } => {
                assert_eq!(command, "/unknown");
                assert_eq!(text, "some text");
            }
            other => panic!("Expected Unknown command, got {:?}", other),
        }
    }

    #[test]
    fn test_help_text() {
        assert_eq!(
            help_text("/se"),
            "Available commands:\n\
             - `/se info [user] [channel]`: Get info about users or channels\n\
             - `/se spoiler [spoiler]`: Send a message hidden behind a spoiler button\n\
             - `/se anchor [action=enable|disable]`: Anchor a message in the current channel\n\
             - `/se group <action=join|leave> <group>`: Join or leave a user group!\n\
             - `/se move [start] [end]`: Automatically move users from one channel to another\n"
        );
    }

    #[test]
    fn test_parse_info_arguments() {
        let payload = create_test_payload("/se", "info <#C42|lounge> <mailto:o@hackclub.com|o@hackclub.com>");
        match parse_command(&payload, "/se") {
            ParsedCommand::Info { user, channel, .. } => {
                assert_eq!(user, Some(UserArg::Email("o@hackclub.com".into())));
                assert_eq!(channel, Some(ChannelArg::Id("C42".into())));
            }
            other => panic!("Expected Info command, got {:?}", other),
        }

        let payload = create_test_payload("/se", "info");
        match parse_command(&payload, "/se") {
            ParsedCommand::Info { user, channel, .. } => {
                assert_eq!(user, None);
                assert_eq!(channel, None);
            }
            other => panic!("Expected Info command, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_anchor_and_group() {
        let payload = create_test_payload("/se", "anchor DISABLE");
        assert!(matches!(
            parse_command(&payload, "/se"),
            ParsedCommand::Anchor { action: Some(AnchorAction::Disable), .. }
        ));

        let payload = create_test_payload("/se", "anchor");
        assert!(matches!(
            parse_command(&payload, "/se"),
            ParsedCommand::Anchor { action: None, .. }
        ));

        let payload = create_test_payload("/se", "anchor sometimes");
        match parse_command(&payload, "/se") {
            ParsedCommand::Invalid { errors, .. } => {
                assert_eq!(errors, vec!["Parameter 'action' must be one of: enable, disable.".to_string()]);
            }
            other => panic!("Expected Invalid command, got {:?}", other),
        }

        let payload = create_test_payload("/se", "group <!subteam^S9|@staff> leave");
        match parse_command(&payload, "/se") {
            ParsedCommand::Group { action, group, .. } => {
                assert_eq!(action, GroupAction::Leave);
                assert_eq!(group, "S9");
            }
            other => panic!("Expected Group command, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_move_channels() {
        let payload = create_test_payload("/se", "move <#C1|from> #to");
        match parse_command(&payload, "/se") {
            ParsedCommand::Move { start, end, .. } => {
                assert_eq!(start, Some(ChannelArg::Id("C1".into())));
                assert_eq!(end, Some(ChannelArg::Name("to".into())));
            }
            other => panic!("Expected Move command, got {:?}", other),
        }
        assert_eq!(ChannelArg::Name("to".into()).display(), "#to");
    }

    #[test]
    fn test_param_display() {
        const ACTIONS: &[&str] = &["join", "leave"];
        assert_eq!(ParamSpec::required("group", ParamKind::Subteam).display(), "<group>");
        assert_eq!(
            ParamSpec::optional("action", ParamKind::Choice(ACTIONS)).display(),
            "[action=join|leave]"
        );
    }

    #[test]
    fn test_bind_validates_kinds() {
        const ACTIONS: &[&str] = &["join", "leave"];
        static PARAMS: [ParamSpec; 3] = [
            ParamSpec::required("action", ParamKind::Choice(ACTIONS)),
            ParamSpec::required("group", ParamKind::Subteam),
            ParamSpec::optional("note", ParamKind::String),
        ];

        let raw = "Join <!subteam^S1|@staff> see  you";
        let bound = bind_arguments(raw, &tokenize(raw), &PARAMS).unwrap();
        assert_eq!(bound.get("action"), Some(&ArgValue::Choice("join")));
        assert_eq!(bound.subteam("group"), Some("S1"));
        assert_eq!(bound.text("note"), Some("see  you"));

        let raw = "join nope";
        let errors = bind_arguments(raw, &tokenize(raw), &PARAMS).unwrap_err();
        assert_eq!(
            errors,
            vec![
                "Parameter 'group' must be a usergroup mention or ID (e.g. <!subteam^S12345|@groupname> or S12345)."
                    .to_string()
            ]
        );

        let errors = bind_arguments("", &[], &PARAMS).unwrap_err();
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn test_bind_users_and_channels() {
        static PARAMS: [ParamSpec; 2] = [
            ParamSpec::optional("user", ParamKind::User),
            ParamSpec::optional("channel", ParamKind::Channel),
        ];

        let raw = "#lounge <mailto:a@b.co|a@b.co>";
        let bound = bind_arguments(raw, &tokenize(raw), &PARAMS).unwrap();
        assert_eq!(bound.get("user"), Some(&ArgValue::Email("a@b.co".into())));
        assert_eq!(bound.get("channel"), Some(&ArgValue::ChannelName("lounge".into())));

        let raw = "<@U42>";
        let bound = bind_arguments(raw, &tokenize(raw), &PARAMS).unwrap();
        assert_eq!(bound.get("user"), Some(&ArgValue::User("U42".into())));
        assert_eq!(bound.get("channel"), None);
    }

    #[test]
    fn test_you_ran_footer() {
        assert_eq!(you_ran("/se", "spoiler x"), "\n_You ran `/se spoiler x`_");
        assert_eq!(you_ran("/se", ""), "");

        let payload = create_test_payload("/se", "spoiler x");
        let context = CommandContext::from_payload(&payload);
        assert_eq!(context.ran(), "\n_You ran `/se spoiler x`_");
    }

    #[test]
    fn test_delayed_response() {
        let response = DelayedResponse::new()
            .with_text("Done!")
            .in_channel()
            .replace_original();

        assert_eq!(response.text, Some("Done!".to_string()));
        assert_eq!(response.response_type, Some(ResponseType::InChannel));
        assert_eq!(response.replace_original, Some(true));

        let json = serde_json::to_value(DelayedResponse::new().with_text("x")).unwrap();
        assert_eq!(json, serde_json::json!({"text": "x"}));
    }
}
