//! Bot configuration.
//!
//! Loaded from environment variables (the binary reads `.env` first).

use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{SlackError, SlackResult};

/// Default Slack Web API base URL.
pub const DEFAULT_API_BASE: &str = "https://slack.com/api";

/// Deployment environment; decides which slash command the bot answers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Production,
    #[default]
    Development,
}

impl Environment {
    pub fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("production") {
            Self::Production
        } else {
            Self::Development
        }
    }

    /// Slash command registered for this environment.
    pub fn command_prefix(self) -> &'static str {
        match self {
            Self::Production => "/se",
            Self::Development => "/dev-se",
        }
    }
}

/// Configuration for the bot.
#[derive(Clone)]
pub struct SlackConfig {
    /// Bot OAuth token (xoxb-...).
    bot_token: SecretString,
    /// App-level token for Socket Mode (xapp-...).
    app_token: SecretString,
    /// Signing secret for request verification.
    signing_secret: SecretString,
    client_id: Option<String>,
    client_secret: Option<SecretString>,
    redirect_uri: Option<String>,
    environment: Environment,
    /// Root directory for the spoiler store.
    data_dir: PathBuf,
    api_base: String,
    /// User whose new channels the bot joins outside production.
    maintainer_id: Option<String>,
    /// Channel for startup and failure notices.
    heartbeat_channel: Option<String>,
}

impl std::fmt::Debug for SlackConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlackConfig")
            .field("bot_token", &"[REDACTED]")
            .field("app_token", &"[REDACTED]")
            .field("signing_secret", &"[REDACTED]")
            .field("client_id", &self.client_id)
            .field(
                "client_secret",
                &self.client_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .field("redirect_uri", &self.redirect_uri)
            .field("environment", &self.environment)
            .field("data_dir", &self.data_dir)
            .field("api_base", &self.api_base)
            .field("maintainer_id", &self.maintainer_id)
            .field("heartbeat_channel", &self.heartbeat_channel)
            .finish()
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("slack-extra")
}

impl SlackConfig {
    /// Create a new configuration with required tokens.
    pub fn new(
        bot_token: impl Into<String>,
        app_token: impl Into<String>,
        signing_secret: impl Into<String>,
    ) -> Self {
        Self {
            bot_token: SecretString::new(bot_token.into().into()),
            app_token: SecretString::new(app_token.into().into()),
            signing_secret: SecretString::new(signing_secret.into().into()),
            client_id: None,
            client_secret: None,
            redirect_uri: None,
            environment: Environment::default(),
            data_dir: default_data_dir(),
            api_base: DEFAULT_API_BASE.to_string(),
            maintainer_id: None,
            heartbeat_channel: None,
        }
    }

    /// Set OAuth client credentials.
    pub fn with_oauth(
        mut self,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uri: Option<String>,
    ) -> Self {
        self.client_id = Some(client_id.into());
        self.client_secret = Some(SecretString::new(client_secret.into().into()));
        self.redirect_uri = redirect_uri;
        self
    }

    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    pub fn with_data_dir(mut self, data_dir: impl Into<PathBuf>) -> Self {
        self.data_dir = data_dir.into();
        self
    }

    /// Point the Web API client somewhere other than slack.com.
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_maintainer(mut self, user_id: impl Into<String>) -> Self {
        self.maintainer_id = Some(user_id.into());
        self
    }

    pub fn with_heartbeat_channel(mut self, channel: impl Into<String>) -> Self {
        self.heartbeat_channel = Some(channel.into());
        self
    }

    /// Load configuration from environment variables.
    ///
    /// Required variables:
    /// - `SLACK_BOT_TOKEN`
    /// - `SLACK_APP_TOKEN`
    /// - `SLACK_SIGNING_SECRET`
    ///
    /// Optional variables:
    /// - `SLACK_CLIENT_ID`, `SLACK_CLIENT_SECRET`, `SLACK_REDIRECT_URI`
    /// - `SLACK_EXTRA_ENVIRONMENT`
    /// - `SLACK_EXTRA_DATA_DIR`
    /// - `SLACK_EXTRA_API_BASE`
    /// - `SLACK_EXTRA_MAINTAINER_ID`
    /// - `SLACK_EXTRA_HEARTBEAT_CHANNEL`
    pub fn from_env() -> SlackResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> SlackResult<Self> {
        let required = |key: &str| {
            lookup(key)
                .filter(|value| !value.is_empty())
                .ok_or_else(|| SlackError::Config(format!("{} not set", key)))
        };

        let bot_token = required("SLACK_BOT_TOKEN")?;
        let app_token = required("SLACK_APP_TOKEN")?;
        let signing_secret = required("SLACK_SIGNING_SECRET")?;

        if !bot_token.starts_with("xoxb-") {
            warn!("Bot token doesn't start with 'xoxb-', this may be incorrect");
        }
        if !app_token.starts_with("xapp-") {
            warn!("App token doesn't start with 'xapp-', this may be incorrect");
        }

        let mut config = Self::new(bot_token, app_token, signing_secret);

        if let Some(client_id) = lookup("SLACK_CLIENT_ID")
            && let Some(client_secret) = lookup("SLACK_CLIENT_SECRET")
        {
            let redirect_uri = lookup("SLACK_REDIRECT_URI");
            config = config.with_oauth(client_id, client_secret, redirect_uri);
        }

        if let Some(environment) = lookup("SLACK_EXTRA_ENVIRONMENT") {
            config = config.with_environment(Environment::parse(&environment));
        }
        if let Some(data_dir) = lookup("SLACK_EXTRA_DATA_DIR") {
            config = config.with_data_dir(data_dir);
        }
        if let Some(api_base) = lookup("SLACK_EXTRA_API_BASE") {
            config = config.with_api_base(api_base);
        }
        if let Some(maintainer) = lookup("SLACK_EXTRA_MAINTAINER_ID").filter(|v| !v.is_empty()) {
            config = config.with_maintainer(maintainer);
        }
        if let Some(channel) = lookup("SLACK_EXTRA_HEARTBEAT_CHANNEL").filter(|v| !v.is_empty()) {
            config = config.with_heartbeat_channel(channel);
        }

        debug!(
            environment = ?config.environment,
            data_dir = %config.data_dir.display(),
            "Loaded config from environment"
        );
        Ok(config)
    }

    pub fn bot_token(&self) -> &str {
        self.bot_token.expose_secret()
    }

    pub fn app_token(&self) -> &str {
        self.app_token.expose_secret()
    }

    pub fn signing_secret(&self) -> &str {
        self.signing_secret.expose_secret()
    }

    pub fn client_id(&self) -> Option<&str> {
        self.client_id.as_deref()
    }

    pub fn client_secret(&self) -> Option<&str> {
        self.client_secret.as_ref().map(|s| s.expose_secret())
    }

    pub fn redirect_uri(&self) -> Option<&str> {
        self.redirect_uri.as_deref()
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    /// Slash command this instance answers to (`/se` or `/dev-se`).
    pub fn command_prefix(&self) -> &'static str {
        self.environment.command_prefix()
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    pub fn maintainer_id(&self) -> Option<&str> {
        self.maintainer_id.as_deref()
    }

    pub fn heartbeat_channel(&self) -> Option<&str> {
        self.heartbeat_channel.as_deref()
    }

    /// Check if OAuth is configured.
    pub fn has_oauth(&self) -> bool {
        self.client_id.is_some() && self.client_secret.is_some()
    }

    /// Validate the configuration.
    pub fn validate(&self) -> SlackResult<()> {
        if self.bot_token.expose_secret().is_empty() {
            return Err(SlackError::Config("Bot token is empty".to_string()));
        }
        if self.app_token.expose_secret().is_empty() {
            return Err(SlackError::Config("App token is empty".to_string()));
        }
        if self.signing_secret.expose_secret().is_empty() {
            return Err(SlackError::Config("Signing secret is empty".to_string()));
        }

        if !self.bot_token.expose_secret().starts_with("xoxb-") {
            return Err(SlackError::Config(
                "Bot token must start with 'xoxb-'".to_string(),
            ));
        }
        if !self.app_token.expose_secret().starts_with("xapp-") {
            return Err(SlackError::Config(
                "App token must start with 'xapp-'".to_string(),
            ));
        }
        if !self.api_base.starts_with("http://") && !self.api_base.starts_with("https://") {
            return Err(SlackError::Config(format!(
                "API base must be an http(s) URL, got '{}'",
                self.api_base
            )));
        }

        Ok(())
    }
}

/// Serializable configuration summary (without secrets).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlackConfigMetadata {
    pub has_bot_token: bool,
    pub has_app_token: bool,
    pub has_signing_secret: bool,
    pub has_oauth: bool,
    pub redirect_uri: Option<String>,
    pub environment: Environment,
    pub command_prefix: String,
    pub data_dir: PathBuf,
}

impl From<&SlackConfig> for SlackConfigMetadata {
    fn from(config: &SlackConfig) -> Self {
        Self {
            has_bot_token: !config.bot_token.expose_secret().is_empty(),
            has_app_token: !config.app_token.expose_secret().is_empty(),
            has_signing_secret: !config.signing_secret.expose_secret().is_empty(),
            has_oauth: config.has_oauth(),
            redirect_uri: config.redirect_uri.clone(),
            environment: config.environment,
            command_prefix: config.command_prefix().to_string(),
            data_dir: config.data_dir.clone(),
        }
    }
}
