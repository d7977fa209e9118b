//! Error types for the bot.
//!
//! Web API failures keep the Slack error code so handlers can react to
//! specific conditions (`not_in_channel`, `message_not_found`, ...).

use thiserror::Error;

/// Errors that can occur while talking to Slack or touching local state.
#[derive(Error, Debug)]
pub enum SlackError {
    /// Configuration error (missing or invalid config).
    #[error("Configuration error: {0}")]
    Config(String),

    /// Authentication error (invalid token, expired, etc.).
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Web API call answered `ok: false`.
    #[error("Slack API error: {code}: {message}")]
    Api { code: String, message: String },

    /// API rate limited.
    #[error("Rate limited: retry after {retry_after_secs} seconds")]
    RateLimited {
        /// Seconds to wait before retrying.
        retry_after_secs: u64,
    },

    /// Network/HTTP error.
    #[error("Network error: {0}")]
    Network(String),

    /// WebSocket connection error.
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(String),

    /// Operation timed out.
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Channel not found or bot not in channel.
    #[error("Channel error: {code}: {message}")]
    Channel { code: String, message: String },

    /// User not found.
    #[error("User error: {0}")]
    User(String),

    /// Invalid payload received from Slack.
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    /// Spoiler store failure.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl SlackError {
    /// The Slack error code behind this error, if it came from the Web API.
    pub fn api_code(&self) -> Option<&str> {
        match self {
            SlackError::Api { code, .. } | SlackError::Channel { code, .. } => Some(code),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for SlackError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SlackError::Timeout(err.to_string())
        } else if err.is_connect() {
            SlackError::Network(format!("Connection failed: {}", err))
        } else {
            SlackError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for SlackError {
    fn from(err: serde_json::Error) -> Self {
        SlackError::Json(err.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for SlackError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        SlackError::WebSocket(err.to_string())
    }
}

impl From<std::env::VarError> for SlackError {
    fn from(err: std::env::VarError) -> Self {
        SlackError::Config(format!("Environment variable error: {}", err))
    }
}

impl From<std::io::Error> for SlackError {
    fn from(err: std::io::Error) -> Self {
        SlackError::Storage(err.to_string())
    }
}

/// Result type for bot operations.
pub type SlackResult<T> = std::result::Result<T, SlackError>;

/// Represents a Slack API response error.
#[derive(Debug, Clone)]
pub struct SlackApiError {
    /// Error code from Slack (e.g., "channel_not_found").
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Whether this error is retryable.
    pub retryable: bool,
}

impl SlackApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        let code = code.into();
        let retryable = Self::is_retryable_code(&code);
        Self {
            code,
            message: message.into(),
            retryable,
        }
    }

    fn is_retryable_code(code: &str) -> bool {
        matches!(
            code,
            "rate_limited"
                | "ratelimited"
                | "service_unavailable"
                | "internal_error"
                | "request_timeout"
                | "fatal_error"
        )
    }
}

impl From<SlackApiError> for SlackError {
    fn from(err: SlackApiError) -> Self {
        match err.code.as_str() {
            // Default retry after 30 seconds if not specified
            "rate_limited" | "ratelimited" => SlackError::RateLimited {
                retry_after_secs: 30,
            },
            "invalid_auth" | "account_inactive" | "not_authed" | "token_revoked" => {
                SlackError::Auth(err.message)
            }
            "channel_not_found" | "not_in_channel" | "is_archived" => SlackError::Channel {
                code: err.code,
                message: err.message,
            },
            "user_not_found" => SlackError::User(err.message),
            _ => SlackError::Api {
                code: err.code,
                message: err.message,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SlackError::Config("missing token".to_string());
        assert_eq!(err.to_string(), "Configuration error: missing token");

        let err = SlackError::RateLimited {
            retry_after_secs: 60,
        };
        assert_eq!(err.to_string(), "Rate limited: retry after 60 seconds");
    }

    #[test]
    fn test_api_error_retryable() {
        let err = SlackApiError::new("rate_limited", "Too many requests");
        assert!(err.retryable);

        let err = SlackApiError::new("channel_not_found", "Channel not found");
        assert!(!err.retryable);
    }

    #[test]
    fn test_api_error_conversion() {
        let slack_err: SlackError = SlackApiError::new("invalid_auth", "revoked").into();
        assert!(matches!(slack_err, SlackError::Auth(_)));

        let slack_err: SlackError = SlackApiError::new("not_in_channel", "join first").into();
        assert!(matches!(slack_err, SlackError::Channel { .. }));
        assert_eq!(slack_err.api_code(), Some("not_in_channel"));

        let slack_err: SlackError = SlackApiError::new("message_not_found", "gone").into();
        assert_eq!(slack_err.api_code(), Some("message_not_found"));
        assert_eq!(slack_err.to_string(), "Slack API error: message_not_found: gone");
    }

    #[test]
    fn test_io_error_is_storage() {
        let err: SlackError = std::io::Error::other("disk full").into();
        assert!(matches!(err, SlackError::Storage(_)));
        assert_eq!(err.api_code(), None);
    }
}
