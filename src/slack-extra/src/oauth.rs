//! OAuth flow for workspace installation.
//!
//! Provides HTTP routes for:
//! - `/slack/oauth/authorize` - Initiate OAuth flow
//! - `/slack/oauth/callback` - Handle OAuth callback
//!
//! # OAuth Scopes
//!
//! The following bot scopes are required:
//! - `commands` - Handle the slash command
//! - `chat:write`, `chat:write.customize` - Post spoilers as their author
//! - `channels:read`, `groups:read` - Check channel access
//! - `channels:join` - Join channels on demand
//! - `channels:history`, `groups:history` - Read spoiler metadata back
//! - `users:read` - Author names and avatars
//! - `files:read`, `files:write` - Re-post attached files
//! - `pins:write` - Pin anchors
//! - `channels:manage`, `groups:write` - Invite moved members
//! - `usergroups:read`, `usergroups:write` - Join and leave user groups
//! - `users:read.email` - Look users up by email

use axum::{
    Router,
    extract::{Query, State},
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::{
    config::SlackConfig,
    error::{SlackError, SlackResult},
};

/// Required OAuth scopes for the bot.
pub const REQUIRED_SCOPES: &[&str] = &[
    "commands",
    "chat:write",
    "chat:write.customize",
    "channels:read",
    "groups:read",
    "channels:join",
    "channels:history",
    "groups:history",
    "users:read",
    "files:read",
    "files:write",
    "pins:write",
    "channels:manage",
    "groups:write",
    "usergroups:read",
    "usergroups:write",
    "users:read.email",
];

const AUTHORIZE_URL: &str = "https://slack.com/oauth/v2/authorize";

/// OAuth state for the router.
#[derive(Clone)]
pub struct OAuthState {
    pub client_id: String,
    pub client_secret: String,
    /// Redirect URI after OAuth.
    pub redirect_uri: String,
    /// Web API base the code is exchanged against.
    pub api_base: String,
    /// Optional callback for storing tokens.
    pub token_callback: Option<TokenCallback>,
}

/// Callback function type for storing OAuth tokens.
pub type TokenCallback = std::sync::Arc<
    dyn Fn(
            OAuthTokenResponse,
        ) -> std::pin::Pin<Box<dyn std::future::Future<Output = SlackResult<()>> + Send>>
        + Send
        + Sync,
>;

impl OAuthState {
    pub fn from_config(config: &SlackConfig) -> SlackResult<Self> {
        let client_id = config
            .client_id()
            .ok_or_else(|| SlackError::Config("OAuth client_id not configured".to_string()))?
            .to_string();

        let client_secret = config
            .client_secret()
            .ok_or_else(|| SlackError::Config("OAuth client_secret not configured".to_string()))?
            .to_string();

        let redirect_uri = config
            .redirect_uri()
            .ok_or_else(|| SlackError::Config("OAuth redirect_uri not configured".to_string()))?
            .to_string();

        Ok(Self {
            client_id,
            client_secret,
            redirect_uri,
            api_base: config.api_base().to_string(),
            token_callback: None,
        })
    }

    /// Set a callback for storing tokens after successful OAuth.
    pub fn with_token_callback<F, Fut>(mut self, callback: F) -> Self
    where
        F: Fn(OAuthTokenResponse) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = SlackResult<()>> + Send + 'static,
    {
        self.token_callback = Some(std::sync::Arc::new(move |token| {
            Box::pin(callback(token))
                as std::pin::Pin<Box<dyn std::future::Future<Output = SlackResult<()>> + Send>>
        }));
        self
    }

    /// Slack's authorization page for this app.
    pub fn authorize_url(&self) -> String {
        format!(
            "{}?client_id={}&scope={}&redirect_uri={}",
            AUTHORIZE_URL,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(&REQUIRED_SCOPES.join(",")),
            urlencoding::encode(&self.redirect_uri),
        )
    }
}

/// Query parameters for OAuth callback.
#[derive(Debug, Deserialize)]
pub struct OAuthCallbackParams {
    /// Authorization code from Slack.
    pub code: Option<String>,
    /// Error from Slack (if authorization failed).
    pub error: Option<String>,
    /// State parameter (for CSRF protection).
    pub state: Option<String>,
}

/// Response from `oauth.v2.access`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthTokenResponse {
    pub ok: bool,
    /// Access token for the bot.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    /// Scopes granted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bot_user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team: Option<OAuthTeam>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authed_user: Option<OAuthAuthedUser>,
    /// Error code (if ok is false).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthTeam {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthAuthedUser {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

/// Create OAuth routes.
pub fn oauth_routes(state: OAuthState) -> Router {
    Router::new()
        .route("/slack/oauth/authorize", get(authorize))
        .route("/slack/oauth/callback", get(callback))
        .with_state(state)
}

/// A minimal result page.
fn page(title: &str, heading: &str, body: &str) -> Response {
    Html(format!(
        r#"<!DOCTYPE html>
<html>
<head>
<title>Slack Extra - {}</title>
<style>
body {{ font-family: -apple-system, BlinkMacSystemFont, sans-serif; text-align: center; padding: 50px; }}
</style>
</head>
<body>
<h1>{}</h1>
{}
<p><a href="javascript:window.close()">Close this window</a></p>
</body>
</html>"#,
        title, heading, body
    ))
    .into_response()
}

fn failure(detail: &str) -> Response {
    page(
        "Installation Failed",
        "❌ Installation Failed",
        &format!("<p>{}</p>", detail),
    )
}

/// Redirect to Slack's authorization page.
async fn authorize(State(state): State<OAuthState>) -> Response {
    let url = state.authorize_url();
    debug!("Initiating OAuth flow, redirecting to: {}", url);
    Redirect::temporary(&url).into_response()
}

async fn callback(
    State(state): State<OAuthState>,
    Query(params): Query<OAuthCallbackParams>,
) -> Response {
    if let Some(error) = params.error {
        error!("OAuth error from Slack: {}", error);
        return failure(&format!("Error: {}", error));
    }

    let Some(code) = params.code else {
        error!("OAuth callback missing code parameter");
        return failure("Missing authorization code.");
    };

    let token_response = match exchange_code(&state, &code).await {
        Ok(response) => response,
        Err(e) => {
            error!("Token exchange failed: {}", e);
            return failure(&format!("Error exchanging authorization code: {}", e));
        }
    };

    if !token_response.ok {
        let error = token_response
            .error
            .unwrap_or_else(|| "Unknown error".to_string());
        error!("Token exchange failed: {}", error);
        return failure(&format!("Token exchange error: {}", error));
    }

    let team_name = token_response
        .team
        .as_ref()
        .and_then(|t| t.name.clone())
        .unwrap_or_else(|| "your workspace".to_string());

    info!(
        team = %team_name,
        team_id = token_response.team.as_ref().map(|t| t.id.as_str()).unwrap_or("unknown"),
        "OAuth successful"
    );

    if let Some(callback) = &state.token_callback
        && let Err(e) = callback(token_response.clone()).await
    {
        error!("Token callback failed: {}", e);
        return page(
            "Installation Warning",
            "⚠️ Installation Partially Complete",
            &format!(
                "<p>Slack Extra was installed to {}, but saving the installation failed: {}</p>",
                team_name, e
            ),
        );
    }

    page(
        "Installation Successful",
        "✅ Slack Extra Installed!",
        &format!(
            "<p>Slack Extra has been installed to <strong>{}</strong>.</p>\n<p>Try <code>/se spoiler</code> in any channel.</p>",
            team_name
        ),
    )
}

/// Exchange an authorization code for tokens via `oauth.v2.access`.
async fn exchange_code(state: &OAuthState, code: &str) -> SlackResult<OAuthTokenResponse> {
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/oauth.v2.access", state.api_base))
        .form(&[
            ("client_id", state.client_id.as_str()),
            ("client_secret", state.client_secret.as_str()),
            ("code", code),
            ("redirect_uri", state.redirect_uri.as_str()),
        ])
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(SlackError::Api {
            code: format!("http_{}", status.as_u16()),
            message: format!("Token exchange failed: {}", body),
        });
    }

    Ok(response.json().await?)
}

/// The "Add to Slack" button HTML.
pub fn add_to_slack_button(client_id: &str, scopes: Option<&[&str]>) -> String {
    let scopes = scopes.unwrap_or(REQUIRED_SCOPES);
    let scope_str = scopes.join(",");

    format!(
        r#"<a href="{}?client_id={}&scope={}&user_scope=">
<img alt="Add to Slack" height="40" width="139" src="https://platform.slack-edge.com/img/add_to_slack.png"
srcSet="https://platform.slack-edge.com/img/add_to_slack.png 1x, https://platform.slack-edge.com/img/add_to_slack@2x.png 2x" />
</a>"#,
        AUTHORIZE_URL,
        urlencoding::encode(client_id),
        urlencoding::encode(&scope_str),
    )
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;
    use axum::http::StatusCode;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn state(api_base: &str) -> OAuthState {
        let config = SlackConfig::new("xoxb-token", "xapp-token", "secret")
            .with_oauth(
                "client-id",
                "client-secret",
                Some("https://example.com/callback".to_string()),
            )
            .with_api_base(api_base);
        OAuthState::from_config(&config).unwrap()
    }

    fn params(code: Option<&str>, error: Option<&str>) -> OAuthCallbackParams {
        OAuthCallbackParams {
            code: code.map(str::to_string),
            error: error.map(str::to_string),
            state: None,
        }
    }

    async fn body_text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test]
    fn test_required_scopes() {
        assert!(REQUIRED_SCOPES.contains(&"commands"));
        assert!(REQUIRED_SCOPES.contains(&"chat:write.customize"));
        assert!(REQUIRED_SCOPES.contains(&"files:write"));
        assert!(REQUIRED_SCOPES.contains(&"usergroups:write"));
        assert!(REQUIRED_SCOPES.contains(&"pins:write"));
    }

    #[test]
    fn test_oauth_state_from_config() {
        let state = state("https://slack.com/api");
        assert_eq!(state.client_id, "client-id");
        assert_eq!(state.client_secret, "client-secret");
        assert_eq!(state.redirect_uri, "https://example.com/callback");
        assert!(state.authorize_url().contains("chat%3Awrite.customize"));
        assert!(state.authorize_url().contains("redirect_uri=https%3A%2F%2Fexample.com%2Fcallback"));
    }

    #[test]
    fn test_oauth_state_missing_config() {
        let config = SlackConfig::new("xoxb-token", "xapp-token", "secret");
        assert!(OAuthState::from_config(&config).is_err());
    }

    #[test]
    fn test_add_to_slack_button() {
        let html = add_to_slack_button("test-client-id", Some(&["commands"]));
        assert!(html.contains("client_id=test-client-id"));
        assert!(html.contains("scope=commands&"));
        assert!(html.contains("Add to Slack"));
    }

    #[tokio::test]
    async fn test_callback_reports_slack_error() {
        let response = callback(
            State(state("http://127.0.0.1:9/api")),
            Query(params(None, Some("access_denied"))),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("Error: access_denied"));

        let response =
            callback(State(state("http://127.0.0.1:9/api")), Query(params(None, None))).await;
        assert!(body_text(response).await.contains("Missing authorization code."));
    }

    #[tokio::test]
    async fn test_callback_exchanges_code_and_stores_token() {
        let server = MockServer::start().await;
        Mock::given(path("/api/oauth.v2.access"))
            .and(body_string_contains("code=abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "access_token": "xoxb-new",
                "team": {"id": "T1", "name": "Hack Club"}
            })))
            .mount(&server)
            .await;

        let stored = Arc::new(AtomicBool::new(false));
        let flag = stored.clone();
        let state = state(&format!("{}/api", server.uri())).with_token_callback(move |token| {
            let flag = flag.clone();
            async move {
                assert_eq!(token.access_token.as_deref(), Some("xoxb-new"));
                flag.store(true, Ordering::SeqCst);
                Ok(())
            }
        });

        let response = callback(State(state), Query(params(Some("abc"), None))).await;
        let body = body_text(response).await;
        assert!(body.contains("Hack Club"));
        assert!(stored.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_callback_token_exchange_rejected() {
        let server = MockServer::start().await;
        Mock::given(path("/api/oauth.v2.access"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"ok": false, "error": "invalid_code"})),
            )
            .mount(&server)
            .await;

        let response = callback(
            State(state(&format!("{}/api", server.uri()))),
            Query(params(Some("bad"), None)),
        )
        .await;
        assert!(body_text(response).await.contains("Token exchange error: invalid_code"));
    }

    #[test]
    fn test_oauth_token_response_error() {
        let json = r#"{"ok": false, "error": "invalid_code"}"#;
        let response: OAuthTokenResponse = serde_json::from_str(json).unwrap();

        assert!(!response.ok);
        assert_eq!(response.error, Some("invalid_code".to_string()));
        assert!(response.access_token.is_none());
    }
}
