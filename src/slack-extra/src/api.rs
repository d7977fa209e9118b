//! Slack Web API access.
//!
//! Handlers talk to Slack through the [`SlackApi`] trait, so they can be
//! driven by a recording fake in tests. [`SlackClient`] is the `reqwest`
//! implementation.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::commands::{DelayedResponse, send_delayed_response};
use crate::error::{SlackApiError, SlackError, SlackResult};
use crate::messages::{MessageMetadata, SlackMessageContent, SlackView};

/// Fallback name when a user has neither a display name nor a real name.
pub const UNKNOWN_USER: &str = "Unknown User";

/// Page size of cursor-paginated list methods.
const PAGE_LIMIT: &str = "200";

#[derive(Debug, Default, Deserialize)]
struct ResponseMetadata {
    #[serde(default)]
    next_cursor: Option<String>,
}

impl ResponseMetadata {
    fn cursor(self) -> Option<String> {
        self.next_cursor.filter(|cursor| !cursor.is_empty())
    }
}

/// The subset of `users.info` the bot reads.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserInfo {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub real_name: Option<String>,
    #[serde(default)]
    pub tz: Option<String>,
    #[serde(default)]
    pub profile: UserProfile,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserProfile {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub real_name: Option<String>,
    #[serde(default)]
    pub image_512: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

impl UserInfo {
    /// Profile display name, then real name, then [`UNKNOWN_USER`].
    pub fn display_name(&self) -> &str {
        [&self.profile.display_name, &self.real_name]
            .into_iter()
            .flatten()
            .find(|name| !name.is_empty())
            .map(String::as_str)
            .unwrap_or(UNKNOWN_USER)
    }

    pub fn avatar(&self) -> Option<&str> {
        self.profile.image_512.as_deref().filter(|url| !url.is_empty())
    }
}

/// The subset of `conversations.info` the bot reads.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConversationInfo {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub is_channel: bool,
    #[serde(default)]
    pub is_private: bool,
    #[serde(default)]
    pub is_member: bool,
    #[serde(default)]
    pub is_archived: bool,
    /// User who created the channel.
    #[serde(default)]
    pub creator: Option<String>,
    #[serde(default)]
    pub num_members: Option<u64>,
}

/// A file to attach to a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub filename: String,
    pub title: String,
    pub data: Vec<u8>,
}

impl UploadFile {
    pub fn new(filename: impl Into<String>, data: Vec<u8>) -> Self {
        let filename = filename.into();
        Self {
            title: filename.clone(),
            filename,
            data,
        }
    }
}

/// Web API operations used by the handlers.
#[async_trait]
pub trait SlackApi: Send + Sync {
    /// `chat.postMessage`; returns the posted message's ts.
    async fn post_message(&self, channel: &str, content: &SlackMessageContent)
    -> SlackResult<String>;

    /// `chat.postEphemeral`.
    async fn post_ephemeral(&self, channel: &str, user: &str, text: &str) -> SlackResult<()>;

    /// `views.open`.
    async fn open_view(&self, trigger_id: &str, view: &SlackView) -> SlackResult<()>;

    /// `views.push`, stacking a view on the open modal.
    async fn push_view(&self, trigger_id: &str, view: &SlackView) -> SlackResult<()>;

    /// `chat.delete`.
    async fn delete_message(&self, channel: &str, ts: &str) -> SlackResult<()>;

    /// `pins.add`.
    async fn pin_message(&self, channel: &str, ts: &str) -> SlackResult<()>;

    /// `users.info`.
    async fn user_info(&self, user: &str) -> SlackResult<UserInfo>;

    /// `users.lookupByEmail`.
    async fn user_by_email(&self, email: &str) -> SlackResult<UserInfo>;

    /// `conversations.info`.
    async fn conversation_info(&self, channel: &str) -> SlackResult<ConversationInfo>;

    /// `conversations.join`.
    async fn join_conversation(&self, channel: &str) -> SlackResult<ConversationInfo>;

    /// Id of the channel called `name`, among those the bot can list.
    async fn find_channel(&self, name: &str) -> SlackResult<Option<String>>;

    /// Every member of a channel, across all `conversations.members` pages.
    async fn conversation_members(&self, channel: &str) -> SlackResult<Vec<String>>;

    /// `conversations.invite`; members already in the channel are skipped.
    async fn invite_users(&self, channel: &str, users: &[String]) -> SlackResult<()>;

    /// `usergroups.users.list`.
    async fn usergroup_members(&self, usergroup: &str) -> SlackResult<Vec<String>>;

    /// `usergroups.users.update`; replaces the whole member list.
    async fn update_usergroup(&self, usergroup: &str, users: &[String]) -> SlackResult<()>;

    /// Metadata of the message posted at `ts`, if it carries any.
    async fn message_metadata(&self, channel: &str, ts: &str)
    -> SlackResult<Option<MessageMetadata>>;

    /// Fetch a private file URL with the bot token. Non-200 answers fail.
    async fn download_file(&self, url: &str) -> SlackResult<Vec<u8>>;

    /// Share files in a channel, optionally in a thread.
    async fn upload_files(
        &self,
        channel: &str,
        thread_ts: Option<&str>,
        files: Vec<UploadFile>,
    ) -> SlackResult<()>;

    /// Answer through a slash command or action `response_url`.
    async fn respond(&self, response_url: &str, response: &DelayedResponse) -> SlackResult<()>;
}

/// `reqwest`-backed Web API client.
#[derive(Clone)]
pub struct SlackClient {
    client: reqwest::Client,
    bot_token: SecretString,
    api_base: String,
}

impl std::fmt::Debug for SlackClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlackClient")
            .field("bot_token", &"[REDACTED]")
            .field("api_base", &self.api_base)
            .finish()
    }
}

#[derive(Deserialize)]
struct ApiEnvelope {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    warning: Option<String>,
}

impl SlackClient {
    pub fn with_client(
        client: reqwest::Client,
        bot_token: impl Into<String>,
        api_base: impl Into<String>,
    ) -> Self {
        Self {
            client,
            bot_token: SecretString::new(bot_token.into().into()),
            api_base: api_base.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, method: &str) -> String {
        format!("{}/{}", self.api_base, method)
    }

    /// `auth.test`; returns the bot's user id.
    pub async fn auth_test(&self) -> SlackResult<String> {
        #[derive(Deserialize)]
        struct AuthTest {
            user_id: String,
        }

        let response: AuthTest = self.api_call("auth.test", &json!({})).await.map_err(|e| {
            match e {
                SlackError::Api { code, .. } => SlackError::Auth(format!("auth.test failed: {}", code)),
                other => other,
            }
        })?;
        Ok(response.user_id)
    }

    /// `apps.connections.open` with the app-level token; returns the
    /// Socket Mode WebSocket URL.
    pub async fn open_socket_url(&self, app_token: &str) -> SlackResult<String> {
        #[derive(Deserialize)]
        struct Connection {
            url: String,
        }

        let response = self
            .client
            .post(self.url("apps.connections.open"))
            .bearer_auth(app_token)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .send()
            .await?;
        let connection: Connection = Self::decode("apps.connections.open", response).await?;
        Ok(connection.url)
    }

    /// JSON-bodied Web API call.
    pub async fn api_call<T: DeserializeOwned>(&self, method: &str, payload: &Value) -> SlackResult<T> {
        debug!(method, "Calling Slack API");
        let response = self
            .client
            .post(self.url(method))
            .bearer_auth(self.bot_token.expose_secret())
            .header("Content-Type", "application/json; charset=utf-8")
            .json(payload)
            .send()
            .await?;
        Self::decode(method, response).await
    }

    /// Form-bodied Web API call, for read methods that reject JSON bodies.
    pub async fn api_form<T: DeserializeOwned>(
        &self,
        method: &str,
        params: &[(&str, &str)],
    ) -> SlackResult<T> {
        debug!(method, "Calling Slack API");
        let response = self
            .client
            .post(self.url(method))
            .bearer_auth(self.bot_token.expose_secret())
            .form(params)
            .send()
            .await?;
        Self::decode(method, response).await
    }

    async fn decode<T: DeserializeOwned>(method: &str, response: reqwest::Response) -> SlackResult<T> {
        if response.status() == 429 {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or(30);
            return Err(SlackError::RateLimited {
                retry_after_secs: retry_after,
            });
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SlackError::Api {
                code: format!("http_{}", status.as_u16()),
                message: format!("{} failed: {}", method, body),
            });
        }

        let body: Value = response.json().await?;
        let envelope: ApiEnvelope = serde_json::from_value(body.clone())?;
        if !envelope.ok {
            let code = envelope.error.unwrap_or_else(|| "unknown".to_string());
            return Err(SlackApiError::new(code.clone(), format!("{} failed: {}", method, code)).into());
        }
        if let Some(warning) = envelope.warning {
            warn!(method, warning = %warning, "Slack API warning");
        }

        Ok(serde_json::from_value(body)?)
    }

    async fn upload_one(&self, file: &UploadFile) -> SlackResult<String> {
        #[derive(Deserialize)]
        struct UploadTarget {
            upload_url: String,
            file_id: String,
        }

        let length = file.data.len().to_string();
        let target: UploadTarget = self
            .api_form(
                "files.getUploadURLExternal",
                &[("filename", file.filename.as_str()), ("length", length.as_str())],
            )
            .await?;

        let part = reqwest::multipart::Part::bytes(file.data.clone()).file_name(file.filename.clone());
        let form = reqwest::multipart::Form::new().part("file", part);
        let response = self
            .client
            .post(&target.upload_url)
            .bearer_auth(self.bot_token.expose_secret())
            .multipart(form)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(SlackError::Api {
                code: format!("http_{}", response.status().as_u16()),
                message: format!("Upload of {} failed", file.filename),
            });
        }

        debug!(file_id = %target.file_id, filename = %file.filename, "Uploaded file");
        Ok(target.file_id)
    }
}

#[async_trait]
impl SlackApi for SlackClient {
    async fn post_message(
        &self,
        channel: &str,
        content: &SlackMessageContent,
    ) -> SlackResult<String> {
        #[derive(Deserialize)]
        struct Posted {
            ts: String,
        }

        let mut payload = serde_json::to_value(content)?;
        payload["channel"] = json!(channel);
        let posted: Posted = self.api_call("chat.postMessage", &payload).await?;
        Ok(posted.ts)
    }

    async fn post_ephemeral(&self, channel: &str, user: &str, text: &str) -> SlackResult<()> {
        let payload = json!({ "channel": channel, "user": user, "text": text });
        let _: Value = self.api_call("chat.postEphemeral", &payload).await?;
        Ok(())
    }

    async fn open_view(&self, trigger_id: &str, view: &SlackView) -> SlackResult<()> {
        let payload = json!({ "trigger_id": trigger_id, "view": view });
        let _: Value = self.api_call("views.open", &payload).await?;
        Ok(())
    }

    async fn push_view(&self, trigger_id: &str, view: &SlackView) -> SlackResult<()> {
        let payload = json!({ "trigger_id": trigger_id, "view": view });
        let _: Value = self.api_call("views.push", &payload).await?;
        Ok(())
    }

    async fn delete_message(&self, channel: &str, ts: &str) -> SlackResult<()> {
        let payload = json!({ "channel": channel, "ts": ts });
        let _: Value = self.api_call("chat.delete", &payload).await?;
        Ok(())
    }

    async fn pin_message(&self, channel: &str, ts: &str) -> SlackResult<()> {
        let payload = json!({ "channel": channel, "timestamp": ts });
        let _: Value = self.api_call("pins.add", &payload).await?;
        Ok(())
    }

    async fn user_info(&self, user: &str) -> SlackResult<UserInfo> {
        #[derive(Deserialize)]
        struct Response {
            user: UserInfo,
        }

        let response: Response = self.api_form("users.info", &[("user", user)]).await?;
        Ok(response.user)
    }

    async fn user_by_email(&self, email: &str) -> SlackResult<UserInfo> {
        #[derive(Deserialize)]
        struct Response {
            user: UserInfo,
        }

        let response: Response = self
            .api_form("users.lookupByEmail", &[("email", email)])
            .await?;
        Ok(response.user)
    }

    async fn conversation_info(&self, channel: &str) -> SlackResult<ConversationInfo> {
        #[derive(Deserialize)]
        struct Response {
            channel: ConversationInfo,
        }

        let response: Response = self
            .api_form(
                "conversations.info",
                &[("channel", channel), ("include_num_members", "true")],
            )
            .await?;
        Ok(response.channel)
    }

    async fn join_conversation(&self, channel: &str) -> SlackResult<ConversationInfo> {
        #[derive(Deserialize)]
        struct Response {
            channel: ConversationInfo,
        }

        let response: Response = self
            .api_call("conversations.join", &json!({ "channel": channel }))
            .await?;
        Ok(response.channel)
    }

    async fn find_channel(&self, name: &str) -> SlackResult<Option<String>> {
        #[derive(Deserialize)]
        struct Page {
            #[serde(default)]
            channels: Vec<ConversationInfo>,
            #[serde(default)]
            response_metadata: ResponseMetadata,
        }

        let name = name.trim_start_matches('#');
        let mut cursor: Option<String> = None;
        loop {
            let mut params = vec![
                ("limit", PAGE_LIMIT),
                ("types", "public_channel,private_channel"),
                ("exclude_archived", "true"),
            ];
            if let Some(cursor) = &cursor {
                params.push(("cursor", cursor.as_str()));
            }
            let page: Page = self.api_form("conversations.list", &params).await?;
            if let Some(found) = page
                .channels
                .into_iter()
                .find(|c| c.name.as_deref() == Some(name))
            {
                return Ok(Some(found.id));
            }
            match page.response_metadata.cursor() {
                Some(next) => cursor = Some(next),
                None => return Ok(None),
            }
        }
    }

    async fn conversation_members(&self, channel: &str) -> SlackResult<Vec<String>> {
        #[derive(Deserialize)]
        struct Page {
            #[serde(default)]
            members: Vec<String>,
            #[serde(default)]
            response_metadata: ResponseMetadata,
        }

        let mut members = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let mut params = vec![("channel", channel), ("limit", PAGE_LIMIT)];
            if let Some(cursor) = &cursor {
                params.push(("cursor", cursor.as_str()));
            }
            let page: Page = self.api_form("conversations.members", &params).await?;
            members.extend(page.members);
            match page.response_metadata.cursor() {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }
        debug!(channel, members = members.len(), "Fetched channel members");
        Ok(members)
    }

    async fn invite_users(&self, channel: &str, users: &[String]) -> SlackResult<()> {
        let payload = json!({ "channel": channel, "users": users.join(","), "force": true });
        let _: Value = self.api_call("conversations.invite", &payload).await?;
        Ok(())
    }

    async fn usergroup_members(&self, usergroup: &str) -> SlackResult<Vec<String>> {
        #[derive(Deserialize)]
        struct Response {
            #[serde(default)]
            users: Vec<String>,
        }

        let response: Response = self
            .api_form("usergroups.users.list", &[("usergroup", usergroup)])
            .await?;
        Ok(response.users)
    }

    async fn update_usergroup(&self, usergroup: &str, users: &[String]) -> SlackResult<()> {
        let payload = json!({ "usergroup": usergroup, "users": users.join(",") });
        let _: Value = self.api_call("usergroups.users.update", &payload).await?;
        Ok(())
    }

    async fn message_metadata(
        &self,
        channel: &str,
        ts: &str,
    ) -> SlackResult<Option<MessageMetadata>> {
        #[derive(Deserialize)]
        struct History {
            #[serde(default)]
            messages: Vec<HistoryMessage>,
        }

        #[derive(Deserialize)]
        struct HistoryMessage {
            #[serde(default)]
            metadata: Option<MessageMetadata>,
        }

        let history: History = self
            .api_form(
                "conversations.history",
                &[
                    ("channel", channel),
                    ("oldest", ts),
                    ("inclusive", "true"),
                    ("limit", "1"),
                    ("include_all_metadata", "true"),
                ],
            )
            .await?;
        Ok(history.messages.into_iter().next().and_then(|m| m.metadata))
    }

    async fn download_file(&self, url: &str) -> SlackResult<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .bearer_auth(self.bot_token.expose_secret())
            .send()
            .await?;

        if response.status() != reqwest::StatusCode::OK {
            return Err(SlackError::Api {
                code: format!("http_{}", response.status().as_u16()),
                message: format!("Download of {} failed", url),
            });
        }
        Ok(response.bytes().await?.to_vec())
    }

    async fn upload_files(
        &self,
        channel: &str,
        thread_ts: Option<&str>,
        files: Vec<UploadFile>,
    ) -> SlackResult<()> {
        if files.is_empty() {
            return Ok(());
        }

        let mut uploaded = Vec::with_capacity(files.len());
        for file in &files {
            let id = self.upload_one(file).await?;
            uploaded.push(json!({ "id": id, "title": file.title }));
        }

        let files_json = serde_json::to_string(&uploaded)?;
        let mut params = vec![("files", files_json.as_str()), ("channel_id", channel)];
        if let Some(ts) = thread_ts {
            params.push(("thread_ts", ts));
        }
        let _: Value = self.api_form("files.completeUploadExternal", &params).await?;
        Ok(())
    }

    async fn respond(&self, response_url: &str, response: &DelayedResponse) -> SlackResult<()> {
        send_delayed_response(&self.client, response_url, response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> SlackClient {
        SlackClient::with_client(reqwest::Client::new(), "xoxb-test", format!("{}/api/", server.uri()))
    }

    #[test]
    fn test_display_name_fallbacks() {
        let mut user = UserInfo {
            id: "U1".into(),
            real_name: Some("Amber Real".into()),
            ..Default::default()
        };
        assert_eq!(user.display_name(), "Amber Real");

        user.profile.display_name = Some(String::new());
        assert_eq!(user.display_name(), "Amber Real");

        user.profile.display_name = Some("amber".into());
        assert_eq!(user.display_name(), "amber");

        let nobody = UserInfo::default();
        assert_eq!(nobody.display_name(), UNKNOWN_USER);
        assert_eq!(nobody.avatar(), None);
    }

    #[tokio::test]
    async fn test_post_message_returns_ts() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat.postMessage"))
            .and(header("authorization", "Bearer xoxb-test"))
            .and(body_partial_json(json!({"channel": "C1", "text": "hi", "username": "amber"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true, "ts": "1700.0001"})))
            .expect(1)
            .mount(&server)
            .await;

        let content = SlackMessageContent::new().with_text("hi").as_user("amber", None);
        let ts = client(&server).post_message("C1", &content).await.unwrap();
        assert_eq!(ts, "1700.0001");
    }

    #[tokio::test]
    async fn test_error_codes_map_to_variants() {
        let server = MockServer::start().await;
        Mock::given(path("/api/conversations.info"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"ok": false, "error": "not_in_channel"})),
            )
            .mount(&server)
            .await;

        let err = client(&server).conversation_info("C1").await.unwrap_err();
        assert!(matches!(err, SlackError::Channel { .. }));
        assert_eq!(err.api_code(), Some("not_in_channel"));
    }

    #[tokio::test]
    async fn test_rate_limit_reads_retry_after() {
        let server = MockServer::start().await;
        Mock::given(path("/api/users.info"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "7"))
            .mount(&server)
            .await;

        let err = client(&server).user_info("U1").await.unwrap_err();
        assert!(matches!(err, SlackError::RateLimited { retry_after_secs: 7 }));
    }

    #[tokio::test]
    async fn test_user_info_form_request() {
        let server = MockServer::start().await;
        Mock::given(path("/api/users.info"))
            .and(body_string_contains("user=U42"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "user": {
                    "id": "U42",
                    "real_name": "Orpheus",
                    "profile": {"display_name": "", "image_512": "https://img/o.png"}
                }
            })))
            .mount(&server)
            .await;

        let user = client(&server).user_info("U42").await.unwrap();
        assert_eq!(user.display_name(), "Orpheus");
        assert_eq!(user.avatar(), Some("https://img/o.png"));
    }

    #[tokio::test]
    async fn test_message_metadata() {
        let server = MockServer::start().await;
        Mock::given(path("/api/conversations.history"))
            .and(body_string_contains("include_all_metadata=true"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "messages": [{
                    "ts": "1.2",
                    "metadata": {"event_type": "spoiler", "event_payload": {"text": "*x*", "poster": "U1"}}
                }]
            })))
            .mount(&server)
            .await;

        let metadata = client(&server).message_metadata("C1", "1.2").await.unwrap().unwrap();
        assert_eq!(metadata.event_type, "spoiler");
        assert_eq!(metadata.event_payload["poster"], "U1");
    }

    #[tokio::test]
    async fn test_download_file_requires_ok_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/files/a.png"))
            .and(header("authorization", "Bearer xoxb-test"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"png".to_vec()))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/files/missing.png"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = client(&server);
        let data = client
            .download_file(&format!("{}/files/a.png", server.uri()))
            .await
            .unwrap();
        assert_eq!(data, b"png");

        let err = client
            .download_file(&format!("{}/files/missing.png", server.uri()))
            .await
            .unwrap_err();
        assert_eq!(err.api_code(), Some("http_404"));
    }

    #[tokio::test]
    async fn test_upload_files_flow() {
        let server = MockServer::start().await;
        Mock::given(path("/api/files.getUploadURLExternal"))
            .and(body_string_contains("filename=a.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "upload_url": format!("{}/upload/F1", server.uri()),
                "file_id": "F1"
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(path("/upload/F1"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(path("/api/files.completeUploadExternal"))
            .and(body_string_contains("channel_id=C1"))
            .and(body_string_contains("thread_ts=1.2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;

        client(&server)
            .upload_files("C1", Some("1.2"), vec![UploadFile::new("a.txt", b"hello".to_vec())])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_upload_nothing_makes_no_calls() {
        let server = MockServer::start().await;
        client(&server).upload_files("C1", None, Vec::new()).await.unwrap();
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_open_socket_url_uses_app_token() {
        let server = MockServer::start().await;
        Mock::given(path("/api/apps.connections.open"))
            .and(header("authorization", "Bearer xapp-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "url": "wss://wss-primary.slack.com/link/?ticket=1"
            })))
            .mount(&server)
            .await;

        let url = client(&server).open_socket_url("xapp-test").await.unwrap();
        assert_eq!(url, "wss://wss-primary.slack.com/link/?ticket=1");
    }

    #[tokio::test]
    async fn test_conversation_members_follows_cursor() {
        let server = MockServer::start().await;
        Mock::given(path("/api/conversations.members"))
            .and(body_string_contains("channel=C1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "members": ["U1", "U2"],
                "response_metadata": {"next_cursor": "page2"}
            })))
            .mount(&server)
            .await;
        Mock::given(path("/api/conversations.members"))
            .and(body_string_contains("cursor=page2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "members": ["U3"],
                "response_metadata": {"next_cursor": ""}
            })))
            .with_priority(1)
            .mount(&server)
            .await;

        let members = client(&server).conversation_members("C1").await.unwrap();
        assert_eq!(members, vec!["U1", "U2", "U3"]);
    }

    #[tokio::test]
    async fn test_find_channel_by_name() {
        let server = MockServer::start().await;
        Mock::given(path("/api/conversations.list"))
            .and(body_string_contains("exclude_archived=true"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "channels": [{"id": "C1", "name": "general"}, {"id": "C2", "name": "lounge"}]
            })))
            .mount(&server)
            .await;

        let client = client(&server);
        assert_eq!(client.find_channel("#lounge").await.unwrap(), Some("C2".to_string()));
        assert_eq!(client.find_channel("nowhere").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_invite_and_usergroup_update_join_ids() {
        let server = MockServer::start().await;
        Mock::given(path("/api/conversations.invite"))
            .and(body_partial_json(json!({"channel": "C1", "users": "U1,U2", "force": true})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(path("/api/usergroups.users.update"))
            .and(body_partial_json(json!({"usergroup": "S1", "users": "U1,U3"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;

        let client = client(&server);
        client
            .invite_users("C1", &["U1".to_string(), "U2".to_string()])
            .await
            .unwrap();
        client
            .update_usergroup("S1", &["U1".to_string(), "U3".to_string()])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_lookup_by_email() {
        let server = MockServer::start().await;
        Mock::given(path("/api/users.lookupByEmail"))
            .and(body_string_contains("email=orpheus%40hackclub.com"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "user": {"id": "U7", "name": "orpheus", "tz": "America/New_York"}
            })))
            .mount(&server)
            .await;

        let user = client(&server).user_by_email("orpheus@hackclub.com").await.unwrap();
        assert_eq!(user.id, "U7");
        assert_eq!(user.tz.as_deref(), Some("America/New_York"));
    }

    #[tokio::test]
    async fn test_pin_and_delete() {
        let server = MockServer::start().await;
        Mock::given(path("/api/pins.add"))
            .and(body_partial_json(json!({"channel": "C1", "timestamp": "1.2"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(path("/api/chat.delete"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"ok": false, "error": "cant_delete_message"})),
            )
            .mount(&server)
            .await;

        let client = client(&server);
        client.pin_message("C1", "1.2").await.unwrap();
        let err = client.delete_message("C1", "1.2").await.unwrap_err();
        assert_eq!(err.api_code(), Some("cant_delete_message"));
    }

    #[tokio::test]
    async fn test_auth_test_failure_is_auth_error() {
        let server = MockServer::start().await;
        Mock::given(path("/api/auth.test"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"ok": false, "error": "invalid_auth"})),
            )
            .mount(&server)
            .await;

        let err = client(&server).auth_test().await.unwrap_err();
        assert!(matches!(err, SlackError::Auth(_)));
    }
}
