use crate::{
    config::SlackConfig,
    error::{RelayError, Result},
    traits::{ChannelClient, FileUpload},
};
use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde_json::{json, Value};
use slack_morphism::prelude::*;
use std::sync::Arc;
use std::time::Duration;

/// Slack Web API side of the relay.
pub struct SlackChannel {
    client: Arc<SlackHyperClient>,
    token: SlackApiToken,
    raw_token: String,
    http: HttpClient,
    api_base: String,
}

impl SlackChannel {
    /// `request_timeout` bounds each HTTP call of the file upload flow.
    pub fn new(
        client: Arc<SlackHyperClient>,
        config: &SlackConfig,
        request_timeout: Duration,
    ) -> Result<Self> {
        let raw_token = config.bot_token()?.to_string();
        Ok(Self {
            client,
            token: SlackApiToken::new(raw_token.clone().into()),
            raw_token,
            http: upload_http_client(request_timeout)?,
            api_base: config.api_base.clone(),
        })
    }

    /// Confirms the bot can see the target channel and returns its name.
    pub async fn check_channel_access(&self, channel: &str) -> Result<String> {
        let session = self.client.open_session(&self.token);
        let response = session
            .conversations_info(&SlackApiConversationsInfoRequest::new(SlackChannelId(
                channel.to_string(),
            )))
            .await
            .map_err(|e| RelayError::SlackError(format!("conversations.info: {}", e)))?;

        Ok(response
            .channel
            .name
            .unwrap_or_else(|| "unknown".to_string()))
    }

    /// The bot's own user id, as reported by `auth.test`.
    pub async fn resolve_bot_user_id(&self) -> Result<String> {
        let session = self.client.open_session(&self.token);
        let response = session
            .auth_test()
            .await
            .map_err(|e| RelayError::SlackError(format!("auth.test: {}", e)))?;
        Ok(response.user_id.0)
    }
}

#[async_trait]
impl ChannelClient for SlackChannel {
    async fn post_message(&self, channel: &str, text: &str) -> Result<()> {
        let session = self.client.open_session(&self.token);
        let request = SlackApiChatPostMessageRequest::new(
            SlackChannelId(channel.to_string()),
            SlackMessageContent::new().with_text(text.to_string()),
        );
        session
            .chat_post_message(&request)
            .await
            .map_err(|e| RelayError::SlackError(format!("chat.postMessage: {}", e)))?;
        Ok(())
    }

    async fn upload_file(&self, upload: FileUpload<'_>) -> Result<()> {
        upload_file_external(&self.http, &self.raw_token, &self.api_base, upload).await
    }
}

fn upload_http_client(timeout: Duration) -> Result<HttpClient> {
    Ok(HttpClient::builder().timeout(timeout).build()?)
}

fn ensure_ok(api_method: &str, body: Value) -> Result<Value> {
    if body["ok"].as_bool().unwrap_or(false) {
        Ok(body)
    } else {
        Err(RelayError::SlackError(format!(
            "{}: {}",
            api_method,
            body["error"].as_str().unwrap_or("unknown")
        )))
    }
}

/// Upload a staged file with Slack's external upload flow:
/// 1. `files.getUploadURLExternal` for a pre-signed URL and file id
/// 2. POST the raw bytes to that URL
/// 3. `files.completeUploadExternal` to share it in the channel with a caption
///
/// `api_base` is `https://slack.com` in production.
pub async fn upload_file_external(
    http: &HttpClient,
    token: &str,
    api_base: &str,
    upload: FileUpload<'_>,
) -> Result<()> {
    let bytes = tokio::fs::read(upload.path).await?;
    let length = bytes.len().to_string();

    let get_url: Value = http
        .post(format!("{}/api/files.getUploadURLExternal", api_base))
        .bearer_auth(token)
        .form(&[("filename", upload.filename), ("length", length.as_str())])
        .send()
        .await?
        .json()
        .await?;
    let get_url = ensure_ok("files.getUploadURLExternal", get_url)?;

    let upload_url = get_url["upload_url"]
        .as_str()
        .ok_or_else(|| RelayError::SlackError("missing upload_url in Slack response".into()))?;
    let file_id = get_url["file_id"]
        .as_str()
        .ok_or_else(|| RelayError::SlackError("missing file_id in Slack response".into()))?;

    let put = http
        .post(upload_url)
        .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
        .body(bytes)
        .send()
        .await?;
    if !put.status().is_success() {
        return Err(RelayError::SlackError(format!(
            "file upload returned {}",
            put.status()
        )));
    }

    let mut body = json!({
        "files": [{"id": file_id, "title": upload.title}],
        "channel_id": upload.channel,
    });
    if !upload.caption.is_empty() {
        body["initial_comment"] = Value::String(upload.caption.to_string());
    }

    let complete: Value = http
        .post(format!("{}/api/files.completeUploadExternal", api_base))
        .bearer_auth(token)
        .json(&body)
        .send()
        .await?
        .json()
        .await?;
    ensure_ok("files.completeUploadExternal", complete)?;

    log::debug!("Uploaded {} as {} to {}", upload.filename, file_id, upload.channel);
    Ok(())
}
