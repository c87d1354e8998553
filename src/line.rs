use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::debug;

use crate::config::Config;

pub mod events;

pub use self::events::{EventSource, MessageContent, WebhookEnvelope, WebhookEvent};

/// Webhook requests must carry this header; a request without it is rejected
/// before any event is extracted.
pub const SIGNATURE_HEADER: &str = "X-Line-Signature";

#[derive(Error, Debug)]
pub enum LineError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("API error: status {status}, body {body}")]
    Api { status: u16, body: String },

    #[error("Malformed response: {0}")]
    Malformed(String),
}

/// Display-name lookup for a LINE user. The dispatcher never inspects the
/// error detail, only whether the call succeeded.
#[async_trait]
pub trait ProfileResolver: Send + Sync {
    async fn display_name(&self, line_user_id: &str) -> Result<String, LineError>;
}

/// Outbound reply channel keyed by a single-use reply token.
#[async_trait]
pub trait ReplySender: Send + Sync {
    async fn send_reply(&self, reply_token: &str, text: &str) -> Result<(), LineError>;
}

#[derive(Deserialize)]
struct ProfileResponse {
    #[serde(rename = "displayName")]
    display_name: String,
}

/// Thin reqwest client for the LINE Messaging API.
#[derive(Clone)]
pub struct LineClient {
    http: reqwest::Client,
    api_base_url: String,
    channel_access_token: String,
}

impl LineClient {
    pub fn new(config: Arc<Config>) -> Result<Self, LineError> {
        let http = reqwest::Client::builder()
            .user_agent("line-checkin-bot")
            .timeout(Duration::from_secs(config.limits.http_timeout_secs))
            .build()
            .map_err(|e| LineError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            api_base_url: config.line.api_base_url.trim_end_matches('/').to_string(),
            channel_access_token: config.line.channel_access_token.clone(),
        })
    }

    async fn send_message(&self, path: &str, body: serde_json::Value) -> Result<(), LineError> {
        let response = self
            .http
            .post(format!("{}{}", self.api_base_url, path))
            .bearer_auth(&self.channel_access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| LineError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LineError::Api {
                status: status.as_u16(),
                body,
            });
        }

        Ok(())
    }

    /// Sends a push message to a user outside the reply-token window.
    pub async fn push_message(&self, line_user_id: &str, text: &str) -> Result<(), LineError> {
        debug!(line_user_id, "sending push message");
        self.send_message(
            "/v2/bot/message/push",
            json!({
                "to": line_user_id,
                "messages": [{ "type": "text", "text": text }],
            }),
        )
        .await
    }
}

#[async_trait]
impl ProfileResolver for LineClient {
    async fn display_name(&self, line_user_id: &str) -> Result<String, LineError> {
        let response = self
            .http
            .get(format!("{}/v2/bot/profile/{}", self.api_base_url, line_user_id))
            .bearer_auth(&self.channel_access_token)
            .send()
            .await
            .map_err(|e| LineError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LineError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let profile: ProfileResponse = response
            .json()
            .await
            .map_err(|e| LineError::Malformed(e.to_string()))?;

        Ok(profile.display_name)
    }
}

#[async_trait]
impl ReplySender for LineClient {
    async fn send_reply(&self, reply_token: &str, text: &str) -> Result<(), LineError> {
        debug!("sending reply message");
        self.send_message(
            "/v2/bot/message/reply",
            json!({
                "replyToken": reply_token,
                "messages": [{ "type": "text", "text": text }],
            }),
        )
        .await
    }
}
