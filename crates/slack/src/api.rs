use async_trait::async_trait;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::debug;

use crate::blocks::MessageTemplate;
use crate::views::View;

pub const SLACK_API_BASE_URL: &str = "https://slack.com/api";

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SlackApiError {
    #[error("slack {method} request failed: {detail}")]
    Http { method: String, detail: String },
    #[error("slack {method} returned HTTP {status}")]
    Status { method: String, status: u16 },
    #[error("slack {method} rate limited; retry after {retry_after_secs}s")]
    RateLimited { method: String, retry_after_secs: u64 },
    #[error("slack {method} failed: {error}")]
    Api { method: String, error: String },
    #[error("slack {method} response missing {field}")]
    MissingField { method: String, field: &'static str },
}

/// The Slack Web API calls the bot makes.
#[async_trait]
pub trait SlackApi: Send + Sync {
    async fn open_view(&self, trigger_id: &str, view: &View) -> Result<(), SlackApiError>;

    async fn publish_home(&self, user_id: &str, view: &View) -> Result<(), SlackApiError>;

    /// Returns the id of the DM channel with `user_id`.
    async fn open_direct_message(&self, user_id: &str) -> Result<String, SlackApiError>;

    async fn post_message(
        &self,
        channel_id: &str,
        message: &MessageTemplate,
    ) -> Result<(), SlackApiError>;
}

pub struct WebApiClient {
    http: reqwest::Client,
    base_url: String,
    bot_token: SecretString,
}

impl WebApiClient {
    pub fn new(bot_token: SecretString) -> Self {
        Self::with_base_url(bot_token, SLACK_API_BASE_URL)
    }

    pub fn with_base_url(bot_token: SecretString, base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            bot_token,
        }
    }

    async fn call(&self, method: &str, payload: &Value) -> Result<Value, SlackApiError> {
        let response = self
            .http
            .post(format!("{}/{method}", self.base_url))
            .bearer_auth(self.bot_token.expose_secret())
            .json(payload)
            .send()
            .await
            .map_err(|error| SlackApiError::Http {
                method: method.to_owned(),
                detail: error.to_string(),
            })?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.parse().ok())
                .unwrap_or(30);
            return Err(SlackApiError::RateLimited { method: method.to_owned(), retry_after_secs });
        }
        if !status.is_success() {
            return Err(SlackApiError::Status { method: method.to_owned(), status: status.as_u16() });
        }

        let body: Value = response.json().await.map_err(|error| SlackApiError::Http {
            method: method.to_owned(),
            detail: error.to_string(),
        })?;
        check_ok(method, body)
    }
}

/// Slack reports failures as `200 {"ok": false, "error": "..."}`.
pub(crate) fn check_ok(method: &str, body: Value) -> Result<Value, SlackApiError> {
    if body.get("ok").and_then(Value::as_bool) == Some(true) {
        debug!(method, "slack api call succeeded");
        return Ok(body);
    }

    let error = body.get("error").and_then(Value::as_str).unwrap_or("unknown_error").to_owned();
    Err(SlackApiError::Api { method: method.to_owned(), error })
}

#[async_trait]
impl SlackApi for WebApiClient {
    async fn open_view(&self, trigger_id: &str, view: &View) -> Result<(), SlackApiError> {
        self.call("views.open", &json!({"trigger_id": trigger_id, "view": view})).await?;
        Ok(())
    }

    async fn publish_home(&self, user_id: &str, view: &View) -> Result<(), SlackApiError> {
        self.call("views.publish", &json!({"user_id": user_id, "view": view})).await?;
        Ok(())
    }

    async fn open_direct_message(&self, user_id: &str) -> Result<String, SlackApiError> {
        let method = "conversations.open";
        let body = self.call(method, &json!({"users": user_id})).await?;
        body.pointer("/channel/id")
            .and_then(Value::as_str)
            .map(str::to_owned)
            .ok_or(SlackApiError::MissingField { method: method.to_owned(), field: "channel.id" })
    }

    async fn post_message(
        &self,
        channel_id: &str,
        message: &MessageTemplate,
    ) -> Result<(), SlackApiError> {
        self.call(
            "chat.postMessage",
            &json!({
                "channel": channel_id,
                "text": message.fallback_text,
                "blocks": message.blocks,
            }),
        )
        .await?;
        Ok(())
    }
}
