use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

use cortex_relay_core::config::AgentConfig;
use cortex_relay_core::{AgentError, AgentResponse, AskRequest, Question};

use crate::context::{ContextProvider, NoContext};

/// Everything the Slack side knows about a question at dispatch time.
#[derive(Clone, Copy, Debug, Default)]
pub struct AskOrigin<'a> {
    pub user_id: Option<&'a str>,
    pub channel_id: Option<&'a str>,
    pub context: Option<&'a str>,
    pub correlation_id: &'a str,
}

#[async_trait]
pub trait AgentInvoker: Send + Sync {
    async fn invoke(
        &self,
        question: &Question,
        origin: AskOrigin<'_>,
    ) -> Result<AgentResponse, AgentError>;
}

#[derive(Debug, Error)]
#[error("failed to build agent http client: {0}")]
pub struct ClientBuildError(#[from] reqwest::Error);

/// HTTP adapter for the Cortex Agent endpoint.
///
/// One POST per question, bearer-authenticated, bounded by the configured
/// timeout. No retries.
pub struct CortexAgentClient {
    http: reqwest::Client,
    endpoint: String,
    endpoint_host: String,
    api_key: SecretString,
    context_provider: Arc<dyn ContextProvider>,
}

impl CortexAgentClient {
    pub fn new(config: &AgentConfig) -> Result<Self, ClientBuildError> {
        let http =
            reqwest::Client::builder().timeout(Duration::from_secs(config.timeout_secs)).build()?;

        Ok(Self {
            http,
            endpoint: config.url.clone(),
            endpoint_host: config.endpoint_host().to_owned(),
            api_key: config.api_key.clone(),
            context_provider: Arc::new(NoContext),
        })
    }

    pub fn with_context_provider(mut self, provider: Arc<dyn ContextProvider>) -> Self {
        self.context_provider = provider;
        self
    }

    pub fn endpoint_host(&self) -> &str {
        &self.endpoint_host
    }

    async fn build_request(&self, question: &Question, origin: AskOrigin<'_>) -> AskRequest {
        let enrichment = match self.context_provider.enrichment().await {
            Ok(enrichment) => enrichment,
            Err(error) => {
                warn!(
                    event_name = "agent.enrichment.failed",
                    correlation_id = %origin.correlation_id,
                    provider = self.context_provider.name(),
                    error = %error,
                    "continuing without enrichment"
                );
                None
            }
        };

        AskRequest::new(question.clone(), origin.user_id, origin.channel_id, origin.context)
            .with_enrichment(enrichment)
    }
}

#[async_trait]
impl AgentInvoker for CortexAgentClient {
    async fn invoke(
        &self,
        question: &Question,
        origin: AskOrigin<'_>,
    ) -> Result<AgentResponse, AgentError> {
        let request = self.build_request(question, origin).await;
        let started = Instant::now();

        info!(
            event_name = "agent.request.started",
            correlation_id = %origin.correlation_id,
            endpoint_host = %self.endpoint_host,
            has_context = request.context.is_some(),
            has_enrichment = request.enrichment.is_some(),
            "calling cortex agent"
        );

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(self.api_key.expose_secret())
            .header(ACCEPT, "application/json")
            .json(&request)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let error = AgentError::remote(status.as_u16(), &body);
            warn!(
                event_name = "agent.request.rejected",
                correlation_id = %origin.correlation_id,
                status = status.as_u16(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "cortex agent returned an error status"
            );
            return Err(error);
        }

        let bytes = response.bytes().await.map_err(transport_error)?;
        let decoded = decode_response(&bytes)?;

        info!(
            event_name = "agent.request.completed",
            correlation_id = %origin.correlation_id,
            status = status.as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "cortex agent replied"
        );

        Ok(decoded)
    }
}

fn transport_error(error: reqwest::Error) -> AgentError {
    if error.is_timeout() {
        AgentError::Transport(format!("request timed out: {error}"))
    } else {
        AgentError::Transport(error.to_string())
    }
}

fn decode_response(bytes: &[u8]) -> Result<AgentResponse, AgentError> {
    let value: Value = serde_json::from_slice(bytes)
        .map_err(|error| AgentError::ResponseFormat(error.to_string()))?;

    if !value.is_object() {
        return Err(AgentError::ResponseFormat(format!(
            "expected a JSON object, found {}",
            json_kind(&value)
        )));
    }

    serde_json::from_value(value).map_err(|error| AgentError::ResponseFormat(error.to_string()))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
