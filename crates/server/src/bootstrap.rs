use std::sync::Arc;

use cortex_relay_agent::{provider_from_config, ClientBuildError, CortexAgentClient};
use cortex_relay_core::config::AppConfig;
use cortex_relay_slack::api::WebApiClient;
use cortex_relay_slack::events::default_dispatcher;
use cortex_relay_slack::socket::{ReconnectPolicy, SocketModeRunner};
use cortex_relay_slack::transport::WebSocketTransport;
use thiserror::Error;
use tracing::info;

pub struct Application {
    pub config: AppConfig,
    pub slack_runner: SocketModeRunner,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("could not build the cortex agent client: {0}")]
    AgentClient(#[from] ClientBuildError),
}

/// Wires the agent client, Slack Web API, and Socket Mode runner from an
/// already validated config.
pub fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let context_provider = provider_from_config(&config.snowflake);
    let enrichment = context_provider.name();
    let agent =
        CortexAgentClient::new(&config.agent)?.with_context_provider(context_provider);
    info!(
        event_name = "system.bootstrap.agent_ready",
        correlation_id = "bootstrap",
        endpoint_host = agent.endpoint_host(),
        timeout_secs = config.agent.timeout_secs,
        enrichment,
        "cortex agent client ready"
    );

    let api = Arc::new(WebApiClient::new(config.slack.bot_token.clone()));
    let dispatcher = default_dispatcher(api, Arc::new(agent), config.slack.command.clone());
    info!(
        event_name = "system.bootstrap.handlers_registered",
        correlation_id = "bootstrap",
        handler_count = dispatcher.handler_count(),
        "slack handlers registered"
    );

    let transport = Arc::new(WebSocketTransport::new(config.slack.app_token.clone()));
    let slack_runner = SocketModeRunner::new(transport, dispatcher, ReconnectPolicy::default());

    Ok(Application { config, slack_runner })
}
