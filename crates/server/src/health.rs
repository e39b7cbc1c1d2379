use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;
use tracing::{error, info};

#[derive(Clone)]
pub struct HealthState {
    endpoint_host: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AgentCheck {
    pub endpoint_host: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub agent: AgentCheck,
    pub checked_at: String,
}

pub fn router(endpoint_host: impl Into<String>) -> Router {
    Router::new()
        .route("/health", get(health))
        .with_state(HealthState { endpoint_host: endpoint_host.into() })
}

pub async fn spawn(bind_address: &str, port: u16, endpoint_host: &str) -> std::io::Result<()> {
    let address = format!("{bind_address}:{port}");
    let listener = tokio::net::TcpListener::bind(&address).await?;

    info!(
        event_name = "system.health.start",
        correlation_id = "bootstrap",
        bind_address = %address,
        "health endpoint started"
    );

    let app = router(endpoint_host);
    tokio::spawn(async move {
        if let Err(error) = axum::serve(listener, app).await {
            error!(
                event_name = "system.health.error",
                correlation_id = "bootstrap",
                error = %error,
                "health endpoint server terminated unexpectedly"
            );
        }
    });

    Ok(())
}

/// Liveness only; the agent is not called, its host is reported so operators
/// can see where questions go.
pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let payload = HealthResponse {
        status: "ready",
        service: HealthCheck {
            status: "ready",
            detail: "cortex-relay runtime initialized".to_string(),
        },
        agent: AgentCheck { endpoint_host: state.endpoint_host },
        checked_at: Utc::now().to_rfc3339(),
    };

    (StatusCode::OK, Json(payload))
}
