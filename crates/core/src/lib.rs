//! Core of cortex-relay: configuration, the ask data model, and the pure
//! logic shared by the agent adapter and the Slack handlers.
//!
//! - **Config** (`config`) - layered defaults/file/env/overrides loading with fail-fast validation
//! - **Domain** (`domain`) - `Question`, `AskRequest`, `AgentResponse`
//! - **Normalizer** (`normalize`) - agent reply → single `DisplayPayload`
//! - **Flows** (`flows`) - per-interaction state machine
//! - **Errors** (`errors`) - validation, agent, and interaction error taxonomy

pub mod config;
pub mod domain;
pub mod errors;
pub mod flows;
pub mod normalize;

pub use domain::ask::{AgentResponse, AskMetadata, AskRequest, Question, ASK_SOURCE};
pub use errors::{
    AgentError, EmptyResponseError, InteractionError, ValidationError, REMOTE_BODY_LIMIT,
};
pub use flows::{InteractionAction, InteractionEngine, InteractionEvent, InteractionState};
pub use normalize::{normalize, DisplayPayload, TextStyle};
