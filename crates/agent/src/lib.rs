//! Cortex Agent adapter.
//!
//! - **Client** (`client`) - `AgentInvoker` and the reqwest-backed `CortexAgentClient`
//! - **Context** (`context`) - optional enrichment providers attached to each request
//!
//! Failures are classified into transport, remote, and response-format
//! errors (see `cortex_relay_core::AgentError`). The client never retries.

pub mod client;
pub mod context;

pub use client::{AgentInvoker, AskOrigin, ClientBuildError, CortexAgentClient};
pub use context::{
    provider_from_config, ContextError, ContextProvider, NoContext, SnowflakeContextProvider,
};
