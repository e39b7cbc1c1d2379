use thiserror::Error;

/// Longest slice of a remote error body kept for diagnostics.
pub const REMOTE_BODY_LIMIT: usize = 512;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("question must not be empty")]
    EmptyQuestion,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum AgentError {
    #[error("agent transport failure: {0}")]
    Transport(String),
    #[error("agent returned HTTP {status}: {body}")]
    Remote { status: u16, body: String },
    #[error("agent response was not valid JSON: {0}")]
    ResponseFormat(String),
}

impl AgentError {
    pub fn remote(status: u16, body: &str) -> Self {
        Self::Remote { status, body: truncate_body(body, REMOTE_BODY_LIMIT) }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("agent response contained no blocks, rich_text, answer, or message")]
pub struct EmptyResponseError;

/// Failure of one dispatched interaction. Never fatal to the process.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InteractionError {
    #[error(transparent)]
    Agent(#[from] AgentError),
    #[error(transparent)]
    EmptyResponse(#[from] EmptyResponseError),
}

impl InteractionError {
    /// Stable class name for structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Agent(AgentError::Transport(_)) => "transport_error",
            Self::Agent(AgentError::Remote { .. }) => "remote_error",
            Self::Agent(AgentError::ResponseFormat(_)) => "response_format_error",
            Self::EmptyResponse(_) => "empty_response_error",
        }
    }

    /// The only text a Slack user ever sees for a failed interaction.
    pub fn user_message(&self) -> &'static str {
        "Sorry, I couldn't complete that request. Please try again in a moment."
    }
}

fn truncate_body(body: &str, limit: usize) -> String {
    match body.char_indices().nth(limit) {
        Some((index, _)) => format!("{}…", &body[..index]),
        None => body.to_owned(),
    }
}
