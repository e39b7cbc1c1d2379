use serde::{Deserialize, Serialize};

/// Lifecycle of one ask interaction, from trigger to posted result.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionState {
    Idle,
    AwaitingInput,
    Dispatched,
    Completed,
    Failed,
}

impl InteractionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionEvent {
    /// Slash command, message shortcut, or an "Open Cortex" button.
    InputRequested,
    /// Modal submitted with an empty question.
    SubmissionRejected,
    /// Modal submitted with a usable question.
    SubmissionAccepted,
    AnswerDelivered,
    DispatchFailed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionAction {
    OpenModal,
    ReturnValidationErrors,
    ClearModal,
    InvokeAgent,
    PostAnswer,
    PostFailureNotice,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub from: InteractionState,
    pub to: InteractionState,
    pub event: InteractionEvent,
    pub actions: Vec<InteractionAction>,
}
