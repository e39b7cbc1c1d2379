use thiserror::Error;

use crate::flows::states::{
    InteractionAction, InteractionEvent, InteractionState, TransitionOutcome,
};

#[derive(Clone, Debug, Default)]
pub struct InteractionEngine;

impl InteractionEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn initial_state(&self) -> InteractionState {
        InteractionState::Idle
    }

    pub fn apply(
        &self,
        current: InteractionState,
        event: InteractionEvent,
    ) -> Result<TransitionOutcome, InteractionTransitionError> {
        transition(current, event)
    }

    /// Replays a sequence of events from the initial state.
    pub fn replay<I>(&self, events: I) -> Result<InteractionState, InteractionTransitionError>
    where
        I: IntoIterator<Item = InteractionEvent>,
    {
        events
            .into_iter()
            .try_fold(self.initial_state(), |state, event| Ok(self.apply(state, event)?.to))
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InteractionTransitionError {
    #[error("invalid interaction transition from {state:?} using event {event:?}")]
    InvalidTransition { state: InteractionState, event: InteractionEvent },
}

fn transition(
    current: InteractionState,
    event: InteractionEvent,
) -> Result<TransitionOutcome, InteractionTransitionError> {
    use InteractionAction::{
        ClearModal, InvokeAgent, OpenModal, PostAnswer, PostFailureNotice, ReturnValidationErrors,
    };
    use InteractionEvent::{
        AnswerDelivered, DispatchFailed, InputRequested, SubmissionAccepted, SubmissionRejected,
    };
    use InteractionState::{AwaitingInput, Completed, Dispatched, Failed, Idle};

    let (to, actions) = match (current, event) {
        (Idle, InputRequested) => (AwaitingInput, vec![OpenModal]),
        (AwaitingInput, SubmissionRejected) => (AwaitingInput, vec![ReturnValidationErrors]),
        (AwaitingInput, SubmissionAccepted) => (Dispatched, vec![ClearModal, InvokeAgent]),
        (Dispatched, AnswerDelivered) => (Completed, vec![PostAnswer]),
        (Dispatched, DispatchFailed) => (Failed, vec![PostFailureNotice]),
        _ => {
            return Err(InteractionTransitionError::InvalidTransition { state: current, event });
        }
    };

    Ok(TransitionOutcome { from: current, to, event, actions })
}
