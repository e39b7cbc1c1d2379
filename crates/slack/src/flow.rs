use std::sync::Arc;

use serde_json::Value;
use tracing::{error, info, warn};

use cortex_relay_agent::{AgentInvoker, AskOrigin};
use cortex_relay_core::{
    normalize, DisplayPayload, InteractionEngine, InteractionError, InteractionEvent,
    InteractionState,
};

use crate::api::{SlackApi, SlackApiError};
use crate::blocks::{display_message, failure_message, MessageTemplate};
use crate::events::{EventContext, EventHandlerError};
use crate::views::{
    ask_modal, clear_modal, parse_submission, validation_errors, AskSubmission, ViewSubmission,
};

/// One ask interaction, from opening the modal to posting the answer.
///
/// Every entry point (slash command, message shortcut, "Open Cortex"
/// buttons) goes through [`AskFlow::open`]; every submission goes through
/// [`AskFlow::review`] at ack time and [`AskFlow::run`] afterwards.
pub struct AskFlow {
    api: Arc<dyn SlackApi>,
    invoker: Arc<dyn AgentInvoker>,
    engine: InteractionEngine,
}

impl AskFlow {
    pub fn new(api: Arc<dyn SlackApi>, invoker: Arc<dyn AgentInvoker>) -> Self {
        Self { api, invoker, engine: InteractionEngine::new() }
    }

    pub async fn open(
        &self,
        trigger_id: &str,
        prefill: Option<&str>,
        channel_id: Option<&str>,
        ctx: &EventContext,
    ) -> Result<InteractionState, EventHandlerError> {
        let outcome =
            self.engine.apply(self.engine.initial_state(), InteractionEvent::InputRequested)?;
        self.api.open_view(trigger_id, &ask_modal(prefill, channel_id)).await?;

        info!(
            event_name = "slack.modal.opened",
            correlation_id = %ctx.correlation_id,
            channel_id = channel_id.unwrap_or("unknown"),
            prefilled = prefill.is_some(),
            "opened ask modal"
        );
        Ok(outcome.to)
    }

    /// Ack payload for a submission: inline errors when it is invalid,
    /// otherwise close the modal.
    pub fn review(&self, submission: &ViewSubmission, ctx: &EventContext) -> Value {
        match parse_submission(submission) {
            Ok(_) => clear_modal(),
            Err(rejection) => {
                if let Err(transition) = self
                    .engine
                    .apply(InteractionState::AwaitingInput, InteractionEvent::SubmissionRejected)
                {
                    warn!(
                        correlation_id = %ctx.correlation_id,
                        error = %transition,
                        "unexpected interaction transition"
                    );
                }
                info!(
                    event_name = "slack.submission.rejected",
                    correlation_id = %ctx.correlation_id,
                    user_id = %submission.user_id,
                    reason = %rejection,
                    "modal submission rejected"
                );
                validation_errors(&rejection)
            }
        }
    }

    /// Calls the agent, normalizes the reply and DMs the result (or a
    /// generic failure notice) to the submitting user. The interaction only
    /// reaches a terminal state once the DM is posted.
    pub async fn run(
        &self,
        submission: AskSubmission,
        ctx: &EventContext,
    ) -> Result<InteractionState, EventHandlerError> {
        let dispatched = self
            .engine
            .apply(InteractionState::AwaitingInput, InteractionEvent::SubmissionAccepted)?
            .to;

        let (event, message) = match self.ask(&submission, ctx).await {
            Ok(payload) => (InteractionEvent::AnswerDelivered, display_message(&payload)),
            Err(failure) => {
                error!(
                    event_name = "slack.ask.failed",
                    correlation_id = %ctx.correlation_id,
                    user_id = %submission.user_id,
                    error_kind = failure.kind(),
                    error = %failure,
                    "cortex request failed"
                );
                (
                    InteractionEvent::DispatchFailed,
                    failure_message(failure.user_message(), &ctx.correlation_id),
                )
            }
        };
        if let Err(delivery) = self.deliver(&submission.user_id, &message).await {
            error!(
                event_name = "slack.ask.undelivered",
                correlation_id = %ctx.correlation_id,
                user_id = %submission.user_id,
                outcome = ?event,
                error = %delivery,
                "could not deliver cortex result; the user saw nothing"
            );
            return Err(delivery.into());
        }
        let outcome = self.engine.apply(dispatched, event)?;

        info!(
            event_name = "slack.ask.settled",
            correlation_id = %ctx.correlation_id,
            user_id = %submission.user_id,
            state = ?outcome.to,
            "posted cortex result"
        );
        Ok(outcome.to)
    }

    async fn deliver(
        &self,
        user_id: &str,
        message: &MessageTemplate,
    ) -> Result<(), SlackApiError> {
        let dm_channel = self.api.open_direct_message(user_id).await?;
        self.api.post_message(&dm_channel, message).await
    }

    async fn ask(
        &self,
        submission: &AskSubmission,
        ctx: &EventContext,
    ) -> Result<DisplayPayload, InteractionError> {
        let origin = AskOrigin {
            user_id: Some(submission.user_id.as_str()),
            channel_id: submission.channel_id.as_deref(),
            context: submission.context.as_deref(),
            correlation_id: &ctx.correlation_id,
        };
        let response = self.invoker.invoke(&submission.question, origin).await?;
        Ok(normalize(&response)?)
    }
}
