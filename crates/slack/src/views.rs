//! Modal and home-tab views, and parsing of modal submissions.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use cortex_relay_core::{Question, ValidationError};

use crate::blocks::{
    Block, ButtonElement, ButtonStyle, MessageBuilder, PlainTextInput, TextObject,
};

pub const ASK_MODAL_CALLBACK_ID: &str = "cortex_modal_submit";
pub const MESSAGE_SHORTCUT_CALLBACK_ID: &str = "cortex_message_shortcut";
pub const OPEN_FROM_HOME_ACTION_ID: &str = "open_cortex_modal_from_home";
pub const OPEN_FROM_MESSAGE_ACTION_ID: &str = "open_cortex_modal_from_message";

pub const QUESTION_BLOCK_ID: &str = "query_block";
pub const QUESTION_ACTION_ID: &str = "query_input";
pub const CONTEXT_BLOCK_ID: &str = "context_block";
pub const CONTEXT_ACTION_ID: &str = "context_input";

pub const EMPTY_QUESTION_HINT: &str = "Please enter a question.";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum View {
    Modal {
        callback_id: String,
        title: TextObject,
        submit: TextObject,
        close: TextObject,
        #[serde(skip_serializing_if = "String::is_empty")]
        private_metadata: String,
        blocks: Vec<Block>,
    },
    Home {
        blocks: Vec<Block>,
    },
}

/// The ask modal. `prefill` seeds the question; `channel_id` rides along in
/// `private_metadata` so the submission knows where it came from.
pub fn ask_modal(prefill: Option<&str>, channel_id: Option<&str>) -> View {
    let blocks = MessageBuilder::new("")
        .input(
            QUESTION_BLOCK_ID,
            "Question",
            PlainTextInput::new(QUESTION_ACTION_ID)
                .multiline()
                .placeholder("Ask your data assistant...")
                .initial_value(prefill),
            false,
        )
        .input(
            CONTEXT_BLOCK_ID,
            "Context (optional)",
            PlainTextInput::new(CONTEXT_ACTION_ID)
                .multiline()
                .placeholder("Extra details, filters, or instructions"),
            true,
        )
        .into_blocks();

    View::Modal {
        callback_id: ASK_MODAL_CALLBACK_ID.to_owned(),
        title: TextObject::plain("Cortex Agent"),
        submit: TextObject::plain("Ask"),
        close: TextObject::plain("Cancel"),
        private_metadata: channel_id.unwrap_or_default().to_owned(),
        blocks,
    }
}

pub fn home_view() -> View {
    let blocks = MessageBuilder::new("")
        .section("cortex.home.welcome.v1", |section| {
            section.mrkdwn(
                "Welcome to Cortex Agent for Slack. Use /cortex anywhere, or open the modal below to ask a question.",
            );
        })
        .divider()
        .actions("cortex.home.actions.v1", |actions| {
            actions.button(
                ButtonElement::new(OPEN_FROM_HOME_ACTION_ID, "Open Cortex")
                    .style(ButtonStyle::Primary),
            );
        })
        .context("cortex.home.tip.v1", |context| {
            context.mrkdwn(
                "Tip: Select any message and choose ‘Ask Cortex about this’ to analyze it.",
            );
        })
        .into_blocks();

    View::Home { blocks }
}

/// Submitted input values keyed by block id, then action id.
pub type ViewStateValues = HashMap<String, HashMap<String, InputValue>>;

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct InputValue {
    #[serde(default)]
    pub value: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ViewSubmission {
    pub callback_id: String,
    pub user_id: String,
    pub private_metadata: String,
    pub values: ViewStateValues,
}

impl ViewSubmission {
    fn value(&self, block_id: &str, action_id: &str) -> Option<&str> {
        self.values.get(block_id)?.get(action_id)?.value.as_deref()
    }
}

/// A validated modal submission, ready to dispatch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AskSubmission {
    pub question: Question,
    pub context: Option<String>,
    pub user_id: String,
    pub channel_id: Option<String>,
}

pub fn parse_submission(submission: &ViewSubmission) -> Result<AskSubmission, ValidationError> {
    let question =
        Question::parse(submission.value(QUESTION_BLOCK_ID, QUESTION_ACTION_ID).unwrap_or_default())?;
    let context = submission
        .value(CONTEXT_BLOCK_ID, CONTEXT_ACTION_ID)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_owned);
    let channel_id = Some(submission.private_metadata.trim())
        .filter(|value| !value.is_empty())
        .map(str::to_owned);

    Ok(AskSubmission { question, context, user_id: submission.user_id.clone(), channel_id })
}

/// Ack payload that keeps the modal open with an inline error.
pub fn validation_errors(error: &ValidationError) -> Value {
    let hint = match error {
        ValidationError::EmptyQuestion => EMPTY_QUESTION_HINT,
    };
    json!({"response_action": "errors", "errors": {QUESTION_BLOCK_ID: hint}})
}

pub fn clear_modal() -> Value {
    json!({"response_action": "clear"})
}
