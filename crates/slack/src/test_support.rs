//! In-memory fakes shared by the handler, flow, and runner tests.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use cortex_relay_agent::{AgentInvoker, AskOrigin};
use cortex_relay_core::{AgentError, AgentResponse, Question};

use crate::api::{SlackApi, SlackApiError};
use crate::blocks::MessageTemplate;
use crate::views::{InputValue, View, ViewSubmission, ASK_MODAL_CALLBACK_ID};

#[derive(Clone, Debug, PartialEq)]
pub enum SlackCall {
    OpenView { trigger_id: String, view: View },
    PublishHome { user_id: String, view: View },
    OpenDirectMessage { user_id: String },
    PostMessage { channel_id: String, message: MessageTemplate },
}

#[derive(Default)]
pub struct RecordingSlackApi {
    calls: Mutex<Vec<SlackCall>>,
    post_error: Option<String>,
}

impl RecordingSlackApi {
    /// `chat.postMessage` answers `ok: false` with `error`; nothing is recorded.
    pub fn rejecting_posts(error: &str) -> Self {
        Self { calls: Mutex::new(Vec::new()), post_error: Some(error.to_owned()) }
    }

    pub async fn calls(&self) -> Vec<SlackCall> {
        self.calls.lock().await.clone()
    }

    pub async fn posted_messages(&self) -> Vec<(String, MessageTemplate)> {
        self.calls
            .lock()
            .await
            .iter()
            .filter_map(|call| match call {
                SlackCall::PostMessage { channel_id, message } => {
                    Some((channel_id.clone(), message.clone()))
                }
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl SlackApi for RecordingSlackApi {
    async fn open_view(&self, trigger_id: &str, view: &View) -> Result<(), SlackApiError> {
        self.calls
            .lock()
            .await
            .push(SlackCall::OpenView { trigger_id: trigger_id.to_owned(), view: view.clone() });
        Ok(())
    }

    async fn publish_home(&self, user_id: &str, view: &View) -> Result<(), SlackApiError> {
        self.calls
            .lock()
            .await
            .push(SlackCall::PublishHome { user_id: user_id.to_owned(), view: view.clone() });
        Ok(())
    }

    async fn open_direct_message(&self, user_id: &str) -> Result<String, SlackApiError> {
        self.calls
            .lock()
            .await
            .push(SlackCall::OpenDirectMessage { user_id: user_id.to_owned() });
        Ok(format!("D-{user_id}"))
    }

    async fn post_message(
        &self,
        channel_id: &str,
        message: &MessageTemplate,
    ) -> Result<(), SlackApiError> {
        if let Some(error) = &self.post_error {
            return Err(SlackApiError::Api {
                method: "chat.postMessage".to_owned(),
                error: error.clone(),
            });
        }
        self.calls.lock().await.push(SlackCall::PostMessage {
            channel_id: channel_id.to_owned(),
            message: message.clone(),
        });
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InvokeRecord {
    pub question: String,
    pub user_id: Option<String>,
    pub channel_id: Option<String>,
    pub context: Option<String>,
}

pub struct ScriptedAgent {
    reply: Result<AgentResponse, AgentError>,
    calls: Mutex<Vec<InvokeRecord>>,
}

impl ScriptedAgent {
    pub fn replying(body: Value) -> Self {
        let response = serde_json::from_value(body).expect("scripted reply should decode");
        Self { reply: Ok(response), calls: Mutex::new(Vec::new()) }
    }

    pub fn failing(error: AgentError) -> Self {
        Self { reply: Err(error), calls: Mutex::new(Vec::new()) }
    }

    pub async fn calls(&self) -> Vec<InvokeRecord> {
        self.calls.lock().await.clone()
    }
}

#[async_trait]
impl AgentInvoker for ScriptedAgent {
    async fn invoke(
        &self,
        question: &Question,
        origin: AskOrigin<'_>,
    ) -> Result<AgentResponse, AgentError> {
        self.calls.lock().await.push(InvokeRecord {
            question: question.as_str().to_owned(),
            user_id: origin.user_id.map(str::to_owned),
            channel_id: origin.channel_id.map(str::to_owned),
            context: origin.context.map(str::to_owned),
        });
        self.reply.clone()
    }
}

pub fn submission_event(question: &str, context: Option<&str>) -> ViewSubmission {
    let mut values = HashMap::new();
    values.insert(
        "query_block".to_owned(),
        HashMap::from([(
            "query_input".to_owned(),
            InputValue { value: Some(question.to_owned()) },
        )]),
    );
    values.insert(
        "context_block".to_owned(),
        HashMap::from([(
            "context_input".to_owned(),
            InputValue { value: context.map(str::to_owned) },
        )]),
    );

    ViewSubmission {
        callback_id: ASK_MODAL_CALLBACK_ID.to_owned(),
        user_id: "U1".to_owned(),
        private_metadata: "C1".to_owned(),
        values,
    }
}
