use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

use cortex_relay_agent::AgentInvoker;
use cortex_relay_core::flows::InteractionTransitionError;
use cortex_relay_core::InteractionState;

use crate::{
    api::{SlackApi, SlackApiError},
    blocks::greeting_message,
    commands::{MessageShortcutPayload, SlashCommandPayload},
    flow::AskFlow,
    views::{
        home_view, parse_submission, ViewSubmission, ASK_MODAL_CALLBACK_ID,
        MESSAGE_SHORTCUT_CALLBACK_ID, OPEN_FROM_HOME_ACTION_ID, OPEN_FROM_MESSAGE_ACTION_ID,
    },
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlackEnvelope {
    pub envelope_id: String,
    pub event: SlackEvent,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SlackEvent {
    SlashCommand(SlashCommandPayload),
    MessageShortcut(MessageShortcutPayload),
    ViewSubmission(ViewSubmission),
    BlockAction(BlockActionEvent),
    AppHomeOpened(AppHomeOpenedEvent),
    ChannelMessage(ChannelMessageEvent),
    Unsupported { event_type: String },
}

impl SlackEvent {
    pub fn event_type(&self) -> SlackEventType {
        match self {
            Self::SlashCommand(_) => SlackEventType::SlashCommand,
            Self::MessageShortcut(_) => SlackEventType::MessageShortcut,
            Self::ViewSubmission(_) => SlackEventType::ViewSubmission,
            Self::BlockAction(_) => SlackEventType::BlockAction,
            Self::AppHomeOpened(_) => SlackEventType::AppHomeOpened,
            Self::ChannelMessage(_) => SlackEventType::ChannelMessage,
            Self::Unsupported { .. } => SlackEventType::Unsupported,
        }
    }

    /// Slack user that triggered the event, for log correlation.
    pub fn user_id(&self) -> Option<&str> {
        match self {
            Self::SlashCommand(payload) => Some(&payload.user_id),
            Self::MessageShortcut(payload) => Some(&payload.user_id),
            Self::ViewSubmission(submission) => Some(&submission.user_id),
            Self::BlockAction(event) => Some(&event.user_id),
            Self::AppHomeOpened(event) => Some(&event.user_id),
            Self::ChannelMessage(event) => event.user_id.as_deref(),
            Self::Unsupported { .. } => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SlackEventType {
    SlashCommand,
    MessageShortcut,
    ViewSubmission,
    BlockAction,
    AppHomeOpened,
    ChannelMessage,
    Unsupported,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockActionEvent {
    pub action_id: String,
    pub trigger_id: String,
    pub user_id: String,
    pub channel_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppHomeOpenedEvent {
    pub user_id: String,
    pub tab: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelMessageEvent {
    pub channel_id: String,
    pub user_id: Option<String>,
    pub text: String,
    pub bot_id: Option<String>,
    pub subtype: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventContext {
    pub correlation_id: String,
}

impl Default for EventContext {
    fn default() -> Self {
        Self { correlation_id: "unknown-correlation-id".to_owned() }
    }
}

/// Response body sent with the Socket Mode ack.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Acknowledgement {
    pub payload: Option<Value>,
}

impl Acknowledgement {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_payload(payload: Value) -> Self {
        Self { payload: Some(payload) }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandlerResult {
    Interaction(InteractionState),
    Processed,
    Ignored,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventHandlerError {
    #[error(transparent)]
    Slack(#[from] SlackApiError),
    #[error(transparent)]
    Transition(#[from] InteractionTransitionError),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error(transparent)]
    Handler(#[from] EventHandlerError),
}

#[async_trait]
pub trait EventHandler: Send + Sync {
    fn event_type(&self) -> SlackEventType;

    /// Computed before the envelope is acknowledged, so it must not block.
    fn acknowledge(&self, _envelope: &SlackEnvelope, _ctx: &EventContext) -> Acknowledgement {
        Acknowledgement::empty()
    }

    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError>;
}

#[derive(Default)]
pub struct EventDispatcher {
    handlers: HashMap<SlackEventType, Arc<dyn EventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<H>(&mut self, handler: H)
    where
        H: EventHandler + 'static,
    {
        self.handlers.insert(handler.event_type(), Arc::new(handler));
    }

    pub fn handles(&self, event_type: SlackEventType) -> bool {
        self.handlers.contains_key(&event_type)
    }

    pub fn acknowledgement(&self, envelope: &SlackEnvelope, ctx: &EventContext) -> Acknowledgement {
        self.handlers
            .get(&envelope.event.event_type())
            .map(|handler| handler.acknowledge(envelope, ctx))
            .unwrap_or_default()
    }

    pub async fn dispatch(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, DispatchError> {
        let Some(handler) = self.handlers.get(&envelope.event.event_type()) else {
            return Ok(HandlerResult::Ignored);
        };

        handler.handle(envelope, ctx).await.map_err(DispatchError::from)
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

/// Registers every Cortex handler against one shared ask flow.
pub fn default_dispatcher(
    api: Arc<dyn SlackApi>,
    invoker: Arc<dyn AgentInvoker>,
    slash_command: impl Into<String>,
) -> EventDispatcher {
    let slash_command = slash_command.into();
    let flow = Arc::new(AskFlow::new(api.clone(), invoker));

    let mut dispatcher = EventDispatcher::new();
    dispatcher.register(SlashCommandHandler::new(flow.clone(), slash_command.clone()));
    dispatcher.register(MessageShortcutHandler::new(flow.clone()));
    dispatcher.register(BlockActionHandler::new(flow.clone()));
    dispatcher.register(ViewSubmissionHandler::new(flow));
    dispatcher.register(AppHomeHandler::new(api.clone()));
    dispatcher.register(GreetingHandler::new(api, slash_command));
    dispatcher
}

pub struct SlashCommandHandler {
    flow: Arc<AskFlow>,
    command: String,
}

impl SlashCommandHandler {
    pub fn new(flow: Arc<AskFlow>, command: impl Into<String>) -> Self {
        Self { flow, command: command.into() }
    }
}

#[async_trait]
impl EventHandler for SlashCommandHandler {
    fn event_type(&self) -> SlackEventType {
        SlackEventType::SlashCommand
    }

    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let SlackEvent::SlashCommand(payload) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };
        if !payload.is_command(&self.command) {
            debug!(
                correlation_id = %ctx.correlation_id,
                command = %payload.command,
                "ignoring unrelated slash command"
            );
            return Ok(HandlerResult::Ignored);
        }

        let state =
            self.flow.open(&payload.trigger_id, payload.prefill(), payload.channel(), ctx).await?;
        Ok(HandlerResult::Interaction(state))
    }
}

pub struct MessageShortcutHandler {
    flow: Arc<AskFlow>,
}

impl MessageShortcutHandler {
    pub fn new(flow: Arc<AskFlow>) -> Self {
        Self { flow }
    }
}

#[async_trait]
impl EventHandler for MessageShortcutHandler {
    fn event_type(&self) -> SlackEventType {
        SlackEventType::MessageShortcut
    }

    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let SlackEvent::MessageShortcut(payload) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };
        if payload.callback_id != MESSAGE_SHORTCUT_CALLBACK_ID {
            return Ok(HandlerResult::Ignored);
        }

        let state = self
            .flow
            .open(&payload.trigger_id, payload.prefill(), payload.channel_id.as_deref(), ctx)
            .await?;
        Ok(HandlerResult::Interaction(state))
    }
}

/// "Open Cortex" buttons on the home tab and the greeting message.
pub struct BlockActionHandler {
    flow: Arc<AskFlow>,
}

impl BlockActionHandler {
    pub fn new(flow: Arc<AskFlow>) -> Self {
        Self { flow }
    }
}

#[async_trait]
impl EventHandler for BlockActionHandler {
    fn event_type(&self) -> SlackEventType {
        SlackEventType::BlockAction
    }

    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let SlackEvent::BlockAction(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };
        if event.action_id != OPEN_FROM_HOME_ACTION_ID
            && event.action_id != OPEN_FROM_MESSAGE_ACTION_ID
        {
            return Ok(HandlerResult::Ignored);
        }

        let state =
            self.flow.open(&event.trigger_id, None, event.channel_id.as_deref(), ctx).await?;
        Ok(HandlerResult::Interaction(state))
    }
}

pub struct ViewSubmissionHandler {
    flow: Arc<AskFlow>,
}

impl ViewSubmissionHandler {
    pub fn new(flow: Arc<AskFlow>) -> Self {
        Self { flow }
    }
}

#[async_trait]
impl EventHandler for ViewSubmissionHandler {
    fn event_type(&self) -> SlackEventType {
        SlackEventType::ViewSubmission
    }

    fn acknowledge(&self, envelope: &SlackEnvelope, ctx: &EventContext) -> Acknowledgement {
        match &envelope.event {
            SlackEvent::ViewSubmission(submission)
                if submission.callback_id == ASK_MODAL_CALLBACK_ID =>
            {
                Acknowledgement::with_payload(self.flow.review(submission, ctx))
            }
            _ => Acknowledgement::empty(),
        }
    }

    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let SlackEvent::ViewSubmission(submission) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };
        if submission.callback_id != ASK_MODAL_CALLBACK_ID {
            return Ok(HandlerResult::Ignored);
        }

        // Rejected submissions were answered in the ack; the modal is still open.
        let Ok(ask) = parse_submission(submission) else {
            return Ok(HandlerResult::Interaction(InteractionState::AwaitingInput));
        };

        let state = self.flow.run(ask, ctx).await?;
        Ok(HandlerResult::Interaction(state))
    }
}

pub struct AppHomeHandler {
    api: Arc<dyn SlackApi>,
}

impl AppHomeHandler {
    pub fn new(api: Arc<dyn SlackApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl EventHandler for AppHomeHandler {
    fn event_type(&self) -> SlackEventType {
        SlackEventType::AppHomeOpened
    }

    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let SlackEvent::AppHomeOpened(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };
        if event.tab != "home" {
            return Ok(HandlerResult::Ignored);
        }

        self.api.publish_home(&event.user_id, &home_view()).await?;
        info!(
            event_name = "slack.home.published",
            correlation_id = %ctx.correlation_id,
            user_id = %event.user_id,
            "published home tab"
        );
        Ok(HandlerResult::Processed)
    }
}

/// Answers a plain "hello" in a channel with an "Open Cortex" button.
pub struct GreetingHandler {
    api: Arc<dyn SlackApi>,
    slash_command: String,
}

impl GreetingHandler {
    pub fn new(api: Arc<dyn SlackApi>, slash_command: impl Into<String>) -> Self {
        Self { api, slash_command: slash_command.into() }
    }
}

#[async_trait]
impl EventHandler for GreetingHandler {
    fn event_type(&self) -> SlackEventType {
        SlackEventType::ChannelMessage
    }

    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        _ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let SlackEvent::ChannelMessage(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };
        let Some(user_id) = event.user_id.as_deref() else {
            return Ok(HandlerResult::Ignored);
        };
        if event.bot_id.is_some() || event.subtype.is_some() || !event.text.contains("hello") {
            return Ok(HandlerResult::Ignored);
        }

        let greeting = greeting_message(user_id, &self.slash_command);
        self.api.post_message(&event.channel_id, &greeting).await?;
        Ok(HandlerResult::Processed)
    }
}
