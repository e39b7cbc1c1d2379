//! Decoding of raw Socket Mode frames into typed [`SlackEnvelope`]s.

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use crate::commands::MessageShortcutPayload;
use crate::events::{
    AppHomeOpenedEvent, BlockActionEvent, ChannelMessageEvent, SlackEnvelope, SlackEvent,
};
use crate::views::{ViewStateValues, ViewSubmission};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SocketFrame {
    Hello,
    /// Slack is about to close this connection and wants a fresh one.
    Disconnect { reason: String },
    Envelope(SlackEnvelope),
}

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("socket frame is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("socket frame of type `{0}` has no envelope_id")]
    MissingEnvelopeId(String),
}

#[derive(Deserialize)]
struct RawFrame {
    #[serde(rename = "type")]
    frame_type: String,
    #[serde(default)]
    envelope_id: Option<String>,
    #[serde(default)]
    payload: Value,
    #[serde(default)]
    reason: Option<String>,
}

#[derive(Deserialize)]
struct RawUser {
    id: String,
}

#[derive(Deserialize)]
struct RawChannel {
    id: String,
}

#[derive(Default, Deserialize)]
struct RawMessage {
    #[serde(default)]
    text: String,
}

#[derive(Default, Deserialize)]
struct RawViewState {
    #[serde(default)]
    values: ViewStateValues,
}

#[derive(Deserialize)]
struct RawView {
    #[serde(default)]
    callback_id: String,
    #[serde(default)]
    private_metadata: String,
    #[serde(default)]
    state: RawViewState,
}

#[derive(Deserialize)]
struct RawAction {
    action_id: String,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum InteractivePayload {
    ViewSubmission {
        user: RawUser,
        view: RawView,
    },
    MessageAction {
        callback_id: String,
        trigger_id: String,
        user: RawUser,
        #[serde(default)]
        channel: Option<RawChannel>,
        #[serde(default)]
        message: RawMessage,
    },
    Shortcut {
        callback_id: String,
        trigger_id: String,
        user: RawUser,
    },
    BlockActions {
        trigger_id: String,
        user: RawUser,
        #[serde(default)]
        channel: Option<RawChannel>,
        #[serde(default)]
        actions: Vec<RawAction>,
    },
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
struct RawEventCallback {
    event: CallbackEvent,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum CallbackEvent {
    AppHomeOpened {
        user: String,
        #[serde(default)]
        tab: String,
    },
    Message {
        channel: String,
        #[serde(default)]
        user: Option<String>,
        #[serde(default)]
        text: String,
        #[serde(default)]
        bot_id: Option<String>,
        #[serde(default)]
        subtype: Option<String>,
    },
    #[serde(other)]
    Other,
}

pub fn decode_frame(text: &str) -> Result<SocketFrame, FrameError> {
    let frame: RawFrame = serde_json::from_str(text)?;

    match frame.frame_type.as_str() {
        "hello" => Ok(SocketFrame::Hello),
        "disconnect" => Ok(SocketFrame::Disconnect {
            reason: frame.reason.unwrap_or_else(|| "unspecified".to_owned()),
        }),
        _ => {
            let envelope_id = frame
                .envelope_id
                .ok_or_else(|| FrameError::MissingEnvelopeId(frame.frame_type.clone()))?;
            // Undecodable payloads still need their envelope acknowledged.
            let event = decode_event(&frame.frame_type, frame.payload).unwrap_or_else(|error| {
                warn!(
                    event_name = "ingress.slack.payload_malformed",
                    envelope_id = %envelope_id,
                    frame_type = %frame.frame_type,
                    error = %error,
                    "could not decode socket mode payload"
                );
                SlackEvent::Unsupported { event_type: format!("{}:malformed", frame.frame_type) }
            });
            Ok(SocketFrame::Envelope(SlackEnvelope { envelope_id, event }))
        }
    }
}

fn decode_event(frame_type: &str, payload: Value) -> Result<SlackEvent, serde_json::Error> {
    match frame_type {
        "slash_commands" => Ok(SlackEvent::SlashCommand(serde_json::from_value(payload)?)),
        "interactive" => decode_interactive(payload),
        "events_api" => decode_callback(payload),
        other => Ok(SlackEvent::Unsupported { event_type: other.to_owned() }),
    }
}

fn decode_interactive(payload: Value) -> Result<SlackEvent, serde_json::Error> {
    let kind = payload_kind(&payload);

    Ok(match serde_json::from_value::<InteractivePayload>(payload)? {
        InteractivePayload::ViewSubmission { user, view } => {
            SlackEvent::ViewSubmission(ViewSubmission {
                callback_id: view.callback_id,
                user_id: user.id,
                private_metadata: view.private_metadata,
                values: view.state.values,
            })
        }
        InteractivePayload::MessageAction { callback_id, trigger_id, user, channel, message } => {
            SlackEvent::MessageShortcut(MessageShortcutPayload {
                callback_id,
                trigger_id,
                user_id: user.id,
                channel_id: channel.map(|channel| channel.id),
                message_text: message.text,
            })
        }
        // A global shortcut shares the callback id but has no message or channel.
        InteractivePayload::Shortcut { callback_id, trigger_id, user } => {
            SlackEvent::MessageShortcut(MessageShortcutPayload {
                callback_id,
                trigger_id,
                user_id: user.id,
                ..MessageShortcutPayload::default()
            })
        }
        InteractivePayload::BlockActions { trigger_id, user, channel, actions } => {
            match actions.into_iter().next() {
                Some(action) => SlackEvent::BlockAction(BlockActionEvent {
                    action_id: action.action_id,
                    trigger_id,
                    user_id: user.id,
                    channel_id: channel.map(|channel| channel.id),
                }),
                None => SlackEvent::Unsupported { event_type: format!("interactive:{kind}") },
            }
        }
        InteractivePayload::Other => {
            SlackEvent::Unsupported { event_type: format!("interactive:{kind}") }
        }
    })
}

fn decode_callback(payload: Value) -> Result<SlackEvent, serde_json::Error> {
    let kind = payload.get("event").map(payload_kind).unwrap_or_else(|| "unknown".to_owned());

    Ok(match serde_json::from_value::<RawEventCallback>(payload)?.event {
        CallbackEvent::AppHomeOpened { user, tab } => {
            SlackEvent::AppHomeOpened(AppHomeOpenedEvent { user_id: user, tab })
        }
        CallbackEvent::Message { channel, user, text, bot_id, subtype } => {
            SlackEvent::ChannelMessage(ChannelMessageEvent {
                channel_id: channel,
                user_id: user,
                text,
                bot_id,
                subtype,
            })
        }
        CallbackEvent::Other => {
            SlackEvent::Unsupported { event_type: format!("events_api:{kind}") }
        }
    })
}

fn payload_kind(payload: &Value) -> String {
    payload.get("type").and_then(Value::as_str).unwrap_or("unknown").to_owned()
}
