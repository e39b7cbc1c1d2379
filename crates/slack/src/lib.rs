//! Slack surface for the Cortex Agent bot.
//!
//! - **Socket Mode** (`socket`, `transport`) - envelope loop with reconnects over a WebSocket
//! - **Wire decoding** (`payloads`) - Socket Mode frames into typed events
//! - **Handlers** (`events`, `flow`) - slash command, shortcut, buttons, modal, home tab, greeting
//! - **Block Kit** (`blocks`, `views`) - answer messages, the ask modal, and the home view
//! - **Web API** (`api`) - `views.open`, `views.publish`, `conversations.open`, `chat.postMessage`
//!
//! ```text
//! Slack ─► SocketModeRunner ─ ack ─► Slack
//!               │
//!               ▼
//!        EventDispatcher ─► AskFlow ─► Cortex Agent
//!                              │
//!                              ▼
//!                      DM to the asking user
//! ```

pub mod api;
pub mod blocks;
pub mod commands;
pub mod events;
pub mod flow;
pub mod payloads;
pub mod socket;
pub mod transport;
pub mod views;

#[cfg(test)]
mod test_support;
