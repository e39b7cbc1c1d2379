use serde::Deserialize;

/// Socket Mode `slash_commands` payload. Slack sends it flat, so it
/// deserializes directly.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct SlashCommandPayload {
    pub command: String,
    #[serde(default)]
    pub text: String,
    pub user_id: String,
    #[serde(default)]
    pub channel_id: String,
    pub trigger_id: String,
}

impl SlashCommandPayload {
    /// Slack lowercases command names but configs are typed by hand.
    pub fn is_command(&self, configured: &str) -> bool {
        self.command.trim().eq_ignore_ascii_case(configured.trim())
    }

    /// Command text used to seed the modal's question field.
    pub fn prefill(&self) -> Option<&str> {
        non_blank(&self.text)
    }

    pub fn channel(&self) -> Option<&str> {
        non_blank(&self.channel_id)
    }
}

/// "Ask Cortex about this" on an existing message, or the same shortcut
/// invoked globally (no message, no channel).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MessageShortcutPayload {
    pub callback_id: String,
    pub trigger_id: String,
    pub user_id: String,
    pub channel_id: Option<String>,
    pub message_text: String,
}

impl MessageShortcutPayload {
    pub fn prefill(&self) -> Option<&str> {
        non_blank(&self.message_text)
    }
}

fn non_blank(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}
