use serde::Serialize;
use serde_json::Value;

use cortex_relay_core::{DisplayPayload, TextStyle};

use crate::views::OPEN_FROM_MESSAGE_ACTION_ID;

/// Slack rejects section text longer than this many characters.
pub const SECTION_TEXT_LIMIT: usize = 3000;

/// Notification text for agent-built block lists that carry no plain text.
pub const ANSWER_FALLBACK_TEXT: &str = "Cortex Agent response";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum TextObject {
    #[serde(rename = "plain_text")]
    Plain { text: String },
    #[serde(rename = "mrkdwn")]
    Mrkdwn { text: String },
}

impl TextObject {
    pub fn plain(text: impl Into<String>) -> Self {
        Self::Plain { text: text.into() }
    }

    pub fn mrkdwn(text: impl Into<String>) -> Self {
        Self::Mrkdwn { text: text.into() }
    }

    pub fn text(&self) -> &str {
        match self {
            Self::Plain { text } | Self::Mrkdwn { text } => text,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ButtonStyle {
    Primary,
    Danger,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename = "button")]
pub struct ButtonElement {
    pub action_id: String,
    pub text: TextObject,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<ButtonStyle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl ButtonElement {
    pub fn new(action_id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            action_id: action_id.into(),
            text: TextObject::plain(label),
            style: None,
            value: None,
        }
    }

    pub fn style(mut self, style: ButtonStyle) -> Self {
        self.style = Some(style);
        self
    }

    pub fn value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename = "plain_text_input")]
pub struct PlainTextInput {
    pub action_id: String,
    pub multiline: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<TextObject>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial_value: Option<String>,
}

impl PlainTextInput {
    pub fn new(action_id: impl Into<String>) -> Self {
        Self { action_id: action_id.into(), multiline: false, placeholder: None, initial_value: None }
    }

    pub fn multiline(mut self) -> Self {
        self.multiline = true;
        self
    }

    pub fn placeholder(mut self, text: impl Into<String>) -> Self {
        self.placeholder = Some(TextObject::plain(text));
        self
    }

    /// Blank values are dropped; long ones are cut to what Slack accepts.
    pub fn initial_value(mut self, value: Option<&str>) -> Self {
        self.initial_value = value
            .filter(|value| !value.trim().is_empty())
            .map(|value| truncate_chars(value, SECTION_TEXT_LIMIT));
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Section {
        block_id: String,
        text: TextObject,
        #[serde(skip_serializing_if = "Option::is_none")]
        accessory: Option<ButtonElement>,
    },
    Actions {
        block_id: String,
        elements: Vec<ButtonElement>,
    },
    Context {
        block_id: String,
        elements: Vec<TextObject>,
    },
    Divider,
    Input {
        block_id: String,
        label: TextObject,
        element: PlainTextInput,
        optional: bool,
    },
}

/// A block in an outgoing message: either built here or passed through
/// verbatim from the agent.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MessageBlock {
    Kit(Block),
    Verbatim(Value),
}

impl From<Block> for MessageBlock {
    fn from(block: Block) -> Self {
        Self::Kit(block)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MessageTemplate {
    pub fallback_text: String,
    pub blocks: Vec<MessageBlock>,
}

pub struct MessageBuilder {
    fallback_text: String,
    blocks: Vec<Block>,
}

impl MessageBuilder {
    pub fn new(fallback_text: impl Into<String>) -> Self {
        Self { fallback_text: fallback_text.into(), blocks: Vec::new() }
    }

    pub fn section<F>(mut self, block_id: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(&mut SectionBuilder),
    {
        let mut builder = SectionBuilder::default();
        build(&mut builder);
        let (text, accessory) = builder.build();
        self.blocks.push(Block::Section { block_id: block_id.into(), text, accessory });
        self
    }

    pub fn actions<F>(mut self, block_id: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(&mut ActionsBuilder),
    {
        let mut builder = ActionsBuilder::default();
        build(&mut builder);
        self.blocks.push(Block::Actions { block_id: block_id.into(), elements: builder.build() });
        self
    }

    pub fn context<F>(mut self, block_id: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(&mut ContextBuilder),
    {
        let mut builder = ContextBuilder::default();
        build(&mut builder);
        self.blocks.push(Block::Context { block_id: block_id.into(), elements: builder.build() });
        self
    }

    pub fn divider(mut self) -> Self {
        self.blocks.push(Block::Divider);
        self
    }

    pub fn input(
        mut self,
        block_id: impl Into<String>,
        label: impl Into<String>,
        element: PlainTextInput,
        optional: bool,
    ) -> Self {
        self.blocks.push(Block::Input {
            block_id: block_id.into(),
            label: TextObject::plain(label),
            element,
            optional,
        });
        self
    }

    /// Blocks only, for views that have no notification text.
    pub fn into_blocks(self) -> Vec<Block> {
        self.blocks
    }

    pub fn build(self) -> MessageTemplate {
        MessageTemplate {
            fallback_text: self.fallback_text,
            blocks: self.blocks.into_iter().map(MessageBlock::from).collect(),
        }
    }
}

#[derive(Default)]
pub struct SectionBuilder {
    text: Option<TextObject>,
    accessory: Option<ButtonElement>,
}

impl SectionBuilder {
    pub fn plain(&mut self, text: impl Into<String>) -> &mut Self {
        self.text = Some(TextObject::plain(text));
        self
    }

    pub fn mrkdwn(&mut self, text: impl Into<String>) -> &mut Self {
        self.text = Some(TextObject::mrkdwn(text));
        self
    }

    pub fn accessory(&mut self, button: ButtonElement) -> &mut Self {
        self.accessory = Some(button);
        self
    }

    fn build(self) -> (TextObject, Option<ButtonElement>) {
        (self.text.unwrap_or_else(|| TextObject::plain(" ")), self.accessory)
    }
}

#[derive(Default)]
pub struct ActionsBuilder {
    elements: Vec<ButtonElement>,
}

impl ActionsBuilder {
    pub fn button(&mut self, button: ButtonElement) -> &mut Self {
        self.elements.push(button);
        self
    }

    fn build(self) -> Vec<ButtonElement> {
        self.elements
    }
}

#[derive(Default)]
pub struct ContextBuilder {
    elements: Vec<TextObject>,
}

impl ContextBuilder {
    pub fn plain(&mut self, text: impl Into<String>) -> &mut Self {
        self.elements.push(TextObject::plain(text));
        self
    }

    pub fn mrkdwn(&mut self, text: impl Into<String>) -> &mut Self {
        self.elements.push(TextObject::mrkdwn(text));
        self
    }

    fn build(self) -> Vec<TextObject> {
        self.elements
    }
}

/// Renders a normalized agent reply as a postable message.
pub fn display_message(payload: &DisplayPayload) -> MessageTemplate {
    match payload {
        DisplayPayload::Blocks { blocks, fallback_text } => MessageTemplate {
            fallback_text: fallback_text.clone().unwrap_or_else(|| ANSWER_FALLBACK_TEXT.to_owned()),
            blocks: blocks.iter().cloned().map(MessageBlock::Verbatim).collect(),
        },
        DisplayPayload::Text { text, style } => {
            let section_text = truncate_chars(text, SECTION_TEXT_LIMIT);
            MessageBuilder::new(text.clone())
                .section("cortex.answer.v1", |section| {
                    match style {
                        TextStyle::Mrkdwn => section.mrkdwn(section_text),
                        TextStyle::Plain => section.plain(section_text),
                    };
                })
                .build()
        }
    }
}

pub fn failure_message(summary: &str, correlation_id: &str) -> MessageTemplate {
    MessageBuilder::new(summary.to_owned())
        .section("cortex.error.summary.v1", |section| {
            section.mrkdwn(format!(":warning: {summary}"));
        })
        .context("cortex.error.context.v1", |context| {
            context.plain(format!("Correlation ID: {correlation_id}"));
        })
        .build()
}

/// `slash_command` is the configured command, so the hint matches what the
/// workspace actually registered.
pub fn greeting_message(user_id: &str, slash_command: &str) -> MessageTemplate {
    MessageBuilder::new(format!("Hey there <@{user_id}>!"))
        .section("cortex.greeting.v1", |section| {
            section
                .mrkdwn(format!("Hey there <@{user_id}>! Ask me with {slash_command}"))
                .accessory(
                    ButtonElement::new(OPEN_FROM_MESSAGE_ACTION_ID, "Open Cortex")
                        .style(ButtonStyle::Primary),
                );
        })
        .build()
}

/// Cuts `text` to at most `limit` characters, marking the cut with `…`.
pub fn truncate_chars(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_owned();
    }
    let keep = limit.saturating_sub(1);
    let end = text.char_indices().nth(keep).map_or(text.len(), |(index, _)| index);
    format!("{}…", &text[..end])
}
