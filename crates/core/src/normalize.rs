//! Response normalization.
//!
//! An agent reply can carry several optional representations of the same
//! answer. [`normalize`] picks exactly one of them in a fixed priority
//! order: a block list, then rich text, then plain text (`answer` before
//! `message`). A present-but-empty block list counts as absent.

use serde_json::Value;

use crate::domain::ask::AgentResponse;
use crate::errors::EmptyResponseError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextStyle {
    Mrkdwn,
    Plain,
}

#[derive(Clone, Debug, PartialEq)]
pub enum DisplayPayload {
    /// Agent-built blocks, posted verbatim.
    Blocks { blocks: Vec<Value>, fallback_text: Option<String> },
    /// A single string rendered as one section block.
    Text { text: String, style: TextStyle },
}

pub fn normalize(response: &AgentResponse) -> Result<DisplayPayload, EmptyResponseError> {
    if let Some(blocks) = response.blocks.as_ref().filter(|blocks| !blocks.is_empty()) {
        return Ok(DisplayPayload::Blocks {
            blocks: blocks.clone(),
            fallback_text: response.plain_text().map(str::to_owned),
        });
    }

    if let Some(rich_text) = response.rich_text.as_deref().filter(|text| !text.trim().is_empty()) {
        return Ok(DisplayPayload::Text { text: rich_text.to_owned(), style: TextStyle::Mrkdwn });
    }

    response
        .plain_text()
        .map(|text| DisplayPayload::Text { text: text.to_owned(), style: TextStyle::Plain })
        .ok_or(EmptyResponseError)
}
