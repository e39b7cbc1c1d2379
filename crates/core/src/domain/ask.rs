use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::errors::ValidationError;

/// Fixed origin tag sent with every request.
pub const ASK_SOURCE: &str = "slack";

/// A question that is known to be non-empty after trimming.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Question(String);

impl Question {
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptyQuestion);
        }
        Ok(Self(trimmed.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Question {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AskMetadata {
    pub slack_user_id: Option<String>,
    pub slack_channel_id: Option<String>,
}

/// Outbound body POSTed to the agent endpoint.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AskRequest {
    pub question: Question,
    pub source: &'static str,
    pub metadata: AskMetadata,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enrichment: Option<Value>,
}

impl AskRequest {
    pub fn new(
        question: Question,
        user_id: Option<&str>,
        channel_id: Option<&str>,
        context: Option<&str>,
    ) -> Self {
        Self {
            question,
            source: ASK_SOURCE,
            metadata: AskMetadata {
                slack_user_id: non_blank(user_id),
                slack_channel_id: non_blank(channel_id),
            },
            context: context.map(str::trim).filter(|value| !value.is_empty()).map(str::to_owned),
            enrichment: None,
        }
    }

    pub fn with_enrichment(mut self, enrichment: Option<Value>) -> Self {
        self.enrichment = enrichment.filter(|value| !is_empty_fragment(value));
        self
    }
}

/// Decoded agent reply. Every field is optional and fields of an unexpected
/// JSON type are treated as absent.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct AgentResponse {
    #[serde(default, deserialize_with = "lenient_string")]
    pub answer: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub message: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub rich_text: Option<String>,
    #[serde(default, deserialize_with = "lenient_blocks")]
    pub blocks: Option<Vec<Value>>,
}

impl AgentResponse {
    /// First non-blank plain text field, `answer` before `message`.
    pub fn plain_text(&self) -> Option<&str> {
        [self.answer.as_deref(), self.message.as_deref()]
            .into_iter()
            .flatten()
            .find(|text| !text.trim().is_empty())
    }
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(text)) => Some(text),
        _ => None,
    })
}

fn lenient_blocks<'de, D>(deserializer: D) -> Result<Option<Vec<Value>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Array(blocks)) => Some(blocks),
        _ => None,
    })
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|value| !value.is_empty()).map(str::to_owned)
}

fn is_empty_fragment(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}
