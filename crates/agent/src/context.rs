//! Optional enrichment attached to outbound agent requests.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;
use thiserror::Error;

use cortex_relay_core::config::SnowflakeConfig;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ContextError {
    #[error("context source `{source_name}` unavailable: {reason}")]
    Unavailable { source_name: &'static str, reason: String },
}

/// Supplies a JSON fragment describing the environment a question runs in.
///
/// `Ok(None)` means there is nothing to add. Errors are non-fatal: callers
/// log them and send the request without enrichment.
#[async_trait]
pub trait ContextProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn enrichment(&self) -> Result<Option<Value>, ContextError>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NoContext;

#[async_trait]
impl ContextProvider for NoContext {
    fn name(&self) -> &'static str {
        "none"
    }

    async fn enrichment(&self) -> Result<Option<Value>, ContextError> {
        Ok(None)
    }
}

/// Describes the Snowflake session the agent should target.
///
/// Only identifying settings are forwarded; the password never leaves the
/// process.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SnowflakeContextProvider {
    fields: Vec<(&'static str, String)>,
}

impl SnowflakeContextProvider {
    pub fn from_config(config: &SnowflakeConfig) -> Self {
        let candidates = [
            ("snowflake_account", &config.account),
            ("snowflake_user", &config.user),
            ("snowflake_warehouse", &config.warehouse),
            ("snowflake_database", &config.database),
            ("snowflake_schema", &config.schema),
        ];

        let fields = candidates
            .into_iter()
            .filter_map(|(key, value)| {
                value
                    .as_deref()
                    .map(str::trim)
                    .filter(|value| !value.is_empty())
                    .map(|value| (key, value.to_owned()))
            })
            .collect();

        Self { fields }
    }
}

#[async_trait]
impl ContextProvider for SnowflakeContextProvider {
    fn name(&self) -> &'static str {
        "snowflake"
    }

    async fn enrichment(&self) -> Result<Option<Value>, ContextError> {
        if self.fields.is_empty() {
            return Ok(None);
        }

        let object: Map<String, Value> = self
            .fields
            .iter()
            .map(|(key, value)| ((*key).to_owned(), Value::String(value.clone())))
            .collect();
        Ok(Some(Value::Object(object)))
    }
}

pub fn provider_from_config(config: &SnowflakeConfig) -> Arc<dyn ContextProvider> {
    if config.enrichment_enabled {
        Arc::new(SnowflakeContextProvider::from_config(config))
    } else {
        Arc::new(NoContext)
    }
}
