//! Inbound chat request

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::message::Message;

/// Department reported when the caller sets none.
pub const DEFAULT_DEPARTMENT: &str = "general";

/// One inbound unit of work.
///
/// `metadata` is carried into instrumentation only. It never influences
/// routing or the cache key.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl ChatRequest {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            ..Default::default()
        }
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn temperature(mut self, temp: f32) -> Self {
        self.temperature = Some(temp);
        self
    }

    pub fn max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Department tag from metadata, or [`DEFAULT_DEPARTMENT`].
    pub fn department(&self) -> &str {
        self.metadata
            .get("department")
            .and_then(|v| v.as_str())
            .unwrap_or(DEFAULT_DEPARTMENT)
    }

    /// The most recent turn, which is what the prompt template answers.
    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }
}
