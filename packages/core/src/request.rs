//! Caller-side request types held by the dispatcher.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifies the caller (chat, user, connection) a request came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OriginId(pub String);

impl OriginId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for OriginId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for OriginId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// The natural-language request as received from the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub prompt: String,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
        }
    }
}

/// An admitted request waiting in the request queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueEntry {
    pub origin_id: OriginId,
    pub payload: GenerationRequest,
    pub enqueued_at: DateTime<Utc>,
}

impl QueueEntry {
    pub fn new(origin_id: OriginId, payload: GenerationRequest) -> Self {
        Self {
            origin_id,
            payload,
            enqueued_at: Utc::now(),
        }
    }
}

/// Structured fields extracted from a request before reference lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Requirements {
    /// Who should be dancing; resolved against the image collection.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dance_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
}

impl Requirements {
    /// Query text for the reference video: dance name followed by style.
    pub fn dance_query(&self) -> Option<String> {
        let query = [self.dance_name.as_deref(), self.style.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        (!query.is_empty()).then_some(query)
    }

    /// Query text for the reference image.
    pub fn subject_query(&self) -> Option<String> {
        self.subject
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    }
}
