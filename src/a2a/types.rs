//! Wire envelopes for the A2A protocol.

use crate::ErrorKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Path tasks are posted to on an agent's HTTP surface.
pub const TASKS_PATH: &str = "/a2a/tasks";

/// Append the canonical customer marker to a task text.
///
/// The marker's exact shape is load-bearing: the technical tier recovers
/// the id with `session_customer_id:\s*([^\s,)]+)`.
pub fn embed_customer_marker(text: &str, customer_id: &str) -> String {
    format!("{} (session_customer_id: {})", text, customer_id)
}

/// An A2A task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct A2aTask {
    pub task_id: Uuid,
    pub from_agent: String,
    pub to_agent: String,
    /// Primary payload: the natural-language request, customer marker
    /// included when a customer context exists
    pub text: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    pub created_at: DateTime<Utc>,
}

impl A2aTask {
    pub fn new(
        from_agent: impl Into<String>,
        to_agent: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            task_id: Uuid::new_v4(),
            from_agent: from_agent.into(),
            to_agent: to_agent.into(),
            text: text.into(),
            metadata: Map::new(),
            created_at: Utc::now(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Non-empty string metadata value, if present.
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// Terminal status of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Completed,
    Failed,
}

/// One part of a reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplyPart {
    pub text: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

/// Reply to an A2A task, correlated by `task_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct A2aReply {
    pub task_id: Uuid,
    pub status: TaskStatus,
    pub parts: Vec<ReplyPart>,
}

impl A2aReply {
    /// A completed reply whose first part carries a payload document and,
    /// optionally, a human-readable preview in part metadata.
    pub fn completed(task_id: Uuid, text: String, human_summary: Option<String>) -> Self {
        let mut metadata = Map::new();
        if let Some(summary) = human_summary {
            metadata.insert("human_summary".to_string(), Value::String(summary));
        }
        Self {
            task_id,
            status: TaskStatus::Completed,
            parts: vec![ReplyPart { text, metadata }],
        }
    }

    /// A failed reply whose first part is an error document
    /// `{"error_kind": ..., "message": ...}`.
    pub fn failed(task_id: Uuid, kind: ErrorKind, message: impl Into<String>) -> Self {
        let message: String = message.into();
        let document = serde_json::json!({
            "error_kind": kind,
            "message": message,
        });
        Self {
            task_id,
            status: TaskStatus::Failed,
            parts: vec![ReplyPart {
                text: document.to_string(),
                metadata: Map::new(),
            }],
        }
    }

    /// Text of the first part, if any.
    pub fn first_text(&self) -> Option<&str> {
        self.parts.first().map(|p| p.text.as_str())
    }

    /// Parse the error document of a failed reply.
    ///
    /// Returns `None` for completed replies or when the document does not
    /// carry a recognizable kind.
    pub fn error_document(&self) -> Option<(ErrorKind, String)> {
        if self.status != TaskStatus::Failed {
            return None;
        }
        let value: Value = serde_json::from_str(self.first_text()?).ok()?;
        let kind: ErrorKind = serde_json::from_value(value.get("error_kind")?.clone()).ok()?;
        let message = value
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        Some((kind, message))
    }
}
