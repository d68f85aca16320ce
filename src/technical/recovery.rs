//! Customer-id recovery from an A2A task.
//!
//! The domain tier embeds the authenticated customer id in the task text
//! via the canonical `(session_customer_id: <ID>)` marker. Recovery tries,
//! in order: the `customer_id` metadata entry, the canonical marker, any
//! loose `customer_id:` occurrence in the text, and finally an LLM
//! extraction. The ordering matters: the cheap deterministic sources
//! must win whenever they are present, and production tasks always carry
//! the marker, so the LLM path is a genuine last resort.

use crate::a2a::A2aTask;
use crate::llm::{ChatMessage, CompletionOptions, LlmClient};
use crate::prompts::PromptStore;
use crate::{Error, Result};
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Which source produced the id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoverySource {
    Metadata,
    Marker,
    LooseScan,
    Llm,
}

/// A recovered customer id and where it came from.
#[derive(Debug, Clone)]
pub struct RecoveredCustomerId {
    pub id: String,
    pub source: RecoverySource,
}

/// Compiled recovery patterns.
pub struct CustomerIdRecovery {
    marker: Regex,
    loose: Regex,
}

impl Default for CustomerIdRecovery {
    fn default() -> Self {
        Self::new()
    }
}

impl CustomerIdRecovery {
    pub fn new() -> Self {
        Self {
            marker: Regex::new(r"session_customer_id:\s*([^\s,)]+)")
                .expect("marker pattern compiles"),
            loose: Regex::new(r"customer_id:\s*([^\s,)]+)").expect("loose pattern compiles"),
        }
    }

    /// Deterministic recovery: metadata, then the canonical marker, then
    /// a loose scan. No network.
    pub fn from_task(&self, task: &A2aTask) -> Option<RecoveredCustomerId> {
        if let Some(id) = task.metadata_str("customer_id") {
            return Some(RecoveredCustomerId {
                id: id.to_string(),
                source: RecoverySource::Metadata,
            });
        }

        if let Some(captures) = self.marker.captures(&task.text) {
            return Some(RecoveredCustomerId {
                id: captures[1].to_string(),
                source: RecoverySource::Marker,
            });
        }

        if let Some(captures) = self.loose.captures(&task.text) {
            return Some(RecoveredCustomerId {
                id: captures[1].to_string(),
                source: RecoverySource::LooseScan,
            });
        }

        None
    }

    /// Full recovery chain, LLM extraction included.
    ///
    /// # Errors
    ///
    /// [`Error::MissingCustomerContext`] when every source comes up empty.
    /// No tool call may be issued after this error.
    pub async fn recover(
        &self,
        task: &A2aTask,
        llm: &LlmClient,
        prompts: &PromptStore,
        options: &CompletionOptions,
    ) -> Result<RecoveredCustomerId> {
        if let Some(recovered) = self.from_task(task) {
            debug!(
                component = "technical",
                event = "customer_id_recovered",
                task_id = %task.task_id,
                customer_id = %recovered.id,
                source = ?recovered.source,
                "customer id recovered deterministically"
            );
            return Ok(recovered);
        }

        warn!(
            component = "technical",
            event = "customer_id_llm_fallback",
            task_id = %task.task_id,
            "no marker or metadata, asking the model"
        );

        let mut variables = HashMap::new();
        variables.insert("task_text", task.text.clone());
        let prompt = prompts.render("technical", "extract_customer_id", &variables)?;
        let completion = llm
            .complete(
                &[ChatMessage::user(prompt)],
                &options.clone().with_json(),
            )
            .await
            .map_err(|e| {
                Error::MissingCustomerContext(format!("llm extraction failed: {}", e))
            })?;

        let id = completion
            .json
            .as_ref()
            .and_then(|v| v.get("customer_id"))
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty() && *s != "null");

        match id {
            Some(id) => Ok(RecoveredCustomerId {
                id: id.to_string(),
                source: RecoverySource::Llm,
            }),
            None => Err(Error::MissingCustomerContext(
                "no customer id in metadata, marker, text, or llm extraction".to_string(),
            )),
        }
    }
}
