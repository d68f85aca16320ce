//! Response synthesis: turning retrieved data into a customer reply.
//!
//! The synthesis prompt carries the no-fabrication contract (answer only
//! what was asked, use only fields present in the retrieved data, never
//! invent vehicles, amounts, or dates). When the model is unreachable the
//! synthesizer falls back to a templated reply that prints nothing but
//! fields literally present in the bundle, so the no-fabrication property
//! holds on the degraded path by construction.

use crate::llm::{ChatMessage, CompletionOptions, LlmClient};
use crate::prompts::PromptStore;
use crate::types::{IntentKind, ToolCallStatus, ToolResultsBundle};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

/// Fallback shown when nothing could be retrieved and the model is down.
const EMPTY_HANDED_REPLY: &str =
    "I'm sorry, I couldn't retrieve your information right now. Please try again shortly.";

pub struct ResponseSynthesizer {
    llm: Arc<LlmClient>,
    prompts: Arc<PromptStore>,
    options: CompletionOptions,
}

impl ResponseSynthesizer {
    pub fn new(llm: Arc<LlmClient>, prompts: Arc<PromptStore>, options: CompletionOptions) -> Self {
        Self {
            llm,
            prompts,
            options,
        }
    }

    /// Produce the reply text. Never fails; the templated fallback covers
    /// model outages.
    pub async fn synthesize(
        &self,
        user_text: &str,
        customer_id: &str,
        intents: &[IntentKind],
        technical_data: Option<&Value>,
    ) -> String {
        match self
            .synthesize_with_llm(user_text, customer_id, intents, technical_data)
            .await
        {
            Ok(reply) => reply,
            Err(reason) => {
                warn!(
                    component = "domain",
                    event = "synthesis_fallback",
                    reason = %reason,
                    "synthesis degraded to templated reply"
                );
                templated_reply(technical_data)
            }
        }
    }

    async fn synthesize_with_llm(
        &self,
        user_text: &str,
        customer_id: &str,
        intents: &[IntentKind],
        technical_data: Option<&Value>,
    ) -> Result<String, String> {
        let intents_text = serde_json::to_string(intents).map_err(|e| e.to_string())?;
        let data_text = match technical_data {
            Some(value) => serde_json::to_string_pretty(value).map_err(|e| e.to_string())?,
            None => "{}".to_string(),
        };

        let mut variables = HashMap::new();
        variables.insert("user_text", user_text.to_string());
        variables.insert("customer_id", customer_id.to_string());
        variables.insert("primary_intents", intents_text);
        variables.insert("technical_data", data_text);
        let prompt = self
            .prompts
            .render("domain", "response_format", &variables)
            .map_err(|e| e.to_string())?;

        let completion = self
            .llm
            .complete(&[ChatMessage::user(prompt)], &self.options)
            .await
            .map_err(|e| e.to_string())?;

        let reply = completion.content.trim().to_string();
        if reply.is_empty() {
            return Err("empty completion".to_string());
        }
        Ok(reply)
    }
}

/// Last-resort reply built only from fields present in the bundle.
///
/// Prints each successful tool's top-level fields verbatim, reports
/// not-found lookups, and stays silent about everything else.
pub fn templated_reply(technical_data: Option<&Value>) -> String {
    let Some(value) = technical_data else {
        return EMPTY_HANDED_REPLY.to_string();
    };
    let Ok(bundle) = serde_json::from_value::<ToolResultsBundle>(value.clone()) else {
        return EMPTY_HANDED_REPLY.to_string();
    };

    let mut lines: Vec<String> = Vec::new();
    let mut not_found = false;
    for result in bundle.results.values() {
        match result.status {
            ToolCallStatus::Ok => {
                if let Some(data) = &result.data {
                    lines.push(format!(
                        "{}: {}",
                        humanize_tool_name(&result.tool_name),
                        flatten_fields(data)
                    ));
                }
            }
            ToolCallStatus::NotFound => not_found = true,
            _ => {}
        }
    }

    if lines.is_empty() {
        if not_found {
            return "We could not find any records matching your account. \
                    Please verify your details or contact support."
                .to_string();
        }
        return EMPTY_HANDED_REPLY.to_string();
    }

    let mut reply = String::from("Here is what I found on your account:\n");
    for line in lines {
        reply.push_str("- ");
        reply.push_str(&line);
        reply.push('\n');
    }
    reply.trim_end().to_string()
}

/// `get_payment_information` → `payment information`
fn humanize_tool_name(tool_name: &str) -> String {
    tool_name
        .strip_prefix("get_")
        .unwrap_or(tool_name)
        .replace('_', " ")
}

/// Render a JSON payload as `key: value` pairs without inventing
/// anything; nested structures print as compact JSON.
fn flatten_fields(data: &Value) -> String {
    match data {
        Value::Object(map) => map
            .iter()
            .map(|(key, value)| match value {
                Value::String(s) => format!("{}: {}", key, s),
                other => format!("{}: {}", key, other),
            })
            .collect::<Vec<_>>()
            .join(", "),
        other => other.to_string(),
    }
}
