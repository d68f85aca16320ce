//! Intent analysis: LLM classification with a keyword fallback.

use crate::llm::{ChatMessage, CompletionOptions, LlmClient};
use crate::prompts::PromptStore;
use crate::rules;
use crate::types::Intent;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Classifies one customer message into an [`Intent`].
///
/// Analysis never fails: when the model is unreachable, returns invalid
/// JSON after the repair attempt, or produces an intent that violates the
/// schema, the analyzer degrades to the shared keyword rules with a fixed
/// confidence of 0.5.
pub struct IntentAnalyzer {
    llm: Arc<LlmClient>,
    prompts: Arc<PromptStore>,
    options: CompletionOptions,
}

impl IntentAnalyzer {
    pub fn new(llm: Arc<LlmClient>, prompts: Arc<PromptStore>, options: CompletionOptions) -> Self {
        Self {
            llm,
            prompts,
            options: options.with_json(),
        }
    }

    pub async fn analyze(&self, user_text: &str) -> Intent {
        match self.analyze_with_llm(user_text).await {
            Ok(intent) => {
                debug!(
                    component = "domain",
                    event = "intent_classified",
                    intents = ?intent.primary_intents,
                    confidence = intent.confidence,
                    "model classification accepted"
                );
                intent
            }
            Err(reason) => {
                warn!(
                    component = "domain",
                    event = "intent_fallback",
                    reason = %reason,
                    "classification degraded to keyword rules"
                );
                rules::fallback_intent(user_text)
            }
        }
    }

    async fn analyze_with_llm(&self, user_text: &str) -> Result<Intent, String> {
        let mut variables = HashMap::new();
        variables.insert("user_text", user_text.to_string());
        let prompt = self
            .prompts
            .render("domain", "intent_analysis", &variables)
            .map_err(|e| e.to_string())?;

        let completion = self
            .llm
            .complete(&[ChatMessage::user(prompt)], &self.options)
            .await
            .map_err(|e| e.to_string())?;

        let json = completion.json.ok_or("no JSON in completion")?;
        let intent: Intent =
            serde_json::from_value(json).map_err(|e| format!("intent shape: {}", e))?;
        intent.validate()?;
        Ok(intent)
    }
}
