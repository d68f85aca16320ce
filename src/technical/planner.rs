//! Tool call planning: LLM planner with a deterministic rule fallback.
//!
//! Planner output is untrusted model output. A plan is accepted only when
//! it parses into the strict plan shape AND every referenced tool exists
//! in the registry snapshot current at planning time AND its dependency
//! edges point backwards. Anything else falls through to the keyword
//! rules, which always produce a valid plan as long as the registry
//! carries the canonical tools.

use crate::llm::{ChatMessage, CompletionOptions, LlmClient, ResponseFormat};
use crate::prompts::PromptStore;
use crate::registry::ToolRegistry;
use crate::rules;
use crate::types::{PlanStep, ToolCallPlan};
use crate::{Error, Result};
use serde::Deserialize;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Which strategy produced the accepted plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanStrategy {
    Llm,
    Rules,
}

/// An accepted plan and its provenance.
#[derive(Debug, Clone)]
pub struct PlanOutcome {
    pub plan: ToolCallPlan,
    pub strategy: PlanStrategy,
}

/// Loosely-shaped step as the model may emit it; ids and parameters are
/// normalized before validation.
#[derive(Deserialize)]
struct RawStep {
    #[serde(default)]
    id: Option<String>,
    tool_name: String,
    #[serde(default)]
    parameters: Option<Value>,
    #[serde(default)]
    purpose: String,
    #[serde(default)]
    dependencies: Vec<String>,
}

#[derive(Deserialize)]
struct RawPlan {
    steps: Vec<RawStep>,
}

/// Derives a [`ToolCallPlan`] from a task's request text.
pub struct Planner {
    llm: Arc<LlmClient>,
    prompts: Arc<PromptStore>,
    options: CompletionOptions,
}

impl Planner {
    pub fn new(llm: Arc<LlmClient>, prompts: Arc<PromptStore>, options: CompletionOptions) -> Self {
        Self {
            llm,
            prompts,
            options,
        }
    }

    /// Plan tool calls for a request.
    ///
    /// # Errors
    ///
    /// [`Error::NoToolsDiscovered`] when the registry is empty;
    /// [`Error::PlanUnavailable`] when both strategies fail.
    pub async fn plan(
        &self,
        request_text: &str,
        customer_id: &str,
        registry: &ToolRegistry,
    ) -> Result<PlanOutcome> {
        let known = registry.tool_names();
        if known.is_empty() {
            return Err(Error::NoToolsDiscovered);
        }

        match self.llm_plan(request_text, customer_id, registry).await {
            Ok(plan) => match plan.validate(&known) {
                Ok(()) => {
                    debug!(
                        component = "technical",
                        event = "plan_accepted",
                        strategy = "llm",
                        step_count = plan.steps.len(),
                        "llm plan accepted"
                    );
                    return Ok(PlanOutcome {
                        plan,
                        strategy: PlanStrategy::Llm,
                    });
                }
                Err(reason) => warn!(
                    component = "technical",
                    event = "plan_rejected",
                    strategy = "llm",
                    reason = %reason,
                    "llm plan failed validation, using rules"
                ),
            },
            Err(err) => warn!(
                component = "technical",
                event = "plan_rejected",
                strategy = "llm",
                error_kind = err.kind().map(|k| k.as_str()).unwrap_or("internal"),
                "llm planning failed, using rules: {}", err
            ),
        }

        let plan = rule_plan(request_text, customer_id, &known)?;
        debug!(
            component = "technical",
            event = "plan_accepted",
            strategy = "rules",
            step_count = plan.steps.len(),
            "rule plan accepted"
        );
        Ok(PlanOutcome {
            plan,
            strategy: PlanStrategy::Rules,
        })
    }

    async fn llm_plan(
        &self,
        request_text: &str,
        customer_id: &str,
        registry: &ToolRegistry,
    ) -> Result<ToolCallPlan> {
        let catalog: Vec<Value> = registry
            .all_tools()
            .iter()
            .map(|tool| {
                json!({
                    "name": tool.tool_name,
                    "description": tool.description,
                    "parameter_schema": tool.parameter_schema,
                })
            })
            .collect();

        let mut variables = HashMap::new();
        variables.insert("request_text", request_text.to_string());
        variables.insert("customer_id", customer_id.to_string());
        variables.insert(
            "tool_catalog",
            serde_json::to_string_pretty(&catalog).unwrap_or_else(|_| "[]".to_string()),
        );
        let prompt = self.prompts.render("technical", "plan_generation", &variables)?;

        let mut options = self.options.clone();
        options.response_format = ResponseFormat::Json;
        let completion = self
            .llm
            .complete(&[ChatMessage::user(prompt)], &options)
            .await?;

        let raw: RawPlan = serde_json::from_value(
            completion
                .json
                .ok_or_else(|| Error::LlmParse("planner returned no JSON".to_string()))?,
        )
        .map_err(|e| Error::LlmParse(format!("plan shape: {}", e)))?;

        Ok(normalize_plan(raw))
    }
}

/// Fill in missing step ids and coerce parameters to objects.
fn normalize_plan(raw: RawPlan) -> ToolCallPlan {
    let steps = raw
        .steps
        .into_iter()
        .enumerate()
        .map(|(index, step)| PlanStep {
            id: step
                .id
                .filter(|id| !id.trim().is_empty())
                .unwrap_or_else(|| format!("step_{}", index + 1)),
            tool_name: step.tool_name,
            parameters: match step.parameters {
                Some(value @ Value::Object(_)) => value,
                _ => json!({}),
            },
            purpose: step.purpose,
            dependencies: step.dependencies,
        })
        .collect();
    ToolCallPlan { steps }
}

/// Keyword-rule plan: one independent step per matched tool, every step
/// carrying the recovered customer id.
///
/// # Errors
///
/// [`Error::PlanUnavailable`] when none of the matched tools exist in the
/// registry.
pub fn rule_plan(
    request_text: &str,
    customer_id: &str,
    known_tools: &std::collections::HashSet<String>,
) -> Result<ToolCallPlan> {
    let steps: Vec<PlanStep> = rules::match_tools(request_text)
        .into_iter()
        .filter(|tool| known_tools.contains(*tool))
        .enumerate()
        .map(|(index, tool)| PlanStep {
            id: format!("step_{}", index + 1),
            tool_name: tool.to_string(),
            parameters: json!({ "customer_id": customer_id }),
            purpose: format!("keyword rule selected {}", tool),
            dependencies: Vec::new(),
        })
        .collect();

    if steps.is_empty() {
        return Err(Error::PlanUnavailable(
            "no rule-mapped tool is present in the registry".to_string(),
        ));
    }
    Ok(ToolCallPlan { steps })
}
