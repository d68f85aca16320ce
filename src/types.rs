//! Core type definitions for the agent coordination core.
//!
//! The types here fall into four groups:
//!
//! - **Intent model**: [`Intent`] and [`IntentKind`], produced per turn by
//!   the domain agent's intent analysis and never persisted.
//! - **Tool catalog**: [`ToolDescriptor`], the unit stored by the tool
//!   registry, keyed by `(server_id, tool_name)`.
//! - **Plans and results**: [`ToolCallPlan`] (an ordered DAG of steps over
//!   the registry) and [`ToolResultsBundle`] (per-step outcomes keyed by
//!   step id, plus summary counts). The bundle is the technical agent's
//!   reply payload; tool-level failures are encoded here, never raised.
//! - **Conversation bookkeeping**: [`ConversationTurn`], retained only in
//!   process memory for diagnostics.
//!
//! Wire-facing enums serialize snake_case so the JSON forms match the
//! protocol documents exchanged between the tiers.

use crate::ErrorKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};

// ============================================================================
// CANONICAL TOOL NAMES
// ============================================================================

/// Tool names every compliant policy server supports.
///
/// Unknown tools may still appear in the registry and be selected by the
/// LLM planner, but the rule fallback only ever chooses from this set.
pub mod tool_names {
    pub const GET_CUSTOMER_POLICIES: &str = "get_customer_policies";
    pub const GET_POLICY_DETAILS: &str = "get_policy_details";
    pub const GET_COVERAGE_INFORMATION: &str = "get_coverage_information";
    pub const GET_PAYMENT_INFORMATION: &str = "get_payment_information";
    pub const GET_AGENT: &str = "get_agent";
    pub const GET_DEDUCTIBLES: &str = "get_deductibles";
    pub const GET_POLICY_TYPES: &str = "get_policy_types";
    pub const GET_POLICY_LIST: &str = "get_policy_list";
    pub const GET_RECOMMENDATIONS: &str = "get_recommendations";

    /// The full canonical set, in a stable order.
    pub const ALL: [&str; 9] = [
        GET_CUSTOMER_POLICIES,
        GET_POLICY_DETAILS,
        GET_COVERAGE_INFORMATION,
        GET_PAYMENT_INFORMATION,
        GET_AGENT,
        GET_DEDUCTIBLES,
        GET_POLICY_TYPES,
        GET_POLICY_LIST,
        GET_RECOMMENDATIONS,
    ];
}

// ============================================================================
// INTENT MODEL
// ============================================================================

/// Classified intent categories for a customer message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentKind {
    PaymentInquiry,
    DeductibleInquiry,
    CoverageInquiry,
    PolicyInquiry,
    AgentContact,
    ClaimStatus,
    GeneralInquiry,
}

impl IntentKind {
    /// Whether this intent requires data from the policy backend.
    ///
    /// `GeneralInquiry` is the only kind the domain agent can answer
    /// without delegating to the technical tier.
    pub fn needs_backend(&self) -> bool {
        !matches!(self, IntentKind::GeneralInquiry)
    }
}

/// Result of intent analysis for a single turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Intent {
    /// Ordered, non-empty sequence of classified intents
    pub primary_intents: Vec<IntentKind>,
    /// Classifier confidence in [0, 1]
    pub confidence: f64,
    /// Whether answering requires an authenticated customer
    pub requires_auth: bool,
    /// Whether answering requires the technical tier
    pub requires_technical: bool,
}

impl Intent {
    /// Validate the invariants of the intent schema.
    pub fn validate(&self) -> Result<(), String> {
        if self.primary_intents.is_empty() {
            return Err("primary_intents must be non-empty".to_string());
        }
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(format!(
                "confidence {} outside [0, 1]",
                self.confidence
            ));
        }
        Ok(())
    }

    /// Whether any classified intent needs the technical tier.
    pub fn needs_delegation(&self) -> bool {
        self.requires_technical || self.primary_intents.iter().any(IntentKind::needs_backend)
    }
}

// ============================================================================
// TOOL CATALOG
// ============================================================================

/// A tool discovered on a tool server.
///
/// Uniqueness is `(server_id, tool_name)` within the registry; the same
/// name on two servers is a conflict resolved by configuration order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Identifier of the server that advertised this tool
    pub server_id: String,
    pub tool_name: String,
    pub description: String,
    /// JSON schema for the tool's parameters
    pub parameter_schema: Value,
    /// JSON schema of the return payload, when the server advertises one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_schema: Option<Value>,
    /// When the registry last saw this descriptor
    pub discovered_at: DateTime<Utc>,
}

// ============================================================================
// TOOL CALL PLANS
// ============================================================================

/// One step of a tool call plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanStep {
    /// Plan-unique step identifier
    pub id: String,
    pub tool_name: String,
    /// Arguments passed to the tool
    pub parameters: Value,
    /// Why the planner chose this step (carried into logs)
    #[serde(default)]
    pub purpose: String,
    /// Step ids that must reach a terminal state before this step runs
    #[serde(default)]
    pub dependencies: Vec<String>,
}

/// An ordered DAG of tool invocations derived from one A2A task.
///
/// Constructed per task, validated against the registry snapshot current
/// at planning time, and discarded after execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallPlan {
    pub steps: Vec<PlanStep>,
}

impl ToolCallPlan {
    /// Build a single-step plan, the common case for one-intent requests.
    pub fn single(tool_name: impl Into<String>, parameters: Value, purpose: impl Into<String>) -> Self {
        Self {
            steps: vec![PlanStep {
                id: "step_1".to_string(),
                tool_name: tool_name.into(),
                parameters,
                purpose: purpose.into(),
                dependencies: Vec::new(),
            }],
        }
    }

    /// Validate the plan against a set of known tool names.
    ///
    /// Checks, in order: the plan is non-empty, step ids are unique, every
    /// referenced tool exists, and every dependency names an *earlier*
    /// step (which also rules out cycles and self-references).
    pub fn validate(&self, known_tools: &HashSet<String>) -> Result<(), String> {
        if self.steps.is_empty() {
            return Err("plan has no steps".to_string());
        }

        let mut seen: HashSet<&str> = HashSet::new();
        for step in &self.steps {
            if step.id.trim().is_empty() {
                return Err("step with empty id".to_string());
            }
            if !seen.insert(step.id.as_str()) {
                return Err(format!("duplicate step id '{}'", step.id));
            }
            if !known_tools.contains(&step.tool_name) {
                return Err(format!(
                    "step '{}' references unknown tool '{}'",
                    step.id, step.tool_name
                ));
            }
            for dep in &step.dependencies {
                if !seen.contains(dep.as_str()) || dep == &step.id {
                    return Err(format!(
                        "step '{}' depends on '{}' which does not precede it",
                        step.id, dep
                    ));
                }
            }
        }
        Ok(())
    }
}

// ============================================================================
// TOOL CALL RESULTS
// ============================================================================

/// Terminal status of one executed plan step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCallStatus {
    Ok,
    NotFound,
    InvalidParams,
    UpstreamError,
    Timeout,
    ServerUnreachable,
    Overloaded,
}

impl ToolCallStatus {
    pub fn is_ok(&self) -> bool {
        matches!(self, ToolCallStatus::Ok)
    }
}

/// Outcome of one plan step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallResult {
    pub step_id: String,
    pub tool_name: String,
    pub status: ToolCallStatus,
    /// Tool payload on success, `null` otherwise
    pub data: Option<Value>,
    pub latency_ms: u64,
    /// Invocation attempts consumed, including retries
    pub attempts: u32,
}

/// Aggregate counts over a bundle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryCounts {
    pub ok: usize,
    pub not_found: usize,
    /// Everything that is neither ok nor not_found
    pub error: usize,
}

/// All step results of one executed plan, keyed by step id.
///
/// The map is a `BTreeMap` so the serialized form is deterministic
/// regardless of completion order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResultsBundle {
    pub results: BTreeMap<String, ToolCallResult>,
    pub summary_counts: SummaryCounts,
}

impl ToolResultsBundle {
    /// Assemble a bundle from step results, computing summary counts.
    pub fn from_results(results: Vec<ToolCallResult>) -> Self {
        let mut counts = SummaryCounts::default();
        let mut map = BTreeMap::new();
        for result in results {
            match result.status {
                ToolCallStatus::Ok => counts.ok += 1,
                ToolCallStatus::NotFound => counts.not_found += 1,
                _ => counts.error += 1,
            }
            map.insert(result.step_id.clone(), result);
        }
        Self {
            results: map,
            summary_counts: counts,
        }
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// One-line natural-language preview for reply metadata, e.g.
    /// `"3 tool calls: 2 ok, 1 failed"`.
    pub fn human_summary(&self) -> String {
        let total = self.len();
        let failed = total - self.summary_counts.ok;
        if failed == 0 {
            format!(
                "{} tool call{} completed",
                total,
                if total == 1 { "" } else { "s" }
            )
        } else {
            format!(
                "{} tool calls: {} ok, {} failed",
                total, self.summary_counts.ok, failed
            )
        }
    }
}

// ============================================================================
// CONVERSATION BOOKKEEPING
// ============================================================================

/// One processed chat turn, retained in memory for diagnostics only.
#[derive(Debug, Clone, Serialize)]
pub struct ConversationTurn {
    pub turn_id: uuid::Uuid,
    pub session_id: String,
    pub user_text: String,
    pub intent: Option<Intent>,
    /// Raw technical-tier reply payload, when delegation happened
    pub ta_reply: Option<Value>,
    pub synthesized_reply: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorKind>,
}
