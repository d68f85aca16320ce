//! The Technical Agent's task handler.

use super::executor::PlanExecutor;
use super::planner::Planner;
use super::recovery::CustomerIdRecovery;
use crate::a2a::{A2aReply, A2aTask, TaskHandler};
use crate::config::LlmSettings;
use crate::llm::{CompletionOptions, LlmClient};
use crate::prompts::PromptStore;
use crate::registry::ToolRegistry;
use crate::tp::ToolProtocolClient;
use crate::{Error, ErrorKind};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

/// Back-end agent: recovers the customer context, plans tool calls over
/// the registry, executes them, and replies with a results bundle.
///
/// `handle_task` is a pure read over backend tools, so replays of the
/// same task are naturally idempotent.
pub struct TechnicalAgent {
    registry: Arc<ToolRegistry>,
    planner: Planner,
    executor: PlanExecutor,
    recovery: CustomerIdRecovery,
    llm: Arc<LlmClient>,
    prompts: Arc<PromptStore>,
    llm_options: CompletionOptions,
}

impl TechnicalAgent {
    pub fn new(
        registry: Arc<ToolRegistry>,
        tpc: Arc<ToolProtocolClient>,
        llm: Arc<LlmClient>,
        prompts: Arc<PromptStore>,
        llm_settings: &LlmSettings,
    ) -> Self {
        let llm_options = CompletionOptions::from_settings(llm_settings);
        Self {
            planner: Planner::new(llm.clone(), prompts.clone(), llm_options.clone()),
            executor: PlanExecutor::new(tpc, registry.clone()),
            recovery: CustomerIdRecovery::new(),
            registry,
            llm,
            prompts,
            llm_options,
        }
    }

    fn fail(task: &A2aTask, kind: ErrorKind, message: String) -> A2aReply {
        warn!(
            component = "technical",
            event = "task_failed",
            task_id = %task.task_id,
            error_kind = kind.as_str(),
            "task failed: {}", message
        );
        A2aReply::failed(task.task_id, kind, message)
    }
}

#[async_trait]
impl TaskHandler for TechnicalAgent {
    async fn handle_task(&self, task: A2aTask) -> A2aReply {
        // received → planning: no tool call may happen without a
        // recovered customer id.
        let recovered = match self
            .recovery
            .recover(&task, &self.llm, &self.prompts, &self.llm_options)
            .await
        {
            Ok(recovered) => recovered,
            Err(err) => {
                return Self::fail(&task, ErrorKind::MissingCustomerContext, err.to_string());
            }
        };

        if self.registry.is_empty() {
            // Ask the refresh loop to repopulate; this task still fails.
            self.registry.request_refresh();
            return Self::fail(
                &task,
                ErrorKind::NoToolsDiscovered,
                "tool registry is empty".to_string(),
            );
        }

        // planning → executing
        let outcome = match self
            .planner
            .plan(&task.text, &recovered.id, &self.registry)
            .await
        {
            Ok(outcome) => outcome,
            Err(Error::NoToolsDiscovered) => {
                self.registry.request_refresh();
                return Self::fail(
                    &task,
                    ErrorKind::NoToolsDiscovered,
                    "tool registry is empty".to_string(),
                );
            }
            Err(err) => {
                return Self::fail(&task, ErrorKind::PlanUnavailable, err.to_string());
            }
        };

        info!(
            component = "technical",
            event = "executing_plan",
            task_id = %task.task_id,
            customer_id = %recovered.id,
            strategy = ?outcome.strategy,
            step_count = outcome.plan.steps.len(),
            "plan accepted, executing"
        );

        // executing → aggregating → replied. Tool failures live inside
        // the bundle; the task itself completes.
        let bundle = self.executor.execute(&outcome.plan).await;
        let summary = bundle.human_summary();
        let payload = serde_json::to_string(&bundle).expect("bundle serializes");

        info!(
            component = "technical",
            event = "task_completed",
            task_id = %task.task_id,
            customer_id = %recovered.id,
            ok = bundle.summary_counts.ok,
            not_found = bundle.summary_counts.not_found,
            error = bundle.summary_counts.error,
            "bundle aggregated"
        );
        A2aReply::completed(task.task_id, payload, Some(summary))
    }
}
