//! Plan execution over the tool-protocol client.
//!
//! Steps whose dependencies are all terminal run concurrently; dependent
//! steps wait for their predecessors to reach *any* terminal state (a
//! failed predecessor does not cancel its dependents; the bundle records
//! whatever each step produced). Results are committed to the bundle in
//! completion order, which is safe because the bundle is keyed by step
//! id. The whole plan runs under one deadline; steps still unfinished
//! when it elapses are aborted and recorded as timeouts, and nothing is
//! written to the bundle after that point.

use crate::registry::ToolRegistry;
use crate::tp::ToolProtocolClient;
use crate::types::{PlanStep, ToolCallPlan, ToolCallResult, ToolCallStatus, ToolResultsBundle};
use crate::Error;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Default budget for one whole plan.
pub const DEFAULT_PLAN_DEADLINE: Duration = Duration::from_secs(15);

/// Executes validated plans against the tool servers.
pub struct PlanExecutor {
    tpc: Arc<ToolProtocolClient>,
    registry: Arc<ToolRegistry>,
    plan_deadline: Duration,
}

impl PlanExecutor {
    pub fn new(tpc: Arc<ToolProtocolClient>, registry: Arc<ToolRegistry>) -> Self {
        Self::with_deadline(tpc, registry, DEFAULT_PLAN_DEADLINE)
    }

    pub fn with_deadline(
        tpc: Arc<ToolProtocolClient>,
        registry: Arc<ToolRegistry>,
        plan_deadline: Duration,
    ) -> Self {
        Self {
            tpc,
            registry,
            plan_deadline,
        }
    }

    /// Execute a plan and aggregate every step into a bundle.
    ///
    /// Infallible by design: tool-level failures become per-step statuses
    /// and the bundle always carries one entry per plan step.
    pub async fn execute(&self, plan: &ToolCallPlan) -> ToolResultsBundle {
        let deadline = Instant::now() + self.plan_deadline;
        let mut remaining: Vec<PlanStep> = plan.steps.clone();
        let mut terminal: HashSet<String> = HashSet::new();
        let mut in_flight: HashSet<String> = HashSet::new();
        let mut results: Vec<ToolCallResult> = Vec::new();
        let mut join_set: JoinSet<ToolCallResult> = JoinSet::new();

        loop {
            // Launch every step whose dependencies are all terminal.
            let (ready, blocked) = split_ready(remaining, &terminal);
            remaining = blocked;
            for step in ready {
                match self.registry.lookup(&step.tool_name) {
                    Some(descriptor) => {
                        in_flight.insert(step.id.clone());
                        let tpc = self.tpc.clone();
                        join_set.spawn(async move {
                            let invocation = tpc.invoke(&descriptor, step.parameters.clone()).await;
                            match invocation.outcome {
                                Ok(data) => ToolCallResult {
                                    step_id: step.id,
                                    tool_name: step.tool_name,
                                    status: ToolCallStatus::Ok,
                                    data: Some(data),
                                    latency_ms: invocation.latency_ms,
                                    attempts: invocation.attempts,
                                },
                                Err(err) => ToolCallResult {
                                    step_id: step.id,
                                    tool_name: step.tool_name,
                                    status: status_for(&err),
                                    data: None,
                                    latency_ms: invocation.latency_ms,
                                    attempts: invocation.attempts,
                                },
                            }
                        });
                    }
                    None => {
                        // The tool vanished between planning and execution
                        // (registry refresh in between). Terminal not_found.
                        warn!(
                            component = "technical",
                            event = "tool_vanished",
                            tool_name = %step.tool_name,
                            step_id = %step.id,
                            "tool no longer in registry at execution time"
                        );
                        terminal.insert(step.id.clone());
                        results.push(ToolCallResult {
                            step_id: step.id,
                            tool_name: step.tool_name,
                            status: ToolCallStatus::NotFound,
                            data: None,
                            latency_ms: 0,
                            attempts: 0,
                        });
                    }
                }
            }

            if join_set.is_empty() {
                if remaining.is_empty() {
                    break;
                }
                // Validated plans cannot reach this state; bail rather
                // than spin if one somehow does.
                warn!(
                    component = "technical",
                    event = "plan_stalled",
                    stuck_steps = remaining.len(),
                    "steps with unsatisfiable dependencies"
                );
                break;
            }

            match tokio::time::timeout_at(deadline, join_set.join_next()).await {
                Ok(Some(Ok(result))) => {
                    terminal.insert(result.step_id.clone());
                    in_flight.remove(&result.step_id);
                    results.push(result);
                }
                Ok(Some(Err(join_err))) => {
                    // A panicked step task; its id stays in `in_flight`
                    // and is recorded as a timeout below.
                    warn!(
                        component = "technical",
                        event = "step_task_failed",
                        "step task aborted: {}", join_err
                    );
                    break;
                }
                Ok(None) => break,
                Err(_) => {
                    debug!(
                        component = "technical",
                        event = "plan_deadline",
                        unfinished = in_flight.len() + remaining.len(),
                        "plan deadline elapsed, aborting unfinished steps"
                    );
                    join_set.abort_all();
                    break;
                }
            }
        }

        // Everything not terminal at this point timed out or was never
        // started before the deadline.
        for step in plan
            .steps
            .iter()
            .filter(|s| !terminal.contains(&s.id))
        {
            results.push(ToolCallResult {
                step_id: step.id.clone(),
                tool_name: step.tool_name.clone(),
                status: ToolCallStatus::Timeout,
                data: None,
                latency_ms: self.plan_deadline.as_millis() as u64,
                attempts: if in_flight.contains(&step.id) { 1 } else { 0 },
            });
        }

        // A server we could not reach warrants a catalog refresh.
        if results
            .iter()
            .any(|r| r.status == ToolCallStatus::ServerUnreachable)
        {
            self.registry.request_refresh();
        }

        ToolResultsBundle::from_results(results)
    }
}

/// Partition steps into (ready, blocked) against the set of terminal ids.
fn split_ready(steps: Vec<PlanStep>, terminal: &HashSet<String>) -> (Vec<PlanStep>, Vec<PlanStep>) {
    steps
        .into_iter()
        .partition(|step| step.dependencies.iter().all(|dep| terminal.contains(dep)))
}

/// Map an invocation error to its bundle status.
fn status_for(err: &Error) -> ToolCallStatus {
    match err {
        Error::NotFound(_) => ToolCallStatus::NotFound,
        Error::InvalidParameters { .. } => ToolCallStatus::InvalidParams,
        Error::Timeout => ToolCallStatus::Timeout,
        Error::Http(e) if e.is_timeout() => ToolCallStatus::Timeout,
        Error::Http(_) | Error::ServerUnreachable(_) => ToolCallStatus::ServerUnreachable,
        Error::Overloaded(_) => ToolCallStatus::Overloaded,
        _ => ToolCallStatus::UpstreamError,
    }
}
