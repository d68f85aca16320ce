//! Technical Agent: plans and executes tool calls for one A2A task.
//!
//! The task lifecycle is `received → planning → executing → aggregating →
//! replied`, with a terminal `failed` branch on unrecoverable conditions
//! (no recoverable customer id, empty registry, no viable plan).
//! Tool-level failures are not unrecoverable: they are encoded per step
//! in the results bundle and the task still completes.

mod agent;
mod executor;
mod planner;
mod recovery;

pub use agent::TechnicalAgent;
pub use executor::PlanExecutor;
pub use planner::{PlanOutcome, PlanStrategy, Planner};
pub use recovery::{CustomerIdRecovery, RecoveredCustomerId, RecoverySource};
