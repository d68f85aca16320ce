//! # policy-agents
//!
//! The agent coordination core of a multi-agent insurance assistant: a
//! two-tier orchestration system that turns natural-language customer
//! requests into structured retrievals against a policy backend and back
//! into natural-language answers.
//!
//! ## The two tiers
//!
//! - The **domain agent** owns the customer-facing turn: it resolves the
//!   session, classifies intent, delegates data retrieval, and
//!   synthesizes the reply. Served over `POST /chat`.
//! - The **technical agent** owns the backend: it recovers the customer
//!   context from an A2A task, plans tool calls over the discovered
//!   catalog, executes them concurrently, and replies with a results
//!   bundle. Served over `POST /a2a/tasks`.
//!
//! Between them sit two wire protocols: the A2A task protocol (HTTP JSON
//! task/reply envelopes correlated by `task_id`) and the tool protocol
//! (introspectable tools on the policy server: `GET /tools` and
//! `POST /tools/<name>/invoke`).
//!
//! ## Resilience posture
//!
//! Every layer degrades instead of failing the turn: LLM classification
//! falls back to keyword rules, LLM planning falls back to the same
//! rules, model outages during synthesis fall back to a templated reply
//! built only from retrieved fields, and per-tool failures are encoded in
//! the results bundle while the task still completes. Backpressure
//! refuses work early (bounded A2A semaphore, bounded per-server tool
//! queues) rather than queueing without bound.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use policy_agents::config::Settings;
//! use policy_agents::prompts::PromptStore;
//! use policy_agents::registry::ToolRegistry;
//! use policy_agents::tp::{ToolProtocolClient, ToolServerConfig};
//! use policy_agents::llm::LlmClient;
//! use policy_agents::technical::TechnicalAgent;
//! use policy_agents::a2a::{a2a_router, serve};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::from_env()?;
//!     let servers = ToolServerConfig::from_urls(&settings.policy_server_urls);
//!     let tpc = Arc::new(ToolProtocolClient::new(servers, settings.http_timeout)?);
//!     let registry = Arc::new(ToolRegistry::new(tpc.clone(), settings.registry_refresh));
//!     let llm = Arc::new(LlmClient::new(&settings.llm)?);
//!     let prompts = Arc::new(PromptStore::builtin());
//!
//!     let agent = Arc::new(TechnicalAgent::new(
//!         registry.clone(),
//!         tpc,
//!         llm,
//!         prompts,
//!         &settings.llm,
//!     ));
//!     tokio::spawn(registry.run_refresh_loop());
//!     serve(
//!         a2a_router(agent, settings.a2a_concurrency),
//!         settings.technical_agent_port,
//!     )
//!     .await?;
//!     Ok(())
//! }
//! ```

// ============================================================================
// MODULE DECLARATIONS
// ============================================================================

/// Agent-to-Agent task protocol: wire envelopes, client, axum server.
pub mod a2a;

/// Environment-driven process configuration.
pub mod config;

/// Domain agent: session gate, intent analysis, delegation, synthesis,
/// and the `/chat` HTTP surface.
pub mod domain;

/// Chat-completion client with model fallback and JSON-mode repair.
pub mod llm;

/// Versioned prompt templates with strict variable interpolation.
pub mod prompts;

/// Tool catalog discovered across tool servers, with staleness tracking
/// and deterministic conflict precedence.
pub mod registry;

/// Retry utilities with exponential backoff and jitter.
pub mod retry;

/// Keyword rules shared by both tiers' LLM fallbacks.
pub mod rules;

/// Sliding-TTL session store.
pub mod session;

/// Technical agent: customer-context recovery, planning, execution,
/// aggregation.
pub mod technical;

/// Tool-protocol client with local parameter validation and bounded
/// per-server queues.
pub mod tp;

/// Domain data model: intents, descriptors, plans, results, bundles.
pub mod types;

mod error;

// ============================================================================
// PUBLIC EXPORTS
// ============================================================================

pub use error::{Error, ErrorKind, Result};

/// Convenience module re-exporting the types most callers need.
pub mod prelude {
    pub use crate::a2a::{A2aClient, A2aReply, A2aTask, TaskHandler, TaskStatus};
    pub use crate::config::Settings;
    pub use crate::domain::DomainAgent;
    pub use crate::llm::LlmClient;
    pub use crate::prompts::PromptStore;
    pub use crate::registry::ToolRegistry;
    pub use crate::session::SessionStore;
    pub use crate::technical::TechnicalAgent;
    pub use crate::tp::{ToolProtocolClient, ToolServerConfig};
    pub use crate::types::{
        Intent, IntentKind, ToolCallPlan, ToolCallResult, ToolCallStatus, ToolDescriptor,
        ToolResultsBundle,
    };
    pub use crate::{Error, ErrorKind, Result};
}
