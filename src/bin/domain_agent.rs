//! Domain agent process: serves `POST /chat` for the UI, delegates data
//! retrieval to the technical agent over A2A.

use anyhow::Context;
use policy_agents::a2a::{A2aClient, serve};
use policy_agents::config::Settings;
use policy_agents::domain::{DomainAgent, chat_router};
use policy_agents::llm::LlmClient;
use policy_agents::prompts::PromptStore;
use policy_agents::session::SessionStore;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::from_env().context("resolving configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(settings.log_level.clone())),
        )
        .init();

    let sessions = Arc::new(SessionStore::new(settings.session_ttl));
    tokio::spawn(sessions.clone().run_sweeper());

    let llm = Arc::new(LlmClient::new(&settings.llm).context("building LLM client")?);
    let prompts = Arc::new(PromptStore::builtin());
    let a2a = A2aClient::new(settings.technical_agent_url.clone())
        .context("building A2A client")?;

    let agent = Arc::new(DomainAgent::new(
        sessions.clone(),
        llm,
        prompts,
        a2a,
        &settings.llm,
    ));

    info!(
        component = "domain",
        event = "starting",
        port = settings.domain_agent_port,
        technical_agent_url = %settings.technical_agent_url,
        "domain agent starting"
    );
    serve(chat_router(agent, sessions), settings.domain_agent_port)
        .await
        .context("serving chat surface")?;
    Ok(())
}
