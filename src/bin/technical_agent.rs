//! Technical agent process: discovers tools on the policy server(s) and
//! serves `POST /a2a/tasks` for the domain tier.

use anyhow::Context;
use policy_agents::a2a::{a2a_router, serve};
use policy_agents::config::Settings;
use policy_agents::llm::LlmClient;
use policy_agents::prompts::PromptStore;
use policy_agents::registry::ToolRegistry;
use policy_agents::technical::TechnicalAgent;
use policy_agents::tp::{ToolProtocolClient, ToolServerConfig};
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

    let servers = ToolServerConfig::from_urls(&settings.policy_server_urls);
    let tpc = Arc::new(
        ToolProtocolClient::new(servers, settings.http_timeout)
            .context("building tool-protocol client")?,
    );
    let registry = Arc::new(ToolRegistry::new(tpc.clone(), settings.registry_refresh));
    tokio::spawn(registry.clone().run_refresh_loop());

    let llm = Arc::new(LlmClient::new(&settings.llm).context("building LLM client")?);
    let prompts = Arc::new(PromptStore::builtin());
    let agent = Arc::new(TechnicalAgent::new(
        registry,
        tpc,
        llm,
        prompts,
        &settings.llm,
    ));

    info!(
        component = "technical",
        event = "starting",
        port = settings.technical_agent_port,
        policy_servers = ?settings.policy_server_urls,
        "technical agent starting"
    );
    serve(
        a2a_router(agent, settings.a2a_concurrency),
        settings.technical_agent_port,
    )
    .await
    .context("serving A2A surface")?;
    Ok(())
}
