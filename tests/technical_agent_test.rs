//! End-to-end tests for the technical agent with the LLM unavailable:
//! the rule planner and deterministic customer-id recovery carry every
//! path.

mod common;

use common::{
    KNOWN_CUSTOMER, MockBackendConfig, UNKNOWN_CUSTOMER, dead_llm_settings, spawn_policy_server,
};
use policy_agents::ErrorKind;
use policy_agents::a2a::{A2aTask, TaskHandler, TaskStatus, embed_customer_marker};
use policy_agents::llm::LlmClient;
use policy_agents::prompts::PromptStore;
use policy_agents::registry::ToolRegistry;
use policy_agents::technical::TechnicalAgent;
use policy_agents::tp::{ToolProtocolClient, ToolServerConfig};
use policy_agents::types::{ToolCallStatus, ToolResultsBundle};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

async fn agent_against(urls: Vec<String>, refresh: bool) -> (TechnicalAgent, Arc<ToolRegistry>) {
    let tpc = Arc::new(
        ToolProtocolClient::new(ToolServerConfig::from_urls(&urls), Duration::from_secs(2))
            .unwrap(),
    );
    let registry = Arc::new(ToolRegistry::new(tpc.clone(), Duration::from_secs(300)));
    if refresh {
        registry.refresh().await;
    }
    let settings = dead_llm_settings();
    let llm = Arc::new(LlmClient::new(&settings).unwrap());
    let prompts = Arc::new(PromptStore::builtin());
    (
        TechnicalAgent::new(registry.clone(), tpc, llm, prompts, &settings),
        registry,
    )
}

fn bundle_of(reply: &policy_agents::a2a::A2aReply) -> ToolResultsBundle {
    serde_json::from_str(reply.first_text().unwrap()).unwrap()
}

#[tokio::test]
async fn policy_lookup_happy_path() {
    let (url, _backend) = spawn_policy_server(MockBackendConfig::default()).await;
    let (agent, _registry) = agent_against(vec![url], true).await;

    let task = A2aTask::new(
        "domain",
        "technical",
        embed_customer_marker("What policies do I have?", KNOWN_CUSTOMER),
    );
    let reply = agent.handle_task(task.clone()).await;

    assert_eq!(reply.task_id, task.task_id);
    assert_eq!(reply.status, TaskStatus::Completed);
    let bundle = bundle_of(&reply);
    assert_eq!(bundle.len(), 1);
    let result = bundle.results.values().next().unwrap();
    assert_eq!(result.tool_name, "get_customer_policies");
    assert_eq!(result.status, ToolCallStatus::Ok);
    let policies = &result.data.as_ref().unwrap()["policies"];
    assert_eq!(policies.as_array().unwrap().len(), 2);
    assert_eq!(policies[0]["vehicle"], "2019 Honda Civic");

    // reply metadata carries the preview
    assert_eq!(
        reply.parts[0].metadata.get("human_summary").unwrap(),
        "1 tool call completed"
    );
}

#[tokio::test]
async fn metadata_customer_id_wins_over_marker() {
    let (url, _backend) = spawn_policy_server(MockBackendConfig::default()).await;
    let (agent, _registry) = agent_against(vec![url], true).await;

    // marker names an unknown customer, metadata the known one;
    // metadata must win
    let task = A2aTask::new(
        "domain",
        "technical",
        embed_customer_marker("list my policies", UNKNOWN_CUSTOMER),
    )
    .with_metadata("customer_id", json!(KNOWN_CUSTOMER));
    let reply = agent.handle_task(task).await;

    let bundle = bundle_of(&reply);
    assert_eq!(bundle.summary_counts.ok, 1);
}

#[tokio::test]
async fn multi_intent_plans_and_executes_both_tools() {
    let (url, backend) = spawn_policy_server(MockBackendConfig::default()).await;
    let (agent, _registry) = agent_against(vec![url], true).await;

    let task = A2aTask::new(
        "domain",
        "technical",
        embed_customer_marker(
            "When is my premium due and what is my deductible?",
            KNOWN_CUSTOMER,
        ),
    );
    let reply = agent.handle_task(task).await;

    assert_eq!(reply.status, TaskStatus::Completed);
    let bundle = bundle_of(&reply);
    assert_eq!(bundle.len(), 2);
    assert_eq!(bundle.summary_counts.ok, 2);
    let tools: Vec<&str> = bundle
        .results
        .values()
        .map(|r| r.tool_name.as_str())
        .collect();
    assert!(tools.contains(&"get_payment_information"));
    assert!(tools.contains(&"get_deductibles"));
    assert_eq!(backend.invocations.load(std::sync::atomic::Ordering::SeqCst), 2);
}

#[tokio::test]
async fn unknown_customer_completes_with_not_found() {
    let (url, _backend) = spawn_policy_server(MockBackendConfig::default()).await;
    let (agent, _registry) = agent_against(vec![url], true).await;

    let task = A2aTask::new(
        "domain",
        "technical",
        embed_customer_marker("What does my auto policy cover?", UNKNOWN_CUSTOMER),
    );
    let reply = agent.handle_task(task).await;

    // partial success semantics: the task completes, failures live in
    // the bundle
    assert_eq!(reply.status, TaskStatus::Completed);
    let bundle = bundle_of(&reply);
    assert!(bundle.len() >= 1);
    assert_eq!(bundle.summary_counts.ok, 0);
    assert!(
        bundle
            .results
            .values()
            .all(|r| r.status == ToolCallStatus::NotFound)
    );
}

#[tokio::test]
async fn missing_marker_fails_without_tool_calls() {
    let (url, backend) = spawn_policy_server(MockBackendConfig::default()).await;
    let (agent, _registry) = agent_against(vec![url], true).await;

    let task = A2aTask::new("domain", "technical", "What does my auto policy cover?");
    let reply = agent.handle_task(task).await;

    assert_eq!(reply.status, TaskStatus::Failed);
    let (kind, _) = reply.error_document().unwrap();
    assert_eq!(kind, ErrorKind::MissingCustomerContext);
    // the invariant: no tool call without a customer id
    assert_eq!(backend.invocations.load(std::sync::atomic::Ordering::SeqCst), 0);
}

#[tokio::test]
async fn empty_registry_fails_with_no_tools_discovered() {
    let (url, _backend) = spawn_policy_server(MockBackendConfig {
        empty_catalog: true,
        ..Default::default()
    })
    .await;
    let (agent, _registry) = agent_against(vec![url], true).await;

    let task = A2aTask::new(
        "domain",
        "technical",
        embed_customer_marker("billing?", KNOWN_CUSTOMER),
    );
    let reply = agent.handle_task(task).await;

    assert_eq!(reply.status, TaskStatus::Failed);
    let (kind, _) = reply.error_document().unwrap();
    assert_eq!(kind, ErrorKind::NoToolsDiscovered);
}

#[tokio::test]
async fn backend_down_after_discovery_completes_with_unreachable_entries() {
    // Discover tools from a live server, then execute against a dead one
    // by rebuilding the client stack on a closed port.
    let (live_url, _backend) = spawn_policy_server(MockBackendConfig::default()).await;
    let live_tpc = Arc::new(
        ToolProtocolClient::new(
            ToolServerConfig::from_urls(&[live_url]),
            Duration::from_secs(2),
        )
        .unwrap(),
    );
    let seed_registry = ToolRegistry::new(live_tpc, Duration::from_secs(300));
    seed_registry.refresh().await;

    let dead_tpc = Arc::new(
        ToolProtocolClient::new(
            ToolServerConfig::from_urls(&["http://127.0.0.1:1".to_string()]),
            Duration::from_secs(2),
        )
        .unwrap(),
    );
    // Give the agent the live catalog but the dead transport: the
    // executor resolves descriptors at execution time, the client fails
    // at connect time.
    let settings = dead_llm_settings();
    let llm = Arc::new(LlmClient::new(&settings).unwrap());
    let prompts = Arc::new(PromptStore::builtin());
    let live_registry = Arc::new(seed_registry);
    let agent = TechnicalAgent::new(live_registry, dead_tpc, llm, prompts, &settings);

    let task = A2aTask::new(
        "domain",
        "technical",
        embed_customer_marker("when is my premium due?", KNOWN_CUSTOMER),
    );
    let reply = agent.handle_task(task).await;

    assert_eq!(reply.status, TaskStatus::Completed);
    let bundle = bundle_of(&reply);
    assert_eq!(bundle.len(), 1);
    let result = bundle.results.values().next().unwrap();
    assert_eq!(result.status, ToolCallStatus::ServerUnreachable);
    assert_eq!(result.attempts, 3);
}

#[tokio::test]
async fn malformed_planner_json_degrades_to_rule_plan() {
    // S4: the model keeps emitting garbage; after the repair attempt the
    // planner must fall back to rules and the task still answers billing.
    let (url, _backend) = spawn_policy_server(MockBackendConfig::default()).await;
    let (llm_settings, llm_calls) = common::spawn_llm_returning("oops, no JSON here").await;

    let tpc = Arc::new(
        ToolProtocolClient::new(
            ToolServerConfig::from_urls(&[url]),
            Duration::from_secs(2),
        )
        .unwrap(),
    );
    let registry = Arc::new(ToolRegistry::new(tpc.clone(), Duration::from_secs(300)));
    registry.refresh().await;
    let llm = Arc::new(LlmClient::new(&llm_settings).unwrap());
    let prompts = Arc::new(PromptStore::builtin());
    let agent = TechnicalAgent::new(registry, tpc, llm, prompts, &llm_settings);

    let task = A2aTask::new(
        "domain",
        "technical",
        embed_customer_marker("billing?", KNOWN_CUSTOMER),
    );
    let reply = agent.handle_task(task).await;

    assert_eq!(reply.status, TaskStatus::Completed);
    let bundle = bundle_of(&reply);
    assert_eq!(bundle.len(), 1);
    let result = bundle.results.values().next().unwrap();
    assert_eq!(result.tool_name, "get_payment_information");
    assert_eq!(result.status, ToolCallStatus::Ok);
    // planner call plus its repair re-prompt
    assert_eq!(llm_calls.load(std::sync::atomic::Ordering::SeqCst), 2);
}

#[tokio::test]
async fn partial_failure_still_completes_with_full_bundle() {
    // one of the two rule-selected tools fails server-side; the bundle
    // carries both entries and the task completes
    let mut config = MockBackendConfig::default();
    config.failing_tools.insert("get_deductibles".to_string());
    let (url, _backend) = spawn_policy_server(config).await;
    let (agent, _registry) = agent_against(vec![url], true).await;

    let task = A2aTask::new(
        "domain",
        "technical",
        embed_customer_marker(
            "When is my premium due and what is my deductible?",
            KNOWN_CUSTOMER,
        ),
    );
    let reply = agent.handle_task(task).await;

    assert_eq!(reply.status, TaskStatus::Completed);
    let bundle = bundle_of(&reply);
    assert_eq!(bundle.len(), 2);
    assert_eq!(bundle.summary_counts.ok, 1);
    assert_eq!(bundle.summary_counts.error, 1);
    let failed = bundle
        .results
        .values()
        .find(|r| r.tool_name == "get_deductibles")
        .unwrap();
    assert_eq!(failed.status, ToolCallStatus::UpstreamError);
    assert_eq!(failed.attempts, 3);
    assert!(failed.data.is_none());
}
