//! Whole-system tests: the domain agent's HTTP surface in front of a real
//! technical agent in front of the mock policy server, with the LLM
//! unavailable throughout so every reply comes from the deterministic
//! fallback chain.

mod common;

use common::{
    KNOWN_CUSTOMER, MockBackendConfig, UNKNOWN_CUSTOMER, dead_llm_settings, spawn_policy_server,
    spawn_router,
};
use policy_agents::a2a::{A2aClient, a2a_router};
use policy_agents::domain::{AUTH_REQUIRED_REPLY, DomainAgent, chat_router};
use policy_agents::llm::LlmClient;
use policy_agents::prompts::PromptStore;
use policy_agents::registry::ToolRegistry;
use policy_agents::session::SessionStore;
use policy_agents::technical::TechnicalAgent;
use policy_agents::tp::{ToolProtocolClient, ToolServerConfig};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;

struct Stack {
    chat_url: String,
    sessions: Arc<SessionStore>,
    http: reqwest::Client,
}

impl Stack {
    async fn spawn(backend_config: MockBackendConfig) -> Self {
        let (policy_url, _backend) = spawn_policy_server(backend_config).await;
        let settings = dead_llm_settings();
        let prompts = Arc::new(PromptStore::builtin());

        // technical tier
        let tpc = Arc::new(
            ToolProtocolClient::new(
                ToolServerConfig::from_urls(&[policy_url]),
                Duration::from_secs(2),
            )
            .unwrap(),
        );
        let registry = Arc::new(ToolRegistry::new(tpc.clone(), Duration::from_secs(300)));
        registry.refresh().await;
        let technical = Arc::new(TechnicalAgent::new(
            registry,
            tpc,
            Arc::new(LlmClient::new(&settings).unwrap()),
            prompts.clone(),
            &settings,
        ));
        let technical_url = spawn_router(a2a_router(technical, 64)).await;

        // domain tier
        let sessions = Arc::new(SessionStore::new(Duration::from_secs(60)));
        let domain = Arc::new(DomainAgent::new(
            sessions.clone(),
            Arc::new(LlmClient::new(&settings).unwrap()),
            prompts,
            A2aClient::new(technical_url).unwrap(),
            &settings,
        ));
        let chat_url = spawn_router(chat_router(domain, sessions.clone())).await;

        Self {
            chat_url,
            sessions,
            http: reqwest::Client::new(),
        }
    }

    async fn chat(&self, session_id: &str, message: &str) -> Value {
        self.http
            .post(format!("{}/chat", self.chat_url))
            .json(&json!({"session_id": session_id, "message": message}))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap()
    }
}

#[tokio::test]
async fn s1_policy_lookup_mentions_real_policies_only() {
    let stack = Stack::spawn(MockBackendConfig::default()).await;
    let session_id = stack.sessions.create(KNOWN_CUSTOMER);

    let response = stack.chat(&session_id, "What policies do I have?").await;
    let reply = response["reply"].as_str().unwrap();

    // backend-known values surface
    assert!(reply.contains("2019 Honda Civic"), "reply: {}", reply);
    assert!(reply.contains("POL-LIFE-12") || reply.to_lowercase().contains("term_life"));
    // nothing fabricated
    assert!(!reply.contains("Toyota"));
}

#[tokio::test]
async fn s2_unknown_customer_gets_polite_not_found() {
    let stack = Stack::spawn(MockBackendConfig::default()).await;
    let session_id = stack.sessions.create(UNKNOWN_CUSTOMER);

    let response = stack
        .chat(&session_id, "What does my auto policy cover?")
        .await;
    let reply = response["reply"].as_str().unwrap();
    assert!(reply.contains("could not find any records"), "reply: {}", reply);
    // no hallucinated coverage figures
    assert!(!reply.contains("100000"));
}

#[tokio::test]
async fn s3_multi_intent_answers_both_questions() {
    let stack = Stack::spawn(MockBackendConfig::default()).await;
    let session_id = stack.sessions.create(KNOWN_CUSTOMER);

    let response = stack
        .chat(&session_id, "When is my premium due and what is my deductible?")
        .await;
    let reply = response["reply"].as_str().unwrap();
    // payment fields
    assert!(reply.contains("125.50"), "reply: {}", reply);
    // deductible fields
    assert!(reply.contains("500"), "reply: {}", reply);
}

#[tokio::test]
async fn expired_session_requires_authentication() {
    let stack = Stack::spawn(MockBackendConfig::default()).await;

    let response = stack.chat("stale-session-id", "billing?").await;
    assert_eq!(response["reply"], AUTH_REQUIRED_REPLY);
}

#[tokio::test]
async fn session_endpoints_create_and_logout() {
    let stack = Stack::spawn(MockBackendConfig::default()).await;

    // login hook
    let created: Value = stack
        .http
        .post(format!("{}/session", stack.chat_url))
        .json(&json!({"customer_id": KNOWN_CUSTOMER}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let session_id = created["session_id"].as_str().unwrap().to_string();

    let response = stack.chat(&session_id, "when is my premium due?").await;
    assert!(response["reply"].as_str().unwrap().contains("125.50"));

    // logout destroys the session
    let status = stack
        .http
        .delete(format!("{}/session/{}", stack.chat_url, session_id))
        .send()
        .await
        .unwrap()
        .status();
    assert_eq!(status.as_u16(), 204);

    let response = stack.chat(&session_id, "when is my premium due?").await;
    assert_eq!(response["reply"], AUTH_REQUIRED_REPLY);
}

#[tokio::test]
async fn diagnostics_round_trip_over_http() {
    let stack = Stack::spawn(MockBackendConfig::default()).await;
    let session_id = stack.sessions.create(KNOWN_CUSTOMER);

    let response: Value = stack
        .http
        .post(format!("{}/chat", stack.chat_url))
        .json(&json!({
            "session_id": session_id,
            "message": "what's my deductible?",
            "diagnostics": true
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let diagnostics = &response["diagnostics"];
    assert_eq!(diagnostics["intent"]["confidence"], 0.5);
    assert_eq!(
        diagnostics["intent"]["primary_intents"][0],
        "deductible_inquiry"
    );
    assert_eq!(diagnostics["tool_calls"]["ok"], 1);
    assert!(diagnostics["a2a_task_id"].as_str().is_some());
}

#[tokio::test]
async fn backend_500_degrades_to_calm_failure_reply() {
    let mut config = MockBackendConfig::default();
    // every rule-selected tool for this message fails server-side
    config.failing_tools.insert("get_payment_information".to_string());
    let stack = Stack::spawn(config).await;
    let session_id = stack.sessions.create(KNOWN_CUSTOMER);

    let response = stack.chat(&session_id, "when is my premium due?").await;
    let reply = response["reply"].as_str().unwrap();
    // a calm reply, not an error dump and not invented data
    assert!(reply.contains("couldn't retrieve"), "reply: {}", reply);
    assert!(!reply.contains("125.50"));
    assert!(!reply.contains("error_kind"));
}
