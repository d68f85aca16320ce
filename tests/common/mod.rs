//! Shared fixtures: an in-process policy server speaking the tool
//! protocol, plus LLM settings pointing at a dead endpoint so every test
//! exercises the deterministic fallback paths.

#![allow(dead_code)]

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use policy_agents::config::LlmSettings;
use serde_json::{Value, json};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// The customer the mock backend has records for.
pub const KNOWN_CUSTOMER: &str = "CUST-001";
/// A customer id with no backend records.
pub const UNKNOWN_CUSTOMER: &str = "INVALID-999";

/// Behavior knobs for the mock policy server.
#[derive(Default)]
pub struct MockBackendConfig {
    /// Tool names that answer every invoke with HTTP 500
    pub failing_tools: HashSet<String>,
    /// Tool names that sleep before answering
    pub slow_tools: HashSet<String>,
    /// How long slow tools sleep
    pub slow_delay: Duration,
    /// Advertise no tools at all
    pub empty_catalog: bool,
}

pub struct MockBackend {
    pub config: MockBackendConfig,
    pub invocations: AtomicUsize,
}

impl MockBackend {
    fn tool_specs(&self) -> Vec<Value> {
        if self.config.empty_catalog {
            return Vec::new();
        }
        policy_agents::types::tool_names::ALL
            .iter()
            .map(|name| {
                let mut properties = json!({
                    "customer_id": {"type": "string"}
                });
                let mut required = vec!["customer_id"];
                if *name == "get_policy_details" {
                    properties["policy_id"] = json!({"type": "string"});
                    required.push("policy_id");
                }
                json!({
                    "name": name,
                    "description": format!("Mock {}", name.replace('_', " ")),
                    "parameter_schema": {
                        "type": "object",
                        "properties": properties,
                        "required": required
                    }
                })
            })
            .collect()
    }

    fn invoke(&self, tool: &str, parameters: &Value) -> Result<Value, (StatusCode, Value)> {
        self.invocations.fetch_add(1, Ordering::SeqCst);

        if self.config.failing_tools.contains(tool) {
            return Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({"error_kind": "upstream_error", "message": "mock backend exploded"}),
            ));
        }

        let customer_id = parameters
            .get("customer_id")
            .and_then(Value::as_str)
            .unwrap_or_default();
        if customer_id != KNOWN_CUSTOMER {
            return Err((
                StatusCode::NOT_FOUND,
                json!({"error_kind": "not_found",
                       "message": format!("no records for {}", customer_id)}),
            ));
        }

        let data = match tool {
            "get_customer_policies" => json!({
                "policies": [
                    {"policy_id": "POL-AUTO-77", "type": "auto",
                     "vehicle": "2019 Honda Civic", "status": "active"},
                    {"policy_id": "POL-LIFE-12", "type": "term_life",
                     "status": "active"}
                ]
            }),
            "get_payment_information" => json!({
                "amount_due": "125.50",
                "due_date": "2026-09-01",
                "autopay": false
            }),
            "get_deductibles" => json!({
                "collision": "500",
                "comprehensive": "250"
            }),
            "get_coverage_information" => json!({
                "liability_limit": "100000",
                "collision": "covered"
            }),
            "get_agent" => json!({
                "name": "Dana Whitfield",
                "phone": "555-0142"
            }),
            other => json!({"tool": other, "note": "mock data"}),
        };
        Ok(data)
    }
}

async fn list_tools_handler(State(backend): State<Arc<MockBackend>>) -> Json<Vec<Value>> {
    Json(backend.tool_specs())
}

async fn invoke_handler(
    State(backend): State<Arc<MockBackend>>,
    Path(tool): Path<String>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    if backend.config.slow_tools.contains(&tool) {
        tokio::time::sleep(backend.config.slow_delay).await;
    }
    let parameters = body.get("parameters").cloned().unwrap_or(json!({}));
    match backend.invoke(&tool, &parameters) {
        Ok(data) => (StatusCode::OK, Json(json!({"data": data}))),
        Err((status, document)) => (status, Json(document)),
    }
}

/// Spawn the mock policy server on an ephemeral port; returns its base
/// URL and the shared backend handle for assertions.
pub async fn spawn_policy_server(config: MockBackendConfig) -> (String, Arc<MockBackend>) {
    let backend = Arc::new(MockBackend {
        config,
        invocations: AtomicUsize::new(0),
    });
    let router = Router::new()
        .route("/tools", get(list_tools_handler))
        .route("/tools/{tool}/invoke", post(invoke_handler))
        .with_state(backend.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    (format!("http://{}", addr), backend)
}

/// Serve an arbitrary router on an ephemeral port.
pub async fn spawn_router(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

/// LLM settings pointing at a port nothing listens on, so every model
/// call fails fast and the rule fallbacks engage.
pub fn dead_llm_settings() -> LlmSettings {
    LlmSettings {
        primary_model: "primary-test-model".to_string(),
        fallback_model: None,
        api_base: "http://127.0.0.1:1/v1".to_string(),
        api_key: "not-needed".to_string(),
    }
}

/// Spawn a chat-completion server that answers every request with the
/// same assistant content. Returns settings pointing at it plus the call
/// counter.
pub async fn spawn_llm_returning(content: &'static str) -> (LlmSettings, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let router = Router::new().route(
        "/v1/chat/completions",
        post(move |_body: Json<Value>| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Json(json!({
                    "choices": [{"message": {"role": "assistant", "content": content}}],
                    "usage": {"prompt_tokens": 12, "completion_tokens": 7, "total_tokens": 19},
                    "model": "mock-model"
                }))
            }
        }),
    );
    let base = spawn_router(router).await;
    (
        LlmSettings {
            primary_model: "mock-model".to_string(),
            fallback_model: None,
            api_base: format!("{}/v1", base),
            api_key: "not-needed".to_string(),
        },
        calls,
    )
}
