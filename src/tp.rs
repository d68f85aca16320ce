//! Tool-Protocol client.
//!
//! Speaks the request/response JSON protocol tool servers expose:
//!
//! - `GET /tools` → `[{name, description, parameter_schema}]`
//! - `POST /tools/<name>/invoke` with `{parameters}` → `{data}` on
//!   success, `{error_kind, message}` with a 4xx/5xx status on failure
//!
//! Parameters are validated against the tool's schema locally before any
//! request leaves the process; a mismatch fails fast with
//! `InvalidParameters` and consumes no attempt. Transient transport
//! failures retry with the crate backoff policy. Each server has a
//! bounded in-flight queue; when it is full the call is rejected
//! immediately with `Overloaded` rather than queued unboundedly.

use crate::retry::{RetryConfig, retry_transient};
use crate::types::ToolDescriptor;
use crate::{Error, Result};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{debug, warn};

/// In-flight calls admitted per server before rejecting with `Overloaded`.
pub const DEFAULT_QUEUE_BOUND: usize = 32;

/// One configured tool server.
#[derive(Debug, Clone)]
pub struct ToolServerConfig {
    /// Stable identifier used in descriptors and logs
    pub id: String,
    pub base_url: String,
}

impl ToolServerConfig {
    /// Derive server configs from base URLs, preserving order.
    /// Configuration order determines conflict precedence in the registry.
    pub fn from_urls(urls: &[String]) -> Vec<Self> {
        urls.iter()
            .enumerate()
            .map(|(index, url)| Self {
                id: format!("policy-server-{}", index + 1),
                base_url: url.trim_end_matches('/').to_string(),
            })
            .collect()
    }
}

/// A tool as advertised by a server on `GET /tools`.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub parameter_schema: Value,
    #[serde(default)]
    pub return_schema: Option<Value>,
}

#[derive(Deserialize)]
struct InvokeSuccess {
    data: Value,
}

#[derive(Deserialize)]
struct InvokeFailure {
    #[serde(default)]
    error_kind: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Outcome of one tool invocation, attempts and latency included.
///
/// Failures are carried in `outcome` rather than raised; the executor
/// encodes them into the results bundle.
#[derive(Debug)]
pub struct ToolInvocation {
    pub outcome: Result<Value>,
    pub attempts: u32,
    pub latency_ms: u64,
}

/// Client for one or more tool servers.
pub struct ToolProtocolClient {
    http: reqwest::Client,
    servers: Vec<ToolServerConfig>,
    call_timeout: Duration,
    retry: RetryConfig,
    queues: HashMap<String, Arc<Semaphore>>,
}

impl ToolProtocolClient {
    pub fn new(servers: Vec<ToolServerConfig>, call_timeout: Duration) -> Result<Self> {
        Self::with_queue_bound(servers, call_timeout, DEFAULT_QUEUE_BOUND)
    }

    pub fn with_queue_bound(
        servers: Vec<ToolServerConfig>,
        call_timeout: Duration,
        queue_bound: usize,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .pool_max_idle_per_host(20)
            .build()
            .map_err(Error::Http)?;
        let queues = servers
            .iter()
            .map(|s| (s.id.clone(), Arc::new(Semaphore::new(queue_bound))))
            .collect();
        Ok(Self {
            http,
            servers,
            call_timeout,
            retry: RetryConfig::default(),
            queues,
        })
    }

    /// Configured servers in precedence order.
    pub fn servers(&self) -> &[ToolServerConfig] {
        &self.servers
    }

    fn server(&self, server_id: &str) -> Result<&ToolServerConfig> {
        self.servers
            .iter()
            .find(|s| s.id == server_id)
            .ok_or_else(|| Error::config(format!("unknown tool server '{}'", server_id)))
    }

    /// List the tools a server advertises.
    ///
    /// # Errors
    ///
    /// [`Error::ServerUnreachable`] on transport failure,
    /// [`Error::ProtocolMismatch`] on a malformed reply,
    /// [`Error::UpstreamError`] on a non-2xx status.
    pub async fn list_tools(&self, server_id: &str) -> Result<Vec<ToolSpec>> {
        let server = self.server(server_id)?;
        let url = format!("{}/tools", server.base_url);
        let started = Instant::now();

        let response = self
            .http
            .get(&url)
            .timeout(self.call_timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::Timeout
                } else {
                    Error::unreachable(format!("{}: {}", server_id, e))
                }
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            return Err(Error::upstream(status, format!("{} GET /tools", server_id)));
        }

        let specs: Vec<ToolSpec> = response
            .json()
            .await
            .map_err(|e| Error::protocol(format!("{} tool listing: {}", server_id, e)))?;

        debug!(
            component = "tp",
            event = "list_tools",
            server_id = %server_id,
            tool_count = specs.len(),
            latency_ms = started.elapsed().as_millis() as u64,
            "tool listing fetched"
        );
        Ok(specs)
    }

    /// Invoke a tool, validating parameters locally first.
    ///
    /// Never returns `Err` at the function level: all failures are
    /// encoded in [`ToolInvocation::outcome`].
    pub async fn invoke(&self, tool: &ToolDescriptor, parameters: Value) -> ToolInvocation {
        let started = Instant::now();

        // Fail fast on a local schema mismatch: no attempt, no network.
        if let Err(message) = validate_parameters(&tool.parameter_schema, &parameters) {
            return ToolInvocation {
                outcome: Err(Error::invalid_parameters(&tool.tool_name, message)),
                attempts: 0,
                latency_ms: started.elapsed().as_millis() as u64,
            };
        }

        let server = match self.server(&tool.server_id) {
            Ok(server) => server,
            Err(err) => {
                return ToolInvocation {
                    outcome: Err(err),
                    attempts: 0,
                    latency_ms: started.elapsed().as_millis() as u64,
                };
            }
        };

        // Bounded queue: reject rather than wait when the server is busy.
        let queue = self.queues.get(&tool.server_id).cloned();
        let _permit = match queue.as_ref().map(|q| q.clone().try_acquire_owned()) {
            Some(Ok(permit)) => Some(permit),
            Some(Err(_)) => {
                warn!(
                    component = "tp",
                    event = "queue_full",
                    server_id = %tool.server_id,
                    tool_name = %tool.tool_name,
                    "per-server queue exhausted"
                );
                return ToolInvocation {
                    outcome: Err(Error::overloaded(format!(
                        "tool server '{}' queue full",
                        tool.server_id
                    ))),
                    attempts: 0,
                    latency_ms: started.elapsed().as_millis() as u64,
                };
            }
            None => None,
        };

        let url = format!("{}/tools/{}/invoke", server.base_url, tool.tool_name);
        let attempts = AtomicU32::new(0);
        let outcome = retry_transient(&self.retry, || {
            attempts.fetch_add(1, Ordering::SeqCst);
            self.invoke_once(&url, &tool.server_id, &tool.tool_name, &parameters)
        })
        .await;

        let latency_ms = started.elapsed().as_millis() as u64;
        match &outcome {
            Ok(_) => debug!(
                component = "tp",
                event = "call_tool",
                server_id = %tool.server_id,
                tool_name = %tool.tool_name,
                latency_ms,
                attempts = attempts.load(Ordering::SeqCst),
                "tool call ok"
            ),
            Err(err) => warn!(
                component = "tp",
                event = "call_tool",
                server_id = %tool.server_id,
                tool_name = %tool.tool_name,
                latency_ms,
                attempts = attempts.load(Ordering::SeqCst),
                error_kind = err.kind().map(|k| k.as_str()).unwrap_or("internal"),
                "tool call failed: {}", err
            ),
        }

        ToolInvocation {
            outcome,
            attempts: attempts.load(Ordering::SeqCst),
            latency_ms,
        }
    }

    async fn invoke_once(
        &self,
        url: &str,
        server_id: &str,
        tool_name: &str,
        parameters: &Value,
    ) -> Result<Value> {
        let response = self
            .http
            .post(url)
            .timeout(self.call_timeout)
            .json(&serde_json::json!({ "parameters": parameters }))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::Timeout
                } else {
                    Error::unreachable(format!("{}: {}", server_id, e))
                }
            })?;

        let status = response.status();
        if status.is_success() {
            let body: InvokeSuccess = response.json().await.map_err(|e| {
                Error::protocol(format!("{}/{} invoke reply: {}", server_id, tool_name, e))
            })?;
            return Ok(body.data);
        }

        // Failure replies carry {error_kind, message}; fall back to the
        // HTTP status when the body is not in that shape.
        let code = status.as_u16();
        let failure: Option<InvokeFailure> = response.json().await.ok();
        let message = failure
            .as_ref()
            .and_then(|f| f.message.clone())
            .unwrap_or_else(|| format!("{}/{} invoke", server_id, tool_name));
        let declared_not_found = failure
            .as_ref()
            .and_then(|f| f.error_kind.as_deref())
            .is_some_and(|k| k == "not_found");

        if code == 404 || declared_not_found {
            return Err(Error::NotFound(message));
        }
        Err(Error::upstream(code, message))
    }
}

/// Validate parameters against a tool's JSON parameter schema.
///
/// Checks the subset of JSON Schema the tool protocol actually uses:
/// top-level `type: object`, `required` keys, and per-property `type`.
/// A missing or non-object schema accepts anything.
pub fn validate_parameters(schema: &Value, parameters: &Value) -> std::result::Result<(), String> {
    let Some(schema_obj) = schema.as_object() else {
        return Ok(());
    };
    if schema_obj.is_empty() {
        return Ok(());
    }

    let properties = schema_obj.get("properties").and_then(Value::as_object);
    let expects_object =
        schema_obj.get("type").and_then(Value::as_str) == Some("object") || properties.is_some();

    if expects_object && !parameters.is_object() {
        return Err(format!(
            "expected an object of parameters, got {}",
            json_type_name(parameters)
        ));
    }

    if let Some(required) = schema_obj.get("required").and_then(Value::as_array) {
        for key in required.iter().filter_map(Value::as_str) {
            if parameters.get(key).map_or(true, Value::is_null) {
                return Err(format!("missing required parameter '{}'", key));
            }
        }
    }

    if let (Some(properties), Some(params)) = (properties, parameters.as_object()) {
        for (key, value) in params {
            let Some(expected) = properties
                .get(key)
                .and_then(|p| p.get("type"))
                .and_then(Value::as_str)
            else {
                continue;
            };
            if !value_matches_type(value, expected) {
                return Err(format!(
                    "parameter '{}' should be {}, got {}",
                    key,
                    expected,
                    json_type_name(value)
                ));
            }
        }
    }

    Ok(())
}

fn value_matches_type(value: &Value, expected: &str) -> bool {
    match expected {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        "boolean" => value.is_boolean(),
        "array" => value.is_array(),
        "object" => value.is_object(),
        "null" => value.is_null(),
        // Unknown type keyword in the schema: be permissive
        _ => true,
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
