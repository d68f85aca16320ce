//! HTTP client side of the A2A protocol.

use super::types::{A2aReply, A2aTask, TASKS_PATH};
use crate::retry::{RetryConfig, retry_transient};
use crate::{Error, Result};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Client for posting tasks to a peer agent.
pub struct A2aClient {
    http: reqwest::Client,
    base_url: String,
    /// Per-request deadline
    deadline: Duration,
    retry: RetryConfig,
}

impl A2aClient {
    /// Client with the default 20-second request deadline.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Self::with_deadline(base_url, Duration::from_secs(20))
    }

    pub fn with_deadline(base_url: impl Into<String>, deadline: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .pool_max_idle_per_host(20)
            .build()
            .map_err(Error::Http)?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            deadline,
            retry: RetryConfig::default(),
        })
    }

    /// Send a task and await its reply.
    ///
    /// Retries only transport failures and 5xx statuses; a well-formed
    /// `failed` reply is a protocol-level answer, not an error, and comes
    /// back as `Ok`. Idempotency is the caller's concern; the technical
    /// agent's task handling is a pure read over backend tools.
    pub async fn send(&self, task: &A2aTask) -> Result<A2aReply> {
        let url = format!("{}{}", self.base_url, TASKS_PATH);
        let started = Instant::now();

        let result = retry_transient(&self.retry, || self.send_once(&url, task)).await;

        match &result {
            Ok(reply) => debug!(
                component = "a2a_client",
                event = "task_sent",
                task_id = %task.task_id,
                to_agent = %task.to_agent,
                status = ?reply.status,
                latency_ms = started.elapsed().as_millis() as u64,
                "task round trip finished"
            ),
            Err(err) => warn!(
                component = "a2a_client",
                event = "task_failed",
                task_id = %task.task_id,
                to_agent = %task.to_agent,
                latency_ms = started.elapsed().as_millis() as u64,
                error_kind = err.kind().map(|k| k.as_str()).unwrap_or("internal"),
                "task round trip failed: {}", err
            ),
        }
        result
    }

    async fn send_once(&self, url: &str, task: &A2aTask) -> Result<A2aReply> {
        let response = self
            .http
            .post(url)
            .timeout(self.deadline)
            .json(task)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::Timeout
                } else {
                    Error::unreachable(format!("a2a peer: {}", e))
                }
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::upstream(status, body));
        }

        let reply: A2aReply = response
            .json()
            .await
            .map_err(|e| Error::protocol(format!("a2a reply: {}", e)))?;

        // Correlation invariant: a reply answers exactly the task we sent.
        if reply.task_id != task.task_id {
            return Err(Error::protocol(format!(
                "a2a reply correlates to task {} but {} was sent",
                reply.task_id, task.task_id
            )));
        }
        Ok(reply)
    }
}
