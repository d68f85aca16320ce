//! HTTP server side of the A2A protocol.
//!
//! Each incoming task runs on its own tokio task via axum; server-wide
//! concurrency is bounded by a semaphore. When the bound is hit the task
//! is rejected immediately with a `failed`/`overloaded` reply: refusal
//! over unbounded queueing.

use super::types::{A2aReply, A2aTask, TASKS_PATH};
use crate::ErrorKind;
use async_trait::async_trait;
use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{info, warn};

/// The seam an agent implements to receive tasks.
///
/// Handlers never return transport errors; every failure mode is encoded
/// as a `failed` reply with an `error_kind` document.
#[async_trait]
pub trait TaskHandler: Send + Sync + 'static {
    async fn handle_task(&self, task: A2aTask) -> A2aReply;
}

/// Shared state for the A2A router.
#[derive(Clone)]
pub struct A2aServerState {
    handler: Arc<dyn TaskHandler>,
    limiter: Arc<Semaphore>,
}

/// Build the A2A router with a concurrency bound.
pub fn a2a_router(handler: Arc<dyn TaskHandler>, concurrency: usize) -> Router {
    let state = A2aServerState {
        handler,
        limiter: Arc::new(Semaphore::new(concurrency)),
    };
    Router::new()
        .route(TASKS_PATH, post(post_task))
        .with_state(state)
}

async fn post_task(
    State(state): State<A2aServerState>,
    Json(task): Json<A2aTask>,
) -> Json<A2aReply> {
    let permit = match state.limiter.clone().try_acquire_owned() {
        Ok(permit) => permit,
        Err(_) => {
            warn!(
                component = "a2a_server",
                event = "overloaded",
                task_id = %task.task_id,
                from_agent = %task.from_agent,
                "concurrency bound hit, rejecting task"
            );
            return Json(A2aReply::failed(
                task.task_id,
                ErrorKind::Overloaded,
                "agent is at its concurrency limit, retry later",
            ));
        }
    };

    let task_id = task.task_id;
    let from_agent = task.from_agent.clone();
    let started = Instant::now();
    info!(
        component = "a2a_server",
        event = "task_received",
        task_id = %task_id,
        from_agent = %from_agent,
        "task accepted"
    );

    let reply = state.handler.handle_task(task).await;
    drop(permit);

    info!(
        component = "a2a_server",
        event = "task_replied",
        task_id = %task_id,
        from_agent = %from_agent,
        status = ?reply.status,
        latency_ms = started.elapsed().as_millis() as u64,
        "task finished"
    );
    Json(reply)
}

/// Bind and serve a router until the process exits.
pub async fn serve(router: Router, port: u16) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    info!(
        component = "a2a_server",
        event = "listening",
        port,
        "server bound"
    );
    axum::serve(listener, router).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    struct EchoHandler;

    #[async_trait]
    impl TaskHandler for EchoHandler {
        async fn handle_task(&self, task: A2aTask) -> A2aReply {
            A2aReply::completed(task.task_id, task.text, None)
        }
    }

    async fn post_json(router: Router, task: &A2aTask) -> A2aReply {
        let request = axum::http::Request::builder()
            .method("POST")
            .uri(TASKS_PATH)
            .header("content-type", "application/json")
            .body(axum::body::Body::from(serde_json::to_vec(task).unwrap()))
            .unwrap();
        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), axum::http::StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_router_dispatches_to_handler() {
        let router = a2a_router(Arc::new(EchoHandler), 4);
        let task = A2aTask::new("domain", "technical", "ping");
        let reply = post_json(router, &task).await;
        assert_eq!(reply.task_id, task.task_id);
        assert_eq!(reply.first_text(), Some("ping"));
    }

    #[tokio::test]
    async fn test_zero_concurrency_rejects_with_overloaded() {
        let router = a2a_router(Arc::new(EchoHandler), 0);
        let task = A2aTask::new("domain", "technical", "ping");
        let reply = post_json(router, &task).await;
        let (kind, _) = reply.error_document().unwrap();
        assert_eq!(kind, ErrorKind::Overloaded);
    }
}
