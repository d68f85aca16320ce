//! Wire-level tests for the A2A client against scripted peers.

mod common;

use common::spawn_router;
use axum::routing::post;
use axum::{Json, Router};
use policy_agents::Error;
use policy_agents::a2a::{A2aClient, A2aReply, A2aTask};
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use uuid::Uuid;

#[tokio::test]
async fn reply_correlation_mismatch_is_a_protocol_error() {
    // peer echoes a reply correlated to a different task id
    let router = Router::new().route(
        "/a2a/tasks",
        post(|Json(_task): Json<Value>| async move {
            Json(json!({
                "task_id": Uuid::new_v4(),
                "status": "completed",
                "parts": [{"text": "{}", "metadata": {}}]
            }))
        }),
    );
    let url = spawn_router(router).await;

    let client = A2aClient::new(url).unwrap();
    let task = A2aTask::new("domain", "technical", "ping");
    let err = client.send(&task).await.unwrap_err();
    assert!(matches!(err, Error::ProtocolMismatch(_)), "{:?}", err);
}

#[tokio::test]
async fn transient_5xx_is_retried_then_succeeds() {
    // first two attempts get a 503, the third a well-formed reply
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    let router = Router::new().route(
        "/a2a/tasks",
        post(move |Json(task): Json<A2aTask>| {
            let counter = counter.clone();
            async move {
                let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 3 {
                    Err(axum::http::StatusCode::SERVICE_UNAVAILABLE)
                } else {
                    Ok(Json(A2aReply::completed(task.task_id, "{}".to_string(), None)))
                }
            }
        }),
    );
    let url = spawn_router(router).await;

    let client = A2aClient::new(url).unwrap();
    let task = A2aTask::new("domain", "technical", "ping");
    let reply = client.send(&task).await.unwrap();
    assert_eq!(reply.task_id, task.task_id);
    assert_eq!(hits.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn client_4xx_is_not_retried() {
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    let router = Router::new().route(
        "/a2a/tasks",
        post(move |Json(_task): Json<Value>| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                axum::http::StatusCode::UNPROCESSABLE_ENTITY
            }
        }),
    );
    let url = spawn_router(router).await;

    let client = A2aClient::new(url).unwrap();
    let task = A2aTask::new("domain", "technical", "ping");
    let err = client.send(&task).await.unwrap_err();
    assert!(matches!(err, Error::UpstreamError { status: 422, .. }), "{:?}", err);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn failed_replies_are_answers_not_errors() {
    let router = Router::new().route(
        "/a2a/tasks",
        post(|Json(task): Json<A2aTask>| async move {
            Json(A2aReply::failed(
                task.task_id,
                policy_agents::ErrorKind::PlanUnavailable,
                "no strategy produced a plan",
            ))
        }),
    );
    let url = spawn_router(router).await;

    let client = A2aClient::new(url).unwrap();
    let task = A2aTask::new("domain", "technical", "ping");
    let reply = client.send(&task).await.unwrap();
    let (kind, message) = reply.error_document().unwrap();
    assert_eq!(kind, policy_agents::ErrorKind::PlanUnavailable);
    assert_eq!(message, "no strategy produced a plan");
}
