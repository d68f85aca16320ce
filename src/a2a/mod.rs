//! Agent-to-Agent (A2A) task protocol.
//!
//! A task is an HTTP JSON envelope posted to `/a2a/tasks`; the reply
//! correlates by `task_id` and carries either a results payload or an
//! error document with a closed `error_kind`. The customer identity
//! travels inside the task text via the canonical
//! `(session_customer_id: <ID>)` marker; metadata carries it too, but
//! the marker in the primary payload is the source of truth because
//! metadata channels have been observed to drop in transit.

mod client;
mod server;
mod types;

pub use client::A2aClient;
pub use server::{A2aServerState, TaskHandler, a2a_router, serve};
pub use types::{A2aReply, A2aTask, ReplyPart, TASKS_PATH, TaskStatus, embed_customer_marker};
