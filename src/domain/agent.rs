//! The Domain Agent's chat pipeline.

use super::intent::IntentAnalyzer;
use super::synthesis::ResponseSynthesizer;
use crate::a2a::{A2aClient, A2aReply, A2aTask, TaskStatus, embed_customer_marker};
use crate::config::LlmSettings;
use crate::llm::{CompletionOptions, LlmClient};
use crate::prompts::PromptStore;
use crate::session::SessionStore;
use crate::types::{ConversationTurn, Intent, SummaryCounts, ToolResultsBundle};
use crate::ErrorKind;
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Shown when the session is missing or expired. No model or backend
/// call happens on this path.
pub const AUTH_REQUIRED_REPLY: &str =
    "Please sign in to your account so I can look into that for you.";

/// Shown when the technical tier cannot verify the customer even after
/// the corrective retry.
pub const IDENTITY_REPLY: &str =
    "We are unable to verify your identity right now. Please sign out and sign in again.";

/// Shown for transient backend conditions (no tools, no plan, overload,
/// transport failure, deadline).
pub const TRANSIENT_REPLY: &str =
    "I'm having trouble reaching our policy systems at the moment. Please try again in a few minutes.";

/// Turns kept in the in-process diagnostics ring.
const TURN_RING_CAPACITY: usize = 512;

/// Optional per-turn diagnostics, attached only when the caller asks.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostics {
    pub intent: Intent,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub a2a_task_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<SummaryCounts>,
}

/// Result of one chat turn.
#[derive(Debug, Clone)]
pub struct ChatOutcome {
    pub reply_text: String,
    pub diagnostics: Option<Diagnostics>,
}

/// What delegation to the technical tier produced.
enum DelegationOutcome {
    /// Parsed bundle payload plus the task id that fetched it
    Data(Box<Value>, Uuid, Option<SummaryCounts>),
    /// Not needed for this intent
    Skipped,
    /// Failed in a way that maps to a canned reply; the kind, when one
    /// was identifiable, lands in the turn record
    Canned(&'static str, Option<ErrorKind>),
}

/// Front-end agent translating `(session_id, user_text)` into a reply.
pub struct DomainAgent {
    sessions: Arc<SessionStore>,
    analyzer: IntentAnalyzer,
    synthesizer: ResponseSynthesizer,
    a2a: A2aClient,
    turns: Mutex<VecDeque<ConversationTurn>>,
    /// Overall deadline for one chat turn
    chat_deadline: Duration,
}

impl DomainAgent {
    pub fn new(
        sessions: Arc<SessionStore>,
        llm: Arc<LlmClient>,
        prompts: Arc<PromptStore>,
        a2a: A2aClient,
        llm_settings: &LlmSettings,
    ) -> Self {
        let options = CompletionOptions::from_settings(llm_settings);
        Self {
            sessions,
            analyzer: IntentAnalyzer::new(llm.clone(), prompts.clone(), options.clone()),
            synthesizer: ResponseSynthesizer::new(llm, prompts, options),
            a2a,
            turns: Mutex::new(VecDeque::with_capacity(TURN_RING_CAPACITY)),
            chat_deadline: Duration::from_secs(30),
        }
    }

    pub fn with_chat_deadline(mut self, deadline: Duration) -> Self {
        self.chat_deadline = deadline;
        self
    }

    /// Handle one chat turn under the overall deadline. Never fails: all
    /// failure modes collapse into calm canned replies.
    pub async fn chat(
        &self,
        session_id: &str,
        user_text: &str,
        want_diagnostics: bool,
    ) -> ChatOutcome {
        match tokio::time::timeout(
            self.chat_deadline,
            self.chat_inner(session_id, user_text, want_diagnostics),
        )
        .await
        {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!(
                    component = "domain",
                    event = "chat_deadline",
                    session_id = %session_id,
                    "chat turn exceeded its overall deadline"
                );
                ChatOutcome {
                    reply_text: TRANSIENT_REPLY.to_string(),
                    diagnostics: None,
                }
            }
        }
    }

    async fn chat_inner(
        &self,
        session_id: &str,
        user_text: &str,
        want_diagnostics: bool,
    ) -> ChatOutcome {
        let started_at = Utc::now();

        // Session gate: unauthenticated turns never consult the model or
        // the technical tier.
        let Some(customer_id) = self.sessions.resolve(session_id) else {
            info!(
                component = "domain",
                event = "session_missing",
                session_id = %session_id,
                "no live session, refusing"
            );
            return ChatOutcome {
                reply_text: AUTH_REQUIRED_REPLY.to_string(),
                diagnostics: None,
            };
        };

        let intent = self.analyzer.analyze(user_text).await;

        let delegation = if intent.needs_delegation() {
            self.delegate(session_id, &customer_id, user_text, &intent)
                .await
        } else {
            DelegationOutcome::Skipped
        };

        let (technical_data, task_id, tool_calls, turn_error) = match delegation {
            DelegationOutcome::Data(value, task_id, counts) => {
                (Some(*value), Some(task_id), counts, None)
            }
            DelegationOutcome::Skipped => (None, None, None, None),
            DelegationOutcome::Canned(reply, kind) => {
                let outcome = ChatOutcome {
                    reply_text: reply.to_string(),
                    diagnostics: want_diagnostics.then(|| Diagnostics {
                        intent: intent.clone(),
                        a2a_task_id: None,
                        tool_calls: None,
                    }),
                };
                self.record_turn(ConversationTurn {
                    turn_id: Uuid::new_v4(),
                    session_id: session_id.to_string(),
                    user_text: user_text.to_string(),
                    intent: Some(intent),
                    ta_reply: None,
                    synthesized_reply: outcome.reply_text.clone(),
                    started_at,
                    finished_at: Utc::now(),
                    error: kind,
                });
                return outcome;
            }
        };

        let reply_text = self
            .synthesizer
            .synthesize(
                user_text,
                &customer_id,
                &intent.primary_intents,
                technical_data.as_ref(),
            )
            .await;

        self.record_turn(ConversationTurn {
            turn_id: Uuid::new_v4(),
            session_id: session_id.to_string(),
            user_text: user_text.to_string(),
            intent: Some(intent.clone()),
            ta_reply: technical_data.clone(),
            synthesized_reply: reply_text.clone(),
            started_at,
            finished_at: Utc::now(),
            error: turn_error,
        });

        ChatOutcome {
            reply_text,
            diagnostics: want_diagnostics.then_some(Diagnostics {
                intent,
                a2a_task_id: task_id,
                tool_calls,
            }),
        }
    }

    /// Build and send the A2A task, retrying once on the technical tier's
    /// missing-context defect signal.
    async fn delegate(
        &self,
        session_id: &str,
        customer_id: &str,
        user_text: &str,
        intent: &Intent,
    ) -> DelegationOutcome {
        let task = A2aTask::new(
            "domain",
            "technical",
            embed_customer_marker(user_text, customer_id),
        )
        .with_metadata("customer_id", Value::String(customer_id.to_string()))
        .with_metadata("session_id", Value::String(session_id.to_string()))
        .with_metadata(
            "primary_intents",
            serde_json::to_value(&intent.primary_intents).unwrap_or(Value::Null),
        );

        let reply = match self.a2a.send(&task).await {
            Ok(reply) => reply,
            Err(err) => {
                warn!(
                    component = "domain",
                    event = "delegation_failed",
                    task_id = %task.task_id,
                    error_kind = err.kind().map(|k| k.as_str()).unwrap_or("internal"),
                    "a2a transport failed: {}", err
                );
                return DelegationOutcome::Canned(TRANSIENT_REPLY, err.kind());
            }
        };

        let reply = match reply.status {
            TaskStatus::Completed => reply,
            TaskStatus::Failed => match reply.error_document() {
                Some((ErrorKind::MissingCustomerContext, message)) => {
                    // The marker is always embedded, so this is a defect
                    // on our side of the contract. Retry once verbatim.
                    error!(
                        component = "domain",
                        event = "missing_context_defect",
                        task_id = %task.task_id,
                        customer_id = %customer_id,
                        "technical tier reports missing customer context: {}", message
                    );
                    match self.a2a.send(&task).await {
                        Ok(retry_reply) if retry_reply.status == TaskStatus::Completed => {
                            retry_reply
                        }
                        _ => {
                            return DelegationOutcome::Canned(
                                IDENTITY_REPLY,
                                Some(ErrorKind::MissingCustomerContext),
                            );
                        }
                    }
                }
                Some((kind, message)) => {
                    warn!(
                        component = "domain",
                        event = "delegation_failed",
                        task_id = %task.task_id,
                        error_kind = kind.as_str(),
                        "technical tier failed: {}", message
                    );
                    return DelegationOutcome::Canned(TRANSIENT_REPLY, Some(kind));
                }
                None => {
                    warn!(
                        component = "domain",
                        event = "delegation_failed",
                        task_id = %task.task_id,
                        "technical tier failed without an error document"
                    );
                    return DelegationOutcome::Canned(TRANSIENT_REPLY, None);
                }
            },
        };

        parse_bundle_reply(&reply, task.task_id)
    }

    fn record_turn(&self, turn: ConversationTurn) {
        let mut turns = self.turns.lock().expect("turn ring poisoned");
        if turns.len() == TURN_RING_CAPACITY {
            turns.pop_front();
        }
        turns.push_back(turn);
    }

    /// Number of turns currently retained in the diagnostics ring.
    pub fn turn_count(&self) -> usize {
        self.turns.lock().expect("turn ring poisoned").len()
    }

    /// Most recent turns, newest last.
    pub fn recent_turns(&self, n: usize) -> Vec<ConversationTurn> {
        let turns = self.turns.lock().expect("turn ring poisoned");
        turns.iter().rev().take(n).rev().cloned().collect()
    }
}

/// Extract the bundle payload from a completed reply.
fn parse_bundle_reply(reply: &A2aReply, task_id: Uuid) -> DelegationOutcome {
    let Some(text) = reply.first_text() else {
        warn!(
            component = "domain",
            event = "empty_reply",
            task_id = %task_id,
            "completed reply carried no parts"
        );
        return DelegationOutcome::Canned(TRANSIENT_REPLY, Some(ErrorKind::ProtocolMismatch));
    };
    match serde_json::from_str::<Value>(text) {
        Ok(value) => {
            let counts = serde_json::from_value::<ToolResultsBundle>(value.clone())
                .ok()
                .map(|bundle| bundle.summary_counts);
            DelegationOutcome::Data(Box::new(value), task_id, counts)
        }
        Err(err) => {
            warn!(
                component = "domain",
                event = "unparseable_reply",
                task_id = %task_id,
                "completed reply payload is not JSON: {}", err
            );
            DelegationOutcome::Canned(TRANSIENT_REPLY, Some(ErrorKind::ProtocolMismatch))
        }
    }
}
