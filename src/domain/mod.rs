//! Domain Agent: the session-aware front of the assistant.
//!
//! One chat turn flows `idle → intent → (a2a →)? synthesis → done`:
//! resolve the session, classify the message, delegate data retrieval to
//! the technical tier when the intent needs backend records, and
//! synthesize a natural-language reply from whatever came back. Every
//! failure mode degrades to a calm canned reply; the user never sees an
//! error kind, and the agent never invents policy data.

mod agent;
mod http;
mod intent;
mod synthesis;

pub use agent::{
    AUTH_REQUIRED_REPLY, ChatOutcome, Diagnostics, DomainAgent, IDENTITY_REPLY, TRANSIENT_REPLY,
};
pub use http::{ChatRequest, ChatResponse, chat_router};
pub use intent::IntentAnalyzer;
pub use synthesis::{ResponseSynthesizer, templated_reply};
