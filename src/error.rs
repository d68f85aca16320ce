//! Error types for the policy-agents crate.
//!
//! Two layers live here:
//!
//! - [`Error`], the internal error type used with `?` throughout the crate.
//! - [`ErrorKind`], the closed set of kinds that may cross a process
//!   boundary (an A2A error document, a tool call result, chat
//!   diagnostics). Internal-only failures such as configuration mistakes
//!   have no kind and must never reach a wire format.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Closed set of error kinds visible on the wire.
///
/// Serialized snake_case, so `ErrorKind::MissingCustomerContext` appears
/// as `"missing_customer_context"` in A2A error documents and bundles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// No customer_id recoverable from an A2A task
    MissingCustomerContext,
    /// Registry empty at planning time
    NoToolsDiscovered,
    /// Both planning strategies failed
    PlanUnavailable,
    /// Local schema check rejected a tool call
    InvalidParameters,
    /// Non-2xx from a tool server, the LLM provider, or the A2A peer
    UpstreamError,
    /// A deadline elapsed
    Timeout,
    /// Transport-level failure reaching a server
    ServerUnreachable,
    /// Malformed reply from a server
    ProtocolMismatch,
    /// LLM JSON not parseable after the repair attempt
    LlmParseError,
    /// Backpressure threshold hit
    Overloaded,
    /// Missing prompt variable or unknown prompt key
    PromptError,
}

impl ErrorKind {
    /// Wire name of this kind (the snake_case serde form).
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::MissingCustomerContext => "missing_customer_context",
            ErrorKind::NoToolsDiscovered => "no_tools_discovered",
            ErrorKind::PlanUnavailable => "plan_unavailable",
            ErrorKind::InvalidParameters => "invalid_parameters",
            ErrorKind::UpstreamError => "upstream_error",
            ErrorKind::Timeout => "timeout",
            ErrorKind::ServerUnreachable => "server_unreachable",
            ErrorKind::ProtocolMismatch => "protocol_mismatch",
            ErrorKind::LlmParseError => "llm_parse_error",
            ErrorKind::Overloaded => "overloaded",
            ErrorKind::PromptError => "prompt_error",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ErrorKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "missing_customer_context" => Ok(ErrorKind::MissingCustomerContext),
            "no_tools_discovered" => Ok(ErrorKind::NoToolsDiscovered),
            "plan_unavailable" => Ok(ErrorKind::PlanUnavailable),
            "invalid_parameters" => Ok(ErrorKind::InvalidParameters),
            "upstream_error" => Ok(ErrorKind::UpstreamError),
            "timeout" => Ok(ErrorKind::Timeout),
            "server_unreachable" => Ok(ErrorKind::ServerUnreachable),
            "protocol_mismatch" => Ok(ErrorKind::ProtocolMismatch),
            "llm_parse_error" => Ok(ErrorKind::LlmParseError),
            "overloaded" => Ok(ErrorKind::Overloaded),
            "prompt_error" => Ok(ErrorKind::PromptError),
            other => Err(format!("unknown error kind: {}", other)),
        }
    }
}

/// Main error type for the crate
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP transport error
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// No customer_id recoverable from an A2A task
    #[error("missing customer context: {0}")]
    MissingCustomerContext(String),

    /// Registry empty at planning time
    #[error("no tools discovered")]
    NoToolsDiscovered,

    /// Both planning strategies failed
    #[error("plan unavailable: {0}")]
    PlanUnavailable(String),

    /// Local schema check rejected a tool call
    #[error("invalid parameters for '{tool}': {message}")]
    InvalidParameters { tool: String, message: String },

    /// Upstream server returned a non-2xx status
    #[error("upstream error (HTTP {status}): {message}")]
    UpstreamError { status: u16, message: String },

    /// The requested entity does not exist on the server
    #[error("not found: {0}")]
    NotFound(String),

    /// A deadline elapsed
    #[error("deadline elapsed")]
    Timeout,

    /// Transport-level failure reaching a server
    #[error("server unreachable: {0}")]
    ServerUnreachable(String),

    /// Malformed reply from a server
    #[error("protocol mismatch: {0}")]
    ProtocolMismatch(String),

    /// LLM output not parseable after the repair attempt
    #[error("LLM output not parseable: {0}")]
    LlmParse(String),

    /// Backpressure threshold hit
    #[error("overloaded: {0}")]
    Overloaded(String),

    /// Missing prompt variable or unknown prompt key
    #[error("prompt error: {0}")]
    Prompt(String),

    /// Invalid caller-supplied input (never crosses the wire)
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Invalid configuration (never crosses the wire)
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    /// Create a new upstream error from an HTTP status and body.
    pub fn upstream(status: u16, message: impl Into<String>) -> Self {
        Error::UpstreamError {
            status,
            message: message.into(),
        }
    }

    /// Create a new invalid-parameters error for a tool.
    pub fn invalid_parameters(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Error::InvalidParameters {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Create a new server-unreachable error.
    pub fn unreachable(msg: impl Into<String>) -> Self {
        Error::ServerUnreachable(msg.into())
    }

    /// Create a new protocol-mismatch error.
    pub fn protocol(msg: impl Into<String>) -> Self {
        Error::ProtocolMismatch(msg.into())
    }

    /// Create a new overloaded error.
    pub fn overloaded(msg: impl Into<String>) -> Self {
        Error::Overloaded(msg.into())
    }

    /// Create a new prompt error.
    pub fn prompt(msg: impl Into<String>) -> Self {
        Error::Prompt(msg.into())
    }

    /// Create a new invalid-input error.
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Error::InvalidInput(msg.into())
    }

    /// Create a new config error.
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// The wire-visible kind of this error, if it has one.
    ///
    /// `None` means the error is internal (configuration, invalid input,
    /// local JSON handling) and must be surfaced as a process-level defect
    /// rather than encoded into an A2A reply or tool result.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Error::Http(e) if e.is_timeout() => Some(ErrorKind::Timeout),
            Error::Http(_) => Some(ErrorKind::ServerUnreachable),
            Error::MissingCustomerContext(_) => Some(ErrorKind::MissingCustomerContext),
            Error::NoToolsDiscovered => Some(ErrorKind::NoToolsDiscovered),
            Error::PlanUnavailable(_) => Some(ErrorKind::PlanUnavailable),
            Error::InvalidParameters { .. } => Some(ErrorKind::InvalidParameters),
            Error::UpstreamError { .. } => Some(ErrorKind::UpstreamError),
            Error::Timeout => Some(ErrorKind::Timeout),
            Error::ServerUnreachable(_) => Some(ErrorKind::ServerUnreachable),
            Error::ProtocolMismatch(_) => Some(ErrorKind::ProtocolMismatch),
            Error::LlmParse(_) => Some(ErrorKind::LlmParseError),
            Error::Overloaded(_) => Some(ErrorKind::Overloaded),
            Error::Prompt(_) => Some(ErrorKind::PromptError),
            Error::NotFound(_) | Error::Json(_) | Error::InvalidInput(_) | Error::Config(_) => None,
        }
    }

    /// Whether a retry within the attempt budget may succeed.
    ///
    /// Transient transport failures, timeouts, and 5xx upstream statuses
    /// are retryable. Validation failures, protocol mismatches, not-found
    /// results, and backpressure rejections are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Http(_) => true,
            Error::Timeout => true,
            Error::ServerUnreachable(_) => true,
            Error::UpstreamError { status, .. } => *status >= 500,
            _ => false,
        }
    }
}
