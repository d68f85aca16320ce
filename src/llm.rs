//! Chat-completion client for OpenAI-compatible providers.
//!
//! Request/response only; streaming is deliberately not supported
//! anywhere in this system. The client adds two behaviors on top of the
//! raw wire exchange:
//!
//! - **Model fallback.** When the primary model times out or fails
//!   upstream, the call is retried once with the configured fallback
//!   model. There is no further fallback.
//! - **JSON mode.** With [`ResponseFormat::Json`] the reply body is parsed
//!   as JSON. A reply that does not parse triggers exactly one repair
//!   re-prompt ("return only valid JSON"); a second failure surfaces as
//!   [`Error::LlmParse`] and callers degrade to their rule fallbacks.
//!
//! Token usage is recorded and logged per call but never affects control
//! flow.

use crate::config::LlmSettings;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Message role on the chat-completion wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One chat message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Expected shape of the completion body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseFormat {
    Text,
    Json,
}

/// Per-call completion options.
#[derive(Debug, Clone)]
pub struct CompletionOptions {
    pub model: String,
    /// Tried once when the primary model times out or errors upstream
    pub fallback_model: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: f32,
    pub response_format: ResponseFormat,
    /// Per-call deadline, enforced on the HTTP request
    pub deadline: Duration,
}

impl CompletionOptions {
    /// Options derived from process settings, with the crate defaults of
    /// temperature 0.1 (classification work wants determinism) and a
    /// 10-second deadline.
    pub fn from_settings(settings: &LlmSettings) -> Self {
        Self {
            model: settings.primary_model.clone(),
            fallback_model: settings.fallback_model.clone(),
            max_tokens: None,
            temperature: 0.1,
            response_format: ResponseFormat::Text,
            deadline: Duration::from_secs(10),
        }
    }

    pub fn with_json(mut self) -> Self {
        self.response_format = ResponseFormat::Json;
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// Token accounting for one completed call.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct TokenUsage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
    #[serde(default)]
    pub total_tokens: u32,
}

/// A completed (non-streaming) chat call.
#[derive(Debug, Clone)]
pub struct Completion {
    /// Raw text body of the assistant message
    pub content: String,
    /// Parsed body when JSON mode was requested
    pub json: Option<Value>,
    /// Model that actually answered (primary or fallback)
    pub model: String,
    pub usage: Option<TokenUsage>,
}

// ---- wire types ------------------------------------------------------------

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<Value>,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<TokenUsage>,
    #[serde(default)]
    model: Option<String>,
}

#[derive(Deserialize)]
struct Choice {
    message: AssistantMessage,
}

#[derive(Deserialize)]
struct AssistantMessage {
    #[serde(default)]
    content: Option<String>,
}

// ---- client ----------------------------------------------------------------

/// Chat-completion client.
pub struct LlmClient {
    http: reqwest::Client,
    api_base: String,
    api_key: String,
}

impl LlmClient {
    pub fn new(settings: &LlmSettings) -> Result<Self> {
        let http = reqwest::Client::builder()
            .pool_max_idle_per_host(20)
            .build()
            .map_err(Error::Http)?;
        Ok(Self {
            http,
            api_base: settings.api_base.trim_end_matches('/').to_string(),
            api_key: settings.api_key.clone(),
        })
    }

    /// Run one chat completion with fallback and JSON handling per the
    /// module contract.
    pub async fn complete(
        &self,
        messages: &[ChatMessage],
        options: &CompletionOptions,
    ) -> Result<Completion> {
        let started = Instant::now();
        let mut completion = match self.complete_model(&options.model, messages, options).await {
            Ok(completion) => completion,
            Err(err) => match &options.fallback_model {
                Some(fallback) if fallback_applies(&err) => {
                    warn!(
                        component = "llm",
                        event = "fallback_model",
                        primary = %options.model,
                        fallback = %fallback,
                        error = %err,
                        "primary model failed, trying fallback"
                    );
                    self.complete_model(fallback, messages, options).await?
                }
                _ => return Err(err),
            },
        };

        if options.response_format == ResponseFormat::Json {
            completion = self.ensure_json(completion, messages, options).await?;
        }

        if let Some(usage) = completion.usage {
            debug!(
                component = "llm",
                event = "completion",
                model = %completion.model,
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                total_tokens = usage.total_tokens,
                latency_ms = started.elapsed().as_millis() as u64,
                "chat completion finished"
            );
        }
        Ok(completion)
    }

    /// One raw request against one model.
    async fn complete_model(
        &self,
        model: &str,
        messages: &[ChatMessage],
        options: &CompletionOptions,
    ) -> Result<Completion> {
        let response_format = match options.response_format {
            ResponseFormat::Json => Some(serde_json::json!({"type": "json_object"})),
            ResponseFormat::Text => None,
        };
        let request = CompletionRequest {
            model,
            messages,
            stream: false,
            max_tokens: options.max_tokens,
            temperature: options.temperature,
            response_format,
        };

        let url = format!("{}/chat/completions", self.api_base);
        let response = self
            .http
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .timeout(options.deadline)
            .json(&request)
            .send()
            .await
            .map_err(Error::Http)?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unreadable body".to_string());
            return Err(Error::upstream(status, body));
        }

        let body: CompletionResponse = response.json().await.map_err(Error::Http)?;
        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| Error::protocol("completion reply has no choices"))?;

        Ok(Completion {
            content,
            json: None,
            model: body.model.unwrap_or_else(|| model.to_string()),
            usage: body.usage,
        })
    }

    /// Parse JSON-mode output, making one repair attempt on failure.
    async fn ensure_json(
        &self,
        completion: Completion,
        messages: &[ChatMessage],
        options: &CompletionOptions,
    ) -> Result<Completion> {
        if let Some(value) = parse_json_content(&completion.content) {
            return Ok(Completion {
                json: Some(value),
                ..completion
            });
        }

        warn!(
            component = "llm",
            event = "json_repair",
            model = %completion.model,
            "completion was not valid JSON, re-prompting once"
        );

        let mut repair_messages = messages.to_vec();
        repair_messages.push(ChatMessage::assistant(completion.content.clone()));
        repair_messages.push(ChatMessage::user(
            "Your previous reply was not valid JSON. Return only valid JSON, \
             with no prose and no code fences.",
        ));

        let repaired = self
            .complete_model(&completion.model, &repair_messages, options)
            .await?;
        match parse_json_content(&repaired.content) {
            Some(value) => Ok(Completion {
                json: Some(value),
                ..repaired
            }),
            None => Err(Error::LlmParse(format!(
                "output still not valid JSON after repair: {}",
                truncate_for_log(&repaired.content)
            ))),
        }
    }
}

/// Whether a primary-model failure warrants trying the fallback model.
fn fallback_applies(err: &Error) -> bool {
    matches!(
        err,
        Error::Timeout | Error::UpstreamError { .. } | Error::ServerUnreachable(_)
    ) || matches!(err, Error::Http(_))
}

/// Parse a model reply as JSON, tolerating surrounding prose or markdown
/// code fences (models wrap JSON in ```json blocks often enough that
/// rejecting them outright would waste the repair attempt).
fn parse_json_content(content: &str) -> Option<Value> {
    let trimmed = content.trim();
    if let Ok(value) = serde_json::from_str(trimmed) {
        return Some(value);
    }

    // fenced block
    if let Some(start) = trimmed.find("```") {
        let after = &trimmed[start + 3..];
        let after = after.strip_prefix("json").unwrap_or(after);
        if let Some(end) = after.find("```") {
            if let Ok(value) = serde_json::from_str(after[..end].trim()) {
                return Some(value);
            }
        }
    }

    // first balanced object in the text
    let open = trimmed.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, c) in trimmed[open..].char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    let candidate = &trimmed[open..=open + offset];
                    return serde_json::from_str(candidate).ok();
                }
            }
            _ => {}
        }
    }
    None
}

fn truncate_for_log(content: &str) -> String {
    const LIMIT: usize = 200;
    if content.len() <= LIMIT {
        content.to_string()
    } else {
        let mut end = LIMIT;
        while !content.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}…", &content[..end])
    }
}
