//! Process configuration resolved from environment variables.
//!
//! Configuration is read once at startup and passed down by value; there
//! is no hot reload. Every knob has a default suitable for local
//! development, so a bare `Settings::from_env()` always succeeds except
//! for unparseable values.
//!
//! ## Environment Variables
//!
//! | Variable | Default | Meaning |
//! |----------|---------|---------|
//! | `DOMAIN_AGENT_PORT` | 8001 | Port for the domain agent's `/chat` surface |
//! | `TECHNICAL_AGENT_PORT` | 8002 | Port for the technical agent's A2A surface |
//! | `POLICY_SERVER_URL` | http://localhost:8003 | Tool server base URL(s), comma-separated |
//! | `TECHNICAL_AGENT_URL` | http://localhost:8002 | Where the domain agent sends A2A tasks |
//! | `LLM_PRIMARY_MODEL` | gpt-4o-mini | Primary chat-completion model |
//! | `LLM_FALLBACK_MODEL` | (unset) | Model tried once after primary timeout/upstream failure |
//! | `LLM_API_BASE` | http://localhost:11434/v1 | OpenAI-compatible endpoint |
//! | `LLM_API_KEY` | not-needed | Bearer token (local servers usually ignore it) |
//! | `SESSION_TTL_SECONDS` | 1800 | Sliding session lifetime |
//! | `REGISTRY_REFRESH_SECONDS` | 300 | Tool catalog refresh cadence |
//! | `HTTP_TIMEOUT_SECONDS` | 5 | Per tool-protocol call deadline |
//! | `A2A_CONCURRENCY` | 64 | Concurrent tasks admitted by the A2A server |
//! | `LOG_LEVEL` | info | tracing filter directive |

use crate::{Error, Result};
use std::env;
use std::time::Duration;

/// LLM provider settings.
#[derive(Debug, Clone)]
pub struct LlmSettings {
    /// Primary chat-completion model
    pub primary_model: String,
    /// Fallback model, tried once when the primary times out or errors upstream
    pub fallback_model: Option<String>,
    /// OpenAI-compatible API base URL (must include the version path, e.g. `/v1`)
    pub api_base: String,
    /// Bearer token for the provider
    pub api_key: String,
}

/// Complete process configuration.
#[derive(Debug, Clone)]
pub struct Settings {
    pub domain_agent_port: u16,
    pub technical_agent_port: u16,
    /// Tool servers in configuration order. Order is significant: on
    /// duplicate tool names, the first configured server wins.
    pub policy_server_urls: Vec<String>,
    pub technical_agent_url: String,
    pub llm: LlmSettings,
    pub session_ttl: Duration,
    pub registry_refresh: Duration,
    /// Per tool-protocol call deadline
    pub http_timeout: Duration,
    pub a2a_concurrency: usize,
    pub log_level: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            domain_agent_port: 8001,
            technical_agent_port: 8002,
            policy_server_urls: vec!["http://localhost:8003".to_string()],
            technical_agent_url: "http://localhost:8002".to_string(),
            llm: LlmSettings {
                primary_model: "gpt-4o-mini".to_string(),
                fallback_model: None,
                api_base: "http://localhost:11434/v1".to_string(),
                api_key: "not-needed".to_string(),
            },
            session_ttl: Duration::from_secs(1800),
            registry_refresh: Duration::from_secs(300),
            http_timeout: Duration::from_secs(5),
            a2a_concurrency: 64,
            log_level: "info".to_string(),
        }
    }
}

impl Settings {
    /// Resolve settings from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when a variable is present but does not
    /// parse (e.g. a non-numeric port). Absent variables use defaults.
    pub fn from_env() -> Result<Self> {
        let defaults = Settings::default();

        let policy_server_urls = match env::var("POLICY_SERVER_URL") {
            Ok(raw) => {
                let urls: Vec<String> = raw
                    .split(',')
                    .map(|s| s.trim().trim_end_matches('/').to_string())
                    .filter(|s| !s.is_empty())
                    .collect();
                if urls.is_empty() {
                    return Err(Error::config("POLICY_SERVER_URL is set but empty"));
                }
                urls
            }
            Err(_) => defaults.policy_server_urls,
        };

        Ok(Self {
            domain_agent_port: env_parse("DOMAIN_AGENT_PORT", defaults.domain_agent_port)?,
            technical_agent_port: env_parse(
                "TECHNICAL_AGENT_PORT",
                defaults.technical_agent_port,
            )?,
            policy_server_urls,
            technical_agent_url: env_or("TECHNICAL_AGENT_URL", &defaults.technical_agent_url),
            llm: LlmSettings {
                primary_model: env_or("LLM_PRIMARY_MODEL", &defaults.llm.primary_model),
                fallback_model: env::var("LLM_FALLBACK_MODEL").ok().filter(|s| !s.is_empty()),
                api_base: env_or("LLM_API_BASE", &defaults.llm.api_base),
                api_key: env_or("LLM_API_KEY", &defaults.llm.api_key),
            },
            session_ttl: Duration::from_secs(env_parse("SESSION_TTL_SECONDS", 1800u64)?),
            registry_refresh: Duration::from_secs(env_parse("REGISTRY_REFRESH_SECONDS", 300u64)?),
            http_timeout: Duration::from_secs(env_parse("HTTP_TIMEOUT_SECONDS", 5u64)?),
            a2a_concurrency: env_parse("A2A_CONCURRENCY", defaults.a2a_concurrency)?,
            log_level: env_or("LOG_LEVEL", &defaults.log_level),
        })
    }
}

/// Read a string variable, falling back to a default when unset.
fn env_or(key: &str, fallback: &str) -> String {
    env::var(key).unwrap_or_else(|_| fallback.to_string())
}

/// Read and parse a variable, falling back to a default when unset.
fn env_parse<T: std::str::FromStr>(key: &str, fallback: T) -> Result<T> {
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| Error::config(format!("{} has invalid value '{}'", key, raw))),
        Err(_) => Ok(fallback),
    }
}
