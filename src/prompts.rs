//! Versioned prompt templates with variable interpolation.
//!
//! Prompts are content, not code: the store supplies parameterized text
//! keyed by `(agent, task_kind, version)` and refuses to render with
//! missing variables rather than silently emitting empty slots. The
//! catalog is built once at process start; hot reload is out of scope.
//!
//! Placeholders use single-brace `{name}` syntax. Literal braces in JSON
//! examples inside templates are escaped as `{{` and `}}`.

use crate::{Error, Result};
use std::collections::HashMap;

/// Identifies one prompt template.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PromptKey {
    pub agent: String,
    pub task_kind: String,
    pub version: u32,
}

impl PromptKey {
    pub fn new(agent: impl Into<String>, task_kind: impl Into<String>, version: u32) -> Self {
        Self {
            agent: agent.into(),
            task_kind: task_kind.into(),
            version,
        }
    }
}

/// In-memory catalog of prompt templates.
pub struct PromptStore {
    templates: HashMap<PromptKey, &'static str>,
    /// Highest version per (agent, task_kind)
    latest: HashMap<(String, String), u32>,
}

impl PromptStore {
    /// Build the built-in catalog.
    pub fn builtin() -> Self {
        let mut store = Self {
            templates: HashMap::new(),
            latest: HashMap::new(),
        };
        store.register("domain", "intent_analysis", 1, INTENT_ANALYSIS_V1);
        store.register("domain", "response_format", 1, RESPONSE_FORMAT_V1);
        store.register("technical", "plan_generation", 1, PLAN_GENERATION_V1);
        store.register("technical", "extract_customer_id", 1, EXTRACT_CUSTOMER_ID_V1);
        store
    }

    fn register(&mut self, agent: &str, task_kind: &str, version: u32, template: &'static str) {
        self.templates
            .insert(PromptKey::new(agent, task_kind, version), template);
        let entry = self
            .latest
            .entry((agent.to_string(), task_kind.to_string()))
            .or_insert(version);
        if version > *entry {
            *entry = version;
        }
    }

    /// Render the latest version of a prompt.
    pub fn render(
        &self,
        agent: &str,
        task_kind: &str,
        variables: &HashMap<&str, String>,
    ) -> Result<String> {
        let version = self
            .latest
            .get(&(agent.to_string(), task_kind.to_string()))
            .copied()
            .ok_or_else(|| {
                Error::prompt(format!("no prompt registered for {}/{}", agent, task_kind))
            })?;
        self.render_version(agent, task_kind, version, variables)
    }

    /// Render a specific version of a prompt.
    ///
    /// # Errors
    ///
    /// [`Error::Prompt`] when the key is unknown or a `{placeholder}` in
    /// the template has no entry in `variables`.
    pub fn render_version(
        &self,
        agent: &str,
        task_kind: &str,
        version: u32,
        variables: &HashMap<&str, String>,
    ) -> Result<String> {
        let key = PromptKey::new(agent, task_kind, version);
        let template = self.templates.get(&key).ok_or_else(|| {
            Error::prompt(format!(
                "no prompt registered for {}/{} v{}",
                agent, task_kind, version
            ))
        })?;
        interpolate(template, variables).map_err(|missing| {
            Error::prompt(format!(
                "prompt {}/{} v{} missing variable '{}'",
                agent, task_kind, version, missing
            ))
        })
    }
}

/// Substitute `{name}` placeholders; `{{`/`}}` escape literal braces.
/// Returns the first missing variable name on failure.
fn interpolate(
    template: &str,
    variables: &HashMap<&str, String>,
) -> std::result::Result<String, String> {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '{' => {
                let mut name = String::new();
                for c in chars.by_ref() {
                    if c == '}' {
                        break;
                    }
                    name.push(c);
                }
                match variables.get(name.as_str()) {
                    Some(value) => out.push_str(value),
                    None => return Err(name),
                }
            }
            _ => out.push(c),
        }
    }
    Ok(out)
}

// ============================================================================
// BUILT-IN TEMPLATES
// ============================================================================

const INTENT_ANALYSIS_V1: &str = r#"You classify insurance customer messages.

Customer message:
{user_text}

Classify the message into one or more of these intents, most relevant first:
payment_inquiry, deductible_inquiry, coverage_inquiry, policy_inquiry,
agent_contact, claim_status, general_inquiry.

Respond with ONLY a JSON object of this exact shape:
{{"primary_intents": ["..."], "confidence": 0.0, "requires_auth": true, "requires_technical": true}}

Rules:
- primary_intents must be non-empty and use only the listed values.
- confidence is your classification confidence between 0 and 1.
- requires_auth and requires_technical are true for any intent that needs
  the customer's policy records; only pure small talk sets them false."#;

const RESPONSE_FORMAT_V1: &str = r#"You are a courteous insurance assistant replying to a customer.

Customer message:
{user_text}

Customer id: {customer_id}
Detected intents: {primary_intents}

Retrieved policy data (JSON, may be empty):
{technical_data}

Write the reply. Hard rules:
- Answer only what the customer asked.
- Use ONLY values present in the retrieved data above. If a field is not
  there, say you could not retrieve it.
- Never invent vehicles, amounts, dates, or policy names.
- If the data shows nothing was found for the customer, say politely that
  no records were found.
- Plain text, no markdown, at most a short paragraph per question asked."#;

const PLAN_GENERATION_V1: &str = r#"You plan tool calls for an insurance data backend.

Customer request:
{request_text}

Authenticated customer id: {customer_id}

Available tools (name, description, parameter schema):
{tool_catalog}

Produce a plan as ONLY a JSON object of this exact shape:
{{"steps": [{{"id": "step_1", "tool_name": "...", "parameters": {{}}, "purpose": "...", "dependencies": []}}]}}

Rules:
- Use only tool names from the catalog above.
- Every tool that takes customer_id must receive "{customer_id}".
- dependencies lists ids of earlier steps whose output a step needs;
  leave it empty for independent lookups.
- Prefer the fewest steps that fully answer the request."#;

const EXTRACT_CUSTOMER_ID_V1: &str = r#"Extract the customer identifier from this agent task text, if any.

Task text:
{task_text}

Respond with ONLY a JSON object: {{"customer_id": "..."}} or {{"customer_id": null}}
if no identifier is present. Do not guess."#;

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&'static str, &str)]) -> HashMap<&'static str, String> {
        pairs.iter().map(|(k, v)| (*k, v.to_string())).collect()
    }

    #[test]
    fn test_render_intent_prompt() {
        let store = PromptStore::builtin();
        let rendered = store
            .render(
                "domain",
                "intent_analysis",
                &vars(&[("user_text", "what's my deductible?")]),
            )
            .unwrap();
        assert!(rendered.contains("what's my deductible?"));
        // escaped JSON braces survive as literals
        assert!(rendered.contains(r#"{"primary_intents""#));
        assert!(!rendered.contains("{user_text}"));
    }

    #[test]
    fn test_missing_variable_is_an_error() {
        let store = PromptStore::builtin();
        let err = store
            .render("domain", "intent_analysis", &HashMap::new())
            .unwrap_err();
        assert!(err.to_string().contains("user_text"), "{}", err);
    }

    #[test]
    fn test_unknown_key_is_an_error() {
        let store = PromptStore::builtin();
        assert!(
            store
                .render("domain", "weather_report", &HashMap::new())
                .is_err()
        );
    }

    #[test]
    fn test_specific_version_lookup() {
        let store = PromptStore::builtin();
        assert!(
            store
                .render_version(
                    "technical",
                    "plan_generation",
                    1,
                    &vars(&[
                        ("request_text", "billing"),
                        ("customer_id", "CUST-001"),
                        ("tool_catalog", "[]"),
                    ]),
                )
                .is_ok()
        );
        assert!(
            store
                .render_version("technical", "plan_generation", 99, &HashMap::new())
                .is_err()
        );
    }

    #[test]
    fn test_interpolate_escapes() {
        let out = interpolate("a {{literal}} and {value}", &vars(&[("value", "v")])).unwrap();
        assert_eq!(out, "a {literal} and v");
    }

    #[test]
    fn test_plan_prompt_substitutes_customer_id_twice() {
        let store = PromptStore::builtin();
        let rendered = store
            .render(
                "technical",
                "plan_generation",
                &vars(&[
                    ("request_text", "what do I owe?"),
                    ("customer_id", "CUST-042"),
                    ("tool_catalog", "get_payment_information"),
                ]),
            )
            .unwrap();
        assert_eq!(rendered.matches("CUST-042").count(), 2);
    }
}
