//! Keyword rule table shared by both agents' fallback paths.
//!
//! When the LLM is unavailable or returns output that fails validation,
//! both tiers degrade to the same deterministic mapping: the domain agent
//! derives an [`Intent`] from it, the technical agent derives tool
//! selections. Keeping one table guarantees the two fallbacks agree on
//! what a message is about.

use crate::types::{Intent, IntentKind, tool_names};

/// One rule: any keyword hit maps the message to an intent and a tool.
struct KeywordRule {
    keywords: &'static [&'static str],
    intent: IntentKind,
    tool: &'static str,
}

/// Match order is significant: multi-intent messages produce intents and
/// tools in this order.
const RULES: [KeywordRule; 5] = [
    KeywordRule {
        keywords: &["payment", "premium", "due", "bill", "billing"],
        intent: IntentKind::PaymentInquiry,
        tool: tool_names::GET_PAYMENT_INFORMATION,
    },
    KeywordRule {
        keywords: &["deductible"],
        intent: IntentKind::DeductibleInquiry,
        tool: tool_names::GET_DEDUCTIBLES,
    },
    KeywordRule {
        keywords: &["coverage", "cover", "limit"],
        intent: IntentKind::CoverageInquiry,
        tool: tool_names::GET_COVERAGE_INFORMATION,
    },
    KeywordRule {
        keywords: &["agent", "contact"],
        intent: IntentKind::AgentContact,
        tool: tool_names::GET_AGENT,
    },
    KeywordRule {
        keywords: &["policy", "policies"],
        intent: IntentKind::PolicyInquiry,
        tool: tool_names::GET_CUSTOMER_POLICIES,
    },
];

/// Tools selected for a message by keyword match, in rule order, deduped.
///
/// A message matching nothing maps to `get_customer_policies`: a policy
/// listing is the safest useful default for an authenticated customer.
pub fn match_tools(text: &str) -> Vec<&'static str> {
    let lowered = text.to_lowercase();
    let mut tools: Vec<&'static str> = Vec::new();
    for rule in &RULES {
        if rule.keywords.iter().any(|k| lowered.contains(k)) && !tools.contains(&rule.tool) {
            tools.push(rule.tool);
        }
    }
    if tools.is_empty() {
        tools.push(tool_names::GET_CUSTOMER_POLICIES);
    }
    tools
}

/// Intents matched for a message by keyword, in rule order, deduped.
/// Empty when no rule fires.
pub fn match_intents(text: &str) -> Vec<IntentKind> {
    let lowered = text.to_lowercase();
    let mut intents: Vec<IntentKind> = Vec::new();
    for rule in &RULES {
        if rule.keywords.iter().any(|k| lowered.contains(k)) && !intents.contains(&rule.intent) {
            intents.push(rule.intent);
        }
    }
    intents
}

/// Build a complete fallback [`Intent`] for a message.
///
/// Fallback classifications carry a fixed confidence of 0.5 to mark that
/// no model was consulted. Unmatched messages classify as
/// `general_inquiry` and need no backend data.
pub fn fallback_intent(text: &str) -> Intent {
    let matched = match_intents(text);
    let technical = !matched.is_empty();
    let primary_intents = if matched.is_empty() {
        vec![IntentKind::GeneralInquiry]
    } else {
        matched
    };
    Intent {
        primary_intents,
        confidence: 0.5,
        requires_auth: technical,
        requires_technical: technical,
    }
}
