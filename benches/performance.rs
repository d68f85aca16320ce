use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use policy_agents::prompts::PromptStore;
use policy_agents::rules;
use policy_agents::technical::CustomerIdRecovery;
use policy_agents::tp::validate_parameters;
use policy_agents::types::{PlanStep, ToolCallPlan, tool_names};
use serde_json::json;
use std::collections::{HashMap, HashSet};

// Helper to build plans of varying width
fn create_plan(step_count: usize) -> ToolCallPlan {
    let steps = (0..step_count)
        .map(|i| PlanStep {
            id: format!("step_{}", i + 1),
            tool_name: tool_names::ALL[i % tool_names::ALL.len()].to_string(),
            parameters: json!({"customer_id": "CUST-001"}),
            purpose: "bench".to_string(),
            dependencies: if i == 0 {
                Vec::new()
            } else {
                vec![format!("step_{}", i)]
            },
        })
        .collect();
    ToolCallPlan { steps }
}

fn known_tools() -> HashSet<String> {
    tool_names::ALL.iter().map(|s| s.to_string()).collect()
}

fn bench_marker_recovery(c: &mut Criterion) {
    let recovery = CustomerIdRecovery::new();
    let task = policy_agents::a2a::A2aTask::new(
        "domain",
        "technical",
        "When is my premium due and what is my deductible for the auto policy \
         I renewed last spring? (session_customer_id: CUST-001)",
    );

    c.bench_function("marker_recovery", |b| {
        b.iter(|| recovery.from_task(black_box(&task)))
    });
}

fn bench_rule_matching(c: &mut Criterion) {
    let message = "When is my premium due and what is my deductible and who is my agent?";
    c.bench_function("rule_match_tools", |b| {
        b.iter(|| rules::match_tools(black_box(message)))
    });
    c.bench_function("rule_fallback_intent", |b| {
        b.iter(|| rules::fallback_intent(black_box(message)))
    });
}

fn bench_plan_validation(c: &mut Criterion) {
    let known = known_tools();
    let mut group = c.benchmark_group("plan_validation");
    for size in [1, 4, 16, 64] {
        let plan = create_plan(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &plan, |b, plan| {
            b.iter(|| plan.validate(black_box(&known)))
        });
    }
    group.finish();
}

fn bench_parameter_validation(c: &mut Criterion) {
    let schema = json!({
        "type": "object",
        "properties": {
            "customer_id": {"type": "string"},
            "policy_id": {"type": "string"}
        },
        "required": ["customer_id", "policy_id"]
    });
    let params = json!({"customer_id": "CUST-001", "policy_id": "POL-AUTO-77"});
    c.bench_function("parameter_validation", |b| {
        b.iter(|| validate_parameters(black_box(&schema), black_box(&params)))
    });
}

fn bench_prompt_render(c: &mut Criterion) {
    let store = PromptStore::builtin();
    let mut variables = HashMap::new();
    variables.insert("request_text", "what do I owe on my auto policy?".to_string());
    variables.insert("customer_id", "CUST-001".to_string());
    variables.insert("tool_catalog", "[]".to_string());

    c.bench_function("prompt_render_plan_generation", |b| {
        b.iter(|| {
            store
                .render("technical", "plan_generation", black_box(&variables))
                .unwrap()
        })
    });
}

criterion_group!(
    benches,
    bench_marker_recovery,
    bench_rule_matching,
    bench_plan_validation,
    bench_parameter_validation,
    bench_prompt_render
);
criterion_main!(benches);
