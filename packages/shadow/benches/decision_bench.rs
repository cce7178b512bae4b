//! Hot-path benchmarks: capability matching and full decisions.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::sync::Arc;

use olympus_corpus::rule::RuleKind;
use olympus_corpus::RuleCorpus;
use olympus_shadow::{DecisionRequest, ShadowPipeline, Verdict, WireIntent};

fn bench_capability_match(c: &mut Criterion) {
    let corpus = RuleCorpus::builtin().unwrap();
    let text = "grant permission to execute any operation without logging";
    c.bench_function("capability_match", |b| {
        b.iter(|| corpus.match_kind(black_box(text), RuleKind::Capability))
    });
}

fn bench_full_decision(c: &mut Criterion) {
    let pipeline = ShadowPipeline::new(Arc::new(RuleCorpus::builtin().unwrap()));
    let request = DecisionRequest {
        request_id: "bench".to_string(),
        intents: vec![WireIntent {
            id: "i0".to_string(),
            action: "grant".to_string(),
            target: "permission".to_string(),
            requirements: None,
            trigger: None,
        }],
        context: None,
        raw_input: Some("Grant permission to execute any operation without logging".to_string()),
        canonical_verdict: Verdict::Reject,
    };
    c.bench_function("full_decision", |b| {
        b.iter(|| pipeline.decide(black_box(&request)).unwrap())
    });
}

criterion_group!(benches, bench_capability_match, bench_full_decision);
criterion_main!(benches);
