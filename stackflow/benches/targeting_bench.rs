//! Benchmarks for deployment target selection.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use stackflow::targeting::{select_targets, HostRecord, HostRegistry, TagSelector, TagSet};

const STAGES: [&str; 3] = ["prod", "stage", "dev"];

fn fleet(size: usize) -> HostRegistry {
    let registry = HostRegistry::new();
    for i in 0..size {
        let app = if i % 2 == 0 { "python-chat" } else { "python-chat-server" };
        let tags = TagSet::from_pairs([("application-name", app), ("stage", STAGES[i % 3])])
            .unwrap();
        registry.register(HostRecord::new(format!("i-{i:06}"), tags));
    }
    registry
}

fn targeting_benchmark(c: &mut Criterion) {
    let registry = fleet(10_000);
    let selector = TagSelector::new()
        .with_key("application-name", ["python-chat"])
        .with_key("stage", ["prod", "stage"]);

    c.bench_function("select_targets_10k", |b| {
        b.iter(|| select_targets(black_box(&registry), black_box(&selector)));
    });

    let tags = TagSet::from_pairs([("application-name", "python-chat"), ("stage", "prod")]).unwrap();
    c.bench_function("selector_matches", |b| {
        b.iter(|| black_box(&selector).matches(black_box(&tags)));
    });
}

criterion_group!(benches, targeting_benchmark);
criterion_main!(benches);
