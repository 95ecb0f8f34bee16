use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rechain_core::{apply, Stage};

fn bench_apply(c: &mut Criterion) {
    let text = "Order 1234 shipped to bob@example.com on 2024-05-01.\n".repeat(200);
    let stages = vec![
        Stage::new(r"(\d{4})-(\d{2})-(\d{2})", "g", "$3/$2/$1"),
        Stage::new(r"[\w.]+@[\w.]+", "gi", "<email>"),
        Stage::new(r"\d+", "g", "#"),
    ];

    c.bench_function("apply_three_stages", |b| {
        b.iter(|| apply(black_box(&text), black_box(&stages)))
    });
}

criterion_group!(benches, bench_apply);
criterion_main!(benches);
