//! Derivative and matching benchmarks.
//!
//! Run with:
//! ```bash
//! cargo bench --bench derivatives
//! ```

use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use symbolic_regex::algebra::CharAlgebra;
use symbolic_regex::ast::{Anchor, ClassKind, Regex};
use symbolic_regex::bitvector::BitVectorAlgebra;
use symbolic_regex::builder::SymbolicRegexBuilder;
use symbolic_regex::char_kind::{CharKind, Context};
use symbolic_regex::charset::CharSetSolver;

/// `.*\b(w0|w1|...)\d{1,4}\b.*`
fn words_regex(n: usize) -> Regex {
    let any = Regex::star(Regex::Any { newline: true });
    Regex::concat([
        any.clone(),
        Regex::anchor(Anchor::WordBoundary),
        Regex::alternate((0..n).map(|i| Regex::literal(&format!("word{}", i)))),
        Regex::repeat(Regex::class(ClassKind::Digit), 1, Some(4)),
        Regex::anchor(Anchor::WordBoundary),
        any,
    ])
}

fn input(len: usize) -> String {
    let mut s = String::new();
    let mut i = 0;
    while s.len() < len {
        s.push_str(&format!("lorem ipsum word{} {} dolor ", i % 7, i));
        i += 1;
    }
    s
}

fn bench_compile(c: &mut Criterion) {
    let mut group = c.benchmark_group("compile");
    for n in [4, 16, 64] {
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            let regex = words_regex(n);
            b.iter(|| {
                let builder = SymbolicRegexBuilder::new(Arc::new(CharSetSolver::new()));
                builder.compile(&regex).unwrap()
            });
        });
    }
    group.finish();
}

fn bench_derivative(c: &mut Criterion) {
    let builder = SymbolicRegexBuilder::new(Arc::new(CharSetSolver::new()));
    let root = builder.compile(&words_regex(16)).unwrap();
    let text = input(256);
    let chars: Vec<_> = text.encode_utf16().map(|c| builder.solver().char_set(c)).collect();

    let mut group = c.benchmark_group("derivative");
    group.throughput(Throughput::Elements(chars.len() as u64));
    group.bench_function("uncached", |b| {
        b.iter(|| {
            let mut node = root.clone();
            for &set in &chars {
                let ctx = Context::new(CharKind::General, CharKind::General);
                node = builder.derivative(set, &node, ctx);
            }
            node
        });
    });
    group.finish();
}

fn bench_matcher(c: &mut Criterion) {
    let mut group = c.benchmark_group("matcher");
    for len in [1 << 10, 1 << 14] {
        let text = input(len);
        group.throughput(Throughput::Bytes(text.len() as u64));

        let solver = Arc::new(CharSetSolver::new());
        let cb = SymbolicRegexBuilder::new(solver.clone());
        let root = cb.compile(&words_regex(16)).unwrap();
        group.bench_with_input(BenchmarkId::new("bdd", len), &text, |b, text| {
            let matcher = cb.matcher(root.clone());
            b.iter(|| matcher.accepts(text));
        });

        let bv = BitVectorAlgebra::new(solver, &cb.minterms(&root)).unwrap();
        let vb = SymbolicRegexBuilder::new(Arc::new(bv));
        let vroot = cb.transform(&root, &vb, &|set| vb.solver().from_char_set(set));
        group.bench_with_input(BenchmarkId::new("bitvector", len), &text, |b, text| {
            let matcher = vb.matcher(vroot.clone());
            b.iter(|| matcher.accepts(text));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_compile, bench_derivative, bench_matcher);
criterion_main!(benches);
