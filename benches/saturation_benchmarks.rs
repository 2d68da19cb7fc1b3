//! Benchmark suite for the decision-diagram core.
//!
//! Mirrors a `pla_benchmarks.rs` shape (grouped benchmarks keyed
//! by problem size, `Throughput` set to the natural size measure) but swaps
//! "PLA file, cube count" for "Petri net, reachable-state count": each group
//! builds a family of nets of increasing size and reports how explicit
//! generation and saturation scale.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use satdd::builder_front::{Arc, BuilderFront, PetriNet, Transition};
use satdd::config::EngineConfig;
use satdd::forest::{Forest, ReductionRule};
use satdd::saturation::Interrupt;

struct NoInterrupt;
impl Interrupt for NoInterrupt {
    fn is_set(&self) -> bool {
        false
    }
}

/// The chain-of-`k`-binary-variables family, parameterised so it can be
/// scaled up for benchmarking: `2^k` variable
/// combinations exist, but saturation only ever reaches the `k + 1`
/// "1-prefix" states.
fn chain_net(k: usize) -> PetriNet {
    let mut net = PetriNet::new(vec![2; k], vec![0; k]);
    net.add_transition(Transition {
        inputs: vec![],
        inhibitors: (0..k).map(|i| Arc::new(i, 1)).collect(),
        outputs: vec![Arc::new(0, 1)],
        priority: 0,
    });
    for i in 1..k {
        net.add_transition(Transition {
            inputs: vec![Arc::new(i - 1, 1)],
            inhibitors: vec![Arc::new(i, 1)],
            outputs: vec![Arc::new(i, 1)],
            priority: 0,
        });
    }
    net
}

/// The producer/consumer family, parameterised by the shared capacity cap
/// so the reachable-set size grows quadratically.
fn producer_consumer_net(cap: u32) -> PetriNet {
    let mut net = PetriNet::new(vec![cap + 1, cap + 1], vec![0, 0]);
    net.add_transition(Transition {
        inputs: vec![],
        inhibitors: vec![Arc::new(0, cap)],
        outputs: vec![Arc::new(0, 1)],
        priority: 0,
    });
    net.add_transition(Transition {
        inputs: vec![Arc::new(0, 1)],
        inhibitors: vec![Arc::new(1, cap)],
        outputs: vec![Arc::new(1, 1)],
        priority: 0,
    });
    net
}

fn bench_chain_generation(c: &mut Criterion) {
    let _ = env_logger::try_init();
    let mut group = c.benchmark_group("chain_explicit_generation");
    for k in [4usize, 8, 16, 32, 64] {
        group.throughput(Throughput::Elements((k + 1) as u64));
        group.bench_with_input(BenchmarkId::new("levels", k), &k, |b, &k| {
            b.iter(|| {
                let net = chain_net(k);
                let mut sets = Forest::new(ReductionRule::MddSet, vec![2; k], EngineConfig::default());
                let front = BuilderFront::new(EngineConfig::default());
                let report = front.generate(&net, &mut sets, None, &NoInterrupt).unwrap();
                black_box(sets.cardinality(report.reachable).unwrap());
                sets.unlink(report.reachable);
            });
        });
    }
    group.finish();
}

fn bench_producer_consumer_generation(c: &mut Criterion) {
    let mut group = c.benchmark_group("producer_consumer_explicit_generation");
    for cap in [3u32, 7, 15, 31] {
        let expected_states = ((cap + 1) * (cap + 1)) as u64;
        group.throughput(Throughput::Elements(expected_states));
        group.bench_with_input(BenchmarkId::new("cap", cap), &cap, |b, &cap| {
            b.iter(|| {
                let net = producer_consumer_net(cap);
                let mut sets = Forest::new(ReductionRule::MddSet, vec![cap + 1, cap + 1], EngineConfig::default());
                let front = BuilderFront::new(EngineConfig::default());
                let report = front.generate(&net, &mut sets, None, &NoInterrupt).unwrap();
                black_box(sets.cardinality(report.reachable).unwrap());
                sets.unlink(report.reachable);
            });
        });
    }
    group.finish();
}

/// Generation with a next-state relation accumulated alongside the
/// reachable set, which exercises `quasi_to_identity` conversion on every
/// run since `EngineConfig::use_quasi_reduced_during_build` defaults to
/// `true`.
fn bench_generation_with_relation(c: &mut Criterion) {
    let mut group = c.benchmark_group("chain_generation_with_relation");
    for k in [4usize, 8, 16, 32] {
        group.throughput(Throughput::Elements((k + 1) as u64));
        group.bench_with_input(BenchmarkId::new("levels", k), &k, |b, &k| {
            b.iter(|| {
                let net = chain_net(k);
                let mut sets = Forest::new(ReductionRule::MddSet, vec![2; k], EngineConfig::default());
                let mut rel = Forest::new(ReductionRule::MxdIdentity, vec![2; k], EngineConfig::default());
                let front = BuilderFront::new(EngineConfig::default());
                let report = front.generate(&net, &mut sets, Some(&mut rel), &NoInterrupt).unwrap();
                let relation = report.relation.expect("relation requested");
                black_box(sets.cardinality(report.reachable).unwrap());
                sets.unlink(report.reachable);
                rel.unlink(relation);
            });
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_chain_generation,
    bench_producer_consumer_generation,
    bench_generation_with_relation,
);
criterion_main!(benches);
