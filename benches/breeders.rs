//! Benchmarks for breeding, selection and fingerprinting.

use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

use island_evolve::{
    compute::evolution::{
        Breeder, CrossoverBreeder, Fingerprint, LabelPool, MutationBreeder, RandomBreeder,
        Selector,
    },
    compute::{ArgKind, Instruction, InstructionSet, Program, SharedRng},
    schema::{SelectionConfig, Solution},
};

fn instruction_set() -> Arc<InstructionSet> {
    Arc::new(InstructionSet::new(vec![
        Instruction::operator("set", vec![ArgKind::Reference, ArgKind::Literal]),
        Instruction::operator("add", vec![ArgKind::Reference, ArgKind::Reference]),
        Instruction::operator("mul", vec![ArgKind::Reference, ArgKind::Reference]),
        Instruction::operator("push", vec![ArgKind::Reference]),
        Instruction::movement("jump", vec![ArgKind::Label]),
    ]))
}

fn seeds(length: usize, rng: &Arc<SharedRng>) -> Vec<Program> {
    RandomBreeder::new(25, length, instruction_set(), LabelPool::default(), Arc::clone(rng))
        .breed(&[])
}

fn bench_breeders(c: &mut Criterion) {
    let mut group = c.benchmark_group("breed");
    let rng = Arc::new(SharedRng::new(7));

    for length in [10, 50, 200] {
        let seeds = seeds(length, &rng);
        let mutation = MutationBreeder::new(
            25,
            0.1,
            instruction_set(),
            LabelPool::default(),
            Arc::clone(&rng),
        );
        let crossover = CrossoverBreeder::new(25, Arc::clone(&rng));

        group.bench_with_input(
            BenchmarkId::new("mutation", format!("{}_lines", length)),
            &length,
            |b, _| {
                b.iter(|| mutation.breed(black_box(&seeds)));
            },
        );
        group.bench_with_input(
            BenchmarkId::new("crossover", format!("{}_lines", length)),
            &length,
            |b, _| {
                b.iter(|| crossover.breed(black_box(&seeds)));
            },
        );
    }

    group.finish();
}

fn bench_selection(c: &mut Criterion) {
    let mut group = c.benchmark_group("select");
    let rng = Arc::new(SharedRng::new(11));

    for size in [50, 500] {
        let solutions: Vec<Solution> = (0..size)
            .map(|i| Solution::new(rng.small_int(), format!("p{}", i)))
            .collect();
        let selector = SelectionConfig::default().build(Arc::clone(&rng));

        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| selector.select(black_box(&solutions)));
        });
    }

    group.finish();
}

fn bench_fingerprint(c: &mut Criterion) {
    let rng = Arc::new(SharedRng::new(3));
    let program = seeds(200, &rng).swap_remove(0);

    c.bench_function("fingerprint_200_lines", |b| {
        b.iter(|| Fingerprint::of(black_box(&program)));
    });
}

criterion_group!(benches, bench_breeders, bench_selection, bench_fingerprint);
criterion_main!(benches);
