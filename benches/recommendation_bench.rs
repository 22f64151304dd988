use criterion::{black_box, criterion_group, criterion_main, Criterion};
use implicit_als::algorithms::{train, InteractionIndex, RecommendationEngine};
use implicit_als::config::TrainingConfig;
use implicit_als::Observation;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;

const NUM_USERS: usize = 2000;
const NUM_ITEMS: usize = 1000;

fn synthetic_observations(count: usize) -> Vec<Observation> {
    let mut rng = StdRng::seed_from_u64(17);
    (0..count)
        .map(|_| {
            Observation::new(
                rng.gen_range(0..NUM_USERS as u32),
                rng.gen_range(0..NUM_ITEMS as u32),
                rng.gen_range(1..5) as f64,
            )
        })
        .collect()
}

fn bench_config() -> TrainingConfig {
    TrainingConfig {
        rank: 32,
        iterations: 2,
        alpha: 10.0,
        lambda: 0.05,
        compute_loss: false,
        ..Default::default()
    }
}

fn benchmark_index(c: &mut Criterion) {
    let observations = synthetic_observations(50_000);

    c.bench_function("interaction_index_build", |b| {
        b.iter(|| {
            black_box(InteractionIndex::build(NUM_USERS, NUM_ITEMS, observations.iter().copied(), 10.0).unwrap());
        });
    });
}

fn benchmark_training(c: &mut Criterion) {
    let index = InteractionIndex::build(NUM_USERS, NUM_ITEMS, synthetic_observations(50_000), 10.0).unwrap();
    let config = bench_config();

    let mut group = c.benchmark_group("als");
    group.sample_size(10);
    group.bench_function("train_two_iterations", |b| {
        b.iter(|| {
            black_box(train(&index, &config).unwrap());
        });
    });
    group.finish();
}

fn benchmark_queries(c: &mut Criterion) {
    let index = InteractionIndex::build(NUM_USERS, NUM_ITEMS, synthetic_observations(50_000), 10.0).unwrap();
    let engine = RecommendationEngine::from_factorization(train(&index, &bench_config()).unwrap());
    let seen: HashSet<u32> = index.seen_items(0).unwrap();

    c.bench_function("predict", |b| {
        b.iter(|| {
            black_box(engine.predict(black_box(10), black_box(20)).unwrap());
        });
    });

    c.bench_function("top_k_excluding_set", |b| {
        b.iter(|| {
            black_box(engine.top_k(0, 10, &seen).unwrap());
        });
    });

    c.bench_function("top_k_unseen", |b| {
        b.iter(|| {
            black_box(engine.top_k_unseen(0, 10, &index).unwrap());
        });
    });

    c.bench_function("similar_items", |b| {
        b.iter(|| {
            black_box(engine.similar_items(0, 10).unwrap());
        });
    });

    let users: Vec<u32> = (0..256).collect();
    c.bench_function("recommend_batch_256", |b| {
        b.iter(|| {
            black_box(engine.recommend_batch(&users, 10, &index).unwrap());
        });
    });
}

criterion_group!(benches, benchmark_index, benchmark_training, benchmark_queries);
criterion_main!(benches);
