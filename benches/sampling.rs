//! Performance benchmarks for sampling
//!
//! Measures, on the classic burglary/alarm network:
//! - Single-threaded prior and weighted sample throughput
//! - End-to-end queries for both estimators at several worker counts
//! - CPT edits (hash, intern, release)
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use credence_core::{
    sampling::{Assignment, Evidence, SamplingEngine},
    Algorithm, InferenceConfig, NetworkModel, NodeRecord, QueryEngine,
};
use rand::{rngs::StdRng, SeedableRng};

fn alarm_records() -> Vec<NodeRecord> {
    vec![
        NodeRecord::probabilistic("Burglary", &["T", "F"], &[], vec![0.001, 0.999]),
        NodeRecord::probabilistic("Earthquake", &["T", "F"], &[], vec![0.002, 0.998]),
        NodeRecord::probabilistic(
            "Alarm",
            &["T", "F"],
            &["Burglary", "Earthquake"],
            vec![0.95, 0.05, 0.94, 0.06, 0.29, 0.71, 0.001, 0.999],
        ),
        NodeRecord::probabilistic("JohnCalls", &["T", "F"], &["Alarm"], vec![0.9, 0.1, 0.05, 0.95]),
        NodeRecord::probabilistic("MaryCalls", &["T", "F"], &["Alarm"], vec![0.7, 0.3, 0.01, 0.99]),
    ]
}

fn bench_single_samples(c: &mut Criterion) {
    let model = NetworkModel::load(alarm_records()).unwrap();
    let engine = SamplingEngine::new(&model);
    let evidence = Evidence::resolve(&model, [("JohnCalls", "T"), ("MaryCalls", "T")]).unwrap();
    let mut rng = StdRng::seed_from_u64(1);
    let mut scratch = Assignment::for_model(&model);

    c.bench_function("prior_sample", |b| {
        b.iter(|| {
            engine.prior_sample_into(&mut rng, &mut scratch);
            black_box(scratch.state(0))
        })
    });

    c.bench_function("weighted_sample", |b| {
        b.iter(|| black_box(engine.weighted_sample_into(&mut rng, &evidence, &mut scratch)))
    });
}

fn bench_queries(c: &mut Criterion) {
    let mut group = c.benchmark_group("query_100k");
    for workers in [1usize, 2, 4] {
        let engine = QueryEngine::from_records(
            alarm_records(),
            InferenceConfig::default().with_seed(3).with_workers(workers),
        )
        .unwrap();
        for algorithm in [Algorithm::LikelihoodWeighting, Algorithm::Rejection] {
            group.bench_with_input(
                BenchmarkId::new(format!("{algorithm:?}"), workers),
                &engine,
                |b, engine| {
                    b.iter(|| {
                        engine
                            .infer("Alarm|JohnCalls=T", black_box(100_000), algorithm)
                            .unwrap()
                    })
                },
            );
        }
    }
    group.finish();
}

fn bench_edit_cpt(c: &mut Criterion) {
    let engine =
        QueryEngine::from_records(alarm_records(), InferenceConfig::default().with_seed(3)).unwrap();
    let tables = [[0.9, 0.1, 0.05, 0.95], [0.8, 0.2, 0.1, 0.9]];
    let mut flip = 0;
    c.bench_function("edit_cpt", |b| {
        b.iter(|| {
            flip ^= 1;
            engine.edit_cpt_values("JohnCalls", &tables[flip]).unwrap()
        })
    });
}

criterion_group! {
    name = benches;
    config = Criterion::default()
        .sample_size(30)
        .measurement_time(std::time::Duration::from_secs(5));
    targets =
        bench_single_samples,
        bench_queries,
        bench_edit_cpt
}

criterion_main!(benches);
