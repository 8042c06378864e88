use active_surrogate_rs::config::{ActivationKind, ActiveLearningConfig, EnsembleConfig};
use active_surrogate_rs::ensemble::{aggregate, EnsembleTrainer};
use active_surrogate_rs::sampler::latin_hypercube;
use candle_core::Device;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

fn linear_data(n: usize) -> (Vec<Vec<f64>>, Vec<Vec<f64>>) {
    let x: Vec<Vec<f64>> = (0..n).map(|i| vec![i as f64 / n as f64]).collect();
    let y = x.iter().map(|p| vec![2.0 * p[0], 1.0 - p[0]]).collect();
    (x, y)
}

fn bench_latin_hypercube(c: &mut Criterion) {
    let mut group = c.benchmark_group("latin_hypercube");
    for count in [10, 100, 1000] {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            b.iter(|| latin_hypercube(4, &[0.0; 4], &[1.0; 4], black_box(count), 42).unwrap());
        });
    }
    group.finish();
}

fn bench_aggregate(c: &mut Criterion) {
    let predictions: Vec<Vec<Vec<f64>>> = (0..5)
        .map(|m| {
            (0..100)
                .map(|i| vec![f64::from(m) * 0.1 + f64::from(i), f64::from(i) * 0.5])
                .collect()
        })
        .collect();
    c.bench_function("aggregate_5x100", |b| {
        b.iter(|| aggregate(black_box(&predictions)).unwrap());
    });
}

fn bench_train_ensemble(c: &mut Criterion) {
    let (x_train, y_train) = linear_data(20);
    let (x_valid, y_valid) = linear_data(50);
    let config = EnsembleConfig {
        num_networks: 2,
        depths: vec![2, 2],
        widths: vec![32, 32],
        activations: vec![ActivationKind::Relu, ActivationKind::Snake],
        epochs: 20,
        ..Default::default()
    };

    c.bench_function("train_ensemble_2x20_epochs", |b| {
        let mut trainer = EnsembleTrainer::new(config.clone(), 42, Device::Cpu).unwrap();
        b.iter(|| {
            trainer
                .train_ensemble(&x_train, &y_train, &x_valid, &y_valid)
                .unwrap()
        });
    });
}

fn bench_preset(c: &mut Criterion) {
    c.bench_function("preset_lotka_volterra", |b| {
        b.iter(|| ActiveLearningConfig::from_preset(black_box("lotka-volterra")).unwrap());
    });
}

criterion_group!(
    benches,
    bench_latin_hypercube,
    bench_aggregate,
    bench_train_ensemble,
    bench_preset
);
criterion_main!(benches);
