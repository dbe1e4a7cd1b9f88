use criterion::black_box;
use criterion::BatchSize;
use criterion::Criterion;
use criterion::{criterion_group, criterion_main};
use spectral_gp::data::{linspace, SineWave};
use spectral_gp::process::gaussian::kernel::{Kernel, SpectralMixtureKernel};
use spectral_gp::process::gaussian::{
    ConstantMean, GaussianLikelihood, GaussianProcess, Interval,
};
use spectral_gp::train::{TrainConfig, Trainer};

fn gp_with_n(n: usize) -> GaussianProcess<SpectralMixtureKernel> {
    let train = SineWave::reference()
        .with_n(n)
        .with_domain(0.0, 3.0)
        .generate_seeded()
        .unwrap();
    let kernel =
        SpectralMixtureKernel::from_data(3, train.x(), train.y()).unwrap();
    GaussianProcess::new(
        kernel,
        ConstantMean::new(0.0, Interval::new(-1.0, 1.0).unwrap()).unwrap(),
        GaussianLikelihood::new(0.1, Interval::new(-5.0, 5.0).unwrap())
            .unwrap(),
        train,
    )
    .unwrap()
}

fn bench_covariance(c: &mut Criterion) {
    let mut group = c.benchmark_group("SM kernel covariance with gradient");
    for n in [10, 50, 100] {
        let gp = gp_with_n(n);
        let x = gp.train().x().clone();
        group.bench_with_input(format!("{n} points"), &x, |b, x| {
            b.iter(|| black_box(gp.kernel().covariance_with_gradient(x)))
        });
    }
}

fn bench_ln_m_with_gradient(c: &mut Criterion) {
    let mut group = c.benchmark_group("GP ln_m with gradient");
    for n in [10, 50, 100] {
        let gp = gp_with_n(n);
        group.bench_function(format!("{n} points"), |b| {
            b.iter(|| black_box(gp.ln_m_with_gradient()))
        });
    }
}

fn bench_predict(c: &mut Criterion) {
    let gp = gp_with_n(50);
    let mut group = c.benchmark_group("GP observed predictive, 50 points");
    for m in [10, 51, 200] {
        let xs = linspace(0.0, 5.0, m);
        group.bench_with_input(m.to_string(), &xs, |b, xs| {
            b.iter(|| black_box(gp.observed_predictive(xs)))
        });
    }
}

fn bench_train_step(c: &mut Criterion) {
    c.bench_function("Reference training run, 50 Adam steps", |b| {
        b.iter_batched_ref(
            || gp_with_n(11),
            |gp| {
                black_box(Trainer::new(TrainConfig::default()).run(gp))
            },
            BatchSize::SmallInput,
        )
    });
}

criterion_group!(
    gp_benches,
    bench_covariance,
    bench_ln_m_with_gradient,
    bench_predict,
    bench_train_step
);
criterion_main!(gp_benches);
