use nalgebra::DVector;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256Plus;

use spectral_gp::data::{linspace, SineWave, TrainingSet};
use spectral_gp::process::gaussian::kernel::{Kernel, SpectralMixtureKernel};
use spectral_gp::process::gaussian::{
    ConstantMean, GaussianLikelihood, GaussianProcess, GpError, Interval,
};
use spectral_gp::train::{TrainConfig, TrainState, Trainer};

fn reference_gp(train: TrainingSet) -> GaussianProcess<SpectralMixtureKernel> {
    let kernel =
        SpectralMixtureKernel::from_data(3, train.x(), train.y()).unwrap();
    let mean =
        ConstantMean::new(0.0, Interval::new(-1.0, 1.0).unwrap()).unwrap();
    let likelihood =
        GaussianLikelihood::new(0.1, Interval::new(-5.0, 5.0).unwrap())
            .unwrap();
    GaussianProcess::new(kernel, mean, likelihood, train).unwrap()
}

fn sq_err(a: &DVector<f64>, b: &DVector<f64>) -> f64 {
    (a - b).norm_squared()
}

#[test]
fn reference_run_reduces_loss() {
    let train = SineWave::reference().generate_seeded().unwrap();
    let mut gp = reference_gp(train);

    let report = Trainer::new(TrainConfig::default()).run(&mut gp).unwrap();

    assert_eq!(report.losses.len(), 50);
    assert_eq!(report.state, TrainState::MaxIterReached);
    assert!(report.losses.iter().all(|l| l.is_finite()));
    assert!(report.final_loss().unwrap() < report.losses[0]);
    assert!(gp.ln_m().unwrap().is_finite());
}

#[test]
fn trained_posterior_fits_training_data() {
    for seed in [0, 1, 2] {
        let train = SineWave::reference()
            .with_seed(seed)
            .generate_seeded()
            .unwrap();
        let mut gp = reference_gp(train.clone());
        Trainer::new(TrainConfig::default()).run(&mut gp).unwrap();

        let pred = gp.posterior_predictive(train.x()).unwrap();
        let prior_mean =
            DVector::from_element(train.len(), gp.mean().constant());

        assert!(
            sq_err(pred.mean(), train.y()) < sq_err(&prior_mean, train.y())
        );
    }
}

#[test]
fn uncertainty_grows_outside_training_domain() {
    let train = SineWave::reference().generate_seeded().unwrap();
    let mut gp = reference_gp(train);
    Trainer::new(TrainConfig::default()).run(&mut gp).unwrap();

    let xs = linspace(0.0, 5.0, 51);
    let pred = gp.observed_predictive(&xs).unwrap();
    let var = pred.variance();

    // xs[0..=7] lie in [0, 0.7]; xs[50] is 5.0
    let max_inside = (0..=7).map(|i| var[i]).fold(f64::MIN, f64::max);
    assert!(var[50] >= max_inside);

    let (lower, upper) = pred.confidence_region();
    let std = pred.std();
    for i in 0..xs.len() {
        assert::close(upper[i] - lower[i], 4.0 * std[i], 1E-10);
        assert!(lower[i] <= pred.mean()[i] && pred.mean()[i] <= upper[i]);
    }
}

#[test]
fn bounded_parameters_survive_training() {
    let train = SineWave::reference().generate_seeded().unwrap();
    let mut gp = reference_gp(train);
    let mut trainer = Trainer::new(TrainConfig::default());

    while !trainer.step(&mut gp).unwrap().is_terminal() {
        assert!(gp.mean().bounds().contains(gp.mean().constant()));
        assert!(gp
            .likelihood()
            .log_noise_bounds()
            .contains(gp.likelihood().log_noise()));
        let kernel = gp.kernel();
        assert!(kernel.weights().iter().all(|&w| w > 0.0));
        assert!(kernel.means().iter().all(|&m| m > 0.0));
        assert!(kernel.variances().iter().all(|&v| v > 0.0));
    }
}

#[test]
fn prior_variance_at_zero_lag() {
    let train = SineWave::reference().generate_seeded().unwrap();
    let gp = reference_gp(train);
    let x = DVector::from_column_slice(&[0.3]);
    let k = gp.kernel().covariance(&x, &x);
    let total: f64 = gp.kernel().weights().sum();
    assert::close(k[(0, 0)], total, 1E-12);
}

#[test]
fn posterior_draws_have_prediction_shape() {
    let train = SineWave::reference().generate_seeded().unwrap();
    let gp = reference_gp(train);
    let pred = gp.posterior_predictive(&linspace(0.0, 2.0, 9)).unwrap();

    let mut rng = Xoshiro256Plus::seed_from_u64(0x1234);
    let draws = pred.sample(3, &mut rng).unwrap();
    assert_eq!(draws.len(), 3);
    assert!(draws.iter().all(|d| d.len() == 9));
}

#[test]
fn wrong_parameter_length_is_rejected() {
    let train = SineWave::reference().generate_seeded().unwrap();
    let gp = reference_gp(train);
    let err = gp
        .ln_m_with_parameters(&DVector::zeros(3))
        .unwrap_err();
    assert_eq!(
        err,
        GpError::DimensionMismatch {
            expected: 11,
            given: 3
        }
    );
}

#[cfg(feature = "serde1")]
#[test]
fn gp_serde_roundtrip() {
    let train = SineWave::reference().generate_seeded().unwrap();
    let gp = reference_gp(train);
    let json = serde_json::to_string(&gp).unwrap();
    let back: GaussianProcess<SpectralMixtureKernel> =
        serde_json::from_str(&json).unwrap();
    assert!(back.parameters().relative_eq(&gp.parameters(), 1E-12, 1E-12));
}
