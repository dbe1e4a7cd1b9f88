use spectral_gp::data::{linspace, SineWave};
use spectral_gp::process::gaussian::kernel::SpectralMixtureKernel;
use spectral_gp::process::gaussian::{
    ConstantMean, GaussianLikelihood, GaussianProcess, Interval,
};
use spectral_gp::train::{TrainConfig, Trainer};

use std::error::Error;

pub fn main() -> Result<(), Box<dyn Error>> {
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    // Data
    let train = SineWave::reference().generate_seeded()?;

    let kernel = SpectralMixtureKernel::from_data(3, train.x(), train.y())?;
    let mean = ConstantMean::new(0.0, Interval::new(-1.0, 1.0)?)?;
    let likelihood = GaussianLikelihood::new(0.1, Interval::new(-5.0, 5.0)?)?;

    let mut gp = GaussianProcess::new(kernel, mean, likelihood, train)?;
    println!("Initial ln_m = {:.4}", gp.ln_m()?);

    let report = Trainer::new(TrainConfig::default()).run(&mut gp)?;
    println!(
        "Finished in state {:?}, final loss = {:.3}",
        report.state,
        report.final_loss().unwrap_or(f64::NAN)
    );
    for warning in &report.warnings {
        println!("warning: {warning}");
    }

    println!("Optimized Kernel = {:#?}", gp.kernel());
    println!("Mean constant = {:.4}", gp.mean().constant());
    println!("Noise variance = {:.4}", gp.likelihood().noise());

    let xs = linspace(0.0, 5.0, 51);
    let pred = gp.observed_predictive(&xs)?;
    let (lower, upper) = pred.confidence_region();

    println!("{:>6} {:>10} {:>10} {:>10}", "x", "lower", "mean", "upper");
    for i in 0..xs.len() {
        println!(
            "{:>6.2} {:>10.4} {:>10.4} {:>10.4}",
            xs[i],
            lower[i],
            pred.mean()[i],
            upper[i]
        );
    }

    Ok(())
}
