//! Spectral mixture Gaussian Process regression.
//!
//! Fit a Gaussian Process with a constant mean, a spectral mixture kernel and
//! a Gaussian likelihood to one-dimensional data by maximizing the log
//! marginal likelihood with Adam, then query the posterior predictive
//! distribution.
//!
//! # Example
//!
//! ```
//! use spectral_gp::data::{linspace, SineWave};
//! use spectral_gp::process::gaussian::kernel::SpectralMixtureKernel;
//! use spectral_gp::process::gaussian::{
//!     ConstantMean, GaussianLikelihood, GaussianProcess, Interval,
//! };
//! use spectral_gp::train::{TrainConfig, Trainer};
//!
//! let train = SineWave::reference().generate_seeded().unwrap();
//!
//! let kernel = SpectralMixtureKernel::from_data(3, train.x(), train.y()).unwrap();
//! let mean = ConstantMean::new(0.0, Interval::new(-1.0, 1.0).unwrap()).unwrap();
//! let likelihood =
//!     GaussianLikelihood::new(0.1, Interval::new(-5.0, 5.0).unwrap()).unwrap();
//!
//! let mut gp = GaussianProcess::new(kernel, mean, likelihood, train).unwrap();
//! let report = Trainer::new(TrainConfig::default()).run(&mut gp).unwrap();
//! assert_eq!(report.losses.len(), 50);
//!
//! let xs = linspace(0.0, 5.0, 51);
//! let pred = gp.observed_predictive(&xs).unwrap();
//! let (lower, upper) = pred.confidence_region();
//! assert!(lower.iter().zip(upper.iter()).all(|(lo, hi)| lo <= hi));
//! ```
#![warn(missing_docs)]

pub mod consts;
pub mod data;
pub mod optim;
pub mod process;
pub mod train;
