//! Hyper-parameter fitting by maximizing the log marginal likelihood
//!
//! The objective is the negative log marginal likelihood divided by the
//! number of observations, minimized over the free parameter vector of a
//! [`RandomProcess`].

use log::{debug, info, warn};
use nalgebra::DVector;
use std::fmt;

#[cfg(feature = "serde1")]
use serde::{Deserialize, Serialize};

use crate::optim::{Adam, AdamParams, OptimError, Optimizer};
use crate::process::gaussian::GpError;
use crate::process::RandomProcess;

/// Settings for a training run
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde1", serde(rename_all = "snake_case"))]
pub struct TrainConfig {
    /// Number of optimizer steps
    pub max_iters: usize,
    /// Adam hyper-parameters
    pub adam: AdamParams,
    /// Stop early once the loss changes by less than this
    pub tolerance: Option<f64>,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            max_iters: 50,
            adam: AdamParams::default(),
            tolerance: None,
        }
    }
}

impl TrainConfig {
    /// Set the number of iterations
    #[must_use]
    pub fn with_max_iters(self, max_iters: usize) -> Self {
        Self { max_iters, ..self }
    }

    /// Set the Adam hyper-parameters
    #[must_use]
    pub fn with_adam(self, adam: AdamParams) -> Self {
        Self { adam, ..self }
    }

    /// Stop once the loss changes by less than `tolerance`
    #[must_use]
    pub fn with_tolerance(self, tolerance: f64) -> Self {
        Self {
            tolerance: Some(tolerance),
            ..self
        }
    }
}

/// Where a training run is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde1", serde(rename_all = "snake_case"))]
pub enum TrainState {
    /// No step taken yet
    Initialized,
    /// At least one step taken
    Iterating,
    /// The loss change fell below the tolerance
    Converged,
    /// All iterations were used
    MaxIterReached,
}

impl TrainState {
    /// Whether further steps are no-ops
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Converged | Self::MaxIterReached)
    }
}

/// The loss went up between two iterations. Training continues.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde1", serde(rename_all = "snake_case"))]
pub struct ConvergenceWarning {
    /// Iteration (1-based) at which the loss increased
    pub iter: usize,
    /// Loss at the previous iteration
    pub previous: f64,
    /// Loss at this iteration
    pub current: f64,
}

impl fmt::Display for ConvergenceWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Loss increased at iteration {} ({:.6} -> {:.6})",
            self.iter, self.previous, self.current
        )
    }
}

/// Summary of a finished training run
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde1", serde(rename_all = "snake_case"))]
pub struct TrainReport {
    /// Loss at each iteration, before the parameter update
    pub losses: Vec<f64>,
    /// Terminal state
    pub state: TrainState,
    /// Non-fatal warnings raised along the way
    pub warnings: Vec<ConvergenceWarning>,
}

impl TrainReport {
    /// Loss recorded at the last iteration
    #[must_use]
    pub fn final_loss(&self) -> Option<f64> {
        self.losses.last().copied()
    }
}

/// Errors that abort training
#[derive(Debug, Clone, PartialEq)]
pub enum TrainError {
    /// The process failed to evaluate its likelihood
    Gp(GpError),
    /// The optimizer rejected a step
    Optim(OptimError),
    /// The loss or its gradient was NaN or infinite
    NonFinite {
        /// Iteration (1-based) at which it happened
        iter: usize,
    },
    /// The quasi-Newton solver failed
    Solver(String),
}

impl std::error::Error for TrainError {}

impl fmt::Display for TrainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gp(e) => write!(f, "{e}"),
            Self::Optim(e) => write!(f, "{e}"),
            Self::NonFinite { iter } => write!(
                f,
                "Loss or gradient became non-finite at iteration {iter}"
            ),
            Self::Solver(msg) => write!(f, "Solver failed: {msg}"),
        }
    }
}

impl From<GpError> for TrainError {
    fn from(e: GpError) -> Self {
        Self::Gp(e)
    }
}

impl From<OptimError> for TrainError {
    fn from(e: OptimError) -> Self {
        Self::Optim(e)
    }
}

/// Per-datum loss and its gradient for the process at `parameters`
fn loss_and_gradient<P>(
    process: &P,
    parameters: &DVector<f64>,
) -> Result<(f64, DVector<f64>), GpError>
where
    P: RandomProcess<Error = GpError>,
{
    let n = process.n_observations() as f64;
    let (ln_m, grad) = process.ln_m_with_parameters(parameters)?;
    Ok((-ln_m / n, grad / -n))
}

/// Runs an optimizer over a process' free parameters
#[derive(Debug, Clone)]
pub struct Trainer<O = Adam>
where
    O: Optimizer,
{
    config: TrainConfig,
    optimizer: O,
    state: TrainState,
    losses: Vec<f64>,
    warnings: Vec<ConvergenceWarning>,
}

impl Trainer<Adam> {
    /// Train with Adam
    #[must_use]
    pub fn new(config: TrainConfig) -> Self {
        Self::with_optimizer(config, Adam::new(config.adam))
    }
}

impl<O> Trainer<O>
where
    O: Optimizer,
{
    /// Train with a different optimizer. `config.adam` is ignored.
    pub fn with_optimizer(config: TrainConfig, optimizer: O) -> Self {
        Self {
            config,
            optimizer,
            state: TrainState::Initialized,
            losses: Vec::with_capacity(config.max_iters),
            warnings: Vec::new(),
        }
    }

    /// Current state
    pub fn state(&self) -> TrainState {
        self.state
    }

    /// Losses recorded so far
    pub fn losses(&self) -> &[f64] {
        &self.losses
    }

    /// Warnings raised so far
    pub fn warnings(&self) -> &[ConvergenceWarning] {
        &self.warnings
    }

    /// Take one optimizer step. Calling this in a terminal state does
    /// nothing.
    ///
    /// # Errors
    /// Fails if the likelihood cannot be evaluated, or if the loss or
    /// gradient is not finite. The process is not updated on error.
    pub fn step<P>(&mut self, process: &mut P) -> Result<TrainState, TrainError>
    where
        P: RandomProcess<Error = GpError>,
    {
        if self.state.is_terminal() {
            return Ok(self.state);
        }
        if self.losses.len() >= self.config.max_iters {
            self.state = TrainState::MaxIterReached;
            return Ok(self.state);
        }

        let iter = self.losses.len() + 1;
        let mut parameters = process.parameters();
        let (loss, grad) = loss_and_gradient(process, &parameters)?;
        if !loss.is_finite() || grad.iter().any(|g| !g.is_finite()) {
            return Err(TrainError::NonFinite { iter });
        }

        info!("Iter {}/{} - Loss: {:.3}", iter, self.config.max_iters, loss);

        self.optimizer.step(&mut parameters, &grad)?;
        debug!(
            "Parameters after iteration {iter}: {:?}",
            parameters.as_slice()
        );
        process.set_parameters(&parameters)?;

        let previous = self.losses.last().copied();
        self.losses.push(loss);

        if let Some(previous) = previous {
            if loss > previous {
                let warning = ConvergenceWarning {
                    iter,
                    previous,
                    current: loss,
                };
                warn!("{warning}");
                self.warnings.push(warning);
            }
        }

        self.state = match (previous, self.config.tolerance) {
            (Some(previous), Some(tol)) if (loss - previous).abs() < tol => {
                info!("Converged after {iter} iterations");
                TrainState::Converged
            }
            _ if iter >= self.config.max_iters => TrainState::MaxIterReached,
            _ => TrainState::Iterating,
        };

        Ok(self.state)
    }

    /// Step until a terminal state is reached
    ///
    /// # Errors
    /// See [`Trainer::step`].
    pub fn run<P>(&mut self, process: &mut P) -> Result<TrainReport, TrainError>
    where
        P: RandomProcess<Error = GpError>,
    {
        while !self.step(process)?.is_terminal() {}
        Ok(self.report())
    }

    /// Snapshot of the run so far
    pub fn report(&self) -> TrainReport {
        TrainReport {
            losses: self.losses.clone(),
            state: self.state,
            warnings: self.warnings.clone(),
        }
    }

    /// Forget all progress so the trainer can be reused
    pub fn reset(&mut self) {
        self.optimizer.reset();
        self.state = TrainState::Initialized;
        self.losses.clear();
        self.warnings.clear();
    }
}

/// Fit a process with argmin's L-BFGS and a More-Thuente line search,
/// returning the per-datum loss at the best parameters found.
///
/// # Errors
/// Fails if the solver fails or the best parameters cannot be applied.
#[cfg(feature = "argmin")]
pub fn fit_lbfgs<P>(process: &mut P, max_iters: u64) -> Result<f64, TrainError>
where
    P: RandomProcess<Error = GpError>,
{
    use argmin::core::{Executor, State};
    use argmin::solver::linesearch::MoreThuenteLineSearch;
    use argmin::solver::quasinewton::LBFGS;

    use crate::process::RandomProcessMleOp;

    let init = process.parameters();
    let op = RandomProcessMleOp::new(process.clone());
    let solver = LBFGS::new(MoreThuenteLineSearch::new(), 7);

    let res = Executor::new(op, solver)
        .configure(|state| state.param(init).max_iters(max_iters))
        .run()
        .map_err(|e| TrainError::Solver(e.to_string()))?;

    let best = res
        .state()
        .get_best_param()
        .cloned()
        .ok_or_else(|| TrainError::Solver("no parameters found".into()))?;
    process.set_parameters(&best)?;

    let loss = -process.ln_m()? / process.n_observations() as f64;
    info!(
        "L-BFGS finished after {} iterations - Loss: {:.3}",
        res.state().get_iter(),
        loss
    );
    Ok(loss)
}
