//! Levenberg-Marquardt fitting loop.
//!
//! The controller drives a damped Gauss-Newton iteration over the fit-enabled
//! parameters. Steps are taken in log space for positive parameters (see
//! [`Perturbation`]) and clipped into each parameter's bounds. Every accepted
//! step strictly lowers the sum of squared residuals.

use std::sync::atomic::{AtomicBool, Ordering};

use ndarray::{Array1, Array2};
use tracing::{debug, info, warn};

use crate::data::ObservedData;
use crate::error::{Result, WellFitError};
use crate::model::{ForwardModel, ModelCurve, ModelType, Precision};
use crate::parameters::{recompute_derived, Bounds, FitParameter, ParamId, ParameterMap};

use super::config::LmConfig;
use super::convergence::Termination;
use super::jacobian::{JacobianBuilder, Perturbation};
use super::observer::{FitObserver, FitSnapshot, SnapshotKind};
use super::residuals::{normalized_error, sum_squared_error, FitWeight, ResidualEvaluator};
use super::solver::{damped_step, normal_equations};

/// Result of a fit
#[derive(Debug, Clone, PartialEq)]
pub struct FitOutcome {
    pub termination: Termination,

    /// Completed iterations
    pub iterations: usize,

    /// Sum of squared residuals at the returned parameters
    pub sse: f64,

    /// `sse / residual count`
    pub normalized_error: f64,

    /// Final parameter values, derived ones recomputed
    pub parameters: ParameterMap,
}

impl FitOutcome {
    pub fn is_converged(&self) -> bool {
        self.termination.is_converged()
    }
}

/// A fit-enabled parameter as seen by the loop
#[derive(Debug, Clone, Copy)]
struct ActiveParameter {
    id: ParamId,
    bounds: Bounds,
}

/// Levenberg-Marquardt controller for one dataset and model.
pub struct LmController<'a, M: ForwardModel + ?Sized> {
    model: &'a M,
    model_type: ModelType,
    observed: &'a ObservedData,
    weight: FitWeight,
    config: LmConfig,
}

impl<'a, M: ForwardModel + ?Sized> LmController<'a, M> {
    /// Create a controller with default configuration.
    pub fn new(
        model: &'a M,
        model_type: ModelType,
        observed: &'a ObservedData,
        weight: FitWeight,
    ) -> Self {
        Self {
            model,
            model_type,
            observed,
            weight,
            config: LmConfig::default(),
        }
    }

    /// Replace the whole configuration.
    pub fn with_config(mut self, config: LmConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the maximum number of iterations.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.config.max_iterations = max_iterations;
        self
    }

    /// Set the initial value for the damping parameter.
    pub fn with_lambda(mut self, lambda: f64) -> Self {
        self.config.initial_lambda = lambda;
        self
    }

    /// Set the number of trial steps per iteration.
    pub fn with_max_trials(mut self, max_trials: usize) -> Self {
        self.config.max_trials = max_trials;
        self
    }

    /// Set the normalized error considered converged.
    pub fn with_error_tolerance(mut self, tolerance: f64) -> Self {
        self.config.error_tolerance = tolerance;
        self
    }

    pub fn config(&self) -> &LmConfig {
        &self.config
    }

    /// Fit the parameters marked for fitting.
    ///
    /// `cancel` is polled once per iteration. Progress and snapshots go to
    /// `observer`. A forward-model failure on the starting parameters is
    /// returned as an error; later failures only reject the trial concerned.
    pub fn run(
        &self,
        params: &[FitParameter],
        cancel: &AtomicBool,
        observer: &mut dyn FitObserver,
    ) -> Result<FitOutcome> {
        let mut current: ParameterMap = params.iter().map(|p| (p.id(), p.value())).collect();
        recompute_derived(&mut current);

        let active: Vec<ActiveParameter> = params
            .iter()
            .filter(|p| p.is_fit() && !p.id().is_derived())
            .map(|p| ActiveParameter {
                id: p.id(),
                bounds: p.bounds(),
            })
            .collect();

        if active.is_empty() {
            info!("no parameters selected for fitting");
            return Ok(FitOutcome {
                termination: Termination::NoActiveParameters,
                iterations: 0,
                sse: f64::INFINITY,
                normalized_error: f64::INFINITY,
                parameters: current,
            });
        }
        let active_ids: Vec<ParamId> = active.iter().map(|a| a.id).collect();

        let evaluator = ResidualEvaluator::new(self.model, self.model_type, self.observed, self.weight)
            .with_precision(Precision::Fast);
        let jacobian = JacobianBuilder::new(&evaluator, &self.config);

        let mut residuals = evaluator.evaluate(&current)?;
        let mut sse = sum_squared_error(&residuals);
        let mut lambda = self.config.initial_lambda;
        let mut iterations = 0;

        debug!(active = ?active_ids, sse, residuals = residuals.len(), "starting fit");
        observer.on_snapshot(self.snapshot(SnapshotKind::Initial, 0, sse, residuals.len(), &current, Precision::Fast));

        let termination = loop {
            if cancel.load(Ordering::Relaxed) {
                break Termination::Cancelled;
            }
            if normalized_error(sse, residuals.len()) < self.config.error_tolerance {
                break Termination::Converged;
            }
            if iterations >= self.config.max_iterations {
                break Termination::MaxIterReached;
            }

            observer.on_progress(progress_percent(iterations, self.config.max_iterations));

            let jac = jacobian.build(&current, &residuals, &active_ids);
            let (hessian, gradient) = normal_equations(&jac, &residuals);

            let mut accepted = false;
            for trial in 0..self.config.max_trials {
                match self.trial(&current, &active, &hessian, &gradient, lambda, &evaluator) {
                    Ok((candidate, candidate_residuals)) => {
                        let candidate_sse = sum_squared_error(&candidate_residuals);
                        if candidate_sse < sse {
                            debug!(iteration = iterations, trial, lambda, sse = candidate_sse, "step accepted");
                            current = candidate;
                            residuals = candidate_residuals;
                            sse = candidate_sse;
                            lambda *= self.config.lambda_down_factor;
                            accepted = true;
                            observer.on_snapshot(self.snapshot(
                                SnapshotKind::Step,
                                iterations + 1,
                                sse,
                                residuals.len(),
                                &current,
                                Precision::Fast,
                            ));
                            break;
                        }
                        debug!(iteration = iterations, trial, lambda, sse = candidate_sse, "step rejected");
                    }
                    Err(err) => {
                        debug!(iteration = iterations, trial, lambda, error = %err, "trial failed");
                    }
                }
                lambda *= self.config.lambda_up_factor;
            }

            iterations += 1;
            if !accepted && lambda > self.config.max_lambda {
                break Termination::Stalled;
            }
        };

        recompute_derived(&mut current);
        let n = residuals.len();
        let error = normalized_error(sse, n);
        info!(
            termination = %termination,
            iterations,
            sse,
            normalized_error = error,
            "fit finished"
        );

        observer.on_snapshot(self.snapshot(SnapshotKind::Final, iterations, sse, n, &current, Precision::High));
        observer.on_progress(100);

        Ok(FitOutcome {
            termination,
            iterations,
            sse,
            normalized_error: error,
            parameters: current,
        })
    }

    /// Apply one damped step and evaluate the result
    fn trial(
        &self,
        current: &ParameterMap,
        active: &[ActiveParameter],
        hessian: &Array2<f64>,
        gradient: &Array1<f64>,
        lambda: f64,
        evaluator: &ResidualEvaluator<'a, M>,
    ) -> Result<(ParameterMap, Array1<f64>)> {
        let delta = damped_step(hessian, gradient, lambda)?;

        let mut candidate = current.clone();
        for (param, &step) in active.iter().zip(delta.iter()) {
            let value = current.get(&param.id).copied().unwrap_or(0.0);
            let mode = Perturbation::for_value(param.id, value, &self.config);
            let updated = param.bounds.clamp(mode.apply(value, step));
            if !updated.is_finite() {
                return Err(WellFitError::ParameterError(format!(
                    "step moved {} to a non-finite value",
                    param.id
                )));
            }
            candidate.insert(param.id, updated);
        }
        recompute_derived(&mut candidate);

        let residuals = evaluator.evaluate(&candidate)?;
        Ok((candidate, residuals))
    }

    fn snapshot(
        &self,
        kind: SnapshotKind,
        iteration: usize,
        sse: f64,
        residual_count: usize,
        params: &ParameterMap,
        precision: Precision,
    ) -> FitSnapshot {
        let curve = self
            .model
            .evaluate_with_precision(self.model_type, params, None, precision)
            .unwrap_or_else(|err| {
                warn!(error = %err, "model curve unavailable for snapshot");
                ModelCurve::default()
            });

        FitSnapshot {
            kind,
            iteration,
            sse,
            normalized_error: normalized_error(sse, residual_count),
            parameters: params.clone(),
            curve,
        }
    }
}

fn progress_percent(iteration: usize, max_iterations: usize) -> u8 {
    if max_iterations == 0 {
        return 100;
    }
    (iteration * 100 / max_iterations).min(100) as u8
}
