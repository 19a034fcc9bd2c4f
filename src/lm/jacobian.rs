//! Numerical Jacobian of the residual vector.
//!
//! Each active parameter is perturbed in both directions and the column is the
//! central difference of the two residual vectors. Positive parameters are
//! perturbed in log space so that quantities spanning several decades
//! (permeability, storage, ...) get a step proportional to their magnitude.
//! Columns are independent and are computed in parallel with Rayon.

use ndarray::{Array1, Array2};
use rayon::prelude::*;
use tracing::debug;

use crate::model::ForwardModel;
use crate::parameters::{feeds_derived, recompute_derived, ParamId, ParameterMap};

use super::config::LmConfig;
use super::residuals::ResidualEvaluator;

/// How a parameter is perturbed and updated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Perturbation {
    /// Steps are taken in `log10(value)`
    Log,
    /// Steps are added to the value
    Linear,
}

impl Perturbation {
    /// Mode for parameter `id` currently at `value`
    pub fn for_value(id: ParamId, value: f64, config: &LmConfig) -> Self {
        if value > config.log_threshold && !id.is_linear_only() {
            Perturbation::Log
        } else {
            Perturbation::Linear
        }
    }

    /// Finite-difference step `h` in the mode's coordinate
    pub fn step(self, config: &LmConfig) -> f64 {
        match self {
            Perturbation::Log => config.log_step,
            Perturbation::Linear => config.linear_step,
        }
    }

    /// Move `value` by `delta` in the mode's coordinate
    pub fn apply(self, value: f64, delta: f64) -> f64 {
        match self {
            Perturbation::Log => 10f64.powf(value.log10() + delta),
            Perturbation::Linear => value + delta,
        }
    }
}

/// Finite-difference Jacobian of a [`ResidualEvaluator`]
pub struct JacobianBuilder<'a, 'b, M: ForwardModel + ?Sized> {
    evaluator: &'b ResidualEvaluator<'a, M>,
    config: &'b LmConfig,
}

impl<'a, 'b, M: ForwardModel + ?Sized> JacobianBuilder<'a, 'b, M> {
    pub fn new(evaluator: &'b ResidualEvaluator<'a, M>, config: &'b LmConfig) -> Self {
        Self { evaluator, config }
    }

    /// Jacobian `[residual count × active count]` at `params`.
    ///
    /// A column whose perturbed evaluations fail or change the residual
    /// length is left as zeros.
    pub fn build(&self, params: &ParameterMap, base: &Array1<f64>, active: &[ParamId]) -> Array2<f64> {
        let n_res = base.len();
        let columns: Vec<Option<Array1<f64>>> = active
            .par_iter()
            .map(|&id| self.column(params, id, n_res))
            .collect();

        let mut jac = Array2::zeros((n_res, active.len()));
        for (j, column) in columns.into_iter().enumerate() {
            if let Some(column) = column {
                jac.column_mut(j).assign(&column);
            }
        }
        jac
    }

    fn column(&self, params: &ParameterMap, id: ParamId, n_res: usize) -> Option<Array1<f64>> {
        let value = params.get(&id).copied().unwrap_or(0.0);
        let mode = Perturbation::for_value(id, value, self.config);
        let h = mode.step(self.config);

        let mut plus = params.clone();
        let mut minus = params.clone();
        plus.insert(id, mode.apply(value, h));
        minus.insert(id, mode.apply(value, -h));

        if feeds_derived(id) {
            recompute_derived(&mut plus);
            recompute_derived(&mut minus);
        }

        let r_plus = self.evaluator.evaluate(&plus);
        let r_minus = self.evaluator.evaluate(&minus);

        match (r_plus, r_minus) {
            (Ok(rp), Ok(rm)) if rp.len() == n_res && rm.len() == n_res => {
                Some((rp - rm) / (2.0 * h))
            }
            (Ok(rp), Ok(rm)) => {
                debug!(parameter = %id, expected = n_res, plus = rp.len(), minus = rm.len(), "residual length changed, zero column");
                None
            }
            (Err(err), _) | (_, Err(err)) => {
                debug!(parameter = %id, error = %err, "perturbed evaluation failed, zero column");
                None
            }
        }
    }
}
