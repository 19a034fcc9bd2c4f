//! Residual evaluation.
//!
//! The fit compares observed and computed curves in log space. The residual
//! vector holds the weighted pressure residuals first and the weighted
//! derivative residuals after them; the Jacobian rows follow the same layout.

use ndarray::Array1;

use crate::data::ObservedData;
use crate::error::Result;
use crate::model::{ForwardModel, ModelType, Precision};
use crate::parameters::ParameterMap;

/// Values at or below this are excluded from the log comparison
pub const LOG_EPSILON: f64 = 1e-10;

/// Relative weight of the pressure and derivative curves.
///
/// The user picks a percentage in `[0, 100]`; the pressure curve gets `w` and
/// the derivative curve `1 - w`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitWeight(f64);

impl FitWeight {
    /// From a UI percentage; values above 100 are treated as 100
    pub fn from_percent(percent: u8) -> Self {
        Self(f64::from(percent.min(100)) / 100.0)
    }

    /// From a fraction, clamped into `[0, 1]`; NaN maps to an even split
    pub fn from_fraction(fraction: f64) -> Self {
        if fraction.is_nan() {
            return Self::default();
        }
        Self(fraction.clamp(0.0, 1.0))
    }

    pub fn pressure(self) -> f64 {
        self.0
    }

    pub fn derivative(self) -> f64 {
        1.0 - self.0
    }

    pub fn percent(self) -> u8 {
        (self.0 * 100.0).round() as u8
    }
}

impl Default for FitWeight {
    fn default() -> Self {
        Self(0.5)
    }
}

fn log_residual(observed: f64, computed: f64, weight: f64) -> f64 {
    if observed > LOG_EPSILON && computed > LOG_EPSILON {
        (observed.ln() - computed.ln()) * weight
    } else {
        0.0
    }
}

/// Builds residual vectors for one dataset, model and weight
pub struct ResidualEvaluator<'a, M: ForwardModel + ?Sized> {
    model: &'a M,
    model_type: ModelType,
    observed: &'a ObservedData,
    weight: FitWeight,
    precision: Precision,
}

impl<'a, M: ForwardModel + ?Sized> ResidualEvaluator<'a, M> {
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
            precision: Precision::High,
        }
    }

    /// Evaluation accuracy requested from the forward model
    pub fn with_precision(mut self, precision: Precision) -> Self {
        self.precision = precision;
        self
    }

    pub fn weight(&self) -> FitWeight {
        self.weight
    }

    /// Residuals of `params` against the observed data.
    ///
    /// Pressure residuals cover `min(observed, computed)` points; derivative
    /// residuals cover `min(observed, computed, pressure count)` points.
    pub fn evaluate(&self, params: &ParameterMap) -> Result<Array1<f64>> {
        let curve = self.model.evaluate_with_precision(
            self.model_type,
            params,
            Some(self.observed.time()),
            self.precision,
        )?;

        let obs_p = self.observed.pressure();
        let obs_d = self.observed.derivative();
        let wp = self.weight.pressure();
        let wd = self.weight.derivative();

        let p_count = obs_p.len().min(curve.pressure.len());
        let d_count = obs_d.len().min(curve.derivative.len()).min(p_count);

        let pressure = obs_p
            .iter()
            .zip(&curve.pressure)
            .take(p_count)
            .map(|(&o, &c)| log_residual(o, c, wp));
        let derivative = obs_d
            .iter()
            .zip(&curve.derivative)
            .take(d_count)
            .map(|(&o, &c)| log_residual(o, c, wd));

        Ok(pressure.chain(derivative).collect())
    }
}

/// Sum of squared residuals
pub fn sum_squared_error(residuals: &Array1<f64>) -> f64 {
    residuals.dot(residuals)
}

/// `SSE / n`, infinite for an empty residual vector
pub fn normalized_error(sse: f64, residual_count: usize) -> f64 {
    if residual_count == 0 {
        f64::INFINITY
    } else {
        sse / residual_count as f64
    }
}
