//! Forward-model collaborator.
//!
//! The physical well-test models are not part of this crate. They are consumed
//! through the [`ForwardModel`] trait: given a model type, a parameter map and
//! optionally the observation times, return the computed pressure change and
//! pressure derivative. Implementations must be deterministic and should report
//! invalid parameter combinations through `Err` or an empty curve rather than
//! panicking.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Result, WellFitError};
use crate::parameters::ParameterMap;

/// Interpretation model selected by the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum ModelType {
    #[default]
    Model1,
    Model2,
    Model3,
    Model4,
    Model5,
    Model6,
}

impl ModelType {
    pub const ALL: [ModelType; 6] = [
        ModelType::Model1,
        ModelType::Model2,
        ModelType::Model3,
        ModelType::Model4,
        ModelType::Model5,
        ModelType::Model6,
    ];

    /// Zero-based index, also the persisted representation
    pub fn index(self) -> u8 {
        match self {
            ModelType::Model1 => 0,
            ModelType::Model2 => 1,
            ModelType::Model3 => 2,
            ModelType::Model4 => 3,
            ModelType::Model5 => 4,
            ModelType::Model6 => 5,
        }
    }

    /// Resolve a model-selector code such as `"modelwidget3"`
    pub fn from_code(code: &str) -> Option<Self> {
        let n: u8 = code.strip_prefix("modelwidget")?.parse().ok()?;
        Self::try_from(n.checked_sub(1)?).ok()
    }
}

impl From<ModelType> for u8 {
    fn from(model: ModelType) -> u8 {
        model.index()
    }
}

impl TryFrom<u8> for ModelType {
    type Error = WellFitError;

    fn try_from(index: u8) -> Result<Self> {
        ModelType::ALL
            .get(usize::from(index))
            .copied()
            .ok_or_else(|| WellFitError::InvalidInput(format!("unknown model index {}", index)))
    }
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Model {}", self.index() + 1)
    }
}

/// Evaluation accuracy requested from the forward model.
///
/// Fitting iterations use [`Precision::Fast`]; curves shown after a fit
/// finishes use [`Precision::High`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Precision {
    Fast,
    #[default]
    High,
}

/// Computed type curve: aligned time, pressure change and derivative
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ModelCurve {
    pub time: Vec<f64>,
    pub pressure: Vec<f64>,
    pub derivative: Vec<f64>,
}

impl ModelCurve {
    pub fn new(time: Vec<f64>, pressure: Vec<f64>, derivative: Vec<f64>) -> Self {
        Self {
            time,
            pressure,
            derivative,
        }
    }

    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }
}

/// A deterministic well-test forward model
pub trait ForwardModel: Send + Sync {
    /// Compute the type curve for `params`.
    ///
    /// With `times == None` the model chooses its own time grid.
    fn evaluate(
        &self,
        model: ModelType,
        params: &ParameterMap,
        times: Option<&[f64]>,
    ) -> Result<ModelCurve>;

    /// Compute the type curve at a given accuracy.
    ///
    /// The default ignores the precision hint.
    fn evaluate_with_precision(
        &self,
        model: ModelType,
        params: &ParameterMap,
        times: Option<&[f64]>,
        precision: Precision,
    ) -> Result<ModelCurve> {
        let _ = precision;
        self.evaluate(model, params, times)
    }

    /// Default parameter values of a model; defines its parameter list
    fn default_parameters(&self, model: ModelType) -> ParameterMap;
}

/// Log-spaced grid `10^-4 .. 10^4`, ten points per decade
pub fn default_time_grid() -> Vec<f64> {
    (0..=80)
        .map(|i| 10f64.powf(-4.0 + f64::from(i) * 0.1))
        .collect()
}

/// Adapter turning a closure into a [`ForwardModel`].
///
/// The closure receives the model type, the parameters and the time grid
/// (the default grid when the caller passes none).
pub struct FnModel<F> {
    defaults: ParameterMap,
    func: F,
}

impl<F> FnModel<F>
where
    F: Fn(ModelType, &ParameterMap, &[f64]) -> Result<ModelCurve> + Send + Sync,
{
    /// Wrap `func`; every model type shares `defaults`
    pub fn new(defaults: ParameterMap, func: F) -> Self {
        Self { defaults, func }
    }
}

impl<F> ForwardModel for FnModel<F>
where
    F: Fn(ModelType, &ParameterMap, &[f64]) -> Result<ModelCurve> + Send + Sync,
{
    fn evaluate(
        &self,
        model: ModelType,
        params: &ParameterMap,
        times: Option<&[f64]>,
    ) -> Result<ModelCurve> {
        match times {
            Some(t) => (self.func)(model, params, t),
            None => (self.func)(model, params, &default_time_grid()),
        }
    }

    fn default_parameters(&self, _model: ModelType) -> ParameterMap {
        self.defaults.clone()
    }
}

impl<F> fmt::Debug for FnModel<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnModel")
            .field("defaults", &self.defaults)
            .finish_non_exhaustive()
    }
}
