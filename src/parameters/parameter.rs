//! Fit parameter definition and implementation
//!
//! [`FitParameter`] is one row of the parameter table: a value, the flag saying
//! whether the optimizer may move it, its bounds and the increment used by
//! interactive adjustment. [`ParameterRecord`] is its persisted form and
//! [`ParameterRow`] the shape handed to report/export code.

use crate::parameters::bounds::{Bounds, BoundsError};
use crate::parameters::id::ParamId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur when working with parameters
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParameterError {
    #[error("Parameter '{id}' is derived and cannot be edited or fitted")]
    DerivedParameter { id: ParamId },

    #[error("Bounds error: {0}")]
    BoundsError(#[from] BoundsError),

    #[error("Parameter '{id}' not found")]
    ParameterNotFound { id: ParamId },

    #[error("Unknown parameter '{name}'")]
    UnknownParameter { name: String },

    #[error("Invalid step {step} for parameter '{id}'")]
    InvalidStep { id: ParamId, step: f64 },

    #[error("Parameter '{id}' holds several values and cannot be adjusted incrementally")]
    MultiValued { id: ParamId },
}

/// A parameter of the well-test model
#[derive(Debug, Clone, PartialEq)]
pub struct FitParameter {
    id: ParamId,
    value: f64,
    is_fit: bool,
    bounds: Bounds,
    step: f64,
    is_visible: bool,
}

impl FitParameter {
    /// Create a parameter from a forward-model default value.
    ///
    /// Bounds and step follow the default-value heuristics; derived parameters
    /// are left unbounded since their value is never user-controlled.
    ///
    /// # Examples
    ///
    /// ```
    /// use wellfit_rs::parameters::{FitParameter, ParamId};
    ///
    /// let p = FitParameter::new(ParamId::K, 10.0);
    /// assert_eq!(p.name(), "k");
    /// assert_eq!(p.min(), 0.1);
    /// assert_eq!(p.max(), 1000.0);
    /// assert!(!p.is_fit());
    /// ```
    pub fn new(id: ParamId, value: f64) -> Self {
        let bounds = if id.is_derived() {
            Bounds::unbounded()
        } else {
            Bounds::around_default(value)
        };

        Self {
            id,
            value,
            is_fit: false,
            bounds,
            step: id.default_step(value),
            is_visible: true,
        }
    }

    /// Create a parameter with explicit bounds; the value is clamped into them
    pub fn with_bounds(id: ParamId, value: f64, min: f64, max: f64) -> Result<Self, ParameterError> {
        let bounds = Bounds::new(min, max)?;
        let mut param = Self::new(id, value);
        param.bounds = bounds;
        param.value = bounds.clamp(value);
        Ok(param)
    }

    pub fn id(&self) -> ParamId {
        self.id
    }

    /// The persisted symbol, e.g. `"k"`
    pub fn name(&self) -> &'static str {
        self.id.symbol()
    }

    pub fn display_name(&self) -> &'static str {
        self.id.display_name()
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    /// Set a user-supplied value.
    ///
    /// Fails for derived parameters and for values outside `[min, max]`.
    pub fn set_value(&mut self, value: f64) -> Result<(), ParameterError> {
        self.ensure_editable()?;
        self.bounds.check(value)?;
        self.value = value;
        Ok(())
    }

    /// Set a value produced by computation, clipping it into the bounds.
    pub(crate) fn set_value_clamped(&mut self, value: f64) {
        self.value = self.bounds.clamp(value);
    }

    /// Overwrite a derived value; bounds do not apply.
    pub(crate) fn set_derived_value(&mut self, value: f64) {
        self.value = value;
    }

    pub fn is_fit(&self) -> bool {
        self.is_fit
    }

    /// Mark the parameter as (not) adjusted by the optimizer
    pub fn set_fit(&mut self, is_fit: bool) -> Result<(), ParameterError> {
        if is_fit {
            self.ensure_editable()?;
        }
        self.is_fit = is_fit;
        Ok(())
    }

    pub fn min(&self) -> f64 {
        self.bounds.min
    }

    pub fn max(&self) -> f64 {
        self.bounds.max
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    /// Replace the bounds, clamping the current value into them
    pub fn set_bounds(&mut self, min: f64, max: f64) -> Result<(), ParameterError> {
        let bounds = Bounds::new(min, max)?;
        self.bounds = bounds;
        if !self.id.is_derived() {
            self.value = bounds.clamp(self.value);
        }
        Ok(())
    }

    /// Increment used by interactive adjustment; ignored by the optimizer
    pub fn step(&self) -> f64 {
        self.step
    }

    pub fn set_step(&mut self, step: f64) -> Result<(), ParameterError> {
        if !step.is_finite() {
            return Err(ParameterError::InvalidStep { id: self.id, step });
        }
        self.step = step;
        Ok(())
    }

    pub fn is_visible(&self) -> bool {
        self.is_visible
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.is_visible = visible;
    }

    /// Snapshot of the persisted fields
    pub fn to_record(&self) -> ParameterRecord {
        ParameterRecord {
            name: self.name().to_string(),
            value: self.value,
            is_fit: self.is_fit,
            min: self.bounds.min,
            max: self.bounds.max,
            step: self.step,
            is_visible: self.is_visible,
        }
    }

    /// Overwrite this parameter from a persisted record with the same name.
    ///
    /// Derived parameters only take the presentation fields; their value is
    /// recomputed by the owner afterwards.
    pub fn apply_record(&mut self, record: &ParameterRecord) -> Result<(), ParameterError> {
        let bounds = Bounds::new(record.min, record.max)?;
        if !record.step.is_finite() {
            return Err(ParameterError::InvalidStep {
                id: self.id,
                step: record.step,
            });
        }

        self.step = record.step;
        self.is_visible = record.is_visible;
        if self.id.is_derived() {
            return Ok(());
        }

        self.bounds = bounds;
        self.value = bounds.clamp(record.value);
        self.is_fit = record.is_fit;
        Ok(())
    }

    /// Row for parameter export and reports
    pub fn to_row(&self) -> ParameterRow {
        ParameterRow {
            display_name: self.display_name().to_string(),
            symbol: self.name().to_string(),
            value: self.value,
            unit: self.id.unit().to_string(),
        }
    }

    fn ensure_editable(&self) -> Result<(), ParameterError> {
        if self.id.is_derived() {
            return Err(ParameterError::DerivedParameter { id: self.id });
        }
        Ok(())
    }
}

/// Persisted form of a [`FitParameter`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterRecord {
    pub name: String,
    pub value: f64,
    pub is_fit: bool,
    #[serde(with = "lower_bound")]
    pub min: f64,
    #[serde(with = "upper_bound")]
    pub max: f64,
    pub step: f64,
    #[serde(default = "default_visible")]
    pub is_visible: bool,
}

fn default_visible() -> bool {
    true
}

/// A fitted parameter as presented in exported tables
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParameterRow {
    pub display_name: String,
    pub symbol: String,
    pub value: f64,
    pub unit: String,
}

// JSON cannot carry infinities, so open bounds travel as null.
mod lower_bound {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            serializer.serialize_f64(*value)
        } else {
            serializer.serialize_none()
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NEG_INFINITY))
    }
}

mod upper_bound {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            serializer.serialize_f64(*value)
        } else {
            serializer.serialize_none()
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::INFINITY))
    }
}
