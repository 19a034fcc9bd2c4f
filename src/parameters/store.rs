//! Parameter store
//!
//! [`ParameterStore`] owns the [`FitParameter`] list of the selected model.
//! All mutations go through it so that derived parameters are recomputed
//! after every change of their inputs.

use tracing::{debug, warn};

use super::derived::recompute_derived;
use super::id::ParamId;
use super::parameter::{FitParameter, ParameterError, ParameterRecord, ParameterRow};
use super::sensitivity::{first_value, RawTexts};
use super::ParameterMap;

/// The parameters of the currently selected model, in canonical order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterStore {
    params: Vec<FitParameter>,
}

impl ParameterStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the parameter list for a model from its default values
    ///
    /// # Examples
    ///
    /// ```
    /// use wellfit_rs::parameters::{ParamId, ParameterMap, ParameterStore};
    ///
    /// let defaults: ParameterMap = [(ParamId::K, 10.0), (ParamId::S, 0.0)].into_iter().collect();
    /// let store = ParameterStore::from_defaults(&defaults);
    /// assert_eq!(store.len(), 2);
    /// assert!(store.active_ids().is_empty());
    /// ```
    pub fn from_defaults(defaults: &ParameterMap) -> Self {
        let mut store = Self {
            params: defaults
                .iter()
                .map(|(&id, &value)| FitParameter::new(id, value))
                .collect(),
        };
        store.recompute_derived();
        store
    }

    /// Discard every edit and rebuild from `defaults`
    pub fn reset(&mut self, defaults: &ParameterMap) {
        *self = Self::from_defaults(defaults);
    }

    /// Rebuild for another model, keeping the values of shared parameters
    pub fn switch_model(&mut self, defaults: &ParameterMap) {
        let previous = self.to_map();
        *self = Self::from_defaults(defaults);
        for param in self.params.iter_mut() {
            if param.id().is_derived() {
                continue;
            }
            if let Some(&value) = previous.get(&param.id()) {
                param.set_value_clamped(value);
            }
        }
        self.recompute_derived();
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FitParameter> {
        self.params.iter()
    }

    pub fn as_slice(&self) -> &[FitParameter] {
        &self.params
    }

    pub fn get(&self, id: ParamId) -> Option<&FitParameter> {
        self.params.iter().find(|p| p.id() == id)
    }

    pub fn contains(&self, id: ParamId) -> bool {
        self.get(id).is_some()
    }

    fn get_mut(&mut self, id: ParamId) -> Result<&mut FitParameter, ParameterError> {
        self.params
            .iter_mut()
            .find(|p| p.id() == id)
            .ok_or(ParameterError::ParameterNotFound { id })
    }

    /// Set a user value; fails outside `[min, max]` or for derived parameters
    pub fn set_value(&mut self, id: ParamId, value: f64) -> Result<(), ParameterError> {
        self.get_mut(id)?.set_value(value)?;
        self.recompute_derived();
        Ok(())
    }

    pub fn set_fit(&mut self, id: ParamId, is_fit: bool) -> Result<(), ParameterError> {
        self.get_mut(id)?.set_fit(is_fit)
    }

    pub fn set_bounds(&mut self, id: ParamId, min: f64, max: f64) -> Result<(), ParameterError> {
        self.get_mut(id)?.set_bounds(min, max)?;
        self.recompute_derived();
        Ok(())
    }

    pub fn set_step(&mut self, id: ParamId, step: f64) -> Result<(), ParameterError> {
        self.get_mut(id)?.set_step(step)
    }

    pub fn set_visible(&mut self, id: ParamId, visible: bool) -> Result<(), ParameterError> {
        self.get_mut(id)?.set_visible(visible);
        Ok(())
    }

    /// Move a parameter by `steps` increments, clipped into its bounds.
    ///
    /// Returns the new value.
    pub fn nudge(&mut self, id: ParamId, steps: i32) -> Result<f64, ParameterError> {
        let param = self.get_mut(id)?;
        if param.id().is_derived() {
            return Err(ParameterError::DerivedParameter { id });
        }
        let target = param.value() + f64::from(steps) * param.step();
        param.set_value_clamped(target);
        let value = param.value();
        self.recompute_derived();
        Ok(value)
    }

    /// Ids of the fit-enabled parameters, in order
    pub fn active_ids(&self) -> Vec<ParamId> {
        self.params
            .iter()
            .filter(|p| p.is_fit())
            .map(|p| p.id())
            .collect()
    }

    /// Positions of the fit-enabled parameters in [`as_slice`](Self::as_slice)
    pub fn active_indices(&self) -> Vec<usize> {
        self.params
            .iter()
            .enumerate()
            .filter(|(_, p)| p.is_fit())
            .map(|(i, _)| i)
            .collect()
    }

    /// Visible parameters, fit-enabled ones first
    pub fn display_order(&self) -> Vec<&FitParameter> {
        let visible = self.params.iter().filter(|p| p.is_visible());
        visible
            .clone()
            .filter(|p| p.is_fit())
            .chain(visible.filter(|p| !p.is_fit()))
            .collect()
    }

    /// Current values as a map, derived values included
    pub fn to_map(&self) -> ParameterMap {
        self.params.iter().map(|p| (p.id(), p.value())).collect()
    }

    /// Take values from a map (e.g. an optimizer snapshot).
    ///
    /// Values are clipped into bounds, derived entries are ignored and then
    /// recomputed, and ids not in the store are skipped.
    pub fn apply_map(&mut self, map: &ParameterMap) {
        for param in self.params.iter_mut() {
            if param.id().is_derived() {
                continue;
            }
            if let Some(&value) = map.get(&param.id()) {
                param.set_value_clamped(value);
            }
        }
        self.recompute_derived();
    }

    /// Commit table text: each parameter takes the first number of its text.
    ///
    /// Text without a valid number sets 0.0; out-of-range values are clipped.
    pub fn apply_raw_texts(&mut self, texts: &RawTexts) {
        for param in self.params.iter_mut() {
            if param.id().is_derived() {
                continue;
            }
            let Some(text) = texts.get(&param.id()) else {
                continue;
            };
            let value = first_value(text).unwrap_or(0.0);
            if !param.bounds().is_within_bounds(value) {
                warn!(parameter = %param.id(), value, "value outside bounds, clipped");
            }
            param.set_value_clamped(value);
        }
        self.recompute_derived();
    }

    /// Values formatted as table text
    pub fn raw_texts(&self) -> RawTexts {
        self.params
            .iter()
            .map(|p| (p.id(), format!("{}", p.value())))
            .collect()
    }

    /// Persisted form of every parameter
    pub fn records(&self) -> Vec<ParameterRecord> {
        self.params.iter().map(FitParameter::to_record).collect()
    }

    /// Restore persisted fields by name.
    ///
    /// Unknown names are skipped; derived values are recomputed rather than
    /// taken from the records.
    pub fn restore_records(&mut self, records: &[ParameterRecord]) -> Result<(), ParameterError> {
        for record in records {
            let Ok(id) = record.name.parse::<ParamId>() else {
                debug!(name = %record.name, "skipping unknown persisted parameter");
                continue;
            };
            match self.params.iter_mut().find(|p| p.id() == id) {
                Some(param) => param.apply_record(record)?,
                None => debug!(parameter = %id, "persisted parameter not used by model"),
            }
        }
        self.recompute_derived();
        Ok(())
    }

    /// Export rows for reports
    pub fn export_rows(&self) -> Vec<ParameterRow> {
        self.params.iter().map(FitParameter::to_row).collect()
    }

    fn recompute_derived(&mut self) {
        let mut map = self.to_map();
        recompute_derived(&mut map);
        for param in self.params.iter_mut().filter(|p| p.id().is_derived()) {
            if let Some(&value) = map.get(&param.id()) {
                param.set_derived_value(value);
            }
        }
    }
}
