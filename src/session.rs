//! Fitting session.
//!
//! [`FittingSession`] is the state behind one fitting window: the selected
//! model and its parameter table, the observed data, the pressure/derivative
//! weight and at most one background fit. The fit runs on its own thread with
//! owned copies of everything it needs; the session applies the snapshots it
//! sends back when [`FittingSession::poll_events`] or [`FittingSession::wait`]
//! is called, so the parameter table is only ever touched from the caller's
//! thread.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use wellfit_rs::data::ObservedData;
//! use wellfit_rs::model::{FnModel, ModelCurve};
//! use wellfit_rs::parameters::{ParamId, ParameterMap};
//! use wellfit_rs::session::FittingSession;
//!
//! let defaults: ParameterMap = [(ParamId::K, 10.0)].into_iter().collect();
//! let model = FnModel::new(defaults, |_, p, t| {
//!     let k = p[&ParamId::K];
//!     Ok(ModelCurve::new(
//!         t.to_vec(),
//!         t.iter().map(|x| k * x).collect(),
//!         t.iter().map(|x| k * x).collect(),
//!     ))
//! });
//!
//! let mut session = FittingSession::new(Arc::new(model));
//! let time: Vec<f64> = (1..=10).map(f64::from).collect();
//! let pressure: Vec<f64> = time.iter().map(|t| 40.0 * t).collect();
//! session
//!     .set_observed(ObservedData::new(time, pressure.clone(), pressure).unwrap())
//!     .unwrap();
//! session.set_fit(ParamId::K, true).unwrap();
//!
//! session.start_fit().unwrap();
//! let outcome = session.wait().unwrap().unwrap();
//! assert!(outcome.is_converged());
//! assert!((session.store().get(ParamId::K).unwrap().value() - 40.0).abs() < 2.0);
//! ```

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, Receiver, TryRecvError};
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{debug, info, warn};

use crate::data::ObservedData;
use crate::error::{Result, WellFitError};
use crate::lm::{
    normalized_error, sum_squared_error, FitEvent, FitOutcome, FitSnapshot, FitState, FitWeight,
    LmConfig, LmController, ResidualEvaluator,
};
use crate::model::{ForwardModel, ModelCurve, ModelType};
use crate::parameters::sensitivity::is_multi_valued;
use crate::parameters::{
    parse_raw_texts, parse_values, ParamId, ParameterError, ParameterRecord, ParameterRow, ParameterStore,
    ParsedInput, RawTexts,
};
use crate::sensitivity::{CurveHandle, SweepCurve, SweepGenerator};

/// Persisted session state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "PersistedState")]
pub struct FittingState {
    pub model_type: ModelType,
    /// Pressure weight in percent
    pub fit_weight: u8,
    pub parameters: Vec<ParameterRecord>,
    pub observed: ObservedData,
}

impl FittingState {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// On-disk layout, including the older fractional weight
#[derive(Deserialize)]
struct PersistedState {
    #[serde(default)]
    model_type: ModelType,
    fit_weight: Option<u8>,
    fit_weight_fraction: Option<f64>,
    #[serde(default)]
    parameters: Vec<ParameterRecord>,
    #[serde(default)]
    observed: ObservedData,
}

impl From<PersistedState> for FittingState {
    fn from(state: PersistedState) -> Self {
        let weight = match (state.fit_weight, state.fit_weight_fraction) {
            (Some(percent), _) => FitWeight::from_percent(percent),
            (None, Some(fraction)) => FitWeight::from_fraction(fraction),
            (None, None) => FitWeight::default(),
        };
        FittingState {
            model_type: state.model_type,
            fit_weight: weight.percent(),
            parameters: state.parameters,
            observed: state.observed,
        }
    }
}

/// Result of redrawing the model curve
#[derive(Debug, Clone, PartialEq)]
pub enum CurveUpdate {
    /// One curve for the current parameters
    Single {
        handle: CurveHandle,
        curve: ModelCurve,
        /// `SSE / residual count` against the observed data, if any is loaded
        normalized_error: Option<f64>,
    },
    /// One curve per value of the swept parameter
    Sweep { parameter: ParamId, curves: Vec<SweepCurve> },
}

/// The background fit owned by a session
struct FitTask {
    cancel: Arc<AtomicBool>,
    events: Receiver<FitEvent>,
    handle: JoinHandle<Result<FitOutcome>>,
}

/// Parameter table, data and fit lifecycle of one fitting window
pub struct FittingSession {
    model: Arc<dyn ForwardModel>,
    model_type: ModelType,
    store: ParameterStore,
    raw_texts: RawTexts,
    observed: ObservedData,
    weight: FitWeight,
    config: LmConfig,
    state: FitState,
    progress: u8,
    task: Option<FitTask>,
    last_snapshot: Option<FitSnapshot>,
    last_outcome: Option<FitOutcome>,
    next_handle: u64,
}

impl FittingSession {
    /// Session for the default model type with its default parameters
    pub fn new(model: Arc<dyn ForwardModel>) -> Self {
        let model_type = ModelType::default();
        let store = ParameterStore::from_defaults(&model.default_parameters(model_type));
        let raw_texts = store.raw_texts();
        Self {
            model,
            model_type,
            store,
            raw_texts,
            observed: ObservedData::default(),
            weight: FitWeight::default(),
            config: LmConfig::default(),
            state: FitState::Init,
            progress: 0,
            task: None,
            last_snapshot: None,
            last_outcome: None,
            next_handle: 0,
        }
    }

    /// Configuration used by subsequent fits
    pub fn with_config(mut self, config: LmConfig) -> Self {
        self.config = config;
        self
    }

    pub fn model_type(&self) -> ModelType {
        self.model_type
    }

    pub fn store(&self) -> &ParameterStore {
        &self.store
    }

    pub fn raw_texts(&self) -> &RawTexts {
        &self.raw_texts
    }

    pub fn observed(&self) -> &ObservedData {
        &self.observed
    }

    pub fn weight(&self) -> FitWeight {
        self.weight
    }

    pub fn fit_state(&self) -> FitState {
        self.state
    }

    /// Last reported progress percentage
    pub fn progress(&self) -> u8 {
        self.progress
    }

    pub fn last_snapshot(&self) -> Option<&FitSnapshot> {
        self.last_snapshot.as_ref()
    }

    pub fn last_outcome(&self) -> Option<&FitOutcome> {
        self.last_outcome.as_ref()
    }

    pub fn is_fitting(&self) -> bool {
        self.task.is_some()
    }

    fn ensure_idle(&self) -> Result<()> {
        if self.is_fitting() {
            Err(WellFitError::FitInProgress)
        } else {
            Ok(())
        }
    }

    /// Switch model, keeping the values of parameters both models share
    pub fn select_model(&mut self, model_type: ModelType) -> Result<()> {
        self.ensure_idle()?;
        if model_type != self.model_type {
            self.store
                .switch_model(&self.model.default_parameters(model_type));
            self.model_type = model_type;
            self.raw_texts = self.store.raw_texts();
            debug!(model = %model_type, parameters = self.store.len(), "model selected");
        }
        Ok(())
    }

    /// Restore the default parameters of the current model
    pub fn reset_params(&mut self) -> Result<()> {
        self.ensure_idle()?;
        self.store
            .reset(&self.model.default_parameters(self.model_type));
        self.raw_texts = self.store.raw_texts();
        Ok(())
    }

    pub fn set_observed(&mut self, observed: ObservedData) -> Result<()> {
        self.ensure_idle()?;
        self.observed = observed;
        Ok(())
    }

    /// Pressure weight in percent; the derivative gets the rest
    pub fn set_fit_weight_percent(&mut self, percent: u8) {
        self.weight = FitWeight::from_percent(percent);
    }

    /// Edit a parameter's table text.
    ///
    /// The parameter takes the first number of the text, clipped into its
    /// bounds. A list keeps its text so that it can be swept.
    pub fn set_raw_text(&mut self, id: ParamId, text: &str) -> Result<()> {
        self.ensure_idle()?;
        let param = self
            .store
            .get(id)
            .ok_or(ParameterError::ParameterNotFound { id })?;
        if param.id().is_derived() {
            return Err(ParameterError::DerivedParameter { id }.into());
        }

        let single: RawTexts = [(id, text.to_string())].into_iter().collect();
        self.store.apply_raw_texts(&single);
        if is_multi_valued(text) {
            self.raw_texts.insert(id, text.to_string());
        } else {
            self.sync_raw_text(id);
        }
        self.sync_derived_texts();
        Ok(())
    }

    pub fn set_value(&mut self, id: ParamId, value: f64) -> Result<()> {
        self.ensure_idle()?;
        self.store.set_value(id, value)?;
        self.sync_raw_text(id);
        self.sync_derived_texts();
        Ok(())
    }

    pub fn set_fit(&mut self, id: ParamId, is_fit: bool) -> Result<()> {
        self.ensure_idle()?;
        Ok(self.store.set_fit(id, is_fit)?)
    }

    pub fn set_bounds(&mut self, id: ParamId, min: f64, max: f64) -> Result<()> {
        self.ensure_idle()?;
        self.store.set_bounds(id, min, max)?;
        self.sync_raw_text(id);
        self.sync_derived_texts();
        Ok(())
    }

    pub fn set_step(&mut self, id: ParamId, step: f64) -> Result<()> {
        self.ensure_idle()?;
        Ok(self.store.set_step(id, step)?)
    }

    pub fn set_visible(&mut self, id: ParamId, visible: bool) -> Result<()> {
        self.ensure_idle()?;
        Ok(self.store.set_visible(id, visible)?)
    }

    /// Wheel adjustment by `steps` increments; refused for list text
    pub fn nudge(&mut self, id: ParamId, steps: i32) -> Result<f64> {
        self.ensure_idle()?;
        if self.raw_texts.get(&id).is_some_and(|t| is_multi_valued(t)) {
            return Err(ParameterError::MultiValued { id }.into());
        }
        let value = self.store.nudge(id, steps)?;
        self.sync_raw_text(id);
        self.sync_derived_texts();
        Ok(value)
    }

    /// Parse the current table text
    pub fn parsed_input(&self) -> ParsedInput {
        parse_raw_texts(&self.raw_texts)
    }

    pub fn is_sensitivity_mode(&self) -> bool {
        self.raw_texts.values().any(|t| parse_values(t).len() > 1)
    }

    /// Whether the start-fit control should be enabled
    pub fn fit_start_enabled(&self) -> bool {
        !self.is_fitting() && !self.is_sensitivity_mode()
    }

    /// Start a background fit.
    ///
    /// Refused while a fit is running, without observed data, or while a
    /// parameter holds a list of values.
    pub fn start_fit(&mut self) -> Result<()> {
        if self.is_fitting() {
            warn!("fit already in progress, start ignored");
            return Err(WellFitError::FitInProgress);
        }
        if self.observed.is_empty() {
            warn!("no observed data loaded, fit not started");
            return Err(WellFitError::EmptyDataset);
        }
        if let Some(sweep) = self.parsed_input().sweep {
            warn!(parameter = %sweep.id, "sensitivity sweep active, fit not started");
            return Err(WellFitError::SensitivityModeActive(sweep.id.symbol().to_string()));
        }

        self.store.apply_raw_texts(&self.raw_texts);
        self.raw_texts = self.store.raw_texts();

        let cancel = Arc::new(AtomicBool::new(false));
        let (tx, rx) = channel();

        let model = Arc::clone(&self.model);
        let model_type = self.model_type;
        let observed = self.observed.clone();
        let params = self.store.as_slice().to_vec();
        let weight = self.weight;
        let config = self.config.clone();
        let worker_cancel = Arc::clone(&cancel);

        let handle = std::thread::Builder::new()
            .name("wellfit-lm".to_string())
            .spawn(move || {
                let mut sink = tx;
                let controller = LmController::new(model.as_ref(), model_type, &observed, weight)
                    .with_config(config);
                let result = controller.run(&params, &worker_cancel, &mut sink);
                let _ = sink.send(FitEvent::Finished);
                result
            })
            .map_err(|err| WellFitError::TaskFailed(err.to_string()))?;

        info!(
            model = %self.model_type,
            active = self.store.active_ids().len(),
            points = self.observed.len(),
            "fit started"
        );
        self.task = Some(FitTask {
            cancel,
            events: rx,
            handle,
        });
        self.state = FitState::Iterating;
        self.progress = 0;
        self.last_snapshot = None;
        Ok(())
    }

    /// Ask the running fit to stop at its next iteration boundary.
    ///
    /// Returns false when no fit is running.
    pub fn stop_fit(&self) -> bool {
        match &self.task {
            Some(task) => {
                task.cancel.store(true, Ordering::Relaxed);
                debug!("cancellation requested");
                true
            }
            None => false,
        }
    }

    /// Apply every event received so far and return them.
    ///
    /// When the fit has finished its thread is joined; an error raised by the
    /// fit is returned here.
    pub fn poll_events(&mut self) -> Result<Vec<FitEvent>> {
        let Some(task) = self.task.take() else {
            return Ok(Vec::new());
        };

        let mut events = Vec::new();
        let mut finished = false;
        loop {
            match task.events.try_recv() {
                Ok(event) => {
                    finished = matches!(event, FitEvent::Finished);
                    self.apply_event(&event);
                    events.push(event);
                    if finished {
                        break;
                    }
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    finished = true;
                    break;
                }
            }
        }

        if finished {
            self.join(task)?;
        } else {
            self.task = Some(task);
        }
        Ok(events)
    }

    /// Block until the running fit finishes, applying its events.
    ///
    /// Returns `None` when no fit was running.
    pub fn wait(&mut self) -> Result<Option<FitOutcome>> {
        let Some(task) = self.task.take() else {
            return Ok(None);
        };
        while let Ok(event) = task.events.recv() {
            let finished = matches!(event, FitEvent::Finished);
            self.apply_event(&event);
            if finished {
                break;
            }
        }
        self.join(task).map(Some)
    }

    fn apply_event(&mut self, event: &FitEvent) {
        match event {
            FitEvent::Progress(percent) => self.progress = self.progress.max(*percent),
            FitEvent::Snapshot(snapshot) => {
                self.store.apply_map(&snapshot.parameters);
                self.raw_texts = self.store.raw_texts();
                self.last_snapshot = Some(snapshot.clone());
            }
            FitEvent::Finished => {}
        }
    }

    fn join(&mut self, task: FitTask) -> Result<FitOutcome> {
        let joined = task
            .handle
            .join()
            .map_err(|_| WellFitError::TaskFailed("fitting thread panicked".to_string()));

        match joined.and_then(|result| result) {
            Ok(outcome) => {
                self.store.apply_map(&outcome.parameters);
                self.raw_texts = self.store.raw_texts();
                self.state = FitState::Done(outcome.termination);
                self.progress = 100;
                self.last_outcome = Some(outcome.clone());
                Ok(outcome)
            }
            Err(err) => {
                warn!(error = %err, "fit failed");
                self.state = FitState::Init;
                Err(err)
            }
        }
    }

    /// Recompute the model curve for the current table.
    ///
    /// With a list of values on some parameter this produces one curve per
    /// value; otherwise a single curve and, when data is loaded, its error.
    pub fn update_model_curve(&mut self) -> Result<CurveUpdate> {
        let parsed = self.parsed_input();

        if let Some(sweep) = &parsed.sweep {
            let generator = SweepGenerator::new(self.model.as_ref(), self.model_type);
            let mut next = self.next_handle;
            let curves = generator.generate(sweep, &parsed.base, self.observed.time(), || {
                next += 1;
                CurveHandle(next)
            });
            self.next_handle = next;
            info!(parameter = %sweep.id, values = sweep.values.len(), "sensitivity sweep drawn");
            return Ok(CurveUpdate::Sweep {
                parameter: sweep.id,
                curves,
            });
        }

        let times = (!self.observed.is_empty()).then(|| self.observed.time());
        let curve = self.model.evaluate(self.model_type, &parsed.base, times)?;

        let normalized_error = if self.observed.is_empty() {
            None
        } else {
            let evaluator =
                ResidualEvaluator::new(self.model.as_ref(), self.model_type, &self.observed, self.weight);
            let residuals = evaluator.evaluate(&parsed.base)?;
            Some(normalized_error(sum_squared_error(&residuals), residuals.len()))
        };

        Ok(CurveUpdate::Single {
            handle: self.allocate_handle(),
            curve,
            normalized_error,
        })
    }

    fn allocate_handle(&mut self) -> CurveHandle {
        self.next_handle += 1;
        CurveHandle(self.next_handle)
    }

    /// Rows for parameter export
    pub fn export_rows(&self) -> Vec<ParameterRow> {
        self.store.export_rows()
    }

    /// Snapshot of everything that is persisted
    pub fn save_state(&self) -> FittingState {
        FittingState {
            model_type: self.model_type,
            fit_weight: self.weight.percent(),
            parameters: self.store.records(),
            observed: self.observed.clone(),
        }
    }

    /// Restore persisted state; derived values are recomputed
    pub fn load_state(&mut self, state: &FittingState) -> Result<()> {
        self.ensure_idle()?;
        let mut store =
            ParameterStore::from_defaults(&self.model.default_parameters(state.model_type));
        store.restore_records(&state.parameters)?;

        self.model_type = state.model_type;
        self.store = store;
        self.raw_texts = self.store.raw_texts();
        self.observed = state.observed.clone();
        self.weight = FitWeight::from_percent(state.fit_weight);
        self.state = FitState::Init;
        self.last_snapshot = None;
        self.last_outcome = None;
        Ok(())
    }

    fn sync_raw_text(&mut self, id: ParamId) {
        if let Some(param) = self.store.get(id) {
            self.raw_texts.insert(id, format!("{}", param.value()));
        }
    }

    fn sync_derived_texts(&mut self) {
        let derived: Vec<ParamId> = self
            .store
            .iter()
            .map(|p| p.id())
            .filter(|id| id.is_derived())
            .collect();
        for id in derived {
            self.sync_raw_text(id);
        }
    }
}

impl Drop for FittingSession {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.cancel.store(true, Ordering::Relaxed);
            let _ = task.handle.join();
        }
    }
}

impl std::fmt::Debug for FittingSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FittingSession")
            .field("model_type", &self.model_type)
            .field("store", &self.store)
            .field("weight", &self.weight)
            .field("state", &self.state)
            .field("fitting", &self.is_fitting())
            .finish_non_exhaustive()
    }
}
