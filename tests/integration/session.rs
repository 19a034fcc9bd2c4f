//! Background fits, cancellation and persisted state

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use approx::assert_relative_eq;
use wellfit_rs::error::Result;
use wellfit_rs::lm::{FitEvent, FitState, LmConfig, Termination};
use wellfit_rs::model::{ForwardModel, ModelCurve, ModelType};
use wellfit_rs::parameters::{ParamId, ParameterMap};
use wellfit_rs::session::{FittingSession, FittingState};
use wellfit_rs::WellFitError;

use crate::test_helpers::{shared_model, synthetic_data, StorageSkinModel};

/// Synthetic model that takes a while per evaluation
struct SlowModel(Duration);

impl ForwardModel for SlowModel {
    fn evaluate(
        &self,
        model: ModelType,
        params: &ParameterMap,
        times: Option<&[f64]>,
    ) -> Result<ModelCurve> {
        thread::sleep(self.0);
        StorageSkinModel.evaluate(model, params, times)
    }

    fn default_parameters(&self, model: ModelType) -> ParameterMap {
        StorageSkinModel.default_parameters(model)
    }
}

fn fitting_session() -> FittingSession {
    let mut session = FittingSession::new(shared_model());
    session.set_observed(synthetic_data(40)).unwrap();
    session.set_value(ParamId::C, 0.1).unwrap();
    session.set_value(ParamId::S, 2.0).unwrap();
    session.set_fit(ParamId::K, true).unwrap();
    session
}

#[test]
fn test_polling_applies_snapshots() {
    let mut session = fitting_session();
    session.start_fit().unwrap();
    assert_eq!(session.fit_state(), FitState::Iterating);

    let mut events = Vec::new();
    for _ in 0..10_000 {
        events.extend(session.poll_events().unwrap());
        if !session.is_fitting() {
            break;
        }
        thread::sleep(Duration::from_millis(1));
    }
    assert!(!session.is_fitting());
    assert_eq!(events.last(), Some(&FitEvent::Finished));

    let progress: Vec<u8> = events
        .iter()
        .filter_map(|e| match e {
            FitEvent::Progress(p) => Some(*p),
            _ => None,
        })
        .collect();
    assert!(progress.windows(2).all(|w| w[0] <= w[1]));

    let outcome = session.last_outcome().unwrap().clone();
    assert_eq!(session.fit_state(), FitState::Done(outcome.termination));
    let k = session.store().get(ParamId::K).unwrap().value();
    assert_eq!(k, outcome.parameters[&ParamId::K]);
    assert_eq!(
        session.last_snapshot().unwrap().parameters[&ParamId::K],
        k
    );
    assert!((k - 50.0).abs() < 40.0);
}

#[test]
fn test_second_start_rejected_while_running() {
    let mut session = FittingSession::new(Arc::new(SlowModel(Duration::from_millis(5))));
    session.set_observed(synthetic_data(20)).unwrap();
    session.set_fit(ParamId::K, true).unwrap();

    session.start_fit().unwrap();
    assert!(matches!(session.start_fit(), Err(WellFitError::FitInProgress)));
    assert!(matches!(
        session.set_value(ParamId::K, 20.0),
        Err(WellFitError::FitInProgress)
    ));
    assert!(matches!(
        session.set_step(ParamId::K, 2.0),
        Err(WellFitError::FitInProgress)
    ));
    assert!(matches!(
        session.set_visible(ParamId::L, false),
        Err(WellFitError::FitInProgress)
    ));
    assert!(!session.fit_start_enabled());

    session.stop_fit();
    session.wait().unwrap();
    assert!(session.fit_start_enabled());
}

#[test]
fn test_stop_cancels_running_fit() {
    let config = LmConfig {
        error_tolerance: 0.0,
        max_iterations: 1000,
        ..LmConfig::default()
    };
    let mut session =
        FittingSession::new(Arc::new(SlowModel(Duration::from_millis(20)))).with_config(config);
    session.set_observed(synthetic_data(20)).unwrap();
    session.set_fit(ParamId::K, true).unwrap();
    session.set_fit(ParamId::C, true).unwrap();

    session.start_fit().unwrap();
    assert!(session.stop_fit());
    let outcome = session.wait().unwrap().unwrap();

    assert_eq!(outcome.termination, Termination::Cancelled);
    assert_eq!(session.fit_state(), FitState::Done(Termination::Cancelled));
    assert_eq!(session.progress(), 100);
    assert!(!session.stop_fit());
}

#[test]
fn test_failed_initial_evaluation_reported() {
    let mut session = FittingSession::new(shared_model());
    session.set_observed(synthetic_data(10)).unwrap();
    session.set_fit(ParamId::K, true).unwrap();
    // the synthetic model rejects C = 0
    session.set_bounds(ParamId::C, 0.0, 1.0).unwrap();
    session.set_value(ParamId::C, 0.0).unwrap();

    session.start_fit().unwrap();
    let result = session.wait();
    assert!(matches!(result, Err(WellFitError::FunctionEvaluation(_))));
    assert_eq!(session.fit_state(), FitState::Init);
    assert!(!session.is_fitting());
}

#[test]
fn test_state_json_round_trip() {
    let mut session = fitting_session();
    // switching rebuilds the table metadata, so edit afterwards
    session.select_model(ModelType::Model4).unwrap();
    session.set_fit(ParamId::K, true).unwrap();
    session.set_value(ParamId::K, 33.3).unwrap();
    session.set_bounds(ParamId::S, -5.0, 5.0).unwrap();
    session.set_step(ParamId::K, 2.5).unwrap();
    session.set_visible(ParamId::L, false).unwrap();
    session.set_fit_weight_percent(70);

    let state = session.save_state();
    let json = state.to_json().unwrap();
    let loaded = FittingState::from_json(&json).unwrap();
    assert_eq!(loaded, state);

    let mut restored = FittingSession::new(shared_model());
    restored.load_state(&loaded).unwrap();
    assert_eq!(restored.model_type(), ModelType::Model4);
    assert_eq!(restored.weight().percent(), 70);
    assert_eq!(restored.observed(), session.observed());
    assert_eq!(restored.save_state(), state);

    let k = restored.store().get(ParamId::K).unwrap();
    assert_relative_eq!(k.value(), 33.3, epsilon = 1e-9);
    assert_eq!(k.step(), 2.5);
    assert!(k.is_fit());
    assert!(!restored.store().get(ParamId::L).unwrap().is_visible());
}

#[test]
fn test_loading_never_trusts_derived_values() {
    let session = fitting_session();
    let mut state = session.save_state();
    for record in state.parameters.iter_mut() {
        if record.name == "LfD" {
            record.value = 42.0;
        }
    }

    let mut restored = FittingSession::new(shared_model());
    restored.load_state(&state).unwrap();
    assert_eq!(restored.store().get(ParamId::LfD).unwrap().value(), 0.25);
    assert_eq!(restored.raw_texts()[&ParamId::LfD], "0.25");
}

#[test]
fn test_export_rows() {
    let session = fitting_session();
    let rows = session.export_rows();
    assert_eq!(rows.len(), session.store().len());

    let skin = rows.iter().find(|r| r.symbol == "S").unwrap();
    assert_eq!(skin.value, 2.0);
    assert_eq!(skin.display_name, ParamId::S.display_name());

    let json = serde_json::to_value(&rows).unwrap();
    assert!(json.as_array().unwrap().iter().all(|r| r.get("unit").is_some()));
}
