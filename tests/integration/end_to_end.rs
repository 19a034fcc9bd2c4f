//! End-to-end behavior: a basic fit, missing data, nothing to fit and a
//! sensitivity sweep.

use std::sync::atomic::AtomicBool;
use wellfit_rs::lm::{FitEvent, FitState, FitWeight, LmController, SnapshotKind, Termination};
use wellfit_rs::model::ModelType;
use wellfit_rs::parameters::{ParamId, ParameterStore};
use wellfit_rs::session::{CurveUpdate, FittingSession};
use wellfit_rs::{ForwardModel, WellFitError};

use crate::test_helpers::{shared_model, synthetic_data, StorageSkinModel};

#[test]
fn test_single_parameter_fit_moves_toward_truth() {
    let model = StorageSkinModel;
    let data = synthetic_data(40);

    let mut store = ParameterStore::from_defaults(&model.default_parameters(ModelType::Model1));
    store.set_bounds(ParamId::K, 0.1, 1000.0).unwrap();
    store.set_value(ParamId::K, 10.0).unwrap();
    store.set_value(ParamId::C, 0.1).unwrap();
    store.set_value(ParamId::S, 2.0).unwrap();
    store.set_fit(ParamId::K, true).unwrap();

    let controller = LmController::new(&model, ModelType::Model1, &data, FitWeight::default());
    let mut events: Vec<FitEvent> = Vec::new();
    let outcome = controller
        .run(store.as_slice(), &AtomicBool::new(false), &mut events)
        .unwrap();

    let snapshots: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            FitEvent::Snapshot(s) => Some(s),
            _ => None,
        })
        .collect();
    let initial = snapshots[0];
    let first_step = snapshots
        .iter()
        .find(|s| s.kind == SnapshotKind::Step)
        .expect("at least one accepted step");

    assert_eq!(initial.kind, SnapshotKind::Initial);
    assert!(first_step.sse < initial.sse);
    let k_step = first_step.parameters[&ParamId::K];
    assert!((k_step - 50.0).abs() < (10.0 - 50.0_f64).abs());

    let k_final = outcome.parameters[&ParamId::K];
    assert!((k_final - 50.0).abs() < (10.0 - 50.0_f64).abs());
    assert!(outcome.sse < initial.sse);
}

#[test]
fn test_start_refused_without_observed_data() {
    let mut session = FittingSession::new(shared_model());
    session.set_fit(ParamId::K, true).unwrap();

    let result = session.start_fit();
    assert!(matches!(result, Err(WellFitError::EmptyDataset)));
    assert!(!session.is_fitting());
    assert_eq!(session.fit_state(), FitState::Init);
    assert!(session.poll_events().unwrap().is_empty());
}

#[test]
fn test_fit_without_active_parameters_completes_immediately() {
    let mut session = FittingSession::new(shared_model());
    session.set_observed(synthetic_data(20)).unwrap();
    let before = session.store().to_map();

    session.start_fit().unwrap();
    let outcome = session.wait().unwrap().unwrap();

    assert_eq!(outcome.termination, Termination::NoActiveParameters);
    assert_eq!(outcome.iterations, 0);
    assert_eq!(session.fit_state(), FitState::Done(Termination::NoActiveParameters));
    assert!(session.last_snapshot().is_none());
    assert_eq!(session.store().to_map(), before);
}

#[test]
fn test_list_on_skin_draws_three_sweep_curves() {
    let mut session = FittingSession::new(shared_model());
    session.set_observed(synthetic_data(20)).unwrap();
    session.set_raw_text(ParamId::S, "1,2,4").unwrap();

    assert!(!session.fit_start_enabled());
    assert!(matches!(
        session.start_fit(),
        Err(WellFitError::SensitivityModeActive(_))
    ));

    match session.update_model_curve().unwrap() {
        CurveUpdate::Sweep { parameter, curves } => {
            assert_eq!(parameter, ParamId::S);
            assert_eq!(curves.len(), 3);
            let labels: Vec<&str> = curves.iter().map(|c| c.label.as_str()).collect();
            assert_eq!(labels, vec!["S=1", "S=2", "S=4"]);
            for c in &curves {
                assert_eq!(c.curve.len(), 20);
                assert_eq!(c.curve.pressure.len(), c.curve.derivative.len());
            }
            // skin shifts the pressure curve but not the derivative
            assert!(curves[2].curve.pressure[0] > curves[0].curve.pressure[0]);
            assert_eq!(curves[2].curve.derivative, curves[0].curve.derivative);
        }
        other => panic!("expected a sweep, got {:?}", other),
    }
}
