//! Optimizer behavior on synthetic storage-and-skin data

use std::sync::atomic::AtomicBool;
use wellfit_rs::lm::{
    FitEvent, FitSnapshot, FitWeight, LmConfig, LmController, NoopObserver, SnapshotKind,
    Termination,
};
use wellfit_rs::model::ModelType;
use wellfit_rs::parameters::{ParamId, ParameterStore};
use wellfit_rs::ForwardModel;

use crate::test_helpers::{noisy_data, synthetic_data, StorageSkinModel};

fn start_store(k: f64, c: f64, s: f64, fit: &[ParamId]) -> ParameterStore {
    let mut store =
        ParameterStore::from_defaults(&StorageSkinModel.default_parameters(ModelType::Model1));
    store.set_value(ParamId::K, k).unwrap();
    store.set_value(ParamId::C, c).unwrap();
    store.set_value(ParamId::S, s).unwrap();
    for &id in fit {
        store.set_fit(id, true).unwrap();
    }
    store
}

fn snapshots(events: &[FitEvent]) -> Vec<&FitSnapshot> {
    events
        .iter()
        .filter_map(|e| match e {
            FitEvent::Snapshot(s) => Some(s),
            _ => None,
        })
        .collect()
}

#[test]
fn test_sse_never_increases() {
    let model = StorageSkinModel;
    let data = synthetic_data(50);
    let store = start_store(20.0, 0.05, 0.5, &[ParamId::K, ParamId::C, ParamId::S]);

    let controller = LmController::new(&model, ModelType::Model1, &data, FitWeight::from_percent(60));
    let mut events: Vec<FitEvent> = Vec::new();
    controller
        .run(store.as_slice(), &AtomicBool::new(false), &mut events)
        .unwrap();

    let snaps = snapshots(&events);
    assert!(snaps.len() >= 2);
    for pair in snaps.windows(2) {
        match pair[1].kind {
            SnapshotKind::Step => assert!(pair[1].sse < pair[0].sse),
            _ => assert!(pair[1].sse <= pair[0].sse),
        }
    }

    let progress: Vec<u8> = events
        .iter()
        .filter_map(|e| match e {
            FitEvent::Progress(p) => Some(*p),
            _ => None,
        })
        .collect();
    assert!(progress.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(progress.last(), Some(&100));
}

#[test]
fn test_iterations_bounded() {
    let model = StorageSkinModel;
    let data = synthetic_data(30);
    let store = start_store(0.5, 2.0, 20.0, &[ParamId::K, ParamId::C, ParamId::S]);

    let config = LmConfig {
        max_iterations: 3,
        error_tolerance: 0.0,
        ..LmConfig::default()
    };
    let controller =
        LmController::new(&model, ModelType::Model1, &data, FitWeight::default()).with_config(config);
    let outcome = controller
        .run(store.as_slice(), &AtomicBool::new(false), &mut NoopObserver)
        .unwrap();

    assert!(outcome.iterations <= 3);
    assert!(matches!(
        outcome.termination,
        Termination::MaxIterReached | Termination::Stalled
    ));
}

#[test]
fn test_noisy_fit_stays_in_bounds_and_converges() {
    let model = StorageSkinModel;
    let data = noisy_data(60, 0.01, 7);

    let mut store = start_store(20.0, 0.05, 0.5, &[ParamId::K, ParamId::C, ParamId::S]);
    store.set_bounds(ParamId::K, 1.0, 200.0).unwrap();
    store.set_bounds(ParamId::S, 0.0, 10.0).unwrap();

    let controller = LmController::new(&model, ModelType::Model1, &data, FitWeight::default());
    let mut events: Vec<FitEvent> = Vec::new();
    let outcome = controller
        .run(store.as_slice(), &AtomicBool::new(false), &mut events)
        .unwrap();

    for snap in snapshots(&events) {
        let k = snap.parameters[&ParamId::K];
        let s = snap.parameters[&ParamId::S];
        assert!((1.0..=200.0).contains(&k));
        assert!((0.0..=10.0).contains(&s));
    }

    assert_eq!(outcome.termination, Termination::Converged);
    assert!(outcome.normalized_error < 3e-3);
    // derived values travel with the result
    assert_eq!(outcome.parameters[&ParamId::LfD], 0.25);
}

#[test]
fn test_final_snapshot_matches_outcome() {
    let model = StorageSkinModel;
    let data = synthetic_data(25);
    let store = start_store(15.0, 0.1, 2.0, &[ParamId::K]);

    let controller = LmController::new(&model, ModelType::Model1, &data, FitWeight::from_percent(100));
    let mut events: Vec<FitEvent> = Vec::new();
    let outcome = controller
        .run(store.as_slice(), &AtomicBool::new(false), &mut events)
        .unwrap();

    let last = *snapshots(&events).last().unwrap();
    assert_eq!(last.kind, SnapshotKind::Final);
    assert_eq!(last.parameters, outcome.parameters);
    assert_eq!(last.sse, outcome.sse);
    assert_eq!(last.iteration, outcome.iterations);
    // final curve is on the model's own grid
    assert_eq!(last.curve.len(), 81);
}

#[test]
fn test_cancelled_fit_keeps_start_values() {
    let model = StorageSkinModel;
    let data = synthetic_data(25);
    let store = start_store(15.0, 0.1, 2.0, &[ParamId::K]);

    let controller = LmController::new(&model, ModelType::Model1, &data, FitWeight::default());
    let mut events: Vec<FitEvent> = Vec::new();
    let outcome = controller
        .run(store.as_slice(), &AtomicBool::new(true), &mut events)
        .unwrap();

    assert_eq!(outcome.termination, Termination::Cancelled);
    assert_eq!(outcome.parameters[&ParamId::K], 15.0);
    let kinds: Vec<SnapshotKind> = snapshots(&events).iter().map(|s| s.kind).collect();
    assert_eq!(kinds, vec![SnapshotKind::Initial, SnapshotKind::Final]);
}
