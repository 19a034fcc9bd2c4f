//! Tests for the parameter store: bounds, derived values and records

use approx::assert_relative_eq;
use wellfit_rs::model::ModelType;
use wellfit_rs::parameters::{ParamId, ParameterMap, ParameterRecord, ParameterStore};

use crate::test_helpers::StorageSkinModel;
use wellfit_rs::ForwardModel;

fn store() -> ParameterStore {
    ParameterStore::from_defaults(&StorageSkinModel.default_parameters(ModelType::Model1))
}

#[test]
fn test_default_metadata() {
    let store = store();

    let k = store.get(ParamId::K).unwrap();
    assert_eq!(k.min(), 0.1);
    assert_eq!(k.max(), 1000.0);
    assert_eq!(k.step(), 1.0);
    assert!(!k.is_fit());
    assert!(k.is_visible());

    let s = store.get(ParamId::S).unwrap();
    assert_eq!((s.min(), s.max()), (0.0, 100.0));
    assert_eq!(s.step(), 0.1);

    let lfd = store.get(ParamId::LfD).unwrap();
    assert_relative_eq!(lfd.value(), 0.25);
    assert!(lfd.min().is_infinite() && lfd.max().is_infinite());
}

#[test]
fn test_bounds_invariant_on_every_path() {
    let mut store = store();

    assert!(store.set_value(ParamId::K, 5000.0).is_err());
    assert_eq!(store.get(ParamId::K).unwrap().value(), 10.0);

    let map: ParameterMap = [(ParamId::K, 1e6), (ParamId::C, -1.0)].into_iter().collect();
    store.apply_map(&map);
    assert_eq!(store.get(ParamId::K).unwrap().value(), 1000.0);
    assert_relative_eq!(store.get(ParamId::C).unwrap().value(), 0.0005);

    let value = store.nudge(ParamId::K, -10_000).unwrap();
    assert_eq!(value, store.get(ParamId::K).unwrap().min());

    store.set_bounds(ParamId::K, 1.0, 2.0).unwrap();
    assert_eq!(store.get(ParamId::K).unwrap().value(), 1.0);

    for p in store.iter().filter(|p| !p.id().is_derived()) {
        assert!(p.min() <= p.value() && p.value() <= p.max(), "{} out of bounds", p.id());
    }
}

#[test]
fn test_derived_follows_inputs() {
    let mut store = store();
    store.set_value(ParamId::Lf, 200.0).unwrap();
    assert_relative_eq!(store.to_map()[&ParamId::LfD], 0.5);

    store.nudge(ParamId::L, 100).unwrap();
    // L step is 40, so L = 4400
    assert_relative_eq!(store.to_map()[&ParamId::LfD], 200.0 / 4400.0);

    assert!(store.set_value(ParamId::LfD, 3.0).is_err());
    assert!(store.set_fit(ParamId::LfD, true).is_err());
}

#[test]
fn test_derived_kept_when_rule_undefined() {
    let mut store = store();
    store.set_bounds(ParamId::L, 0.0, 1000.0).unwrap();
    store.set_value(ParamId::L, 0.0).unwrap();
    assert_relative_eq!(store.to_map()[&ParamId::LfD], 0.25);
}

#[test]
fn test_record_round_trip() {
    let mut original = store();
    original.set_value(ParamId::K, 123.456789).unwrap();
    original.set_fit(ParamId::K, true).unwrap();
    original.set_bounds(ParamId::C, 1e-4, 10.0).unwrap();
    original.set_value(ParamId::C, 0.0123).unwrap();
    original.set_step(ParamId::S, 0.5).unwrap();
    original.set_visible(ParamId::Lf, false).unwrap();

    let json = serde_json::to_string(&original.records()).unwrap();
    let records: Vec<ParameterRecord> = serde_json::from_str(&json).unwrap();

    let mut restored = store();
    restored.restore_records(&records).unwrap();

    for (a, b) in original.iter().zip(restored.iter()) {
        assert_eq!(a.id(), b.id());
        assert!((a.value() - b.value()).abs() <= 1e-9);
        assert_eq!(a.is_fit(), b.is_fit());
        assert_eq!(a.min(), b.min());
        assert_eq!(a.max(), b.max());
        assert_eq!(a.step(), b.step());
        assert_eq!(a.is_visible(), b.is_visible());
    }
}

#[test]
fn test_negative_default_within_bounds_and_round_trips() {
    let defaults: ParameterMap = [(ParamId::K, 10.0), (ParamId::S, -2.0)].into_iter().collect();
    let original = ParameterStore::from_defaults(&defaults);

    let skin = original.get(ParamId::S).unwrap();
    assert_eq!(skin.value(), -2.0);
    assert!(skin.bounds().is_within_bounds(skin.value()));
    assert!(skin.min() < 0.0);

    let mut restored = ParameterStore::from_defaults(&defaults);
    restored.set_value(ParamId::S, 1.0).unwrap();
    restored.restore_records(&original.records()).unwrap();
    assert_eq!(restored.get(ParamId::S).unwrap().value(), -2.0);
    assert_eq!(restored, original);
}

#[test]
fn test_restore_ignores_unknown_and_rederives() {
    let mut store = store();
    let mut records = store.records();
    records.push(ParameterRecord {
        name: "bogus".to_string(),
        value: 1.0,
        is_fit: true,
        min: 0.0,
        max: 2.0,
        step: 0.1,
        is_visible: true,
    });
    for r in records.iter_mut() {
        if r.name == "LfD" {
            r.value = 99.0;
        }
        if r.name == "Lf" {
            r.value = 40.0;
        }
    }

    store.restore_records(&records).unwrap();
    assert_relative_eq!(store.to_map()[&ParamId::LfD], 0.1);
    assert_eq!(store.len(), 6);
}

#[test]
fn test_display_order_and_rows() {
    let mut store = store();
    store.set_fit(ParamId::S, true).unwrap();
    store.set_visible(ParamId::L, false).unwrap();

    let order: Vec<ParamId> = store.display_order().iter().map(|p| p.id()).collect();
    assert_eq!(order[0], ParamId::S);
    assert!(!order.contains(&ParamId::L));

    let rows = store.export_rows();
    let k = rows.iter().find(|r| r.symbol == "k").unwrap();
    assert_eq!(k.value, 10.0);
    assert_eq!(k.unit, ParamId::K.unit());
}
