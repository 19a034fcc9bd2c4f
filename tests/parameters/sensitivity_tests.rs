//! Tests for raw text parsing and sweep detection

use wellfit_rs::parameters::{parse_raw_texts, parse_values, ParamId, RawTexts};

fn texts(entries: &[(ParamId, &str)]) -> RawTexts {
    entries
        .iter()
        .map(|(id, text)| (*id, text.to_string()))
        .collect()
}

fn join(values: &[f64]) -> String {
    values
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

#[test]
fn test_single_list_parameter_is_swept() {
    let parsed = parse_raw_texts(&texts(&[
        (ParamId::K, "10"),
        (ParamId::C, "0.05"),
        (ParamId::S, "1,2,4"),
    ]));

    let sweep = parsed.sweep.as_ref().unwrap();
    assert_eq!(sweep.id, ParamId::S);
    assert_eq!(sweep.values, vec![1.0, 2.0, 4.0]);
    assert_eq!(parsed.base[&ParamId::S], 1.0);
    assert!(parsed.is_sensitivity_mode());
}

#[test]
fn test_first_list_in_symbol_order_wins() {
    // symbols compare case-sensitively, so "S" sorts before "k" and "phi"
    let mut raw = RawTexts::new();
    raw.insert(ParamId::K, "5，6，7".to_string());
    raw.insert(ParamId::Phi, "0.1,0.2".to_string());
    raw.insert(ParamId::S, "1,2".to_string());

    let parsed = parse_raw_texts(&raw);
    let sweep = parsed.sweep.unwrap();
    assert_eq!(sweep.id, ParamId::S);
    assert_eq!(sweep.values, vec![1.0, 2.0]);
    assert_eq!(parsed.base[&ParamId::K], 5.0);
    assert_eq!(parsed.base[&ParamId::Phi], 0.1);
}

#[test]
fn test_upper_case_symbols_sort_before_lower_case() {
    let parsed = parse_raw_texts(&texts(&[
        (ParamId::Kf, "1,2"),
        (ParamId::CD, "3,4"),
        (ParamId::Lf, "50,60"),
    ]));
    assert_eq!(parsed.sweep.unwrap().id, ParamId::Lf);
}

#[test]
fn test_garbage_defaults_to_zero() {
    let parsed = parse_raw_texts(&texts(&[(ParamId::K, "abc"), (ParamId::C, ",,")]));
    assert_eq!(parsed.base[&ParamId::K], 0.0);
    assert_eq!(parsed.base[&ParamId::C], 0.0);
    assert_eq!(parsed.defaulted, vec![ParamId::C, ParamId::K]);
    assert!(parsed.sweep.is_none());
}

#[test]
fn test_derived_recomputed_from_base() {
    let parsed = parse_raw_texts(&texts(&[
        (ParamId::L, "400"),
        (ParamId::Lf, "100,200"),
        (ParamId::LfD, "7"),
    ]));
    assert_eq!(parsed.base[&ParamId::LfD], 0.25);
}

#[test]
fn test_parsing_is_idempotent() {
    let raw = texts(&[
        (ParamId::K, " 12.5 "),
        (ParamId::C, "1e-2"),
        (ParamId::S, "-1, 0 ,x, 3.25"),
        (ParamId::Lf, "100"),
        (ParamId::L, "400"),
    ]);
    let first = parse_raw_texts(&raw);

    let reformatted: RawTexts = raw
        .iter()
        .map(|(id, text)| (*id, join(&parse_values(text))))
        .collect();
    let second = parse_raw_texts(&reformatted);

    assert_eq!(first, second);
}
