//! Parsing of raw, possibly multi-valued parameter text
//!
//! The parameter table accepts either a single number or a list such as
//! `"1,2,4"` (the full-width comma `，` is accepted as well). A list turns the
//! parameter into the sensitivity-sweep parameter instead of a fit start value.

use nom::{combinator::all_consuming, number::complete::double, Parser};
use std::collections::BTreeMap;
use tracing::warn;

use super::derived::recompute_derived;
use super::id::ParamId;
use super::ParameterMap;

/// Full-width comma accepted as a list separator
pub const FULLWIDTH_COMMA: char = '\u{FF0C}';

/// Raw text per parameter, in canonical parameter order
pub type RawTexts = BTreeMap<ParamId, String>;

/// The parameter swept in sensitivity mode together with its candidate values
#[derive(Debug, Clone, PartialEq)]
pub struct SweepSpec {
    pub id: ParamId,
    pub values: Vec<f64>,
}

/// Result of parsing the whole parameter table
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParsedInput {
    /// First parsed value of every parameter, derived values recomputed
    pub base: ParameterMap,

    /// Present when some parameter holds more than one value
    pub sweep: Option<SweepSpec>,

    /// Parameters whose text held no valid number and fell back to 0.0, in
    /// symbol order
    pub defaulted: Vec<ParamId>,
}

impl ParsedInput {
    /// Fitting is disabled while a sweep is active
    pub fn is_sensitivity_mode(&self) -> bool {
        self.sweep.is_some()
    }
}

fn is_separator(c: char) -> bool {
    c == ',' || c == FULLWIDTH_COMMA
}

/// Whether `text` is a list rather than a single value
pub fn is_multi_valued(text: &str) -> bool {
    text.contains(is_separator)
}

fn parse_number(fragment: &str) -> Option<f64> {
    let mut parser = all_consuming(double::<&str, nom::error::Error<&str>>);
    match parser.parse(fragment) {
        Ok((_, value)) if value.is_finite() => Some(value),
        _ => None,
    }
}

/// Parse a comma-separated list of numbers, dropping anything non-numeric.
///
/// # Examples
///
/// ```
/// use wellfit_rs::parameters::sensitivity::parse_values;
///
/// assert_eq!(parse_values("1, 2,x,4"), vec![1.0, 2.0, 4.0]);
/// assert_eq!(parse_values("5\u{FF0C}6"), vec![5.0, 6.0]);
/// assert!(parse_values("abc").is_empty());
/// ```
pub fn parse_values(text: &str) -> Vec<f64> {
    text.split(is_separator)
        .map(str::trim)
        .filter(|fragment| !fragment.is_empty())
        .filter_map(parse_number)
        .collect()
}

/// First valid number of `text`, if any
pub fn first_value(text: &str) -> Option<f64> {
    parse_values(text).first().copied()
}

/// Parse every parameter text into a base map and an optional sweep.
///
/// Parameters are visited in symbol order (case-sensitive, so `S` sorts
/// before `k`). The first one with more than one value becomes the sweep
/// parameter; later multi-valued parameters only contribute their first value.
pub fn parse_raw_texts(texts: &RawTexts) -> ParsedInput {
    let mut parsed = ParsedInput::default();

    let mut entries: Vec<(ParamId, &String)> = texts.iter().map(|(&id, text)| (id, text)).collect();
    entries.sort_by_key(|(id, _)| id.symbol());

    for (id, text) in entries {
        let values = parse_values(text);
        match values.first() {
            Some(&first) => {
                parsed.base.insert(id, first);
            }
            None => {
                warn!(parameter = %id, text = %text, "no valid value, defaulting to 0");
                parsed.base.insert(id, 0.0);
                parsed.defaulted.push(id);
            }
        }

        if values.len() > 1 && parsed.sweep.is_none() {
            parsed.sweep = Some(SweepSpec { id, values });
        }
    }

    recompute_derived(&mut parsed.base);
    parsed
}
