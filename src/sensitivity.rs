//! Sensitivity sweeps.
//!
//! When one parameter holds several candidate values the session draws one
//! model curve per value instead of fitting. Each curve gets a label of the
//! form `sym=value` and a color from a fixed palette, cycled by index.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, warn};

use crate::model::{default_time_grid, ForwardModel, ModelCurve, ModelType};
use crate::parameters::{feeds_derived, recompute_derived, ParameterMap, SweepSpec};

/// RGB color of a plotted curve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// Sweep colors: red, blue, green, magenta, orange, cyan, dark red, dark blue
pub const PALETTE: [Rgb; 8] = [
    Rgb::new(255, 0, 0),
    Rgb::new(0, 0, 255),
    Rgb::new(0, 180, 0),
    Rgb::new(255, 0, 255),
    Rgb::new(255, 140, 0),
    Rgb::new(0, 255, 255),
    Rgb::new(128, 0, 0),
    Rgb::new(0, 0, 128),
];

/// Color of the `index`-th sweep curve
pub fn color_for(index: usize) -> Rgb {
    PALETTE[index % PALETTE.len()]
}

/// Opaque identifier of a plotted curve, unique within a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CurveHandle(pub(crate) u64);

impl CurveHandle {
    pub fn id(self) -> u64 {
        self.0
    }
}

/// One curve of a sweep
#[derive(Debug, Clone, PartialEq)]
pub struct SweepCurve {
    pub handle: CurveHandle,
    pub label: String,
    pub color: Rgb,
    /// Value substituted for the swept parameter
    pub value: f64,
    pub curve: ModelCurve,
}

/// Label `sym=value` for one sweep value, the value printed like C's `%g`
pub fn sweep_label(spec: &SweepSpec, value: f64) -> String {
    format!("{}={}", spec.id.symbol(), format_general(value))
}

/// Six significant digits, trailing zeros removed, exponent form when the
/// decimal exponent is below -4 or at least 6.
fn format_general(value: f64) -> String {
    const PRECISION: i32 = 6;

    if value == 0.0 {
        return "0".to_string();
    }
    if !value.is_finite() {
        return value.to_string();
    }

    let scientific = format!("{:.*e}", (PRECISION - 1) as usize, value);
    let (mantissa, exponent) = match scientific.split_once('e') {
        Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
        None => (scientific.as_str(), 0),
    };

    if exponent < -4 || exponent >= PRECISION {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", trim_fraction(mantissa), sign, exponent.abs())
    } else {
        let decimals = (PRECISION - 1 - exponent).max(0) as usize;
        trim_fraction(&format!("{:.*}", decimals, value)).to_string()
    }
}

fn trim_fraction(text: &str) -> &str {
    if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.')
    } else {
        text
    }
}

/// Generates sweep curves for one model.
pub struct SweepGenerator<'a, M: ForwardModel + ?Sized> {
    model: &'a M,
    model_type: ModelType,
}

impl<'a, M: ForwardModel + ?Sized> SweepGenerator<'a, M> {
    pub fn new(model: &'a M, model_type: ModelType) -> Self {
        Self { model, model_type }
    }

    /// One curve per candidate value of `spec`.
    ///
    /// `times` is the observed time grid; when empty, the log-spaced default
    /// grid is used. `next_handle` is called once per curve. Values for which
    /// the model fails are skipped.
    pub fn generate(
        &self,
        spec: &SweepSpec,
        base: &ParameterMap,
        times: &[f64],
        mut next_handle: impl FnMut() -> CurveHandle,
    ) -> Vec<SweepCurve> {
        let grid;
        let times = if times.is_empty() {
            grid = default_time_grid();
            grid.as_slice()
        } else {
            times
        };

        let mut curves = Vec::with_capacity(spec.values.len());
        for (index, &value) in spec.values.iter().enumerate() {
            let mut params = base.clone();
            params.insert(spec.id, value);
            if feeds_derived(spec.id) {
                recompute_derived(&mut params);
            }

            let label = sweep_label(spec, value);
            match self.model.evaluate(self.model_type, &params, Some(times)) {
                Ok(curve) => {
                    debug!(label = %label, points = curve.len(), "sweep curve computed");
                    curves.push(SweepCurve {
                        handle: next_handle(),
                        label,
                        color: color_for(index),
                        value,
                        curve,
                    });
                }
                Err(err) => warn!(label = %label, error = %err, "sweep curve skipped"),
            }
        }
        curves
    }
}
