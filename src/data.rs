//! Observed well-test data.
//!
//! [`ObservedData`] holds three aligned sequences (elapsed time, pressure
//! change and pressure derivative) restricted to strictly positive times.
//! It can be built directly from already-reduced columns or from raw gauge
//! pressure, in which case the pressure change is taken against the initial
//! reservoir pressure (drawdown) or the shut-in pressure (buildup), a
//! missing derivative column is computed with the Bourdet algorithm, and the
//! derivative can optionally be smoothed with a moving window.

use serde::{Deserialize, Serialize};

use crate::error::{Result, WellFitError};

/// Raw persisted arrays, not yet filtered
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObservedArrays {
    pub time: Vec<f64>,
    pub pressure: Vec<f64>,
    #[serde(default)]
    pub derivative: Vec<f64>,
}

/// Aligned observations with `time[i] > 0` for every `i`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ObservedArrays", into = "ObservedArrays")]
pub struct ObservedData {
    time: Vec<f64>,
    pressure: Vec<f64>,
    derivative: Vec<f64>,
}

/// How the pressure change is formed from gauge pressure
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TestType {
    /// `Δp = |p_i - p|` against the initial reservoir pressure
    Drawdown { initial_pressure: f64 },
    /// `Δp = |p - p_ws|` against the first (shut-in) reading
    Buildup,
}

/// How the derivative column is prepared when importing gauge pressure
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DerivativeOptions {
    /// Bourdet window in natural-log time
    pub l_spacing: f64,
    /// Moving-window width applied to the derivative; `None` disables smoothing
    pub smoothing_span: Option<usize>,
}

impl Default for DerivativeOptions {
    fn default() -> Self {
        Self {
            l_spacing: 0.1,
            smoothing_span: None,
        }
    }
}

impl DerivativeOptions {
    pub fn with_l_spacing(mut self, l_spacing: f64) -> Self {
        self.l_spacing = l_spacing;
        self
    }

    pub fn with_smoothing(mut self, span: usize) -> Self {
        self.smoothing_span = Some(span);
        self
    }
}

impl ObservedData {
    /// Build from reduced columns.
    ///
    /// `time` and `pressure` must have equal length. The derivative is padded
    /// with zeros (or truncated) to the same length, then rows with a
    /// non-positive or non-finite time are dropped.
    pub fn new(time: Vec<f64>, pressure: Vec<f64>, mut derivative: Vec<f64>) -> Result<Self> {
        if time.len() != pressure.len() {
            return Err(WellFitError::DimensionMismatch(format!(
                "{} time values but {} pressure values",
                time.len(),
                pressure.len()
            )));
        }
        derivative.resize(time.len(), 0.0);

        let mut data = Self::default();
        for ((t, p), d) in time.into_iter().zip(pressure).zip(derivative) {
            if t.is_finite() && t > 0.0 {
                data.time.push(t);
                data.pressure.push(p);
                data.derivative.push(d);
            }
        }
        Ok(data)
    }

    /// Build from raw gauge pressure.
    ///
    /// When `derivative` is `None` the Bourdet derivative with window
    /// `options.l_spacing` (in natural-log time) is computed from the pressure
    /// change. Smoothing, when enabled, applies to the computed and the
    /// supplied derivative alike.
    pub fn from_gauge_pressure(
        time: Vec<f64>,
        gauge_pressure: Vec<f64>,
        derivative: Option<Vec<f64>>,
        test: TestType,
        options: DerivativeOptions,
    ) -> Result<Self> {
        // Reduce to the positive-time rows first so the shut-in reference is
        // the first retained reading.
        let positive = Self::new(time, gauge_pressure, derivative.clone().unwrap_or_default())?;
        if positive.is_empty() {
            return Ok(positive);
        }

        let reference = match test {
            TestType::Drawdown { initial_pressure } => initial_pressure,
            TestType::Buildup => positive.pressure[0],
        };
        let delta_p: Vec<f64> = positive.pressure.iter().map(|p| (p - reference).abs()).collect();

        let mut deriv = match derivative {
            Some(_) => positive.derivative,
            None => bourdet_derivative(&positive.time, &delta_p, options.l_spacing),
        };
        if let Some(span) = options.smoothing_span {
            deriv = smooth(&deriv, span);
        }

        Self::new(positive.time, delta_p, deriv)
    }

    pub fn time(&self) -> &[f64] {
        &self.time
    }

    pub fn pressure(&self) -> &[f64] {
        &self.pressure
    }

    pub fn derivative(&self) -> &[f64] {
        &self.derivative
    }

    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }
}

impl TryFrom<ObservedArrays> for ObservedData {
    type Error = WellFitError;

    fn try_from(arrays: ObservedArrays) -> Result<Self> {
        Self::new(arrays.time, arrays.pressure, arrays.derivative)
    }
}

impl From<ObservedData> for ObservedArrays {
    fn from(data: ObservedData) -> Self {
        ObservedArrays {
            time: data.time,
            pressure: data.pressure,
            derivative: data.derivative,
        }
    }
}

/// Bourdet pressure derivative `dΔp / d ln t`.
///
/// For each point the neighbours used are the closest ones at least
/// `l_spacing` away in `ln t` (falling back to the adjacent point near the ends
/// of the record). Interior points use the weighted central difference,
/// end points a one-sided difference. `time` must be positive and increasing.
pub fn bourdet_derivative(time: &[f64], delta_p: &[f64], l_spacing: f64) -> Vec<f64> {
    let n = time.len().min(delta_p.len());
    if n < 2 {
        return vec![0.0; n];
    }

    let x: Vec<f64> = time[..n].iter().map(|t| t.ln()).collect();
    let l = l_spacing.max(0.0);

    (0..n)
        .map(|i| {
            let left = (0..i).rev().find(|&j| x[i] - x[j] >= l).or(i.checked_sub(1));
            let right = (i + 1..n).find(|&k| x[k] - x[i] >= l).or((i + 1 < n).then_some(i + 1));

            let slope = |a: usize, b: usize| {
                let dx = x[b] - x[a];
                if dx.abs() < f64::EPSILON {
                    0.0
                } else {
                    (delta_p[b] - delta_p[a]) / dx
                }
            };

            match (left, right) {
                (Some(j), Some(k)) => {
                    let dx1 = x[i] - x[j];
                    let dx2 = x[k] - x[i];
                    if dx1 + dx2 < f64::EPSILON {
                        0.0
                    } else {
                        (slope(j, i) * dx2 + slope(i, k) * dx1) / (dx1 + dx2)
                    }
                }
                (Some(j), None) => slope(j, i),
                (None, Some(k)) => slope(i, k),
                (None, None) => 0.0,
            }
        })
        .collect()
}

/// Centered moving average over `span` points.
///
/// An even span is widened to the next odd width. Near the ends the window
/// is truncated to the points that exist. A span of 0 or 1 returns the input.
pub fn smooth(values: &[f64], span: usize) -> Vec<f64> {
    if span <= 1 || values.len() < 2 {
        return values.to_vec();
    }
    let half = span / 2;
    let n = values.len();

    (0..n)
        .map(|i| {
            let lo = i.saturating_sub(half);
            let hi = (i + half).min(n - 1);
            let window = &values[lo..=hi];
            window.iter().sum::<f64>() / window.len() as f64
        })
        .collect()
}
