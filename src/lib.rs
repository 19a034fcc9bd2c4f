//! # wellfit-rs
//!
//! `wellfit-rs` is the parameter-estimation core of a well-test analysis tool.
//! It fits a forward reservoir model to observed pressure-change and
//! pressure-derivative curves with a Levenberg-Marquardt optimizer working on
//! log residuals, and draws sensitivity sweeps when a parameter is given a
//! list of values.
//!
//! The library provides:
//! - A parameter system with bounds, fit flags and derived parameters
//! - Observed data handling, including the Bourdet derivative
//! - A [`ForwardModel`] trait through which the physical models are consumed
//! - A Levenberg-Marquardt controller reporting progress and snapshots
//! - A fitting session running one background fit at a time
//!
//! ## Basic Usage
//!
//! ```
//! use std::sync::atomic::AtomicBool;
//! use wellfit_rs::data::ObservedData;
//! use wellfit_rs::lm::{FitWeight, LmController, Termination};
//! use wellfit_rs::model::{FnModel, ModelCurve, ModelType};
//! use wellfit_rs::parameters::{FitParameter, ParamId, ParameterMap};
//!
//! let model = FnModel::new(ParameterMap::new(), |_, p, t| {
//!     let k = p[&ParamId::K];
//!     Ok(ModelCurve::new(
//!         t.to_vec(),
//!         t.iter().map(|x| (1.0 + x * k).ln()).collect(),
//!         t.iter().map(|x| x * k / (1.0 + x * k)).collect(),
//!     ))
//! });
//!
//! let time: Vec<f64> = (1..=30).map(|i| 0.1 * f64::from(i)).collect();
//! let pressure = time.iter().map(|t| (1.0 + 5.0 * t).ln()).collect();
//! let derivative = time.iter().map(|t| 5.0 * t / (1.0 + 5.0 * t)).collect();
//! let data = ObservedData::new(time, pressure, derivative).unwrap();
//!
//! let mut k = FitParameter::new(ParamId::K, 2.0);
//! k.set_fit(true).unwrap();
//!
//! let controller = LmController::new(&model, ModelType::Model1, &data, FitWeight::default());
//! let outcome = controller
//!     .run(&[k], &AtomicBool::new(false), &mut wellfit_rs::lm::NoopObserver)
//!     .unwrap();
//! assert_eq!(outcome.termination, Termination::Converged);
//! ```

// Public modules
pub mod error;

// Parameter system
pub mod parameters;

pub mod data;
pub mod lm;
pub mod model;
pub mod sensitivity;
pub mod session;

// Re-exports for convenience
pub use error::{Result, WellFitError};
pub use lm::{FitOutcome, LmConfig, LmController, Termination};
pub use model::{ForwardModel, ModelCurve, ModelType};
pub use parameters::{FitParameter, ParamId, ParameterMap, ParameterStore};
pub use session::{FittingSession, FittingState};

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
