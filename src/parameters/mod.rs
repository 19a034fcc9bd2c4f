//! # Parameter System
//!
//! Named well-test parameters with bounds, fit flags and derived values, plus
//! the parser for the multi-valued text used by sensitivity sweeps.
//!
//! ## Core Components
//!
//! - [`ParamId`]: closed set of parameter identifiers with symbol, display name and unit
//! - [`FitParameter`]: one parameter with value, fit flag, bounds and UI step
//! - [`ParameterStore`]: the parameter list of the selected model
//! - [`ParameterMap`]: id → value mapping consumed by the forward model
//! - [`derived`]: declarative table of derived parameters
//! - [`sensitivity`]: raw text parsing and sweep detection
//!
//! ## Example Usage
//!
//! ```rust
//! use wellfit_rs::parameters::{ParamId, ParameterMap, ParameterStore};
//!
//! let defaults: ParameterMap = [
//!     (ParamId::K, 10.0),
//!     (ParamId::L, 400.0),
//!     (ParamId::Lf, 100.0),
//!     (ParamId::LfD, 0.0),
//! ]
//! .into_iter()
//! .collect();
//!
//! let mut store = ParameterStore::from_defaults(&defaults);
//! store.set_fit(ParamId::K, true).unwrap();
//! store.set_value(ParamId::Lf, 200.0).unwrap();
//!
//! assert_eq!(store.to_map()[&ParamId::LfD], 0.5);
//! ```

use std::collections::BTreeMap;

pub mod bounds;
pub mod derived;
pub mod id;
pub mod parameter;
pub mod sensitivity;
pub mod store;

/// Parameter values keyed by id, iterated in canonical order
pub type ParameterMap = BTreeMap<ParamId, f64>;

// Re-export key types
pub use bounds::{Bounds, BoundsError};
pub use derived::{feeds_derived, recompute_derived, DerivedRule, DERIVED_RULES};
pub use id::{ParamId, UnknownParamId};
pub use parameter::{FitParameter, ParameterError, ParameterRecord, ParameterRow};
pub use sensitivity::{parse_raw_texts, parse_values, ParsedInput, RawTexts, SweepSpec};
pub use store::ParameterStore;
