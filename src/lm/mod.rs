//! Levenberg-Marquardt fitting.
//!
//! The fit minimizes the sum of squared log residuals between the observed
//! curves and the forward model over the fit-enabled parameters.
//!
//! - [`residuals`]: weighted log residuals and error measures
//! - [`jacobian`]: central-difference Jacobian, log or linear per parameter
//! - [`solver`]: damped normal equations solved by Cholesky factorization
//! - [`controller`]: the iteration loop, damping schedule and termination
//! - [`observer`]: progress and snapshot events

pub mod config;
pub mod controller;
pub mod convergence;
pub mod jacobian;
pub mod observer;
pub mod residuals;
pub mod solver;

// Re-export key types
pub use config::LmConfig;
pub use controller::{FitOutcome, LmController};
pub use convergence::{FitState, Termination};
pub use jacobian::{JacobianBuilder, Perturbation};
pub use observer::{FitEvent, FitObserver, FitSnapshot, NoopObserver, SnapshotKind};
pub use residuals::{normalized_error, sum_squared_error, FitWeight, ResidualEvaluator};
pub use solver::{damp, damped_step, normal_equations, solve};
