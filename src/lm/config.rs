//! Configuration options for the Levenberg-Marquardt fit.

/// Configuration options for the Levenberg-Marquardt controller.
#[derive(Debug, Clone, PartialEq)]
pub struct LmConfig {
    /// Maximum number of outer iterations. Default: 50
    pub max_iterations: usize,

    /// Trial steps attempted per iteration before giving up on it. Default: 5
    pub max_trials: usize,

    /// Initial value for the damping parameter. Default: 0.01
    pub initial_lambda: f64,

    /// Factor by which to increase lambda after a rejected trial. Default: 10.0
    pub lambda_up_factor: f64,

    /// Factor by which to decrease lambda after an accepted trial. Default: 0.1
    pub lambda_down_factor: f64,

    /// Lambda above which an iteration without accepted step stops the fit. Default: 1e10
    pub max_lambda: f64,

    /// Normalized error `SSE / residual count` considered converged. Default: 3e-3
    pub error_tolerance: f64,

    /// Perturbation in decades for log-space parameters. Default: 0.01
    pub log_step: f64,

    /// Additive perturbation for linear parameters. Default: 1e-4
    pub linear_step: f64,

    /// Values at or below this are perturbed linearly. Default: 1e-12
    pub log_threshold: f64,
}

impl Default for LmConfig {
    fn default() -> Self {
        Self {
            max_iterations: 50,
            max_trials: 5,
            initial_lambda: 0.01,
            lambda_up_factor: 10.0,
            lambda_down_factor: 0.1,
            max_lambda: 1e10,
            error_tolerance: 3e-3,
            log_step: 0.01,
            linear_step: 1e-4,
            log_threshold: 1e-12,
        }
    }
}
