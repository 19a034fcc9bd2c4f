use thiserror::Error;

/// Error types for the wellfit-rs library.
#[derive(Error, Debug)]
pub enum WellFitError {
    /// Error indicating a mismatch in vector or matrix dimensions.
    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),

    /// Error indicating a singular or ill-conditioned matrix was encountered.
    #[error("Singular matrix encountered")]
    SingularMatrix,

    /// Error for parameter-related problems.
    #[error("Parameter error: {0}")]
    ParameterError(String),

    /// Error during forward-model evaluation.
    #[error("Forward model evaluation error: {0}")]
    FunctionEvaluation(String),

    /// A fit was requested without any observed data loaded.
    #[error("No observed data loaded")]
    EmptyDataset,

    /// A fit was requested while another fit is still running.
    #[error("A fit is already in progress")]
    FitInProgress,

    /// A fit was requested while a multi-valued sensitivity sweep is active.
    #[error("Fitting is disabled while parameter '{0}' is swept")]
    SensitivityModeActive(String),

    /// The background fitting task terminated abnormally.
    #[error("Fitting task failed: {0}")]
    TaskFailed(String),

    /// Invalid input data.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl From<crate::parameters::parameter::ParameterError> for WellFitError {
    fn from(err: crate::parameters::parameter::ParameterError) -> Self {
        WellFitError::ParameterError(format!("{}", err))
    }
}

/// Result type alias for wellfit-rs operations.
pub type Result<T> = std::result::Result<T, WellFitError>;
