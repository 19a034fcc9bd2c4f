//! Fit lifecycle and termination reasons.

use std::fmt;

/// Why a fit stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The normalized error dropped below the tolerance.
    Converged,

    /// The iteration budget was used up.
    MaxIterReached,

    /// The cancel flag was raised.
    Cancelled,

    /// An iteration accepted no step and the damping exceeded its ceiling.
    Stalled,

    /// No parameter was selected for fitting.
    NoActiveParameters,
}

impl Termination {
    /// Returns true if the fit reached the error tolerance.
    pub fn is_converged(&self) -> bool {
        matches!(self, Termination::Converged)
    }

    /// Returns a description of the termination reason.
    pub fn description(&self) -> &'static str {
        match self {
            Termination::Converged => "Converged: normalized error below tolerance",
            Termination::MaxIterReached => "Terminated: maximum iterations reached",
            Termination::Cancelled => "Terminated: cancelled by user",
            Termination::Stalled => "Terminated: no improving step, damping at maximum",
            Termination::NoActiveParameters => "Terminated: no parameters selected for fitting",
        }
    }
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// State of a fitting session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FitState {
    /// No fit has been started.
    #[default]
    Init,

    /// A fit is running.
    Iterating,

    /// The last fit stopped for the given reason.
    Done(Termination),
}

impl FitState {
    /// Returns true while a fit is in flight.
    pub fn is_running(&self) -> bool {
        matches!(self, FitState::Iterating)
    }

    /// The termination reason of the last finished fit.
    pub fn termination(&self) -> Option<Termination> {
        match self {
            FitState::Done(t) => Some(*t),
            _ => None,
        }
    }
}
