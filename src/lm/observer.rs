//! Progress and snapshot reporting.
//!
//! The controller reports through a [`FitObserver`]. A background fit uses an
//! `mpsc::Sender<FitEvent>` so that every payload crosses the thread boundary
//! as an owned copy; tests can collect events into a `Vec`.

use std::sync::mpsc::Sender;

use crate::model::ModelCurve;
use crate::parameters::ParameterMap;

/// Where in the fit a snapshot was taken
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotKind {
    Initial,
    Step,
    Final,
}

/// Parameters and model curve at one point of the fit
#[derive(Debug, Clone, PartialEq)]
pub struct FitSnapshot {
    pub kind: SnapshotKind,
    /// Iterations completed when the snapshot was taken
    pub iteration: usize,
    pub sse: f64,
    /// `sse / residual count`
    pub normalized_error: f64,
    /// Every parameter value, derived ones included
    pub parameters: ParameterMap,
    /// Model curve on the model's own time grid
    pub curve: ModelCurve,
}

/// Message sent from a running fit
#[derive(Debug, Clone, PartialEq)]
pub enum FitEvent {
    /// Percentage in `[0, 100]`, never decreasing within one fit
    Progress(u8),
    Snapshot(FitSnapshot),
    Finished,
}

/// Receives progress and snapshots from the controller
pub trait FitObserver {
    fn on_progress(&mut self, percent: u8);

    fn on_snapshot(&mut self, snapshot: FitSnapshot);
}

impl FitObserver for Sender<FitEvent> {
    // A dropped receiver just means nobody is listening any more
    fn on_progress(&mut self, percent: u8) {
        let _ = self.send(FitEvent::Progress(percent));
    }

    fn on_snapshot(&mut self, snapshot: FitSnapshot) {
        let _ = self.send(FitEvent::Snapshot(snapshot));
    }
}

impl FitObserver for Vec<FitEvent> {
    fn on_progress(&mut self, percent: u8) {
        self.push(FitEvent::Progress(percent));
    }

    fn on_snapshot(&mut self, snapshot: FitSnapshot) {
        self.push(FitEvent::Snapshot(snapshot));
    }
}

/// Observer that discards everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl FitObserver for NoopObserver {
    fn on_progress(&mut self, _percent: u8) {}

    fn on_snapshot(&mut self, _snapshot: FitSnapshot) {}
}
