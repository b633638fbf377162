//! Failure reporting for the text heuristics

use crate::error::ExtractError;
use std::sync::Mutex;

/// Receives internal failures caught at a heuristic's boundary.
///
/// The heuristics never propagate errors; they hand them to this
/// capability and return their input untouched.
pub trait HeuristicLog: Send + Sync {
    /// Called once per caught failure. `stage` names the heuristic.
    fn heuristic_failed(&self, stage: &str, error: &ExtractError);
}

/// Default sink, forwards failures to `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLog;

impl HeuristicLog for TracingLog {
    fn heuristic_failed(&self, stage: &str, error: &ExtractError) {
        tracing::error!(stage, %error, "heuristic failed, keeping input unchanged");
    }
}

/// Collects failures in memory, mostly useful in tests
#[derive(Debug, Default)]
pub struct RecordingLog {
    entries: Mutex<Vec<String>>,
}

impl RecordingLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every `stage: error` line recorded so far
    #[must_use]
    pub fn entries(&self) -> Vec<String> {
        self.entries
            .lock()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }
}

impl HeuristicLog for RecordingLog {
    fn heuristic_failed(&self, stage: &str, error: &ExtractError) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.push(format!("{stage}: {error}"));
        }
    }
}
