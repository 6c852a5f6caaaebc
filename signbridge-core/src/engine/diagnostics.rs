//! Orchestrator counters.

use std::sync::atomic::{AtomicUsize, Ordering};

use serde::Serialize;

#[derive(Debug, Default)]
pub struct OrchestratorDiagnostics {
    pub frames_interpreted: AtomicUsize,
    pub transcripts_interpreted: AtomicUsize,
    /// Backend or validation failures recovered locally.
    pub fallbacks: AtomicUsize,
    pub messages_committed: AtomicUsize,
    /// Triggers rejected because an interpretation was in flight.
    pub triggers_refused: AtomicUsize,
    /// Results with an empty or "..." translation.
    pub no_op_results: AtomicUsize,
}

impl OrchestratorDiagnostics {
    pub fn reset(&self) {
        self.frames_interpreted.store(0, Ordering::Relaxed);
        self.transcripts_interpreted.store(0, Ordering::Relaxed);
        self.fallbacks.store(0, Ordering::Relaxed);
        self.messages_committed.store(0, Ordering::Relaxed);
        self.triggers_refused.store(0, Ordering::Relaxed);
        self.no_op_results.store(0, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> DiagnosticsSnapshot {
        DiagnosticsSnapshot {
            frames_interpreted: self.frames_interpreted.load(Ordering::Relaxed),
            transcripts_interpreted: self.transcripts_interpreted.load(Ordering::Relaxed),
            fallbacks: self.fallbacks.load(Ordering::Relaxed),
            messages_committed: self.messages_committed.load(Ordering::Relaxed),
            triggers_refused: self.triggers_refused.load(Ordering::Relaxed),
            no_op_results: self.no_op_results.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn bump(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticsSnapshot {
    pub frames_interpreted: usize,
    pub transcripts_interpreted: usize,
    pub fallbacks: usize,
    pub messages_committed: usize,
    pub triggers_refused: usize,
    pub no_op_results: usize,
}
