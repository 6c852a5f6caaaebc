//! Terminal host state shared by the command loop and the event printer.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use signbridge_core::{
    engine::DiagnosticsSnapshot, HoldTrigger, LexiconStore, Orchestrator,
};

use crate::settings::{save_settings, AppSettings};
use crate::storage::LocalStore;

pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    /// Persisted settings cache, written back on every change.
    pub settings: Mutex<AppSettings>,
    /// Absolute path to `settings.json`.
    pub settings_path: PathBuf,
    /// `None` when the database could not be opened and history is volatile.
    pub store: Option<Arc<LocalStore>>,
    pub lexicon: &'static LexiconStore,
    /// Press-and-hold shortcut to the learning hub.
    pub hold: Mutex<HoldTrigger>,
    /// Rolling latency of each lane, end to end.
    pub perf_metrics: Mutex<PerfMetrics>,
}

impl AppState {
    /// Apply `change` to the settings and persist them. A failed write is
    /// logged; the in-memory value still changes.
    pub fn update_settings(&self, change: impl FnOnce(&mut AppSettings)) {
        let mut settings = self.settings.lock();
        change(&mut settings);
        settings.normalize();
        if let Err(e) = save_settings(&self.settings_path, &settings) {
            tracing::warn!(path = %self.settings_path.display(), error = %e, "failed to persist settings");
        }
    }

    pub fn perf_snapshot(&self) -> PerfSnapshot {
        let metrics = self.perf_metrics.lock().snapshot();
        PerfSnapshot {
            diagnostics: self.orchestrator.diagnostics_snapshot(),
            sign_lane_ms: metrics.sign_lane_ms,
            voice_lane_ms: metrics.voice_lane_ms,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerfSnapshot {
    pub diagnostics: DiagnosticsSnapshot,
    pub sign_lane_ms: PerfStageSnapshot,
    pub voice_lane_ms: PerfStageSnapshot,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerfStageSnapshot {
    pub count: usize,
    pub mean_ms: f64,
    pub p50_ms: f64,
    pub p95_ms: f64,
    pub max_ms: f64,
}

#[derive(Debug, Default)]
pub struct PerfMetrics {
    sign_lane_ms: StageWindow,
    voice_lane_ms: StageWindow,
}

impl PerfMetrics {
    pub fn record_sign_lane(&mut self, elapsed_ms: f64) {
        self.sign_lane_ms.record(elapsed_ms);
    }

    pub fn record_voice_lane(&mut self, elapsed_ms: f64) {
        self.voice_lane_ms.record(elapsed_ms);
    }

    pub fn snapshot(&self) -> PerfMetricsSnapshot {
        PerfMetricsSnapshot {
            sign_lane_ms: self.sign_lane_ms.snapshot(),
            voice_lane_ms: self.voice_lane_ms.snapshot(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PerfMetricsSnapshot {
    pub sign_lane_ms: PerfStageSnapshot,
    pub voice_lane_ms: PerfStageSnapshot,
}

#[derive(Debug)]
struct StageWindow {
    samples: VecDeque<f64>,
    cap: usize,
    count: usize,
    sum_ms: f64,
    max_ms: f64,
}

impl Default for StageWindow {
    fn default() -> Self {
        Self {
            samples: VecDeque::with_capacity(128),
            cap: 128,
            count: 0,
            sum_ms: 0.0,
            max_ms: 0.0,
        }
    }
}

impl StageWindow {
    fn record(&mut self, elapsed_ms: f64) {
        let v = if elapsed_ms.is_finite() {
            elapsed_ms.max(0.0)
        } else {
            0.0
        };
        if self.samples.len() == self.cap {
            let _ = self.samples.pop_front();
        }
        self.samples.push_back(v);
        self.count = self.count.saturating_add(1);
        self.sum_ms += v;
        if v > self.max_ms {
            self.max_ms = v;
        }
    }

    fn snapshot(&self) -> PerfStageSnapshot {
        if self.samples.is_empty() {
            return PerfStageSnapshot {
                count: 0,
                mean_ms: 0.0,
                p50_ms: 0.0,
                p95_ms: 0.0,
                max_ms: 0.0,
            };
        }
        let mut sorted: Vec<f64> = self.samples.iter().copied().collect();
        sorted.sort_by(|a, b| a.total_cmp(b));

        let percentile = |p: f64| -> f64 {
            let n = sorted.len();
            let idx = ((n - 1) as f64 * p).round() as usize;
            sorted[idx.min(n - 1)]
        };

        PerfStageSnapshot {
            count: self.count,
            mean_ms: self.sum_ms / self.count as f64,
            p50_ms: percentile(0.50),
            p95_ms: percentile(0.95),
            max_ms: self.max_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn empty_window_reports_zeroes() {
        let snapshot = PerfMetrics::default().snapshot();
        assert_eq!(snapshot.sign_lane_ms.count, 0);
        assert_eq!(snapshot.voice_lane_ms.max_ms, 0.0);
    }

    #[test]
    fn window_tracks_percentiles_and_ignores_bad_samples() {
        let mut metrics = PerfMetrics::default();
        for ms in [120.0, 80.0, 100.0, f64::NAN, -5.0] {
            metrics.record_sign_lane(ms);
        }
        let sign = metrics.snapshot().sign_lane_ms;
        assert_eq!(sign.count, 5);
        assert_relative_eq!(sign.mean_ms, 60.0);
        assert_relative_eq!(sign.p50_ms, 80.0);
        assert_relative_eq!(sign.p95_ms, 120.0);
        assert_relative_eq!(sign.max_ms, 120.0);
    }

    #[test]
    fn window_keeps_only_the_most_recent_samples() {
        let mut window = StageWindow::default();
        for _ in 0..128 {
            window.record(1000.0);
        }
        for _ in 0..128 {
            window.record(10.0);
        }
        let snapshot = window.snapshot();
        assert_eq!(snapshot.count, 256);
        assert_relative_eq!(snapshot.p95_ms, 10.0);
        assert_relative_eq!(snapshot.max_ms, 1000.0);
    }
}
