//! Metrics sink and in-process registry
//!
//! - `increment`, `timing`, `gauge` are fire-and-forget
//! - Recording never fails and never blocks on I/O
//! - Thread-safe; each metric family is guarded independently

use std::collections::BTreeMap;
use std::sync::Mutex;

use serde::Serialize;

/// Narrow metrics interface consumed by the engine
pub trait MetricsSink: Send + Sync {
    /// Increment a counter by one
    fn increment(&self, name: &str);

    /// Record a duration in milliseconds
    fn timing(&self, name: &str, ms: u64);

    /// Set a gauge to its latest value
    fn gauge(&self, name: &str, value: f64);
}

/// Aggregate of all observations for one timing metric
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TimingSummary {
    /// Number of observations
    pub count: u64,
    /// Sum of all observations (ms)
    pub total_ms: u64,
    /// Largest observation (ms)
    pub max_ms: u64,
}

impl TimingSummary {
    /// Mean of all observations, 0 when empty
    pub fn mean_ms(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.total_ms as f64 / self.count as f64
        }
    }
}

/// Registry holding counters, gauges and timing summaries
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    counters: Mutex<BTreeMap<String, u64>>,
    gauges: Mutex<BTreeMap<String, f64>>,
    timings: Mutex<BTreeMap<String, TimingSummary>>,
}

impl MetricsRegistry {
    /// Create a new registry with no metrics recorded
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value of a counter (0 if never incremented)
    pub fn counter(&self, name: &str) -> u64 {
        self.counters
            .lock()
            .map(|c| c.get(name).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    /// Latest value of a gauge
    pub fn gauge_value(&self, name: &str) -> Option<f64> {
        self.gauges.lock().ok().and_then(|g| g.get(name).copied())
    }

    /// Timing summary for a metric
    pub fn timing_summary(&self, name: &str) -> Option<TimingSummary> {
        self.timings.lock().ok().and_then(|t| t.get(name).copied())
    }

    /// Get all metrics as a point-in-time snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            counters: self.counters.lock().map(|c| c.clone()).unwrap_or_default(),
            gauges: self.gauges.lock().map(|g| g.clone()).unwrap_or_default(),
            timings: self.timings.lock().map(|t| t.clone()).unwrap_or_default(),
        }
    }

    /// Render the snapshot as a JSON object
    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.snapshot()).unwrap_or_else(|_| "{}".to_string())
    }
}

impl MetricsSink for MetricsRegistry {
    fn increment(&self, name: &str) {
        if let Ok(mut counters) = self.counters.lock() {
            *counters.entry(name.to_string()).or_insert(0) += 1;
        }
    }

    fn timing(&self, name: &str, ms: u64) {
        if let Ok(mut timings) = self.timings.lock() {
            let summary = timings.entry(name.to_string()).or_default();
            summary.count += 1;
            summary.total_ms += ms;
            summary.max_ms = summary.max_ms.max(ms);
        }
    }

    fn gauge(&self, name: &str, value: f64) {
        if let Ok(mut gauges) = self.gauges.lock() {
            gauges.insert(name.to_string(), value);
        }
    }
}

/// A point-in-time snapshot of all metrics
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub counters: BTreeMap<String, u64>,
    pub gauges: BTreeMap<String, f64>,
    pub timings: BTreeMap<String, TimingSummary>,
}
