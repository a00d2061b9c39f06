//! Observability subsystem
//!
//! - Structured logging (JSON lines, routed through `tracing`)
//! - Typed lifecycle events
//! - Metrics sink with an in-process registry
//! - Component health reports
//! - Observation scopes and timers
//!
//! # Usage
//!
//! ```ignore
//! use aero_analytics::observability::{log_event_with_fields, Event, MetricsRegistry, MetricsSink};
//!
//! log_event_with_fields(Event::QueryExecuted, &[("tier", "memory")]);
//!
//! let metrics = MetricsRegistry::new();
//! metrics.increment("query.executed");
//! ```

mod events;
mod health;
mod logger;
mod metrics;
mod scope;

pub use events::Event;
pub use health::{ComponentHealth, HealthStatus};
pub use logger::{Logger, Severity};
pub use metrics::{MetricsRegistry, MetricsSink, MetricsSnapshot, TimingSummary};
pub use scope::{ObservationScope, Timer};

/// Log a lifecycle event
pub fn log_event(event: Event) {
    log_event_with_fields(event, &[]);
}

/// Log a lifecycle event with fields
///
/// Failure events are logged at WARN; everything else at INFO.
pub fn log_event_with_fields(event: Event, fields: &[(&str, &str)]) {
    let severity = if event.is_failure() {
        Severity::Warn
    } else {
        Severity::Info
    };
    Logger::log(severity, event.as_str(), fields);
}

/// Log a lifecycle event at TRACE level
pub fn trace_event(event: Event, fields: &[(&str, &str)]) {
    Logger::log(Severity::Trace, event.as_str(), fields);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_event() {
        log_event(Event::EngineStart);
        log_event(Event::EngineStartComplete);
    }

    #[test]
    fn test_log_event_with_fields() {
        log_event_with_fields(Event::DatasetRejected, &[("dataset", "orders")]);
        trace_event(Event::TierFallback, &[("query_id", "q-1")]);
    }
}
