//! Observability for rollup runs
//!
//! - Structured logging (one JSON object per line)
//! - Typed lifecycle events
//! - Run counters
//! - Scoped begin/complete logging
//!
//! Observability never changes what a run computes or writes.
//!
//! # Usage
//!
//! ```ignore
//! use downline::observability::{log_event_with_fields, Event, ObservationScope};
//!
//! log_event_with_fields(Event::PeriodIndexed, &[("accepted", "42")]);
//!
//! let scope = ObservationScope::new("ROLLUP");
//! // ... compute ...
//! scope.complete();
//! ```

mod events;
mod logger;
mod metrics;
mod scope;

pub use events::Event;
pub use logger::{Logger, Severity};
pub use metrics::{MetricsSnapshot, RunMetrics};
pub use scope::{ObservationScope, Timer};

/// Log a lifecycle event with fields at its default severity
pub fn log_event_with_fields(event: Event, fields: &[(&str, &str)]) {
    Logger::log(event.severity(), event.as_str(), fields);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_event() {
        log_event_with_fields(Event::RunStart, &[]);
        log_event_with_fields(Event::ForestBuilt, &[("nodes", "4"), ("roots", "1")]);
    }
}
