// Private module declaration
mod server;

use prometheus::{
    HistogramOpts, HistogramVec, IntCounter, IntCounterVec,
    IntGauge, Opts, Registry,
};

// Re-export for public API
pub use server::start_metrics_server;

// ============================================================================
// Metrics Module - Prometheus metrics for observability
// ============================================================================
//
// Provides metrics for:
// - Aggregate commands and their outcomes (applied / noop / rejected / failed)
// - Events appended to the user log
// - Saga router delivery (throughput, latency, failures)
// - Retry attempts and outcomes
// - Dead Letter Queue statistics
// - Compensation timers
//
// ============================================================================

/// Outcome label for a command handled by an aggregate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    Applied,
    NoOp,
    Rejected,
    Failed,
}

impl CommandOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandOutcome::Applied => "applied",
            CommandOutcome::NoOp => "noop",
            CommandOutcome::Rejected => "rejected",
            CommandOutcome::Failed => "failed",
        }
    }
}

/// Central metrics registry for the entire application
pub struct Metrics {
    registry: Registry,

    // Aggregate Metrics
    pub commands_total: IntCounterVec,
    pub events_appended: IntCounterVec,

    // Router Metrics
    pub router_events_processed: IntCounterVec,
    pub router_events_failed: IntCounterVec,
    pub router_processing_duration: HistogramVec,

    // Retry Metrics
    pub retry_attempts_total: IntCounterVec,
    pub retry_success: IntCounterVec,
    pub retry_failure: IntCounterVec,

    // DLQ Metrics
    pub dlq_messages_total: IntCounter,
    pub dlq_messages_by_event_type: IntCounterVec,
    pub dlq_parked: IntGauge,

    // Compensation Timer Metrics
    pub timers_scheduled: IntCounter,
    pub timers_fired: IntCounterVec,
    pub timers_pending: IntGauge,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let commands_total = IntCounterVec::new(
            Opts::new("aggregate_commands_total", "Commands handled by aggregates"),
            &["aggregate", "command", "outcome"],
        )?;
        registry.register(Box::new(commands_total.clone()))?;

        let events_appended = IntCounterVec::new(
            Opts::new("events_appended_total", "Events appended to aggregate logs"),
            &["event_type"],
        )?;
        registry.register(Box::new(events_appended.clone()))?;

        let router_events_processed = IntCounterVec::new(
            Opts::new("saga_router_events_processed_total", "Events routed to email reservations"),
            &["event_type"],
        )?;
        registry.register(Box::new(router_events_processed.clone()))?;

        let router_events_failed = IntCounterVec::new(
            Opts::new("saga_router_events_failed_total", "Events the router failed to deliver"),
            &["event_type", "reason"],
        )?;
        registry.register(Box::new(router_events_failed.clone()))?;

        let router_processing_duration = HistogramVec::new(
            HistogramOpts::new("saga_router_processing_duration_seconds", "Router delivery duration")
                .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
            &["event_type"],
        )?;
        registry.register(Box::new(router_processing_duration.clone()))?;

        let retry_attempts_total = IntCounterVec::new(
            Opts::new("retry_attempts_total", "Total retry attempts"),
            &["operation", "attempt"],
        )?;
        registry.register(Box::new(retry_attempts_total.clone()))?;

        let retry_success = IntCounterVec::new(
            Opts::new("retry_success_total", "Operations that succeeded after at least one retry"),
            &["operation"],
        )?;
        registry.register(Box::new(retry_success.clone()))?;

        let retry_failure = IntCounterVec::new(
            Opts::new("retry_failure_total", "Total failed retries after all attempts"),
            &["operation"],
        )?;
        registry.register(Box::new(retry_failure.clone()))?;

        let dlq_messages_total = IntCounter::new(
            "dlq_messages_total",
            "Total messages in dead letter queue",
        )?;
        registry.register(Box::new(dlq_messages_total.clone()))?;

        let dlq_messages_by_event_type = IntCounterVec::new(
            Opts::new("dlq_messages_by_event_type", "DLQ messages by event type"),
            &["event_type"],
        )?;
        registry.register(Box::new(dlq_messages_by_event_type.clone()))?;

        let dlq_parked = IntGauge::new(
            "dlq_messages_parked",
            "Events currently parked in the dead letter queue",
        )?;
        registry.register(Box::new(dlq_parked.clone()))?;

        let timers_scheduled = IntCounter::new(
            "compensation_timers_scheduled_total",
            "Compensation timers scheduled",
        )?;
        registry.register(Box::new(timers_scheduled.clone()))?;

        let timers_fired = IntCounterVec::new(
            Opts::new("compensation_timers_fired_total", "Compensation timer firings"),
            &["outcome"],
        )?;
        registry.register(Box::new(timers_fired.clone()))?;

        let timers_pending = IntGauge::new(
            "compensation_timers_pending",
            "Compensation timers waiting to fire or to be retried",
        )?;
        registry.register(Box::new(timers_pending.clone()))?;

        Ok(Self {
            registry,
            commands_total,
            events_appended,
            router_events_processed,
            router_events_failed,
            router_processing_duration,
            retry_attempts_total,
            retry_success,
            retry_failure,
            dlq_messages_total,
            dlq_messages_by_event_type,
            dlq_parked,
            timers_scheduled,
            timers_fired,
            timers_pending,
        })
    }

    /// Get the Prometheus registry for exposing metrics via HTTP
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn record_command(&self, aggregate: &str, command: &str, outcome: CommandOutcome) {
        self.commands_total
            .with_label_values(&[aggregate, command, outcome.as_str()])
            .inc();
    }

    pub fn record_events_appended(&self, event_type: &str) {
        self.events_appended.with_label_values(&[event_type]).inc();
    }

    pub fn record_router_event(&self, event_type: &str, duration_secs: f64, success: bool) {
        if success {
            self.router_events_processed.with_label_values(&[event_type]).inc();
        } else {
            self.router_events_failed.with_label_values(&[event_type, "delivery_error"]).inc();
        }
        self.router_processing_duration.with_label_values(&[event_type]).observe(duration_secs);
    }

    pub fn record_retry_attempt(&self, operation: &str, attempt: u32) {
        let attempt = attempt.to_string();
        self.retry_attempts_total.with_label_values(&[operation, attempt.as_str()]).inc();
    }

    pub fn record_retry_outcome(&self, operation: &str, success: bool) {
        if success {
            self.retry_success.with_label_values(&[operation]).inc();
        } else {
            self.retry_failure.with_label_values(&[operation]).inc();
        }
    }

    pub fn record_dlq_message(&self, event_type: &str) {
        self.dlq_messages_total.inc();
        self.dlq_messages_by_event_type.with_label_values(&[event_type]).inc();
        self.dlq_parked.inc();
    }

    /// A parked event was delivered after all, or evicted
    pub fn record_dlq_removed(&self) {
        self.dlq_parked.dec();
    }

    pub fn record_timer_scheduled(&self) {
        self.timers_scheduled.inc();
        self.timers_pending.inc();
    }

    /// `completed` = the Release went through and the timer is gone
    pub fn record_timer_fired(&self, completed: bool) {
        if completed {
            self.timers_fired.with_label_values(&["released"]).inc();
            self.timers_pending.dec();
        } else {
            self.timers_fired.with_label_values(&["retry"]).inc();
        }
    }

    /// Timers reloaded from the store after a restart
    pub fn set_timers_pending(&self, pending: usize) {
        self.timers_pending.set(pending as i64);
    }

    pub fn command_count(&self, aggregate: &str, command: &str, outcome: CommandOutcome) -> u64 {
        self.commands_total
            .with_label_values(&[aggregate, command, outcome.as_str()])
            .get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new().unwrap();
        assert!(!metrics.registry().gather().is_empty());
    }

    #[test]
    fn test_record_command_outcomes() {
        let metrics = Metrics::new().unwrap();
        metrics.record_command("unique_email", "confirm", CommandOutcome::Applied);
        metrics.record_command("unique_email", "confirm", CommandOutcome::NoOp);
        metrics.record_command("unique_email", "confirm", CommandOutcome::NoOp);

        assert_eq!(metrics.command_count("unique_email", "confirm", CommandOutcome::Applied), 1);
        assert_eq!(metrics.command_count("unique_email", "confirm", CommandOutcome::NoOp), 2);
        assert_eq!(metrics.command_count("unique_email", "reserve", CommandOutcome::Rejected), 0);
    }

    #[test]
    fn test_record_router_event() {
        let metrics = Metrics::new().unwrap();
        metrics.record_router_event("UserCreated", 0.01, true);
        metrics.record_router_event("UserCreated", 0.02, false);

        assert_eq!(metrics.router_events_processed.with_label_values(&["UserCreated"]).get(), 1);
        assert_eq!(
            metrics.router_events_failed.with_label_values(&["UserCreated", "delivery_error"]).get(),
            1
        );
    }

    #[test]
    fn test_record_dlq_message() {
        let metrics = Metrics::new().unwrap();
        metrics.record_dlq_message("UserCreated");
        metrics.record_dlq_message("EmailUnassigned");

        assert_eq!(metrics.dlq_messages_total.get(), 2);
        assert_eq!(metrics.dlq_parked.get(), 2);

        metrics.record_dlq_removed();
        assert_eq!(metrics.dlq_parked.get(), 1);
        assert_eq!(metrics.dlq_messages_total.get(), 2);
    }

    #[test]
    fn test_timer_gauge_tracks_pending() {
        let metrics = Metrics::new().unwrap();
        metrics.record_timer_scheduled();
        metrics.record_timer_scheduled();
        metrics.record_timer_fired(false);
        metrics.record_timer_fired(true);

        assert_eq!(metrics.timers_scheduled.get(), 2);
        assert_eq!(metrics.timers_pending.get(), 1);
        assert_eq!(metrics.timers_fired.with_label_values(&["retry"]).get(), 1);
    }
}
