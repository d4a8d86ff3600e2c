use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Orchestrator operational counters.
#[derive(Debug, Clone, Default, Serialize)]
pub struct OrchestratorMetrics {
    pub requests_processed: u64,
    /// Requests that ended in a caller-visible error.
    pub requests_failed: u64,
    /// Successful executions by method name.
    pub method_executions: HashMap<String, u64>,
    /// Failed executions by method name.
    pub method_failures: HashMap<String, u64>,
    /// Rolling average duration of successful executions by method name.
    pub avg_method_duration: HashMap<String, Duration>,
    pub last_request_at: Option<DateTime<Utc>>,
}

impl OrchestratorMetrics {
    /// Record a successful method execution.
    pub fn record_execution(&mut self, method: &str, duration: Duration) {
        let count = {
            let c = self.method_executions.entry(method.to_string()).or_default();
            *c += 1;
            *c
        };

        let prev_avg = self
            .avg_method_duration
            .get(method)
            .copied()
            .unwrap_or_default();

        // Incremental mean: new_avg = prev_avg + (duration - prev_avg) / count
        let new_avg = if count == 1 {
            duration
        } else {
            let prev_nanos = prev_avg.as_nanos() as f64;
            let cur_nanos = duration.as_nanos() as f64;
            let avg_nanos = prev_nanos + (cur_nanos - prev_nanos) / count as f64;
            Duration::from_nanos(avg_nanos as u64)
        };

        self.avg_method_duration.insert(method.to_string(), new_avg);
    }

    pub fn record_failure(&mut self, method: &str) {
        *self.method_failures.entry(method.to_string()).or_default() += 1;
    }

    /// Record a finished request; `ok` is false when it surfaced an error.
    pub fn record_request(&mut self, ok: bool) {
        if ok {
            self.requests_processed += 1;
        } else {
            self.requests_failed += 1;
        }
        self.last_request_at = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_multiple_executions_averages() {
        let mut m = OrchestratorMetrics::default();
        m.record_execution("temporal_pattern", Duration::from_millis(100));
        m.record_execution("temporal_pattern", Duration::from_millis(200));

        assert_eq!(m.method_executions["temporal_pattern"], 2);
        let avg = m.avg_method_duration["temporal_pattern"].as_millis();
        assert!((140..=160).contains(&avg), "expected ~150ms, got {}ms", avg);
    }

    #[test]
    fn failures_and_requests_are_counted_separately() {
        let mut m = OrchestratorMetrics::default();
        m.record_failure("graph_structural");
        m.record_request(true);
        m.record_request(false);

        assert_eq!(m.method_failures["graph_structural"], 1);
        assert!(m.method_executions.is_empty());
        assert_eq!(m.requests_processed, 1);
        assert_eq!(m.requests_failed, 1);
        assert!(m.last_request_at.is_some());
    }
}
