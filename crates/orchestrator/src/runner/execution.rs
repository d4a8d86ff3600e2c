use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use indexmap::IndexMap;
use tracing::{debug, info, warn};
use uuid::Uuid;
use vigil_core::{
    Deadline, DetectionError, DetectionMethodResult, DetectionRequest, DetectionResult,
    DetectorKind, Lifecycle, MethodFailure, PerformanceMetrics, RequestState,
};

use super::selection::{estimate_memory, select_methods};
use super::DetectionOrchestrator;
use crate::detectors::DetectionContext;

/// Outcome of one method task.
enum MethodOutcome {
    Succeeded(DetectionMethodResult, Duration),
    Failed(MethodFailure, Duration),
    /// The method ran out of budget; the whole request is abandoned.
    Aborted(DetectionError),
}

impl DetectionOrchestrator {
    /// Run one request through classification, selection, concurrent method
    /// execution and fusion.
    ///
    /// Method failures are absorbed into the result. Only resource-limit
    /// breaches surface as errors; the partial results are discarded.
    pub async fn detect(&self, request: DetectionRequest) -> Result<DetectionResult, DetectionError> {
        let started = Instant::now();
        let request_id = request.id();
        let mut lifecycle = Lifecycle::new();
        info!(request_id = %request_id, priority = ?request.priority(), "detection request received");

        let config = Arc::new(self.config.effective(request.config()));
        let payload = Arc::new(request.payload().clone());

        let profile = self.analyzer.classify(&payload);
        advance(&mut lifecycle, RequestState::Classified, request_id);

        let selected = select_methods(
            request.methods(),
            &profile,
            &config.preset.default_methods,
            request.priority(),
        );
        advance(&mut lifecycle, RequestState::MethodsSelected, request_id);
        info!(request_id = %request_id, data_type = %profile.data_type, methods = ?selected, "methods selected");

        let memory_estimate = estimate_memory(&payload, &selected);
        let memory_budget = config.preset.max_memory_bytes();
        if memory_estimate > memory_budget {
            return Err(self.fail(
                &mut lifecycle,
                request_id,
                DetectionError::ResourceLimitExceeded(format!(
                    "estimated memory {memory_estimate} bytes exceeds budget of {memory_budget} bytes"
                )),
            ));
        }

        advance(&mut lifecycle, RequestState::Executing, request_id);
        let budget = config.preset.max_processing_time();
        let deadline = Deadline::after(budget);
        let ctx = DetectionContext::new(payload, Arc::clone(&config), deadline.clone());

        let outcomes = match tokio::time::timeout(budget, self.run_methods(&selected, &ctx)).await {
            Ok(outcomes) => outcomes,
            Err(_) => {
                deadline.cancel();
                return Err(self.fail(
                    &mut lifecycle,
                    request_id,
                    DetectionError::ResourceLimitExceeded(format!(
                        "processing exceeded {:.3}s budget",
                        budget.as_secs_f64()
                    )),
                ));
            }
        };

        let mut per_method_results = Vec::with_capacity(outcomes.len());
        let mut method_times_ms = IndexMap::with_capacity(outcomes.len());
        let mut failed_methods = Vec::new();
        for (kind, outcome) in selected.iter().zip(outcomes) {
            match outcome {
                MethodOutcome::Succeeded(result, elapsed) => {
                    method_times_ms.insert(kind.to_string(), elapsed.as_secs_f64() * 1000.0);
                    if let Ok(mut m) = self.metrics.write() {
                        m.record_execution(kind.as_str(), elapsed);
                    }
                    per_method_results.push(result);
                }
                MethodOutcome::Failed(failure, elapsed) => {
                    method_times_ms.insert(kind.to_string(), elapsed.as_secs_f64() * 1000.0);
                    warn!(request_id = %request_id, method = %failure.method, "Method failed: {}", failure.reason);
                    if let Ok(mut m) = self.metrics.write() {
                        m.record_failure(kind.as_str());
                    }
                    failed_methods.push(failure);
                }
                MethodOutcome::Aborted(err) => {
                    deadline.cancel();
                    return Err(self.fail(&mut lifecycle, request_id, err));
                }
            }
        }

        advance(&mut lifecycle, RequestState::Fusing, request_id);
        let fused_result = self
            .fusion
            .fuse(&per_method_results, config.preset.fusion_strategy);
        if per_method_results.is_empty() {
            warn!(request_id = %request_id, "no detection method produced a result");
            advance(&mut lifecycle, RequestState::Failed, request_id);
        } else {
            advance(&mut lifecycle, RequestState::Completed, request_id);
        }

        let total_ms = started.elapsed().as_secs_f64() * 1000.0;
        if let Ok(mut m) = self.metrics.write() {
            m.record_request(true);
        }
        info!(
            request_id = %request_id,
            is_anomaly = fused_result.is_anomaly,
            score = fused_result.final_score,
            severity = %fused_result.severity,
            elapsed_ms = total_ms,
            "detection completed"
        );

        Ok(DetectionResult {
            request_id,
            profile,
            performance_metrics: PerformanceMetrics {
                total_time_ms: total_ms,
                method_times_ms,
                memory_estimate_bytes: memory_estimate,
                methods_attempted: selected.len(),
                methods_succeeded: per_method_results.len(),
                failed_methods,
            },
            selected_methods: selected,
            per_method_results,
            fused_result,
            lifecycle: lifecycle.into_trace(),
            timestamp: Utc::now(),
            total_processing_time_ms: total_ms,
        })
    }

    /// Launch one blocking task per method and wait for all of them.
    async fn run_methods(&self, selected: &[DetectorKind], ctx: &DetectionContext) -> Vec<MethodOutcome> {
        let handles: Vec<_> = selected
            .iter()
            .map(|&kind| {
                let detector = self.registry.get(kind);
                let ctx = ctx.clone();
                tokio::task::spawn_blocking(move || {
                    let started = Instant::now();
                    let result = match detector {
                        Some(d) => d.detect(&ctx),
                        None => Err(DetectionError::MethodExecution {
                            method: kind.to_string(),
                            reason: "no detector registered".to_string(),
                        }),
                    };
                    (result, started.elapsed())
                })
            })
            .collect();

        let mut outcomes = Vec::with_capacity(handles.len());
        for (kind, handle) in selected.iter().zip(handles) {
            let outcome = match handle.await {
                Ok((Ok(result), elapsed)) => {
                    debug!(method = %kind, score = result.score, "method finished");
                    MethodOutcome::Succeeded(result, elapsed)
                }
                Ok((Err(err @ DetectionError::ResourceLimitExceeded(_)), _)) => MethodOutcome::Aborted(err),
                Ok((Err(err), elapsed)) => MethodOutcome::Failed(
                    MethodFailure {
                        method: kind.to_string(),
                        reason: err.to_string(),
                    },
                    elapsed,
                ),
                Err(join_err) => MethodOutcome::Failed(
                    MethodFailure {
                        method: kind.to_string(),
                        reason: format!("task panicked: {join_err}"),
                    },
                    Duration::ZERO,
                ),
            };
            outcomes.push(outcome);
        }
        outcomes
    }

    /// Mark the request failed and hand back the error to return.
    fn fail(&self, lifecycle: &mut Lifecycle, request_id: Uuid, err: DetectionError) -> DetectionError {
        advance(lifecycle, RequestState::Failed, request_id);
        if let Ok(mut m) = self.metrics.write() {
            m.record_request(false);
        }
        warn!(request_id = %request_id, "detection failed: {}", err);
        err
    }
}

fn advance(lifecycle: &mut Lifecycle, next: RequestState, request_id: Uuid) {
    match lifecycle.advance(next) {
        Ok(()) => debug!(request_id = %request_id, state = %next, "request state changed"),
        Err(e) => debug!(request_id = %request_id, "{e}"),
    }
}
