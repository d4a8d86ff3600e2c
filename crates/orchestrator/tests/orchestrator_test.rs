//! End-to-end tests for the detection orchestrator with the built-in
//! detectors and with stand-in detectors for failure paths.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use vigil_core::{
    Config, DetectionError, DetectionMethodResult, DetectionRequest, DetectorKind, FusionStrategy,
    MultivariateDataPoint, Payload, Priority, RequestState, RunConfig, Severity,
};
use vigil_orchestrator::{DetectionContext, DetectionOrchestrator, Detector, DetectorRegistry};

/// Detector that always errors.
struct Broken(DetectorKind);

impl Detector for Broken {
    fn kind(&self) -> DetectorKind {
        self.0
    }

    fn detect(&self, _ctx: &DetectionContext) -> Result<DetectionMethodResult, DetectionError> {
        Err(DetectionError::MethodExecution {
            method: self.0.to_string(),
            reason: "numerical failure".to_string(),
        })
    }
}

/// Detector that spins until its deadline fires.
struct Stalling;

impl Detector for Stalling {
    fn kind(&self) -> DetectorKind {
        DetectorKind::TemporalPattern
    }

    fn detect(&self, ctx: &DetectionContext) -> Result<DetectionMethodResult, DetectionError> {
        loop {
            ctx.deadline.check()?;
            std::thread::sleep(Duration::from_millis(5));
        }
    }
}

fn spike_series() -> Vec<f64> {
    let mut v = vec![1.0; 19];
    v.push(100.0);
    v
}

fn cloud(n: usize) -> Vec<MultivariateDataPoint> {
    (0..n)
        .map(|i| {
            let t = i as f64;
            MultivariateDataPoint::new([
                ("cpu", (t * 0.7).sin()),
                ("mem", (t * 1.3).cos() * 0.5),
                ("net", (t * 0.4).sin() * 0.2),
            ])
        })
        .collect()
}

#[tokio::test]
async fn quiet_univariate_payload_selects_only_baseline() {
    let orchestrator = DetectionOrchestrator::new(Config::default());
    let result = orchestrator
        .detect(DetectionRequest::new(vec![5.0; 30]))
        .await
        .unwrap();

    assert_eq!(result.selected_methods, vec![DetectorKind::StatisticalEnsemble]);
    assert!(!result.fused_result.is_anomaly);
    assert_eq!(
        result.lifecycle,
        vec![
            RequestState::Received,
            RequestState::Classified,
            RequestState::MethodsSelected,
            RequestState::Executing,
            RequestState::Fusing,
            RequestState::Completed,
        ]
    );
}

#[tokio::test]
async fn failing_baseline_yields_neutral_result() {
    let mut registry = DetectorRegistry::empty();
    registry.register(Arc::new(Broken(DetectorKind::StatisticalEnsemble)));
    let orchestrator = DetectionOrchestrator::with_registry(Config::default(), registry);

    let result = orchestrator
        .detect(DetectionRequest::new(vec![5.0; 30]))
        .await
        .unwrap();

    assert_eq!(result.selected_methods, vec![DetectorKind::StatisticalEnsemble]);
    let fused = &result.fused_result;
    assert!(!fused.is_anomaly);
    assert_eq!(fused.severity, Severity::Low);
    assert_eq!(fused.confidence_score, 0.0);
    assert_eq!(fused.explanations, vec!["Unable to process: 0 detection methods available"]);
    assert_eq!(result.performance_metrics.failed_methods.len(), 1);
    assert_eq!(result.lifecycle.last(), Some(&RequestState::Failed));
}

#[tokio::test]
async fn stalled_method_hits_time_budget() {
    let mut registry = DetectorRegistry::empty();
    registry.register(Arc::new(Stalling));
    let orchestrator = DetectionOrchestrator::with_registry(Config::default(), registry);

    let request = DetectionRequest::new(vec![1.0, 2.0, 3.0])
        .with_methods(vec![DetectorKind::TemporalPattern])
        .with_config(RunConfig {
            max_processing_secs: Some(0.05),
            ..RunConfig::default()
        });
    let err = orchestrator.detect(request).await.unwrap_err();
    assert!(matches!(err, DetectionError::ResourceLimitExceeded(_)));
    assert_eq!(orchestrator.metrics().requests_failed, 1);
}

#[tokio::test]
async fn comprehensive_preset_flags_spike() {
    let orchestrator = DetectionOrchestrator::new(Config::for_preset("comprehensive").unwrap());
    let request = DetectionRequest::new(spike_series()).with_config(RunConfig {
        window_size: Some(10),
        ..RunConfig::default()
    });
    let result = orchestrator.detect(request).await.unwrap();

    for kind in DetectorKind::ALL {
        assert!(result.selected_methods.contains(&kind), "{kind} not selected");
    }
    assert!(result.per_method_results.len() >= 3);
    let fused = &result.fused_result;
    assert_eq!(fused.strategy, FusionStrategy::Weighted);
    assert!(fused.is_anomaly);
    assert!(fused.recommended_actions[0].starts_with("Immediate investigation"));

    let methods: Vec<&str> = fused.method_scores.keys().map(String::as_str).collect();
    let expected: Vec<&str> = result
        .per_method_results
        .iter()
        .map(|r| r.method.as_str())
        .collect();
    assert_eq!(methods, expected);

    let stats = result
        .per_method_results
        .iter()
        .find(|r| r.method == "statistical_ensemble")
        .unwrap();
    assert_eq!(stats.anomalous_entities, vec!["#19"]);
}

#[tokio::test]
async fn trained_multivariate_model_is_used() {
    let orchestrator = DetectionOrchestrator::new(Config::default());
    orchestrator.train(&Payload::Multivariate(cloud(100))).unwrap();
    assert!(orchestrator.multivariate().is_trained());

    let far = MultivariateDataPoint::new([("cpu", 50.0), ("mem", 50.0), ("net", 50.0)]).with_id("host-7");
    let request = DetectionRequest::new(Payload::Multivariate(vec![far]))
        .with_methods(vec![DetectorKind::MultivariateEnsemble]);
    let result = orchestrator.detect(request).await.unwrap();

    let r = &result.per_method_results[0];
    assert_eq!(r.diagnostics["self_fitted"], 0.0);
    assert_eq!(r.anomalous_entities, vec!["host-7"]);
    assert!(result.fused_result.is_anomaly);
}

#[tokio::test]
async fn json_graph_request_end_to_end() {
    let mut edges = Vec::new();
    for i in 0..10 {
        edges.push(json!({"source": "hub", "target": format!("leaf{i}")}));
    }
    let request: DetectionRequest = serde_json::from_value(json!({
        "payload": {"edges": edges},
        "methods": ["graph_structural"],
        "priority": "high"
    }))
    .unwrap();
    assert_eq!(request.priority(), Priority::High);

    let orchestrator = DetectionOrchestrator::new(Config::default());
    let result = orchestrator.detect(request).await.unwrap();
    let r = &result.per_method_results[0];
    assert_eq!(r.anomalous_entities, vec!["hub"]);
    assert_eq!(result.profile.data_type.to_string(), "graph");
    assert_eq!(orchestrator.pattern_engine().recent_graphs().len(), 1);
}

#[tokio::test]
async fn concurrent_requests_share_one_orchestrator() {
    let orchestrator = Arc::new(DetectionOrchestrator::new(Config::default()));
    let handles: Vec<_> = (0..4)
        .map(|i| {
            let o = Arc::clone(&orchestrator);
            tokio::spawn(async move {
                let mut values = vec![1.0; 30];
                values[i * 5] = 40.0;
                o.detect(DetectionRequest::new(values)).await
            })
        })
        .collect();
    for h in handles {
        assert!(h.await.unwrap().is_ok());
    }
    assert_eq!(orchestrator.metrics().requests_processed, 4);
    assert_eq!(orchestrator.analyzer().recent_profiles().len(), 4);
}
