use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::info;
use vigil_core::{Config, DetectionRequest, Payload, PresetTable, RunConfig};
use vigil_orchestrator::{profile_payload, DetectionOrchestrator};

use crate::cli::DetectArgs;

fn read_json(path: &Path) -> Result<Value> {
    let raw = if path == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read stdin")?;
        buf
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?
    };
    serde_json::from_str(&raw).with_context(|| format!("{} is not valid JSON", path.display()))
}

/// A document with a `payload` key is a full request; anything else is a
/// bare payload.
fn parse_request(doc: Value) -> Result<DetectionRequest> {
    if doc.get("payload").is_some() {
        serde_json::from_value(doc).context("invalid detection request")
    } else {
        Ok(DetectionRequest::new(Payload::from(doc)))
    }
}

fn print(value: &impl serde::Serialize, pretty: bool) -> Result<()> {
    let out = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{out}");
    Ok(())
}

pub async fn detect(config: Config, args: DetectArgs, pretty: bool) -> Result<()> {
    config.log_summary();
    let orchestrator = DetectionOrchestrator::new(config);

    if let Some(path) = &args.train {
        let reference = Payload::from(read_json(path)?);
        orchestrator
            .train(&reference)
            .with_context(|| format!("training on {} failed", path.display()))?;
    }

    let mut request = parse_request(read_json(&args.input)?)?;
    if let Some(priority) = args.priority {
        request = request.with_priority(priority);
    }
    if !args.methods.is_empty() {
        request = request.with_methods(args.methods.clone());
    }
    let overrides = RunConfig {
        fusion_strategy: args.strategy,
        score_threshold: args.threshold,
        window_size: args.window,
        max_processing_secs: args.timeout_secs,
    };
    if overrides != RunConfig::default() {
        let mut merged = request.config().cloned().unwrap_or_default();
        merged.fusion_strategy = overrides.fusion_strategy.or(merged.fusion_strategy);
        merged.score_threshold = overrides.score_threshold.or(merged.score_threshold);
        merged.window_size = overrides.window_size.or(merged.window_size);
        merged.max_processing_secs = overrides.max_processing_secs.or(merged.max_processing_secs);
        request = request.with_config(merged);
    }

    let result = orchestrator
        .detect(request)
        .await
        .context("detection failed")?;
    info!(
        "{} methods ran, anomaly={}, severity={}",
        result.performance_metrics.methods_succeeded,
        result.fused_result.is_anomaly,
        result.fused_result.severity
    );
    print(&result, pretty)
}

pub fn profile(input: &Path, pretty: bool) -> Result<()> {
    let payload = Payload::from(read_json(input)?);
    print(&profile_payload(&payload), pretty)
}

pub fn presets(pretty: bool) -> Result<()> {
    let table = PresetTable::builtin().context("built-in presets are invalid")?;
    let presets: Vec<_> = table.iter().collect();
    print(&presets, pretty)
}
