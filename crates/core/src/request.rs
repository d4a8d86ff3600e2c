use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::method::{DetectorKind, FusionStrategy};
use crate::payload::Payload;

/// Request priority tier. Ordered from least to most urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Resource-constrained: at most two methods run.
    Low,
    #[default]
    Medium,
    High,
    /// Forces the heavyweight and ensemble methods in.
    Critical,
}

impl std::str::FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            "critical" => Ok(Priority::Critical),
            other => Err(format!("unknown priority: {other}")),
        }
    }
}

/// Per-run overrides layered on top of the active preset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fusion_strategy: Option<FusionStrategy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score_threshold: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_size: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_processing_secs: Option<f64>,
}

impl RunConfig {
    pub fn max_processing_time(&self) -> Option<Duration> {
        self.max_processing_secs
            .filter(|s| s.is_finite() && *s >= 0.0)
            .map(Duration::from_secs_f64)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestMetadata {
    pub submitted_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl Default for RequestMetadata {
    fn default() -> Self {
        Self {
            submitted_at: Utc::now(),
            source: None,
        }
    }
}

/// A detection request. Fields are private; a request is immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionRequest {
    #[serde(default = "Uuid::new_v4")]
    id: Uuid,
    payload: Payload,
    #[serde(default)]
    priority: Priority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    methods: Option<Vec<DetectorKind>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    config: Option<RunConfig>,
    #[serde(default)]
    metadata: RequestMetadata,
}

impl DetectionRequest {
    pub fn new(payload: impl Into<Payload>) -> Self {
        Self {
            id: Uuid::new_v4(),
            payload: payload.into(),
            priority: Priority::default(),
            methods: None,
            config: None,
            metadata: RequestMetadata::default(),
        }
    }

    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = id;
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_methods(mut self, methods: Vec<DetectorKind>) -> Self {
        self.methods = Some(methods);
        self
    }

    pub fn with_config(mut self, config: RunConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.metadata.source = Some(source.into());
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    /// Explicit method list. An empty list counts as "not specified".
    pub fn methods(&self) -> Option<&[DetectorKind]> {
        self.methods.as_deref().filter(|m| !m.is_empty())
    }

    pub fn config(&self) -> Option<&RunConfig> {
        self.config.as_ref()
    }

    pub fn metadata(&self) -> &RequestMetadata {
        &self.metadata
    }
}
