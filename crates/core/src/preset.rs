//! Configuration presets: default methods, threshold, fusion strategy and
//! resource limits, loaded from the embedded `presets.yaml` table.

use std::time::Duration;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::DetectionError;
use crate::method::{DetectorKind, FusionStrategy};

const BUILTIN_PRESETS_YAML: &str = include_str!("presets.yaml");

pub const DEFAULT_PRESET: &str = "standard";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preset {
    /// Filled from the table key when loaded.
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_methods")]
    pub default_methods: Vec<DetectorKind>,
    #[serde(default = "default_score_threshold")]
    pub score_threshold: f64,
    #[serde(default)]
    pub fusion_strategy: FusionStrategy,
    #[serde(default = "default_max_processing_secs")]
    pub max_processing_secs: f64,
    #[serde(default = "default_max_memory_mb")]
    pub max_memory_mb: u64,
    #[serde(default = "default_window_size")]
    pub window_size: usize,
}

fn default_methods() -> Vec<DetectorKind> { vec![DetectorKind::StatisticalEnsemble] }
fn default_score_threshold() -> f64 { 0.7 }
fn default_max_processing_secs() -> f64 { 30.0 }
fn default_max_memory_mb() -> u64 { 1024 }
fn default_window_size() -> usize { 20 }

impl Default for Preset {
    fn default() -> Self {
        Self {
            name: DEFAULT_PRESET.to_string(),
            description: String::new(),
            default_methods: default_methods(),
            score_threshold: default_score_threshold(),
            fusion_strategy: FusionStrategy::default(),
            max_processing_secs: default_max_processing_secs(),
            max_memory_mb: default_max_memory_mb(),
            window_size: default_window_size(),
        }
    }
}

impl Preset {
    /// Look up a built-in preset.
    pub fn by_name(name: &str) -> Result<Self, DetectionError> {
        PresetTable::builtin()?
            .get(name)
            .cloned()
            .ok_or_else(|| DetectionError::Config(format!("unknown preset: {name}")))
    }

    pub fn max_processing_time(&self) -> Duration {
        Duration::from_secs_f64(self.max_processing_secs.max(0.0))
    }

    pub fn max_memory_bytes(&self) -> usize {
        (self.max_memory_mb as usize).saturating_mul(1024 * 1024)
    }

    fn validate(&self) -> Result<(), DetectionError> {
        if !(0.0..=1.0).contains(&self.score_threshold) {
            return Err(DetectionError::Config(format!(
                "preset {}: score_threshold {} outside [0, 1]",
                self.name, self.score_threshold
            )));
        }
        if !self.max_processing_secs.is_finite() || self.max_processing_secs <= 0.0 {
            return Err(DetectionError::Config(format!(
                "preset {}: max_processing_secs must be positive",
                self.name
            )));
        }
        if self.window_size < 2 {
            return Err(DetectionError::Config(format!(
                "preset {}: window_size must be at least 2",
                self.name
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
struct PresetDocument {
    presets: IndexMap<String, Preset>,
}

/// Named presets in declaration order.
#[derive(Debug, Clone)]
pub struct PresetTable {
    presets: IndexMap<String, Preset>,
}

impl PresetTable {
    pub fn builtin() -> Result<Self, DetectionError> {
        Self::from_yaml(BUILTIN_PRESETS_YAML)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, DetectionError> {
        let doc: PresetDocument = serde_yaml::from_str(yaml)
            .map_err(|e| DetectionError::Config(format!("invalid preset table: {e}")))?;
        let mut presets = IndexMap::with_capacity(doc.presets.len());
        for (name, mut preset) in doc.presets {
            preset.name = name.clone();
            preset.validate()?;
            presets.insert(name, preset);
        }
        Ok(Self { presets })
    }

    pub fn get(&self, name: &str) -> Option<&Preset> {
        self.presets.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.presets.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Preset> {
        self.presets.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_table_parses() {
        let table = PresetTable::builtin().unwrap();
        let names: Vec<_> = table.names().collect();
        assert_eq!(names, vec!["lightweight", "standard", "comprehensive", "high-precision"]);
    }

    #[test]
    fn standard_preset_matches_defaults() {
        let table = PresetTable::builtin().unwrap();
        let standard = table.get("standard").unwrap();
        let mut expected = Preset::default();
        expected.description = standard.description.clone();
        assert_eq!(standard, &expected);
        assert_eq!(standard.max_processing_time(), Duration::from_secs(30));
        assert_eq!(standard.max_memory_bytes(), 1024 * 1024 * 1024);
    }

    #[test]
    fn comprehensive_preset_lists_every_method() {
        let table = PresetTable::builtin().unwrap();
        let preset = table.get("comprehensive").unwrap();
        assert_eq!(preset.default_methods, DetectorKind::ALL.to_vec());
        assert_eq!(preset.fusion_strategy, FusionStrategy::Weighted);
    }

    #[test]
    fn invalid_threshold_rejected() {
        let yaml = "presets:\n  broken:\n    score_threshold: 1.5\n";
        assert!(matches!(
            PresetTable::from_yaml(yaml),
            Err(DetectionError::Config(_))
        ));
    }

    #[test]
    fn missing_fields_use_defaults() {
        let table = PresetTable::from_yaml("presets:\n  minimal: {}\n").unwrap();
        let preset = table.get("minimal").unwrap();
        assert_eq!(preset.name, "minimal");
        assert_eq!(preset.window_size, 20);
        assert_eq!(preset.default_methods, vec![DetectorKind::StatisticalEnsemble]);
    }
}
