use std::env;

use serde::{Deserialize, Serialize};

use crate::error::DetectionError;
use crate::method::FusionStrategy;
use crate::preset::{Preset, DEFAULT_PRESET};
use crate::request::RunConfig;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Result<Option<T>, DetectionError> {
    match env_opt(key) {
        None => Ok(None),
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| DetectionError::Config(format!("{key}: cannot parse {raw:?}"))),
    }
}

// ── Engine settings ───────────────────────────────────────────

/// Multivariate detector settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultivariateConfig {
    /// Ensemble score above which a point is anomalous.
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    /// Upper bound on PCA / ICA components.
    #[serde(default = "default_max_components")]
    pub max_components: usize,
    #[serde(default = "default_power_iterations")]
    pub power_iterations: usize,
    #[serde(default = "default_ica_iterations")]
    pub ica_iterations: usize,
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
}

fn default_threshold() -> f64 { 0.7 }
fn default_max_components() -> usize { 10 }
fn default_power_iterations() -> usize { 1000 }
fn default_ica_iterations() -> usize { 200 }
fn default_tolerance() -> f64 { 1e-6 }

impl Default for MultivariateConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            max_components: default_max_components(),
            power_iterations: default_power_iterations(),
            ica_iterations: default_ica_iterations(),
            tolerance: default_tolerance(),
        }
    }
}

/// Pattern recognition settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternConfig {
    #[serde(default = "default_threshold")]
    pub graph_threshold: f64,
    #[serde(default = "default_threshold")]
    pub sequence_threshold: f64,
    #[serde(default = "default_window_size")]
    pub window_size: usize,
    /// Symbol alphabet size for sequence discretization.
    #[serde(default = "default_symbol_bins")]
    pub symbol_bins: usize,
    #[serde(default = "default_min_motif_len")]
    pub min_motif_len: usize,
    #[serde(default = "default_max_motif_len")]
    pub max_motif_len: usize,
    /// Sequence motifs kept after ranking by significance.
    #[serde(default = "default_max_motifs")]
    pub max_motifs: usize,
    #[serde(default = "default_pagerank_damping")]
    pub pagerank_damping: f64,
    #[serde(default = "default_pagerank_iterations")]
    pub pagerank_iterations: usize,
    #[serde(default = "default_tolerance")]
    pub pagerank_tolerance: f64,
}

fn default_window_size() -> usize { 20 }
fn default_symbol_bins() -> usize { 5 }
fn default_min_motif_len() -> usize { 3 }
fn default_max_motif_len() -> usize { 10 }
fn default_max_motifs() -> usize { 20 }
fn default_pagerank_damping() -> f64 { 0.85 }
fn default_pagerank_iterations() -> usize { 100 }

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            graph_threshold: default_threshold(),
            sequence_threshold: default_threshold(),
            window_size: default_window_size(),
            symbol_bins: default_symbol_bins(),
            min_motif_len: default_min_motif_len(),
            max_motif_len: default_max_motif_len(),
            max_motifs: default_max_motifs(),
            pagerank_damping: default_pagerank_damping(),
            pagerank_iterations: default_pagerank_iterations(),
            pagerank_tolerance: default_tolerance(),
        }
    }
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub preset: Preset,
    #[serde(default)]
    pub multivariate: MultivariateConfig,
    #[serde(default)]
    pub pattern: PatternConfig,
}

impl Config {
    /// Build config for a named built-in preset.
    pub fn for_preset(name: &str) -> Result<Self, DetectionError> {
        Ok(Self::from_preset(Preset::by_name(name)?))
    }

    pub fn from_preset(preset: Preset) -> Self {
        let pattern = PatternConfig {
            window_size: preset.window_size,
            ..PatternConfig::default()
        };
        Self {
            preset,
            multivariate: MultivariateConfig::default(),
            pattern,
        }
    }

    /// Build config from environment variables (call `load_dotenv()` first).
    ///
    /// `VIGIL_PRESET` selects the preset; `VIGIL_FUSION_STRATEGY`,
    /// `VIGIL_SCORE_THRESHOLD`, `VIGIL_MAX_PROCESSING_SECS`,
    /// `VIGIL_MAX_MEMORY_MB` and `VIGIL_WINDOW_SIZE` override its fields.
    pub fn from_env() -> Result<Self, DetectionError> {
        let name = env_opt("VIGIL_PRESET").unwrap_or_else(|| DEFAULT_PRESET.to_string());
        let mut config = Self::for_preset(&name)?;

        if let Some(raw) = env_opt("VIGIL_FUSION_STRATEGY") {
            config.preset.fusion_strategy = raw
                .parse::<FusionStrategy>()
                .map_err(DetectionError::Config)?;
        }
        if let Some(t) = env_parse::<f64>("VIGIL_SCORE_THRESHOLD")? {
            config.preset.score_threshold = t.clamp(0.0, 1.0);
        }
        if let Some(secs) = env_parse::<f64>("VIGIL_MAX_PROCESSING_SECS")? {
            config.preset.max_processing_secs = secs;
        }
        if let Some(mb) = env_parse::<u64>("VIGIL_MAX_MEMORY_MB")? {
            config.preset.max_memory_mb = mb;
        }
        if let Some(w) = env_parse::<usize>("VIGIL_WINDOW_SIZE")? {
            config.preset.window_size = w.max(2);
            config.pattern.window_size = w.max(2);
        }
        Ok(config)
    }

    /// The configuration in effect for one request: this config with the
    /// request's overrides applied.
    pub fn effective(&self, run: Option<&RunConfig>) -> Config {
        let mut config = self.clone();
        let Some(run) = run else {
            return config;
        };
        if let Some(strategy) = run.fusion_strategy {
            config.preset.fusion_strategy = strategy;
        }
        if let Some(t) = run.score_threshold {
            config.preset.score_threshold = t.clamp(0.0, 1.0);
        }
        if let Some(w) = run.window_size {
            config.preset.window_size = w.max(2);
            config.pattern.window_size = w.max(2);
        }
        if let Some(budget) = run.max_processing_time() {
            config.preset.max_processing_secs = budget.as_secs_f64();
        }
        config
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (preset: {}):", self.preset.name);
        tracing::info!("  methods:     {:?}", self.preset.default_methods);
        tracing::info!(
            "  fusion:      strategy={}, threshold={}",
            self.preset.fusion_strategy,
            self.preset.score_threshold
        );
        tracing::info!(
            "  limits:      time={}s, memory={}MB",
            self.preset.max_processing_secs,
            self.preset.max_memory_mb
        );
        tracing::info!(
            "  pattern:     window={}, motifs<={}",
            self.pattern.window_size,
            self.pattern.max_motifs
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::method::DetectorKind;

    #[test]
    fn for_preset_wires_window_size() {
        let config = Config::for_preset("high-precision").unwrap();
        assert_eq!(config.preset.window_size, 30);
        assert_eq!(config.pattern.window_size, 30);
        assert_eq!(config.preset.fusion_strategy, FusionStrategy::Stacking);
    }

    #[test]
    fn unknown_preset_is_a_config_error() {
        assert!(matches!(
            Config::for_preset("turbo"),
            Err(DetectionError::Config(_))
        ));
    }

    #[test]
    fn run_config_overrides_preset() {
        let base = Config::default();
        let run = RunConfig {
            fusion_strategy: Some(FusionStrategy::Voting),
            score_threshold: Some(2.0),
            window_size: Some(8),
            max_processing_secs: Some(1.5),
        };
        let eff = base.effective(Some(&run));
        assert_eq!(eff.preset.fusion_strategy, FusionStrategy::Voting);
        assert_eq!(eff.preset.score_threshold, 1.0);
        assert_eq!(eff.pattern.window_size, 8);
        assert_eq!(eff.preset.max_processing_secs, 1.5);
        assert_eq!(eff.preset.default_methods, vec![DetectorKind::StatisticalEnsemble]);

        assert_eq!(base.effective(None), base);
    }
}
