use serde::{Deserialize, Serialize};

/// The closed set of detector methods the orchestrator can dispatch to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectorKind {
    /// Lightweight baseline: z-score, IQR fence and MAD sub-tests.
    StatisticalEnsemble,
    /// Sliding-window and local-neighbourhood sequence analysis.
    TemporalPattern,
    /// Graph centrality analysis on true or derived graphs.
    GraphStructural,
    /// PCA / ICA / Mahalanobis ensemble. The expensive one.
    MultivariateEnsemble,
}

impl DetectorKind {
    pub const ALL: [DetectorKind; 4] = [
        DetectorKind::StatisticalEnsemble,
        DetectorKind::TemporalPattern,
        DetectorKind::GraphStructural,
        DetectorKind::MultivariateEnsemble,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DetectorKind::StatisticalEnsemble => "statistical_ensemble",
            DetectorKind::TemporalPattern => "temporal_pattern",
            DetectorKind::GraphStructural => "graph_structural",
            DetectorKind::MultivariateEnsemble => "multivariate_ensemble",
        }
    }

    pub fn is_heavyweight(&self) -> bool {
        matches!(self, DetectorKind::MultivariateEnsemble)
    }
}

impl std::fmt::Display for DetectorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DetectorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DetectorKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| format!("unknown detection method: {s}"))
    }
}

/// Policy used to combine per-method results into one verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FusionStrategy {
    Voting,
    Weighted,
    Stacking,
    #[default]
    Adaptive,
}

impl std::fmt::Display for FusionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FusionStrategy::Voting => write!(f, "voting"),
            FusionStrategy::Weighted => write!(f, "weighted"),
            FusionStrategy::Stacking => write!(f, "stacking"),
            FusionStrategy::Adaptive => write!(f, "adaptive"),
        }
    }
}

impl std::str::FromStr for FusionStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "voting" => Ok(FusionStrategy::Voting),
            "weighted" => Ok(FusionStrategy::Weighted),
            "stacking" => Ok(FusionStrategy::Stacking),
            "adaptive" => Ok(FusionStrategy::Adaptive),
            other => Err(format!("unknown fusion strategy: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_names_round_trip_through_from_str() {
        for kind in DetectorKind::ALL {
            assert_eq!(kind.as_str().parse::<DetectorKind>().unwrap(), kind);
        }
        assert!("lstm".parse::<DetectorKind>().is_err());
    }

    #[test]
    fn kind_serializes_snake_case() {
        let json = serde_json::to_string(&DetectorKind::GraphStructural).unwrap();
        assert_eq!(json, "\"graph_structural\"");
    }

    #[test]
    fn fusion_strategy_defaults_to_adaptive() {
        assert_eq!(FusionStrategy::default(), FusionStrategy::Adaptive);
        assert_eq!("Weighted".parse::<FusionStrategy>().unwrap(), FusionStrategy::Weighted);
    }
}
