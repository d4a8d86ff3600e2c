use serde::{Deserialize, Serialize};

/// Severity tier shared by every detector and the fusion engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

pub const MEDIUM_BREAKPOINT: f64 = 0.3;
pub const HIGH_BREAKPOINT: f64 = 0.6;
pub const CRITICAL_BREAKPOINT: f64 = 0.9;

impl Severity {
    /// Map a [0, 1] score onto a tier: <0.3 LOW, <0.6 MEDIUM, <0.9 HIGH, else CRITICAL.
    ///
    /// NaN maps to LOW.
    pub fn from_score(score: f64) -> Self {
        if score >= CRITICAL_BREAKPOINT {
            Severity::Critical
        } else if score >= HIGH_BREAKPOINT {
            Severity::High
        } else if score >= MEDIUM_BREAKPOINT {
            Severity::Medium
        } else {
            Severity::Low
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Low => write!(f, "LOW"),
            Severity::Medium => write!(f, "MEDIUM"),
            Severity::High => write!(f, "HIGH"),
            Severity::Critical => write!(f, "CRITICAL"),
        }
    }
}
