use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

/// Accuracy assumed for methods with no recorded feedback.
pub const DEFAULT_ACCURACY: f64 = 0.8;
/// Weight of the newest observation in the moving average.
pub const FEEDBACK_ALPHA: f64 = 0.2;

/// Per-method historical accuracy consumed by stacking fusion.
pub trait PerformanceHistory: Send + Sync {
    /// Known accuracy in [0, 1], `None` if the method has no history.
    fn accuracy(&self, method: &str) -> Option<f64>;

    /// Record whether `method` agreed with the ground truth.
    fn record(&self, method: &str, correct: bool);

    fn accuracy_or_default(&self, method: &str) -> f64 {
        self.accuracy(method).unwrap_or(DEFAULT_ACCURACY)
    }
}

/// Exponential moving average of per-method correctness, kept in memory.
#[derive(Debug)]
pub struct InMemoryPerformanceHistory {
    alpha: f64,
    accuracies: RwLock<HashMap<String, f64>>,
}

impl Default for InMemoryPerformanceHistory {
    fn default() -> Self {
        Self::with_alpha(FEEDBACK_ALPHA)
    }
}

impl InMemoryPerformanceHistory {
    pub fn with_alpha(alpha: f64) -> Self {
        Self {
            alpha: alpha.clamp(0.0, 1.0),
            accuracies: RwLock::new(HashMap::new()),
        }
    }

    /// Seed accuracies, e.g. from an offline evaluation.
    pub fn seeded<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, f64)>,
        K: Into<String>,
    {
        let history = Self::default();
        {
            let mut map = history
                .accuracies
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            for (k, v) in entries {
                map.insert(k.into(), v.clamp(0.0, 1.0));
            }
        }
        history
    }

    pub fn snapshot(&self) -> HashMap<String, f64> {
        self.accuracies
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl PerformanceHistory for InMemoryPerformanceHistory {
    fn accuracy(&self, method: &str) -> Option<f64> {
        self.accuracies
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(method)
            .copied()
    }

    fn record(&self, method: &str, correct: bool) {
        let observed = if correct { 1.0 } else { 0.0 };
        let mut map = self
            .accuracies
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let entry = map.entry(method.to_string()).or_insert(DEFAULT_ACCURACY);
        *entry += self.alpha * (observed - *entry);
    }
}
