//! Cooperative cancellation for long-running numerical loops.
//!
//! Iterative routines (power iteration, FastICA, PageRank, betweenness,
//! sliding windows) call [`Deadline::check`] every few iterations. The
//! orchestrator cancels the shared flag when a request exceeds its time
//! budget so in-flight blocking tasks stop promptly.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::DetectionError;

/// How many loop iterations may pass between two deadline checks.
pub const CHECK_INTERVAL: usize = 16;

#[derive(Debug, Clone)]
pub struct Deadline {
    expires_at: Option<Instant>,
    cancelled: Arc<AtomicBool>,
}

impl Deadline {
    /// A deadline that never expires and can only be cancelled explicitly.
    pub fn none() -> Self {
        Self {
            expires_at: None,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// A deadline expiring `budget` from now.
    pub fn after(budget: Duration) -> Self {
        Self {
            expires_at: Instant::now().checked_add(budget),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    pub fn is_expired(&self) -> bool {
        self.is_cancelled() || self.expires_at.is_some_and(|t| Instant::now() >= t)
    }

    /// Time left before expiry, `None` when unbounded.
    pub fn remaining(&self) -> Option<Duration> {
        self.expires_at
            .map(|t| t.saturating_duration_since(Instant::now()))
    }

    /// Fail with `ResourceLimitExceeded` once cancelled or expired.
    pub fn check(&self) -> Result<(), DetectionError> {
        if self.is_cancelled() {
            return Err(DetectionError::ResourceLimitExceeded(
                "processing cancelled".to_string(),
            ));
        }
        if self.is_expired() {
            return Err(DetectionError::ResourceLimitExceeded(
                "processing time budget exhausted".to_string(),
            ));
        }
        Ok(())
    }

    /// Check only every [`CHECK_INTERVAL`] iterations.
    pub fn check_every(&self, iteration: usize) -> Result<(), DetectionError> {
        if iteration % CHECK_INTERVAL == 0 {
            self.check()
        } else {
            Ok(())
        }
    }
}

impl Default for Deadline {
    fn default() -> Self {
        Self::none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unbounded_deadline_passes() {
        let d = Deadline::none();
        assert!(d.check().is_ok());
        assert!(d.remaining().is_none());
    }

    #[test]
    fn cancel_is_shared_between_clones() {
        let d = Deadline::none();
        let clone = d.clone();
        d.cancel();
        assert!(clone.is_cancelled());
        assert!(matches!(
            clone.check(),
            Err(DetectionError::ResourceLimitExceeded(_))
        ));
    }

    #[test]
    fn zero_budget_expires_immediately() {
        let d = Deadline::after(Duration::ZERO);
        assert!(d.is_expired());
        assert!(d.check().is_err());
    }

    #[test]
    fn check_every_skips_off_interval() {
        let d = Deadline::after(Duration::ZERO);
        assert!(d.check_every(1).is_ok());
        assert!(d.check_every(CHECK_INTERVAL).is_err());
    }
}
