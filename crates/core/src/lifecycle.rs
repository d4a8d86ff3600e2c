use serde::{Deserialize, Serialize};

use crate::error::DetectionError;

/// Per-request processing state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestState {
    Received,
    Classified,
    MethodsSelected,
    Executing,
    Fusing,
    Completed,
    Failed,
}

impl RequestState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RequestState::Completed | RequestState::Failed)
    }

    /// Whether `next` may follow `self`.
    pub fn can_transition_to(&self, next: RequestState) -> bool {
        use RequestState::*;
        match (self, next) {
            (Received, Classified)
            | (Classified, MethodsSelected)
            | (MethodsSelected, Executing)
            | (Executing, Fusing)
            | (Fusing, Completed) => true,
            (s, Failed) => !s.is_terminal(),
            _ => false,
        }
    }
}

impl std::fmt::Display for RequestState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RequestState::Received => "received",
            RequestState::Classified => "classified",
            RequestState::MethodsSelected => "methods_selected",
            RequestState::Executing => "executing",
            RequestState::Fusing => "fusing",
            RequestState::Completed => "completed",
            RequestState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Validated trace of a request's state transitions.
#[derive(Debug, Clone)]
pub struct Lifecycle {
    trace: Vec<RequestState>,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            trace: vec![RequestState::Received],
        }
    }

    pub fn current(&self) -> RequestState {
        // The trace always starts with `Received`.
        self.trace[self.trace.len() - 1]
    }

    pub fn advance(&mut self, next: RequestState) -> Result<(), DetectionError> {
        let current = self.current();
        if !current.can_transition_to(next) {
            return Err(DetectionError::InvalidTransition {
                from: current.to_string(),
                to: next.to_string(),
            });
        }
        self.trace.push(next);
        Ok(())
    }

    pub fn trace(&self) -> &[RequestState] {
        &self.trace
    }

    pub fn into_trace(self) -> Vec<RequestState> {
        self.trace
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path() {
        let mut lc = Lifecycle::new();
        for s in [
            RequestState::Classified,
            RequestState::MethodsSelected,
            RequestState::Executing,
            RequestState::Fusing,
            RequestState::Completed,
        ] {
            lc.advance(s).unwrap();
        }
        assert_eq!(lc.trace().len(), 6);
        assert!(lc.current().is_terminal());
    }

    #[test]
    fn skipping_states_is_rejected() {
        let mut lc = Lifecycle::new();
        assert!(lc.advance(RequestState::Executing).is_err());
        assert_eq!(lc.current(), RequestState::Received);
    }

    #[test]
    fn terminal_states_are_final() {
        let mut lc = Lifecycle::new();
        lc.advance(RequestState::Failed).unwrap();
        assert!(lc.advance(RequestState::Failed).is_err());
        assert!(lc.advance(RequestState::Classified).is_err());
    }
}
