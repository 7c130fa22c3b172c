//! Hub lifecycle state
//!
//! ```text
//! NotLoaded → SetupInProgress → Loaded
//!                            ↘ SetupError → SetupInProgress (retry)
//!
//! Loaded/SetupError → UnloadInProgress → NotLoaded
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lifecycle state of an [`XComfortHub`](crate::XComfortHub)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum HubState {
    #[default]
    NotLoaded,
    SetupInProgress,
    /// Update task running
    Loaded,
    /// Setup failed; setup may be retried
    SetupError,
    UnloadInProgress,
}

/// Error when an invalid state transition is attempted
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Invalid hub state transition from {from:?} to {to:?}: {reason}")]
pub struct InvalidTransition {
    pub from: HubState,
    pub to: HubState,
    pub reason: &'static str,
}

impl HubState {
    /// Attempt a transition to a new state
    pub fn try_transition(self, to: HubState) -> Result<HubState, InvalidTransition> {
        use HubState::*;

        let valid = matches!(
            (self, to),
            (NotLoaded, SetupInProgress)
                | (SetupInProgress, Loaded)
                | (SetupInProgress, SetupError)
                | (SetupError, SetupInProgress)
                | (SetupError, UnloadInProgress)
                | (Loaded, UnloadInProgress)
                | (UnloadInProgress, NotLoaded)
        );

        if valid {
            Ok(to)
        } else {
            Err(InvalidTransition {
                from: self,
                to,
                reason: Self::transition_error_reason(self, to),
            })
        }
    }

    pub fn can_transition_to(self, to: HubState) -> bool {
        self.try_transition(to).is_ok()
    }

    pub fn is_loaded(self) -> bool {
        self == HubState::Loaded
    }

    fn transition_error_reason(from: HubState, to: HubState) -> &'static str {
        use HubState::*;

        match (from, to) {
            (Loaded, SetupInProgress) => "Already loaded - unload first before re-setup",
            (NotLoaded, UnloadInProgress) => "Not loaded - nothing to unload",
            (NotLoaded, Loaded) => "Cannot jump to Loaded - must go through SetupInProgress",
            (SetupInProgress, _) => "Setup in progress",
            (UnloadInProgress, _) => "Unload in progress",
            _ => "Invalid state transition",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use HubState::*;

    #[test]
    fn test_lifecycle() {
        let state = NotLoaded.try_transition(SetupInProgress).unwrap();
        let state = state.try_transition(Loaded).unwrap();
        assert!(state.is_loaded());
        let state = state.try_transition(UnloadInProgress).unwrap();
        assert_eq!(state.try_transition(NotLoaded), Ok(NotLoaded));
    }

    #[test]
    fn test_setup_error_can_retry_or_unload() {
        assert!(SetupInProgress.can_transition_to(SetupError));
        assert!(SetupError.can_transition_to(SetupInProgress));
        assert!(SetupError.can_transition_to(UnloadInProgress));
    }

    #[test]
    fn test_invalid_transitions() {
        let err = Loaded.try_transition(SetupInProgress).unwrap_err();
        assert_eq!(err.from, Loaded);
        assert_eq!(err.reason, "Already loaded - unload first before re-setup");

        assert!(!NotLoaded.can_transition_to(UnloadInProgress));
        assert!(!NotLoaded.can_transition_to(Loaded));
        assert!(!UnloadInProgress.can_transition_to(Loaded));
        assert!(!SetupInProgress.can_transition_to(NotLoaded));
    }

    #[test]
    fn test_serialization() {
        assert_eq!(
            serde_json::to_string(&SetupInProgress).unwrap(),
            "\"setup_in_progress\""
        );
    }
}
