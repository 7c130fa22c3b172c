//! Per-heater stale power state machine

use std::time::Duration;

use tokio::time::Instant;

use crate::{FALLBACK_POWER_THRESHOLD_W, FALLBACK_ZERO_WINDOW};

/// Suppression state of one heater, driven by its room's power
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StaleState {
    /// Heater power passes through unmodified
    #[default]
    Normal,
    /// Room has been at or below the threshold since `since`
    BelowThresholdPending { since: Instant },
    /// Room stayed low for the whole window; heater power is forced to zero
    Suppressed { since: Instant },
}

/// A change of [`StaleState`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Normal → BelowThresholdPending
    Pending,
    /// BelowThresholdPending → Suppressed
    Suppressed { low_power_for: Duration },
    /// BelowThresholdPending → Normal
    Cleared,
    /// Suppressed → Normal
    Restored,
}

impl StaleState {
    /// Apply one room power reading taken at `now`
    pub fn evaluate(&mut self, room_watts: f64, now: Instant) -> Option<Transition> {
        if room_watts > FALLBACK_POWER_THRESHOLD_W {
            let transition = match self {
                Self::Normal => None,
                Self::BelowThresholdPending { .. } => Some(Transition::Cleared),
                Self::Suppressed { .. } => Some(Transition::Restored),
            };
            *self = Self::Normal;
            return transition;
        }

        match *self {
            Self::Normal => {
                *self = Self::BelowThresholdPending { since: now };
                Some(Transition::Pending)
            }
            Self::BelowThresholdPending { since } => {
                let low_power_for = now.saturating_duration_since(since);
                if low_power_for >= FALLBACK_ZERO_WINDOW {
                    *self = Self::Suppressed { since };
                    Some(Transition::Suppressed { low_power_for })
                } else {
                    None
                }
            }
            Self::Suppressed { .. } => None,
        }
    }

    pub fn is_suppressed(&self) -> bool {
        matches!(self, Self::Suppressed { .. })
    }

    /// Start of the current low-power stretch, if any
    pub fn below_threshold_since(&self) -> Option<Instant> {
        match self {
            Self::Normal => None,
            Self::BelowThresholdPending { since } | Self::Suppressed { since } => Some(*since),
        }
    }
}
