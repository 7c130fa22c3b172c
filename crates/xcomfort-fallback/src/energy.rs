//! Energy integration for power sensors

use tokio::time::Instant;

/// Integrates a power level over time into kWh
///
/// The level set by the previous [`advance`](Self::advance) is held until the
/// next one, so the energy for an interval is fixed by the power in effect at
/// its start.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnergyAccumulator {
    total_kwh: f64,
    level_w: f64,
    last_update: Instant,
}

impl EnergyAccumulator {
    pub fn new(now: Instant) -> Self {
        Self::with_total(0.0, now)
    }

    pub fn with_total(total_kwh: f64, now: Instant) -> Self {
        Self {
            total_kwh,
            level_w: 0.0,
            last_update: now,
        }
    }

    /// Add the energy of the held level up to `now`, then hold `power_w`
    pub fn advance(&mut self, now: Instant, power_w: f64) {
        let elapsed = now.saturating_duration_since(self.last_update).as_secs_f64();
        self.total_kwh += self.level_w / 3600.0 / 1000.0 * elapsed;
        self.level_w = power_w;
        self.last_update = self.last_update.max(now);
    }

    pub fn total_kwh(&self) -> f64 {
        self.total_kwh
    }

    /// Power level currently held
    pub fn level_w(&self) -> f64 {
        self.level_w
    }

    /// Replace the total, e.g. with a restored value
    pub fn set_total(&mut self, total_kwh: f64) {
        self.total_kwh = total_kwh;
    }
}
