//! Persisted energy totals
//!
//! Energy sensors are cumulative; their kWh totals are saved on unload and
//! restored on the next setup so a reload does not reset them.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::storage::Storable;

/// Storage key for energy totals
pub const STORAGE_KEY: &str = "xcomfort_bridge.energy";
pub const STORAGE_VERSION: u32 = 1;
pub const STORAGE_MINOR_VERSION: u32 = 1;

/// Energy totals keyed by sensor unique id
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnergySnapshot {
    #[serde(default)]
    pub totals: IndexMap<String, f64>,
    #[serde(default)]
    pub saved_at: Option<DateTime<Utc>>,
}

impl Storable for EnergySnapshot {
    const KEY: &'static str = STORAGE_KEY;
    const VERSION: u32 = STORAGE_VERSION;
    const MINOR_VERSION: u32 = STORAGE_MINOR_VERSION;
}

impl EnergySnapshot {
    /// Stored total for a sensor; non-finite or negative values are dropped
    pub fn get(&self, unique_id: &str) -> Option<f64> {
        self.totals
            .get(unique_id)
            .copied()
            .filter(|kwh| kwh.is_finite() && *kwh >= 0.0)
    }

    pub fn set(&mut self, unique_id: impl Into<String>, kwh: f64) {
        self.totals.insert(unique_id.into(), kwh);
    }

    pub fn stamp(&mut self) {
        self.saved_at = Some(Utc::now());
    }

    pub fn len(&self) -> usize {
        self.totals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.totals.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Storage;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_energy_totals_persist() {
        let temp_dir = TempDir::new().unwrap();
        let storage = Storage::new(temp_dir.path());

        let mut snapshot = EnergySnapshot::default();
        snapshot.set("energy_kwh_1", 3.25);
        snapshot.set("energy_panelovn_stue_11", 12.5);
        snapshot.stamp();
        storage.save_data(&snapshot).await.unwrap();

        assert!(storage.exists("xcomfort_bridge.energy"));

        let loaded: EnergySnapshot = storage.load_data().await.unwrap();
        assert_eq!(loaded.get("energy_kwh_1"), Some(3.25));
        assert_eq!(loaded.get("energy_panelovn_stue_11"), Some(12.5));
        assert_eq!(loaded.len(), 2);
        assert!(loaded.saved_at.is_some());
        let keys: Vec<_> = loaded.totals.keys().cloned().collect();
        assert_eq!(keys, vec!["energy_kwh_1", "energy_panelovn_stue_11"]);
    }

    #[test]
    fn test_invalid_totals_ignored() {
        let mut snapshot = EnergySnapshot::default();
        snapshot.set("a", -1.0);
        snapshot.set("b", f64::NAN);
        assert_eq!(snapshot.get("a"), None);
        assert_eq!(snapshot.get("b"), None);
        assert_eq!(snapshot.get("missing"), None);
    }
}
