use std::time::Duration;

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};

/// Ten years; keeps the window inside chrono's range.
const MAX_TRANSIT_WINDOW_SECS: u64 = 10 * 365 * 24 * 3600;

/// Tunables of the receiving view. Every field has a default, so an empty
/// `[receiving]` table (or none at all) is valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReceivingConfig {
    /// Expected transit time from dispatch to arrival, applied to every order.
    pub transit_window_secs: u64,

    /// How long the submit status stays `success` before returning to `idle`.
    pub success_reset_secs: u64,

    /// How often countdown labels are recomputed.
    pub countdown_tick_secs: u64,

    /// Collection holding delivery orders.
    pub delivery_collection: String,

    /// Collection receiving committed inventory batches.
    pub batch_collection: String,
}

impl Default for ReceivingConfig {
    fn default() -> Self {
        Self {
            transit_window_secs: 2 * 3600,
            success_reset_secs: 3,
            countdown_tick_secs: 60,
            delivery_collection: "mn_delivery_orders".to_string(),
            batch_collection: "inventory_batches".to_string(),
        }
    }
}

impl ReceivingConfig {
    pub fn transit_window(&self) -> TimeDelta {
        let secs = self.transit_window_secs.min(MAX_TRANSIT_WINDOW_SECS);
        TimeDelta::seconds(secs as i64)
    }

    pub fn success_reset(&self) -> Duration {
        Duration::from_secs(self.success_reset_secs)
    }

    /// Never zero; a zero interval would spin.
    pub fn countdown_tick(&self) -> Duration {
        Duration::from_secs(self.countdown_tick_secs.max(1))
    }
}
