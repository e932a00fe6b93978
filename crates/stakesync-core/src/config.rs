//! Engine configuration.

use serde::{Deserialize, Serialize};

use crate::types::OperatorAddress;

/// Configuration for a reconciliation engine instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// The operator whose stake positions are tracked.
    pub operator: OperatorAddress,
    /// How many stake edges to request per backfill page.
    pub page_size: u32,
    /// Drift threshold as a fraction of the operator's total approximate
    /// value. A correction round runs only when aggregate drift exceeds
    /// `fraction × Σ approx_value`.
    pub drift_threshold_fraction: f64,
    /// Backoff before re-subscribing after the live feed drops (ms).
    pub resubscribe_backoff_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            operator: OperatorAddress::new("0x0"),
            page_size: 1000,
            drift_threshold_fraction: 0.001,
            resubscribe_backoff_ms: 2000,
        }
    }
}

impl EngineConfig {
    /// Config for a given operator with default tuning.
    pub fn for_operator(operator: OperatorAddress) -> Self {
        Self {
            operator,
            ..Default::default()
        }
    }

    /// Absolute drift threshold for a given total approximate value.
    pub fn absolute_threshold(&self, total_approx_value: u128) -> u128 {
        (total_approx_value as f64 * self.drift_threshold_fraction) as u128
    }
}
