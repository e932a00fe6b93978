//! Fluent builder API for engine configuration.
//!
//! # Example
//!
//! ```rust
//! use stakesync_engine::EngineBuilder;
//!
//! let config = EngineBuilder::new()
//!     .operator("0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48")
//!     .page_size(500)
//!     .drift_threshold_fraction(0.005)
//!     .build_config();
//! ```

use stakesync_core::config::EngineConfig;
use stakesync_core::types::OperatorAddress;

/// Fluent builder for [`EngineConfig`].
#[derive(Default)]
pub struct EngineBuilder {
    config: EngineConfig,
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self {
            config: EngineConfig::default(),
        }
    }

    /// Set the operator address whose positions are tracked.
    pub fn operator(mut self, operator: impl Into<String>) -> Self {
        self.config.operator = OperatorAddress::new(operator);
        self
    }

    /// Set the backfill page size.
    pub fn page_size(mut self, size: u32) -> Self {
        self.config.page_size = size;
        self
    }

    /// Set the drift threshold as a fraction of total approximate value.
    pub fn drift_threshold_fraction(mut self, fraction: f64) -> Self {
        self.config.drift_threshold_fraction = fraction;
        self
    }

    /// Set the backoff before re-subscribing after the live feed drops.
    pub fn resubscribe_backoff_ms(mut self, ms: u64) -> Self {
        self.config.resubscribe_backoff_ms = ms;
        self
    }

    /// Build the [`EngineConfig`].
    pub fn build_config(self) -> EngineConfig {
        self.config
    }
}
