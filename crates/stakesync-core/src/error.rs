//! Error types for the reconciliation pipeline.

use thiserror::Error;

use crate::types::SponsorshipAddress;

/// Faults surfaced by the engine and its collaborators.
///
/// Nothing here is process-fatal: a crash-and-restart reruns the startup
/// sequence, which is safe because the whole pipeline is idempotent with
/// respect to final state.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Event subscription error: {0}")]
    Subscription(String),

    #[error("Failed to resolve stream for sponsorship {sponsorship}: {reason}")]
    Resolution {
        sponsorship: SponsorshipAddress,
        reason: String,
    },

    #[error("Backfill error: {0}")]
    Backfill(String),

    #[error("Valuation fetch error: {0}")]
    Valuation(String),

    #[error("Correction submission error: {0}")]
    Correction(String),

    #[error("Engine is stopped")]
    Stopped,
}

impl EngineError {
    /// Returns `true` if the fault self-heals on the next backfill pass or
    /// reconnection (everything except operating on a stopped engine).
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Stopped)
    }
}
