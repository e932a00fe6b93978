//! stakesync-engine — drives the stream index from live chain events and
//! a paginated backfill snapshot, and runs drift correction rounds.
//!
//! # Startup protocol
//!
//! The engine subscribes to the live feed *before* reading the backfill
//! snapshot, then merges both through the idempotent index operations.
//! Whichever path observes a stake edge first wins; the other path's
//! later observation is a harmless no-op, so the order of application
//! between the two sources never affects the final stream set.

pub mod builder;
pub mod corrector;
pub mod engine;
pub mod sources;

pub use builder::EngineBuilder;
pub use corrector::{DriftReport, ValueDriftCorrector};
pub use engine::{EngineHandle, ReconciliationEngine};
pub use sources::{
    BackfillPager, BackfillResult, BackfillSource, ChainEventSource, CorrectionSink, EventStream,
    SponsorshipResolver, TxHandle, ValuationSource,
};
