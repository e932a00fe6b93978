//! stakesync-core — foundation for the stake-tracking reconciliation engine.
//!
//! # Architecture
//!
//! ```text
//! EngineBuilder → ReconciliationEngine
//!                      ├── StreamIndex      (sponsorship → stream, stream → refcount)
//!                      ├── BackfillPager    (paginated snapshot merge)
//!                      ├── HandlerRegistry  (user transition/error handlers)
//!                      └── DriftCorrector   (greedy correction-set selection)
//! ```

pub mod config;
pub mod drift;
pub mod error;
pub mod handler;
pub mod index;
pub mod types;

pub use config::EngineConfig;
pub use drift::{select_correction_set, total_diff};
pub use error::EngineError;
pub use handler::{HandlerRegistry, TransitionHandler};
pub use index::{StreamIndex, Transition};
pub use types::{
    BackfillPage, DriftRecord, EngineState, OperatorAddress, SponsorshipAddress, StakeEdge,
    StakeEvent, StakeEventKind, StreamId,
};
