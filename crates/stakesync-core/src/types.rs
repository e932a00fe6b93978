//! Shared types for the reconciliation pipeline.

use serde::{Deserialize, Serialize};

// ─── Identifiers ─────────────────────────────────────────────────────────────

/// The operator whose stake positions are being tracked (`0x…` address).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperatorAddress(pub String);

/// A sponsorship contract identity (`0x…` address). Opaque to the engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SponsorshipAddress(pub String);

/// A content-stream identity. Opaque string key; many sponsorships may
/// point at the same stream.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StreamId(pub String);

impl OperatorAddress {
    pub fn new(addr: impl Into<String>) -> Self {
        Self(addr.into())
    }
}

impl SponsorshipAddress {
    pub fn new(addr: impl Into<String>) -> Self {
        Self(addr.into())
    }
}

impl StreamId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for OperatorAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::fmt::Display for SponsorshipAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::fmt::Display for StreamId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ─── StakeEvent ──────────────────────────────────────────────────────────────

/// Which direction a live chain event moved the operator's position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StakeEventKind {
    /// The operator staked into the sponsorship.
    Staked,
    /// The operator's stake into the sponsorship ended.
    Unstaked,
}

/// One delivery from the live chain event feed.
///
/// Delivery is at-least-once: duplicates and reordering across reconnects
/// are expected and must be absorbed by the idempotent index operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakeEvent {
    pub kind: StakeEventKind,
    /// The sponsorship the event concerns.
    pub sponsorship: SponsorshipAddress,
    /// Block the event was observed in.
    pub block_number: u64,
}

impl StakeEvent {
    pub fn staked(sponsorship: SponsorshipAddress, block_number: u64) -> Self {
        Self {
            kind: StakeEventKind::Staked,
            sponsorship,
            block_number,
        }
    }

    pub fn unstaked(sponsorship: SponsorshipAddress, block_number: u64) -> Self {
        Self {
            kind: StakeEventKind::Unstaked,
            sponsorship,
            block_number,
        }
    }
}

// ─── Backfill ────────────────────────────────────────────────────────────────

/// One currently-active stake relationship as reported by the backfill
/// query service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakeEdge {
    pub sponsorship: SponsorshipAddress,
    pub stream: StreamId,
}

/// One page of the backfill snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackfillPage {
    /// Active stake edges on this page.
    pub edges: Vec<StakeEdge>,
    /// Cursor for the next page; `None` means the snapshot is exhausted.
    pub next_cursor: Option<String>,
    /// Block number up to which this snapshot is known valid.
    pub watermark_block: u64,
}

// ─── DriftRecord ─────────────────────────────────────────────────────────────

/// Cached vs. authoritative valuation of one staked position, in the
/// staking token's smallest unit. Recomputed on every drift check, never
/// persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriftRecord {
    pub sponsorship: SponsorshipAddress,
    /// The locally cached approximation.
    pub approx_value: u128,
    /// The authoritative on-chain value.
    pub real_value: u128,
}

impl DriftRecord {
    /// Signed drift: `real − approx`. Positive means the cache understates.
    pub fn diff(&self) -> i128 {
        self.real_value as i128 - self.approx_value as i128
    }
}

// ─── EngineState ─────────────────────────────────────────────────────────────

/// Runtime state of the reconciliation engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineState {
    /// Not yet started.
    Idle,
    /// Live feed attached, backfill snapshot still being merged.
    Backfilling,
    /// Backfill complete; live events are the only mutation source.
    Live,
    /// Shutting down gracefully.
    Stopping,
    /// Terminated.
    Stopped,
}

impl std::fmt::Display for EngineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Backfilling => write!(f, "backfilling"),
            Self::Live => write!(f, "live"),
            Self::Stopping => write!(f, "stopping"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
