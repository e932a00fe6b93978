//! Collaborator traits — the engine's view of the chain, the historical
//! query service, and the valuation/correction endpoints.
//!
//! All durable state lives behind these traits; the engine itself owns
//! nothing but the in-memory stream index.

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use stakesync_core::error::EngineError;
use stakesync_core::types::{
    BackfillPage, DriftRecord, OperatorAddress, SponsorshipAddress, StakeEvent, StreamId,
};

/// The live event feed delivered by a subscription.
pub type EventStream = BoxStream<'static, StakeEvent>;

/// Handle for a submitted correction transaction. Completion is observed,
/// not awaited, by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxHandle(pub String);

/// Live chain event feed for a single operator.
///
/// Delivery is at-least-once: the stream may replay events after a
/// reconnect and may reorder across reconnect boundaries.
#[async_trait]
pub trait ChainEventSource: Send + Sync {
    async fn subscribe(&self, operator: &OperatorAddress) -> Result<EventStream, EngineError>;
}

/// Resolves which stream a sponsorship is associated with (an external
/// contract read).
#[async_trait]
pub trait SponsorshipResolver: Send + Sync {
    async fn resolve_stream(
        &self,
        sponsorship: &SponsorshipAddress,
    ) -> Result<StreamId, EngineError>;
}

/// Paginated historical snapshot of the operator's active stakes.
#[async_trait]
pub trait BackfillSource: Send + Sync {
    async fn page(
        &self,
        operator: &OperatorAddress,
        cursor: Option<&str>,
        page_size: u32,
    ) -> Result<BackfillPage, EngineError>;
}

#[async_trait]
impl<T: BackfillSource + ?Sized> BackfillSource for std::sync::Arc<T> {
    async fn page(
        &self,
        operator: &OperatorAddress,
        cursor: Option<&str>,
        page_size: u32,
    ) -> Result<BackfillPage, EngineError> {
        (**self).page(operator, cursor, page_size).await
    }
}

/// Cached vs. authoritative valuation per sponsorship.
#[async_trait]
pub trait ValuationSource: Send + Sync {
    async fn fetch_valuations(
        &self,
        operator: &OperatorAddress,
    ) -> Result<Vec<DriftRecord>, EngineError>;
}

/// Sink for batched on-chain value corrections.
#[async_trait]
pub trait CorrectionSink: Send + Sync {
    async fn submit_correction(
        &self,
        operator: &OperatorAddress,
        sponsorships: &[SponsorshipAddress],
    ) -> Result<TxHandle, EngineError>;
}

// ─── BackfillPager ───────────────────────────────────────────────────────────

/// Drives a [`BackfillSource`] page by page.
///
/// The caller pulls one page at a time so it can apply the page's edges and
/// dispatch the resulting transitions before the next page is fetched —
/// notifications keep up with the snapshot merge instead of arriving in one
/// burst at the end.
pub struct BackfillPager<S> {
    source: S,
    page_size: u32,
}

/// Running totals for a backfill pass.
#[derive(Debug, Clone, Default)]
pub struct BackfillResult {
    /// Number of stake edges seen so far.
    pub edge_count: usize,
    /// The highest watermark block seen across pages.
    pub watermark_block: u64,
    /// Pages fetched so far.
    pub pages: u32,
}

impl<S: BackfillSource> BackfillPager<S> {
    pub fn new(source: S, page_size: u32) -> Self {
        Self { source, page_size }
    }

    /// Begin a backfill pass for `operator`.
    pub fn start<'a>(&'a self, operator: &'a OperatorAddress) -> BackfillRun<'a, S> {
        BackfillRun {
            source: &self.source,
            operator,
            page_size: self.page_size,
            cursor: None,
            done: false,
            summary: BackfillResult::default(),
        }
    }
}

/// One in-progress backfill pass.
pub struct BackfillRun<'a, S> {
    source: &'a S,
    operator: &'a OperatorAddress,
    page_size: u32,
    cursor: Option<String>,
    done: bool,
    summary: BackfillResult,
}

impl<S: BackfillSource> BackfillRun<'_, S> {
    /// Fetch the next page, or `Ok(None)` once the snapshot is exhausted.
    ///
    /// On a page failure the remaining pages are abandoned and the error is
    /// returned; edges from already-fetched pages were applied by the caller
    /// and stay valid, since re-applying them later is a no-op.
    pub async fn next_page(&mut self) -> Result<Option<BackfillPage>, EngineError> {
        if self.done {
            return Ok(None);
        }
        let page = self
            .source
            .page(self.operator, self.cursor.as_deref(), self.page_size)
            .await?;

        self.summary.pages += 1;
        self.summary.edge_count += page.edges.len();
        self.summary.watermark_block = self.summary.watermark_block.max(page.watermark_block);

        match &page.next_cursor {
            Some(next) => self.cursor = Some(next.clone()),
            None => {
                self.done = true;
                tracing::info!(
                    operator = %self.operator,
                    edges = self.summary.edge_count,
                    pages = self.summary.pages,
                    watermark = self.summary.watermark_block,
                    "Backfill snapshot complete"
                );
            }
        }
        Ok(Some(page))
    }

    /// Returns `true` once the snapshot has been fully paged.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Totals for the pages fetched so far.
    pub fn summary(&self) -> &BackfillResult {
        &self.summary
    }
}
