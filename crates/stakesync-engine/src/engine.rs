//! The reconciliation engine — merges the live event feed and the backfill
//! snapshot into the stream index.
//!
//! # Phase 1: SUBSCRIBE
//! Attach to the chain event feed first. Events start mutating the index
//! immediately; the idempotent index operations make this safe even while
//! backfill is still running.
//!
//! # Phase 2: BACKFILL
//! Page the historical snapshot to exhaustion, feeding every stake edge
//! through the same `apply_stake` path. Whichever source observes an edge
//! first wins; the other source's later observation is a no-op.
//!
//! The index mutex is never held across a collaborator call: streams are
//! resolved first, then the already-known edge is applied under lock, and
//! handler dispatch happens after the lock is released.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use stakesync_core::config::EngineConfig;
use stakesync_core::error::EngineError;
use stakesync_core::handler::HandlerRegistry;
use stakesync_core::index::{StreamIndex, Transition};
use stakesync_core::types::{EngineState, SponsorshipAddress, StakeEvent, StakeEventKind, StreamId};

use crate::sources::{BackfillPager, BackfillSource, ChainEventSource, SponsorshipResolver};

// ─── Shared state ────────────────────────────────────────────────────────────

struct EngineInner {
    config: EngineConfig,
    index: Mutex<StreamIndex>,
    handlers: HandlerRegistry,
    state: Mutex<EngineState>,
    /// Highest backfill watermark observed; `None` before the first page.
    watermark: Mutex<Option<u64>>,
}

impl EngineInner {
    fn set_state(&self, state: EngineState) {
        *self.state.lock().unwrap() = state;
    }

    fn record_watermark(&self, block: u64) {
        let mut wm = self.watermark.lock().unwrap();
        *wm = Some(wm.map_or(block, |prev| prev.max(block)));
    }

    /// Apply a stake edge under lock. Returns every transition produced —
    /// normally at most one, but a conflicting earlier edge is retired
    /// first, which can surface a removal alongside the add.
    fn apply_staked(&self, sponsorship: SponsorshipAddress, stream: StreamId) -> Vec<Transition> {
        let mut index = self.index.lock().unwrap();
        let mut transitions = Vec::new();

        match index.stream_of(&sponsorship) {
            Some(known) if *known != stream => {
                tracing::warn!(
                    sponsorship = %sponsorship,
                    known = %known,
                    observed = %stream,
                    "Sponsorship re-observed with a different stream; repointing"
                );
                transitions.extend(index.apply_unstake(&sponsorship));
            }
            _ => {}
        }
        transitions.extend(index.apply_stake(sponsorship, stream));
        transitions
    }

    fn apply_unstaked(&self, sponsorship: &SponsorshipAddress) -> Option<Transition> {
        self.index.lock().unwrap().apply_unstake(sponsorship)
    }

    async fn dispatch(&self, transition: Transition, at_block: u64) {
        match transition {
            Transition::Added(stream) => {
                tracing::info!(stream = %stream, block = at_block, "Stream added");
                self.handlers.dispatch_added(&stream, at_block).await;
            }
            Transition::Removed(stream) => {
                tracing::info!(stream = %stream, block = at_block, "Stream removed");
                self.handlers.dispatch_removed(&stream, at_block).await;
            }
        }
    }

    /// Handle one live event end-to-end: resolve (without the lock), apply
    /// (under the lock), dispatch (after the lock).
    async fn handle_event(&self, resolver: &dyn SponsorshipResolver, event: StakeEvent) {
        match event.kind {
            StakeEventKind::Staked => {
                let stream = match resolver.resolve_stream(&event.sponsorship).await {
                    Ok(stream) => stream,
                    Err(err) => {
                        // Dropped, not fatal: the edge is re-observed from
                        // scratch on the next backfill pass or reconnect.
                        tracing::warn!(
                            sponsorship = %event.sponsorship,
                            error = %err,
                            "Stream resolution failed; dropping Staked event"
                        );
                        self.handlers.dispatch_error(&err).await;
                        return;
                    }
                };
                for transition in self.apply_staked(event.sponsorship, stream) {
                    self.dispatch(transition, event.block_number).await;
                }
            }
            StakeEventKind::Unstaked => {
                if let Some(transition) = self.apply_unstaked(&event.sponsorship) {
                    self.dispatch(transition, event.block_number).await;
                }
            }
        }
    }
}

/// Wait until stop is requested (or the handle is dropped).
async fn wait_shutdown(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow() {
            return;
        }
        if rx.changed().await.is_err() {
            return;
        }
    }
}

// ─── ReconciliationEngine ────────────────────────────────────────────────────

/// Assembles the collaborators and runs the two-phase startup protocol.
pub struct ReconciliationEngine {
    config: EngineConfig,
    events: Arc<dyn ChainEventSource>,
    resolver: Arc<dyn SponsorshipResolver>,
    backfill: Arc<dyn BackfillSource>,
    handlers: HandlerRegistry,
}

impl ReconciliationEngine {
    pub fn new(
        config: EngineConfig,
        events: Arc<dyn ChainEventSource>,
        resolver: Arc<dyn SponsorshipResolver>,
        backfill: Arc<dyn BackfillSource>,
        handlers: HandlerRegistry,
    ) -> Self {
        Self {
            config,
            events,
            resolver,
            backfill,
            handlers,
        }
    }

    /// Start the engine: subscribe to the live feed, then kick off the
    /// backfill merge. Returns a handle for reads and shutdown.
    pub async fn start(self) -> Result<EngineHandle, EngineError> {
        let operator = self.config.operator.clone();

        // Subscribe BEFORE backfill so no event can fall between the
        // snapshot watermark and the feed attach point.
        let event_stream = self.events.subscribe(&operator).await?;
        tracing::info!(operator = %operator, "Subscribed to chain event feed");

        let inner = Arc::new(EngineInner {
            config: self.config.clone(),
            index: Mutex::new(StreamIndex::new()),
            handlers: self.handlers,
            state: Mutex::new(EngineState::Backfilling),
            watermark: Mutex::new(None),
        });

        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let live_task = tokio::spawn(live_loop(
            inner.clone(),
            self.events.clone(),
            self.resolver.clone(),
            event_stream,
            shutdown_rx.clone(),
        ));
        let backfill_task = tokio::spawn(backfill_loop(
            inner.clone(),
            self.backfill.clone(),
            shutdown_rx,
        ));

        Ok(EngineHandle {
            inner,
            shutdown: shutdown_tx,
            tasks: Mutex::new(vec![live_task, backfill_task]),
        })
    }
}

// ─── Live phase ──────────────────────────────────────────────────────────────

async fn live_loop(
    inner: Arc<EngineInner>,
    events: Arc<dyn ChainEventSource>,
    resolver: Arc<dyn SponsorshipResolver>,
    mut stream: crate::sources::EventStream,
    mut shutdown: watch::Receiver<bool>,
) {
    let operator = inner.config.operator.clone();
    let backoff = Duration::from_millis(inner.config.resubscribe_backoff_ms);

    loop {
        tokio::select! {
            _ = wait_shutdown(&mut shutdown) => break,
            maybe_event = stream.next() => match maybe_event {
                Some(event) => inner.handle_event(resolver.as_ref(), event).await,
                None => {
                    tracing::warn!(operator = %operator, "Event feed ended; resubscribing");
                    tokio::select! {
                        _ = wait_shutdown(&mut shutdown) => break,
                        _ = tokio::time::sleep(backoff) => {}
                    }
                    match events.subscribe(&operator).await {
                        Ok(next_stream) => stream = next_stream,
                        Err(err) => {
                            tracing::warn!(error = %err, "Resubscribe failed");
                            inner.handlers.dispatch_error(&err).await;
                        }
                    }
                }
            }
        }
    }
}

// ─── Backfill phase ──────────────────────────────────────────────────────────

async fn backfill_loop(
    inner: Arc<EngineInner>,
    backfill: Arc<dyn BackfillSource>,
    mut shutdown: watch::Receiver<bool>,
) {
    let operator = inner.config.operator.clone();
    let pager = BackfillPager::new(backfill, inner.config.page_size);
    let mut run = pager.start(&operator);

    // Each page is applied under lock and its transitions dispatched before
    // the next page is fetched, so backfill notifications interleave with
    // live ones in the order the crossings actually happened.
    let outcome: Option<Result<(), EngineError>> = loop {
        let fetched = tokio::select! {
            result = run.next_page() => result,
            _ = wait_shutdown(&mut shutdown) => break None,
        };
        let page = match fetched {
            Ok(Some(page)) => page,
            Ok(None) => break Some(Ok(())),
            Err(err) => break Some(Err(err)),
        };

        inner.record_watermark(page.watermark_block);
        let mut transitions = Vec::new();
        for edge in page.edges {
            transitions.extend(inner.apply_staked(edge.sponsorship, edge.stream));
        }
        for transition in transitions {
            inner.dispatch(transition, page.watermark_block).await;
        }
    };

    match outcome {
        Some(Ok(())) => {
            let summary = run.summary();
            inner.set_state(EngineState::Live);
            tracing::info!(
                operator = %operator,
                edges = summary.edge_count,
                watermark = summary.watermark_block,
                "Backfill merge complete; engine live"
            );
        }
        Some(Err(err)) => {
            // Applied pages stay valid; a retry re-runs from scratch safely.
            tracing::warn!(operator = %operator, error = %err, "Backfill aborted");
            inner.handlers.dispatch_error(&err).await;
        }
        None => {
            tracing::debug!(operator = %operator, "Backfill cancelled by shutdown");
        }
    }
}

// ─── EngineHandle ────────────────────────────────────────────────────────────

/// Owned handle to a running engine: point-in-time reads plus shutdown.
pub struct EngineHandle {
    inner: Arc<EngineInner>,
    shutdown: watch::Sender<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl EngineHandle {
    /// Snapshot of the actively staked stream set.
    pub fn current_streams(&self) -> BTreeSet<StreamId> {
        self.inner.index.lock().unwrap().current_streams()
    }

    /// Number of live stake edges.
    pub fn edge_count(&self) -> usize {
        self.inner.index.lock().unwrap().edge_count()
    }

    /// Last backfill watermark block, if a page has been seen.
    pub fn watermark(&self) -> Option<u64> {
        *self.inner.watermark.lock().unwrap()
    }

    /// Current engine lifecycle state.
    pub fn state(&self) -> EngineState {
        *self.inner.state.lock().unwrap()
    }

    /// Stop the engine: cancel the subscription and any in-flight backfill,
    /// then wait for both tasks to wind down. Idempotent. In-flight
    /// correction transactions are not cancelled.
    pub async fn stop(&self) {
        let tasks: Vec<JoinHandle<()>> = {
            let mut guard = self.tasks.lock().unwrap();
            if guard.is_empty() {
                return; // already stopped
            }
            self.inner.set_state(EngineState::Stopping);
            let _ = self.shutdown.send(true);
            guard.drain(..).collect()
        };
        for task in tasks {
            let _ = task.await;
        }
        self.inner.set_state(EngineState::Stopped);
        tracing::info!(operator = %self.inner.config.operator, "Engine stopped");
    }
}
