//! Transition and error handler traits + registry.

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::EngineError;
use crate::types::StreamId;

/// Trait for consumers of stream set transitions.
///
/// `on_stream_added` / `on_stream_removed` fire exactly once per genuine
/// 0↔1 refcount crossing; duplicate and reordered chain events never reach
/// handlers. `at_block` is the block the triggering observation came from
/// (the live event's block, or the backfill page's watermark).
#[async_trait]
pub trait TransitionHandler: Send + Sync {
    /// The operator gained exposure to a stream it had none to before.
    async fn on_stream_added(&self, stream: &StreamId, at_block: u64);

    /// The operator's last stake edge into the stream went away.
    async fn on_stream_removed(&self, stream: &StreamId, at_block: u64);

    /// A recoverable engine fault (resolution failure, backfill page
    /// failure, correction submission failure). Default: ignore.
    async fn on_engine_error(&self, _error: &EngineError) {}
}

/// Registry of transition handlers, fanned out in registration order.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: Vec<Arc<dyn TransitionHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler.
    pub fn subscribe(&mut self, handler: Arc<dyn TransitionHandler>) {
        self.handlers.push(handler);
    }

    /// Number of registered handlers.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Dispatch an added-stream transition to all handlers.
    pub async fn dispatch_added(&self, stream: &StreamId, at_block: u64) {
        for handler in &self.handlers {
            handler.on_stream_added(stream, at_block).await;
        }
    }

    /// Dispatch a removed-stream transition to all handlers.
    pub async fn dispatch_removed(&self, stream: &StreamId, at_block: u64) {
        for handler in &self.handlers {
            handler.on_stream_removed(stream, at_block).await;
        }
    }

    /// Dispatch a recoverable fault to all handlers.
    pub async fn dispatch_error(&self, error: &EngineError) {
        for handler in &self.handlers {
            handler.on_engine_error(error).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Default)]
    struct Counter {
        added: AtomicU32,
        removed: AtomicU32,
        errors: AtomicU32,
    }

    #[async_trait]
    impl TransitionHandler for Counter {
        async fn on_stream_added(&self, _stream: &StreamId, _at_block: u64) {
            self.added.fetch_add(1, Ordering::Relaxed);
        }
        async fn on_stream_removed(&self, _stream: &StreamId, _at_block: u64) {
            self.removed.fetch_add(1, Ordering::Relaxed);
        }
        async fn on_engine_error(&self, _error: &EngineError) {
            self.errors.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[tokio::test]
    async fn dispatch_reaches_all_handlers() {
        let first = Arc::new(Counter::default());
        let second = Arc::new(Counter::default());

        let mut registry = HandlerRegistry::new();
        registry.subscribe(first.clone());
        registry.subscribe(second.clone());

        let stream = StreamId::new("s1");
        registry.dispatch_added(&stream, 100).await;
        registry.dispatch_removed(&stream, 101).await;
        registry
            .dispatch_error(&EngineError::Backfill("page 3 failed".into()))
            .await;

        for counter in [&first, &second] {
            assert_eq!(counter.added.load(Ordering::Relaxed), 1);
            assert_eq!(counter.removed.load(Ordering::Relaxed), 1);
            assert_eq!(counter.errors.load(Ordering::Relaxed), 1);
        }
    }

    #[tokio::test]
    async fn empty_registry_dispatch_is_noop() {
        let registry = HandlerRegistry::new();
        assert!(registry.is_empty());
        registry.dispatch_added(&StreamId::new("s1"), 1).await;
    }
}
