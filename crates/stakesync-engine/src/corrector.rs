//! Value drift corrector — compares cached vs. authoritative valuations
//! and issues one batched on-chain correction when aggregate drift
//! exceeds the configured threshold.
//!
//! Corrections never touch the stream index; the corrector is a read of
//! external state followed by a single external write.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use stakesync_core::config::EngineConfig;
use stakesync_core::drift::{select_correction_set, total_diff};
use stakesync_core::error::EngineError;
use stakesync_core::handler::HandlerRegistry;
use stakesync_core::types::{DriftRecord, SponsorshipAddress};

use crate::sources::{CorrectionSink, TxHandle, ValuationSource};

/// Outcome of one drift check.
#[derive(Debug, Clone, Serialize)]
pub struct DriftReport {
    /// When the check ran.
    pub checked_at: DateTime<Utc>,
    /// Aggregate signed drift across all positions.
    pub total_diff: i128,
    /// The absolute threshold the check was run against.
    pub threshold: u128,
    /// Sponsorships named in the submitted correction (empty = none needed).
    pub corrected: Vec<SponsorshipAddress>,
    /// Handle of the submitted correction transaction, if one was issued.
    pub tx: Option<TxHandle>,
}

/// Runs drift checks on demand and submits minimal correction batches.
///
/// Faults (valuation fetch, correction submission) are reported through the
/// attached handler registry as well as returned to the caller.
pub struct ValueDriftCorrector {
    config: EngineConfig,
    valuations: Arc<dyn ValuationSource>,
    corrections: Arc<dyn CorrectionSink>,
    handlers: HandlerRegistry,
}

impl ValueDriftCorrector {
    pub fn new(
        config: EngineConfig,
        valuations: Arc<dyn ValuationSource>,
        corrections: Arc<dyn CorrectionSink>,
    ) -> Self {
        Self {
            config,
            valuations,
            corrections,
            handlers: HandlerRegistry::new(),
        }
    }

    /// Attach a handler registry for fault notifications.
    pub fn with_handlers(mut self, handlers: HandlerRegistry) -> Self {
        self.handlers = handlers;
        self
    }

    /// Run a drift check with the threshold derived from the configured
    /// fraction of total approximate value.
    pub async fn check_and_correct(&self) -> Result<DriftReport, EngineError> {
        let records = self.fetch_records().await?;
        let total_approx: u128 = records.iter().map(|r| r.approx_value).sum();
        let threshold = self.config.absolute_threshold(total_approx);
        self.correct_with(threshold, records).await
    }

    /// Run a drift check against an explicit absolute threshold, for
    /// callers that compute their own.
    pub async fn check_with_threshold(&self, threshold: u128) -> Result<DriftReport, EngineError> {
        let records = self.fetch_records().await?;
        self.correct_with(threshold, records).await
    }

    async fn fetch_records(&self) -> Result<Vec<DriftRecord>, EngineError> {
        match self.valuations.fetch_valuations(&self.config.operator).await {
            Ok(records) => Ok(records),
            Err(err) => {
                tracing::warn!(
                    operator = %self.config.operator,
                    error = %err,
                    "Valuation fetch failed"
                );
                self.handlers.dispatch_error(&err).await;
                Err(err)
            }
        }
    }

    async fn correct_with(
        &self,
        threshold: u128,
        records: Vec<DriftRecord>,
    ) -> Result<DriftReport, EngineError> {
        let total = total_diff(&records);
        let corrected = select_correction_set(&records, threshold);

        if corrected.is_empty() {
            tracing::debug!(
                operator = %self.config.operator,
                total_diff = total,
                threshold,
                "Drift within threshold; no correction"
            );
            return Ok(DriftReport {
                checked_at: Utc::now(),
                total_diff: total,
                threshold,
                corrected,
                tx: None,
            });
        }

        tracing::info!(
            operator = %self.config.operator,
            total_diff = total,
            threshold,
            selected = corrected.len(),
            positions = records.len(),
            "Submitting drift correction"
        );

        let tx = match self
            .corrections
            .submit_correction(&self.config.operator, &corrected)
            .await
        {
            Ok(tx) => tx,
            Err(err) => {
                // No local state to roll back; corrections never touch the
                // stream index.
                tracing::warn!(
                    operator = %self.config.operator,
                    error = %err,
                    "Correction submission failed"
                );
                self.handlers.dispatch_error(&err).await;
                return Err(err);
            }
        };

        Ok(DriftReport {
            checked_at: Utc::now(),
            total_diff: total,
            threshold,
            corrected,
            tx: Some(tx),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    use stakesync_core::types::{DriftRecord, OperatorAddress};

    struct FixedValuations(Vec<DriftRecord>);

    #[async_trait]
    impl ValuationSource for FixedValuations {
        async fn fetch_valuations(
            &self,
            _operator: &OperatorAddress,
        ) -> Result<Vec<DriftRecord>, EngineError> {
            Ok(self.0.clone())
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        submitted: Mutex<Vec<Vec<SponsorshipAddress>>>,
    }

    #[async_trait]
    impl CorrectionSink for RecordingSink {
        async fn submit_correction(
            &self,
            _operator: &OperatorAddress,
            sponsorships: &[SponsorshipAddress],
        ) -> Result<TxHandle, EngineError> {
            self.submitted.lock().unwrap().push(sponsorships.to_vec());
            Ok(TxHandle("0xtx".into()))
        }
    }

    fn record(addr: &str, approx: u128, real: u128) -> DriftRecord {
        DriftRecord {
            sponsorship: SponsorshipAddress::new(addr),
            approx_value: approx,
            real_value: real,
        }
    }

    fn corrector(records: Vec<DriftRecord>, sink: Arc<RecordingSink>) -> ValueDriftCorrector {
        ValueDriftCorrector::new(
            EngineConfig::for_operator(OperatorAddress::new("0xop")),
            Arc::new(FixedValuations(records)),
            sink,
        )
    }

    #[tokio::test]
    async fn no_correction_under_threshold() {
        let sink = Arc::new(RecordingSink::default());
        let corrector = corrector(vec![record("0xa", 1000, 1010)], sink.clone());

        let report = corrector.check_with_threshold(50).await.unwrap();
        assert_eq!(report.total_diff, 10);
        assert!(report.corrected.is_empty());
        assert!(report.tx.is_none());
        assert!(sink.submitted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn submits_minimal_batch() {
        let sink = Arc::new(RecordingSink::default());
        let corrector = corrector(
            vec![
                record("0xa", 1000, 1050), // +50
                record("0xb", 1000, 1030), // +30
                record("0xc", 1000, 1025), // +25
                record("0xd", 1000, 1010), // +10
            ],
            sink.clone(),
        );

        let report = corrector.check_with_threshold(60).await.unwrap();
        assert_eq!(
            report.corrected,
            vec![SponsorshipAddress::new("0xa"), SponsorshipAddress::new("0xb")]
        );
        assert_eq!(report.tx, Some(TxHandle("0xtx".into())));

        let submitted = sink.submitted.lock().unwrap();
        assert_eq!(submitted.len(), 1); // one batched request
        assert_eq!(submitted[0].len(), 2);
    }

    struct FailingSink;

    #[async_trait]
    impl CorrectionSink for FailingSink {
        async fn submit_correction(
            &self,
            _operator: &OperatorAddress,
            _sponsorships: &[SponsorshipAddress],
        ) -> Result<TxHandle, EngineError> {
            Err(EngineError::Correction("nonce too low".into()))
        }
    }

    #[derive(Default)]
    struct ErrorCounter(std::sync::atomic::AtomicU32);

    #[async_trait]
    impl stakesync_core::handler::TransitionHandler for ErrorCounter {
        async fn on_stream_added(&self, _s: &stakesync_core::types::StreamId, _b: u64) {}
        async fn on_stream_removed(&self, _s: &stakesync_core::types::StreamId, _b: u64) {}
        async fn on_engine_error(&self, _error: &EngineError) {
            self.0.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        }
    }

    #[tokio::test]
    async fn submission_failure_is_reported_and_returned() {
        let counter = Arc::new(ErrorCounter::default());
        let mut handlers = HandlerRegistry::new();
        handlers.subscribe(counter.clone());

        let corrector = ValueDriftCorrector::new(
            EngineConfig::for_operator(OperatorAddress::new("0xop")),
            Arc::new(FixedValuations(vec![record("0xa", 1000, 1100)])),
            Arc::new(FailingSink),
        )
        .with_handlers(handlers);

        let result = corrector.check_with_threshold(10).await;
        assert!(matches!(result, Err(EngineError::Correction(_))));
        assert_eq!(counter.0.load(std::sync::atomic::Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn fraction_derived_threshold() {
        let sink = Arc::new(RecordingSink::default());
        let mut config = EngineConfig::for_operator(OperatorAddress::new("0xop"));
        config.drift_threshold_fraction = 0.01; // 1% of 2000 = 20
        let corrector = ValueDriftCorrector::new(
            config,
            Arc::new(FixedValuations(vec![
                record("0xa", 1000, 1030), // +30
                record("0xb", 1000, 1000),
            ])),
            sink.clone(),
        );

        let report = corrector.check_and_correct().await.unwrap();
        assert_eq!(report.threshold, 20);
        assert_eq!(report.corrected, vec![SponsorshipAddress::new("0xa")]);
    }
}
