//! Drift selection — which staked positions to correct on-chain.
//!
//! Each correction is a paid operation, so the goal is the *smallest* set
//! of sponsorships whose corrected drift pushes the aggregate back under
//! the threshold. Greedy largest-first selection gives exactly that:
//! sort by signed drift descending, take the minimal prefix whose running
//! sum exceeds the threshold.

use crate::types::{DriftRecord, SponsorshipAddress};

/// Aggregate signed drift across all records.
pub fn total_diff(records: &[DriftRecord]) -> i128 {
    records.iter().map(|r| r.diff()).sum()
}

/// Select the minimal correction set for the given absolute threshold.
///
/// Returns an empty set when `total_diff ≤ threshold` (nothing to do).
/// Otherwise returns the smallest prefix of records, ordered by drift
/// descending, whose cumulative drift exceeds the threshold.
///
/// Degenerate case: if the cumulative sum never exceeds the threshold
/// (e.g. individual diffs are non-positive while the aggregate is still
/// judged over threshold by the caller's bookkeeping), every sponsorship
/// is selected. The loop is bounded by the record count.
pub fn select_correction_set(
    records: &[DriftRecord],
    threshold: u128,
) -> Vec<SponsorshipAddress> {
    let total = total_diff(records);
    if total <= threshold as i128 {
        return Vec::new();
    }

    let mut sorted: Vec<&DriftRecord> = records.iter().collect();
    sorted.sort_by(|a, b| b.diff().cmp(&a.diff()));

    let mut selected = Vec::new();
    let mut running: i128 = 0;
    for record in sorted {
        selected.push(record.sponsorship.clone());
        running += record.diff();
        if running > threshold as i128 {
            return selected;
        }
    }

    // Never crossed the threshold: correct everything rather than stall.
    selected
}
