//! Per-reference tier inspection and demotion.
//!
//! Each reference moves through a linear sequence and stops at its first
//! terminal state:
//!
//! ```text
//! Inspect --fail--> Error(not accessible)
//!    |
//!    +--no tier--> Skipped(no access tier set)
//!    +--tier != Archive--> Skipped(already <tier>)
//!    +--Archive--> Demote --fail--> Error(failed to set tier)
//!                    |
//!                    +--ok--> Changed
//! ```
//!
//! There are no retries. A failed reference never stops the rows after it.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tierlift_core::redaction::RedactedUrl;
use tierlift_core::storage::{AccessTier, BlobStore};
use tierlift_core::ObjectReference;

use crate::metrics;

/// Why a reference was left alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The store reported no access tier for the blob.
    NoAccessTier,
    /// The blob is already in a non-archive tier.
    AlreadyInTier(AccessTier),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoAccessTier => f.write_str("No access tier set"),
            Self::AlreadyInTier(tier) => write!(f, "Already {tier}"),
        }
    }
}

/// Why a reference could not be remediated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    /// Metadata lookup failed (missing blob, denied, transport error).
    NotAccessible,
    /// The tier change request failed.
    SetTierFailed,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotAccessible => f.write_str("Blob not accessible"),
            Self::SetTierFailed => f.write_str("Failed to set tier"),
        }
    }
}

/// Result of remediating one reference.
///
/// Rendered to text only when written into the status column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemediationOutcome {
    /// The blob was moved from Archive to Cool.
    Changed,
    /// Nothing to do.
    Skipped(SkipReason),
    /// Remediation failed for this reference only.
    Error(FailureReason),
}

impl RemediationOutcome {
    /// Metric label for the outcome.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Changed => "changed",
            Self::Skipped(_) => "skipped",
            Self::Error(_) => "error",
        }
    }
}

impl fmt::Display for RemediationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Changed => f.write_str("Changed: Archive → Cool"),
            Self::Skipped(reason) => write!(f, "Skipped: {reason}"),
            Self::Error(reason) => write!(f, "Error: {reason}"),
        }
    }
}

/// Run-level counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RemediationStats {
    /// References attempted.
    pub processed: usize,
    /// References moved to Cool.
    pub changed: usize,
    /// References left alone.
    pub skipped: usize,
    /// References that failed.
    pub errors: usize,
}

impl RemediationStats {
    /// Counts one outcome.
    pub fn record(&mut self, outcome: &RemediationOutcome) {
        self.processed += 1;
        match outcome {
            RemediationOutcome::Changed => self.changed += 1,
            RemediationOutcome::Skipped(_) => self.skipped += 1,
            RemediationOutcome::Error(_) => self.errors += 1,
        }
    }
}

impl fmt::Display for RemediationStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "processed={} changed={} skipped={} errors={}",
            self.processed, self.changed, self.skipped, self.errors
        )
    }
}

/// Inspects a blob's tier and demotes Archive to Cool.
#[derive(Clone)]
pub struct TierRemediator {
    store: Arc<dyn BlobStore>,
}

impl fmt::Debug for TierRemediator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TierRemediator").finish_non_exhaustive()
    }
}

impl TierRemediator {
    /// Creates a remediator over the given store.
    #[must_use]
    pub fn new(store: Arc<dyn BlobStore>) -> Self {
        Self { store }
    }

    /// Remediates one reference. Never fails; failures become outcomes.
    pub async fn remediate(&self, reference: &ObjectReference) -> RemediationOutcome {
        let outcome = self.evaluate(reference).await;
        metrics::record_reference_outcome(outcome.label());
        outcome
    }

    async fn evaluate(&self, reference: &ObjectReference) -> RemediationOutcome {
        let url = reference.to_string();
        let properties = match self.store.properties(reference).await {
            Ok(properties) => properties,
            Err(err) => {
                tracing::warn!(url = %RedactedUrl(&url), error = %err, "blob not accessible");
                return RemediationOutcome::Error(FailureReason::NotAccessible);
            }
        };

        let Some(tier) = properties.access_tier else {
            tracing::info!(url = %RedactedUrl(&url), "no access tier set");
            return RemediationOutcome::Skipped(SkipReason::NoAccessTier);
        };

        if tier != AccessTier::Archive {
            tracing::debug!(url = %RedactedUrl(&url), tier = %tier, "already online");
            return RemediationOutcome::Skipped(SkipReason::AlreadyInTier(tier));
        }

        match self.store.set_tier(reference, AccessTier::Cool).await {
            Ok(()) => {
                metrics::record_tier_change();
                tracing::info!(url = %RedactedUrl(&url), "moved from Archive to Cool");
                RemediationOutcome::Changed
            }
            Err(err) => {
                tracing::warn!(url = %RedactedUrl(&url), error = %err, "failed to set tier");
                RemediationOutcome::Error(FailureReason::SetTierFailed)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tierlift_core::MemoryBlobStore;

    fn reference(path: &str) -> ObjectReference {
        ObjectReference::new("acct", "cont", path).expect("reference")
    }

    #[test]
    fn outcome_display_strings() {
        assert_eq!(
            RemediationOutcome::Changed.to_string(),
            "Changed: Archive → Cool"
        );
        assert_eq!(
            RemediationOutcome::Skipped(SkipReason::AlreadyInTier(AccessTier::Cool)).to_string(),
            "Skipped: Already Cool"
        );
        assert_eq!(
            RemediationOutcome::Skipped(SkipReason::NoAccessTier).to_string(),
            "Skipped: No access tier set"
        );
        assert_eq!(
            RemediationOutcome::Error(FailureReason::NotAccessible).to_string(),
            "Error: Blob not accessible"
        );
        assert_eq!(
            RemediationOutcome::Error(FailureReason::SetTierFailed).to_string(),
            "Error: Failed to set tier"
        );
    }

    #[test]
    fn stats_count_each_outcome() {
        let mut stats = RemediationStats::default();
        stats.record(&RemediationOutcome::Changed);
        stats.record(&RemediationOutcome::Skipped(SkipReason::NoAccessTier));
        stats.record(&RemediationOutcome::Error(FailureReason::NotAccessible));
        stats.record(&RemediationOutcome::Changed);
        assert_eq!(
            stats,
            RemediationStats {
                processed: 4,
                changed: 2,
                skipped: 1,
                errors: 1,
            }
        );
    }

    #[tokio::test]
    async fn archive_is_demoted_to_cool() {
        let store = Arc::new(MemoryBlobStore::new());
        let blob = reference("a.txt");
        store.insert_blob(&blob, "x", Some(AccessTier::Archive));

        let remediator = TierRemediator::new(store.clone());
        assert_eq!(remediator.remediate(&blob).await, RemediationOutcome::Changed);
        assert_eq!(store.access_tier(&blob), Some(Some(AccessTier::Cool)));
    }

    #[tokio::test]
    async fn other_tiers_are_skipped() {
        let store = Arc::new(MemoryBlobStore::new());
        let blob = reference("hot.txt");
        store.insert_blob(&blob, "x", Some(AccessTier::Hot));

        let outcome = TierRemediator::new(store.clone()).remediate(&blob).await;
        assert_eq!(
            outcome,
            RemediationOutcome::Skipped(SkipReason::AlreadyInTier(AccessTier::Hot))
        );
        assert_eq!(store.access_tier(&blob), Some(Some(AccessTier::Hot)));
    }

    #[tokio::test]
    async fn missing_blob_is_not_accessible() {
        let store = Arc::new(MemoryBlobStore::new());
        let outcome = TierRemediator::new(store).remediate(&reference("gone")).await;
        assert_eq!(outcome, RemediationOutcome::Error(FailureReason::NotAccessible));
    }
}
