use std::collections::BTreeSet;

use catrec_core::models::identifier::{IdentifierNormalizer, SourceKind};
use catrec_core::models::range::DateRange;
use catrec_core::models::report::{ReconciliationRecord, RecordKind, SourceStatus};
use catrec_source::{CatalogCount, CatalogQueryResult};

/// Computes per-chunk differences between the grid catalog (A) and the
/// hub (B).
#[derive(Debug, Clone)]
pub struct Reconciler {
    normalizer: IdentifierNormalizer,
}

impl Reconciler {
    pub fn new(normalizer: IdentifierNormalizer) -> Self {
        Self { normalizer }
    }

    /// Diff two raw identifier lists.
    ///
    /// `mismatch` compares raw list lengths, while the missing sets compare
    /// canonical keys, so equal counts can still carry differences.
    pub fn reconcile<A, B>(&self, chunk: DateRange, raw_a: &[A], raw_b: &[B]) -> ReconciliationRecord
    where
        A: AsRef<str>,
        B: AsRef<str>,
    {
        let canonical_a = self.normalizer.normalize_all(raw_a, SourceKind::Grid);
        let canonical_b = self.normalizer.normalize_all(raw_b, SourceKind::Hub);

        let missing_in_b: BTreeSet<_> = canonical_a.difference(&canonical_b).cloned().collect();
        let missing_in_a: BTreeSet<_> = canonical_b.difference(&canonical_a).cloned().collect();

        let count_a = raw_a.len() as u64;
        let count_b = raw_b.len() as u64;

        ReconciliationRecord {
            range: chunk,
            kind: RecordKind::Listed,
            count_a,
            count_b,
            reported_b: None,
            missing_in_b,
            missing_in_a,
            mismatch: count_a != count_b,
            status_a: SourceStatus::Complete,
            status_b: SourceStatus::Complete,
        }
    }

    /// Diff two adapter results, carrying their statuses along.
    pub fn reconcile_results(
        &self,
        chunk: DateRange,
        a: &CatalogQueryResult,
        b: &CatalogQueryResult,
    ) -> ReconciliationRecord {
        let mut record = self.reconcile(chunk, &a.items, &b.items);
        if b.total_count != b.items.len() as u64 {
            record.reported_b = Some(b.total_count);
        }
        record.status_a = a.status.clone();
        record.status_b = b.status.clone();
        record
    }

    /// Compare reported totals only.
    pub fn compare_counts(
        &self,
        chunk: DateRange,
        a: &CatalogCount,
        b: &CatalogCount,
    ) -> ReconciliationRecord {
        ReconciliationRecord {
            range: chunk,
            kind: RecordKind::CountOnly,
            count_a: a.total,
            count_b: b.total,
            reported_b: None,
            missing_in_b: BTreeSet::new(),
            missing_in_a: BTreeSet::new(),
            mismatch: a.total != b.total,
            status_a: a.status.clone(),
            status_b: b.status.clone(),
        }
    }
}
