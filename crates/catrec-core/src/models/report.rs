use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::identifier::CanonicalKey;
use super::range::{DateRange, Granularity};
use crate::error::CatrecError;

/// Whether a catalog answered fully for a chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SourceStatus {
    Complete,
    /// Data is missing or partial; counts for this source are a lower bound.
    Degraded { reason: String },
}

impl SourceStatus {
    pub fn degraded(reason: impl Into<String>) -> Self {
        SourceStatus::Degraded {
            reason: reason.into(),
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, SourceStatus::Complete)
    }

    /// Combine two statuses, keeping every degradation reason.
    pub fn merge(self, other: SourceStatus) -> SourceStatus {
        match (self, other) {
            (SourceStatus::Complete, SourceStatus::Complete) => SourceStatus::Complete,
            (SourceStatus::Complete, d) | (d, SourceStatus::Complete) => d,
            (SourceStatus::Degraded { reason: a }, SourceStatus::Degraded { reason: b }) => {
                SourceStatus::Degraded {
                    reason: format!("{a}; {b}"),
                }
            }
        }
    }
}

impl std::fmt::Display for SourceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceStatus::Complete => write!(f, "complete"),
            SourceStatus::Degraded { reason } => write!(f, "degraded ({reason})"),
        }
    }
}

/// How a record was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    /// Only the totals reported by each catalog were compared.
    CountOnly,
    /// Full identifier lists were retrieved and diffed.
    Listed,
}

/// Outcome of comparing both catalogs over one chunk.
#[derive(Debug, Clone, Serialize)]
pub struct ReconciliationRecord {
    pub range: DateRange,
    pub kind: RecordKind,
    pub count_a: u64,
    pub count_b: u64,
    /// Total announced by the hub, when it differs from what was collected.
    pub reported_b: Option<u64>,
    pub missing_in_b: BTreeSet<CanonicalKey>,
    pub missing_in_a: BTreeSet<CanonicalKey>,
    /// `count_a != count_b`, on raw counts.
    pub mismatch: bool,
    pub status_a: SourceStatus,
    pub status_b: SourceStatus,
}

impl ReconciliationRecord {
    pub fn is_degraded(&self) -> bool {
        !self.status_a.is_complete() || !self.status_b.is_complete()
    }

    /// True when the catalogs disagree on counts or on membership.
    pub fn has_differences(&self) -> bool {
        self.mismatch || !self.missing_in_a.is_empty() || !self.missing_in_b.is_empty()
    }
}

/// Which kind of reconciliation a run performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Per-day total comparison over a short trailing window.
    Daily,
    /// Per-month identifier reconciliation over a long range.
    Monthly,
}

impl Mode {
    pub fn granularity(&self) -> Granularity {
        match self {
            Mode::Daily => Granularity::Day,
            Mode::Monthly => Granularity::Month,
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Daily => write!(f, "daily"),
            Mode::Monthly => write!(f, "monthly"),
        }
    }
}

impl std::str::FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "daily" | "day" => Ok(Mode::Daily),
            "monthly" | "month" => Ok(Mode::Monthly),
            _ => Err(format!("unknown mode: {s}")),
        }
    }
}

/// Run metadata carried by a [`Report`].
#[derive(Debug, Clone, Serialize)]
pub struct ReportMeta {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub mode: Mode,
    /// Dataset name in the grid catalog.
    pub dataset: String,
    /// Product selector on the hub side, e.g. `Sentinel-2/S2MSI1C`.
    pub hub_product: String,
    pub range: DateRange,
}

impl ReportMeta {
    pub fn new(mode: Mode, dataset: &str, hub_product: &str, range: DateRange) -> Self {
        Self {
            run_id: Uuid::now_v7(),
            generated_at: Utc::now(),
            mode,
            dataset: dataset.to_string(),
            hub_product: hub_product.to_string(),
            range,
        }
    }
}

/// Finished, immutable result of one reconciliation run.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub meta: ReportMeta,
    pub records: Vec<ReconciliationRecord>,
    /// The run was stopped before every chunk was processed.
    pub cancelled: bool,
}

impl Report {
    pub fn mismatch_count(&self) -> usize {
        self.records.iter().filter(|r| r.mismatch).count()
    }

    pub fn degraded_count(&self) -> usize {
        self.records.iter().filter(|r| r.is_degraded()).count()
    }

    pub fn differing_count(&self) -> usize {
        self.records.iter().filter(|r| r.has_differences()).count()
    }

    pub fn to_json(&self) -> Result<String, CatrecError> {
        serde_json::to_string_pretty(self).map_err(|e| CatrecError::Serialization(e.to_string()))
    }
}

/// Append-only collector of records, in chunk order.
#[derive(Debug)]
pub struct ReportAccumulator {
    meta: ReportMeta,
    records: Vec<ReconciliationRecord>,
    cancelled: bool,
}

impl ReportAccumulator {
    pub fn new(meta: ReportMeta) -> Self {
        Self {
            meta,
            records: Vec::new(),
            cancelled: false,
        }
    }

    /// Append a record. Records must lie inside the queried range and follow
    /// the previous record without overlapping it.
    pub fn push(&mut self, record: ReconciliationRecord) -> Result<(), CatrecError> {
        let range = record.range;
        if !self.meta.range.contains(range.start()) || !self.meta.range.contains(range.end()) {
            return Err(CatrecError::Report {
                message: format!("chunk {range} lies outside {}", self.meta.range),
            });
        }
        if let Some(last) = self.records.last() {
            if range.start() <= last.range.end() {
                return Err(CatrecError::Report {
                    message: format!("chunk {range} does not follow {}", last.range),
                });
            }
        }
        self.records.push(record);
        Ok(())
    }

    pub fn mark_cancelled(&mut self) {
        self.cancelled = true;
    }

    pub fn finish(self) -> Report {
        Report {
            meta: self.meta,
            records: self.records,
            cancelled: self.cancelled,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn d(m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, day).unwrap()
    }

    fn record(range: DateRange, count_a: u64, count_b: u64) -> ReconciliationRecord {
        ReconciliationRecord {
            range,
            kind: RecordKind::CountOnly,
            count_a,
            count_b,
            reported_b: None,
            missing_in_b: BTreeSet::new(),
            missing_in_a: BTreeSet::new(),
            mismatch: count_a != count_b,
            status_a: SourceStatus::Complete,
            status_b: SourceStatus::Complete,
        }
    }

    fn accumulator() -> ReportAccumulator {
        let range = DateRange::new(d(1, 1), d(3, 31)).unwrap();
        ReportAccumulator::new(ReportMeta::new(
            Mode::Monthly,
            "S2A_PRD_MSIL1C",
            "Sentinel-2/S2MSI1C",
            range,
        ))
    }

    #[test]
    fn test_records_keep_chunk_order() {
        let mut acc = accumulator();
        let chunks: Vec<_> = acc.meta.range.chunks(Granularity::Month).collect();
        for (i, chunk) in chunks.iter().enumerate() {
            acc.push(record(*chunk, i as u64, 1)).unwrap();
        }
        let report = acc.finish();
        assert_eq!(report.records.len(), 3);
        assert_eq!(report.records[0].range, chunks[0]);
        assert_eq!(report.records[2].range, chunks[2]);
        assert_eq!(report.mismatch_count(), 2);
        assert!(!report.cancelled);
    }

    #[test]
    fn test_out_of_order_push_is_rejected() {
        let mut acc = accumulator();
        let feb = DateRange::new(d(2, 1), d(2, 29)).unwrap();
        let jan = DateRange::new(d(1, 1), d(1, 31)).unwrap();
        acc.push(record(feb, 1, 1)).unwrap();
        assert!(matches!(
            acc.push(record(jan, 1, 1)),
            Err(CatrecError::Report { .. })
        ));
        assert_eq!(acc.records.len(), 1);
    }

    #[test]
    fn test_chunk_outside_range_is_rejected() {
        let mut acc = accumulator();
        let april = DateRange::new(d(4, 1), d(4, 30)).unwrap();
        assert!(acc.push(record(april, 1, 1)).is_err());
        assert!(acc.records.is_empty());
    }

    #[test]
    fn test_status_merge_keeps_reasons() {
        let merged = SourceStatus::degraded("window 0 failed")
            .merge(SourceStatus::Complete)
            .merge(SourceStatus::degraded("short window"));
        assert_eq!(
            merged,
            SourceStatus::degraded("window 0 failed; short window")
        );
        assert!(SourceStatus::Complete
            .merge(SourceStatus::Complete)
            .is_complete());
    }

    #[test]
    fn test_degraded_record_counts() {
        let mut acc = accumulator();
        let mut rec = record(DateRange::new(d(1, 5), d(1, 5)).unwrap(), 0, 0);
        rec.status_b = SourceStatus::degraded("unreachable");
        acc.push(rec).unwrap();
        acc.mark_cancelled();
        let report = acc.finish();
        assert_eq!(report.degraded_count(), 1);
        assert_eq!(report.mismatch_count(), 0);
        assert!(report.cancelled);
        let json = report.to_json().unwrap();
        assert!(json.contains("\"state\": \"degraded\""));
    }
}
