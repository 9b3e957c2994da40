use indicatif::ProgressBar;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use catrec_core::error::CatrecError;
use catrec_core::models::identifier::SourceKind;
use catrec_core::models::range::DateRange;
use catrec_core::models::report::{
    Mode, ReconciliationRecord, Report, ReportAccumulator, ReportMeta,
};
use catrec_source::CatalogAdapter;

use crate::reconcile::Reconciler;

/// Drives every chunk of a range through both catalogs.
///
/// Chunks run one after another; within a chunk the two catalogs are
/// queried concurrently.
pub struct ReconcileEngine {
    grid: Box<dyn CatalogAdapter>,
    hub: Box<dyn CatalogAdapter>,
    reconciler: Reconciler,
    progress: ProgressBar,
}

impl ReconcileEngine {
    pub fn new(
        grid: Box<dyn CatalogAdapter>,
        hub: Box<dyn CatalogAdapter>,
        reconciler: Reconciler,
    ) -> Result<Self, CatrecError> {
        if grid.kind() != SourceKind::Grid || hub.kind() != SourceKind::Hub {
            return Err(CatrecError::Config {
                message: format!(
                    "engine needs a grid and a hub adapter, got {} and {}",
                    grid.kind(),
                    hub.kind()
                ),
            });
        }
        Ok(Self {
            grid,
            hub,
            reconciler,
            progress: ProgressBar::hidden(),
        })
    }

    /// Report chunk progress on `progress`; its length is set per run.
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    /// Reconcile `meta.range` chunk by chunk.
    ///
    /// On cancellation the report is returned with the records gathered so
    /// far and `cancelled` set.
    pub async fn run(
        &self,
        meta: ReportMeta,
        cancel: &CancellationToken,
    ) -> Result<Report, CatrecError> {
        let chunks = meta.range.chunks(meta.mode.granularity());
        let mode = meta.mode;
        info!(
            dataset = %meta.dataset,
            range = %meta.range,
            %mode,
            "starting reconciliation"
        );
        self.progress.set_length(chunks.clone().count() as u64);

        let mut acc = ReportAccumulator::new(meta);
        for chunk in chunks {
            if cancel.is_cancelled() {
                acc.mark_cancelled();
                break;
            }
            self.progress.set_message(chunk.to_string());

            let outcome = match mode {
                Mode::Daily => self.count_chunk(chunk).await,
                Mode::Monthly => self.list_chunk(chunk).await,
            };
            match outcome {
                Ok(record) => {
                    log_record(&record);
                    acc.push(record)?;
                }
                Err(CatrecError::Cancelled) => {
                    warn!(%chunk, "reconciliation cancelled");
                    acc.mark_cancelled();
                    break;
                }
                Err(e) => return Err(e),
            }
            self.progress.inc(1);
        }
        self.progress.finish_and_clear();

        let report = acc.finish();
        info!(
            chunks = report.records.len(),
            mismatches = report.mismatch_count(),
            degraded = report.degraded_count(),
            cancelled = report.cancelled,
            "reconciliation finished"
        );
        Ok(report)
    }

    async fn count_chunk(&self, chunk: DateRange) -> Result<ReconciliationRecord, CatrecError> {
        let (a, b) = tokio::join!(
            self.grid.count_in_range(&chunk),
            self.hub.count_in_range(&chunk)
        );
        Ok(self.reconciler.compare_counts(chunk, &a?, &b?))
    }

    async fn list_chunk(&self, chunk: DateRange) -> Result<ReconciliationRecord, CatrecError> {
        let (a, b) = tokio::join!(
            self.grid.list_in_range(&chunk),
            self.hub.list_in_range(&chunk)
        );
        Ok(self.reconciler.reconcile_results(chunk, &a?, &b?))
    }
}

fn log_record(record: &ReconciliationRecord) {
    info!(
        chunk = %record.range,
        count_a = record.count_a,
        count_b = record.count_b,
        missing_in_a = record.missing_in_a.len(),
        missing_in_b = record.missing_in_b.len(),
        mismatch = record.mismatch,
        "chunk reconciled"
    );
    if record.is_degraded() {
        warn!(
            chunk = %record.range,
            grid = %record.status_a,
            hub = %record.status_b,
            "chunk result is incomplete"
        );
    }
}
