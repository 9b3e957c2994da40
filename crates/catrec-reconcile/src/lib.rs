pub mod engine;
pub mod reconcile;

use catrec_core::config::{CatrecConfig, DatasetConfig};
use catrec_core::error::CatrecError;
use catrec_core::models::credentials::BasicCredentials;
use catrec_core::models::identifier::{IdentifierNormalizer, SourceKind};
use catrec_core::models::range::DateRange;
use catrec_core::models::report::{Mode, Report, ReportMeta};
use catrec_source::fetcher::RetryingFetcher;
use tokio_util::sync::CancellationToken;

use crate::engine::ReconcileEngine;
use crate::reconcile::Reconciler;

/// Build the engine comparing one configured dataset across both catalogs.
pub fn build_engine(
    config: &CatrecConfig,
    dataset: &DatasetConfig,
    fetcher: &RetryingFetcher,
    credentials: BasicCredentials,
) -> Result<ReconcileEngine, CatrecError> {
    let grid = catrec_source::create_adapter(SourceKind::Grid, config, dataset, fetcher, None)?;
    let hub = catrec_source::create_adapter(
        SourceKind::Hub,
        config,
        dataset,
        fetcher,
        Some(credentials),
    )?;
    let reconciler = Reconciler::new(IdentifierNormalizer::new(config.grid.suffix.clone()));
    ReconcileEngine::new(grid, hub, reconciler)
}

/// Run one dataset over `range` in the given mode.
pub async fn reconcile_dataset(
    engine: &ReconcileEngine,
    dataset: &DatasetConfig,
    mode: Mode,
    range: DateRange,
    cancel: &CancellationToken,
) -> Result<Report, CatrecError> {
    let meta = ReportMeta::new(mode, &dataset.name, &dataset.hub_product(), range);
    engine.run(meta, cancel).await
}
