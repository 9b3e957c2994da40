pub mod fetcher;
pub mod grid;
pub mod hub;
pub mod paginator;

use async_trait::async_trait;
use catrec_core::config::{CatrecConfig, DatasetConfig};
use catrec_core::error::{CatrecError, ParseError};
use catrec_core::models::credentials::BasicCredentials;
use catrec_core::models::identifier::SourceKind;
use catrec_core::models::range::DateRange;
use catrec_core::models::report::SourceStatus;

use crate::fetcher::{RetryPolicy, RetryingFetcher};

/// Total reported by a catalog for a range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogCount {
    pub total: u64,
    pub status: SourceStatus,
}

impl CatalogCount {
    pub fn degraded(reason: impl Into<String>) -> Self {
        Self {
            total: 0,
            status: SourceStatus::degraded(reason),
        }
    }
}

/// Raw identifiers retrieved from a catalog for a range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogQueryResult {
    pub items: Vec<String>,
    /// Total the catalog announced. Matches `items.len()` only when the
    /// retrieval was complete.
    pub total_count: u64,
    pub status: SourceStatus,
}

impl CatalogQueryResult {
    pub fn degraded(reason: impl Into<String>) -> Self {
        Self {
            items: Vec::new(),
            total_count: 0,
            status: SourceStatus::degraded(reason),
        }
    }
}

/// Trait for querying a product catalog.
///
/// Fetch failures never surface as errors: they come back as empty or
/// partial results with a [`SourceStatus::Degraded`] status. The only error
/// an implementation returns is [`CatrecError::Cancelled`].
#[async_trait]
pub trait CatalogAdapter: Send + Sync {
    /// Number of products the catalog reports for the range.
    async fn count_in_range(&self, range: &DateRange) -> Result<CatalogCount, CatrecError>;

    /// Every raw product identifier in the range.
    async fn list_in_range(&self, range: &DateRange) -> Result<CatalogQueryResult, CatrecError>;

    /// The kind of catalog this adapter handles.
    fn kind(&self) -> SourceKind;
}

/// Create the adapter for one side of a dataset comparison.
///
/// The hub requires `credentials`; without them this fails with
/// [`CatrecError::Config`].
pub fn create_adapter(
    kind: SourceKind,
    config: &CatrecConfig,
    dataset: &DatasetConfig,
    fetcher: &RetryingFetcher,
    credentials: Option<BasicCredentials>,
) -> Result<Box<dyn CatalogAdapter>, CatrecError> {
    let count_fetcher = fetcher.with_policy(RetryPolicy::for_counts(&config.retry));
    let list_fetcher = fetcher.with_policy(RetryPolicy::for_lists(&config.retry));
    match kind {
        SourceKind::Grid => Ok(Box::new(grid::GridCatalog::new(
            &config.grid.base_url,
            &dataset.name,
            count_fetcher,
            list_fetcher,
        )?)),
        SourceKind::Hub => {
            let credentials = credentials.ok_or_else(|| CatrecError::Config {
                message: "hub credentials are required".into(),
            })?;
            Ok(Box::new(hub::HubCatalog::new(
                &config.hub.base_url,
                dataset.clone(),
                credentials,
                paginator::Paginator::new(config.hub.window_size),
                count_fetcher,
                list_fetcher,
            )?))
        }
    }
}

/// The total a catalog announces, captured by the first group of `pattern`.
pub(crate) fn parse_total(
    pattern: &regex::Regex,
    body: &str,
    url: &url::Url,
) -> Result<u64, ParseError> {
    pattern
        .captures(body)
        .and_then(|caps| caps[1].parse().ok())
        .ok_or_else(|| ParseError {
            pattern: pattern.as_str().to_string(),
            url: url.to_string(),
        })
}

/// Join `segments` under `base` as directories, keeping any base path.
pub(crate) fn endpoint(base: &url::Url, segments: &[&str]) -> Result<url::Url, CatrecError> {
    let mut url = base.clone();
    url.set_query(None);
    {
        let mut path = url.path_segments_mut().map_err(|_| CatrecError::Config {
            message: format!("{base} cannot be used as a catalog base url"),
        })?;
        path.pop_if_empty();
        path.extend(segments);
    }
    Ok(url)
}
