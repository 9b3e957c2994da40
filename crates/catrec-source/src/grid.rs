use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use tracing::{info, warn};
use url::Url;

use catrec_core::error::{CatrecError, FetchError};
use catrec_core::models::identifier::SourceKind;
use catrec_core::models::range::DateRange;
use catrec_core::models::report::SourceStatus;

use crate::fetcher::RetryingFetcher;
use crate::{endpoint, parse_total, CatalogAdapter, CatalogCount, CatalogQueryResult};

static TOTAL_RESULTS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<os:totalResults>(\d+)</os:totalResults>").expect("static regex is valid")
});

/// Grid-processing catalog (Source A). Lists files per dataset, no auth.
pub struct GridCatalog {
    dataset: String,
    rdf_url: Url,
    files_url: Url,
    count_fetcher: RetryingFetcher,
    list_fetcher: RetryingFetcher,
}

impl GridCatalog {
    pub fn new(
        base_url: &Url,
        dataset: &str,
        count_fetcher: RetryingFetcher,
        list_fetcher: RetryingFetcher,
    ) -> Result<Self, CatrecError> {
        Ok(Self {
            dataset: dataset.to_string(),
            rdf_url: endpoint(base_url, &[dataset, "rdf", ""])?,
            files_url: endpoint(base_url, &[dataset, "files", ""])?,
            count_fetcher,
            list_fetcher,
        })
    }

    fn query_url(base: &Url, range: &DateRange, count: &str) -> Url {
        let mut url = base.clone();
        url.query_pairs_mut()
            .append_pair("count", count)
            .append_pair("start", &range.start().format("%Y-%m-%d").to_string())
            .append_pair("stop", &range.end().format("%Y-%m-%d").to_string());
        url
    }

    /// Non-empty, trimmed lines of a file listing.
    pub fn parse_listing(body: &str) -> Vec<String> {
        body.lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect()
    }
}

#[async_trait]
impl CatalogAdapter for GridCatalog {
    async fn count_in_range(&self, range: &DateRange) -> Result<CatalogCount, CatrecError> {
        let url = Self::query_url(&self.rdf_url, range, "1");
        info!(dataset = %self.dataset, %range, "querying grid catalog count");
        match self
            .count_fetcher
            .fetch_parsed(&url, None, |body| parse_total(&TOTAL_RESULTS, body, &url))
            .await
        {
            Ok(total) => Ok(CatalogCount {
                total,
                status: SourceStatus::Complete,
            }),
            Err(FetchError::Cancelled { .. }) => Err(CatrecError::Cancelled),
            Err(e) => {
                warn!(dataset = %self.dataset, %range, error = %e, "grid count unavailable");
                Ok(CatalogCount::degraded(e.to_string()))
            }
        }
    }

    async fn list_in_range(&self, range: &DateRange) -> Result<CatalogQueryResult, CatrecError> {
        let url = Self::query_url(&self.files_url, range, "*");
        info!(dataset = %self.dataset, %range, "listing grid catalog files");
        match self.list_fetcher.fetch(&url, None).await {
            Ok(body) => {
                let items = Self::parse_listing(&body);
                Ok(CatalogQueryResult {
                    total_count: items.len() as u64,
                    items,
                    status: SourceStatus::Complete,
                })
            }
            Err(FetchError::Cancelled { .. }) => Err(CatrecError::Cancelled),
            Err(e) => {
                warn!(dataset = %self.dataset, %range, error = %e, "grid listing unavailable");
                Ok(CatalogQueryResult::degraded(e.to_string()))
            }
        }
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Grid
    }
}
