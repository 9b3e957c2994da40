use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use tracing::{debug, info, warn};
use url::Url;

use catrec_core::config::DatasetConfig;
use catrec_core::error::{CatrecError, FetchError, ParseError};
use catrec_core::models::credentials::BasicCredentials;
use catrec_core::models::identifier::SourceKind;
use catrec_core::models::range::DateRange;
use catrec_core::models::report::SourceStatus;

use crate::fetcher::RetryingFetcher;
use crate::paginator::{Paginator, Window};
use crate::{endpoint, parse_total, CatalogAdapter, CatalogCount, CatalogQueryResult};

static TOTAL_RESULTS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<opensearch:totalResults>(\d+)</opensearch:totalResults>")
        .expect("static regex is valid")
});

static IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<str name="identifier">([^<]+)</str>"#).expect("static regex is valid")
});

/// Open-search data hub (Source B). Basic auth, paginated search.
pub struct HubCatalog {
    dataset: DatasetConfig,
    search_url: Url,
    credentials: BasicCredentials,
    paginator: Paginator,
    count_fetcher: RetryingFetcher,
    list_fetcher: RetryingFetcher,
}

impl HubCatalog {
    pub fn new(
        base_url: &Url,
        dataset: DatasetConfig,
        credentials: BasicCredentials,
        paginator: Paginator,
        count_fetcher: RetryingFetcher,
        list_fetcher: RetryingFetcher,
    ) -> Result<Self, CatrecError> {
        Ok(Self {
            dataset,
            search_url: endpoint(base_url, &["search"])?,
            credentials,
            paginator,
            count_fetcher,
            list_fetcher,
        })
    }

    /// Search query selecting products sensed entirely within `range`.
    pub fn query(&self, range: &DateRange) -> String {
        let begin = format!("{}T00:00:00.000Z", range.start().format("%Y-%m-%d"));
        let end = format!("{}T23:59:59.999Z", range.end().format("%Y-%m-%d"));
        let mut filter = format!(
            "platformname:{} AND producttype:{}",
            self.dataset.platform_name, self.dataset.product_type
        );
        if let Some(timeliness) = &self.dataset.timeliness {
            filter.push_str(&format!(" AND timeliness:\"{timeliness}\""));
        }
        format!(
            "( beginposition:[{begin} TO {end}] AND endposition:[{begin} TO {end}] ) AND ({filter})"
        )
    }

    fn page_url(&self, range: &DateRange, start: u64, rows: u64) -> Url {
        let mut url = self.search_url.clone();
        url.query_pairs_mut()
            .append_pair("start", &start.to_string())
            .append_pair("rows", &rows.to_string())
            .append_pair("q", &self.query(range));
        url
    }

    /// Identifiers of one search page. The total must be present, so an
    /// error page is treated as a parse failure rather than an empty page.
    fn parse_page(body: &str, url: &Url) -> Result<Vec<String>, ParseError> {
        parse_total(&TOTAL_RESULTS, body, url)?;
        Ok(IDENTIFIER
            .captures_iter(body)
            .map(|caps| caps[1].trim().to_string())
            .collect())
    }

    async fn fetch_window(&self, range: &DateRange, window: Window) -> Result<Vec<String>, FetchError> {
        let url = self.page_url(range, window.offset, window.rows);
        debug!(%range, offset = window.offset, rows = window.rows, "fetching hub page");
        self.list_fetcher
            .fetch_parsed(&url, Some(&self.credentials), |body| {
                Self::parse_page(body, &url)
            })
            .await
    }
}

#[async_trait]
impl CatalogAdapter for HubCatalog {
    async fn count_in_range(&self, range: &DateRange) -> Result<CatalogCount, CatrecError> {
        let url = self.page_url(range, 0, 1);
        info!(product = %self.dataset.hub_product(), %range, "querying hub count");
        match self
            .count_fetcher
            .fetch_parsed(&url, Some(&self.credentials), |body| {
                parse_total(&TOTAL_RESULTS, body, &url)
            })
            .await
        {
            Ok(total) => Ok(CatalogCount {
                total,
                status: SourceStatus::Complete,
            }),
            Err(FetchError::Cancelled { .. }) => Err(CatrecError::Cancelled),
            Err(e) => {
                warn!(%range, error = %e, "hub count unavailable");
                Ok(CatalogCount::degraded(e.to_string()))
            }
        }
    }

    async fn list_in_range(&self, range: &DateRange) -> Result<CatalogQueryResult, CatrecError> {
        let count = self.count_in_range(range).await?;
        if !count.status.is_complete() {
            return Ok(CatalogQueryResult {
                items: Vec::new(),
                total_count: 0,
                status: count.status,
            });
        }

        info!(
            %range,
            total = count.total,
            window_size = self.paginator.window_size(),
            "listing hub products"
        );
        let pages = self
            .paginator
            .collect(count.total, move |window| self.fetch_window(range, window))
            .await;
        if pages.cancelled {
            return Err(CatrecError::Cancelled);
        }

        let status = pages.status();
        if let SourceStatus::Degraded { reason } = &status {
            warn!(%range, %reason, collected = pages.items.len(), "hub listing incomplete");
        }
        Ok(CatalogQueryResult {
            items: pages.items,
            total_count: pages.total,
            status,
        })
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Hub
    }
}
