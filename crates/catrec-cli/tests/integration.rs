use std::collections::BTreeSet;
use std::time::Duration;

use chrono::NaiveDate;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{basic_auth, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use catrec_auth::{resolve_hub_credentials, CredentialStore, MemoryStore};
use catrec_core::config::CatrecConfig;
use catrec_core::models::credentials::BasicCredentials;
use catrec_core::models::identifier::CanonicalKey;
use catrec_core::models::range::DateRange;
use catrec_core::models::report::{Mode, RecordKind};
use catrec_core::render::write_report;
use catrec_reconcile::{build_engine, reconcile_dataset};
use catrec_source::fetcher::{RetryPolicy, RetryingFetcher};

#[test]
fn test_config_defaults() {
    let config = CatrecConfig::default();
    assert_eq!(config.hub.window_size, 99);
    assert_eq!(config.retry.max_attempts, 3);
    assert_eq!(config.daily.days_back, 6);
    assert_eq!(config.datasets[0].hub_product(), "Sentinel-2/S2MSI1C");
    assert!(config.validate().is_ok());
}

#[test]
fn test_config_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    let mut config = CatrecConfig::default();
    config.hub.username = "operator".to_string();
    config.save_to(&path).unwrap();

    let loaded = CatrecConfig::load_from(&path).unwrap();
    assert_eq!(loaded.hub.username, "operator");
    assert_eq!(loaded.datasets, config.datasets);
}

#[test]
fn test_credentials_from_store() {
    let store = MemoryStore::new();
    let mut config = CatrecConfig::default();
    config.hub.username = "operator".to_string();
    store.store(&config.hub.credential_key, "hunter2").unwrap();

    let creds = resolve_hub_credentials(&store, &config.hub).unwrap();
    assert_eq!(creds.username, "operator");
}

fn fixture_config(grid: &MockServer, hub: &MockServer) -> CatrecConfig {
    let mut config = CatrecConfig::default();
    config.grid.base_url = format!("{}/gpod/", grid.uri()).parse().unwrap();
    config.grid.suffix = ".ext".to_string();
    config.hub.base_url = format!("{}/dhus/", hub.uri()).parse().unwrap();
    config.hub.username = "admin".to_string();
    config.retry.delay_secs = 0;
    config.retry.max_attempts = 2;
    config.retry.list_max_attempts = 2;
    config
}

fn fetcher(config: &CatrecConfig, cancel: &CancellationToken) -> RetryingFetcher {
    RetryingFetcher::new(
        RetryPolicy::for_counts(&config.retry),
        Duration::from_secs(5),
        cancel.clone(),
    )
    .unwrap()
}

fn hub_feed(total: u64, ids: &[&str]) -> String {
    let mut body = format!("<feed><opensearch:totalResults>{total}</opensearch:totalResults>");
    for id in ids {
        body.push_str(&format!("<entry><str name=\"identifier\">{id}</str></entry>"));
    }
    body.push_str("</feed>");
    body
}

fn keys(set: &BTreeSet<CanonicalKey>) -> Vec<&str> {
    set.iter().map(CanonicalKey::as_str).collect()
}

fn january() -> DateRange {
    DateRange::new(
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
    )
    .unwrap()
}

#[tokio::test]
async fn test_monthly_reconciliation_over_mock_catalogs() {
    let grid = MockServer::start().await;
    let hub = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/gpod/S2A_PRD_MSIL1C/files/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("X001.ext\nX002.ext\n"))
        .mount(&grid)
        .await;
    Mock::given(method("GET"))
        .and(path("/dhus/search"))
        .and(query_param("rows", "1"))
        .and(basic_auth("admin", "secret"))
        .respond_with(ResponseTemplate::new(200).set_body_string(hub_feed(2, &["X001"])))
        .mount(&hub)
        .await;
    Mock::given(method("GET"))
        .and(path("/dhus/search"))
        .and(query_param("start", "0"))
        .and(query_param("rows", "2"))
        .and(basic_auth("admin", "secret"))
        .respond_with(ResponseTemplate::new(200).set_body_string(hub_feed(2, &["X001", "X003"])))
        .mount(&hub)
        .await;

    let config = fixture_config(&grid, &hub);
    let dataset = &config.datasets[0];
    let cancel = CancellationToken::new();
    let engine = build_engine(
        &config,
        dataset,
        &fetcher(&config, &cancel),
        BasicCredentials::new("admin", "secret"),
    )
    .unwrap();

    let report = reconcile_dataset(&engine, dataset, Mode::Monthly, january(), &cancel)
        .await
        .unwrap();

    assert_eq!(report.records.len(), 1);
    let record = &report.records[0];
    assert_eq!(record.kind, RecordKind::Listed);
    assert_eq!((record.count_a, record.count_b), (2, 2));
    assert!(!record.mismatch);
    assert!(!record.is_degraded());
    assert_eq!(keys(&record.missing_in_b), vec!["X002"]);
    assert_eq!(keys(&record.missing_in_a), vec!["X003"]);

    let out = tempfile::tempdir().unwrap();
    let written = write_report(&report, out.path()).unwrap();
    assert_eq!(written.len(), 4);
    let missing_b = out
        .path()
        .join("S2A_PRD_MSIL1C_2024-01-01_2024-01-31_missing_in_b.txt");
    assert_eq!(std::fs::read_to_string(missing_b).unwrap(), "X002\n");
    let text = std::fs::read_to_string(
        out.path()
            .join("S2A_PRD_MSIL1C_2024-01-01_2024-01-31_report.txt"),
    )
    .unwrap();
    assert!(text.contains("Catalog results for S2A_PRD_MSIL1C"));
}

#[tokio::test]
async fn test_daily_check_flags_unreachable_hub() {
    let grid = MockServer::start().await;
    let hub = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/gpod/S2A_PRD_MSIL1C/rdf/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("<feed><os:totalResults>3</os:totalResults></feed>"),
        )
        .mount(&grid)
        .await;
    Mock::given(method("GET"))
        .and(path("/dhus/search"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&hub)
        .await;

    let config = fixture_config(&grid, &hub);
    let dataset = &config.datasets[0];
    let cancel = CancellationToken::new();
    let engine = build_engine(
        &config,
        dataset,
        &fetcher(&config, &cancel),
        BasicCredentials::new("admin", "secret"),
    )
    .unwrap();

    let range = DateRange::new(
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
        NaiveDate::from_ymd_opt(2024, 3, 2).unwrap(),
    )
    .unwrap();
    let report = reconcile_dataset(&engine, dataset, Mode::Daily, range, &cancel)
        .await
        .unwrap();

    assert_eq!(report.records.len(), 2);
    for record in &report.records {
        assert_eq!(record.kind, RecordKind::CountOnly);
        assert_eq!(record.count_a, 3);
        assert!(record.is_degraded());
    }
    assert_eq!(report.degraded_count(), 2);
    assert!(!report.cancelled);
}
