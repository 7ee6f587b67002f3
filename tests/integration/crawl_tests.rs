use crate::fixtures::{listing_page, product_page, test_config, LISTING_PATH, PRODUCT_ID};
use review_harvester::config::{CrawlMode, OutputFormat};
use review_harvester::storage::{open_database, product_totals, recent_runs};
use review_harvester::{run_crawl, CancellationToken, ReviewRecord, TerminationReason};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Pages 1 and 2 carry five reviews each; every other page is empty
async fn mount_listing(server: &MockServer) {
    for page in ["1", "2"] {
        Mock::given(method("GET"))
            .and(path(LISTING_PATH))
            .and(query_param("productId", PRODUCT_ID))
            .and(query_param("page", page))
            .respond_with(ResponseTemplate::new(200).set_body_string(listing_page(5)))
            .mount(server)
            .await;
    }

    Mock::given(method("GET"))
        .and(path(LISTING_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string(listing_page(0)))
        .mount(server)
        .await;
}

fn read_csv(path: &std::path::Path) -> Vec<ReviewRecord> {
    csv::Reader::from_path(path)
        .unwrap()
        .deserialize()
        .collect::<Result<_, _>>()
        .unwrap()
}

#[tokio::test]
async fn test_sequential_crawl_to_csv() {
    let server = MockServer::start().await;
    mount_listing(&server).await;
    Mock::given(method("GET"))
        .and(path(format!("/vp/products/{}", PRODUCT_ID)))
        .respond_with(ResponseTemplate::new(200).set_body_string(product_page("Cold Brew")))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(&server.uri(), dir.path().to_str().unwrap());
    config.output.resolve_title = true;

    let report = run_crawl(&config, "hash", CancellationToken::new()).await.unwrap();

    assert_eq!(report.reason, TerminationReason::MaxEmptyPagesReached);
    assert_eq!(report.title, "Cold Brew");
    assert_eq!(report.pages_attempted, 3);
    assert_eq!(report.pages_succeeded, 2);
    assert_eq!(report.pages_empty, 1);
    assert_eq!(report.records_persisted, 10);
    assert!(report.failed_pages.is_empty());

    let records = read_csv(&dir.path().join("Cold Brew.csv"));
    assert_eq!(records.len(), 10);
    assert!(records.iter().all(|r| r.title == "Cold Brew"));
    assert_eq!(records[0].reviewer, "buyer1***");
    assert_eq!(records[0].body, "Review text 1");
}

#[tokio::test]
async fn test_batched_crawl_keeps_page_order() {
    let server = MockServer::start().await;
    mount_listing(&server).await;

    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(&server.uri(), dir.path().to_str().unwrap());
    config.crawler.mode = CrawlMode::Batched;
    config.crawler.batch_size = 4;

    let report = run_crawl(&config, "hash", CancellationToken::new()).await.unwrap();

    assert_eq!(report.reason, TerminationReason::MaxEmptyPagesReached);
    assert_eq!(report.pages_attempted, 4);
    assert_eq!(report.records_persisted, 10);

    let records = read_csv(&dir.path().join("Fallback.csv"));
    assert_eq!(records.len(), 10);
    let dates: Vec<&str> = records.iter().map(|r| r.review_date.as_str()).collect();
    assert_eq!(dates[0], "2024.06.01");
    assert_eq!(dates[5], "2024.06.01");
}

#[tokio::test]
async fn test_repeated_sqlite_crawls_do_not_duplicate() {
    let server = MockServer::start().await;
    mount_listing(&server).await;

    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(&server.uri(), dir.path().to_str().unwrap());
    config.output.format = OutputFormat::Sqlite;

    run_crawl(&config, "first", CancellationToken::new()).await.unwrap();
    run_crawl(&config, "second", CancellationToken::new()).await.unwrap();

    let conn = open_database(&config.output.database_path()).unwrap();

    // Both pages serve the same five cards, so only five are distinct
    let totals = product_totals(&conn).unwrap();
    assert_eq!(totals.len(), 1);
    assert_eq!(totals[0].product_id, PRODUCT_ID);
    assert_eq!(totals[0].reviews, 5);

    let runs = recent_runs(&conn, 10).unwrap();
    assert_eq!(runs.len(), 2);
    assert_eq!(runs[0].config_hash, "second");
    assert!(runs.iter().all(|r| r.finished_at.is_some()));
    assert_eq!(
        runs[0].termination_reason.as_deref(),
        Some(TerminationReason::MaxEmptyPagesReached.to_db_string())
    );
}

#[tokio::test]
async fn test_cancelled_before_start() {
    let server = MockServer::start().await;
    mount_listing(&server).await;

    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&server.uri(), dir.path().to_str().unwrap());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let report = run_crawl(&config, "hash", cancel).await.unwrap();
    assert_eq!(report.reason, TerminationReason::UserCancelled);
    assert_eq!(report.pages_attempted, 0);
}

#[tokio::test]
async fn test_missing_product_is_a_config_error() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(&server.uri(), dir.path().to_str().unwrap());
    config.target.product_id = None;

    let err = run_crawl(&config, "hash", CancellationToken::new()).await.unwrap_err();
    assert!(matches!(
        err,
        review_harvester::HarvestError::Config(review_harvester::ConfigError::MissingProduct)
    ));
}
