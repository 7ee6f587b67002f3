use crate::fixtures::{listing_page, test_config, LISTING_PATH, PRODUCT_ID};
use review_harvester::crawler::{
    FetchOutcome, HeaderProfile, HttpPageFetcher, NetworkErrorKind, PageFetcher, PageRequest,
    Timeouts,
};
use review_harvester::extract::ReviewCardExtractor;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{header_exists, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn fetch_page_one(
    server: &MockServer,
    configure: impl FnOnce(&mut review_harvester::Config),
) -> FetchOutcome {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(&server.uri(), dir.path().to_str().unwrap());
    configure(&mut config);

    let fetcher =
        HttpPageFetcher::new(&config.target, Arc::new(ReviewCardExtractor::new())).unwrap();
    let request = PageRequest::new(&config.target, PRODUCT_ID, 1);
    let headers = HeaderProfile::from_config(&config.headers).build(Some("https://example.com/"));

    fetcher
        .fetch(&request, headers, Timeouts::from_target(&config.target))
        .await
}

#[tokio::test]
async fn test_page_with_cards_is_success() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(LISTING_PATH))
        .and(query_param("productId", PRODUCT_ID))
        .and(query_param("page", "1"))
        .and(query_param("size", "5"))
        .and(query_param("sortBy", "ORDER_SCORE_ASC"))
        .and(query_param("ratingSummary", "true"))
        .and(header_exists("user-agent"))
        .and(header_exists("referer"))
        .respond_with(ResponseTemplate::new(200).set_body_string(listing_page(5)))
        .expect(1)
        .mount(&server)
        .await;

    match fetch_page_one(&server, |_| {}).await {
        FetchOutcome::Success { body, .. } => assert!(body.contains("buyer5***")),
        other => panic!("expected success, got {:?}", other),
    }
}

#[tokio::test]
async fn test_blocked_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(LISTING_PATH))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    assert_eq!(
        fetch_page_one(&server, |_| {}).await,
        FetchOutcome::Blocked { status: 403 }
    );
}

#[tokio::test]
async fn test_page_without_cards_is_empty() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(LISTING_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string(listing_page(0)))
        .mount(&server)
        .await;

    assert_eq!(fetch_page_one(&server, |_| {}).await, FetchOutcome::Empty);
}

#[tokio::test]
async fn test_block_marker_turns_empty_into_blocked() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(LISTING_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("<html><body>Access Denied - Reference #18</body></html>"),
        )
        .mount(&server)
        .await;

    let outcome = fetch_page_one(&server, |config| {
        config.target.block_markers = vec!["access denied".to_string()];
    })
    .await;
    assert_eq!(outcome, FetchOutcome::Blocked { status: 200 });
}

#[tokio::test]
async fn test_unlisted_error_status_is_network_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(LISTING_PATH))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    assert_eq!(
        fetch_page_one(&server, |_| {}).await,
        FetchOutcome::NetworkError {
            kind: NetworkErrorKind::Other
        }
    );
}

#[tokio::test]
async fn test_slow_response_is_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(LISTING_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(listing_page(1))
                .set_delay(Duration::from_secs(4)),
        )
        .mount(&server)
        .await;

    assert_eq!(
        fetch_page_one(&server, |_| {}).await,
        FetchOutcome::NetworkError {
            kind: NetworkErrorKind::Timeout
        }
    );
}
