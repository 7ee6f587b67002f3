use crate::fixtures::{product_page, PRODUCT_ID};
use review_harvester::config::HeaderConfig;
use review_harvester::crawler::{build_http_client, HeaderProfile, Timeouts};
use review_harvester::extract::{ProductPageTitleResolver, TitleResolver};
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn resolver(server: &MockServer) -> ProductPageTitleResolver {
    let timeouts = Timeouts {
        connect: Duration::from_secs(1),
        read: Duration::from_secs(1),
    };
    ProductPageTitleResolver::new(
        build_http_client(timeouts, false).unwrap(),
        format!("{}/vp/products/", server.uri()),
        HeaderProfile::from_config(&HeaderConfig::default()),
        "Fallback",
    )
}

#[tokio::test]
async fn test_resolves_title_from_product_page() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/vp/products/{}", PRODUCT_ID)))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(product_page("  Cold Brew\n Coffee ")),
        )
        .mount(&server)
        .await;

    assert_eq!(
        resolver(&server).resolve_title(PRODUCT_ID).await,
        "Cold Brew Coffee"
    );
}

#[tokio::test]
async fn test_missing_page_falls_back() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    assert_eq!(resolver(&server).resolve_title(PRODUCT_ID).await, "Fallback");
}
