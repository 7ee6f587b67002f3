use review_harvester::config::{Config, DelayConfig};

pub const PRODUCT_ID: &str = "7335597976";
pub const LISTING_PATH: &str = "/vp/product/reviews";

/// Listing page with `n` review cards
pub fn listing_page(n: usize) -> String {
    let cards: String = (1..=n)
        .map(|i| {
            format!(
                r#"<article class="sdp-review__article__list js_reviewArticleReviewList">
  <span class="sdp-review__article__list__info__user__name">buyer{i}***</span>
  <div class="sdp-review__article__list__info__product-info__star-orange" data-rating="{rating}"></div>
  <div class="sdp-review__article__list__info__product-info__reg-date">2024.06.{i:02}</div>
  <div class="sdp-review__article__list__info__product-info__name">Option {i}</div>
  <div class="sdp-review__article__list__review">
    <div class="sdp-review__article__list__review__content js_reviewArticleContent">Review text {i}</div>
  </div>
  <span class="js_reviewArticleHelpfulCount">{i}</span>
</article>"#,
                i = i,
                rating = 5 - (i % 3),
            )
        })
        .collect();
    format!("<div class=\"sdp-review__article\">{}</div>", cards)
}

pub fn product_page(title: &str) -> String {
    format!(
        "<html><head><title>Shop</title></head><body>\
         <h1 class=\"prod-buy-header__title\">{}</h1></body></html>",
        title
    )
}

/// Config pointed at a mock server, with no pauses and no title lookup
pub fn test_config(server_uri: &str, output_dir: &str) -> Config {
    let mut config = Config::default();
    config.target.product_id = Some(PRODUCT_ID.to_string());
    config.target.endpoint = format!("{}{}", server_uri, LISTING_PATH);
    config.target.product_page_base = format!("{}/vp/products/", server_uri);
    config.target.connect_timeout_secs = 1;
    config.target.read_timeout_secs = 1;
    config.delays = DelayConfig::none();
    config.crawler.max_empty_pages = 1;
    config.crawler.max_page = 20;
    config.output.directory = output_dir.to_string();
    config.output.resolve_title = false;
    config.output.fallback_title = "Fallback".to_string();
    config
}
