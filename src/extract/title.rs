//! Product title lookup
//!
//! Title resolution is best effort: every failure path ends in the configured
//! fallback title, never in an error.

use crate::crawler::HeaderProfile;
use reqwest::Client;
use scraper::{Html, Selector};
use std::future::Future;

/// Heading selectors tried in order before falling back to `<title>`
const TITLE_SELECTORS: &[&str] = &[
    "h1.prod-buy-header__title",
    ".prod-buy-header__title",
    "h1[class*='title']",
    ".product-title",
    "h1",
];

/// Resolves the display title of a product
pub trait TitleResolver: Send + Sync {
    fn resolve_title(&self, product_id: &str) -> impl Future<Output = String> + Send;
}

/// Always returns the same title
#[derive(Debug, Clone)]
pub struct FixedTitle(pub String);

impl TitleResolver for FixedTitle {
    async fn resolve_title(&self, _product_id: &str) -> String {
        self.0.clone()
    }
}

/// Fetches the product page and reads its heading
#[derive(Debug, Clone)]
pub struct ProductPageTitleResolver {
    client: Client,
    base: String,
    headers: HeaderProfile,
    fallback: String,
}

impl ProductPageTitleResolver {
    pub fn new(
        client: Client,
        base: impl Into<String>,
        headers: HeaderProfile,
        fallback: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base: base.into(),
            headers,
            fallback: fallback.into(),
        }
    }
}

impl TitleResolver for ProductPageTitleResolver {
    async fn resolve_title(&self, product_id: &str) -> String {
        let url = crate::url::product_page_url(&self.base, product_id);

        let response = match self
            .client
            .get(&url)
            .headers(self.headers.build(None))
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!("Title lookup for {} failed: {}", product_id, e);
                return self.fallback.clone();
            }
        };

        if !response.status().is_success() {
            tracing::warn!(
                "Title lookup for {} returned HTTP {}",
                product_id,
                response.status().as_u16()
            );
            return self.fallback.clone();
        }

        match response.text().await {
            Ok(body) => extract_product_title(&body).unwrap_or_else(|| {
                tracing::warn!("No title found on product page {}", url);
                self.fallback.clone()
            }),
            Err(e) => {
                tracing::warn!("Title lookup for {} failed reading body: {}", product_id, e);
                self.fallback.clone()
            }
        }
    }
}

/// Reads the product title from a product page
pub fn extract_product_title(html: &str) -> Option<String> {
    let document = Html::parse_document(html);

    let heading = TITLE_SELECTORS.iter().find_map(|css| {
        let selector = Selector::parse(css).ok()?;
        document
            .select(&selector)
            .map(|element| collapse_whitespace(&element.text().collect::<String>()))
            .find(|text| !text.is_empty())
    });

    heading.or_else(|| {
        let selector = Selector::parse("title").ok()?;
        document
            .select(&selector)
            .next()
            .map(|element| collapse_whitespace(&element.text().collect::<String>()))
            .filter(|text| !text.is_empty())
    })
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefers_product_heading() {
        let html = r#"<html><head><title>Coupang!</title></head><body>
            <h1>Site banner</h1>
            <h1 class="prod-buy-header__title">  Cold   Brew
              Coffee </h1>
        </body></html>"#;
        assert_eq!(
            extract_product_title(html),
            Some("Cold Brew Coffee".to_string())
        );
    }

    #[test]
    fn test_falls_back_to_document_title() {
        let html = "<html><head><title> Green Tea 500ml </title></head><body><h1></h1></body></html>";
        assert_eq!(extract_product_title(html), Some("Green Tea 500ml".to_string()));
    }

    #[test]
    fn test_no_title_at_all() {
        assert_eq!(extract_product_title("<html><body><p>x</p></body></html>"), None);
    }

    #[tokio::test]
    async fn test_fixed_title() {
        let resolver = FixedTitle("Widget".to_string());
        assert_eq!(resolver.resolve_title("1").await, "Widget");
    }

    #[tokio::test]
    async fn test_unreachable_product_page_uses_fallback() {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(2))
            .build()
            .unwrap();
        let resolver = ProductPageTitleResolver::new(
            client,
            "http://127.0.0.1:9/vp/products/",
            HeaderProfile::default(),
            "Unknown product",
        );
        assert_eq!(resolver.resolve_title("42").await, "Unknown product");
    }
}
