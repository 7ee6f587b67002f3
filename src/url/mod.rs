//! Product URL handling
//!
//! Product pages live at `.../vp/products/<id>?itemId=...#...`. The review
//! endpoint only needs the numeric id; the full product page URL is rebuilt for
//! the referer header and for title lookup.

use crate::{ConfigError, ConfigResult};
use url::Url;

/// Extracts the product id from a product page URL
///
/// The id is the path segment following `products`. Query string and
/// fragment are ignored.
///
/// # Examples
///
/// ```
/// use review_harvester::url::product_code_from_url;
///
/// let id = product_code_from_url(
///     "https://www.coupang.com/vp/products/7335597976?itemId=18741704367#sdpReview",
/// )
/// .unwrap();
/// assert_eq!(id, "7335597976");
/// ```
pub fn product_code_from_url(input: &str) -> ConfigResult<String> {
    let trimmed = input.trim();
    let parsed = Url::parse(trimmed)
        .map_err(|e| ConfigError::InvalidUrl(format!("'{}': {}", trimmed, e)))?;

    let code = parsed
        .path_segments()
        .into_iter()
        .flatten()
        .skip_while(|segment| *segment != "products")
        .nth(1)
        .unwrap_or_default();

    if code.is_empty() || !code.chars().all(|c| c.is_ascii_digit()) {
        return Err(ConfigError::InvalidUrl(format!(
            "'{}' does not contain a numeric product id after 'products/'",
            trimmed
        )));
    }

    Ok(code.to_string())
}

/// Builds the product page URL for `product_id` under `base`
pub fn product_page_url(base: &str, product_id: &str) -> String {
    if base.ends_with('/') {
        format!("{}{}", base, product_id)
    } else {
        format!("{}/{}", base, product_id)
    }
}
