//! Review extraction
//!
//! Turns a listing page body into [`ReviewRecord`]s and resolves the product
//! title that is stamped onto every record.

mod cards;
mod record;
mod title;

pub use cards::{ReviewCardExtractor, MISSING, NO_BODY, NO_HEADLINE, NO_SURVEY_ANSWER};
pub use record::ReviewRecord;
pub use title::{extract_product_title, FixedTitle, ProductPageTitleResolver, TitleResolver};

#[cfg(test)]
pub(crate) use cards::review_page_html;

/// Parses review cards out of a listing page
///
/// Implementations never fail: a page without recognizable cards yields an
/// empty list, and a card missing fields gets placeholders.
pub trait ExtractionAdapter: Send + Sync {
    /// Records in page order
    fn extract(&self, html: &str) -> Vec<ReviewRecord>;

    /// Number of review cards on the page
    fn card_count(&self, html: &str) -> usize {
        self.extract(html).len()
    }
}
