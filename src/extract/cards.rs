//! Review card extraction for the review listing markup
//!
//! # Card layout
//!
//! | Field | Selector (inside `article.sdp-review__article__list`) |
//! |-------|------------------------------------------------------|
//! | date | `..__info__product-info__reg-date` |
//! | reviewer | `..__info__user__name` |
//! | rating | `..__info__product-info__star-orange[data-rating]` |
//! | variant | `..__info__product-info__name` |
//! | headline | `..__headline` |
//! | body | `..__review__content.js_reviewArticleContent`, else `..__review > div` |
//! | survey | `..__survey__row__answer` |
//! | helpful | `span.js_reviewArticleHelpfulCount` |
//! | seller | `..__info__product-info__seller_name` |
//! | images | `..__attachment__list img` |

use crate::extract::{ExtractionAdapter, ReviewRecord};
use scraper::{ElementRef, Html, Selector};

const CARD: &str = "article.sdp-review__article__list";
const REVIEW_DATE: &str = "div.sdp-review__article__list__info__product-info__reg-date";
const REVIEWER: &str = "span.sdp-review__article__list__info__user__name";
const RATING: &str = "div.sdp-review__article__list__info__product-info__star-orange";
const VARIANT: &str = "div.sdp-review__article__list__info__product-info__name";
const HEADLINE: &str = "div.sdp-review__article__list__headline";
const BODY: &str = "div.sdp-review__article__list__review__content.js_reviewArticleContent";
const BODY_FALLBACK: &str = "div.sdp-review__article__list__review > div";
const SURVEY_ANSWER: &str = "span.sdp-review__article__list__survey__row__answer";
const HELPFUL: &str = "span.js_reviewArticleHelpfulCount";
const SELLER: &str = "div.sdp-review__article__list__info__product-info__seller_name";
const IMAGES: &str = "div.sdp-review__article__list__attachment__list img";

/// Placeholder for any missing text field
pub const MISSING: &str = "-";
pub const NO_HEADLINE: &str = "등록된 헤드라인이 없습니다";
pub const NO_BODY: &str = "등록된 리뷰내용이 없습니다";
pub const NO_SURVEY_ANSWER: &str = "맛 평가 없음";

const SELLER_PREFIX: &str = "판매자:";

/// Extracts review cards from the listing markup
///
/// The title field is left empty; the controller stamps the product title.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReviewCardExtractor;

impl ReviewCardExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl ExtractionAdapter for ReviewCardExtractor {
    fn extract(&self, html: &str) -> Vec<ReviewRecord> {
        let document = Html::parse_document(html);
        let Ok(card_selector) = Selector::parse(CARD) else {
            return Vec::new();
        };

        document.select(&card_selector).map(parse_card).collect()
    }

    fn card_count(&self, html: &str) -> usize {
        let document = Html::parse_document(html);
        Selector::parse(CARD)
            .map(|selector| document.select(&selector).count())
            .unwrap_or(0)
    }
}

fn parse_card(card: ElementRef<'_>) -> ReviewRecord {
    let body = first_text(card, BODY)
        .or_else(|| first_text(card, BODY_FALLBACK))
        .map(|text| strip_control(&text))
        .filter(|text| !text.is_empty())
        .unwrap_or_else(|| NO_BODY.to_string());

    let seller = first_text(card, SELLER)
        .map(|text| text.trim_start_matches(SELLER_PREFIX).trim().to_string())
        .filter(|text| !text.is_empty())
        .unwrap_or_else(|| MISSING.to_string());

    ReviewRecord {
        title: String::new(),
        purchased_variant: text_or(card, VARIANT, MISSING),
        review_date: text_or(card, REVIEW_DATE, MISSING),
        reviewer: text_or(card, REVIEWER, MISSING),
        rating: rating(card),
        headline: text_or(card, HEADLINE, NO_HEADLINE),
        body,
        survey_answer: text_or(card, SURVEY_ANSWER, NO_SURVEY_ANSWER),
        helpful_votes: text_or(card, HELPFUL, "0"),
        seller,
        image_count: count(card, IMAGES),
    }
}

/// Trimmed text of the first match, if non-empty
fn first_text(card: ElementRef<'_>, css: &str) -> Option<String> {
    let selector = Selector::parse(css).ok()?;
    card.select(&selector)
        .next()
        .map(|element| element.text().collect::<String>().trim().to_string())
        .filter(|text| !text.is_empty())
}

fn text_or(card: ElementRef<'_>, css: &str, fallback: &str) -> String {
    first_text(card, css).unwrap_or_else(|| fallback.to_string())
}

fn rating(card: ElementRef<'_>) -> i32 {
    let Ok(selector) = Selector::parse(RATING) else {
        return 0;
    };
    card.select(&selector)
        .find_map(|element| element.value().attr("data-rating"))
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(0)
}

fn count(card: ElementRef<'_>, css: &str) -> u32 {
    Selector::parse(css)
        .map(|selector| card.select(&selector).count() as u32)
        .unwrap_or(0)
}

fn strip_control(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_control())
        .collect::<String>()
        .trim()
        .to_string()
}

/// Listing markup with `n` fully populated review cards
#[cfg(test)]
pub(crate) fn review_page_html(n: usize) -> String {
    let cards: String = (1..=n)
        .map(|i| {
            format!(
                r#"<article class="sdp-review__article__list js_reviewArticleReviewList">
  <div class="sdp-review__article__list__info">
    <span class="sdp-review__article__list__info__user__name js_reviewUserProfileImage">user{i}***</span>
    <div class="sdp-review__article__list__info__product-info">
      <div class="sdp-review__article__list__info__product-info__star-orange js_reviewArticleRatingValue" data-rating="{rating}"></div>
      <div class="sdp-review__article__list__info__product-info__reg-date">2024.05.{i:02}</div>
      <div class="sdp-review__article__list__info__product-info__seller_name">판매자: Seller {i}</div>
      <div class="sdp-review__article__list__info__product-info__name">Variant {i}</div>
    </div>
  </div>
  <div class="sdp-review__article__list__headline">Headline {i}</div>
  <div class="sdp-review__article__list__review js_reviewArticleContentContainer">
    <div class="sdp-review__article__list__review__content js_reviewArticleContent">Body {i}
line two</div>
  </div>
  <div class="sdp-review__article__list__survey">
    <span class="sdp-review__article__list__survey__row__answer">Answer {i}</span>
  </div>
  <div class="sdp-review__article__list__attachment__list"><img src="a.jpg"><img src="b.jpg"></div>
  <span class="js_reviewArticleHelpfulCount">{i}</span>
</article>"#,
                i = i,
                rating = (i % 5) + 1,
            )
        })
        .collect();
    format!(
        r#"<div class="sdp-review__article js_reviewArticleContainer">{}</div>"#,
        cards
    )
}
