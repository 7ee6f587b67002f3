use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// One review card, as persisted by every sink
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewRecord {
    /// Product display title
    pub title: String,

    /// Option/variant the reviewer bought
    pub purchased_variant: String,

    pub review_date: String,

    pub reviewer: String,

    /// Star rating, 0 when it could not be read
    pub rating: i32,

    pub headline: String,

    /// Review text with control characters removed
    pub body: String,

    pub survey_answer: String,

    /// Helpful votes as shown on the page
    pub helpful_votes: String,

    pub seller: String,

    pub image_count: u32,
}

impl ReviewRecord {
    /// Stable identity of a review: reviewer, date, variant and body
    ///
    /// The title is left out so records stay comparable across runs where
    /// title resolution fell back.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for part in [
            &self.reviewer,
            &self.review_date,
            &self.purchased_variant,
            &self.body,
        ] {
            hasher.update(part.as_bytes());
            hasher.update([0x1f]);
        }
        hex::encode(hasher.finalize())
    }

    /// Helpful votes as a number, ignoring thousands separators
    pub fn helpful_votes_count(&self) -> u64 {
        self.helpful_votes
            .chars()
            .filter(|c| c.is_ascii_digit())
            .collect::<String>()
            .parse()
            .unwrap_or(0)
    }
}
