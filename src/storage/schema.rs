//! Database schema definitions
//!
//! Reviews are unique per product and fingerprint, so repeated crawls of the
//! same product only add reviews that were not seen before.

use rusqlite::Connection;

/// SQL schema for the review database
pub const SCHEMA_SQL: &str = r#"
-- One row per crawl of a product
CREATE TABLE IF NOT EXISTS crawl_runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    product_id TEXT NOT NULL,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    termination_reason TEXT,
    pages_attempted INTEGER NOT NULL DEFAULT 0,
    pages_succeeded INTEGER NOT NULL DEFAULT 0,
    records_persisted INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_crawl_runs_product ON crawl_runs(product_id);

-- Extracted reviews
CREATE TABLE IF NOT EXISTS reviews (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    product_id TEXT NOT NULL,
    fingerprint TEXT NOT NULL,
    title TEXT NOT NULL,
    purchased_variant TEXT NOT NULL,
    review_date TEXT NOT NULL,
    reviewer TEXT NOT NULL,
    rating INTEGER NOT NULL,
    headline TEXT NOT NULL,
    body TEXT NOT NULL,
    survey_answer TEXT NOT NULL,
    helpful_votes TEXT NOT NULL,
    seller TEXT NOT NULL,
    image_count INTEGER NOT NULL,
    collected_at TEXT NOT NULL,
    UNIQUE(product_id, fingerprint)
);

CREATE INDEX IF NOT EXISTS idx_reviews_product ON reviews(product_id);
"#;

/// Creates all tables and indexes if missing
pub fn initialize_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();
        initialize_schema(&conn).unwrap();

        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN ('reviews', 'crawl_runs')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 2);
    }
}
