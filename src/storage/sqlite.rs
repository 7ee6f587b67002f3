//! SQLite record sink and crawl-run bookkeeping

use crate::crawler::CrawlReport;
use crate::extract::ReviewRecord;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{RecordSink, SinkResult};
use chrono::Utc;
use rusqlite::{params, Connection};
use std::path::Path;

const INSERT_REVIEW: &str = "INSERT OR IGNORE INTO reviews (
        product_id, fingerprint, title, purchased_variant, review_date, reviewer, rating,
        headline, body, survey_answer, helpful_votes, seller, image_count, collected_at
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)";

/// Opens (creating if needed) the review database
///
/// The parent directory is created when missing.
pub fn open_database(path: &Path) -> SinkResult<Connection> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let conn = Connection::open(path)?;

    // Configure SQLite for better performance
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA temp_store = MEMORY;
        PRAGMA busy_timeout = 5000;
    ",
    )?;

    initialize_schema(&conn)?;
    Ok(conn)
}

/// Writes reviews for one product
///
/// Inserts run inside a transaction that is committed every `flush_every`
/// records, on `flush` and on drop. Reviews already stored for the product
/// are skipped.
pub struct SqliteSink {
    conn: Connection,
    product_id: String,
    flush_every: u32,
    pending: u32,
    inserted: u64,
    duplicates: u64,
}

impl SqliteSink {
    pub fn open(path: &Path, product_id: &str, flush_every: u32) -> SinkResult<Self> {
        Ok(Self::with_connection(open_database(path)?, product_id, flush_every))
    }

    pub fn with_connection(conn: Connection, product_id: &str, flush_every: u32) -> Self {
        Self {
            conn,
            product_id: product_id.to_string(),
            flush_every: flush_every.max(1),
            pending: 0,
            inserted: 0,
            duplicates: 0,
        }
    }

    /// Reviews newly written by this sink
    pub fn inserted(&self) -> u64 {
        self.inserted
    }

    /// Reviews skipped because they were already stored
    pub fn duplicates(&self) -> u64 {
        self.duplicates
    }

    fn commit(&mut self) -> SinkResult<()> {
        if !self.conn.is_autocommit() {
            self.conn.execute_batch("COMMIT")?;
        }
        self.pending = 0;
        Ok(())
    }
}

impl RecordSink for SqliteSink {
    fn append(&mut self, record: &ReviewRecord) -> SinkResult<()> {
        if self.conn.is_autocommit() {
            self.conn.execute_batch("BEGIN")?;
        }

        let changed = self.conn.prepare_cached(INSERT_REVIEW)?.execute(params![
            self.product_id,
            record.fingerprint(),
            record.title,
            record.purchased_variant,
            record.review_date,
            record.reviewer,
            record.rating,
            record.headline,
            record.body,
            record.survey_answer,
            record.helpful_votes,
            record.seller,
            record.image_count,
            Utc::now().to_rfc3339(),
        ])?;

        if changed == 0 {
            self.duplicates += 1;
            tracing::debug!("Review by {} already stored, skipping", record.reviewer);
        } else {
            self.inserted += 1;
        }

        self.pending += 1;
        if self.pending >= self.flush_every {
            self.commit()?;
        }
        Ok(())
    }

    fn flush(&mut self) -> SinkResult<()> {
        self.commit()
    }
}

impl Drop for SqliteSink {
    fn drop(&mut self) {
        if let Err(e) = self.commit() {
            tracing::warn!("Failed to commit pending reviews: {}", e);
        }
    }
}

/// A crawl run row in `crawl_runs`
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub product_id: String,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub termination_reason: Option<String>,
    pub pages_attempted: u32,
    pub pages_succeeded: u32,
    pub records_persisted: u64,
}

/// Records the start and end of one crawl in `crawl_runs`
///
/// A run whose row never gets a `finished_at` was interrupted.
pub struct RunLog {
    conn: Connection,
    run_id: i64,
}

impl RunLog {
    pub fn start(path: &Path, product_id: &str, config_hash: &str) -> SinkResult<Self> {
        Self::start_with_connection(open_database(path)?, product_id, config_hash)
    }

    pub fn start_with_connection(
        conn: Connection,
        product_id: &str,
        config_hash: &str,
    ) -> SinkResult<Self> {
        conn.execute(
            "INSERT INTO crawl_runs (product_id, started_at, config_hash) VALUES (?1, ?2, ?3)",
            params![product_id, Utc::now().to_rfc3339(), config_hash],
        )?;
        let run_id = conn.last_insert_rowid();
        tracing::debug!("Recorded crawl run {} for product {}", run_id, product_id);
        Ok(Self { conn, run_id })
    }

    pub fn run_id(&self) -> i64 {
        self.run_id
    }

    pub fn finish(&self, report: &CrawlReport) -> SinkResult<()> {
        self.conn.execute(
            "UPDATE crawl_runs
             SET finished_at = ?1, termination_reason = ?2, pages_attempted = ?3,
                 pages_succeeded = ?4, records_persisted = ?5
             WHERE id = ?6",
            params![
                Utc::now().to_rfc3339(),
                report.reason.to_db_string(),
                report.pages_attempted,
                report.pages_succeeded,
                report.records_persisted as i64,
                self.run_id,
            ],
        )?;
        Ok(())
    }
}

/// Most recent runs, newest first
pub fn recent_runs(conn: &Connection, limit: usize) -> SinkResult<Vec<RunRecord>> {
    let mut stmt = conn.prepare(
        "SELECT id, product_id, started_at, finished_at, config_hash, termination_reason,
                pages_attempted, pages_succeeded, records_persisted
         FROM crawl_runs ORDER BY id DESC LIMIT ?1",
    )?;

    let runs = stmt
        .query_map(params![limit as i64], |row| {
            Ok(RunRecord {
                id: row.get(0)?,
                product_id: row.get(1)?,
                started_at: row.get(2)?,
                finished_at: row.get(3)?,
                config_hash: row.get(4)?,
                termination_reason: row.get(5)?,
                pages_attempted: row.get(6)?,
                pages_succeeded: row.get(7)?,
                records_persisted: row.get::<_, i64>(8)?.max(0) as u64,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(runs)
}

/// Per-product review totals
#[derive(Debug, Clone, PartialEq)]
pub struct ProductTotals {
    pub product_id: String,
    pub title: String,
    pub reviews: u64,
    pub average_rating: f64,
}

/// Review count and average rating per product, largest first
pub fn product_totals(conn: &Connection) -> SinkResult<Vec<ProductTotals>> {
    let mut stmt = conn.prepare(
        "SELECT product_id, MAX(title), COUNT(*), AVG(rating)
         FROM reviews GROUP BY product_id ORDER BY COUNT(*) DESC",
    )?;

    let totals = stmt
        .query_map([], |row| {
            Ok(ProductTotals {
                product_id: row.get(0)?,
                title: row.get(1)?,
                reviews: row.get::<_, i64>(2)?.max(0) as u64,
                average_rating: row.get::<_, Option<f64>>(3)?.unwrap_or(0.0),
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(totals)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(reviewer: &str, rating: i32) -> ReviewRecord {
        ReviewRecord {
            title: "Widget".to_string(),
            purchased_variant: "Blue".to_string(),
            review_date: "2024.01.02".to_string(),
            reviewer: reviewer.to_string(),
            rating,
            headline: "-".to_string(),
            body: "Works".to_string(),
            survey_answer: "-".to_string(),
            helpful_votes: "0".to_string(),
            seller: "-".to_string(),
            image_count: 0,
        }
    }

    fn count(conn: &Connection) -> i64 {
        conn.query_row("SELECT COUNT(*) FROM reviews", [], |row| row.get(0))
            .unwrap()
    }

    #[test]
    fn test_sink_commits_every_n_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reviews.db");
        let mut sink = SqliteSink::open(&path, "42", 2).unwrap();

        sink.append(&record("a", 5)).unwrap();
        sink.append(&record("b", 4)).unwrap();
        sink.append(&record("c", 3)).unwrap();

        // The first two are committed and visible to another connection
        let reader = Connection::open(&path).unwrap();
        assert_eq!(count(&reader), 2);

        sink.flush().unwrap();
        assert_eq!(count(&reader), 3);
        assert_eq!(sink.inserted(), 3);
    }

    #[test]
    fn test_duplicates_are_ignored() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();
        let mut sink = SqliteSink::with_connection(conn, "42", 10);

        sink.append(&record("a", 5)).unwrap();
        sink.append(&record("a", 5)).unwrap();
        sink.flush().unwrap();

        assert_eq!(sink.inserted(), 1);
        assert_eq!(sink.duplicates(), 1);
        assert_eq!(count(&sink.conn), 1);
    }

    #[test]
    fn test_drop_commits_pending() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("reviews.db");
        {
            let mut sink = SqliteSink::open(&path, "42", 100).unwrap();
            sink.append(&record("a", 5)).unwrap();
        }
        let conn = open_database(&path).unwrap();
        assert_eq!(count(&conn), 1);

        let totals = product_totals(&conn).unwrap();
        assert_eq!(totals.len(), 1);
        assert_eq!(totals[0].product_id, "42");
        assert_eq!(totals[0].title, "Widget");
        assert_eq!(totals[0].reviews, 1);
        assert!((totals[0].average_rating - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_run_log_start_and_recent_runs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reviews.db");

        let first = RunLog::start(&path, "1", "hash-a").unwrap();
        let second = RunLog::start(&path, "2", "hash-b").unwrap();
        assert!(second.run_id() > first.run_id());

        let conn = open_database(&path).unwrap();
        let runs = recent_runs(&conn, 10).unwrap();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].product_id, "2");
        assert_eq!(runs[0].config_hash, "hash-b");
        assert!(runs[0].finished_at.is_none());
        assert!(runs[0].termination_reason.is_none());
    }
}
