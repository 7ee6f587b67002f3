//! Storage module for persisting extracted reviews
//!
//! This module handles everything written to disk by a crawl:
//! - `CsvSink`: one spreadsheet per product title
//! - `SqliteSink`: review database with per-product deduplication
//! - `RunLog`: crawl run bookkeeping in the same database
//! - `MemorySink`: in-process collection for library users and tests

mod csv_sink;
mod memory;
mod schema;
mod sqlite;
mod traits;

pub use csv_sink::{sanitize_file_name, CsvSink};
pub use memory::MemorySink;
pub use schema::initialize_schema;
pub use sqlite::{
    open_database, product_totals, recent_runs, ProductTotals, RunLog, RunRecord, SqliteSink,
};
pub use traits::{RecordSink, SinkError, SinkResult};
