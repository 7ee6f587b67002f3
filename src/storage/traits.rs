//! Record sink trait and error types

use crate::extract::ReviewRecord;
use thiserror::Error;

/// Errors raised by a record sink
///
/// The crawl loop logs these and carries on; a record that failed to
/// persist is not retried.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for sink operations
pub type SinkResult<T> = Result<T, SinkError>;

/// Destination for extracted review records
///
/// Records arrive in page order. Implementations may buffer; `flush` makes
/// everything appended so far durable.
pub trait RecordSink: Send {
    fn append(&mut self, record: &ReviewRecord) -> SinkResult<()>;

    fn flush(&mut self) -> SinkResult<()>;
}

impl<S: RecordSink + ?Sized> RecordSink for Box<S> {
    fn append(&mut self, record: &ReviewRecord) -> SinkResult<()> {
        (**self).append(record)
    }

    fn flush(&mut self) -> SinkResult<()> {
        (**self).flush()
    }
}
