use crate::extract::ReviewRecord;
use crate::storage::traits::{RecordSink, SinkResult};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

/// Appends reviews to `<directory>/<title>.csv`
///
/// The header row is written only when the file is new, so repeated crawls
/// of the same product extend one spreadsheet.
pub struct CsvSink {
    writer: csv::Writer<File>,
    path: PathBuf,
    flush_every: u32,
    pending: u32,
}

impl CsvSink {
    pub fn create(directory: &Path, title: &str, flush_every: u32) -> SinkResult<Self> {
        std::fs::create_dir_all(directory)?;
        let path = directory.join(format!("{}.csv", sanitize_file_name(title)));

        let is_new = std::fs::metadata(&path)
            .map(|meta| meta.len() == 0)
            .unwrap_or(true);
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let writer = csv::WriterBuilder::new()
            .has_headers(is_new)
            .from_writer(file);

        tracing::info!("Writing reviews to {}", path.display());

        Ok(Self {
            writer,
            path,
            flush_every: flush_every.max(1),
            pending: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RecordSink for CsvSink {
    fn append(&mut self, record: &ReviewRecord) -> SinkResult<()> {
        self.writer.serialize(record)?;
        self.pending += 1;
        if self.pending >= self.flush_every {
            self.flush()?;
        }
        Ok(())
    }

    fn flush(&mut self) -> SinkResult<()> {
        self.writer.flush()?;
        self.pending = 0;
        Ok(())
    }
}

impl Drop for CsvSink {
    fn drop(&mut self) {
        if let Err(e) = self.writer.flush() {
            tracing::warn!("Failed to flush {}: {}", self.path.display(), e);
        }
    }
}

/// File-system safe name for a product title
pub fn sanitize_file_name(title: &str) -> String {
    let cleaned: String = title
        .trim()
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    if cleaned.is_empty() {
        "reviews".to_string()
    } else {
        cleaned
    }
}
