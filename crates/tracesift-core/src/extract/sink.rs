use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use thiserror::Error;

use super::record::{CSV_HEADER, OutputRecord};

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("CSV write failed: {0}")]
    Csv(#[from] csv::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Writes output rows as CSV. The header row is emitted on construction, so a
/// capture with no accepted frames still yields a valid file.
pub struct CsvRecordSink<W: Write> {
    writer: csv::Writer<W>,
    rows: u64,
}

impl CsvRecordSink<BufWriter<File>> {
    pub fn create(path: &Path) -> Result<Self, SinkError> {
        let file = File::create(path)?;
        Self::from_writer(BufWriter::new(file))
    }
}

impl<W: Write> CsvRecordSink<W> {
    pub fn from_writer(inner: W) -> Result<Self, SinkError> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(inner);
        writer.write_record(CSV_HEADER)?;
        Ok(Self { writer, rows: 0 })
    }

    pub fn write(&mut self, record: &OutputRecord) -> Result<(), SinkError> {
        self.writer.serialize(record)?;
        self.rows += 1;
        Ok(())
    }

    pub fn rows(&self) -> u64 {
        self.rows
    }

    /// Flush and hand back the underlying writer.
    pub fn finish(self) -> Result<W, SinkError> {
        let mut inner = self
            .writer
            .into_inner()
            .map_err(|err| SinkError::Io(err.into_error()))?;
        inner.flush()?;
        Ok(inner)
    }
}
