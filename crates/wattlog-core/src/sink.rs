//! Durable record sinks.
//!
//! Every accepted record is mirrored to a [`RecordSink`]. The stock sink is
//! [`CsvSink`], which writes:
//!
//! ```text
//! timestamp,current,power,energy_kwh
//! 2025-06-01 12:01:05,0.65,99.65,0
//! ```
//!
//! The file is truncated and the header written when the sink is created.
//! Each row is flushed as soon as it is written so a crash loses at most the
//! record being written.

use std::fmt::Write as _;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::config::validate_timestamp_format;
use crate::error::SinkError;
use crate::series::TelemetryRecord;

/// CSV header row.
pub const CSV_HEADER: &str = "timestamp,current,power,energy_kwh";
/// Default CSV path, relative to the working directory.
pub const DEFAULT_SINK_PATH: &str = "current_log.csv";
/// Default strftime format for the timestamp column.
pub const DEFAULT_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Append-only destination for accepted records.
pub trait RecordSink: Send {
    /// Append one record.
    fn append(&mut self, record: &TelemetryRecord) -> Result<(), SinkError>;

    /// Flush buffered output. Called once when ingestion stops.
    fn flush(&mut self) -> Result<(), SinkError> {
        Ok(())
    }
}

/// CSV file sink.
pub struct CsvSink {
    path: PathBuf,
    writer: BufWriter<File>,
    timestamp_format: String,
    rows: u64,
}

impl CsvSink {
    /// Create (or truncate) `path` and write the header row.
    ///
    /// An unusable `timestamp_format` is rejected before the file is touched.
    pub fn create(path: impl AsRef<Path>, timestamp_format: &str) -> Result<Self, SinkError> {
        if validate_timestamp_format(timestamp_format).is_err() {
            return Err(SinkError::TimestampFormat(timestamp_format.to_string()));
        }
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path).map_err(|source| SinkError::Open {
            path: path.clone(),
            source,
        })?;
        let mut writer = BufWriter::new(file);
        writeln!(writer, "{CSV_HEADER}")?;
        writer.flush()?;

        Ok(Self {
            path,
            writer,
            timestamp_format: timestamp_format.to_string(),
            rows: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rows written so far, excluding the header.
    pub fn rows(&self) -> u64 {
        self.rows
    }
}

impl RecordSink for CsvSink {
    fn append(&mut self, record: &TelemetryRecord) -> Result<(), SinkError> {
        // Render first: a chrono format error inside `writeln!` on an
        // io::Write panics instead of returning.
        let mut timestamp = String::new();
        write!(timestamp, "{}", record.timestamp.format(&self.timestamp_format))
            .map_err(|_| SinkError::TimestampFormat(self.timestamp_format.clone()))?;
        writeln!(
            self.writer,
            "{},{},{},{}",
            timestamp,
            record.current,
            record.power,
            record.cumulative_energy
        )?;
        self.writer.flush()?;
        self.rows += 1;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        self.writer.flush()?;
        Ok(())
    }
}

impl<S: RecordSink + ?Sized> RecordSink for Box<S> {
    fn append(&mut self, record: &TelemetryRecord) -> Result<(), SinkError> {
        (**self).append(record)
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        (**self).flush()
    }
}
