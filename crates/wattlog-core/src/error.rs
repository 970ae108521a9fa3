//! Error taxonomy for the ingestion pipeline.
//!
//! Per-datagram failures ([`DecodeError`], [`SinkError`]) are recovered
//! locally by the ingestion loop. [`IngestError`] ends the loop and
//! [`ConfigError`] stops the process before it starts.

use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

/// A datagram payload that could not be turned into a reading.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    #[error("payload is not valid UTF-8")]
    InvalidUtf8,
    #[error("expected exactly 2 comma-separated fields, found {0}")]
    FieldCount(usize),
    #[error("{field} field {value:?} is not a finite number")]
    InvalidNumber { field: &'static str, value: String },
}

/// Failure writing to the durable record sink.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("cannot open sink {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot render timestamp with format '{0}'")]
    TimestampFormat(String),
    #[error("sink write failed: {0}")]
    Write(#[from] std::io::Error),
}

/// Process-fatal ingestion failure.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("cannot bind UDP socket on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("UDP receive failed on {addr}: {source}")]
    Receive {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Sink(#[from] SinkError),
}

/// Invalid or unreadable configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}
