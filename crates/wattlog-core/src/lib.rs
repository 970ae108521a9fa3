//! # wattlog-core
//!
//! Turns a stream of raw current/power datagrams from a mains sensor into a
//! smoothed, calibrated, energy-integrated telemetry series.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use wattlog_core::{CsvSink, Ingestor, MonitorConfig, TelemetrySeries};
//!
//! let config = MonitorConfig::default();
//! let series = Arc::new(TelemetrySeries::new());
//! let sink = CsvSink::create(&config.sink_path, &config.timestamp_format).unwrap();
//!
//! let ingestor = Ingestor::bind(&config, Arc::clone(&series), sink).unwrap();
//! let handle = ingestor.spawn().unwrap();
//!
//! // ... readers call `series.snapshot()` from any thread ...
//! # drop(handle);
//! ```
//!
//! ## Architecture
//!
//! ```text
//! UDP socket → decode → calibrate → smooth → integrate → TelemetrySeries
//!                                                      └→ RecordSink (CSV)
//! ```
//!
//! The [`Pipeline`] holds all per-sample state and is driven by the
//! [`Ingestor`] on a dedicated thread. Readers only ever see the
//! [`TelemetrySeries`], through copy-on-read snapshots.

pub mod calibration;
pub mod config;
pub mod error;
pub mod frame;
pub mod ingest;
pub mod integrator;
pub mod pipeline;
pub mod series;
pub mod sink;
pub mod window;

pub use calibration::{Calibration, CalibratedReading, CalibrationFilter};
pub use config::MonitorConfig;
pub use error::{ConfigError, DecodeError, IngestError, SinkError};
pub use frame::{RawReading, decode};
pub use ingest::{DatagramSource, IngestReport, IngestStats, Ingestor, ShutdownHandle};
pub use integrator::{EnergyIntegrator, FirstIntervalPolicy};
pub use pipeline::{Outcome, Phase, Pipeline};
pub use series::{TelemetryRecord, TelemetrySeries};
pub use sink::{CsvSink, RecordSink};
pub use window::{SmoothedReading, SmoothingWindow};

/// Library version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
