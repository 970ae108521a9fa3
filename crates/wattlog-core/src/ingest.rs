//! UDP ingestion loop.
//!
//! One dedicated thread owns the socket (any [`DatagramSource`]), feeds each
//! datagram through the [`Pipeline`], appends accepted records to the shared
//! [`TelemetrySeries`] and mirrors them to a [`RecordSink`]. Per-datagram failures are logged and
//! counted; only socket failures end the loop.
//!
//! The socket is read with a short timeout so a [`ShutdownHandle`] is
//! observed promptly even when no sensor is sending.

use std::io::{self, ErrorKind};
use std::net::{SocketAddr, UdpSocket};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use chrono::Local;
use serde::Serialize;

use crate::config::MonitorConfig;
use crate::error::IngestError;
use crate::pipeline::{Outcome, Phase, Pipeline};
use crate::series::TelemetrySeries;
use crate::sink::{CsvSink, RecordSink};

/// Largest datagram read; longer payloads are truncated by the OS.
pub const MAX_DATAGRAM_BYTES: usize = 1024;

const RECV_POLL_INTERVAL: Duration = Duration::from_millis(200);

// ---------------------------------------------------------------------------
// Shutdown
// ---------------------------------------------------------------------------

/// Cloneable cancellation flag shared between the ingestion thread and
/// whoever wants to stop it.
#[derive(Debug, Clone, Default)]
pub struct ShutdownHandle {
    flag: Arc<AtomicBool>,
}

impl ShutdownHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request shutdown. The loop exits at its next receive boundary.
    pub fn shutdown(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_shutdown(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

// ---------------------------------------------------------------------------
// Counters
// ---------------------------------------------------------------------------

/// Lock-free ingestion counters, readable from any thread.
#[derive(Debug, Default)]
pub struct IngestStats {
    received: AtomicU64,
    accepted: AtomicU64,
    malformed: AtomicU64,
    suppressed: AtomicU64,
    sink_failures: AtomicU64,
    steady: AtomicBool,
}

/// Point-in-time copy of [`IngestStats`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub phase: Phase,
    pub received: u64,
    pub accepted: u64,
    pub malformed: u64,
    pub suppressed: u64,
    pub sink_failures: u64,
}

impl IngestStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(&self) -> IngestReport {
        IngestReport {
            phase: if self.steady.load(Ordering::Relaxed) {
                Phase::Steady
            } else {
                Phase::WarmingUp
            },
            received: self.received.load(Ordering::Relaxed),
            accepted: self.accepted.load(Ordering::Relaxed),
            malformed: self.malformed.load(Ordering::Relaxed),
            suppressed: self.suppressed.load(Ordering::Relaxed),
            sink_failures: self.sink_failures.load(Ordering::Relaxed),
        }
    }

    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

// ---------------------------------------------------------------------------
// Datagram source
// ---------------------------------------------------------------------------

/// Where the ingestion loop reads datagrams from.
///
/// Implementations should return `WouldBlock` or `TimedOut` when nothing
/// arrives within a short interval so shutdown stays responsive. Any other
/// error ends ingestion.
pub trait DatagramSource: Send {
    fn recv_from(&mut self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)>;
}

impl DatagramSource for UdpSocket {
    fn recv_from(&mut self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        UdpSocket::recv_from(self, buf)
    }
}

// ---------------------------------------------------------------------------
// Ingestor
// ---------------------------------------------------------------------------

/// Owns the datagram source and drives the pipeline.
pub struct Ingestor<S: RecordSink> {
    source: Box<dyn DatagramSource>,
    local_addr: SocketAddr,
    pipeline: Pipeline,
    series: Arc<TelemetrySeries>,
    sink: S,
    stats: Arc<IngestStats>,
    shutdown: ShutdownHandle,
}

impl<S: RecordSink + 'static> Ingestor<S> {
    /// Bind the UDP socket named in `config` and set up a pipeline starting now.
    pub fn bind(
        config: &MonitorConfig,
        series: Arc<TelemetrySeries>,
        sink: S,
    ) -> Result<Self, IngestError> {
        let socket = UdpSocket::bind(&config.udp_bind).map_err(|source| IngestError::Bind {
            addr: config.udp_bind.clone(),
            source,
        })?;
        let pipeline = Pipeline::from_config(config, Local::now());
        Self::from_socket(socket, pipeline, series, sink)
    }

    /// Wrap an already-bound socket.
    pub fn from_socket(
        socket: UdpSocket,
        pipeline: Pipeline,
        series: Arc<TelemetrySeries>,
        sink: S,
    ) -> Result<Self, IngestError> {
        let bind_err = |source| IngestError::Bind {
            addr: "<bound socket>".to_string(),
            source,
        };
        let local_addr = socket.local_addr().map_err(bind_err)?;
        socket
            .set_read_timeout(Some(RECV_POLL_INTERVAL))
            .map_err(bind_err)?;

        Ok(Self::from_source(socket, local_addr, pipeline, series, sink))
    }

    /// Drive the pipeline from any [`DatagramSource`]. `local_addr` is only
    /// used for logging and error reports.
    pub fn from_source(
        source: impl DatagramSource + 'static,
        local_addr: SocketAddr,
        pipeline: Pipeline,
        series: Arc<TelemetrySeries>,
        sink: S,
    ) -> Self {
        Self {
            source: Box::new(source),
            local_addr,
            pipeline,
            series,
            sink,
            stats: Arc::new(IngestStats::new()),
            shutdown: ShutdownHandle::new(),
        }
    }

    /// Address the socket is actually bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn stats(&self) -> Arc<IngestStats> {
        Arc::clone(&self.stats)
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Replace the shutdown flag, e.g. with one shared with an HTTP server.
    pub fn with_shutdown(mut self, shutdown: ShutdownHandle) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Run the loop on a dedicated thread.
    pub fn spawn(self) -> std::io::Result<JoinHandle<Result<(), IngestError>>> {
        std::thread::Builder::new()
            .name("wattlog-ingest".to_string())
            .spawn(move || self.run())
    }

    /// Run the loop on the current thread until shutdown or a socket failure.
    pub fn run(mut self) -> Result<(), IngestError> {
        log::info!("listening for sensor datagrams on udp://{}", self.local_addr);
        let mut buf = [0u8; MAX_DATAGRAM_BYTES];

        let result = loop {
            if self.shutdown.is_shutdown() {
                break Ok(());
            }

            let (len, peer) = match self.source.recv_from(&mut buf) {
                Ok(received) => received,
                Err(e)
                    if matches!(
                        e.kind(),
                        ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted
                    ) =>
                {
                    continue;
                }
                Err(source) => {
                    log::error!("UDP receive failed on {}: {source}", self.local_addr);
                    break Err(IngestError::Receive {
                        addr: self.local_addr,
                        source,
                    });
                }
            };

            self.handle_datagram(&buf[..len], peer);
        };

        if result.is_err() {
            // Socket failures are process-fatal; stop everything sharing the flag.
            self.shutdown.shutdown();
        }
        if let Err(e) = self.sink.flush() {
            log::warn!("final sink flush failed: {e}");
        }
        log::info!("ingestion stopped: {:?}", self.stats.report());
        result
    }

    fn handle_datagram(&mut self, payload: &[u8], peer: SocketAddr) {
        IngestStats::bump(&self.stats.received);

        let record = match self.pipeline.process(payload, Local::now()) {
            Ok(Outcome::Accepted(record)) => record,
            Ok(Outcome::Suppressed) => {
                IngestStats::bump(&self.stats.suppressed);
                return;
            }
            Err(e) => {
                IngestStats::bump(&self.stats.malformed);
                log::warn!(
                    "dropping datagram from {peer}: {e} (payload {:?})",
                    String::from_utf8_lossy(payload)
                );
                return;
            }
        };

        if self.pipeline.phase() == Phase::Steady {
            self.stats.steady.store(true, Ordering::Relaxed);
        }

        log::info!(
            "{} - {:.3} A, {:.2} W, {:.6} kWh",
            record.timestamp.format("%Y-%m-%d %H:%M:%S%.3f"),
            record.current,
            record.power,
            record.cumulative_energy
        );

        self.series.append(record);
        IngestStats::bump(&self.stats.accepted);

        if let Err(e) = self.sink.append(&record) {
            IngestStats::bump(&self.stats.sink_failures);
            log::error!("durable sink write failed, record kept in memory only: {e}");
        }
    }
}

impl Ingestor<CsvSink> {
    /// Bind the UDP socket, then create the CSV sink named in `config`.
    ///
    /// The sink file is only truncated once the socket is bound, so a bind
    /// failure leaves the previous log intact.
    pub fn bind_csv(
        config: &MonitorConfig,
        series: Arc<TelemetrySeries>,
    ) -> Result<Self, IngestError> {
        let socket = UdpSocket::bind(&config.udp_bind).map_err(|source| IngestError::Bind {
            addr: config.udp_bind.clone(),
            source,
        })?;
        let sink = CsvSink::create(&config.sink_path, &config.timestamp_format)?;
        let pipeline = Pipeline::from_config(config, Local::now());
        Self::from_socket(socket, pipeline, series, sink)
    }
}
