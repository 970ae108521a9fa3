//! Per-datagram processing: decode → calibrate → smooth → integrate.
//!
//! [`Pipeline`] owns all per-sample state and knows nothing about sockets or
//! threads. The caller supplies the arrival time, which keeps it
//! deterministic under test.
//!
//! # Phases
//!
//! ```text
//! WarmingUp ──(first sample with elapsed >= warmup)──> Steady
//! ```
//!
//! `Steady` is terminal.

use std::time::Duration;

use chrono::{DateTime, Local};
use serde::Serialize;

use crate::calibration::{Calibration, CalibrationFilter};
use crate::config::MonitorConfig;
use crate::error::DecodeError;
use crate::frame::{self, RawReading};
use crate::integrator::{EnergyIntegrator, FirstIntervalPolicy};
use crate::series::TelemetryRecord;
use crate::window::SmoothingWindow;

/// Ingestion phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    WarmingUp,
    Steady,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::WarmingUp => write!(f, "warming_up"),
            Self::Steady => write!(f, "steady"),
        }
    }
}

/// What happened to one reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Outcome {
    /// A new record was produced.
    Accepted(TelemetryRecord),
    /// Dropped because the sensor is still warming up.
    Suppressed,
}

/// Stateful sample processor.
#[derive(Debug, Clone)]
pub struct Pipeline {
    filter: CalibrationFilter,
    window: SmoothingWindow,
    integrator: EnergyIntegrator,
    policy: FirstIntervalPolicy,
    started_at: DateTime<Local>,
    phase: Phase,
    last_timestamp: Option<DateTime<Local>>,
}

impl Pipeline {
    pub fn new(
        filter: CalibrationFilter,
        window: SmoothingWindow,
        policy: FirstIntervalPolicy,
        started_at: DateTime<Local>,
    ) -> Self {
        Self {
            filter,
            window,
            integrator: EnergyIntegrator::new(started_at),
            policy,
            started_at,
            phase: Phase::WarmingUp,
            last_timestamp: None,
        }
    }

    /// Build a pipeline from the calibration, window and integration fields
    /// of `config`.
    pub fn from_config(config: &MonitorConfig, started_at: DateTime<Local>) -> Self {
        Self::new(
            config.calibration_filter(),
            SmoothingWindow::new(config.window_size),
            config.first_interval,
            started_at,
        )
    }

    /// Decode and process one datagram payload received at `now`.
    ///
    /// A decode failure leaves all state untouched.
    pub fn process(&mut self, payload: &[u8], now: DateTime<Local>) -> Result<Outcome, DecodeError> {
        let raw = frame::decode(payload)?;
        Ok(self.process_reading(raw, now))
    }

    /// Process an already-decoded reading received at `now`.
    pub fn process_reading(&mut self, raw: RawReading, now: DateTime<Local>) -> Outcome {
        let elapsed = match self.phase {
            // Once steady, a wall clock stepping backwards must not re-enter warm-up.
            Phase::Steady => self.filter.warmup(),
            Phase::WarmingUp => now
                .signed_duration_since(self.started_at)
                .to_std()
                .unwrap_or(Duration::ZERO),
        };

        let reading = match self.filter.calibrate(raw, elapsed) {
            Calibration::Suppressed => {
                log::debug!("{now} - sensor settling, skipping sample");
                return Outcome::Suppressed;
            }
            Calibration::Calibrated(reading) => reading,
        };

        let timestamp = match self.last_timestamp {
            Some(prev) if now < prev => {
                log::warn!("clock moved backwards ({now} < {prev}); holding timestamp");
                prev
            }
            _ => now,
        };

        if self.phase == Phase::WarmingUp {
            self.phase = Phase::Steady;
            log::info!(
                "warm-up completed after {:.1}s, starting data logging",
                elapsed.as_secs_f64()
            );
            if self.policy == FirstIntervalPolicy::FromTransition {
                self.integrator.restart_clock(timestamp);
            }
        }

        let smoothed = self.window.push(reading);
        let cumulative_energy = self.integrator.integrate(smoothed.power, timestamp);
        self.last_timestamp = Some(timestamp);

        Outcome::Accepted(TelemetryRecord {
            timestamp,
            current: smoothed.current,
            power: smoothed.power,
            cumulative_energy,
        })
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn started_at(&self) -> DateTime<Local> {
        self.started_at
    }

    /// Running energy total in kWh.
    pub fn total_energy(&self) -> f64 {
        self.integrator.total()
    }

    /// Readings currently held in the smoothing window.
    pub fn window_len(&self) -> usize {
        self.window.len()
    }
}
