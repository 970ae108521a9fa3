//! Sensor calibration: warm-up suppression, dead-zone and offset removal.
//!
//! The current transformer reads a small non-zero value with no load attached
//! and is unreliable for the first minute after power-up. The filter discards
//! readings during warm-up, forces near-zero current (and its power) to
//! exactly zero, then subtracts a fixed offset from both fields, clamping at
//! zero.
//!
//! The same offset is applied to current and power even though the units
//! differ. That matches how the deployed sensors were calibrated and is kept
//! as-is.

use std::time::Duration;

use crate::frame::RawReading;

/// Default warm-up interval during which readings are dropped.
pub const DEFAULT_WARMUP: Duration = Duration::from_secs(60);
/// Default dead-zone threshold in amps.
pub const DEFAULT_DEAD_ZONE_AMPS: f64 = 0.2;
/// Default offset subtracted from both current and power.
pub const DEFAULT_OFFSET: f64 = 0.350;

/// A reading after calibration. Both fields are always `>= 0`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CalibratedReading {
    pub current: f64,
    pub power: f64,
}

/// Result of running a raw reading through the filter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Calibration {
    /// Reading is usable downstream.
    Calibrated(CalibratedReading),
    /// Sensor is still warming up; the reading must not reach the window or
    /// the integrator.
    Suppressed,
}

/// Stateless calibration filter.
#[derive(Debug, Clone)]
pub struct CalibrationFilter {
    warmup: Duration,
    dead_zone: f64,
    offset: f64,
}

impl Default for CalibrationFilter {
    fn default() -> Self {
        Self::new(DEFAULT_WARMUP, DEFAULT_DEAD_ZONE_AMPS, DEFAULT_OFFSET)
    }
}

impl CalibrationFilter {
    pub fn new(warmup: Duration, dead_zone: f64, offset: f64) -> Self {
        Self {
            warmup,
            dead_zone,
            offset,
        }
    }

    pub fn warmup(&self) -> Duration {
        self.warmup
    }

    /// Calibrate `raw`, given how long the pipeline has been running.
    pub fn calibrate(&self, raw: RawReading, elapsed_since_start: Duration) -> Calibration {
        if elapsed_since_start < self.warmup {
            return Calibration::Suppressed;
        }

        let (current, power) = if raw.current.abs() < self.dead_zone {
            (0.0, 0.0)
        } else {
            (raw.current, raw.power)
        };

        Calibration::Calibrated(CalibratedReading {
            current: (current - self.offset).max(0.0),
            power: (power - self.offset).max(0.0),
        })
    }
}
