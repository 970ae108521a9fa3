//! Trailing moving-average window over calibrated readings.

use std::collections::VecDeque;

use crate::calibration::CalibratedReading;

/// Default number of readings averaged.
pub const DEFAULT_WINDOW_SIZE: usize = 5;

/// Largest window a configuration may ask for.
pub const MAX_WINDOW_SIZE: usize = 86_400;

/// Upper bound on the eager allocation made by [`SmoothingWindow::new`].
const PREALLOC_LIMIT: usize = 64;

/// Mean of the readings currently held in a [`SmoothingWindow`].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SmoothedReading {
    pub current: f64,
    pub power: f64,
}

/// Fixed-size FIFO of calibrated readings.
///
/// Until `size` readings have been pushed the mean covers only what is held.
#[derive(Debug, Clone)]
pub struct SmoothingWindow {
    size: usize,
    readings: VecDeque<CalibratedReading>,
}

impl Default for SmoothingWindow {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_SIZE)
    }
}

impl SmoothingWindow {
    /// Create a window holding at most `size` readings. A size of zero is
    /// treated as one.
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            size,
            readings: VecDeque::with_capacity(size.min(PREALLOC_LIMIT) + 1),
        }
    }

    /// Push a reading, evicting the oldest on overflow, and return the new
    /// per-field mean.
    pub fn push(&mut self, reading: CalibratedReading) -> SmoothedReading {
        self.readings.push_back(reading);
        if self.readings.len() > self.size {
            self.readings.pop_front();
        }
        self.mean()
    }

    fn mean(&self) -> SmoothedReading {
        let n = self.readings.len() as f64;
        let (current, power) = self
            .readings
            .iter()
            .fold((0.0, 0.0), |(c, p), r| (c + r.current, p + r.power));
        SmoothedReading {
            current: current / n,
            power: power / n,
        }
    }

    /// Number of readings currently held.
    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    /// Configured maximum number of readings.
    pub fn capacity(&self) -> usize {
        self.size
    }
}
