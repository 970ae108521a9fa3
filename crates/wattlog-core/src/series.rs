//! Shared, append-only telemetry series.
//!
//! The ingestion thread is the only writer. Readers (the HTTP layer) take
//! copy-on-read snapshots under the same mutex, so a reader sees every record
//! fully built or not at all, and the writer waits at most for one copy.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// One accepted, smoothed and integrated sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TelemetryRecord {
    pub timestamp: DateTime<Local>,
    /// Smoothed current in amps.
    pub current: f64,
    /// Smoothed power in watts.
    pub power: f64,
    /// Energy accumulated since start, in kWh.
    pub cumulative_energy: f64,
}

/// Thread-safe ordered sequence of [`TelemetryRecord`]s.
#[derive(Debug, Default)]
pub struct TelemetrySeries {
    records: Mutex<VecDeque<TelemetryRecord>>,
    max_records: Option<usize>,
}

impl TelemetrySeries {
    /// Create an empty, unbounded series.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty series that keeps only the newest `max_records`.
    pub fn bounded(max_records: usize) -> Self {
        Self {
            records: Mutex::new(VecDeque::new()),
            max_records: Some(max_records.max(1)),
        }
    }

    /// Create a series honoring an optional bound.
    pub fn with_limit(max_records: Option<usize>) -> Self {
        match max_records {
            Some(n) => Self::bounded(n),
            None => Self::new(),
        }
    }

    // A panic while holding the lock cannot leave a half-written record:
    // every mutation is a single push or pop of a `Copy` value.
    fn lock(&self) -> MutexGuard<'_, VecDeque<TelemetryRecord>> {
        self.records.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Append a record. Called only by the ingestion loop.
    pub fn append(&self, record: TelemetryRecord) {
        let mut records = self.lock();
        records.push_back(record);
        if let Some(max) = self.max_records {
            while records.len() > max {
                records.pop_front();
            }
        }
    }

    /// Point-in-time copy of every record, oldest first.
    pub fn snapshot(&self) -> Vec<TelemetryRecord> {
        self.lock().iter().copied().collect()
    }

    /// Copy of the records whose timestamp is at or after `cutoff`.
    pub fn snapshot_since(&self, cutoff: DateTime<Local>) -> Vec<TelemetryRecord> {
        let records = self.lock();
        // Timestamps are non-decreasing, so the matching records form a suffix.
        let start = records.partition_point(|r| r.timestamp < cutoff);
        records.range(start..).copied().collect()
    }

    /// Most recently appended record.
    pub fn latest(&self) -> Option<TelemetryRecord> {
        self.lock().back().copied()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn max_records(&self) -> Option<usize> {
        self.max_records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeDelta, TimeZone};
    use std::sync::Arc;

    fn record(secs: i64, energy: f64) -> TelemetryRecord {
        TelemetryRecord {
            timestamp: Local.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
                + TimeDelta::seconds(secs),
            current: 1.0,
            power: 230.0,
            cumulative_energy: energy,
        }
    }

    #[test]
    fn test_new_series_is_empty() {
        let s = TelemetrySeries::new();
        assert!(s.is_empty());
        assert!(s.snapshot().is_empty());
        assert!(s.latest().is_none());
        assert_eq!(s.max_records(), None);
    }

    #[test]
    fn test_append_preserves_order() {
        let s = TelemetrySeries::new();
        for i in 0..10 {
            s.append(record(i, i as f64));
        }
        let snap = s.snapshot();
        assert_eq!(snap.len(), 10);
        for (i, r) in snap.iter().enumerate() {
            assert_eq!(r.cumulative_energy, i as f64);
        }
        assert_eq!(s.latest().unwrap().cumulative_energy, 9.0);
    }

    #[test]
    fn test_snapshot_is_detached_copy() {
        let s = TelemetrySeries::new();
        s.append(record(0, 0.0));
        let snap = s.snapshot();
        s.append(record(1, 1.0));
        assert_eq!(snap.len(), 1);
        assert_eq!(s.len(), 2);
    }

    #[test]
    fn test_bounded_series_evicts_oldest() {
        let s = TelemetrySeries::bounded(3);
        for i in 0..5 {
            s.append(record(i, i as f64));
        }
        let energies: Vec<f64> = s.snapshot().iter().map(|r| r.cumulative_energy).collect();
        assert_eq!(energies, vec![2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_snapshot_since_returns_suffix() {
        let s = TelemetrySeries::new();
        for i in 0..10 {
            s.append(record(i, i as f64));
        }
        let cutoff = record(7, 0.0).timestamp;
        let tail = s.snapshot_since(cutoff);
        assert_eq!(tail.len(), 3);
        assert_eq!(tail[0].cumulative_energy, 7.0);

        let future = record(100, 0.0).timestamp;
        assert!(s.snapshot_since(future).is_empty());
    }

    #[test]
    fn test_concurrent_snapshot_never_torn() {
        let series = Arc::new(TelemetrySeries::new());
        let writer = {
            let series = Arc::clone(&series);
            std::thread::spawn(move || {
                for i in 0..2000 {
                    series.append(TelemetryRecord {
                        timestamp: record(i, 0.0).timestamp,
                        current: i as f64,
                        power: i as f64 * 2.0,
                        cumulative_energy: i as f64 * 3.0,
                    });
                }
            })
        };

        let mut last_len = 0;
        while !writer.is_finished() {
            let snap = series.snapshot();
            assert!(snap.len() >= last_len);
            last_len = snap.len();
            for (i, r) in snap.iter().enumerate() {
                let i = i as f64;
                assert_eq!(r.current, i);
                assert_eq!(r.power, i * 2.0);
                assert_eq!(r.cumulative_energy, i * 3.0);
            }
        }
        writer.join().unwrap();
        assert_eq!(series.len(), 2000);
    }
}
