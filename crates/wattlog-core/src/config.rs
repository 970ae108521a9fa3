//! Runtime configuration.
//!
//! Every option has a default matching the deployed monitor, so an empty
//! JSON object (or no config file at all) is a valid configuration. CLI flags
//! override individual fields after the file is loaded.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::format::{Item, StrftimeItems};
use serde::{Deserialize, Serialize};

use crate::calibration::{CalibrationFilter, DEFAULT_DEAD_ZONE_AMPS, DEFAULT_OFFSET};
use crate::error::ConfigError;
use crate::integrator::FirstIntervalPolicy;
use crate::sink::{DEFAULT_SINK_PATH, DEFAULT_TIMESTAMP_FORMAT};
use crate::window::{DEFAULT_WINDOW_SIZE, MAX_WINDOW_SIZE};

/// Default UDP address the sensor stream is received on.
pub const DEFAULT_UDP_BIND: &str = "0.0.0.0:8000";
/// Default HTTP address for the query interface.
pub const DEFAULT_HTTP_BIND: &str = "0.0.0.0:8000";

/// Full monitor configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// UDP bind address for sensor datagrams.
    pub udp_bind: String,
    /// TCP bind address for the HTTP query interface.
    pub http_bind: String,
    /// CSV file every accepted record is appended to.
    pub sink_path: PathBuf,
    /// strftime format for timestamps in the CSV and the HTTP payload.
    pub timestamp_format: String,
    /// Seconds after start during which readings are discarded.
    pub warmup_secs: u64,
    /// Current magnitude (A) below which a reading is forced to zero.
    pub dead_zone_amps: f64,
    /// Offset subtracted from both current and power.
    pub offset: f64,
    /// Number of readings in the moving average.
    pub window_size: usize,
    /// Refresh cadence advertised to dashboard clients.
    pub poll_interval_ms: u64,
    /// How the first post-warm-up sample is integrated.
    pub first_interval: FirstIntervalPolicy,
    /// Keep only the newest N records in memory. `None` keeps everything.
    pub max_records: Option<usize>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            udp_bind: DEFAULT_UDP_BIND.to_string(),
            http_bind: DEFAULT_HTTP_BIND.to_string(),
            sink_path: PathBuf::from(DEFAULT_SINK_PATH),
            timestamp_format: DEFAULT_TIMESTAMP_FORMAT.to_string(),
            warmup_secs: 60,
            dead_zone_amps: DEFAULT_DEAD_ZONE_AMPS,
            offset: DEFAULT_OFFSET,
            window_size: DEFAULT_WINDOW_SIZE,
            poll_interval_ms: 1000,
            first_interval: FirstIntervalPolicy::default(),
            max_records: None,
        }
    }
}

impl MonitorConfig {
    /// Load and validate a JSON config file. Missing fields take defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check every field for a usable value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window_size == 0 {
            return Err(invalid("window_size", "must be at least 1"));
        }
        if self.window_size > MAX_WINDOW_SIZE {
            return Err(ConfigError::Invalid {
                field: "window_size",
                reason: format!("must be at most {MAX_WINDOW_SIZE}"),
            });
        }
        if !self.dead_zone_amps.is_finite() || self.dead_zone_amps < 0.0 {
            return Err(invalid("dead_zone_amps", "must be a finite value >= 0"));
        }
        if !self.offset.is_finite() || self.offset < 0.0 {
            return Err(invalid("offset", "must be a finite value >= 0"));
        }
        if self.poll_interval_ms == 0 {
            return Err(invalid("poll_interval_ms", "must be at least 1"));
        }
        if self.max_records == Some(0) {
            return Err(invalid("max_records", "must be at least 1 when set"));
        }
        if self.udp_bind.trim().is_empty() {
            return Err(invalid("udp_bind", "must not be empty"));
        }
        if self.http_bind.trim().is_empty() {
            return Err(invalid("http_bind", "must not be empty"));
        }
        validate_timestamp_format(&self.timestamp_format)?;
        Ok(())
    }

    pub fn warmup(&self) -> Duration {
        Duration::from_secs(self.warmup_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Calibration filter built from the warm-up, dead-zone and offset fields.
    pub fn calibration_filter(&self) -> CalibrationFilter {
        CalibrationFilter::new(self.warmup(), self.dead_zone_amps, self.offset)
    }
}

fn invalid(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.to_string(),
    }
}

/// Reject strftime strings chrono cannot render.
pub fn validate_timestamp_format(format: &str) -> Result<(), ConfigError> {
    if format.is_empty() {
        return Err(invalid("timestamp_format", "must not be empty"));
    }
    if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
        return Err(ConfigError::Invalid {
            field: "timestamp_format",
            reason: format!("'{format}' is not a valid strftime format"),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_deployed_monitor() {
        let c = MonitorConfig::default();
        assert_eq!(c.udp_bind, "0.0.0.0:8000");
        assert_eq!(c.sink_path, PathBuf::from("current_log.csv"));
        assert_eq!(c.timestamp_format, "%Y-%m-%d %H:%M:%S");
        assert_eq!(c.warmup(), Duration::from_secs(60));
        assert_eq!(c.dead_zone_amps, 0.2);
        assert_eq!(c.offset, 0.350);
        assert_eq!(c.window_size, 5);
        assert_eq!(c.poll_interval(), Duration::from_secs(1));
        assert_eq!(c.first_interval, FirstIntervalPolicy::FromTransition);
        assert_eq!(c.max_records, None);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn test_partial_json_takes_defaults() {
        let c: MonitorConfig =
            serde_json::from_str(r#"{"window_size": 1, "first_interval": "from-start"}"#).unwrap();
        assert_eq!(c.window_size, 1);
        assert_eq!(c.first_interval, FirstIntervalPolicy::FromStart);
        assert_eq!(c.warmup_secs, 60);
    }

    #[test]
    fn test_load_from_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("wattlog.json");
        std::fs::write(&path, r#"{"udp_bind": "127.0.0.1:9000", "warmup_secs": 5}"#).unwrap();
        let c = MonitorConfig::load(&path).unwrap();
        assert_eq!(c.udp_bind, "127.0.0.1:9000");
        assert_eq!(c.warmup_secs, 5);
    }

    #[test]
    fn test_load_missing_file() {
        let err = MonitorConfig::load("/nonexistent/wattlog.json").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_load_malformed_json() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("bad.json");
        std::fs::write(&path, "{ window_size: ").unwrap();
        assert!(matches!(
            MonitorConfig::load(&path).unwrap_err(),
            ConfigError::Parse { .. }
        ));
    }

    #[test]
    fn test_oversized_window_rejected() {
        let c = MonitorConfig {
            window_size: usize::MAX / 64,
            ..Default::default()
        };
        assert!(matches!(
            c.validate().unwrap_err(),
            ConfigError::Invalid { field: "window_size", .. }
        ));

        let c = MonitorConfig {
            window_size: MAX_WINDOW_SIZE,
            ..Default::default()
        };
        assert!(c.validate().is_ok());
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("zero.json");
        std::fs::write(&path, r#"{"window_size": 0}"#).unwrap();
        assert!(matches!(
            MonitorConfig::load(&path).unwrap_err(),
            ConfigError::Invalid { field: "window_size", .. }
        ));
    }

    #[test]
    fn test_validate_rejects_bad_numbers() {
        let mut c = MonitorConfig {
            offset: -0.1,
            ..Default::default()
        };
        assert!(c.validate().is_err());
        c.offset = 0.35;
        c.dead_zone_amps = f64::NAN;
        assert!(c.validate().is_err());
        c.dead_zone_amps = 0.2;
        c.poll_interval_ms = 0;
        assert!(c.validate().is_err());
        c.poll_interval_ms = 1000;
        c.max_records = Some(0);
        assert!(c.validate().is_err());
        c.max_records = Some(10);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn test_timestamp_format_validation() {
        assert!(validate_timestamp_format("%Y-%m-%d %H:%M:%S").is_ok());
        assert!(validate_timestamp_format("%H:%M").is_ok());
        assert!(validate_timestamp_format("%Y-%m-%d %").is_err());
        assert!(validate_timestamp_format("").is_err());
    }
}
