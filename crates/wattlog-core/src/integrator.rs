//! Cumulative energy integration.
//!
//! Energy is accumulated by holding the latest smoothed power constant over
//! the interval since the previous accepted sample:
//!
//! ```text
//! kWh += avg_power_W * elapsed_s / 3_600_000
//! ```
//!
//! Sample spacing follows datagram arrival, so the step size varies with
//! network jitter. A negative interval (wall clock stepped backwards) accrues
//! nothing, which keeps the running total non-decreasing.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Watt-seconds per kilowatt-hour.
pub const WATT_SECONDS_PER_KWH: f64 = 3_600_000.0;

/// How the very first accepted sample after warm-up is integrated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FirstIntervalPolicy {
    /// Restart the integrator clock when warm-up ends, so the first accepted
    /// sample accrues no energy.
    #[default]
    FromTransition,
    /// Measure the first interval from pipeline start. Inflates the total by
    /// the whole warm-up period once.
    FromStart,
}

impl std::fmt::Display for FirstIntervalPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FromTransition => write!(f, "from-transition"),
            Self::FromStart => write!(f, "from-start"),
        }
    }
}

impl std::str::FromStr for FirstIntervalPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "from-transition" | "transition" => Ok(Self::FromTransition),
            "from-start" | "start" => Ok(Self::FromStart),
            _ => Err(format!(
                "unknown first-interval policy '{s}' (expected from-transition or from-start)"
            )),
        }
    }
}

/// Running energy total plus the instant of the last accepted sample.
#[derive(Debug, Clone)]
pub struct EnergyIntegrator {
    last_sample: DateTime<Local>,
    cumulative_kwh: f64,
}

impl EnergyIntegrator {
    /// Start integrating from `start` with a zero total.
    pub fn new(start: DateTime<Local>) -> Self {
        Self {
            last_sample: start,
            cumulative_kwh: 0.0,
        }
    }

    /// Accrue `avg_power` watts over the time since the last sample and
    /// return the new cumulative total in kWh.
    pub fn integrate(&mut self, avg_power: f64, now: DateTime<Local>) -> f64 {
        let elapsed_secs = now
            .signed_duration_since(self.last_sample)
            .to_std()
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);
        self.last_sample = now;

        let increment = avg_power * elapsed_secs / WATT_SECONDS_PER_KWH;
        if increment.is_finite() && increment > 0.0 {
            self.cumulative_kwh += increment;
        }
        self.cumulative_kwh
    }

    /// Move the clock to `now` without accruing energy.
    pub fn restart_clock(&mut self, now: DateTime<Local>) {
        self.last_sample = now;
    }

    pub fn total(&self) -> f64 {
        self.cumulative_kwh
    }

    pub fn last_sample(&self) -> DateTime<Local> {
        self.last_sample
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeDelta, TimeZone};

    fn t0() -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    fn at(secs: f64) -> DateTime<Local> {
        t0() + TimeDelta::milliseconds((secs * 1000.0) as i64)
    }

    #[test]
    fn test_one_hour_at_one_kilowatt() {
        let mut i = EnergyIntegrator::new(t0());
        let total = i.integrate(1000.0, at(3600.0));
        assert!((total - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_increment_uses_elapsed_seconds() {
        let mut i = EnergyIntegrator::new(t0());
        i.integrate(99.65, at(1.0));
        let total = i.integrate(99.65, at(2.5));
        let expected = 99.65 * 2.5 / WATT_SECONDS_PER_KWH;
        assert!((total - expected).abs() < 1e-15);
        assert_eq!(i.last_sample(), at(2.5));
    }

    #[test]
    fn test_clock_regression_accrues_nothing() {
        let mut i = EnergyIntegrator::new(t0());
        let before = i.integrate(500.0, at(10.0));
        let after = i.integrate(500.0, at(4.0));
        assert_eq!(before, after);
        assert_eq!(i.last_sample(), at(4.0));
    }

    #[test]
    fn test_zero_power_accrues_nothing() {
        let mut i = EnergyIntegrator::new(t0());
        assert_eq!(i.integrate(0.0, at(60.0)), 0.0);
    }

    #[test]
    fn test_restart_clock_skips_interval() {
        let mut i = EnergyIntegrator::new(t0());
        i.restart_clock(at(65.0));
        assert_eq!(i.integrate(99.65, at(65.0)), 0.0);
        let total = i.integrate(99.65, at(66.0));
        assert!((total - 99.65 / WATT_SECONDS_PER_KWH).abs() < 1e-15);
    }

    #[test]
    fn test_total_is_monotonic() {
        let mut i = EnergyIntegrator::new(t0());
        let mut prev = 0.0;
        for (k, secs) in [1.0, 2.0, 1.5, 3.0, 3.0, 10.0].iter().enumerate() {
            let total = i.integrate(k as f64 * 37.0, at(*secs));
            assert!(total >= prev);
            prev = total;
        }
    }

    #[test]
    fn test_policy_parse_and_display() {
        assert_eq!(
            "from-start".parse::<FirstIntervalPolicy>().unwrap(),
            FirstIntervalPolicy::FromStart
        );
        assert_eq!(
            "transition".parse::<FirstIntervalPolicy>().unwrap(),
            FirstIntervalPolicy::FromTransition
        );
        assert!("later".parse::<FirstIntervalPolicy>().is_err());
        assert_eq!(FirstIntervalPolicy::default().to_string(), "from-transition");
    }
}
