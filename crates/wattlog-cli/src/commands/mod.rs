pub mod config;
pub mod monitor;
pub mod simulate;

use std::path::PathBuf;

use wattlog_core::{FirstIntervalPolicy, MonitorConfig};

/// Config file plus per-field overrides shared by commands that need a
/// [`MonitorConfig`].
#[derive(clap::Args, Debug, Default)]
pub struct ConfigArgs {
    /// JSON config file (missing fields take defaults)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// UDP address to receive sensor datagrams on
    #[arg(long)]
    pub udp_bind: Option<String>,

    /// HTTP address for the query interface
    #[arg(long)]
    pub http_bind: Option<String>,

    /// CSV file to log accepted records to (truncated at start)
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// strftime format for logged timestamps
    #[arg(long)]
    pub timestamp_format: Option<String>,

    /// Seconds of sensor warm-up during which readings are discarded
    #[arg(long)]
    pub warmup_secs: Option<u64>,

    /// Current (A) below which a reading is treated as zero
    #[arg(long)]
    pub dead_zone: Option<f64>,

    /// Calibration offset subtracted from current and power
    #[arg(long)]
    pub offset: Option<f64>,

    /// Number of readings in the moving average
    #[arg(long)]
    pub window: Option<usize>,

    /// Dashboard refresh interval in milliseconds
    #[arg(long)]
    pub poll_interval_ms: Option<u64>,

    /// First-interval integration policy: from-transition (default) or from-start
    #[arg(long)]
    pub first_interval: Option<FirstIntervalPolicy>,

    /// Keep only the newest N records in memory (default: unbounded)
    #[arg(long)]
    pub max_records: Option<usize>,
}

impl ConfigArgs {
    /// Apply every override that was given on the command line.
    pub fn apply(&self, config: &mut MonitorConfig) {
        if let Some(ref v) = self.udp_bind {
            config.udp_bind = v.clone();
        }
        if let Some(ref v) = self.http_bind {
            config.http_bind = v.clone();
        }
        if let Some(ref v) = self.log_file {
            config.sink_path = v.clone();
        }
        if let Some(ref v) = self.timestamp_format {
            config.timestamp_format = v.clone();
        }
        if let Some(v) = self.warmup_secs {
            config.warmup_secs = v;
        }
        if let Some(v) = self.dead_zone {
            config.dead_zone_amps = v;
        }
        if let Some(v) = self.offset {
            config.offset = v;
        }
        if let Some(v) = self.window {
            config.window_size = v;
        }
        if let Some(v) = self.poll_interval_ms {
            config.poll_interval_ms = v;
        }
        if let Some(v) = self.first_interval {
            config.first_interval = v;
        }
        if self.max_records.is_some() {
            config.max_records = self.max_records;
        }
    }

    /// Load the config file (if any), apply overrides and validate.
    pub fn resolve(&self) -> Result<MonitorConfig, wattlog_core::ConfigError> {
        let mut config = match self.config {
            Some(ref path) => MonitorConfig::load(path)?,
            None => MonitorConfig::default(),
        };
        self.apply(&mut config);
        config.validate()?;
        Ok(config)
    }
}

/// Resolve the configuration or exit with a message.
pub fn resolve_or_exit(args: &ConfigArgs) -> MonitorConfig {
    args.resolve().unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        std::process::exit(2);
    })
}

/// Write a value as pretty JSON to `path`.
pub fn write_json<T: serde::Serialize>(value: &T, path: &str, label: &str) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => match std::fs::write(path, json) {
            Ok(()) => println!("{label} written to {path}"),
            Err(e) => {
                eprintln!("Error writing {path}: {e}");
                std::process::exit(1);
            }
        },
        Err(e) => {
            eprintln!("Error serializing {label}: {e}");
            std::process::exit(1);
        }
    }
}
