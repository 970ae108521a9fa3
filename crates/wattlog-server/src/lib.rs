//! HTTP query interface for the live telemetry series.
//!
//! Serves the series as three time-aligned JSON arrays (current, power,
//! cumulative energy) for a dashboard that polls `/data` at the advertised
//! interval, plus ingestion health counters.

use std::sync::Arc;

use axum::{
    Router,
    extract::{Query, State},
    http::StatusCode,
    response::Json,
    routing::get,
};
use chrono::{DateTime, Local, TimeDelta};
use serde::{Deserialize, Serialize};

use wattlog_core::config::validate_timestamp_format;
use wattlog_core::{
    ConfigError, IngestStats, MonitorConfig, ShutdownHandle, TelemetryRecord, TelemetrySeries,
};

/// Shared server state.
pub struct ServerState {
    series: Arc<TelemetrySeries>,
    stats: Arc<IngestStats>,
    timestamp_format: String,
    poll_interval_ms: u64,
    started_at: DateTime<Local>,
}

impl ServerState {
    /// Build server state reading from `series` and `stats`.
    pub fn new(
        series: Arc<TelemetrySeries>,
        stats: Arc<IngestStats>,
        config: &MonitorConfig,
    ) -> Result<Self, ConfigError> {
        validate_timestamp_format(&config.timestamp_format)?;
        Ok(Self {
            series,
            stats,
            timestamp_format: config.timestamp_format.clone(),
            poll_interval_ms: config.poll_interval_ms,
            started_at: Local::now(),
        })
    }
}

#[derive(Deserialize)]
struct DataParams {
    /// Only return records from the last N seconds (relative to the newest record).
    window: Option<f64>,
}

#[derive(Debug, Serialize)]
struct SeriesPayload {
    count: usize,
    poll_interval_ms: u64,
    timestamps: Vec<String>,
    current: Vec<f64>,
    power: Vec<f64>,
    energy_kwh: Vec<f64>,
    latest: Option<LatestEntry>,
    /// Error message if the request was rejected.
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct LatestEntry {
    timestamp: String,
    current: f64,
    power: f64,
    energy_kwh: f64,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: String,
    phase: String,
    records: usize,
    received: u64,
    accepted: u64,
    malformed: u64,
    suppressed: u64,
    sink_failures: u64,
    uptime_secs: i64,
}

impl SeriesPayload {
    fn from_records(records: &[TelemetryRecord], state: &ServerState) -> Self {
        let fmt = state.timestamp_format.as_str();
        let latest = records.last().map(|r| LatestEntry {
            timestamp: r.timestamp.format(fmt).to_string(),
            current: r.current,
            power: r.power,
            energy_kwh: r.cumulative_energy,
        });

        Self {
            count: records.len(),
            poll_interval_ms: state.poll_interval_ms,
            timestamps: records
                .iter()
                .map(|r| r.timestamp.format(fmt).to_string())
                .collect(),
            current: records.iter().map(|r| r.current).collect(),
            power: records.iter().map(|r| r.power).collect(),
            energy_kwh: records.iter().map(|r| r.cumulative_energy).collect(),
            latest,
            error: None,
        }
    }

    fn rejected(state: &ServerState, message: String) -> Self {
        Self {
            error: Some(message),
            ..Self::from_records(&[], state)
        }
    }
}

async fn handle_data(
    State(state): State<Arc<ServerState>>,
    Query(params): Query<DataParams>,
) -> (StatusCode, Json<SeriesPayload>) {
    let records = match params.window {
        None => state.series.snapshot(),
        Some(secs) if secs.is_finite() && secs >= 0.0 => match state.series.latest() {
            Some(latest) => {
                let cutoff = TimeDelta::try_milliseconds((secs * 1000.0) as i64)
                    .and_then(|window| latest.timestamp.checked_sub_signed(window));
                match cutoff {
                    Some(cutoff) => state.series.snapshot_since(cutoff),
                    // Window reaches past the representable range: everything.
                    None => state.series.snapshot(),
                }
            }
            None => Vec::new(),
        },
        Some(secs) => {
            let msg = format!("Invalid window: {secs}. Expected a finite number of seconds >= 0.");
            return (
                StatusCode::BAD_REQUEST,
                Json(SeriesPayload::rejected(&state, msg)),
            );
        }
    };

    (
        StatusCode::OK,
        Json(SeriesPayload::from_records(&records, &state)),
    )
}

async fn handle_health(State(state): State<Arc<ServerState>>) -> Json<HealthResponse> {
    let report = state.stats.report();
    Json(HealthResponse {
        status: if report.phase == wattlog_core::Phase::Steady {
            "healthy".to_string()
        } else {
            "warming_up".to_string()
        },
        phase: report.phase.to_string(),
        records: state.series.len(),
        received: report.received,
        accepted: report.accepted,
        malformed: report.malformed,
        suppressed: report.suppressed,
        sink_failures: report.sink_failures,
        uptime_secs: Local::now().signed_duration_since(state.started_at).num_seconds(),
    })
}

async fn handle_index(State(state): State<Arc<ServerState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "name": "wattlog",
        "version": wattlog_core::VERSION,
        "poll_interval_ms": state.poll_interval_ms,
        "endpoints": {
            "/": "This API index",
            "/data": {
                "method": "GET",
                "description": "Current (A), power (W) and cumulative energy (kWh) series",
                "params": {
                    "window": "Only records from the last N seconds (default: all)",
                }
            },
            "/health": "Ingestion phase and datagram counters",
        },
        "examples": {
            "full_series": "/data",
            "last_minute": "/data?window=60",
        }
    }))
}

/// Build the axum router.
pub fn build_router(state: ServerState) -> Router {
    Router::new()
        .route("/", get(handle_index))
        .route("/data", get(handle_data))
        .route("/health", get(handle_health))
        .with_state(Arc::new(state))
}

/// Run the HTTP server until `shutdown` is triggered.
pub async fn run_server(
    state: ServerState,
    addr: &str,
    shutdown: ShutdownHandle,
) -> std::io::Result<()> {
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    log::info!("serving telemetry on http://{}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            while !shutdown.is_shutdown() {
                tokio::time::sleep(std::time::Duration::from_millis(200)).await;
            }
        })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(secs: i64, energy: f64) -> TelemetryRecord {
        TelemetryRecord {
            timestamp: Local.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
                + TimeDelta::seconds(secs),
            current: 0.65,
            power: 99.65,
            cumulative_energy: energy,
        }
    }

    fn state_with(records: &[TelemetryRecord]) -> Arc<ServerState> {
        let series = Arc::new(TelemetrySeries::new());
        for r in records {
            series.append(*r);
        }
        let state = ServerState::new(series, Arc::new(IngestStats::new()), &MonitorConfig::default())
            .unwrap();
        Arc::new(state)
    }

    async fn data(state: Arc<ServerState>, window: Option<f64>) -> (StatusCode, SeriesPayload) {
        let (status, Json(payload)) = handle_data(State(state), Query(DataParams { window })).await;
        (status, payload)
    }

    #[tokio::test]
    async fn test_empty_series_returns_empty_payload() {
        let (status, payload) = data(state_with(&[]), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload.count, 0);
        assert!(payload.timestamps.is_empty());
        assert!(payload.energy_kwh.is_empty());
        assert!(payload.latest.is_none());

        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["latest"], serde_json::Value::Null);
        assert!(json.get("error").is_none());
    }

    #[tokio::test]
    async fn test_series_is_time_aligned() {
        let records = [record(65, 0.0), record(66, 0.1), record(67, 0.2)];
        let (status, payload) = data(state_with(&records), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload.count, 3);
        assert_eq!(payload.timestamps.len(), 3);
        assert_eq!(payload.current.len(), 3);
        assert_eq!(payload.power.len(), 3);
        assert_eq!(payload.energy_kwh, vec![0.0, 0.1, 0.2]);
        assert_eq!(payload.timestamps[0], "2025-06-01 12:01:05");
        assert_eq!(payload.poll_interval_ms, 1000);

        let latest = payload.latest.unwrap();
        assert_eq!(latest.timestamp, "2025-06-01 12:01:07");
        assert_eq!(latest.energy_kwh, 0.2);
    }

    #[tokio::test]
    async fn test_window_limits_to_recent_records() {
        let records: Vec<_> = (0..120).map(|s| record(s, s as f64)).collect();
        let (_, payload) = data(state_with(&records), Some(10.0)).await;
        // Records at 109..=119 seconds.
        assert_eq!(payload.count, 11);
        assert_eq!(payload.energy_kwh.first(), Some(&109.0));
    }

    #[tokio::test]
    async fn test_window_on_empty_series() {
        let (status, payload) = data(state_with(&[]), Some(60.0)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload.count, 0);
    }

    #[tokio::test]
    async fn test_invalid_window_rejected() {
        let (status, payload) = data(state_with(&[record(0, 0.0)]), Some(-5.0)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(payload.count, 0);
        assert!(payload.error.unwrap().contains("Invalid window"));
    }

    #[tokio::test]
    async fn test_health_reports_counters() {
        let state = state_with(&[record(0, 0.0)]);
        let Json(health) = handle_health(State(state)).await;
        assert_eq!(health.status, "warming_up");
        assert_eq!(health.phase, "warming_up");
        assert_eq!(health.records, 1);
        assert_eq!(health.received, 0);
    }

    #[tokio::test]
    async fn test_index_lists_endpoints() {
        let Json(index) = handle_index(State(state_with(&[]))).await;
        assert_eq!(index["name"], "wattlog");
        assert!(index["endpoints"]["/data"].is_object());
    }

    #[test]
    fn test_state_rejects_bad_timestamp_format() {
        let config = MonitorConfig {
            timestamp_format: "%Y-%".to_string(),
            ..Default::default()
        };
        let state = ServerState::new(
            Arc::new(TelemetrySeries::new()),
            Arc::new(IngestStats::new()),
            &config,
        );
        assert!(state.is_err());
    }
}
