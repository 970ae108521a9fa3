//! `wattlog monitor`: ingest sensor datagrams, log to CSV, serve over HTTP.

use std::sync::Arc;

use wattlog_core::{Ingestor, ShutdownHandle, TelemetrySeries};
use wattlog_server::ServerState;

use super::ConfigArgs;

/// Run the monitor command.
pub fn run(args: &ConfigArgs, no_http: bool) {
    let config = super::resolve_or_exit(args);

    let series = Arc::new(TelemetrySeries::with_limit(config.max_records));

    let shutdown = ShutdownHandle::new();
    let ingestor = match Ingestor::bind_csv(&config, Arc::clone(&series)) {
        Ok(i) => i.with_shutdown(shutdown.clone()),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };
    let stats = ingestor.stats();

    let on_ctrlc = shutdown.clone();
    if let Err(e) = ctrlc::set_handler(move || on_ctrlc.shutdown()) {
        log::warn!("cannot install Ctrl+C handler: {e}");
    }

    println!("wattlog monitor v{}", wattlog_core::VERSION);
    println!("  UDP input:     udp://{}", ingestor.local_addr());
    if no_http {
        println!("  HTTP:          disabled");
    } else {
        println!("  HTTP:          http://{}", config.http_bind);
        println!("                 GET /data[?window=secs]  series payload");
        println!("                 GET /health              ingestion counters");
    }
    println!("  CSV log:       {}", config.sink_path.display());
    println!(
        "  Calibration:   warm-up {}s, dead zone {} A, offset {}",
        config.warmup_secs, config.dead_zone_amps, config.offset
    );
    println!(
        "  Smoothing:     {} samples, first interval {}",
        config.window_size, config.first_interval
    );
    match config.max_records {
        Some(n) => println!("  Memory:        newest {n} records"),
        None => println!("  Memory:        unbounded"),
    }
    println!();

    let handle = match ingestor.spawn() {
        Ok(h) => h,
        Err(e) => {
            eprintln!("Error starting ingestion thread: {e}");
            std::process::exit(1);
        }
    };

    if !no_http {
        let state = match ServerState::new(Arc::clone(&series), Arc::clone(&stats), &config) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("Error: {e}");
                shutdown.shutdown();
                std::process::exit(2);
            }
        };
        let served = tokio::runtime::Runtime::new().and_then(|rt| {
            rt.block_on(wattlog_server::run_server(
                state,
                &config.http_bind,
                shutdown.clone(),
            ))
        });
        if let Err(e) = served {
            eprintln!("Error: HTTP server on {} failed: {e}", config.http_bind);
            shutdown.shutdown();
        }
    }

    let outcome = handle.join();
    let report = stats.report();
    println!();
    println!(
        "Received {} datagrams: {} accepted, {} malformed, {} suppressed, {} sink failures",
        report.received, report.accepted, report.malformed, report.suppressed, report.sink_failures
    );
    if let Some(last) = series.latest() {
        println!("Total energy: {:.6} kWh", last.cumulative_energy);
    }

    match outcome {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
        Err(_) => {
            eprintln!("Error: ingestion thread panicked");
            std::process::exit(1);
        }
    }
}
