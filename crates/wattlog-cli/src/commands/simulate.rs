//! `wattlog simulate`: emulate the mains current sensor.
//!
//! Sends one `"<amps>,<watts>"` datagram per interval, formatted the way the
//! field sensor does (`%.3f,%.2f`), with power derived from an assumed
//! constant mains voltage.

use std::net::UdpSocket;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use rand::Rng;

/// Longest accepted send interval (one day).
pub const MAX_INTERVAL_MS: u64 = 86_400_000;

/// Options for the simulate command.
pub struct SimulateCommandConfig<'a> {
    pub target: &'a str,
    pub interval_ms: u64,
    pub amps: f64,
    pub voltage: f64,
    pub noise: f64,
    pub count: u64,
}

/// Format one sensor reading as a datagram payload.
pub fn format_reading(amps: f64, voltage: f64) -> String {
    format!("{:.3},{:.2}", amps, amps * voltage)
}

/// Validated send interval.
pub fn send_interval(interval_ms: u64) -> Result<Duration, String> {
    match interval_ms {
        0 => Err("--interval-ms must be at least 1".to_string()),
        ms if ms > MAX_INTERVAL_MS => Err(format!(
            "--interval-ms must be at most {MAX_INTERVAL_MS} (got {ms})"
        )),
        ms => Ok(Duration::from_millis(ms)),
    }
}

/// Draw a noisy, non-negative RMS current around `mean`.
fn sample_current(rng: &mut impl Rng, mean: f64, noise: f64) -> f64 {
    if noise <= 0.0 {
        return mean.max(0.0);
    }
    (mean + rng.random_range(-noise..=noise)).max(0.0)
}

/// Run the simulate command.
pub fn run(cfg: SimulateCommandConfig<'_>) {
    if !cfg.amps.is_finite() || !cfg.voltage.is_finite() || !cfg.noise.is_finite() {
        eprintln!("Error: --amps, --voltage and --noise must be finite numbers");
        std::process::exit(2);
    }

    let socket = match UdpSocket::bind("0.0.0.0:0") {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: cannot open UDP socket: {e}");
            std::process::exit(1);
        }
    };

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    if let Err(e) = ctrlc::set_handler(move || r.store(false, Ordering::SeqCst)) {
        log::warn!("cannot install Ctrl+C handler: {e}");
    }

    let interval = match send_interval(cfg.interval_ms) {
        Ok(i) => i,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(2);
        }
    };
    println!(
        "Simulating sensor -> udp://{} every {}ms ({} A ± {} at {} V)",
        cfg.target,
        interval.as_millis(),
        cfg.amps,
        cfg.noise,
        cfg.voltage
    );

    let mut rng = rand::rng();
    let mut sent = 0u64;
    let mut next = Instant::now();

    while running.load(Ordering::SeqCst) && (cfg.count == 0 || sent < cfg.count) {
        let amps = sample_current(&mut rng, cfg.amps, cfg.noise);
        let payload = format_reading(amps, cfg.voltage);
        match socket.send_to(payload.as_bytes(), cfg.target) {
            Ok(_) => {
                sent += 1;
                log::info!("sent: I = {:.3} A, P = {:.2} W", amps, amps * cfg.voltage);
            }
            // Lossy by nature; keep the cadence.
            Err(e) => log::warn!("send to {} failed: {e}", cfg.target),
        }

        // Fixed cadence: schedule from the previous deadline, not from now.
        next = match next.checked_add(interval) {
            Some(t) => t,
            None => Instant::now() + interval,
        };
        while Instant::now() < next && running.load(Ordering::SeqCst) {
            let remaining = next.saturating_duration_since(Instant::now());
            std::thread::sleep(remaining.min(Duration::from_millis(50)));
        }
    }

    println!("Sent {sent} readings.");
}
