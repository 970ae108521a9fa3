//! CLI for wattlog: receive, log and serve live mains energy telemetry.

mod commands;

use clap::{Parser, Subcommand};

use commands::ConfigArgs;

#[derive(Parser)]
#[command(name = "wattlog")]
#[command(about = "wattlog: live current, power and energy logging from a UDP mains sensor")]
#[command(version = wattlog_core::VERSION)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Receive sensor datagrams, log them to CSV and serve the live series over HTTP
    Monitor {
        #[command(flatten)]
        config: ConfigArgs,

        /// Only ingest and log; do not start the HTTP server
        #[arg(long)]
        no_http: bool,
    },

    /// Emulate a mains current sensor by sending readings over UDP
    Simulate {
        /// Address of the monitor's UDP listener
        #[arg(long, default_value = "127.0.0.1:8000")]
        target: String,

        /// Send interval in milliseconds
        #[arg(long, default_value = "1000")]
        interval_ms: u64,

        /// Mean RMS current in amps
        #[arg(long, default_value = "1.5")]
        amps: f64,

        /// Assumed constant mains voltage (power = amps * voltage)
        #[arg(long, default_value = "230.0")]
        voltage: f64,

        /// Uniform noise amplitude added to the current, in amps
        #[arg(long, default_value = "0.05")]
        noise: f64,

        /// Number of readings to send (0 = until Ctrl+C)
        #[arg(long, default_value = "0")]
        count: u64,
    },

    /// Print the effective configuration as JSON
    Config {
        #[command(flatten)]
        config: ConfigArgs,

        /// Write the configuration to this path instead of stdout
        #[arg(long)]
        output: Option<String>,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Monitor { config, no_http } => commands::monitor::run(&config, no_http),
        Commands::Simulate {
            target,
            interval_ms,
            amps,
            voltage,
            noise,
            count,
        } => commands::simulate::run(commands::simulate::SimulateCommandConfig {
            target: &target,
            interval_ms,
            amps,
            voltage,
            noise,
            count,
        }),
        Commands::Config { config, output } => commands::config::run(&config, output.as_deref()),
    }
}
