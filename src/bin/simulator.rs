use std::time::Duration;

use clap::Parser;
use log::{error, info};
use rand::rngs::StdRng;
use rand::SeedableRng;

use iot_power_monitor::config::{load_panels, ApiConfig, DEFAULT_API_BASE};
use iot_power_monitor::simulator::{check_api, Simulator, DEFAULT_TOGGLE_EVERY};
use iot_power_monitor::{init_logging, HttpTelemetryClient};

/// Posts synthetic readings for panels that have no real hardware
#[derive(Debug, Parser)]
#[command(name = "panel-simulator")]
struct Args {
    /// Telemetry API base address, overrides the default endpoint
    #[arg(long, env = "API_BASE", default_value = DEFAULT_API_BASE)]
    api_base: String,

    /// Delay between iterations
    #[arg(long, default_value_t = 3)]
    interval_secs: u64,

    /// Per-request timeout
    #[arg(long, default_value_t = 3)]
    timeout_secs: u64,

    /// Flip one relay every N iterations
    #[arg(long, default_value_t = DEFAULT_TOGGLE_EVERY)]
    toggle_every: u64,

    /// Fixed RNG seed for reproducible runs
    #[arg(long)]
    seed: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    init_logging();
    let args = Args::parse();

    // Load configuration
    let api_config =
        match ApiConfig::new(&args.api_base, Duration::from_secs(args.timeout_secs)) {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load configuration: {}", e);
                return Err(e.into());
            }
        };
    let panels = match load_panels() {
        Ok(panels) => panels,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    let client = HttpTelemetryClient::new(&api_config)?;
    let base = client.base_url().clone();

    let ids: Vec<&str> = panels.keys().map(String::as_str).collect();
    info!("Simulating {} panels: {}", ids.len(), ids.join(", "));
    info!("Sending data to: {}monitoring", base);

    if !check_api(&client).await {
        return Ok(());
    }

    let rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let mut simulator = Simulator::new(panels, rng, args.toggle_every)?;

    // Handle Ctrl+C gracefully
    let (tx, rx) = tokio::sync::oneshot::channel::<()>();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                let _ = tx.send(());
            }
            Err(e) => {
                error!("Failed to listen for Ctrl+C: {}", e);
                std::future::pending::<()>().await;
            }
        }
    });

    let stop = async {
        let _ = rx.await;
    };
    simulator
        .run_until(&client, Duration::from_secs(args.interval_secs), stop)
        .await;

    // Print summary
    print!("{}", simulator.summary());

    Ok(())
}
