use std::io::IsTerminal;
use std::time::Duration;

use clap::Parser;
use log::{error, info};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use iot_power_monitor::config::{load_units, ApiConfig, DEFAULT_API_BASE};
use iot_power_monitor::dashboard::Dashboard;
use iot_power_monitor::driver::{self, Output};
use iot_power_monitor::history::{HistoryStore, DEFAULT_CAPACITY};
use iot_power_monitor::operator::{parse_command, OperatorCommand, HELP};
use iot_power_monitor::{init_logging, HttpTelemetryClient};

/// Live terminal dashboard for IoT power-monitoring units
#[derive(Debug, Parser)]
#[command(name = "power-dashboard")]
struct Args {
    /// Telemetry API base address, overrides the default endpoint
    #[arg(long, env = "API_BASE", default_value = DEFAULT_API_BASE)]
    api_base: String,

    /// Unit selected at startup
    #[arg(long, env = "MONITOR_UNIT")]
    unit: Option<String>,

    /// Delay between polls
    #[arg(long, default_value_t = 3)]
    interval_secs: u64,

    /// Per-request timeout
    #[arg(long, default_value_t = 3)]
    timeout_secs: u64,

    /// Readings kept per unit
    #[arg(long, default_value_t = DEFAULT_CAPACITY)]
    history: usize,
}

/// Read operator commands from stdin and forward them to the poll loop
fn spawn_operator_input(tx: mpsc::Sender<OperatorCommand>) {
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => match parse_command(&line) {
                    Ok(Some(command)) => {
                        if tx.send(command).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) => {}
                    Err(message) => println!("{}", message),
                },
                Ok(None) => break,
                Err(e) => {
                    error!("Failed to read operator input: {}", e);
                    break;
                }
            }
        }
    });
}

/// Print driver output. Frames replace the screen when stdout is a terminal.
fn terminal_output() -> impl FnMut(Output) {
    let clear_screen = std::io::stdout().is_terminal();
    move |output| match output {
        Output::Frame(frame) => {
            if clear_screen {
                print!("\x1B[2J\x1B[H");
            }
            println!("{}", frame);
            println!("{}", HELP);
        }
        Output::Message(text) => println!("{}", text),
        Output::Warning(text) => println!("WARNING: {}", text),
    }
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
    let units = match load_units() {
        Ok(units) => units,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    let client = HttpTelemetryClient::new(&api_config)?;
    let mut dashboard = Dashboard::new(client.clone(), units, HistoryStore::new(args.history))?;
    if let Some(unit) = &args.unit {
        dashboard.select_unit(unit)?;
    }

    info!(
        "Polling {}monitoring every {} seconds",
        api_config.base_url, args.interval_secs
    );

    let (tx, rx) = mpsc::channel(16);
    spawn_operator_input(tx);

    driver::run(
        dashboard,
        client,
        Duration::from_secs(args.interval_secs),
        rx,
        terminal_output(),
    )
    .await;
    Ok(())
}
