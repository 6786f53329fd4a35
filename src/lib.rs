pub mod client;
pub mod config;
pub mod dashboard;
pub mod driver;
pub mod error;
pub mod history;
pub mod models;
pub mod operator;
pub mod render;
pub mod simulator;
pub mod utils;

pub use client::{HttpTelemetryClient, TelemetryApi};
pub use error::{ClientError, ConfigError};
pub use models::{Reading, RelayAction, RelayCommand, RelayStatus};

/// Initialise logging the same way for both binaries. `RUST_LOG` wins over
/// the `info` default.
pub fn init_logging() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_secs()
        .init();
}
