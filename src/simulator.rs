/// Synthetic readings for panels without real hardware
///
/// Each simulated panel has a base voltage and current plus a symmetric
/// variation fraction. Every iteration draws one reading per panel and posts
/// it; every `toggle_every` iterations one panel's relay is flipped through
/// the same relay endpoint the dashboard uses.
use std::collections::BTreeMap;
use std::fmt::Write;
use std::future::Future;
use std::time::Duration;

use log::{error, info, warn};
use rand::seq::IteratorRandom;
use rand::Rng;
use time::OffsetDateTime;
use tokio::time::sleep;

use crate::client::{HttpTelemetryClient, TelemetryApi};
use crate::error::ConfigError;
use crate::models::{PanelModel, Reading, RelayAction, RelayCommand, RelayStatus};
use crate::utils::{format_clock, format_timestamp, round_to};

pub const DEFAULT_TOGGLE_EVERY: u64 = 20;
pub const SIMULATION_REASON: &str = "SIMULATION";
pub const SIMULATION_ACTOR: &str = "panel_simulator";

/// Draw one reading from a panel model
///
/// Voltage and current are rounded before power is derived, so
/// `power == round_to(voltage * current, 1)` always holds.
pub fn synthesize<R: Rng + ?Sized>(
    unit_id: &str,
    model: &PanelModel,
    rng: &mut R,
    now: &OffsetDateTime,
) -> Reading {
    let var = model.variation;
    let voltage = round_to(model.base_voltage * (1.0 + rng.gen_range(-var..=var)), 1);
    let current = round_to(model.base_current * (1.0 + rng.gen_range(-var..=var)), 3);
    let power = round_to(voltage * current, 1);

    Reading {
        unit_id: unit_id.to_string(),
        timestamp: format_timestamp(now),
        voltage,
        current,
        power,
        relay_status: model.relay_status,
    }
}

/// Startup liveness check against the API root, no retry
///
/// Any HTTP answer means the server is up, a non-200 one is only worth a
/// warning. Returns false when the server could not be reached at all, in
/// which case the simulator should not start.
pub async fn check_api(client: &HttpTelemetryClient) -> bool {
    info!("Testing API connection...");
    match client.ping().await {
        Ok(200) => {
            info!("API server is reachable");
            true
        }
        Ok(status) => {
            warn!("API responded with status {}", status);
            true
        }
        Err(e) => {
            error!("Cannot connect to {}: {}", client.base_url(), e);
            error!("Make sure the API server is running");
            false
        }
    }
}

/// Counters printed when the simulator stops
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub iterations: u64,
    pub readings_generated: u64,
    pub readings_accepted: u64,
    pub toggles_attempted: u64,
    pub toggles_applied: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToggleAttempt {
    pub unit_id: String,
    pub from: RelayStatus,
    pub to: RelayAction,
    pub applied: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IterationReport {
    pub iteration: u64,
    pub readings: Vec<Reading>,
    pub accepted: usize,
    pub toggle: Option<ToggleAttempt>,
}

pub struct Simulator<R> {
    panels: BTreeMap<String, PanelModel>,
    rng: R,
    toggle_every: u64,
    stats: RunStats,
}

impl<R: Rng> Simulator<R> {
    pub fn new(
        panels: BTreeMap<String, PanelModel>,
        rng: R,
        toggle_every: u64,
    ) -> Result<Self, ConfigError> {
        if panels.is_empty() {
            return Err(ConfigError::Empty("simulator needs at least one panel"));
        }
        if toggle_every == 0 {
            return Err(ConfigError::Empty("toggle interval must be at least 1"));
        }

        Ok(Simulator {
            panels,
            rng,
            toggle_every,
            stats: RunStats::default(),
        })
    }

    pub fn panels(&self) -> &BTreeMap<String, PanelModel> {
        &self.panels
    }

    pub fn relay_status(&self, unit_id: &str) -> Option<RelayStatus> {
        self.panels.get(unit_id).map(|p| p.relay_status)
    }

    pub fn stats(&self) -> RunStats {
        self.stats
    }

    /// Iterate every `interval` until `stop` resolves
    pub async fn run_until<A, S>(&mut self, api: &A, interval: Duration, stop: S)
    where
        A: TelemetryApi,
        S: Future<Output = ()>,
    {
        let iterations = async {
            loop {
                let now = OffsetDateTime::now_utc();
                info!(
                    "--- Iteration {} ({}) ---",
                    self.stats.iterations + 1,
                    format_clock(&now)
                );

                let report = self.run_iteration(api, now).await;
                if report.accepted < report.readings.len() {
                    warn!(
                        "Only {}/{} readings stored this iteration",
                        report.accepted,
                        report.readings.len()
                    );
                }

                sleep(interval).await;
            }
        };

        tokio::select! {
            _ = iterations => {}
            _ = stop => {
                info!("Simulation stopped by user");
            }
        }
    }

    /// Run summary: counters plus the final local relay state of each panel
    pub fn summary(&self) -> String {
        let stats = &self.stats;
        let mut out = String::new();
        let _ = writeln!(out, "Total iterations: {}", stats.iterations);
        let _ = writeln!(out, "Total data points sent: {}", stats.readings_generated);
        let _ = writeln!(out, "  Stored by the API: {}", stats.readings_accepted);
        let _ = writeln!(
            out,
            "Relay toggles: {} attempted, {} applied",
            stats.toggles_attempted, stats.toggles_applied
        );
        for (unit_id, model) in &self.panels {
            let _ = writeln!(out, "  {} relay: {}", unit_id, model.relay_status);
        }
        out
    }

    /// Generate and post one reading per panel, toggling a relay when due
    pub async fn run_iteration<A: TelemetryApi>(
        &mut self,
        api: &A,
        now: OffsetDateTime,
    ) -> IterationReport {
        self.stats.iterations += 1;
        let iteration = self.stats.iterations;

        let mut readings = Vec::with_capacity(self.panels.len());
        let mut accepted = 0;

        for (unit_id, model) in &self.panels {
            let reading = synthesize(unit_id, model, &mut self.rng, &now);
            self.stats.readings_generated += 1;

            if api.post_reading(&reading).await {
                accepted += 1;
                self.stats.readings_accepted += 1;
                info!(
                    "{}: V={:.1}V, I={:.3}A, P={:.1}W -> stored",
                    reading.unit_id, reading.voltage, reading.current, reading.power
                );
            }
            readings.push(reading);
        }

        let toggle = if iteration % self.toggle_every == 0 {
            self.toggle_random_relay(api).await
        } else {
            None
        };

        IterationReport {
            iteration,
            readings,
            accepted,
            toggle,
        }
    }

    /// Flip one randomly chosen panel's relay
    ///
    /// The local state only changes once the API accepted the command.
    pub async fn toggle_random_relay<A: TelemetryApi>(&mut self, api: &A) -> Option<ToggleAttempt> {
        let unit_id = self.panels.keys().choose(&mut self.rng)?.clone();
        let from = self.panels.get(&unit_id)?.relay_status;
        let to = RelayAction::toggle_from(from);

        info!("Toggling {} relay: {} -> {}", unit_id, from, to);
        self.stats.toggles_attempted += 1;

        let command = RelayCommand::new(&unit_id, to, SIMULATION_REASON, SIMULATION_ACTOR);
        let applied = api.post_relay_command(&command).await;

        if applied {
            if let Some(panel) = self.panels.get_mut(&unit_id) {
                panel.relay_status = to.into();
            }
            self.stats.toggles_applied += 1;
            info!("{} relay -> {}", unit_id, to);
        } else {
            warn!("{} relay left at {} after rejected command", unit_id, from);
        }

        Some(ToggleAttempt {
            unit_id,
            from,
            to,
            applied,
        })
    }
}
