/// Poll tick logic for the power dashboard
///
/// `Dashboard` owns the per-unit histories and a telemetry client. The
/// driver calls `on_tick` on a fixed period and renders whatever comes back;
/// unit switches happen between ticks.
use log::{debug, info, warn};
use time::OffsetDateTime;

use crate::client::TelemetryApi;
use crate::error::{ConfigError, SelectError};
use crate::history::{HistoryStore, HistorySummary};
use crate::models::{Reading, RelayAction, RelayCommand, UnitInfo, UnitKind};

pub const RELAY_REASON: &str = "DASHBOARD";

/// What the renderer should show after a tick
#[derive(Debug, Clone, PartialEq)]
pub enum RenderState {
    Live(LiveView),
    /// `reason` says why the fetch failed, for instance a timeout
    NoData { unit: UnitInfo, reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct LiveView {
    pub unit: UnitInfo,
    pub reading: Reading,
    pub summary: Option<HistorySummary>,
    pub history: Vec<Reading>,
    pub updated_at: OffsetDateTime,
}

/// Result of an operator relay action
#[derive(Debug, Clone, PartialEq)]
pub struct RelayOutcome {
    pub unit: UnitInfo,
    pub command: RelayAction,
    pub accepted: bool,
}

impl RelayOutcome {
    pub fn message(&self) -> String {
        let mut message = if self.accepted {
            format!("Relay {} command sent to {}", self.command, self.unit.id)
        } else {
            format!(
                "Relay {} command for {} was not accepted by the server",
                self.command, self.unit.id
            )
        };
        if self.unit.kind == UnitKind::Simulated {
            message.push_str(&format!(
                " (note: {} is simulated, no physical relay will switch)",
                self.unit.id
            ));
        }
        message
    }
}

/// The command a dashboard operator sends for `unit`
pub fn relay_request(unit: &UnitInfo, command: RelayAction) -> RelayCommand {
    let initiated_by = format!("dashboard_{}", unit.id);
    RelayCommand::new(&unit.id, command, RELAY_REASON, &initiated_by)
}

/// Post a relay command for `unit`
///
/// Takes the unit by value so the request can run on its own while the
/// dashboard keeps polling.
pub async fn submit_relay<A: TelemetryApi>(
    api: &A,
    unit: UnitInfo,
    command: RelayAction,
) -> RelayOutcome {
    let accepted = api.post_relay_command(&relay_request(&unit, command)).await;
    if accepted {
        info!("Relay {} command sent to {}", command, unit.id);
    }

    RelayOutcome {
        unit,
        command,
        accepted,
    }
}

pub struct Dashboard<A> {
    api: A,
    units: Vec<UnitInfo>,
    selected: usize,
    history: HistoryStore,
}

impl<A: TelemetryApi> Dashboard<A> {
    /// The first unit is selected initially
    pub fn new(
        api: A,
        units: Vec<UnitInfo>,
        history: HistoryStore,
    ) -> Result<Self, ConfigError> {
        if units.is_empty() {
            return Err(ConfigError::Empty("dashboard needs at least one unit"));
        }
        Ok(Dashboard {
            api,
            units,
            selected: 0,
            history,
        })
    }

    pub fn units(&self) -> &[UnitInfo] {
        &self.units
    }

    pub fn selected(&self) -> &UnitInfo {
        &self.units[self.selected]
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    /// Switch the displayed unit. Histories of other units are kept as they are.
    pub fn select_unit(&mut self, unit_id: &str) -> Result<&UnitInfo, SelectError> {
        let index = self
            .units
            .iter()
            .position(|u| u.id.eq_ignore_ascii_case(unit_id))
            .ok_or_else(|| SelectError::UnknownUnit(unit_id.to_string()))?;

        self.selected = index;
        info!("Currently monitoring: {}", self.units[index].id);
        Ok(&self.units[index])
    }

    /// One poll: fetch, record, summarise
    pub async fn on_tick(&mut self, now: OffsetDateTime) -> RenderState {
        let unit = self.selected().clone();

        let reading = match self.api.try_fetch_latest(&unit.id).await {
            Ok(reading) => reading,
            Err(e) => {
                warn!("No data available from server for {}: {}", unit.id, e);
                return RenderState::NoData {
                    unit,
                    reason: e.to_string(),
                };
            }
        };

        debug!(
            "Reading for {}: V={:.1} I={:.3} P={:.1} relay={}",
            unit.id, reading.voltage, reading.current, reading.power, reading.relay_status
        );
        self.history.append(&unit.id, reading.clone());

        RenderState::Live(LiveView {
            summary: self.history.summary(&unit.id),
            history: self.history.readings(&unit.id).cloned().collect(),
            unit,
            reading,
            updated_at: now,
        })
    }

    /// Send ON/OFF to the selected unit's relay
    pub async fn send_relay(&self, command: RelayAction) -> RelayOutcome {
        submit_relay(&self.api, self.selected().clone(), command).await
    }
}
