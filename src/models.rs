use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;

/// Relay state reported by a unit. Anything the API sends that is not
/// `ON` or `OFF` is treated as `UNKNOWN`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RelayStatus {
    On,
    Off,
    #[default]
    #[serde(other)]
    Unknown,
}

impl RelayStatus {
    /// Map whatever JSON value the API sent. Only the strings `ON` and `OFF`
    /// are recognised.
    fn from_value(value: &Value) -> Self {
        match value.as_str() {
            Some(s) if s.eq_ignore_ascii_case("ON") => RelayStatus::On,
            Some(s) if s.eq_ignore_ascii_case("OFF") => RelayStatus::Off,
            _ => RelayStatus::Unknown,
        }
    }
}

impl fmt::Display for RelayStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.pad(match self {
            RelayStatus::On => "ON",
            RelayStatus::Off => "OFF",
            RelayStatus::Unknown => "UNKNOWN",
        })
    }
}

/// What a relay can be told to do. Unlike `RelayStatus` there is no
/// unknown case, the API rejects anything but `ON` and `OFF`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RelayAction {
    On,
    Off,
}

impl RelayAction {
    /// The action that flips a relay currently in `status`. An unknown relay
    /// is switched on.
    pub fn toggle_from(status: RelayStatus) -> Self {
        match status {
            RelayStatus::On => RelayAction::Off,
            RelayStatus::Off | RelayStatus::Unknown => RelayAction::On,
        }
    }
}

impl From<RelayAction> for RelayStatus {
    fn from(action: RelayAction) -> Self {
        match action {
            RelayAction::On => RelayStatus::On,
            RelayAction::Off => RelayStatus::Off,
        }
    }
}

impl fmt::Display for RelayAction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(&RelayStatus::from(*self), f)
    }
}

/// One timestamped sample from a power-monitoring unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    #[serde(rename = "esp_id")]
    pub unit_id: String,
    pub timestamp: String,
    pub voltage: f64,
    pub current: f64,
    pub power: f64,
    pub relay_status: RelayStatus,
}

/// Lenient shape of a reading as returned by the API. Every field may be
/// missing, null or of the wrong JSON type; `into_reading` fills in defaults
/// so one odd field never throws away the rest of the reading.
#[derive(Debug, Default, Deserialize)]
pub struct ReadingPayload {
    #[serde(default, deserialize_with = "lenient_string")]
    pub esp_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub timestamp: Option<String>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub voltage: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub current: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub power: Option<f64>,
    #[serde(default, deserialize_with = "lenient_relay")]
    pub relay_status: Option<RelayStatus>,
}

fn lenient_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::String(s) => Some(s),
        _ => None,
    })
}

/// Numbers, and numeric strings such as `"229.5"`
fn lenient_number<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok().filter(|v: &f64| v.is_finite()),
        _ => None,
    })
}

fn lenient_relay<'de, D: Deserializer<'de>>(d: D) -> Result<Option<RelayStatus>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Null => None,
        other => Some(RelayStatus::from_value(&other)),
    })
}

impl ReadingPayload {
    pub fn into_reading(self, fallback_unit: &str) -> Reading {
        Reading {
            unit_id: self.esp_id.unwrap_or_else(|| fallback_unit.to_string()),
            timestamp: self.timestamp.unwrap_or_default(),
            voltage: self.voltage.unwrap_or_default(),
            current: self.current.unwrap_or_default(),
            power: self.power.unwrap_or_default(),
            relay_status: self.relay_status.unwrap_or_default(),
        }
    }
}

/// Body of `GET /panels`
#[derive(Debug, Default, Deserialize)]
pub struct PanelsPayload {
    #[serde(default)]
    pub total_panels: Option<u32>,
    #[serde(default)]
    pub panels: Vec<ReadingPayload>,
}

/// Command accepted by `POST /relay`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelayCommand {
    pub relay_id: String,
    pub command: RelayAction,
    pub reason: String,
    pub initiated_by: String,
}

impl RelayCommand {
    pub fn new(unit_id: &str, command: RelayAction, reason: &str, initiated_by: &str) -> Self {
        RelayCommand {
            relay_id: format!("Relay-{}", unit_id),
            command,
            reason: reason.to_string(),
            initiated_by: initiated_by.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitKind {
    Real,
    Simulated,
}

/// A monitored unit as listed in the dashboard's selector
#[derive(Debug, Clone, PartialEq)]
pub struct UnitInfo {
    pub id: String,
    pub description: String,
    pub kind: UnitKind,
}

/// Statistical model for a simulated panel
#[derive(Debug, Clone, PartialEq)]
pub struct PanelModel {
    pub base_voltage: f64,
    pub base_current: f64,
    pub variation: f64,
    pub relay_status: RelayStatus,
}
