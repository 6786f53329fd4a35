use std::collections::BTreeMap;
use std::env;
use std::time::Duration;

use log::{debug, info};
use url::Url;

use crate::error::ConfigError;
use crate::models::{PanelModel, RelayStatus, UnitInfo, UnitKind};

pub const DEFAULT_API_BASE: &str = "http://127.0.0.1:3002";
pub const DEFAULT_UNITS: &str = "ESP32-01=Real Hardware (PZEM Sensor + Relay),\
ESP32-02=Simulated Panel (225V, 0.8A),\
ESP32-03=Simulated Panel (218V, 1.2A)";
pub const DEFAULT_PANELS: &str = "ESP32-02=225.0:0.8:0.15,ESP32-03=218.0:1.2:0.2";

/// Where and how to reach the telemetry API
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub base_url: Url,
    pub timeout: Duration,
}

impl ApiConfig {
    pub fn new(api_base: &str, timeout: Duration) -> Result<Self, ConfigError> {
        let mut base_url = Url::parse(api_base.trim())
            .map_err(|e| ConfigError::InvalidApiBase(api_base.to_string(), e.to_string()))?;

        if base_url.cannot_be_a_base() || !matches!(base_url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidApiBase(
                api_base.to_string(),
                "expected an http(s) address".to_string(),
            ));
        }

        // Endpoint paths are joined relative to the base
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        base_url.set_query(None);

        Ok(ApiConfig { base_url, timeout })
    }
}

/// Load the unit catalogue from `MONITOR_UNITS`, falling back to defaults
pub fn load_units() -> Result<Vec<UnitInfo>, ConfigError> {
    let units = env::var("MONITOR_UNITS").unwrap_or_else(|_| DEFAULT_UNITS.to_string());
    let panels = load_panels()?;
    parse_units(&units, &panels)
}

/// Load simulated panel models from `SIMULATED_PANELS`, falling back to defaults
pub fn load_panels() -> Result<BTreeMap<String, PanelModel>, ConfigError> {
    let panels = env::var("SIMULATED_PANELS").unwrap_or_else(|_| DEFAULT_PANELS.to_string());
    parse_panels(&panels)
}

/// Parse `ID=Description` pairs separated by commas
///
/// Units that also appear in the simulated panel map are classified as
/// simulated, everything else is real hardware.
pub fn parse_units(
    raw: &str,
    panels: &BTreeMap<String, PanelModel>,
) -> Result<Vec<UnitInfo>, ConfigError> {
    let mut units: Vec<UnitInfo> = Vec::new();

    for pair in raw.split(',') {
        let pair = pair.trim();
        if pair.is_empty() {
            continue;
        }
        let (id, description) = match pair.split_once('=') {
            Some((id, description)) => (id.trim(), description.trim()),
            None => (pair, ""),
        };
        if id.is_empty() {
            return Err(ConfigError::InvalidUnits(pair.to_string()));
        }
        if units.iter().any(|u| u.id == id) {
            debug!("Ignoring duplicate unit '{}'", id);
            continue;
        }

        let kind = if panels.contains_key(id) {
            UnitKind::Simulated
        } else {
            UnitKind::Real
        };
        units.push(UnitInfo {
            id: id.to_string(),
            description: description.to_string(),
            kind,
        });
    }

    if units.is_empty() {
        return Err(ConfigError::Empty(
            "No monitored units configured. Please set MONITOR_UNITS",
        ));
    }

    info!("Total units loaded: {}", units.len());
    Ok(units)
}

/// Parse `ID=base_voltage:base_current:variation` entries separated by commas
pub fn parse_panels(raw: &str) -> Result<BTreeMap<String, PanelModel>, ConfigError> {
    let mut panels = BTreeMap::new();

    for pair in raw.split(',') {
        let pair = pair.trim();
        if pair.is_empty() {
            continue;
        }
        let invalid = || ConfigError::InvalidPanel(pair.to_string());

        let (id, model) = pair.split_once('=').ok_or_else(invalid)?;
        let id = id.trim();
        let fields: Vec<&str> = model.split(':').map(str::trim).collect();
        if id.is_empty() || fields.len() != 3 {
            return Err(invalid());
        }

        // "nan" and "inf" parse as f64 but cannot be sent as JSON numbers
        let parse = |s: &str| match s.parse::<f64>() {
            Ok(value) if value.is_finite() => Ok(value),
            _ => Err(invalid()),
        };
        let base_voltage = parse(fields[0])?;
        let base_current = parse(fields[1])?;
        let variation = parse(fields[2])?;
        if !(0.0..1.0).contains(&variation) || base_voltage < 0.0 || base_current < 0.0 {
            return Err(invalid());
        }

        panels.insert(
            id.to_string(),
            PanelModel {
                base_voltage,
                base_current,
                variation,
                relay_status: RelayStatus::On,
            },
        );
    }

    if panels.is_empty() {
        return Err(ConfigError::Empty(
            "No simulated panels configured. Please set SIMULATED_PANELS",
        ));
    }

    Ok(panels)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_base_gets_trailing_slash() {
        let cfg = ApiConfig::new("http://10.0.0.5:3002/api", Duration::from_secs(3)).unwrap();
        assert_eq!(cfg.base_url.as_str(), "http://10.0.0.5:3002/api/");
        assert_eq!(
            cfg.base_url.join("monitoring").unwrap().as_str(),
            "http://10.0.0.5:3002/api/monitoring"
        );
    }

    #[test]
    fn api_base_rejects_garbage() {
        assert!(ApiConfig::new("not a url", Duration::from_secs(3)).is_err());
        assert!(ApiConfig::new("mailto:ops@example.com", Duration::from_secs(3)).is_err());
    }

    #[test]
    fn default_catalogue_classifies_units() {
        let panels = parse_panels(DEFAULT_PANELS).unwrap();
        let units = parse_units(DEFAULT_UNITS, &panels).unwrap();
        let kinds: Vec<_> = units.iter().map(|u| (u.id.as_str(), u.kind)).collect();
        assert_eq!(
            kinds,
            vec![
                ("ESP32-01", UnitKind::Real),
                ("ESP32-02", UnitKind::Simulated),
                ("ESP32-03", UnitKind::Simulated),
            ]
        );
        assert_eq!(units[0].description, "Real Hardware (PZEM Sensor + Relay)");
    }

    #[test]
    fn panels_seed_relay_on() {
        let panels = parse_panels("ESP32-09 = 230:2.5:0.1").unwrap();
        let model = &panels["ESP32-09"];
        assert_eq!(model.base_voltage, 230.0);
        assert_eq!(model.base_current, 2.5);
        assert_eq!(model.variation, 0.1);
        assert_eq!(model.relay_status, RelayStatus::On);
    }

    #[test]
    fn bad_panel_entries_are_rejected() {
        assert!(parse_panels("ESP32-02=225:0.8").is_err());
        assert!(parse_panels("ESP32-02=abc:0.8:0.1").is_err());
        assert!(parse_panels("ESP32-02=225:0.8:1.5").is_err());
        assert!(parse_panels(" , ").is_err());
    }

    #[test]
    fn non_finite_panel_numbers_are_rejected() {
        assert!(parse_panels("ESP32-02=nan:0.8:0.1").is_err());
        assert!(parse_panels("ESP32-02=225:inf:0.1").is_err());
        assert!(parse_panels("ESP32-02=225:0.8:NaN").is_err());
        assert!(parse_panels("ESP32-02=-inf:0.8:0.1").is_err());
    }

    #[test]
    fn units_without_description_and_duplicates() {
        let panels = BTreeMap::new();
        let units = parse_units("A1, A1=dup, B2=Lab bench", &panels).unwrap();
        assert_eq!(units.len(), 2);
        assert_eq!(units[0].description, "");
        assert_eq!(units[1].kind, UnitKind::Real);
        assert!(parse_units("=nameless", &panels).is_err());
    }
}
