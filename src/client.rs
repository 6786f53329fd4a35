/// HTTP client for the remote telemetry API
use log::{debug, error};
use reqwest::StatusCode;
use serde::Serialize;
use url::Url;

use crate::config::ApiConfig;
use crate::error::ClientError;
use crate::models::{PanelsPayload, Reading, ReadingPayload, RelayCommand};

/// Operations the dashboard and the simulator need from the telemetry API
///
/// Every call is independent and never mutates local state. Apart from
/// `try_fetch_latest`, failures are reported through logging and surface to
/// callers only as `None`/`false`.
#[allow(async_fn_in_trait)]
pub trait TelemetryApi {
    /// Latest reading for one unit, or the reason there is none
    async fn try_fetch_latest(&self, unit_id: &str) -> Result<Reading, ClientError>;

    /// Latest reading for one unit, `None` on any failure
    async fn fetch_latest(&self, unit_id: &str) -> Option<Reading> {
        match self.try_fetch_latest(unit_id).await {
            Ok(reading) => Some(reading),
            Err(e) => {
                error!("Failed to fetch latest reading for {}: {}", unit_id, e);
                None
            }
        }
    }

    /// Store a reading; true iff the API answered 200
    async fn post_reading(&self, reading: &Reading) -> bool;

    /// Submit a relay command; true iff the API answered 200
    async fn post_relay_command(&self, command: &RelayCommand) -> bool;

    /// Latest reading of every unit the API knows about
    async fn fetch_panels(&self) -> Option<Vec<Reading>>;
}

#[derive(Debug, Clone)]
pub struct HttpTelemetryClient {
    http: reqwest::Client,
    base_url: Url,
}

impl HttpTelemetryClient {
    pub fn new(config: &ApiConfig) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ClientError::Request(e.to_string()))?;

        Ok(HttpTelemetryClient {
            http,
            base_url: config.base_url.clone(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, ClientError> {
        self.base_url
            .join(path)
            .map_err(|e| ClientError::Request(format!("bad endpoint '{}': {}", path, e)))
    }

    /// Liveness check against the API root, returns the HTTP status code
    pub async fn ping(&self) -> Result<u16, ClientError> {
        let response = self.http.get(self.base_url.clone()).send().await?;
        Ok(response.status().as_u16())
    }

    pub async fn try_fetch_panels(&self) -> Result<Vec<Reading>, ClientError> {
        let response = self.http.get(self.endpoint("panels")?).send().await?;
        let status = response.status();
        if status != StatusCode::OK {
            return Err(ClientError::Status(status.as_u16()));
        }

        let body = response.text().await?;
        let payload: PanelsPayload = serde_json::from_str(&body)
            .map_err(|e| ClientError::MalformedPayload(e.to_string()))?;
        if let Some(total) = payload.total_panels {
            debug!("API reports {} panels", total);
        }

        Ok(payload
            .panels
            .into_iter()
            .map(|panel| panel.into_reading(""))
            .collect())
    }

    async fn post_json<T: Serialize>(&self, path: &str, body: &T) -> Result<(), ClientError> {
        let response = self.http.post(self.endpoint(path)?).json(body).send().await?;
        let status = response.status();
        if status != StatusCode::OK {
            let text = response.text().await.unwrap_or_default();
            debug!("POST /{} answered {}: {}", path, status, text);
            return Err(ClientError::Status(status.as_u16()));
        }
        Ok(())
    }
}

impl TelemetryApi for HttpTelemetryClient {
    async fn try_fetch_latest(&self, unit_id: &str) -> Result<Reading, ClientError> {
        let mut url = self.endpoint("monitoring")?;
        url.query_pairs_mut().append_pair("esp_id", unit_id);

        let response = self.http.get(url).send().await?;
        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            debug!("GET /monitoring for {} answered {}: {}", unit_id, status, body);
            return Err(ClientError::Status(status.as_u16()));
        }

        let body = response.text().await?;
        let payload: ReadingPayload = serde_json::from_str(&body)
            .map_err(|e| ClientError::MalformedPayload(e.to_string()))?;

        Ok(payload.into_reading(unit_id))
    }

    async fn post_reading(&self, reading: &Reading) -> bool {
        match self.post_json("monitoring", reading).await {
            Ok(()) => true,
            Err(e) => {
                error!("Failed to store reading for {}: {}", reading.unit_id, e);
                false
            }
        }
    }

    async fn post_relay_command(&self, command: &RelayCommand) -> bool {
        match self.post_json("relay", command).await {
            Ok(()) => true,
            Err(e) => {
                error!(
                    "Relay command {} for {} failed: {}",
                    command.command, command.relay_id, e
                );
                false
            }
        }
    }

    async fn fetch_panels(&self) -> Option<Vec<Reading>> {
        match self.try_fetch_panels().await {
            Ok(panels) => Some(panels),
            Err(e) => {
                error!("Failed to fetch panel overview: {}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RelayAction, RelayStatus};
    use axum::extract::{Query, State};
    use axum::http::StatusCode as AxumStatus;
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::{json, Value};
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    type Received = Arc<Mutex<Vec<Value>>>;

    async fn spawn_stub(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    async fn latest(Query(params): Query<HashMap<String, String>>) -> (AxumStatus, Json<Value>) {
        match params.get("esp_id").map(String::as_str) {
            Some("ESP32-02") => (AxumStatus::OK, Json(json!({"voltage": 10}))),
            Some("ESP32-03") => (
                AxumStatus::OK,
                Json(json!({
                    "esp_id": "ESP32-03",
                    "timestamp": "2025-05-01T10:00:00Z",
                    "voltage": 218.4,
                    "current": 1.204,
                    "power": 262.9,
                    "relay_status": "OFF"
                })),
            ),
            Some("ESP32-04") => (
                AxumStatus::OK,
                Json(json!({
                    "voltage": 229.5,
                    "current": 0.41,
                    "power": 94.1,
                    "relay_status": true
                })),
            ),
            _ => (
                AxumStatus::NOT_FOUND,
                Json(json!({"error": "No sensor data available"})),
            ),
        }
    }

    async fn record(State(received): State<Received>, Json(body): Json<Value>) -> AxumStatus {
        let accepted = body["command"] != "OFF";
        received.lock().unwrap().push(body);
        if accepted {
            AxumStatus::OK
        } else {
            AxumStatus::INTERNAL_SERVER_ERROR
        }
    }

    async fn stub_api() -> (HttpTelemetryClient, Received) {
        let received: Received = Arc::new(Mutex::new(Vec::new()));
        let router = Router::new()
            .route("/", get(|| async { "IoT Power Monitor API Server" }))
            .route("/monitoring", get(latest).post(record))
            .route("/relay", axum::routing::post(record))
            .route(
                "/panels",
                get(|| async {
                    Json(json!({
                        "total_panels": 2,
                        "panels": [
                            {"esp_id": "ESP32-01", "voltage": 229.9, "relay_status": "ON"},
                            {"esp_id": "ESP32-02", "current": 0.8}
                        ]
                    }))
                }),
            )
            .with_state(received.clone());
        let base = spawn_stub(router).await;
        (client_for(&base, Duration::from_secs(3)), received)
    }

    fn client_for(base: &str, timeout: Duration) -> HttpTelemetryClient {
        HttpTelemetryClient::new(&ApiConfig::new(base, timeout).unwrap()).unwrap()
    }

    #[tokio::test]
    async fn not_found_returns_nothing() {
        let (client, _) = stub_api().await;
        assert!(client.fetch_latest("ESP32-99").await.is_none());
        assert!(matches!(
            client.try_fetch_latest("ESP32-99").await,
            Err(ClientError::Status(404))
        ));
    }

    #[tokio::test]
    async fn partial_payload_is_defaulted() {
        let (client, _) = stub_api().await;
        let reading = client.fetch_latest("ESP32-02").await.unwrap();
        assert_eq!(reading.unit_id, "ESP32-02");
        assert_eq!(reading.voltage, 10.0);
        assert_eq!(reading.current, 0.0);
        assert_eq!(reading.power, 0.0);
        assert_eq!(reading.relay_status, RelayStatus::Unknown);
        assert_eq!(reading.timestamp, "");
    }

    #[tokio::test]
    async fn full_payload_is_parsed() {
        let (client, _) = stub_api().await;
        let reading = client.fetch_latest("ESP32-03").await.unwrap();
        assert_eq!(reading.current, 1.204);
        assert_eq!(reading.relay_status, RelayStatus::Off);
        assert_eq!(reading.timestamp, "2025-05-01T10:00:00Z");
    }

    #[tokio::test]
    async fn non_string_relay_status_keeps_reading() {
        let (client, _) = stub_api().await;
        let reading = client.fetch_latest("ESP32-04").await.unwrap();
        assert_eq!(reading.unit_id, "ESP32-04");
        assert_eq!(reading.voltage, 229.5);
        assert_eq!(reading.current, 0.41);
        assert_eq!(reading.power, 94.1);
        assert_eq!(reading.relay_status, RelayStatus::Unknown);
    }

    #[tokio::test]
    async fn relay_post_reports_status() {
        let (client, received) = stub_api().await;
        let on = RelayCommand::new("ESP32-01", RelayAction::On, "DASHBOARD", "dashboard_ESP32-01");
        let off = RelayCommand::new("ESP32-01", RelayAction::Off, "DASHBOARD", "dashboard_ESP32-01");

        assert!(client.post_relay_command(&on).await);
        assert!(!client.post_relay_command(&off).await);

        let received = received.lock().unwrap();
        assert_eq!(received.len(), 2);
        assert_eq!(received[0]["relay_id"], "Relay-ESP32-01");
        assert_eq!(received[0]["command"], "ON");
    }

    #[tokio::test]
    async fn reading_post_sends_wire_shape() {
        let (client, received) = stub_api().await;
        let reading = Reading {
            unit_id: "ESP32-02".into(),
            timestamp: "2025-05-01T10:00:03Z".into(),
            voltage: 226.1,
            current: 0.812,
            power: 183.6,
            relay_status: RelayStatus::On,
        };
        assert!(client.post_reading(&reading).await);
        let received = received.lock().unwrap();
        assert_eq!(received[0]["esp_id"], "ESP32-02");
        assert_eq!(received[0]["power"], 183.6);
    }

    #[tokio::test]
    async fn panels_overview() {
        let (client, _) = stub_api().await;
        let panels = client.fetch_panels().await.unwrap();
        assert_eq!(panels.len(), 2);
        assert_eq!(panels[0].unit_id, "ESP32-01");
        assert_eq!(panels[1].current, 0.8);
        assert_eq!(panels[1].relay_status, RelayStatus::Unknown);
    }

    #[tokio::test]
    async fn ping_reports_status() {
        let (client, _) = stub_api().await;
        assert_eq!(client.ping().await.unwrap(), 200);
    }

    #[tokio::test]
    async fn non_json_body_is_malformed() {
        let router = Router::new().route("/monitoring", get(|| async { "<html>maintenance</html>" }));
        let base = spawn_stub(router).await;
        let client = client_for(&base, Duration::from_secs(3));
        assert!(matches!(
            client.try_fetch_latest("ESP32-01").await,
            Err(ClientError::MalformedPayload(_))
        ));
    }

    #[tokio::test]
    async fn slow_server_times_out() {
        let router = Router::new().route(
            "/monitoring",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(2)).await;
                Json(json!({"voltage": 1}))
            }),
        );
        let base = spawn_stub(router).await;
        let client = client_for(&base, Duration::from_millis(200));
        assert!(matches!(
            client.try_fetch_latest("ESP32-01").await,
            Err(ClientError::Timeout)
        ));
        assert!(client.fetch_latest("ESP32-01").await.is_none());
    }

    #[tokio::test]
    async fn unreachable_server_is_a_connection_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = client_for(&format!("http://{}", addr), Duration::from_secs(3));
        assert!(matches!(client.ping().await, Err(ClientError::Connection(_))));
        assert!(!client.post_reading(&ReadingPayload::default().into_reading("X")).await);
    }
}
