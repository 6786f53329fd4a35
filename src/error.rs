/// Error types for the telemetry client and configuration loading
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request timeout - server not responding")]
    Timeout,

    #[error("connection error - cannot reach server: {0}")]
    Connection(String),

    #[error("API error: status {0}")]
    Status(u16),

    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    #[error("request error: {0}")]
    Request(String),
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ClientError::Timeout
        } else if err.is_connect() {
            ClientError::Connection(err.to_string())
        } else if err.is_decode() {
            ClientError::MalformedPayload(err.to_string())
        } else {
            ClientError::Request(err.to_string())
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid API base '{0}': {1}")]
    InvalidApiBase(String, String),

    #[error("invalid unit entry '{0}', expected ID=Description")]
    InvalidUnits(String),

    #[error("invalid simulated panel '{0}', expected ID=base_voltage:base_current:variation")]
    InvalidPanel(String),

    #[error("{0}")]
    Empty(&'static str),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SelectError {
    #[error("unknown unit '{0}'")]
    UnknownUnit(String),
}
