use serde::{Deserialize, Serialize};

/// Output encoding of log lines
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

/// Configuration for telemetry initialization
#[derive(Clone, Debug)]
pub struct TelemetryConfig {
    pub service_name: String,
    pub log_level: String,
    pub log_format: LogFormat,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "unknown-service".to_string(),
            log_level: "info".to_string(),
            log_format: LogFormat::Json,
        }
    }
}
