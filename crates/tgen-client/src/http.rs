//! JSON REST controller client.
//!
//! Endpoints:
//! - `POST /config`: apply a topology
//! - `POST /monitor/metrics`: port / flow / BGPv4 counters
//! - `POST /monitor/states`: learned-prefix state
//! - `POST /control/state`: protocol, traffic, and link commands

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tgen_common::protocol::{
    ApiErrorBody, ControlCommand, MetricsRequest, MetricsResponse, StatesRequest, StatesResponse,
    WarningsResponse,
};

use crate::{ClientError, Controller};

/// Where and how to reach the controller.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Base URL, e.g. `https://127.0.0.1:8443`. A bare `host:port` is
    /// treated as HTTPS.
    pub location: String,
    /// Verify the controller's TLS certificate. Lab controllers usually
    /// run with self-signed certificates, so this defaults to off.
    pub verify_tls: bool,
    /// Client-side bound on each request.
    pub request_timeout: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            location: "https://127.0.0.1:8443".into(),
            verify_tls: false,
            request_timeout: Duration::from_secs(30),
        }
    }
}

pub struct HttpController {
    client: reqwest::Client,
    base: String,
}

impl HttpController {
    pub fn new(config: &ControllerConfig) -> Result<Self, ClientError> {
        let base = normalize_location(&config.location)?;
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .danger_accept_invalid_certs(!config.verify_tls)
            .build()?;
        tracing::debug!(base = %base, verify_tls = config.verify_tls, "controller client ready");
        Ok(Self { client, base })
    }

    pub fn base_url(&self) -> &str {
        &self.base
    }

    async fn post<T: DeserializeOwned>(&self, path: &str, body: &Value) -> Result<T, ClientError> {
        let url = format!("{}{}", self.base, path);
        tracing::trace!(%url, "POST");
        let resp = self.client.post(&url).json(body).send().await?;
        let status = resp.status();
        let bytes = resp.bytes().await?;

        if !status.is_success() {
            let mut err: ApiErrorBody = serde_json::from_slice(&bytes).unwrap_or_default();
            if err.errors.is_empty() {
                let text = String::from_utf8_lossy(&bytes).trim().to_string();
                if !text.is_empty() {
                    err.errors.push(text);
                }
            }
            return Err(ClientError::Api {
                status: status.as_u16(),
                kind: err.kind,
                errors: err.errors,
            });
        }

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(serde_json::from_str::<T>("{}")?);
        }
        Ok(serde_json::from_slice(&bytes)?)
    }
}

impl Controller for HttpController {
    async fn set_config(&self, config: &Value) -> Result<Vec<String>, ClientError> {
        let resp: WarningsResponse = self.post("/config", config).await?;
        for w in &resp.warnings {
            tracing::warn!(warning = %w, "controller warning on config apply");
        }
        Ok(resp.warnings)
    }

    async fn get_metrics(&self, request: &MetricsRequest) -> Result<MetricsResponse, ClientError> {
        self.post("/monitor/metrics", &request.to_wire()).await
    }

    async fn get_states(&self, request: &StatesRequest) -> Result<StatesResponse, ClientError> {
        self.post("/monitor/states", &request.to_wire()).await
    }

    async fn set_control_state(
        &self,
        command: &ControlCommand,
    ) -> Result<Vec<String>, ClientError> {
        let resp: WarningsResponse = self.post("/control/state", &command.to_wire()).await?;
        for w in &resp.warnings {
            tracing::warn!(warning = %w, %command, "controller warning on command");
        }
        Ok(resp.warnings)
    }
}

/// Turn a configured location into a base URL without a trailing slash.
fn normalize_location(location: &str) -> Result<String, ClientError> {
    let trimmed = location.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(ClientError::Location(location.to_string()));
    }
    let url = if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else if trimmed.contains("://") {
        return Err(ClientError::Location(location.to_string()));
    } else {
        format!("https://{trimmed}")
    };
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_locations() {
        assert_eq!(
            normalize_location("https://172.18.0.63:8443/").unwrap(),
            "https://172.18.0.63:8443"
        );
        assert_eq!(
            normalize_location("clab-lab-04-ixia-c:8443").unwrap(),
            "https://clab-lab-04-ixia-c:8443"
        );
        assert_eq!(
            normalize_location("http://localhost:8080").unwrap(),
            "http://localhost:8080"
        );
        assert!(normalize_location("   ").is_err());
        assert!(normalize_location("grpc://172.18.0.62:40051").is_err());
    }
}
