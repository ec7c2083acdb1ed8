//! GUDE power distribution unit control over its HTTP interface

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use setupwatch_api::PortState;
use setupwatch_host_api::{HostError, HostResult, OutletConnector, OutletController};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::http_error;

/// Access settings shared by every GUDE unit
#[derive(Debug, Clone)]
pub struct GudeOptions {
    pub timeout: Duration,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl Default for GudeOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(15),
            username: None,
            password: None,
        }
    }
}

/// Builds [`GudeOutlet`] handles sharing one HTTP client
pub struct GudeConnector {
    client: Client,
    options: GudeOptions,
}

impl GudeConnector {
    pub fn new(options: GudeOptions) -> HostResult<Self> {
        let client = Client::builder()
            .timeout(options.timeout)
            .connect_timeout(options.timeout)
            .build()
            .map_err(|e| HostError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, options })
    }
}

impl OutletConnector for GudeConnector {
    fn connect(&self, address: &str) -> HostResult<Arc<dyn OutletController>> {
        let address = address.trim();
        if address.is_empty() || address.contains(char::is_whitespace) {
            return Err(HostError::Outlet(format!("invalid outlet address '{}'", address)));
        }

        let base_url = if address.starts_with("http://") || address.starts_with("https://") {
            address.trim_end_matches('/').to_string()
        } else {
            format!("http://{}", address)
        };

        Ok(Arc::new(GudeOutlet {
            client: self.client.clone(),
            address: address.to_string(),
            base_url,
            options: self.options.clone(),
        }))
    }
}

/// One GUDE unit
pub struct GudeOutlet {
    client: Client,
    address: String,
    base_url: String,
    options: GudeOptions,
}

impl GudeOutlet {
    fn get(&self, path_and_query: &str) -> reqwest::RequestBuilder {
        let request = self.client.get(format!("{}{}", self.base_url, path_and_query));
        match &self.options.username {
            Some(user) => request.basic_auth(user, self.options.password.as_ref()),
            None => request,
        }
    }
}

#[async_trait]
impl OutletController for GudeOutlet {
    fn address(&self) -> &str {
        &self.address
    }

    async fn port_state(&self, port: u16) -> HostResult<PortState> {
        let status: Value = self
            .get("/statusjsn.js?components=1")
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| http_error("outlet status", e))?
            .json()
            .await
            .map_err(|e| HostError::Outlet(format!("bad status document: {}", e)))?;

        port_state_from_status(&status, port)
    }

    async fn power_off(&self, port: u16) -> HostResult<()> {
        self.get(&switch_path(port, false))
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| http_error("outlet switch", e))?;

        debug!(outlet = %self.address, port, "Outlet port switched off");
        Ok(())
    }
}

/// Query path that switches a port
pub fn switch_path(port: u16, on: bool) -> String {
    format!("/ov.html?cmd=1&p={}&s={}", port, u8::from(on))
}

/// Read a port's state from a `statusjsn.js` document. Ports count from 1.
pub fn port_state_from_status(status: &Value, port: u16) -> HostResult<PortState> {
    let index = usize::from(port)
        .checked_sub(1)
        .ok_or_else(|| HostError::Outlet("port numbers start at 1".into()))?;

    let state = status
        .get("outputs")
        .and_then(|outputs| outputs.get(index))
        .and_then(|output| output.get("state"))
        .and_then(Value::as_u64)
        .ok_or_else(|| HostError::Outlet(format!("port {} missing from status", port)))?;

    Ok(if state == 0 { PortState::Off } else { PortState::On })
}
