//! Raw configuration schema (as parsed from TOML)

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Raw configuration as parsed from TOML
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawConfig {
    /// Config schema version
    pub config_version: u32,

    /// Loop and report settings
    #[serde(default)]
    pub service: RawServiceConfig,

    /// Reachability and remote shell timeouts
    #[serde(default)]
    pub probe: RawProbeConfig,

    /// Idle thresholds for powering off
    #[serde(default)]
    pub policy: RawPolicyConfig,

    /// Outlet unit access
    #[serde(default)]
    pub outlet: RawOutletConfig,

    /// Optional second document holding more client-name → person mappings
    pub usernames_file: Option<PathBuf>,

    /// Client machine name → person name
    #[serde(default)]
    pub usernames: BTreeMap<String, String>,

    /// Monitored workstations, in report order
    #[serde(default)]
    pub hosts: Vec<RawHost>,
}

/// Service-level settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawServiceConfig {
    /// Sleep between cycles, in seconds (default: 5)
    pub period_seconds: Option<u64>,

    /// Upper bound on hosts polled at once (default: 32)
    pub max_concurrent_polls: Option<usize>,

    /// Where the HTML report is written
    pub report_path: Option<PathBuf>,

    /// Report page title
    pub report_title: Option<String>,

    /// Decide and log, but never switch outlets
    #[serde(default)]
    pub dry_run: bool,
}

/// Probe timeouts
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawProbeConfig {
    pub ping_timeout_ms: Option<u64>,
    pub connect_timeout_seconds: Option<u64>,
    pub read_timeout_seconds: Option<u64>,
    pub operation_timeout_seconds: Option<u64>,
    pub winrm_port: Option<u16>,
    pub accept_invalid_certs: Option<bool>,
}

/// Power-off thresholds in idle minutes
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawPolicyConfig {
    pub disconnected_idle_minutes: Option<u32>,
    pub active_idle_minutes: Option<u32>,
}

/// Outlet unit settings shared by all bindings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawOutletConfig {
    /// Outlet unit model (default: "gude")
    pub model: Option<String>,
    pub timeout_seconds: Option<u64>,
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Raw workstation definition
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawHost {
    /// Network address (also the host's identity)
    pub address: String,

    /// Remote shell login
    #[serde(default)]
    pub login: String,

    /// Remote shell password
    #[serde(default)]
    pub password: String,

    /// Display label for reports
    pub label: Option<String>,

    /// Outlet bindings as "<outlet address>,<port>"
    #[serde(default)]
    pub outlets: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_host_entry() {
        let toml_str = r#"
            config_version = 1

            [[hosts]]
            address = "10.0.0.21"
            login = "labuser"
            password = "secret"
            outlets = ["10.0.0.5, 3", "10.0.0.5,4"]
        "#;

        let config: RawConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.hosts.len(), 1);
        assert_eq!(config.hosts[0].address, "10.0.0.21");
        assert_eq!(config.hosts[0].outlets.len(), 2);
        assert!(!config.service.dry_run);
    }

    #[test]
    fn parse_usernames_table() {
        let toml_str = r#"
            config_version = 1

            [usernames]
            "WS-ALICE" = "Alice"
            WS-BOB = "Bob"
        "#;

        let config: RawConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.usernames.get("WS-ALICE").map(String::as_str), Some("Alice"));
        assert_eq!(config.usernames.get("WS-BOB").map(String::as_str), Some("Bob"));
    }
}
