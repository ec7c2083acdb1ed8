//! Validated fleet structures

use crate::schema::{RawConfig, RawHost, RawOutletConfig, RawPolicyConfig, RawProbeConfig, RawServiceConfig};
use crate::validation::{parse_outlet_binding, validate_host};
use setupwatch_util::HostId;
use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

/// Immutable fleet definition used by the poll loop
#[derive(Debug, Clone)]
pub struct Fleet {
    pub service: ServiceConfig,
    pub probe: ProbeConfig,
    pub thresholds: IdleThresholds,
    pub outlet: OutletConfig,
    pub usernames: UsernameMap,

    /// Hosts in configuration (and report) order
    pub hosts: Vec<HostConfig>,
}

impl Fleet {
    /// Convert from raw config (after global validation).
    ///
    /// Host-scoped problems are logged and the offending binding or host
    /// is dropped; they never fail the whole load. A repeated address keeps
    /// its first entry.
    pub fn from_raw(raw: RawConfig) -> Self {
        let mut seen = HashSet::new();
        let hosts = raw
            .hosts
            .into_iter()
            .filter_map(HostConfig::from_raw)
            .filter(|host| {
                let first = seen.insert(host.id.clone());
                if !first {
                    warn!(host = %host.id, "Ignoring duplicate host entry");
                }
                first
            })
            .collect();

        Self {
            service: ServiceConfig::from_raw(raw.service),
            probe: ProbeConfig::from_raw(raw.probe),
            thresholds: IdleThresholds::from_raw(raw.policy),
            outlet: OutletConfig::from_raw(raw.outlet),
            usernames: UsernameMap::new(raw.usernames),
            hosts,
        }
    }

    /// Distinct outlet addresses referenced by any host, sorted
    pub fn outlet_addresses(&self) -> Vec<String> {
        let mut addresses: Vec<String> = self
            .hosts
            .iter()
            .flat_map(|h| h.outlets.iter().map(|o| o.address.clone()))
            .collect();
        addresses.sort();
        addresses.dedup();
        addresses
    }
}

/// Loop and report settings
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Sleep after each completed cycle
    pub period: Duration,
    pub max_concurrent_polls: usize,
    pub report_path: PathBuf,
    pub report_title: String,
    pub dry_run: bool,
}

impl ServiceConfig {
    fn from_raw(raw: RawServiceConfig) -> Self {
        let defaults = Self::default();
        Self {
            period: raw.period_seconds.map(Duration::from_secs).unwrap_or(defaults.period),
            max_concurrent_polls: raw
                .max_concurrent_polls
                .unwrap_or(defaults.max_concurrent_polls),
            report_path: raw.report_path.unwrap_or(defaults.report_path),
            report_title: raw.report_title.unwrap_or(defaults.report_title),
            dry_run: raw.dry_run,
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            period: Duration::from_secs(5),
            max_concurrent_polls: 32,
            report_path: setupwatch_util::default_report_path(),
            report_title: "Setup Monitor".into(),
            dry_run: false,
        }
    }
}

/// Reachability and remote shell timeouts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeConfig {
    pub ping_timeout: Duration,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    pub operation_timeout: Duration,
    pub winrm_port: u16,
    pub accept_invalid_certs: bool,
}

impl ProbeConfig {
    fn from_raw(raw: RawProbeConfig) -> Self {
        let defaults = Self::default();
        Self {
            ping_timeout: raw
                .ping_timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.ping_timeout),
            connect_timeout: raw
                .connect_timeout_seconds
                .map(Duration::from_secs)
                .unwrap_or(defaults.connect_timeout),
            read_timeout: raw
                .read_timeout_seconds
                .map(Duration::from_secs)
                .unwrap_or(defaults.read_timeout),
            operation_timeout: raw
                .operation_timeout_seconds
                .map(Duration::from_secs)
                .unwrap_or(defaults.operation_timeout),
            winrm_port: raw.winrm_port.unwrap_or(defaults.winrm_port),
            accept_invalid_certs: raw
                .accept_invalid_certs
                .unwrap_or(defaults.accept_invalid_certs),
        }
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            ping_timeout: Duration::from_secs(1),
            connect_timeout: Duration::from_secs(15),
            read_timeout: Duration::from_secs(4),
            operation_timeout: Duration::from_secs(2),
            winrm_port: 5986,
            accept_invalid_certs: true,
        }
    }
}

/// Idle minutes after which a workstation's outlets are cut
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdleThresholds {
    /// Disconnected sessions idle strictly longer than this are powered off
    pub disconnected_minutes: u32,
    /// Active sessions idle strictly longer than this are powered off
    pub active_minutes: u32,
}

impl IdleThresholds {
    fn from_raw(raw: RawPolicyConfig) -> Self {
        let defaults = Self::default();
        Self {
            disconnected_minutes: raw
                .disconnected_idle_minutes
                .unwrap_or(defaults.disconnected_minutes),
            active_minutes: raw.active_idle_minutes.unwrap_or(defaults.active_minutes),
        }
    }
}

impl Default for IdleThresholds {
    fn default() -> Self {
        Self {
            disconnected_minutes: 10,
            active_minutes: 50,
        }
    }
}

/// Supported outlet unit models
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutletModel {
    Gude,
}

/// Outlet unit access settings
#[derive(Debug, Clone)]
pub struct OutletConfig {
    pub model: OutletModel,
    pub timeout: Duration,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl OutletConfig {
    fn from_raw(raw: RawOutletConfig) -> Self {
        Self {
            // Validation has already rejected unknown models
            model: OutletModel::Gude,
            timeout: raw
                .timeout_seconds
                .map(Duration::from_secs)
                .unwrap_or(Duration::from_secs(15)),
            username: raw.username,
            password: raw.password,
        }
    }
}

impl Default for OutletConfig {
    fn default() -> Self {
        Self::from_raw(RawOutletConfig::default())
    }
}

/// Client machine name → person name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UsernameMap(BTreeMap<String, String>);

impl UsernameMap {
    pub fn new(map: BTreeMap<String, String>) -> Self {
        Self(map)
    }

    pub fn resolve(&self, client_name: &str) -> Option<&str> {
        self.0.get(client_name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for UsernameMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// One switched outlet port feeding a workstation
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OutletBinding {
    pub address: String,
    pub port: u16,
}

impl OutletBinding {
    pub fn new(address: impl Into<String>, port: u16) -> Self {
        Self {
            address: address.into(),
            port,
        }
    }
}

/// Validated workstation definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostConfig {
    pub id: HostId,
    pub label: Option<String>,
    pub login: String,
    pub password: String,
    /// Fixed for the lifetime of this config
    pub outlets: Vec<OutletBinding>,
}

impl HostConfig {
    fn from_raw(raw: RawHost) -> Option<Self> {
        for problem in validate_host(&raw) {
            warn!(error = %problem, "Ignoring invalid host configuration");
        }

        let address = raw.address.trim();
        if address.is_empty() {
            return None;
        }

        let outlets = raw
            .outlets
            .iter()
            .filter_map(|value| parse_outlet_binding(value).ok())
            .map(|(address, port)| OutletBinding { address, port })
            .collect();

        Some(Self {
            id: HostId::new(address),
            label: raw.label,
            login: raw.login,
            password: raw.password,
            outlets,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_host(address: &str, outlets: &[&str]) -> RawHost {
        RawHost {
            address: address.into(),
            login: "labuser".into(),
            password: "secret".into(),
            label: None,
            outlets: outlets.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn defaults_match_documented_constants() {
        let probe = ProbeConfig::default();
        assert_eq!(probe.ping_timeout, Duration::from_secs(1));
        assert_eq!(probe.connect_timeout, Duration::from_secs(15));
        assert_eq!(probe.read_timeout, Duration::from_secs(4));
        assert_eq!(probe.operation_timeout, Duration::from_secs(2));

        let thresholds = IdleThresholds::default();
        assert_eq!(thresholds.disconnected_minutes, 10);
        assert_eq!(thresholds.active_minutes, 50);

        assert_eq!(ServiceConfig::default().period, Duration::from_secs(5));
    }

    #[test]
    fn malformed_bindings_are_dropped() {
        let host = HostConfig::from_raw(raw_host("10.0.0.21", &["10.0.0.5, 3", "broken", "10.0.0.6,1"]))
            .unwrap();
        assert_eq!(
            host.outlets,
            vec![OutletBinding::new("10.0.0.5", 3), OutletBinding::new("10.0.0.6", 1)]
        );
    }

    #[test]
    fn empty_address_drops_host() {
        assert!(HostConfig::from_raw(raw_host("  ", &[])).is_none());
    }

    #[test]
    fn outlet_addresses_are_distinct() {
        let fleet = Fleet {
            service: Default::default(),
            probe: Default::default(),
            thresholds: Default::default(),
            outlet: Default::default(),
            usernames: Default::default(),
            hosts: vec![
                HostConfig::from_raw(raw_host("a", &["10.0.0.6,1", "10.0.0.5,2"])).unwrap(),
                HostConfig::from_raw(raw_host("b", &["10.0.0.5,3"])).unwrap(),
            ],
        };
        assert_eq!(fleet.outlet_addresses(), vec!["10.0.0.5", "10.0.0.6"]);
    }

    #[test]
    fn duplicate_address_keeps_first_entry() {
        let mut second = raw_host("10.0.0.21", &["10.0.0.6,4"]);
        second.label = Some("Bench 3".into());
        let raw = RawConfig {
            config_version: 1,
            service: Default::default(),
            probe: Default::default(),
            policy: Default::default(),
            outlet: Default::default(),
            usernames_file: None,
            usernames: Default::default(),
            hosts: vec![
                raw_host("10.0.0.21", &["10.0.0.5,1"]),
                raw_host("10.0.0.22", &[]),
                second,
            ],
        };

        let fleet = Fleet::from_raw(raw);
        let ids: Vec<&str> = fleet.hosts.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["10.0.0.21", "10.0.0.22"]);
        assert_eq!(fleet.hosts[0].outlets, vec![OutletBinding::new("10.0.0.5", 1)]);
        assert_eq!(fleet.hosts[0].label, None);
    }

    #[test]
    fn username_map_resolves() {
        let map: UsernameMap = [("WS-ALICE", "Alice")].into_iter().collect();
        assert_eq!(map.resolve("WS-ALICE"), Some("Alice"));
        assert_eq!(map.resolve("WS-BOB"), None);
        assert_eq!(map.len(), 1);
    }
}
