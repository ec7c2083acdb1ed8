//! Per-host and fleet-wide poll results

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use setupwatch_util::{CycleId, HostId};
use std::time::Duration;

use crate::{HostFault, IdleBucket, Occupancy, PortState, ResolvedUser};

/// Result of polling one host for one cycle.
///
/// Built once by the host's poll task and never mutated afterwards.
/// `ports` is aligned index-for-index with the host's outlet bindings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostSnapshot {
    pub host: HostId,

    /// Display label (falls back to the address)
    pub label: Option<String>,

    pub reachable: bool,
    pub occupancy: Occupancy,
    pub idle: IdleBucket,
    pub user: ResolvedUser,

    /// Port states as observed before any switching this cycle
    pub ports: Vec<PortState>,

    /// Binding indices that were switched off this cycle
    #[serde(default)]
    pub powered_off: Vec<usize>,

    /// What degraded this snapshot, if anything
    pub fault: Option<HostFault>,

    pub captured_at: DateTime<Local>,
}

impl HostSnapshot {
    /// Snapshot for a host that could not be classified this cycle.
    /// No outlet was queried, so every port is `Unknown`.
    pub fn offline(
        host: HostId,
        label: Option<String>,
        port_count: usize,
        fault: HostFault,
        captured_at: DateTime<Local>,
    ) -> Self {
        Self {
            host,
            label,
            reachable: false,
            occupancy: Occupancy::Offline,
            idle: IdleBucket::Offline,
            user: ResolvedUser::Offline,
            ports: vec![PortState::Unknown; port_count],
            powered_off: Vec::new(),
            fault: Some(fault),
            captured_at,
        }
    }

    /// Label shown in reports
    pub fn display_name(&self) -> &str {
        self.label.as_deref().unwrap_or(self.host.as_str())
    }

    pub fn is_offline(&self) -> bool {
        self.occupancy.is_offline()
    }
}

/// The ordered result of one complete poll cycle, one row per configured
/// host in configuration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FleetSnapshot {
    pub cycle_id: CycleId,
    pub started_at: DateTime<Local>,
    pub elapsed: Duration,
    pub hosts: Vec<HostSnapshot>,
}

impl FleetSnapshot {
    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    pub fn offline_count(&self) -> usize {
        self.hosts.iter().filter(|h| h.is_offline()).count()
    }

    /// Total number of outlet ports switched off during the cycle
    pub fn power_off_count(&self) -> usize {
        self.hosts.iter().map(|h| h.powered_off.len()).sum()
    }
}
