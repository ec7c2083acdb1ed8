//! Per-host poll cycle

use setupwatch_api::{HostFault, HostSnapshot, PortState};
use setupwatch_config::{Fleet, HostConfig};
use std::sync::Arc;
use tracing::{info, warn};

use crate::{decide, try_classify, OutletRegistry, ProbeOutcome, SessionProber};

/// Everything a poll task needs for one loaded fleet.
///
/// Shared read-only by all poll tasks; replaced as a whole on reload.
pub struct HostPoller {
    fleet: Arc<Fleet>,
    prober: SessionProber,
    outlets: OutletRegistry,
}

impl HostPoller {
    pub fn new(fleet: Arc<Fleet>, prober: SessionProber, outlets: OutletRegistry) -> Self {
        Self {
            fleet,
            prober,
            outlets,
        }
    }

    pub fn fleet(&self) -> &Arc<Fleet> {
        &self.fleet
    }

    /// Poll one host: probe, classify, read outlets, decide, switch.
    ///
    /// Always yields exactly one snapshot; no failure escapes.
    pub async fn poll_host(&self, host: &HostConfig) -> HostSnapshot {
        let classification = match self.prober.probe(host).await {
            ProbeOutcome::Unreachable => return self.offline(host, HostFault::Unreachable),
            ProbeOutcome::SessionFailed(message) => {
                return self.offline(host, HostFault::Session(message));
            }
            ProbeOutcome::Queried(raw) => match try_classify(&raw, &self.fleet.usernames) {
                Ok(classification) => classification,
                Err(e) => {
                    warn!(host = %host.id, error = %e, "Could not classify session output");
                    return self.offline(host, HostFault::Parse(e.to_string()));
                }
            },
        };

        let mut outlet_errors = Vec::new();
        let ports = self.read_ports(host, &mut outlet_errors).await;

        let mut powered_off = Vec::new();
        if decide(
            &self.fleet.thresholds,
            classification.occupancy,
            &classification.idle,
            &ports,
        ) {
            for (index, binding) in host.outlets.iter().enumerate() {
                if !ports[index].is_on() {
                    continue;
                }

                if self.fleet.service.dry_run {
                    info!(
                        host = %host.id,
                        outlet = %binding.address,
                        port = binding.port,
                        idle = %classification.idle,
                        "Dry run: would power off outlet"
                    );
                    continue;
                }

                let result = match self.outlets.get(&binding.address) {
                    Ok(handle) => handle.power_off(binding.port).await.map_err(|e| e.to_string()),
                    Err(reason) => Err(reason),
                };

                match result {
                    Ok(()) => {
                        info!(
                            host = %host.id,
                            outlet = %binding.address,
                            port = binding.port,
                            occupancy = ?classification.occupancy,
                            idle = %classification.idle,
                            "Powered off idle workstation outlet"
                        );
                        powered_off.push(index);
                    }
                    Err(e) => {
                        warn!(
                            host = %host.id,
                            outlet = %binding.address,
                            port = binding.port,
                            error = %e,
                            "Failed to power off outlet"
                        );
                        outlet_errors.push(format!("{}#{}: {}", binding.address, binding.port, e));
                    }
                }
            }
        }

        let fault = if outlet_errors.is_empty() {
            None
        } else {
            Some(HostFault::Outlet(outlet_errors.join("; ")))
        };

        HostSnapshot {
            host: host.id.clone(),
            label: host.label.clone(),
            reachable: true,
            occupancy: classification.occupancy,
            idle: classification.idle,
            user: classification.user,
            ports,
            powered_off,
            fault,
            captured_at: setupwatch_util::now(),
        }
    }

    /// Offline snapshot for a host whose poll task died
    pub fn aborted(&self, host: &HostConfig) -> HostSnapshot {
        self.offline(host, HostFault::Session("poll task aborted".into()))
    }

    fn offline(&self, host: &HostConfig, fault: HostFault) -> HostSnapshot {
        HostSnapshot::offline(
            host.id.clone(),
            host.label.clone(),
            host.outlets.len(),
            fault,
            setupwatch_util::now(),
        )
    }

    /// Query every bound port. Failed queries read as `Unknown`.
    async fn read_ports(&self, host: &HostConfig, errors: &mut Vec<String>) -> Vec<PortState> {
        let mut ports = Vec::with_capacity(host.outlets.len());

        for binding in &host.outlets {
            let state = match self.outlets.get(&binding.address) {
                Ok(handle) => handle.port_state(binding.port).await.map_err(|e| e.to_string()),
                Err(reason) => Err(reason),
            };

            match state {
                Ok(state) => ports.push(state),
                Err(e) => {
                    warn!(
                        host = %host.id,
                        outlet = %binding.address,
                        port = binding.port,
                        error = %e,
                        "Failed to read outlet port state"
                    );
                    errors.push(format!("{}#{}: {}", binding.address, binding.port, e));
                    ports.push(PortState::Unknown);
                }
            }
        }

        ports
    }
}
