//! Outlet handle registry

use setupwatch_config::Fleet;
use setupwatch_host_api::{OutletConnector, OutletController};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Outlet controllers keyed by outlet address.
///
/// Built once per loaded fleet and shared by every poll task. Addresses
/// whose controller could not be built are remembered with the reason so
/// their ports read as unknown instead of failing the host.
#[derive(Default)]
pub struct OutletRegistry {
    handles: HashMap<String, Arc<dyn OutletController>>,
    failures: HashMap<String, String>,
}

impl OutletRegistry {
    /// Connect to every distinct outlet address referenced by the fleet
    pub fn connect(fleet: &Fleet, connector: &dyn OutletConnector) -> Self {
        let mut registry = Self::default();

        for address in fleet.outlet_addresses() {
            match connector.connect(&address) {
                Ok(handle) => {
                    registry.handles.insert(address, handle);
                }
                Err(e) => {
                    warn!(outlet = %address, error = %e, "Failed to set up outlet controller");
                    registry.failures.insert(address, e.to_string());
                }
            }
        }

        info!(
            outlets = registry.handles.len(),
            failed = registry.failures.len(),
            "Outlet controllers ready"
        );

        registry
    }

    /// Controller for an outlet address, or why there is none
    pub fn get(&self, address: &str) -> Result<&Arc<dyn OutletController>, String> {
        if let Some(handle) = self.handles.get(address) {
            return Ok(handle);
        }
        Err(self
            .failures
            .get(address)
            .cloned()
            .unwrap_or_else(|| format!("no controller for outlet {}", address)))
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use setupwatch_config::{HostConfig, OutletBinding};
    use setupwatch_host_api::{HostError, HostResult, MockConnector};
    use setupwatch_util::HostId;

    fn fleet(bindings: Vec<(&str, Vec<(&str, u16)>)>) -> Fleet {
        Fleet {
            service: Default::default(),
            probe: Default::default(),
            thresholds: Default::default(),
            outlet: Default::default(),
            usernames: Default::default(),
            hosts: bindings
                .into_iter()
                .map(|(address, outlets)| HostConfig {
                    id: HostId::new(address),
                    label: None,
                    login: "labuser".into(),
                    password: "secret".into(),
                    outlets: outlets
                        .into_iter()
                        .map(|(a, p)| OutletBinding::new(a, p))
                        .collect(),
                })
                .collect(),
        }
    }

    #[test]
    fn one_handle_per_distinct_address() {
        let connector = MockConnector::new();
        let fleet = fleet(vec![
            ("10.0.0.21", vec![("10.0.0.5", 1), ("10.0.0.5", 2)]),
            ("10.0.0.22", vec![("10.0.0.5", 3), ("10.0.0.6", 1)]),
        ]);

        let registry = OutletRegistry::connect(&fleet, &connector);
        assert_eq!(registry.len(), 2);
        assert_eq!(connector.connect_count(), 2);
        assert_eq!(registry.get("10.0.0.6").unwrap().address(), "10.0.0.6");
        assert!(registry.get("10.0.0.7").is_err());
    }

    struct FailingConnector;

    impl OutletConnector for FailingConnector {
        fn connect(&self, address: &str) -> HostResult<Arc<dyn OutletController>> {
            Err(HostError::Outlet(format!("bad outlet address {}", address)))
        }
    }

    #[test]
    fn failed_setup_is_remembered() {
        let fleet = fleet(vec![("10.0.0.21", vec![("bogus", 1)])]);
        let registry = OutletRegistry::connect(&fleet, &FailingConnector);

        assert!(registry.is_empty());
        let reason = registry.get("bogus").err().unwrap();
        assert!(reason.contains("bad outlet address bogus"));
    }
}
