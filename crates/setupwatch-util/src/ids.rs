//! Strongly-typed identifiers for setupwatch

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifier of a monitored workstation (its network address)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HostId(String);

impl HostId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for HostId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for HostId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Unique identifier for one fleet poll cycle, used to correlate log lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CycleId(Uuid);

impl CycleId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CycleId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CycleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_id_equality() {
        let a = HostId::new("10.0.0.21");
        let b = HostId::from("10.0.0.21");
        let c = HostId::new("10.0.0.22");

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.to_string(), "10.0.0.21");
    }

    #[test]
    fn cycle_id_uniqueness() {
        assert_ne!(CycleId::new(), CycleId::new());
    }

    #[test]
    fn ids_serialize_deserialize() {
        let host = HostId::new("bench-1");
        let json = serde_json::to_string(&host).unwrap();
        assert_eq!(json, "\"bench-1\"");
        let parsed: HostId = serde_json::from_str(&json).unwrap();
        assert_eq!(host, parsed);

        let cycle = CycleId::new();
        let json = serde_json::to_string(&cycle).unwrap();
        let parsed: CycleId = serde_json::from_str(&json).unwrap();
        assert_eq!(cycle, parsed);
    }
}
