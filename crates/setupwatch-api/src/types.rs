//! Classification types for setupwatch

use serde::{Deserialize, Serialize};
use std::fmt;

/// Whether a workstation has an interactive session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Occupancy {
    /// A user is connected to the session
    Active,
    /// A user is logged in but the client is disconnected
    Disconnected,
    /// Unreachable, or the session query failed
    Offline,
}

impl Occupancy {
    pub fn is_offline(&self) -> bool {
        matches!(self, Occupancy::Offline)
    }
}

/// Normalized idle duration of the current session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IdleBucket {
    /// No idle time and nobody is using the machine
    Zero,
    /// No idle time and a user is interacting right now
    ActiveTyping,
    /// Idle for a number of minutes, below the saturation point.
    ///
    /// `raw` is the text reported by the host, kept verbatim for display.
    Minutes { minutes: u32, raw: String },
    /// Idle for at least an hour; the exact value is discarded
    Saturated,
    /// No idle information (host offline)
    Offline,
}

impl fmt::Display for IdleBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdleBucket::Zero => write!(f, "0"),
            IdleBucket::ActiveTyping => write!(f, "Active"),
            IdleBucket::Minutes { raw, .. } => write!(f, "{}", raw),
            IdleBucket::Saturated => write!(f, "60+"),
            IdleBucket::Offline => write!(f, "Offline"),
        }
    }
}

/// Who is using a workstation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum ResolvedUser {
    /// Client machine name mapped to a person via the username table
    Mapped(String),
    /// Unmapped client machine name of an active session
    Client(String),
    /// Nobody is actively using the workstation
    Free,
    /// Host offline
    Offline,
}

impl ResolvedUser {
    pub fn is_free(&self) -> bool {
        matches!(self, ResolvedUser::Free)
    }
}

impl fmt::Display for ResolvedUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolvedUser::Mapped(name) | ResolvedUser::Client(name) => write!(f, "{}", name),
            ResolvedUser::Free => write!(f, "Free"),
            ResolvedUser::Offline => write!(f, "Offline"),
        }
    }
}

/// State of one switched outlet port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortState {
    On,
    Off,
    /// Not queried this cycle, or the query failed
    Unknown,
}

impl PortState {
    pub fn is_on(&self) -> bool {
        matches!(self, PortState::On)
    }
}

impl fmt::Display for PortState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortState::On => write!(f, "on"),
            PortState::Off => write!(f, "off"),
            PortState::Unknown => write!(f, "unknown"),
        }
    }
}

/// Why a host snapshot was degraded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "fault", content = "detail", rename_all = "snake_case")]
pub enum HostFault {
    /// Reachability probe failed or timed out
    Unreachable,
    /// Remote session could not be opened or a command failed
    Session(String),
    /// Session query output did not match the expected grammar
    Parse(String),
    /// Outlet query or switch failed (classification is kept)
    Outlet(String),
}

impl fmt::Display for HostFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostFault::Unreachable => write!(f, "unreachable"),
            HostFault::Session(msg) => write!(f, "session failure: {}", msg),
            HostFault::Parse(msg) => write!(f, "parse failure: {}", msg),
            HostFault::Outlet(msg) => write!(f, "outlet failure: {}", msg),
        }
    }
}
