//! Capability traits

use async_trait::async_trait;
use setupwatch_api::PortState;
use std::sync::Arc;
use thiserror::Error;

use crate::{CommandOutput, ShellTarget};

/// Errors from host capability operations
#[derive(Debug, Error)]
pub enum HostError {
    #[error("Connection failed: {0}")]
    ConnectFailed(String),

    #[error("Command failed: {0}")]
    CommandFailed(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Outlet error: {0}")]
    Outlet(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type HostResult<T> = Result<T, HostError>;

/// Lightweight network reachability check (e.g. one ICMP echo)
#[async_trait]
pub trait ReachabilityProbe: Send + Sync {
    /// Returns false on any failure or non-response. Never retries.
    async fn is_reachable(&self, address: &str) -> bool;
}

/// Opens authenticated remote command sessions on workstations
#[async_trait]
pub trait RemoteShell: Send + Sync {
    async fn open(&self, target: &ShellTarget) -> HostResult<Box<dyn ShellSession>>;
}

/// An open remote command session.
///
/// Callers must call [`ShellSession::close`] on every exit path so the
/// remote listener does not run out of shells.
#[async_trait]
pub trait ShellSession: Send {
    /// Run a command and wait for its output
    async fn run(&mut self, command: &str) -> HostResult<CommandOutput>;

    /// Clean up outstanding commands and close the shell
    async fn close(self: Box<Self>) -> HostResult<()>;
}

/// Control of one switched power distribution unit
#[async_trait]
pub trait OutletController: Send + Sync {
    /// Network address of the outlet unit
    fn address(&self) -> &str;

    /// Query a port. Implementations return `On` or `Off`.
    async fn port_state(&self, port: u16) -> HostResult<PortState>;

    /// Switch a port off
    async fn power_off(&self, port: u16) -> HostResult<()>;
}

/// Builds outlet controllers for outlet addresses.
///
/// Called once per distinct outlet address when the fleet is loaded;
/// the resulting handles are reused across cycles.
pub trait OutletConnector: Send + Sync {
    fn connect(&self, address: &str) -> HostResult<Arc<dyn OutletController>>;
}
