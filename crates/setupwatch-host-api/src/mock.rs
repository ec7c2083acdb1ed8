//! Mock capabilities for unit/integration testing

use async_trait::async_trait;
use setupwatch_api::PortState;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::{
    CommandOutput, HostError, HostResult, OutletConnector, OutletController, ReachabilityProbe,
    RemoteShell, ShellSession, ShellTarget,
};

/// Mock reachability probe with per-address answers
pub struct MockProbe {
    default_reachable: bool,
    answers: Mutex<HashMap<String, bool>>,
    probed: Mutex<Vec<String>>,
}

impl MockProbe {
    pub fn new(default_reachable: bool) -> Self {
        Self {
            default_reachable,
            answers: Mutex::new(HashMap::new()),
            probed: Mutex::new(Vec::new()),
        }
    }

    pub fn set_reachable(&self, address: &str, reachable: bool) {
        self.answers
            .lock()
            .unwrap()
            .insert(address.to_string(), reachable);
    }

    /// Addresses probed so far, in call order
    pub fn probed(&self) -> Vec<String> {
        self.probed.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReachabilityProbe for MockProbe {
    async fn is_reachable(&self, address: &str) -> bool {
        self.probed.lock().unwrap().push(address.to_string());
        self.answers
            .lock()
            .unwrap()
            .get(address)
            .copied()
            .unwrap_or(self.default_reachable)
    }
}

/// Scripted behaviour of one workstation's remote shell
#[derive(Debug, Clone, Default)]
pub struct MockSessionScript {
    /// Output of the session listing command
    pub query_output: String,
    /// Output of the client-name registry query
    pub client_output: String,
    /// Opening the shell fails
    pub fail_open: bool,
    /// Every command fails
    pub fail_commands: bool,
    /// Delay before the shell opens
    pub delay: Option<Duration>,
}

impl MockSessionScript {
    pub fn new(query_output: impl Into<String>, client_output: impl Into<String>) -> Self {
        Self {
            query_output: query_output.into(),
            client_output: client_output.into(),
            ..Default::default()
        }
    }

    /// Convenience for a registry answer naming `client` as the session's client machine
    pub fn with_client(query_output: impl Into<String>, client: &str) -> Self {
        Self::new(
            query_output,
            format!(
                "\r\nHKEY_CURRENT_USER\\Volatile Environment\\2\r\n    CLIENTNAME    REG_SZ    {}\r\n\r\n",
                client
            ),
        )
    }

    pub fn failing_open() -> Self {
        Self {
            fail_open: true,
            ..Default::default()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

/// Mock remote shell keyed by workstation address
pub struct MockShell {
    scripts: Mutex<HashMap<String, MockSessionScript>>,
    opened: Arc<AtomicUsize>,
    closed: Arc<AtomicUsize>,
    commands: Arc<Mutex<Vec<(String, String)>>>,
}

impl MockShell {
    pub fn new() -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
            opened: Arc::new(AtomicUsize::new(0)),
            closed: Arc::new(AtomicUsize::new(0)),
            commands: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn script(&self, address: &str, script: MockSessionScript) {
        self.scripts
            .lock()
            .unwrap()
            .insert(address.to_string(), script);
    }

    pub fn opened_count(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn closed_count(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    /// (address, command) pairs in execution order
    pub fn commands(&self) -> Vec<(String, String)> {
        self.commands.lock().unwrap().clone()
    }
}

impl Default for MockShell {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteShell for MockShell {
    async fn open(&self, target: &ShellTarget) -> HostResult<Box<dyn ShellSession>> {
        let script = self
            .scripts
            .lock()
            .unwrap()
            .get(&target.address)
            .cloned()
            .ok_or_else(|| HostError::ConnectFailed(format!("no mock script for {}", target.address)))?;

        if let Some(delay) = script.delay {
            tokio::time::sleep(delay).await;
        }

        if script.fail_open {
            return Err(HostError::ConnectFailed("Mock open failure".into()));
        }

        self.opened.fetch_add(1, Ordering::SeqCst);

        Ok(Box::new(MockShellSession {
            address: target.address.clone(),
            script,
            closed: self.closed.clone(),
            commands: self.commands.clone(),
        }))
    }
}

struct MockShellSession {
    address: String,
    script: MockSessionScript,
    closed: Arc<AtomicUsize>,
    commands: Arc<Mutex<Vec<(String, String)>>>,
}

#[async_trait]
impl ShellSession for MockShellSession {
    async fn run(&mut self, command: &str) -> HostResult<CommandOutput> {
        self.commands
            .lock()
            .unwrap()
            .push((self.address.clone(), command.to_string()));

        if self.script.fail_commands {
            return Err(HostError::CommandFailed("Mock command failure".into()));
        }

        if command.starts_with("query user") {
            Ok(CommandOutput::stdout(self.script.query_output.clone()))
        } else if command.starts_with("REG QUERY") {
            Ok(CommandOutput::stdout(self.script.client_output.clone()))
        } else {
            Err(HostError::CommandFailed(format!("unexpected command: {}", command)))
        }
    }

    async fn close(self: Box<Self>) -> HostResult<()> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Mock outlet unit with in-memory port states
pub struct MockOutlet {
    address: String,
    ports: Mutex<HashMap<u16, PortState>>,
    power_offs: Mutex<Vec<u16>>,
    queries: AtomicUsize,

    /// Configure port queries to fail
    pub fail_query: AtomicBool,

    /// Configure switching to fail
    pub fail_power_off: AtomicBool,
}

impl MockOutlet {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            ports: Mutex::new(HashMap::new()),
            power_offs: Mutex::new(Vec::new()),
            queries: AtomicUsize::new(0),
            fail_query: AtomicBool::new(false),
            fail_power_off: AtomicBool::new(false),
        }
    }

    pub fn set_port(&self, port: u16, state: PortState) {
        self.ports.lock().unwrap().insert(port, state);
    }

    pub fn port(&self, port: u16) -> PortState {
        self.ports
            .lock()
            .unwrap()
            .get(&port)
            .copied()
            .unwrap_or(PortState::Off)
    }

    /// Ports passed to `power_off`, in call order
    pub fn power_offs(&self) -> Vec<u16> {
        self.power_offs.lock().unwrap().clone()
    }

    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OutletController for MockOutlet {
    fn address(&self) -> &str {
        &self.address
    }

    async fn port_state(&self, port: u16) -> HostResult<PortState> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        if self.fail_query.load(Ordering::SeqCst) {
            return Err(HostError::Outlet("Mock query failure".into()));
        }
        Ok(self.port(port))
    }

    async fn power_off(&self, port: u16) -> HostResult<()> {
        self.power_offs.lock().unwrap().push(port);
        if self.fail_power_off.load(Ordering::SeqCst) {
            return Err(HostError::Outlet("Mock power-off failure".into()));
        }
        self.set_port(port, PortState::Off);
        Ok(())
    }
}

/// Hands out shared [`MockOutlet`]s so tests can configure and inspect them
pub struct MockConnector {
    outlets: Mutex<HashMap<String, Arc<MockOutlet>>>,
    connects: AtomicUsize,
}

impl MockConnector {
    pub fn new() -> Self {
        Self {
            outlets: Mutex::new(HashMap::new()),
            connects: AtomicUsize::new(0),
        }
    }

    /// Get (or create) the mock outlet for an address
    pub fn outlet(&self, address: &str) -> Arc<MockOutlet> {
        self.outlets
            .lock()
            .unwrap()
            .entry(address.to_string())
            .or_insert_with(|| Arc::new(MockOutlet::new(address)))
            .clone()
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

impl Default for MockConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl OutletConnector for MockConnector {
    fn connect(&self, address: &str) -> HostResult<Arc<dyn OutletController>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let outlet: Arc<dyn OutletController> = self.outlet(address);
        Ok(outlet)
    }
}
