//! ICMP reachability probe via the system `ping` binary

use async_trait::async_trait;
use setupwatch_host_api::ReachabilityProbe;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

/// Sends a single echo request and waits at most `timeout` for the reply
#[derive(Debug, Clone)]
pub struct SystemPing {
    program: String,
    timeout: Duration,
}

impl SystemPing {
    pub fn new(timeout: Duration) -> Self {
        Self {
            program: "ping".into(),
            timeout,
        }
    }

    /// Use a different ping binary (e.g. an absolute path)
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Arguments for one probe of `address`
    pub fn args(&self, address: &str) -> Vec<String> {
        // `-W` takes whole seconds on older iputils
        let wait = self.timeout.as_secs_f64().ceil().max(1.0) as u64;
        vec![
            "-c".into(),
            "1".into(),
            "-W".into(),
            wait.to_string(),
            address.into(),
        ]
    }
}

#[async_trait]
impl ReachabilityProbe for SystemPing {
    async fn is_reachable(&self, address: &str) -> bool {
        if address.is_empty() || address.starts_with('-') {
            warn!(address, "Refusing to ping suspicious address");
            return false;
        }

        let child = Command::new(&self.program)
            .args(self.args(address))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .status();

        // Allow ping a little longer than its own wait before giving up on it
        let limit = self.timeout + Duration::from_millis(500);
        match tokio::time::timeout(limit, child).await {
            Ok(Ok(status)) => status.success(),
            Ok(Err(e)) => {
                warn!(address, program = %self.program, error = %e, "Failed to run ping");
                false
            }
            Err(_) => {
                debug!(address, "Ping timed out");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_round_timeout_up() {
        let ping = SystemPing::new(Duration::from_millis(1500));
        assert_eq!(ping.args("10.0.0.21"), vec!["-c", "1", "-W", "2", "10.0.0.21"]);

        let ping = SystemPing::new(Duration::from_millis(200));
        assert_eq!(ping.args("h")[3], "1");
    }

    #[tokio::test]
    async fn option_like_address_is_unreachable() {
        let ping = SystemPing::new(Duration::from_secs(1)).with_program("/nonexistent/ping");
        assert!(!ping.is_reachable("-f").await);
        assert!(!ping.is_reachable("").await);
    }

    #[tokio::test]
    async fn missing_binary_is_unreachable() {
        let ping = SystemPing::new(Duration::from_secs(1)).with_program("/nonexistent/ping");
        assert!(!ping.is_reachable("127.0.0.1").await);
    }

    #[tokio::test]
    async fn exit_status_decides() {
        let ok = SystemPing::new(Duration::from_secs(1)).with_program("true");
        assert!(ok.is_reachable("127.0.0.1").await);

        let failing = SystemPing::new(Duration::from_secs(1)).with_program("false");
        assert!(!failing.is_reachable("127.0.0.1").await);
    }
}
