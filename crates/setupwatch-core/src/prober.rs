//! Remote session prober

use setupwatch_config::HostConfig;
use setupwatch_host_api::{Credentials, ReachabilityProbe, RemoteShell, ShellSession, ShellTarget};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::{parse_session, RawSessionText};

/// Command listing interactive sessions
pub const LIST_SESSIONS_COMMAND: &str = "query user";

/// Command reading the client machine name of a session
pub fn client_name_command(session_id: u32) -> String {
    format!(
        "REG QUERY \"HKCU\\Volatile Environment\\{}\" /v \"CLIENTNAME\"",
        session_id
    )
}

/// What probing one host produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// The reachability check failed
    Unreachable,
    /// Opening the shell or running a command failed
    SessionFailed(String),
    /// Raw text to classify
    Queried(RawSessionText),
}

/// Probes workstations for their current session.
///
/// Never returns an error: every failure is folded into [`ProbeOutcome`].
pub struct SessionProber {
    probe: Arc<dyn ReachabilityProbe>,
    shell: Arc<dyn RemoteShell>,
}

impl SessionProber {
    pub fn new(probe: Arc<dyn ReachabilityProbe>, shell: Arc<dyn RemoteShell>) -> Self {
        Self { probe, shell }
    }

    pub async fn probe(&self, host: &HostConfig) -> ProbeOutcome {
        let address = host.id.as_str();

        if !self.probe.is_reachable(address).await {
            debug!(host = %host.id, "Host did not answer reachability probe");
            return ProbeOutcome::Unreachable;
        }

        let target = ShellTarget::new(
            address,
            Credentials::new(host.login.clone(), host.password.clone()),
        );

        let mut session = match self.shell.open(&target).await {
            Ok(session) => session,
            Err(e) => {
                warn!(host = %host.id, error = %e, "Failed to open remote shell");
                return ProbeOutcome::SessionFailed(e.to_string());
            }
        };

        let result = query_session(session.as_mut()).await;

        // Release the remote shell on every path
        if let Err(e) = session.close().await {
            warn!(host = %host.id, error = %e, "Failed to close remote shell");
        }

        match result {
            Ok(raw) => ProbeOutcome::Queried(raw),
            Err(e) => {
                warn!(host = %host.id, error = %e, "Remote session query failed");
                ProbeOutcome::SessionFailed(e.to_string())
            }
        }
    }
}

async fn query_session(
    session: &mut dyn ShellSession,
) -> setupwatch_host_api::HostResult<RawSessionText> {
    let sessions = session.run(LIST_SESSIONS_COMMAND).await?.stdout;

    // Without a session id there is nothing to ask; classification reports it
    let Ok(parsed) = parse_session(&sessions) else {
        return Ok(RawSessionText {
            sessions,
            client: None,
        });
    };

    let client = session.run(&client_name_command(parsed.id)).await?.stdout;

    Ok(RawSessionText {
        sessions,
        client: Some(client),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use setupwatch_host_api::{MockProbe, MockSessionScript, MockShell};
    use setupwatch_util::HostId;

    fn host(address: &str) -> HostConfig {
        HostConfig {
            id: HostId::new(address),
            label: None,
            login: "labuser".into(),
            password: "secret".into(),
            outlets: vec![],
        }
    }

    fn prober(probe: MockProbe, shell: Arc<MockShell>) -> SessionProber {
        SessionProber::new(Arc::new(probe), shell)
    }

    #[test]
    fn client_name_command_format() {
        assert_eq!(
            client_name_command(3),
            r#"REG QUERY "HKCU\Volatile Environment\3" /v "CLIENTNAME""#
        );
    }

    #[tokio::test]
    async fn unreachable_host_skips_shell() {
        let shell = Arc::new(MockShell::new());
        let probe = MockProbe::new(false);

        let outcome = prober(probe, shell.clone()).probe(&host("10.0.0.21")).await;
        assert_eq!(outcome, ProbeOutcome::Unreachable);
        assert_eq!(shell.opened_count(), 0);
    }

    #[tokio::test]
    async fn queries_sessions_then_client_name() {
        let shell = Arc::new(MockShell::new());
        shell.script("10.0.0.21", MockSessionScript::with_client("2 Active 7", "WS-ALICE"));

        let outcome = prober(MockProbe::new(true), shell.clone())
            .probe(&host("10.0.0.21"))
            .await;

        let ProbeOutcome::Queried(raw) = outcome else {
            panic!("expected queried outcome, got {:?}", outcome);
        };
        assert_eq!(raw.sessions, "2 Active 7");
        assert!(raw.client.unwrap().contains("WS-ALICE"));

        let commands: Vec<String> = shell.commands().into_iter().map(|(_, c)| c).collect();
        assert_eq!(commands, vec![LIST_SESSIONS_COMMAND.to_string(), client_name_command(2)]);
        assert_eq!(shell.opened_count(), 1);
        assert_eq!(shell.closed_count(), 1);
    }

    #[tokio::test]
    async fn no_session_line_skips_client_query() {
        let shell = Arc::new(MockShell::new());
        shell.script("10.0.0.21", MockSessionScript::new("No User exists for *", ""));

        let outcome = prober(MockProbe::new(true), shell.clone())
            .probe(&host("10.0.0.21"))
            .await;

        assert_eq!(
            outcome,
            ProbeOutcome::Queried(RawSessionText {
                sessions: "No User exists for *".into(),
                client: None,
            })
        );
        assert_eq!(shell.commands().len(), 1);
        assert_eq!(shell.closed_count(), 1);
    }

    #[tokio::test]
    async fn open_failure_is_session_failure() {
        let shell = Arc::new(MockShell::new());
        shell.script("10.0.0.21", MockSessionScript::failing_open());

        let outcome = prober(MockProbe::new(true), shell.clone())
            .probe(&host("10.0.0.21"))
            .await;
        assert!(matches!(outcome, ProbeOutcome::SessionFailed(_)));
    }

    #[tokio::test]
    async fn command_failure_still_closes_shell() {
        let shell = Arc::new(MockShell::new());
        let mut script = MockSessionScript::with_client("2 Active .", "WS-ALICE");
        script.fail_commands = true;
        shell.script("10.0.0.21", script);

        let outcome = prober(MockProbe::new(true), shell.clone())
            .probe(&host("10.0.0.21"))
            .await;

        assert!(matches!(outcome, ProbeOutcome::SessionFailed(_)));
        assert_eq!(shell.opened_count(), 1);
        assert_eq!(shell.closed_count(), 1);
    }
}
