//! WinRM remote shell (WS-Management over HTTPS, basic authentication)
//!
//! Windows ships with Basic disabled on the WinRM service, and Basic only
//! works for local accounts. Each workstation needs an HTTPS listener and
//!
//! ```text
//! winrm set winrm/config/service/auth @{Basic="true"}
//! ```
//!
//! before it can be polled. Domain accounts are rejected with 401.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine as _};
use regex::Regex;
use reqwest::{Client, StatusCode};
use setupwatch_host_api::{
    CommandOutput, Credentials, HostError, HostResult, RemoteShell, ShellSession, ShellTarget,
};
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::http_error;

const ACTION_CREATE: &str = "http://schemas.xmlsoap.org/ws/2004/09/transfer/Create";
const ACTION_DELETE: &str = "http://schemas.xmlsoap.org/ws/2004/09/transfer/Delete";
const ACTION_COMMAND: &str = "http://schemas.microsoft.com/wbem/wsman/1/windows/shell/Command";
const ACTION_RECEIVE: &str = "http://schemas.microsoft.com/wbem/wsman/1/windows/shell/Receive";
const ACTION_SIGNAL: &str = "http://schemas.microsoft.com/wbem/wsman/1/windows/shell/Signal";
const RESOURCE_CMD: &str = "http://schemas.microsoft.com/wbem/wsman/1/windows/shell/cmd";
const SIGNAL_TERMINATE: &str =
    "http://schemas.microsoft.com/wbem/wsman/1/windows/shell/signal/terminate";
const STATE_DONE: &str = "CommandState/Done";

/// WS-Management fault code for a Receive that saw no output in time
const RECEIVE_TIMEOUT_FAULT: &str = "2150858793";

const OPERATION_TIMED_OUT: &str = "WS-Management operation timed out";

/// Receive rounds per command before giving up on it
const MAX_RECEIVE_ROUNDS: usize = 8;

static SHELL_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?:<rsp:ShellId>([^<]+)</rsp:ShellId>|<w:Selector Name="ShellId">([^<]+)</w:Selector>)"#)
        .expect("valid regex")
});

static COMMAND_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<rsp:CommandId>([^<]+)</rsp:CommandId>").expect("valid regex"));

static STREAM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<rsp:Stream[^>]*Name="(stdout|stderr)"[^>]*>([^<]*)</rsp:Stream>"#)
        .expect("valid regex")
});

static EXIT_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<rsp:ExitCode>(-?\d+)</rsp:ExitCode>").expect("valid regex"));

static FAULT_TEXT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<(?:s|env):Text[^>]*>(.*?)</(?:s|env):Text>").expect("valid regex")
});

/// Connection settings for the WinRM listener
#[derive(Debug, Clone)]
pub struct WinRmOptions {
    pub port: u16,
    /// Bound on TCP/TLS connection setup
    pub connect_timeout: Duration,
    /// Bound on each HTTP request
    pub read_timeout: Duration,
    /// Server-side bound on each WS-Management operation
    pub operation_timeout: Duration,
    /// Skip certificate validation (workstations commonly use self-signed certs)
    pub accept_invalid_certs: bool,
}

impl Default for WinRmOptions {
    fn default() -> Self {
        Self {
            port: 5986,
            connect_timeout: Duration::from_secs(15),
            read_timeout: Duration::from_secs(4),
            operation_timeout: Duration::from_secs(2),
            accept_invalid_certs: true,
        }
    }
}

/// Opens command shells on Windows workstations over WinRM
pub struct WinRmShell {
    client: Client,
    options: WinRmOptions,
}

impl WinRmShell {
    pub fn new(options: WinRmOptions) -> HostResult<Self> {
        let client = Client::builder()
            .connect_timeout(options.connect_timeout)
            .danger_accept_invalid_certs(options.accept_invalid_certs)
            .build()
            .map_err(|e| HostError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, options })
    }

    /// WS-Management endpoint of a workstation
    pub fn endpoint(&self, address: &str) -> String {
        if address.contains(':') && !address.starts_with('[') {
            format!("https://[{}]:{}/wsman", address, self.options.port)
        } else {
            format!("https://{}:{}/wsman", address, self.options.port)
        }
    }
}

#[async_trait]
impl RemoteShell for WinRmShell {
    async fn open(&self, target: &ShellTarget) -> HostResult<Box<dyn ShellSession>> {
        let endpoint = self.endpoint(&target.address);
        let mut session = WinRmSession {
            client: self.client.clone(),
            endpoint,
            credentials: target.credentials.clone(),
            shell_id: String::new(),
            options: self.options.clone(),
        };

        let body = r#"<rsp:Shell><rsp:InputStreams>stdin</rsp:InputStreams><rsp:OutputStreams>stdout stderr</rsp:OutputStreams></rsp:Shell>"#;
        let options = r#"<w:OptionSet><w:Option Name="WINRS_NOPROFILE">FALSE</w:Option><w:Option Name="WINRS_CODEPAGE">65001</w:Option></w:OptionSet>"#;

        // Shell creation also pays for connection setup
        let timeout = self.options.connect_timeout + self.options.read_timeout;
        let response = session
            .send(ACTION_CREATE, options, body, timeout)
            .await
            .map_err(|e| match e {
                HostError::Protocol(msg) => HostError::ConnectFailed(msg),
                other => other,
            })?;

        session.shell_id = extract_shell_id(&response)
            .ok_or_else(|| HostError::Protocol("no ShellId in create response".into()))?;

        debug!(endpoint = %session.endpoint, shell_id = %session.shell_id, "Remote shell opened");
        Ok(Box::new(session))
    }
}

struct WinRmSession {
    client: Client,
    endpoint: String,
    credentials: Credentials,
    shell_id: String,
    options: WinRmOptions,
}

impl WinRmSession {
    async fn send(
        &self,
        action: &str,
        option_set: &str,
        body: &str,
        timeout: Duration,
    ) -> HostResult<String> {
        let shell_id = (!self.shell_id.is_empty()).then_some(self.shell_id.as_str());
        let envelope = envelope(
            &self.endpoint,
            action,
            shell_id,
            option_set,
            body,
            self.options.operation_timeout,
        );

        let response = self
            .client
            .post(&self.endpoint)
            .basic_auth(&self.credentials.login, Some(&self.credentials.password))
            .header("Content-Type", "application/soap+xml;charset=UTF-8")
            .timeout(timeout)
            .body(envelope)
            .send()
            .await
            .map_err(|e| http_error("WinRM request", e))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| http_error("WinRM response", e))?;

        match status {
            StatusCode::OK => Ok(text),
            _ => Err(response_error(status, &text)),
        }
    }

    async fn receive(&self, command_id: &str) -> HostResult<CommandOutput> {
        let body = format!(
            r#"<rsp:Receive><rsp:DesiredStream CommandId="{}">stdout stderr</rsp:DesiredStream></rsp:Receive>"#,
            command_id
        );

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();

        for _ in 0..MAX_RECEIVE_ROUNDS {
            let response = match self
                .send(ACTION_RECEIVE, "", &body, self.options.read_timeout)
                .await
            {
                Ok(response) => response,
                // No output within the operation timeout; ask again
                Err(HostError::Timeout(msg)) if msg == OPERATION_TIMED_OUT => continue,
                Err(e) => return Err(e),
            };

            let chunk = parse_receive(&response)?;
            stdout.extend(chunk.stdout);
            stderr.extend(chunk.stderr);

            if chunk.done {
                return Ok(CommandOutput {
                    stdout: String::from_utf8_lossy(&stdout).into_owned(),
                    stderr: String::from_utf8_lossy(&stderr).into_owned(),
                    exit_code: chunk.exit_code,
                });
            }
        }

        Err(HostError::Timeout(format!(
            "command {} did not finish after {} receive rounds",
            command_id, MAX_RECEIVE_ROUNDS
        )))
    }

    /// Terminate a command and free its resources on the workstation
    async fn cleanup(&self, command_id: &str) -> HostResult<()> {
        let body = format!(
            r#"<rsp:Signal CommandId="{}"><rsp:Code>{}</rsp:Code></rsp:Signal>"#,
            command_id, SIGNAL_TERMINATE
        );
        self.send(ACTION_SIGNAL, "", &body, self.options.read_timeout)
            .await
            .map(|_| ())
    }
}

#[async_trait]
impl ShellSession for WinRmSession {
    async fn run(&mut self, command: &str) -> HostResult<CommandOutput> {
        let body = format!(
            "<rsp:CommandLine><rsp:Command>{}</rsp:Command></rsp:CommandLine>",
            xml_escape(command)
        );
        let options = r#"<w:OptionSet><w:Option Name="WINRS_CONSOLEMODE_STDIN">TRUE</w:Option><w:Option Name="WINRS_SKIP_CMD_SHELL">FALSE</w:Option></w:OptionSet>"#;

        let response = self
            .send(ACTION_COMMAND, options, &body, self.options.read_timeout)
            .await
            .map_err(|e| HostError::CommandFailed(format!("{}: {}", command, e)))?;

        let command_id = COMMAND_ID
            .captures(&response)
            .map(|caps| caps[1].to_string())
            .ok_or_else(|| HostError::Protocol("no CommandId in command response".into()))?;

        let output = self.receive(&command_id).await;

        if let Err(e) = self.cleanup(&command_id).await {
            warn!(endpoint = %self.endpoint, command_id = %command_id, error = %e, "Failed to clean up remote command");
        }

        output
    }

    async fn close(self: Box<Self>) -> HostResult<()> {
        self.send(ACTION_DELETE, "", "", self.options.read_timeout)
            .await
            .map(|_| ())?;
        debug!(endpoint = %self.endpoint, shell_id = %self.shell_id, "Remote shell closed");
        Ok(())
    }
}

/// Decoded content of one Receive response
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ReceiveChunk {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub done: bool,
    pub exit_code: Option<i32>,
}

/// Decode the output streams and completion state of a Receive response
pub fn parse_receive(response: &str) -> HostResult<ReceiveChunk> {
    let mut chunk = ReceiveChunk::default();

    for caps in STREAM.captures_iter(response) {
        let encoded = caps[2].trim();
        if encoded.is_empty() {
            continue;
        }
        let decoded = BASE64_STANDARD
            .decode(encoded)
            .map_err(|e| HostError::Protocol(format!("bad stream encoding: {}", e)))?;
        match &caps[1] {
            "stdout" => chunk.stdout.extend(decoded),
            _ => chunk.stderr.extend(decoded),
        }
    }

    chunk.done = response.contains(STATE_DONE);
    chunk.exit_code = EXIT_CODE
        .captures(response)
        .and_then(|caps| caps[1].parse().ok());

    Ok(chunk)
}

/// Shell id from a Create response
pub fn extract_shell_id(response: &str) -> Option<String> {
    let caps = SHELL_ID.captures(response)?;
    caps.get(1)
        .or_else(|| caps.get(2))
        .map(|m| m.as_str().trim().to_string())
}

/// Map a non-OK WinRM response to the error the prober reports
fn response_error(status: StatusCode, body: &str) -> HostError {
    match status {
        StatusCode::UNAUTHORIZED => HostError::ConnectFailed(
            "WinRM authentication rejected (is Basic auth enabled for a local account?)".into(),
        ),
        _ if body.contains(RECEIVE_TIMEOUT_FAULT) => {
            HostError::Timeout(OPERATION_TIMED_OUT.into())
        }
        _ => HostError::Protocol(format!(
            "WinRM returned {}: {}",
            status,
            fault_text(body).unwrap_or_default()
        )),
    }
}

fn fault_text(response: &str) -> Option<String> {
    FAULT_TEXT
        .captures(response)
        .map(|caps| caps[1].trim().to_string())
}

/// Build a WS-Management SOAP envelope
pub fn envelope(
    endpoint: &str,
    action: &str,
    shell_id: Option<&str>,
    option_set: &str,
    body: &str,
    operation_timeout: Duration,
) -> String {
    let selector = shell_id
        .map(|id| {
            format!(
                r#"<w:SelectorSet><w:Selector Name="ShellId">{}</w:Selector></w:SelectorSet>"#,
                xml_escape(id)
            )
        })
        .unwrap_or_default();

    format!(
        concat!(
            r#"<s:Envelope xmlns:s="http://www.w3.org/2003/05/soap-envelope""#,
            r#" xmlns:a="http://schemas.xmlsoap.org/ws/2004/08/addressing""#,
            r#" xmlns:w="http://schemas.dmtf.org/wbem/wsman/1/wsman.xsd""#,
            r#" xmlns:rsp="http://schemas.microsoft.com/wbem/wsman/1/windows/shell">"#,
            "<s:Header>",
            "<a:To>{endpoint}</a:To>",
            r#"<a:ReplyTo><a:Address s:mustUnderstand="true">http://schemas.xmlsoap.org/ws/2004/08/addressing/role/anonymous</a:Address></a:ReplyTo>"#,
            r#"<w:MaxEnvelopeSize s:mustUnderstand="true">153600</w:MaxEnvelopeSize>"#,
            "<a:MessageID>uuid:{message_id}</a:MessageID>",
            r#"<w:Locale xml:lang="en-US" s:mustUnderstand="false"/>"#,
            "<w:OperationTimeout>PT{timeout}S</w:OperationTimeout>",
            r#"<w:ResourceURI s:mustUnderstand="true">{resource}</w:ResourceURI>"#,
            r#"<a:Action s:mustUnderstand="true">{action}</a:Action>"#,
            "{selector}{option_set}",
            "</s:Header>",
            "<s:Body>{body}</s:Body>",
            "</s:Envelope>"
        ),
        endpoint = xml_escape(endpoint),
        message_id = Uuid::new_v4().to_string().to_uppercase(),
        timeout = operation_timeout.as_secs().max(1),
        resource = RESOURCE_CMD,
        action = action,
        selector = selector,
        option_set = option_set,
        body = body,
    )
}

fn xml_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_carries_action_and_shell() {
        let xml = envelope(
            "https://10.0.0.21:5986/wsman",
            ACTION_COMMAND,
            Some("ABC-123"),
            "",
            "<rsp:CommandLine/>",
            Duration::from_secs(2),
        );

        assert!(xml.contains("<a:To>https://10.0.0.21:5986/wsman</a:To>"));
        assert!(xml.contains(&format!(r#"<a:Action s:mustUnderstand="true">{}</a:Action>"#, ACTION_COMMAND)));
        assert!(xml.contains(r#"<w:Selector Name="ShellId">ABC-123</w:Selector>"#));
        assert!(xml.contains("<w:OperationTimeout>PT2S</w:OperationTimeout>"));
        assert!(xml.contains("<s:Body><rsp:CommandLine/></s:Body>"));
    }

    #[test]
    fn envelope_without_shell_has_no_selector() {
        let xml = envelope("https://h:5986/wsman", ACTION_CREATE, None, "", "", Duration::from_secs(2));
        assert!(!xml.contains("SelectorSet"));
    }

    #[test]
    fn shell_id_from_either_form() {
        let body = r#"<s:Body><rsp:Shell><rsp:ShellId>11111111-AAAA</rsp:ShellId></rsp:Shell></s:Body>"#;
        assert_eq!(extract_shell_id(body).as_deref(), Some("11111111-AAAA"));

        let header = r#"<w:SelectorSet><w:Selector Name="ShellId">2222-BBBB</w:Selector></w:SelectorSet>"#;
        assert_eq!(extract_shell_id(header).as_deref(), Some("2222-BBBB"));

        assert_eq!(extract_shell_id("<s:Body/>"), None);
    }

    #[test]
    fn receive_decodes_streams_and_state() {
        let stdout = BASE64_STANDARD.encode(" 2 Active .");
        let more = BASE64_STANDARD.encode("\r\n");
        let stderr = BASE64_STANDARD.encode("warn");
        let response = format!(
            concat!(
                r#"<rsp:ReceiveResponse>"#,
                r#"<rsp:Stream Name="stdout" CommandId="C1">{}</rsp:Stream>"#,
                r#"<rsp:Stream Name="stdout" CommandId="C1">{}</rsp:Stream>"#,
                r#"<rsp:Stream Name="stderr" CommandId="C1">{}</rsp:Stream>"#,
                r#"<rsp:Stream Name="stdout" CommandId="C1" End="true"></rsp:Stream>"#,
                r#"<rsp:CommandState CommandId="C1" State="http://schemas.microsoft.com/wbem/wsman/1/windows/shell/CommandState/Done">"#,
                r#"<rsp:ExitCode>0</rsp:ExitCode></rsp:CommandState>"#,
                r#"</rsp:ReceiveResponse>"#
            ),
            stdout, more, stderr
        );

        let chunk = parse_receive(&response).unwrap();
        assert_eq!(chunk.stdout, b" 2 Active .\r\n");
        assert_eq!(chunk.stderr, b"warn");
        assert!(chunk.done);
        assert_eq!(chunk.exit_code, Some(0));
    }

    #[test]
    fn receive_still_running() {
        let response = r#"<rsp:CommandState CommandId="C1" State="http://schemas.microsoft.com/wbem/wsman/1/windows/shell/CommandState/Running"/>"#;
        let chunk = parse_receive(response).unwrap();
        assert!(!chunk.done);
        assert_eq!(chunk.exit_code, None);
    }

    #[test]
    fn receive_rejects_bad_base64() {
        let response = r#"<rsp:Stream Name="stdout" CommandId="C1">!!!</rsp:Stream>"#;
        assert!(matches!(parse_receive(response), Err(HostError::Protocol(_))));
    }

    #[test]
    fn fault_text_extraction() {
        let response = r#"<s:Fault><s:Reason><s:Text xml:lang="en-US">The request is invalid.</s:Text></s:Reason></s:Fault>"#;
        assert_eq!(fault_text(response).as_deref(), Some("The request is invalid."));
    }

    #[test]
    fn rejected_login_points_at_basic_auth() {
        let err = response_error(StatusCode::UNAUTHORIZED, "");
        assert!(matches!(&err, HostError::ConnectFailed(m) if m.contains("Basic")));

        let err = response_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "<f:WSManFault Code=\"2150858793\"/>",
        );
        assert!(matches!(&err, HostError::Timeout(m) if m == OPERATION_TIMED_OUT));
    }

    #[test]
    fn endpoint_brackets_ipv6() {
        let shell = WinRmShell::new(WinRmOptions::default()).unwrap();
        assert_eq!(shell.endpoint("10.0.0.21"), "https://10.0.0.21:5986/wsman");
        assert_eq!(shell.endpoint("fe80::1"), "https://[fe80::1]:5986/wsman");
    }

    #[test]
    fn commands_are_escaped() {
        assert_eq!(
            xml_escape(r#"REG QUERY "HKCU\Volatile Environment\2" /v "CLIENTNAME""#),
            r#"REG QUERY &quot;HKCU\Volatile Environment\2&quot; /v &quot;CLIENTNAME&quot;"#
        );
    }
}
