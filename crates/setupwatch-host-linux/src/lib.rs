//! Linux adapters for setupwatchd
//!
//! Provides:
//! - Reachability probing with the system `ping` binary
//! - A WinRM (WS-Management over HTTPS) remote shell
//! - GUDE switched power distribution unit control over HTTP

mod gude;
mod ping;
mod winrm;

pub use gude::*;
pub use ping::*;
pub use winrm::*;

use setupwatch_host_api::HostError;

/// Map a transport error into the capability error space
pub(crate) fn http_error(context: &str, e: reqwest::Error) -> HostError {
    if e.is_timeout() {
        HostError::Timeout(format!("{}: {}", context, e))
    } else if e.is_connect() {
        HostError::ConnectFailed(format!("{}: {}", context, e))
    } else {
        HostError::Protocol(format!("{}: {}", context, e))
    }
}
