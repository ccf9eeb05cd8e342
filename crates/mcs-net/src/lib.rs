//! ---
//! mcs_section: "05-networking-external-interfaces"
//! mcs_subsection: "module"
//! mcs_type: "source"
//! mcs_scope: "code"
//! mcs_description: "Network connectivity to the managed game server."
//! mcs_version: "v0.1.0"
//! mcs_owner: "tbd"
//! ---
//! Client side of the Minecraft Java edition status exchange ("server list ping").

use std::io;
use std::time::Duration;

use thiserror::Error;

pub mod codec;
pub mod status;

pub use status::{JavaStatusClient, Players, ServerStatus, ServerVersion};

/// Result alias used throughout the networking crate.
pub type Result<T> = std::result::Result<T, ProbeError>;

/// Failures raised while querying a server's status.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// The TCP connection could not be established.
    #[error("unable to reach {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },
    /// Connecting or exchanging packets exceeded the configured timeout.
    #[error("timed out after {timeout:?} talking to {addr}")]
    Timeout { addr: String, timeout: Duration },
    /// The connection broke during the exchange.
    #[error("status exchange failed: {0}")]
    Io(#[from] io::Error),
    /// The server answered with bytes that do not follow the protocol.
    #[error("malformed status response: {0}")]
    Protocol(String),
    /// The status JSON could not be decoded.
    #[error("status payload is not valid JSON: {0}")]
    Payload(#[from] serde_json::Error),
}

impl ProbeError {
    /// Whether the failure is a plain reachability problem rather than a bad answer.
    pub fn is_connectivity(&self) -> bool {
        matches!(
            self,
            ProbeError::Connect { .. } | ProbeError::Timeout { .. } | ProbeError::Io(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connectivity_classification() {
        let refused = ProbeError::Connect {
            addr: "127.0.0.1:25565".into(),
            source: io::Error::from(io::ErrorKind::ConnectionRefused),
        };
        assert!(refused.is_connectivity());
        assert!(!ProbeError::Protocol("bad packet id".into()).is_connectivity());
    }
}
