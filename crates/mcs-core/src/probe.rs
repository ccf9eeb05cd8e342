//! ---
//! mcs_section: "01-core-functionality"
//! mcs_subsection: "module"
//! mcs_type: "source"
//! mcs_scope: "code"
//! mcs_description: "Reconciliation controller and host adapters."
//! mcs_version: "v0.1.0"
//! mcs_owner: "tbd"
//! ---
use std::time::Duration;

use async_trait::async_trait;
use mcs_net::JavaStatusClient;
use serde::{Deserialize, Serialize};

use crate::error::ExternalResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeReport {
    pub online_players: u32,
}

/// Queries the running game server for its live status.
#[async_trait]
pub trait StatusProbe: Send + Sync {
    async fn query_status(&self, host: &str, port: u16) -> ExternalResult<ProbeReport>;
}

/// Probe speaking the Java edition status protocol.
#[derive(Debug, Clone)]
pub struct JavaStatusProbe {
    client: JavaStatusClient,
}

impl JavaStatusProbe {
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: JavaStatusClient::new(timeout),
        }
    }
}

#[async_trait]
impl StatusProbe for JavaStatusProbe {
    async fn query_status(&self, host: &str, port: u16) -> ExternalResult<ProbeReport> {
        let status = self.client.query(host, port).await?;
        Ok(ProbeReport {
            online_players: status.online_players(),
        })
    }
}
