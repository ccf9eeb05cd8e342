//! ---
//! mcs_section: "01-core-functionality"
//! mcs_subsection: "module"
//! mcs_type: "source"
//! mcs_scope: "code"
//! mcs_description: "Reconciliation controller and host adapters."
//! mcs_version: "v0.1.0"
//! mcs_owner: "tbd"
//! ---
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::anyhow;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::command;
use crate::error::{ExternalError, ExternalResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Tcp,
    Udp,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Tcp => "tcp",
            Protocol::Udp => "udp",
        }
    }
}

/// A port as the orchestrator reports it, e.g. `25565/tcp`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PortSpec {
    pub port: u16,
    pub protocol: Protocol,
}

impl PortSpec {
    pub fn tcp(port: u16) -> Self {
        Self {
            port,
            protocol: Protocol::Tcp,
        }
    }
}

impl fmt::Display for PortSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.port, self.protocol.as_str())
    }
}

impl FromStr for PortSpec {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let raw = raw.trim();
        let (port, protocol) = match raw.split_once('/') {
            Some((port, protocol)) => (port, protocol),
            None => (raw, "tcp"),
        };
        let port = port
            .parse::<u16>()
            .map_err(|err| anyhow!("invalid port in {raw:?}: {err}"))?;
        let protocol = match protocol.to_ascii_lowercase().as_str() {
            "tcp" => Protocol::Tcp,
            "udp" => Protocol::Udp,
            other => return Err(anyhow!("unsupported protocol {other:?} in {raw:?}")),
        };
        Ok(Self { port, protocol })
    }
}

/// Orchestrator-side firewall state for the unit.
#[async_trait]
pub trait PortRegistry: Send + Sync {
    async fn opened_ports(&self) -> ExternalResult<Vec<PortSpec>>;
    async fn open_port(&self, spec: PortSpec) -> ExternalResult<()>;
    async fn close_port(&self, spec: PortSpec) -> ExternalResult<()>;
}

/// Registry backed by the orchestrator's `opened-ports`, `open-port` and
/// `close-port` hook tools.
#[derive(Debug, Clone)]
pub struct HookToolPorts {
    opened: String,
    open: String,
    close: String,
}

impl Default for HookToolPorts {
    fn default() -> Self {
        Self {
            opened: "opened-ports".to_owned(),
            open: "open-port".to_owned(),
            close: "close-port".to_owned(),
        }
    }
}

impl HookToolPorts {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PortRegistry for HookToolPorts {
    async fn opened_ports(&self) -> ExternalResult<Vec<PortSpec>> {
        let output = command::run_checked(&self.opened, &[]).await?;
        output
            .stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(|line| line.parse::<PortSpec>().map_err(ExternalError::from))
            .collect()
    }

    async fn open_port(&self, spec: PortSpec) -> ExternalResult<()> {
        command::run_checked(&self.open, &[&spec.to_string()]).await?;
        Ok(())
    }

    async fn close_port(&self, spec: PortSpec) -> ExternalResult<()> {
        command::run_checked(&self.close, &[&spec.to_string()]).await?;
        Ok(())
    }
}

/// Outcome of [`PortManager::close_all`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CloseReport {
    pub closed: Vec<PortSpec>,
    pub failed: Vec<PortSpec>,
}

impl CloseReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Keeps the set of opened ports equal to the single configured port.
#[derive(Clone)]
pub struct PortManager {
    registry: Arc<dyn PortRegistry>,
}

impl PortManager {
    pub fn new(registry: Arc<dyn PortRegistry>) -> Self {
        Self { registry }
    }

    /// Try to close every port currently reported as opened.
    ///
    /// Only listing the opened ports is fatal to the call; individual close
    /// failures are logged and returned in [`CloseReport::failed`].
    pub async fn close_all(&self) -> ExternalResult<CloseReport> {
        let opened = self.registry.opened_ports().await?;
        let mut report = CloseReport::default();
        for spec in opened {
            match self.registry.close_port(spec).await {
                Ok(()) => {
                    info!(port = %spec, "port closed");
                    report.closed.push(spec);
                }
                Err(err) => {
                    warn!(port = %spec, error = %err, "failed to close port");
                    report.failed.push(spec);
                }
            }
        }
        Ok(report)
    }

    pub async fn open_desired(&self, port: u16) -> ExternalResult<()> {
        let spec = PortSpec::tcp(port);
        self.registry.open_port(spec).await.map_err(|err| {
            warn!(port = %spec, error = %err, "failed to open port");
            err
        })?;
        info!(port = %spec, "port opened");
        Ok(())
    }
}
