//! ---
//! mcs_section: "01-core-functionality"
//! mcs_subsection: "module"
//! mcs_type: "source"
//! mcs_scope: "code"
//! mcs_description: "Reconciliation controller and host adapters."
//! mcs_version: "v0.1.0"
//! mcs_owner: "tbd"
//! ---
use async_trait::async_trait;

use crate::command;
use crate::error::ExternalResult;

/// Host service manager controlling the managed unit.
#[async_trait]
pub trait ServiceSupervisor: Send + Sync {
    async fn is_running(&self) -> ExternalResult<bool>;
    async fn start(&self) -> ExternalResult<()>;
    async fn restart(&self) -> ExternalResult<()>;
    /// Ask the manager to re-read unit descriptors from disk.
    async fn reload_definitions(&self) -> ExternalResult<()>;
}

/// Supervisor backed by `systemctl`.
#[derive(Debug, Clone)]
pub struct Systemctl {
    unit: String,
    program: String,
}

impl Systemctl {
    pub fn new(unit: impl Into<String>) -> Self {
        Self::with_program(unit, "systemctl")
    }

    pub fn with_program(unit: impl Into<String>, program: impl Into<String>) -> Self {
        Self {
            unit: unit.into(),
            program: program.into(),
        }
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }
}

#[async_trait]
impl ServiceSupervisor for Systemctl {
    async fn is_running(&self) -> ExternalResult<bool> {
        let output = command::run(&self.program, &["is-active", "--quiet", &self.unit]).await?;
        Ok(output.status.success())
    }

    async fn start(&self) -> ExternalResult<()> {
        command::run_checked(&self.program, &["start", &self.unit]).await?;
        Ok(())
    }

    async fn restart(&self) -> ExternalResult<()> {
        command::run_checked(&self.program, &["restart", &self.unit]).await?;
        Ok(())
    }

    async fn reload_definitions(&self) -> ExternalResult<()> {
        command::run_checked(&self.program, &["daemon-reload"]).await?;
        Ok(())
    }
}
