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

use serde::{Deserialize, Serialize};
use tracing::info;

/// Coarse status surfaced to the orchestration layer after every handler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "message", rename_all = "lowercase")]
pub enum UnitStatus {
    Maintenance(String),
    Active(String),
    Blocked(String),
}

impl Default for UnitStatus {
    fn default() -> Self {
        UnitStatus::Maintenance("installing".to_owned())
    }
}

impl UnitStatus {
    pub fn maintenance(detail: impl Into<String>) -> Self {
        UnitStatus::Maintenance(detail.into())
    }

    pub fn active(detail: impl Into<String>) -> Self {
        UnitStatus::Active(detail.into())
    }

    pub fn blocked(reason: impl Into<String>) -> Self {
        UnitStatus::Blocked(reason.into())
    }

    pub fn kind(&self) -> &'static str {
        match self {
            UnitStatus::Maintenance(_) => "maintenance",
            UnitStatus::Active(_) => "active",
            UnitStatus::Blocked(_) => "blocked",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            UnitStatus::Maintenance(message)
            | UnitStatus::Active(message)
            | UnitStatus::Blocked(message) => message,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, UnitStatus::Active(_))
    }

    pub fn is_blocked(&self) -> bool {
        matches!(self, UnitStatus::Blocked(_))
    }
}

impl fmt::Display for UnitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message().is_empty() {
            f.write_str(self.kind())
        } else {
            write!(f, "{}: {}", self.kind(), self.message())
        }
    }
}

/// Current status plus every transition recorded since the board was created.
#[derive(Debug, Clone, Default)]
pub struct StatusBoard {
    current: UnitStatus,
    history: Vec<UnitStatus>,
}

impl StatusBoard {
    pub fn new(initial: UnitStatus) -> Self {
        Self {
            current: initial,
            history: Vec::new(),
        }
    }

    pub fn set(&mut self, status: UnitStatus) -> UnitStatus {
        info!(status = status.kind(), message = status.message(), "unit status set");
        self.history.push(status.clone());
        self.current = status.clone();
        status
    }

    pub fn current(&self) -> &UnitStatus {
        &self.current
    }

    /// Transitions in the order they were set.
    pub fn history(&self) -> &[UnitStatus] {
        &self.history
    }
}
