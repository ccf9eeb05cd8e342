//! ---
//! mcs_section: "01-core-functionality"
//! mcs_subsection: "module"
//! mcs_type: "source"
//! mcs_scope: "code"
//! mcs_description: "Reconciliation controller and host adapters."
//! mcs_version: "v0.1.0"
//! mcs_owner: "tbd"
//! ---
use std::io;

use mcs_net::ProbeError;
use thiserror::Error;

use crate::controller::LifecycleEvent;

pub type ExternalResult<T> = std::result::Result<T, ExternalError>;

/// Classified failure returned by every external-call wrapper.
#[derive(Debug, Error)]
pub enum ExternalError {
    /// The resource store failed while handing out the artifact.
    #[error("failed to claim resource {name}: {source}")]
    ArtifactClaimFailed {
        name: String,
        #[source]
        source: io::Error,
    },
    /// The artifact name is not part of the declared resources.
    #[error("resource {name} is not declared")]
    ArtifactNotDeclared { name: String },
    /// The managed service could not be reached over the network.
    #[error("connectivity failure: {0}")]
    ConnectivityFailed(#[source] ProbeError),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ExternalError {
    /// Operator-facing remediation hint used for blocked status.
    pub fn blocked_reason(&self) -> String {
        match self {
            ExternalError::ArtifactClaimFailed { name, .. } => format!(
                "Something went wrong when claiming resource: {name}; check the controller log for more info"
            ),
            ExternalError::ArtifactNotDeclared { name } => format!(
                "Resource '{name}' not found; did you forget to declare it in [resources].declared?"
            ),
            ExternalError::ConnectivityFailed(_) => {
                "Unable to reach the server; check the controller log for more info".to_owned()
            }
            ExternalError::Other(_) => {
                "Unexpected failure; check the controller log for more info".to_owned()
            }
        }
    }
}

impl From<ProbeError> for ExternalError {
    fn from(err: ProbeError) -> Self {
        if err.is_connectivity() {
            ExternalError::ConnectivityFailed(err)
        } else {
            ExternalError::Other(anyhow::Error::new(err))
        }
    }
}

/// Failure that escapes a handler boundary; the hook process exits abnormally on it.
#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("unexpected failure while handling {event}: {source}")]
    Fatal {
        event: LifecycleEvent,
        #[source]
        source: ExternalError,
    },
}
