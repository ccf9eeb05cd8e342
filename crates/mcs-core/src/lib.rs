//! ---
//! mcs_section: "01-core-functionality"
//! mcs_subsection: "module"
//! mcs_type: "source"
//! mcs_scope: "code"
//! mcs_description: "Reconciliation controller and host adapters."
//! mcs_version: "v0.1.0"
//! mcs_owner: "tbd"
//! ---
//! Reconciliation controller for a single managed Minecraft server.
//!
//! The [`Controller`] reacts to the four lifecycle events and drives the host
//! through narrow adapter traits: [`ResourceStore`], [`ServiceSupervisor`],
//! [`PortRegistry`], [`StatusProbe`] and [`HostProvisioner`].

pub mod artifact;
pub mod command;
pub mod controller;
pub mod error;
pub mod ownership;
pub mod ports;
pub mod probe;
pub mod provision;
pub mod render;
pub mod state;
pub mod status;
pub mod supervisor;

pub use artifact::{ArtifactResolver, DirectoryResourceStore, ResolvedArtifact, ResourceStore};
pub use controller::{Collaborators, Controller, LifecycleEvent, LifecycleHandler};
pub use error::{ControllerError, ExternalError, ExternalResult};
pub use ports::{CloseReport, HookToolPorts, PortManager, PortRegistry, PortSpec, Protocol};
pub use probe::{JavaStatusProbe, ProbeReport, StatusProbe};
pub use provision::{provision_host, HostProvisioner, SystemProvisioner};
pub use render::ConfigRenderer;
pub use state::{ControllerState, StateStore};
pub use status::{StatusBoard, UnitStatus};
pub use supervisor::{ServiceSupervisor, Systemctl};
