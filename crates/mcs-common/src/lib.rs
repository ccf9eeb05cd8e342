//! ---
//! mcs_section: "01-core-functionality"
//! mcs_subsection: "module"
//! mcs_type: "source"
//! mcs_scope: "code"
//! mcs_description: "Shared primitives and utilities for the controller runtime."
//! mcs_version: "v0.1.0"
//! mcs_owner: "tbd"
//! ---
//! Core shared primitives for the MCS workspace.
//! This crate exposes configuration loading and tracing initialisation
//! consumed by the controller and the hook binary.

pub mod config;
pub mod logging;

pub use config::{
    AccountConfig, AppConfig, LayoutConfig, LoadedAppConfig, LoggingConfig, ProbeConfig,
    ResourceConfig, RuntimeConfig, ServiceConfig, StateConfig, SERVER_JAR_RESOURCE,
};
pub use logging::{init_tracing, LogFormat};
