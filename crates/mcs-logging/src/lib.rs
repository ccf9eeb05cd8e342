//! ---
//! mcs_section: "03-logging"
//! mcs_subsection: "module"
//! mcs_type: "source"
//! mcs_scope: "code"
//! mcs_description: "Structured lifecycle logging adapters."
//! mcs_version: "v0.1.0"
//! mcs_owner: "tbd"
//! ---
#![warn(missing_docs)]
//! Lifecycle logging context and helpers shared by the controller and the hook binary.

use tracing::Level;

pub mod macros;

/// Structured logging context propagated by the convenience macros.
#[derive(Debug, Default, Clone)]
pub struct LogContext<'a> {
    /// Managed service unit name.
    pub unit: Option<&'a str>,
    /// Lifecycle event being handled (`install`, `config-changed`, ...).
    pub event: Option<&'a str>,
    /// Port the event concerns, if any.
    pub port: Option<u16>,
}

impl<'a> LogContext<'a> {
    /// Create an empty logging context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach the managed unit name.
    pub fn with_unit(mut self, unit: &'a str) -> Self {
        self.unit = Some(unit);
        self
    }

    /// Attach the lifecycle event name.
    pub fn with_event(mut self, event: &'a str) -> Self {
        self.event = Some(event);
        self
    }

    /// Attach a port number.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }
}

/// High-level outcome used when emitting lifecycle log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemEventOutcome {
    /// The operation completed successfully.
    Success,
    /// The operation ended blocked or failed.
    Fault,
}

impl SystemEventOutcome {
    fn as_str(&self) -> &'static str {
        match self {
            SystemEventOutcome::Success => "success",
            SystemEventOutcome::Fault => "fault",
        }
    }
}

/// Emit a standardized lifecycle event with a success/fault outcome.
pub fn log_system_event(
    context: Option<&LogContext>,
    event: &str,
    message: &str,
    outcome: SystemEventOutcome,
) {
    let default_ctx = LogContext::default();
    let ctx = context.unwrap_or(&default_ctx);
    // `tracing::event!` needs a constant level, hence the two arms.
    match outcome {
        SystemEventOutcome::Success => tracing::event!(
            Level::INFO,
            event,
            outcome = outcome.as_str(),
            unit = ctx.unit.unwrap_or(""),
            hook = ctx.event.unwrap_or(""),
            port = ctx.port.unwrap_or_default(),
            message = %message
        ),
        SystemEventOutcome::Fault => tracing::event!(
            Level::ERROR,
            event,
            outcome = outcome.as_str(),
            unit = ctx.unit.unwrap_or(""),
            hook = ctx.event.unwrap_or(""),
            port = ctx.port.unwrap_or_default(),
            message = %message
        ),
    }
}
