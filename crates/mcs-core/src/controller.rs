//! ---
//! mcs_section: "01-core-functionality"
//! mcs_subsection: "module"
//! mcs_type: "source"
//! mcs_scope: "code"
//! mcs_description: "Reconciliation controller and host adapters."
//! mcs_version: "v0.1.0"
//! mcs_owner: "tbd"
//! ---
//! Event handlers driving the managed server toward its configured state.
//!
//! Every handler returns the resulting [`UnitStatus`]. Only a non-connectivity
//! failure while polling status escapes as [`ControllerError::Fatal`]; every
//! other failure is folded into a blocked status or logged and swallowed.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use mcs_common::{AppConfig, SERVER_JAR_RESOURCE};
use mcs_logging::{log_system_event, mcs_error, mcs_info, mcs_warn, LogContext, SystemEventOutcome};

use crate::artifact::{ArtifactResolver, DirectoryResourceStore, ResourceStore};
use crate::error::{ControllerError, ExternalError};
use crate::ports::{HookToolPorts, PortManager, PortRegistry};
use crate::probe::{JavaStatusProbe, StatusProbe};
use crate::provision::{self, HostProvisioner, SystemProvisioner};
use crate::render::ConfigRenderer;
use crate::state::ControllerState;
use crate::status::{StatusBoard, UnitStatus};
use crate::supervisor::{ServiceSupervisor, Systemctl};

/// Lifecycle events delivered by the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleEvent {
    Install,
    ConfigChanged,
    Upgrade,
    UpdateStatus,
}

impl LifecycleEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleEvent::Install => "install",
            LifecycleEvent::ConfigChanged => "config-changed",
            LifecycleEvent::Upgrade => "upgrade",
            LifecycleEvent::UpdateStatus => "update-status",
        }
    }
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry point per lifecycle event.
#[async_trait]
pub trait LifecycleHandler: Send {
    async fn on_install(&mut self) -> UnitStatus;
    async fn on_config_changed(&mut self) -> UnitStatus;
    async fn on_upgrade(&mut self) -> UnitStatus;
    async fn on_update_status(&mut self) -> Result<UnitStatus, ControllerError>;
}

/// External capabilities the controller drives.
#[derive(Clone)]
pub struct Collaborators {
    pub resources: Arc<dyn ResourceStore>,
    pub supervisor: Arc<dyn ServiceSupervisor>,
    pub ports: Arc<dyn PortRegistry>,
    pub probe: Arc<dyn StatusProbe>,
    pub provisioner: Arc<dyn HostProvisioner>,
}

impl Collaborators {
    /// Adapters talking to the real host.
    pub fn system(config: &AppConfig) -> Self {
        Self {
            resources: Arc::new(DirectoryResourceStore::new(
                config.resources.directory.clone(),
                config.resources.declared.clone(),
            )),
            supervisor: Arc::new(Systemctl::new(config.layout.unit_name.clone())),
            ports: Arc::new(HookToolPorts::new()),
            probe: Arc::new(JavaStatusProbe::new(config.probe.timeout)),
            provisioner: Arc::new(SystemProvisioner::from_config(config)),
        }
    }
}

pub struct Controller {
    config: Arc<AppConfig>,
    artifacts: ArtifactResolver,
    renderer: ConfigRenderer,
    ports: PortManager,
    supervisor: Arc<dyn ServiceSupervisor>,
    probe: Arc<dyn StatusProbe>,
    provisioner: Arc<dyn HostProvisioner>,
    board: StatusBoard,
    applied_port: Option<u16>,
}

impl Controller {
    pub fn new(config: Arc<AppConfig>, collaborators: Collaborators) -> Self {
        let renderer = ConfigRenderer::new(config.layout.clone(), config.account.clone());
        Self {
            artifacts: ArtifactResolver::new(collaborators.resources, SERVER_JAR_RESOURCE),
            renderer,
            ports: PortManager::new(collaborators.ports),
            supervisor: collaborators.supervisor,
            probe: collaborators.probe,
            provisioner: collaborators.provisioner,
            board: StatusBoard::default(),
            applied_port: None,
            config,
        }
    }

    /// Resume from the state persisted by a previous invocation.
    pub fn with_state(mut self, state: ControllerState) -> Self {
        self.board = StatusBoard::new(state.status);
        self.applied_port = state.applied_port;
        self
    }

    pub fn status(&self) -> &UnitStatus {
        self.board.current()
    }

    /// Every status set since the controller was built, oldest first.
    pub fn history(&self) -> &[UnitStatus] {
        self.board.history()
    }

    pub fn applied_port(&self) -> Option<u16> {
        self.applied_port
    }

    pub fn snapshot_state(&self) -> ControllerState {
        ControllerState {
            status: self.board.current().clone(),
            applied_port: self.applied_port,
            updated_at: Utc::now(),
        }
    }

    /// Run the handler for `event` and record its outcome.
    pub async fn dispatch(&mut self, event: LifecycleEvent) -> Result<UnitStatus, ControllerError> {
        let outcome = match event {
            LifecycleEvent::Install => Ok(self.on_install().await),
            LifecycleEvent::ConfigChanged => Ok(self.on_config_changed().await),
            LifecycleEvent::Upgrade => Ok(self.on_upgrade().await),
            LifecycleEvent::UpdateStatus => self.on_update_status().await,
        };
        let config = Arc::clone(&self.config);
        let ctx = log_context(&config, event);
        match &outcome {
            Ok(status) if status.is_blocked() => log_system_event(
                Some(&ctx),
                "lifecycle.handled",
                &status.to_string(),
                SystemEventOutcome::Fault,
            ),
            Ok(status) => log_system_event(
                Some(&ctx),
                "lifecycle.handled",
                &status.to_string(),
                SystemEventOutcome::Success,
            ),
            Err(err) => log_system_event(
                Some(&ctx),
                "lifecycle.failed",
                &err.to_string(),
                SystemEventOutcome::Fault,
            ),
        }
        outcome
    }

    async fn install_service(&mut self, ctx: &LogContext<'_>) -> Result<UnitStatus, UnitStatus> {
        let config = Arc::clone(&self.config);
        self.renderer
            .render_eula()
            .map_err(|err| render_blocked(ctx, "eula.txt", &err))?;
        self.renderer
            .render_properties(&config.service)
            .map_err(|err| render_blocked(ctx, "server.properties", &err))?;
        let artifact = self
            .artifacts
            .resolve()
            .await
            .map_err(|err| artifact_blocked(ctx, &err))?;
        self.renderer
            .render_unit(&artifact)
            .map_err(|err| render_blocked(ctx, "service unit", &err))?;
        self.artifacts
            .link(&config.layout.jar_link_path())
            .await
            .map_err(|err| artifact_blocked(ctx, &err))?;
        if let Err(err) = self.supervisor.reload_definitions().await {
            mcs_warn!(context = *ctx, "failed to reload unit definitions: {err}");
        }
        Ok(UnitStatus::active(""))
    }

    async fn start_or_restart(&mut self, ctx: &LogContext<'_>) -> Result<UnitStatus, UnitStatus> {
        let port = self.config.service.server_port;
        self.ports.open_desired(port).await.map_err(|err| {
            mcs_error!(context = *ctx, "failed to open port {port}: {err}");
            UnitStatus::blocked(format!(
                "Failed to open port {port}; check the controller log for more info"
            ))
        })?;
        self.applied_port = Some(port);

        let artifact = self
            .artifacts
            .resolve()
            .await
            .map_err(|err| artifact_blocked(ctx, &err))?;
        if !artifact.is_delivered() {
            mcs_warn!(context = *ctx, "{} is empty; waiting for a real upload", artifact.name);
            return Err(UnitStatus::blocked(format!("Need {} resource.", artifact.name)));
        }

        let unit = self.config.layout.unit_name.clone();
        let running = self.supervisor.is_running().await.map_err(|err| {
            mcs_error!(context = *ctx, "unable to query {unit}: {err}");
            UnitStatus::blocked(format!(
                "Unable to query {unit}; check the controller log for more info"
            ))
        })?;
        if running {
            mcs_info!(context = *ctx, "restarting {unit}");
            self.board.set(UnitStatus::maintenance("... restarting"));
            self.supervisor.restart().await.map_err(|err| {
                mcs_error!(context = *ctx, "failed to restart {unit}: {err}");
                UnitStatus::blocked(format!(
                    "Failed to restart {unit}; check the controller log for more info"
                ))
            })?;
        } else {
            mcs_info!(context = *ctx, "starting {unit}");
            self.board.set(UnitStatus::maintenance("... starting"));
            self.supervisor.start().await.map_err(|err| {
                mcs_error!(context = *ctx, "failed to start {unit}: {err}");
                UnitStatus::blocked(format!(
                    "Failed to start {unit}; check the controller log for more info"
                ))
            })?;
        }
        Ok(UnitStatus::active("Ready"))
    }
}

#[async_trait]
impl LifecycleHandler for Controller {
    async fn on_install(&mut self) -> UnitStatus {
        let config = Arc::clone(&self.config);
        let ctx = log_context(&config, LifecycleEvent::Install);
        self.board
            .set(UnitStatus::maintenance(config.runtime.package.clone()));
        if let Err(err) = provision::provision_host(self.provisioner.as_ref(), &config).await {
            mcs_error!(context = ctx, "failed to install os requirements: {err}");
        }
        let status = self.install_service(&ctx).await.unwrap_or_else(|status| status);
        self.board.set(status)
    }

    async fn on_config_changed(&mut self) -> UnitStatus {
        let config = Arc::clone(&self.config);
        let ctx = log_context(&config, LifecycleEvent::ConfigChanged);
        let previous = self
            .applied_port
            .map(|port| port.to_string())
            .unwrap_or_else(|| "none".to_owned());
        mcs_info!(
            context = ctx,
            "server-port is {} (previously {previous}); closing opened ports",
            config.service.server_port
        );
        match self.ports.close_all().await {
            Ok(report) if report.is_complete() => {}
            Ok(report) => {
                let stale = report
                    .failed
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", ");
                mcs_error!(context = ctx, "ports still open after close: {stale}");
                return self.board.set(UnitStatus::blocked(format!(
                    "Failed to close port {stale}; check the controller log for more info"
                )));
            }
            Err(err) => {
                mcs_error!(context = ctx, "unable to list opened ports: {err}");
                return self.board.set(UnitStatus::blocked(
                    "Failed to list opened ports; check the controller log for more info",
                ));
            }
        }
        if let Err(err) = self.renderer.render_properties(&config.service) {
            let status = render_blocked(&ctx, "server.properties", &err);
            return self.board.set(status);
        }
        let status = self
            .start_or_restart(&ctx)
            .await
            .unwrap_or_else(|status| status);
        self.board.set(status)
    }

    async fn on_upgrade(&mut self) -> UnitStatus {
        let config = Arc::clone(&self.config);
        let ctx = log_context(&config, LifecycleEvent::Upgrade);
        match self.artifacts.link(&config.layout.jar_link_path()).await {
            Ok(artifact) => {
                mcs_info!(
                    context = ctx,
                    "{} relinked to {}",
                    artifact.name,
                    artifact.path.display()
                );
                self.board.current().clone()
            }
            Err(err) => {
                let status = artifact_blocked(&ctx, &err);
                self.board.set(status)
            }
        }
    }

    async fn on_update_status(&mut self) -> Result<UnitStatus, ControllerError> {
        let config = Arc::clone(&self.config);
        let ctx = log_context(&config, LifecycleEvent::UpdateStatus);
        let port = config.service.server_port;
        let report = match self.probe.query_status(&config.probe.host, port).await {
            Ok(report) => report,
            Err(ExternalError::ConnectivityFailed(err)) => {
                mcs_error!(context = ctx, "Unable to connect to get server status: {err}");
                return Ok(self.board.current().clone());
            }
            Err(source) => {
                mcs_error!(context = ctx, "status probe failed: {source}");
                return Err(ControllerError::Fatal {
                    event: LifecycleEvent::UpdateStatus,
                    source,
                });
            }
        };
        let running = self
            .supervisor
            .is_running()
            .await
            .map_err(|source| ControllerError::Fatal {
                event: LifecycleEvent::UpdateStatus,
                source,
            })?;
        let status = if running {
            UnitStatus::active(format!(
                "{} players online ({})",
                report.online_players, config.service.gamemode
            ))
        } else {
            mcs_warn!(
                context = ctx,
                "status probe answered but {} is not running",
                config.layout.unit_name
            );
            UnitStatus::active("Not running")
        };
        Ok(self.board.set(status))
    }
}

fn log_context(config: &AppConfig, event: LifecycleEvent) -> LogContext<'_> {
    LogContext::new()
        .with_unit(&config.layout.unit_name)
        .with_event(event.as_str())
        .with_port(config.service.server_port)
}

fn artifact_blocked(ctx: &LogContext<'_>, err: &ExternalError) -> UnitStatus {
    mcs_error!(context = *ctx, "artifact unavailable: {err}");
    UnitStatus::blocked(err.blocked_reason())
}

fn render_blocked(ctx: &LogContext<'_>, target: &str, err: &ExternalError) -> UnitStatus {
    mcs_error!(context = *ctx, "failed to render {target}: {err}");
    UnitStatus::blocked(format!(
        "Failed to render {target}; check the controller log for more info"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_names_match_hook_names() {
        assert_eq!(LifecycleEvent::Install.to_string(), "install");
        assert_eq!(LifecycleEvent::ConfigChanged.to_string(), "config-changed");
        assert_eq!(LifecycleEvent::Upgrade.to_string(), "upgrade");
        assert_eq!(LifecycleEvent::UpdateStatus.to_string(), "update-status");
    }
}
