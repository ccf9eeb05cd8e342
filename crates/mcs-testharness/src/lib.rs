//! ---
//! mcs_section: "11-simulation"
//! mcs_subsection: "01-bootstrap"
//! mcs_type: "source"
//! mcs_scope: "code"
//! mcs_description: "In-memory collaborators and temp-dir harness for lifecycle tests."
//! mcs_version: "v0.1.0"
//! mcs_owner: "tbd"
//! ---
//! Test harness for the reconciliation controller.
//!
//! [`Harness`] lays out a throwaway installation under a temporary directory
//! and wires a [`Controller`] to recording fakes, so lifecycle behaviour can be
//! asserted without root, systemd or a running game server.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use mcs_common::{AppConfig, SERVER_JAR_RESOURCE};
use mcs_core::{
    Collaborators, Controller, ControllerState, DirectoryResourceStore, ExternalError,
    ExternalResult, HostProvisioner, PortRegistry, PortSpec, ProbeReport, ServiceSupervisor,
    StatusProbe,
};
use mcs_net::ProbeError;
use tempfile::TempDir;
use tracing::debug;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Calls observed by [`FakeSupervisor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorCall {
    IsRunning,
    Start,
    Restart,
    ReloadDefinitions,
}

/// Supervisor that tracks a running flag and records every call.
#[derive(Debug, Default)]
pub struct FakeSupervisor {
    running: Mutex<bool>,
    fail_control: Mutex<bool>,
    calls: Mutex<Vec<SupervisorCall>>,
}

impl FakeSupervisor {
    pub fn set_running(&self, running: bool) {
        *lock(&self.running) = running;
    }

    /// Make start and restart fail.
    pub fn fail_control(&self, fail: bool) {
        *lock(&self.fail_control) = fail;
    }

    pub fn calls(&self) -> Vec<SupervisorCall> {
        lock(&self.calls).clone()
    }

    pub fn count(&self, call: SupervisorCall) -> usize {
        lock(&self.calls).iter().filter(|seen| **seen == call).count()
    }

    /// Calls that change the service, ignoring running-state queries.
    pub fn control_calls(&self) -> Vec<SupervisorCall> {
        lock(&self.calls)
            .iter()
            .copied()
            .filter(|call| *call != SupervisorCall::IsRunning)
            .collect()
    }

    fn record(&self, call: SupervisorCall) {
        lock(&self.calls).push(call);
    }

    fn control(&self, call: SupervisorCall) -> ExternalResult<()> {
        self.record(call);
        if *lock(&self.fail_control) {
            return Err(anyhow!("{call:?} refused by fake supervisor").into());
        }
        self.set_running(true);
        Ok(())
    }
}

#[async_trait]
impl ServiceSupervisor for FakeSupervisor {
    async fn is_running(&self) -> ExternalResult<bool> {
        self.record(SupervisorCall::IsRunning);
        Ok(*lock(&self.running))
    }

    async fn start(&self) -> ExternalResult<()> {
        self.control(SupervisorCall::Start)
    }

    async fn restart(&self) -> ExternalResult<()> {
        self.control(SupervisorCall::Restart)
    }

    async fn reload_definitions(&self) -> ExternalResult<()> {
        self.record(SupervisorCall::ReloadDefinitions);
        Ok(())
    }
}

/// Port registry holding the opened set in memory.
#[derive(Debug, Default)]
pub struct MemoryPortRegistry {
    opened: Mutex<Vec<PortSpec>>,
    fail_open: Mutex<bool>,
    fail_close: Mutex<bool>,
}

impl MemoryPortRegistry {
    pub fn with_opened(specs: impl IntoIterator<Item = PortSpec>) -> Self {
        let registry = Self::default();
        lock(&registry.opened).extend(specs);
        registry
    }

    pub fn opened(&self) -> Vec<PortSpec> {
        lock(&self.opened).clone()
    }

    pub fn fail_open(&self, fail: bool) {
        *lock(&self.fail_open) = fail;
    }

    pub fn fail_close(&self, fail: bool) {
        *lock(&self.fail_close) = fail;
    }
}

#[async_trait]
impl PortRegistry for MemoryPortRegistry {
    async fn opened_ports(&self) -> ExternalResult<Vec<PortSpec>> {
        Ok(self.opened())
    }

    async fn open_port(&self, spec: PortSpec) -> ExternalResult<()> {
        if *lock(&self.fail_open) {
            return Err(anyhow!("open-port {spec} rejected").into());
        }
        let mut opened = lock(&self.opened);
        if !opened.contains(&spec) {
            opened.push(spec);
        }
        Ok(())
    }

    async fn close_port(&self, spec: PortSpec) -> ExternalResult<()> {
        if *lock(&self.fail_close) {
            return Err(anyhow!("close-port {spec} rejected").into());
        }
        lock(&self.opened).retain(|open| *open != spec);
        Ok(())
    }
}

/// Canned answer for [`ScriptedProbe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeScript {
    Online(u32),
    /// Nothing listens on the port.
    Unreachable,
    /// Something answers, but not with a valid status payload.
    Broken,
}

#[derive(Debug)]
pub struct ScriptedProbe {
    script: Mutex<ProbeScript>,
    queries: Mutex<Vec<(String, u16)>>,
}

impl Default for ScriptedProbe {
    fn default() -> Self {
        Self {
            script: Mutex::new(ProbeScript::Unreachable),
            queries: Mutex::new(Vec::new()),
        }
    }
}

impl ScriptedProbe {
    pub fn set(&self, script: ProbeScript) {
        *lock(&self.script) = script;
    }

    pub fn queries(&self) -> Vec<(String, u16)> {
        lock(&self.queries).clone()
    }
}

#[async_trait]
impl StatusProbe for ScriptedProbe {
    async fn query_status(&self, host: &str, port: u16) -> ExternalResult<ProbeReport> {
        lock(&self.queries).push((host.to_owned(), port));
        match *lock(&self.script) {
            ProbeScript::Online(online_players) => Ok(ProbeReport { online_players }),
            ProbeScript::Unreachable => Err(ExternalError::from(ProbeError::Connect {
                addr: format!("{host}:{port}"),
                source: io::Error::from(io::ErrorKind::ConnectionRefused),
            })),
            ProbeScript::Broken => Err(ExternalError::from(ProbeError::Protocol(
                "unexpected packet id 0x01".to_owned(),
            ))),
        }
    }
}

/// Provisioner that records each step and can fail at a named one.
#[derive(Debug, Default)]
pub struct RecordingProvisioner {
    steps: Mutex<Vec<String>>,
    fail_at: Mutex<Option<&'static str>>,
}

impl RecordingProvisioner {
    /// Fail when the step named `step` (e.g. `"ensure_user"`) runs.
    pub fn fail_at(&self, step: &'static str) {
        *lock(&self.fail_at) = Some(step);
    }

    pub fn steps(&self) -> Vec<String> {
        lock(&self.steps).clone()
    }

    fn step(&self, name: &'static str, detail: &str) -> ExternalResult<()> {
        lock(&self.steps).push(format!("{name}:{detail}"));
        if *lock(&self.fail_at) == Some(name) {
            return Err(anyhow!("{name} failed").into());
        }
        Ok(())
    }
}

#[async_trait]
impl HostProvisioner for RecordingProvisioner {
    async fn install_package(&self, package: &str) -> ExternalResult<()> {
        self.step("install_package", package)
    }

    async fn create_home(&self, home: &Path) -> ExternalResult<()> {
        self.step("create_home", &home.display().to_string())
    }

    async fn ensure_group(&self, group: &str) -> ExternalResult<()> {
        self.step("ensure_group", group)
    }

    async fn ensure_user(&self, user: &str, _group: &str, _home: &Path) -> ExternalResult<()> {
        self.step("ensure_user", user)
    }

    async fn own_recursively(&self, root: &Path, _user: &str, _group: &str) -> ExternalResult<()> {
        self.step("own_recursively", &root.display().to_string())
    }
}

/// Temporary installation wired to recording fakes.
pub struct Harness {
    dir: TempDir,
    pub config: AppConfig,
    pub supervisor: Arc<FakeSupervisor>,
    pub ports: Arc<MemoryPortRegistry>,
    pub probe: Arc<ScriptedProbe>,
    pub provisioner: Arc<RecordingProvisioner>,
}

impl Harness {
    pub fn new() -> Result<Self> {
        let dir = tempfile::tempdir().context("unable to create harness directory")?;
        let root = dir.path();
        let mut config = AppConfig::default();
        config.layout.home = root.join("home");
        config.layout.unit_path = root.join("systemd").join("minecraft.service");
        config.resources.directory = root.join("resources");
        config.state.path = root.join("state").join("state.json");
        config.logging.directory = root.join("log");
        config.account.apply_ownership = false;
        Ok(Self {
            dir,
            config,
            supervisor: Arc::new(FakeSupervisor::default()),
            ports: Arc::new(MemoryPortRegistry::default()),
            probe: Arc::new(ScriptedProbe::default()),
            provisioner: Arc::new(RecordingProvisioner::default()),
        })
    }

    pub fn with_service(mut self, port: u16, gamemode: &str) -> Self {
        self.config.service.server_port = port;
        self.config.service.gamemode = gamemode.to_owned();
        self
    }

    pub fn with_ports(mut self, registry: MemoryPortRegistry) -> Self {
        self.ports = Arc::new(registry);
        self
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Deliver `server.jar` of the given size, replacing any earlier delivery.
    pub fn deliver_artifact(&self, size: u64) -> Result<PathBuf> {
        self.deliver_artifact_as("server.jar", size)
    }

    pub fn deliver_artifact_as(&self, file_name: &str, size: u64) -> Result<PathBuf> {
        let slot = self.config.resources.directory.join(SERVER_JAR_RESOURCE);
        if slot.exists() {
            fs::remove_dir_all(&slot)
                .with_context(|| format!("unable to clear {}", slot.display()))?;
        }
        fs::create_dir_all(&slot).with_context(|| format!("unable to create {}", slot.display()))?;
        let path = slot.join(file_name);
        let file = fs::File::create(&path)
            .with_context(|| format!("unable to create {}", path.display()))?;
        file.set_len(size)
            .with_context(|| format!("unable to size {}", path.display()))?;
        debug!(path = %path.display(), size, "artifact delivered");
        Ok(path)
    }

    /// Drop the artifact from the declared resources.
    pub fn undeclare_artifact(&mut self) {
        self.config
            .resources
            .declared
            .retain(|name| name != SERVER_JAR_RESOURCE);
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            resources: Arc::new(DirectoryResourceStore::new(
                self.config.resources.directory.clone(),
                self.config.resources.declared.clone(),
            )),
            supervisor: self.supervisor.clone(),
            ports: self.ports.clone(),
            probe: self.probe.clone(),
            provisioner: self.provisioner.clone(),
        }
    }

    pub fn controller(&self) -> Controller {
        Controller::new(Arc::new(self.config.clone()), self.collaborators())
    }

    /// Controller resumed from `state`, as the next hook invocation would be.
    pub fn resumed_controller(&self, state: ControllerState) -> Controller {
        self.controller().with_state(state)
    }

    pub fn read_home_file(&self, name: &str) -> Result<String> {
        let path = self.config.layout.home.join(name);
        fs::read_to_string(&path).with_context(|| format!("unable to read {}", path.display()))
    }
}
