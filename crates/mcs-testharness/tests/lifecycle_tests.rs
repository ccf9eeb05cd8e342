//! ---
//! mcs_section: "11-simulation"
//! mcs_subsection: "module"
//! mcs_type: "source"
//! mcs_scope: "code"
//! mcs_description: "Lifecycle behaviour of the reconciliation controller."
//! mcs_version: "v0.1.0"
//! mcs_owner: "tbd"
//! ---
use std::fs;

use mcs_core::{
    ControllerError, ControllerState, LifecycleEvent, LifecycleHandler, PortSpec, Protocol,
    StateStore, UnitStatus,
};
use mcs_testharness::{Harness, MemoryPortRegistry, ProbeScript, SupervisorCall};

fn harness() -> Harness {
    Harness::new().expect("harness")
}

#[tokio::test]
async fn config_changed_leaves_only_the_configured_port_open() {
    let harness = harness()
        .with_service(25570, "survival")
        .with_ports(MemoryPortRegistry::with_opened([
            PortSpec::tcp(25565),
            PortSpec {
                port: 19132,
                protocol: Protocol::Udp,
            },
        ]));
    harness.deliver_artifact(4096).unwrap();

    let mut controller = harness.controller();
    let status = controller.on_config_changed().await;

    assert_eq!(status, UnitStatus::active("Ready"));
    assert_eq!(harness.ports.opened(), vec![PortSpec::tcp(25570)]);
    assert_eq!(controller.applied_port(), Some(25570));
}

#[tokio::test]
async fn stale_port_that_cannot_be_closed_blocks_config_changed() {
    let harness = harness()
        .with_service(25570, "survival")
        .with_ports(MemoryPortRegistry::with_opened([PortSpec::tcp(25565)]));
    harness.deliver_artifact(10).unwrap();
    harness.ports.fail_close(true);

    let mut controller = harness.controller();
    let status = controller.on_config_changed().await;

    assert_eq!(
        status,
        UnitStatus::blocked(
            "Failed to close port 25565/tcp; check the controller log for more info"
        )
    );
    assert_eq!(harness.ports.opened(), vec![PortSpec::tcp(25565)]);
    assert!(harness.supervisor.calls().is_empty());
    assert_eq!(controller.applied_port(), None);
}

#[tokio::test]
async fn install_twice_writes_same_marker_and_ends_active() {
    let harness = harness();
    let delivered = harness.deliver_artifact(4096).unwrap();

    let mut controller = harness.controller();
    let first = controller.on_install().await;
    let first_marker = harness.read_home_file("eula.txt").unwrap();
    let second = controller.on_install().await;
    let second_marker = harness.read_home_file("eula.txt").unwrap();

    assert_eq!(first, UnitStatus::active(""));
    assert_eq!(second, first);
    assert_eq!(first_marker, "eula=true\n");
    assert_eq!(second_marker, first_marker);
    assert_eq!(
        fs::read_link(harness.config.layout.jar_link_path()).unwrap(),
        delivered
    );
    assert_eq!(harness.supervisor.count(SupervisorCall::ReloadDefinitions), 2);
    assert_eq!(harness.supervisor.count(SupervisorCall::Start), 0);
}

#[tokio::test]
async fn install_reports_runtime_package_while_provisioning() {
    let harness = harness();
    harness.deliver_artifact(1).unwrap();

    let mut controller = harness.controller();
    controller.on_install().await;

    assert_eq!(
        controller.history().first(),
        Some(&UnitStatus::maintenance("openjdk-17-jre-headless"))
    );
    let steps = harness.provisioner.steps();
    assert_eq!(steps.len(), 5);
    assert_eq!(steps[0], "install_package:openjdk-17-jre-headless");
    assert_eq!(steps[3], "ensure_user:minecraft");
}

#[tokio::test]
async fn install_continues_after_provisioning_failure() {
    let harness = harness();
    harness.deliver_artifact(1).unwrap();
    harness.provisioner.fail_at("ensure_user");

    let mut controller = harness.controller();
    let status = controller.on_install().await;

    assert_eq!(status, UnitStatus::active(""));
    let steps = harness.provisioner.steps();
    assert_eq!(steps.last().map(String::as_str), Some("ensure_user:minecraft"));
    assert!(!steps.iter().any(|step| step.starts_with("own_recursively")));
    assert!(harness.config.layout.unit_path.exists());
}

#[tokio::test]
async fn install_renders_unit_and_properties() {
    let mut harness = harness().with_service(25566, "creative");
    harness
        .config
        .service
        .extra
        .insert("motd".into(), toml::Value::String("hello".into()));
    let delivered = harness.deliver_artifact(1).unwrap();

    let mut controller = harness.controller();
    controller.on_install().await;

    let properties = harness.read_home_file("server.properties").unwrap();
    assert!(properties.contains("server-port=25566\n"));
    assert!(properties.contains("gamemode=creative\n"));
    assert!(properties.contains("motd=hello\n"));

    let unit = fs::read_to_string(&harness.config.layout.unit_path).unwrap();
    assert!(unit.contains(&format!("-jar {} nogui", delivered.display())));
}

#[tokio::test]
async fn install_without_declared_artifact_is_blocked() {
    let mut harness = harness();
    harness.deliver_artifact(1).unwrap();
    harness.undeclare_artifact();

    let mut controller = harness.controller();
    let status = controller.on_install().await;

    assert!(status.is_blocked());
    assert!(status.message().starts_with("Resource 'server-jar' not found"));
    assert!(!harness.config.layout.unit_path.exists());
}

#[tokio::test]
async fn install_with_undelivered_artifact_is_blocked() {
    let harness = harness();

    let mut controller = harness.controller();
    let status = controller.on_install().await;

    assert!(status.is_blocked());
    assert!(status.message().contains("claiming resource: server-jar"));
    assert_eq!(harness.supervisor.count(SupervisorCall::ReloadDefinitions), 0);
}

#[tokio::test]
async fn empty_artifact_blocks_without_supervisor_action() {
    let harness = harness().with_service(25565, "survival");
    harness.deliver_artifact(0).unwrap();

    let mut controller = harness.controller();
    let status = controller.on_config_changed().await;

    assert_eq!(status, UnitStatus::blocked("Need server-jar resource."));
    assert_eq!(harness.ports.opened(), vec![PortSpec::tcp(25565)]);
    assert!(harness.supervisor.control_calls().is_empty());
}

#[tokio::test]
async fn stopped_service_is_started_once() {
    let harness = harness().with_service(25565, "survival");
    harness.deliver_artifact(12_345_678).unwrap();
    harness.supervisor.set_running(false);

    let mut controller = harness.controller();
    let status = controller.on_config_changed().await;

    assert_eq!(status, UnitStatus::active("Ready"));
    assert_eq!(harness.supervisor.control_calls(), vec![SupervisorCall::Start]);
    assert_eq!(
        controller.history(),
        &[
            UnitStatus::maintenance("... starting"),
            UnitStatus::active("Ready")
        ]
    );
}

#[tokio::test]
async fn running_service_is_restarted_once() {
    let harness = harness();
    harness.deliver_artifact(12_345_678).unwrap();
    harness.supervisor.set_running(true);

    let mut controller = harness.controller();
    let status = controller.on_config_changed().await;

    assert_eq!(status, UnitStatus::active("Ready"));
    assert_eq!(harness.supervisor.control_calls(), vec![SupervisorCall::Restart]);
    assert!(controller
        .history()
        .contains(&UnitStatus::maintenance("... restarting")));
}

#[tokio::test]
async fn failed_start_is_blocked() {
    let harness = harness();
    harness.deliver_artifact(1).unwrap();
    harness.supervisor.fail_control(true);

    let mut controller = harness.controller();
    let status = controller.on_config_changed().await;

    assert!(status.is_blocked());
    assert!(status.message().starts_with("Failed to start minecraft"));
}

#[tokio::test]
async fn refused_port_blocks_before_touching_the_service() {
    let harness = harness();
    harness.deliver_artifact(1).unwrap();
    harness.ports.fail_open(true);

    let mut controller = harness.controller();
    let status = controller.on_config_changed().await;

    assert!(status.is_blocked());
    assert!(status.message().starts_with("Failed to open port 25565"));
    assert!(harness.supervisor.calls().is_empty());
    assert_eq!(controller.applied_port(), None);
}

#[tokio::test]
async fn upgrade_relinks_without_supervisor_calls() {
    let harness = harness();
    harness.deliver_artifact_as("server-1.20.jar", 10).unwrap();
    let mut controller = harness.controller();
    controller.on_install().await;
    let installed = controller.status().clone();
    let calls_after_install = harness.supervisor.calls().len();

    let upgraded = harness.deliver_artifact_as("server-1.21.jar", 20).unwrap();
    let status = controller.on_upgrade().await;

    assert_eq!(status, installed);
    assert_eq!(
        fs::read_link(harness.config.layout.jar_link_path()).unwrap(),
        upgraded
    );
    assert_eq!(harness.supervisor.calls().len(), calls_after_install);
}

#[tokio::test]
async fn update_status_reports_online_players() {
    let harness = harness().with_service(25565, "creative");
    harness.probe.set(ProbeScript::Online(3));
    harness.supervisor.set_running(true);

    let mut controller = harness.controller();
    let status = controller.on_update_status().await.unwrap();

    assert_eq!(status, UnitStatus::active("3 players online (creative)"));
    assert_eq!(harness.probe.queries(), vec![("127.0.0.1".to_owned(), 25565)]);
}

#[tokio::test]
async fn update_status_reports_stopped_service_as_not_running() {
    let harness = harness();
    harness.probe.set(ProbeScript::Online(0));
    harness.supervisor.set_running(false);

    let mut controller = harness.controller();
    let status = controller.on_update_status().await.unwrap();

    assert_eq!(status, UnitStatus::active("Not running"));
}

#[tokio::test]
async fn unreachable_server_leaves_status_unchanged() {
    let harness = harness();
    harness.probe.set(ProbeScript::Unreachable);
    let previous = UnitStatus::blocked("Need server-jar resource.");

    let mut controller = harness.controller().with_state(ControllerState {
        status: previous.clone(),
        applied_port: Some(25565),
        updated_at: chrono::Utc::now(),
    });
    let status = controller.on_update_status().await.unwrap();

    assert_eq!(status, previous);
    assert!(controller.history().is_empty());
}

#[tokio::test]
async fn malformed_status_answer_is_fatal() {
    let harness = harness();
    harness.probe.set(ProbeScript::Broken);

    let mut controller = harness.controller();
    let err = controller
        .dispatch(LifecycleEvent::UpdateStatus)
        .await
        .unwrap_err();

    let ControllerError::Fatal { event, .. } = err;
    assert_eq!(event, LifecycleEvent::UpdateStatus);
}

#[tokio::test]
async fn state_survives_between_invocations() {
    let harness = harness();
    harness.deliver_artifact(1).unwrap();
    let store = StateStore::new(harness.config.state.path.clone());

    let mut controller = harness.controller();
    controller
        .dispatch(LifecycleEvent::ConfigChanged)
        .await
        .unwrap();
    store.save(&controller.snapshot_state()).unwrap();

    let restored = store.load().expect("state persisted");
    let resumed = harness.resumed_controller(restored);
    assert_eq!(resumed.status(), &UnitStatus::active("Ready"));
    assert_eq!(resumed.applied_port(), Some(25565));
}
