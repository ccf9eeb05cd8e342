//! ---
//! mcs_section: "01-core-functionality"
//! mcs_subsection: "module"
//! mcs_type: "source"
//! mcs_scope: "code"
//! mcs_description: "Shared primitives and utilities for the controller runtime."
//! mcs_version: "v0.1.0"
//! mcs_owner: "tbd"
//! ---
use std::fs;
use std::time::Duration;

use mcs_common::config::AppConfig;
use tempfile::tempdir;

const SAMPLE: &str = r#"
[service]
server-port = 25570
gamemode = "creative"
motd = "Welcome home"
max-players = 12
pvp = false

[layout]
home = "/srv/minecraft"

[probe]
timeout = 2

[account]
apply_ownership = false
"#;

#[test]
fn service_section_keeps_pass_through_options_in_order() {
    let config: AppConfig = SAMPLE.parse().expect("parse sample");
    assert_eq!(config.service.server_port, 25570);
    assert_eq!(config.service.gamemode, "creative");
    let extras = config.service.extra_properties();
    assert_eq!(
        extras,
        vec![
            ("motd".to_owned(), "Welcome home".to_owned()),
            ("max-players".to_owned(), "12".to_owned()),
            ("pvp".to_owned(), "false".to_owned()),
        ]
    );
    assert_eq!(config.probe.timeout, Duration::from_secs(2));
    assert!(!config.account.apply_ownership);
    assert_eq!(
        config.layout.properties_path().display().to_string(),
        "/srv/minecraft/server.properties"
    );
}

#[test]
fn load_with_source_picks_first_existing_candidate() {
    let dir = tempdir().expect("tempdir");
    let missing = dir.path().join("missing.toml");
    let present = dir.path().join("mcs.toml");
    fs::write(&present, SAMPLE).expect("write config");

    let loaded = AppConfig::load_with_source(&[missing, present.clone()]).expect("load");
    assert_eq!(loaded.source, present);
    assert_eq!(loaded.config.service.server_port, 25570);
}

#[test]
fn load_reports_inspected_candidates_when_none_exist() {
    let dir = tempdir().expect("tempdir");
    let missing = dir.path().join("nothing-here.toml");
    if std::env::var(AppConfig::ENV_CONFIG_PATH).is_ok() {
        return;
    }
    let err = AppConfig::load(&[missing]).unwrap_err();
    assert!(err.to_string().contains("nothing-here.toml"));
}

#[test]
fn empty_document_uses_defaults() {
    let config: AppConfig = "".parse().expect("empty config is valid");
    assert_eq!(config.service.server_port, 25565);
    assert!(config.service.extra.is_empty());
    assert_eq!(config.layout.unit_name, "minecraft");
}

#[test]
fn unit_file_defaults_to_root_ownership() {
    let config: AppConfig = "[account]\nuser = \"mc\"\ngroup = \"mc\"\n"
        .parse()
        .expect("parse account");
    assert_eq!(config.account.unit_owner, "root");
    assert_eq!(config.account.unit_group, "root");
}

#[test]
fn nested_service_options_are_rejected() {
    let table = "[service]\nmotd = \"hi\"\n\n[service.rcon]\nport = 25575\n".parse::<AppConfig>();
    let err = table.expect_err("table option accepted");
    assert!(format!("{err:#}").contains("service.rcon"), "{err:#}");

    let array = "[service]\nops = [\"alice\", \"bob\"]\n".parse::<AppConfig>();
    let err = array.expect_err("array option accepted");
    assert!(format!("{err:#}").contains("service.ops"), "{err:#}");
}
