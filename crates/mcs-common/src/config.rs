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
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationSeconds};
use tracing::debug;

use crate::logging::LogFormat;

/// Name of the managed artifact the unit descriptor points at.
pub const SERVER_JAR_RESOURCE: &str = "server-jar";

fn default_server_port() -> u16 {
    25565
}

fn default_gamemode() -> String {
    "survival".to_owned()
}

fn default_home() -> PathBuf {
    PathBuf::from("/opt/minecraft")
}

fn default_unit_path() -> PathBuf {
    PathBuf::from("/etc/systemd/system/minecraft.service")
}

fn default_unit_name() -> String {
    "minecraft".to_owned()
}

fn default_jar_link() -> String {
    "minecraft_server.jar".to_owned()
}

fn default_account() -> String {
    "minecraft".to_owned()
}

fn default_unit_account() -> String {
    "root".to_owned()
}

fn default_apply_ownership() -> bool {
    true
}

fn default_runtime_package() -> String {
    "openjdk-17-jre-headless".to_owned()
}

fn default_installer() -> Vec<String> {
    vec!["apt-get".to_owned(), "-y".to_owned(), "install".to_owned()]
}

fn default_resource_directory() -> PathBuf {
    PathBuf::from("/var/lib/mcs/resources")
}

fn default_declared_resources() -> Vec<String> {
    vec![SERVER_JAR_RESOURCE.to_owned()]
}

fn default_probe_host() -> String {
    "127.0.0.1".to_owned()
}

fn default_probe_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_state_path() -> PathBuf {
    PathBuf::from("/var/lib/mcs/state.json")
}

fn default_logging_directory() -> PathBuf {
    PathBuf::from("/var/log/mcs")
}

fn default_log_format() -> LogFormat {
    LogFormat::StructuredJson
}

/// Primary configuration object for the controller.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub layout: LayoutConfig,
    #[serde(default)]
    pub account: AccountConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
    #[serde(default)]
    pub resources: ResourceConfig,
    #[serde(default)]
    pub probe: ProbeConfig,
    #[serde(default)]
    pub state: StateConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Metadata describing where an [`AppConfig`] was loaded from.
#[derive(Debug, Clone)]
pub struct LoadedAppConfig {
    pub config: AppConfig,
    pub source: PathBuf,
}

impl AppConfig {
    pub const ENV_CONFIG_PATH: &'static str = "MCS_CONFIG";

    /// Load configuration from disk, respecting the `MCS_CONFIG` override.
    pub fn load<P: AsRef<Path>>(candidates: &[P]) -> Result<Self> {
        Ok(Self::load_with_source(candidates)?.config)
    }

    /// Load configuration from disk together with the effective source path.
    pub fn load_with_source<P: AsRef<Path>>(candidates: &[P]) -> Result<LoadedAppConfig> {
        if let Ok(env_path) = std::env::var(Self::ENV_CONFIG_PATH) {
            if !env_path.trim().is_empty() {
                let path = PathBuf::from(env_path);
                let config = Self::from_path(&path)?;
                return Ok(LoadedAppConfig {
                    config,
                    source: path,
                });
            }
        }

        for candidate in candidates {
            if candidate.as_ref().exists() {
                let path = candidate.as_ref().to_path_buf();
                let config = Self::from_path(&path)?;
                return Ok(LoadedAppConfig {
                    config,
                    source: path,
                });
            }
        }

        Err(anyhow!(
            "no configuration files found. inspected: {}",
            candidates
                .iter()
                .map(|p| p.as_ref().display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ))
    }

    fn from_path(path: &Path) -> Result<Self> {
        debug!(config_path = %path.display(), "loading configuration");
        let contents = fs::read_to_string(path)
            .with_context(|| format!("unable to read config file {}", path.display()))?;
        contents
            .parse::<AppConfig>()
            .with_context(|| format!("failed to load config file {}", path.display()))
    }

    /// Validate structural invariants. Option values themselves are passed
    /// through to the managed service untouched.
    pub fn validate(&self) -> Result<()> {
        if !self.layout.home.is_absolute() {
            return Err(anyhow!(
                "layout.home must be an absolute path, got {}",
                self.layout.home.display()
            ));
        }
        if self.layout.unit_name.trim().is_empty() {
            return Err(anyhow!("layout.unit_name cannot be empty"));
        }
        if self.layout.jar_link.contains('/') {
            return Err(anyhow!(
                "layout.jar_link must be a bare file name, got {}",
                self.layout.jar_link
            ));
        }
        for (key, value) in &self.service.extra {
            if matches!(value, toml::Value::Table(_) | toml::Value::Array(_)) {
                return Err(anyhow!(
                    "service.{key} must be a string, number or boolean, got a {}",
                    value.type_str()
                ));
            }
        }
        Ok(())
    }
}

impl std::str::FromStr for AppConfig {
    type Err = anyhow::Error;

    fn from_str(content: &str) -> std::result::Result<Self, Self::Err> {
        let config: AppConfig =
            toml::from_str(content).with_context(|| "failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }
}

/// Operator-facing options projected into `server.properties`.
///
/// `server-port` and `gamemode` are the options the controller itself reads;
/// every other key is carried verbatim into the rendered properties file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceConfig {
    #[serde(rename = "server-port", default = "default_server_port")]
    pub server_port: u16,
    #[serde(default = "default_gamemode")]
    pub gamemode: String,
    #[serde(flatten)]
    pub extra: IndexMap<String, toml::Value>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            server_port: default_server_port(),
            gamemode: default_gamemode(),
            extra: IndexMap::new(),
        }
    }
}

impl ServiceConfig {
    /// Pass-through options as `key=value` pairs, in declaration order.
    pub fn extra_properties(&self) -> Vec<(String, String)> {
        self.extra
            .iter()
            .map(|(key, value)| {
                let rendered = match value {
                    toml::Value::String(text) => text.clone(),
                    other => other.to_string(),
                };
                (key.clone(), rendered)
            })
            .collect()
    }
}

/// Filesystem layout of the managed installation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutConfig {
    #[serde(default = "default_home")]
    pub home: PathBuf,
    #[serde(default = "default_unit_path")]
    pub unit_path: PathBuf,
    #[serde(default = "default_unit_name")]
    pub unit_name: String,
    #[serde(default = "default_jar_link")]
    pub jar_link: String,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            home: default_home(),
            unit_path: default_unit_path(),
            unit_name: default_unit_name(),
            jar_link: default_jar_link(),
        }
    }
}

impl LayoutConfig {
    pub fn eula_path(&self) -> PathBuf {
        self.home.join("eula.txt")
    }

    pub fn properties_path(&self) -> PathBuf {
        self.home.join("server.properties")
    }

    pub fn jar_link_path(&self) -> PathBuf {
        self.home.join(&self.jar_link)
    }
}

/// Service account owning the installation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountConfig {
    #[serde(default = "default_account")]
    pub user: String,
    #[serde(default = "default_account")]
    pub group: String,
    /// Owner of the service unit file. Must not be the service account.
    #[serde(default = "default_unit_account")]
    pub unit_owner: String,
    #[serde(default = "default_unit_account")]
    pub unit_group: String,
    /// Disable to skip chown calls (unprivileged runs and tests).
    #[serde(default = "default_apply_ownership")]
    pub apply_ownership: bool,
}

impl Default for AccountConfig {
    fn default() -> Self {
        Self {
            user: default_account(),
            group: default_account(),
            unit_owner: default_unit_account(),
            unit_group: default_unit_account(),
            apply_ownership: default_apply_ownership(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default = "default_runtime_package")]
    pub package: String,
    #[serde(default = "default_installer")]
    pub installer: Vec<String>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            package: default_runtime_package(),
            installer: default_installer(),
        }
    }
}

/// Location of delivered resources and the names this deployment declares.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceConfig {
    #[serde(default = "default_resource_directory")]
    pub directory: PathBuf,
    #[serde(default = "default_declared_resources")]
    pub declared: Vec<String>,
}

impl Default for ResourceConfig {
    fn default() -> Self {
        Self {
            directory: default_resource_directory(),
            declared: default_declared_resources(),
        }
    }
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeConfig {
    #[serde(default = "default_probe_host")]
    pub host: String,
    #[serde(default = "default_probe_timeout")]
    #[serde_as(as = "DurationSeconds<u64>")]
    pub timeout: Duration,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            host: default_probe_host(),
            timeout: default_probe_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateConfig {
    #[serde(default = "default_state_path")]
    pub path: PathBuf,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            path: default_state_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_directory")]
    pub directory: PathBuf,
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
    #[serde(default)]
    pub file_prefix: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: default_logging_directory(),
            format: default_log_format(),
            file_prefix: None,
        }
    }
}
