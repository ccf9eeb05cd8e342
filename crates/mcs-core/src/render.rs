//! ---
//! mcs_section: "01-core-functionality"
//! mcs_subsection: "module"
//! mcs_type: "source"
//! mcs_scope: "code"
//! mcs_description: "Reconciliation controller and host adapters."
//! mcs_version: "v0.1.0"
//! mcs_owner: "tbd"
//! ---
//! Projection of the operator configuration into the files the server reads.
//!
//! Templates live under `templates/` and are checked at compile time by
//! askama, so a field referenced in a template must exist on its context
//! struct.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use askama::Template;
use mcs_common::{AccountConfig, LayoutConfig, ServiceConfig};
use tracing::{debug, info};

use crate::artifact::ResolvedArtifact;
use crate::error::ExternalResult;
use crate::ownership;

const EULA_CONTENT: &str = "eula=true\n";
const EULA_MODE: u32 = 0o644;
const PROPERTIES_MODE: u32 = 0o755;
const UNIT_MODE: u32 = 0o775;

struct Property {
    key: String,
    value: String,
}

#[derive(Template)]
#[template(path = "server.properties", escape = "none")]
struct PropertiesTemplate<'a> {
    server_port: u16,
    gamemode: &'a str,
    extra: Vec<Property>,
}

#[derive(Template)]
#[template(path = "minecraft.service", escape = "none")]
struct UnitTemplate<'a> {
    user: &'a str,
    group: &'a str,
    home: String,
    server_jar: String,
}

#[derive(Debug, Clone)]
pub struct ConfigRenderer {
    layout: LayoutConfig,
    account: AccountConfig,
}

impl ConfigRenderer {
    pub fn new(layout: LayoutConfig, account: AccountConfig) -> Self {
        Self { layout, account }
    }

    /// Accept the EULA. Overwritten unconditionally on every install.
    pub fn render_eula(&self) -> ExternalResult<PathBuf> {
        let path = self.layout.eula_path();
        self.write(&path, EULA_CONTENT, EULA_MODE, self.service_owner())?;
        info!(path = %path.display(), "eula.txt rendered");
        Ok(path)
    }

    pub fn render_properties(&self, service: &ServiceConfig) -> ExternalResult<PathBuf> {
        let template = PropertiesTemplate {
            server_port: service.server_port,
            gamemode: &service.gamemode,
            extra: service
                .extra_properties()
                .into_iter()
                .map(|(key, value)| Property { key, value })
                .collect(),
        };
        let body = template
            .render()
            .context("failed to render server.properties")?;
        let path = self.layout.properties_path();
        self.write(&path, &body, PROPERTIES_MODE, self.service_owner())?;
        info!(path = %path.display(), port = service.server_port, "server.properties rendered");
        Ok(path)
    }

    pub fn render_unit(&self, artifact: &ResolvedArtifact) -> ExternalResult<PathBuf> {
        let template = UnitTemplate {
            user: &self.account.user,
            group: &self.account.group,
            home: self.layout.home.display().to_string(),
            server_jar: artifact.path.display().to_string(),
        };
        let body = template
            .render()
            .context("failed to render service unit")?;
        let path = self.layout.unit_path.clone();
        self.write(&path, &body, UNIT_MODE, self.unit_owner())?;
        info!(path = %path.display(), server_jar = %artifact.path.display(), "service unit rendered");
        Ok(path)
    }

    fn service_owner(&self) -> (&str, &str) {
        (&self.account.user, &self.account.group)
    }

    /// The unit is group-writable, so its group must stay out of the
    /// service account's reach.
    fn unit_owner(&self) -> (&str, &str) {
        (&self.account.unit_owner, &self.account.unit_group)
    }

    fn write(
        &self,
        path: &Path,
        body: &str,
        mode: u32,
        (user, group): (&str, &str),
    ) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("unable to create directory {}", parent.display()))?;
        }
        let mut contents = body.to_owned();
        if !contents.ends_with('\n') {
            contents.push('\n');
        }
        fs::write(path, contents)
            .with_context(|| format!("unable to write {}", path.display()))?;
        ownership::set_mode(path, mode)?;
        if self.account.apply_ownership {
            ownership::set_owner(path, user, group)?;
        } else {
            debug!(path = %path.display(), "ownership changes disabled");
        }
        Ok(())
    }
}
