//! ---
//! mcs_section: "01-core-functionality"
//! mcs_subsection: "module"
//! mcs_type: "source"
//! mcs_scope: "code"
//! mcs_description: "Reconciliation controller and host adapters."
//! mcs_version: "v0.1.0"
//! mcs_owner: "tbd"
//! ---
use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use mcs_common::AppConfig;
use nix::unistd::{Group, User};
use tracing::{debug, info};

use crate::command;
use crate::error::ExternalResult;
use crate::ownership;

/// One-time host preparation performed on install.
#[async_trait]
pub trait HostProvisioner: Send + Sync {
    async fn install_package(&self, package: &str) -> ExternalResult<()>;
    async fn create_home(&self, home: &Path) -> ExternalResult<()>;
    async fn ensure_group(&self, group: &str) -> ExternalResult<()>;
    async fn ensure_user(&self, user: &str, group: &str, home: &Path) -> ExternalResult<()>;
    async fn own_recursively(&self, root: &Path, user: &str, group: &str) -> ExternalResult<()>;
}

/// Run the provisioning steps in order, stopping at the first failure.
pub async fn provision_host(
    provisioner: &dyn HostProvisioner,
    config: &AppConfig,
) -> ExternalResult<()> {
    let account = &config.account;
    let home = &config.layout.home;
    provisioner.install_package(&config.runtime.package).await?;
    provisioner.create_home(home).await?;
    provisioner.ensure_group(&account.group).await?;
    provisioner
        .ensure_user(&account.user, &account.group, home)
        .await?;
    provisioner
        .own_recursively(home, &account.user, &account.group)
        .await?;
    info!(home = %home.display(), user = %account.user, "host provisioned");
    Ok(())
}

/// Provisioner that shells out to the distribution tools.
#[derive(Debug, Clone)]
pub struct SystemProvisioner {
    installer: Vec<String>,
    apply_ownership: bool,
}

impl SystemProvisioner {
    pub fn new(installer: Vec<String>, apply_ownership: bool) -> Self {
        Self {
            installer,
            apply_ownership,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            config.runtime.installer.clone(),
            config.account.apply_ownership,
        )
    }
}

#[async_trait]
impl HostProvisioner for SystemProvisioner {
    async fn install_package(&self, package: &str) -> ExternalResult<()> {
        let (program, args) = self
            .installer
            .split_first()
            .ok_or_else(|| anyhow!("runtime.installer is empty"))?;
        let mut argv: Vec<&str> = args.iter().map(String::as_str).collect();
        argv.push(package);
        command::run_checked(program, &argv).await?;
        info!(package, "runtime package installed");
        Ok(())
    }

    async fn create_home(&self, home: &Path) -> ExternalResult<()> {
        fs::create_dir_all(home)
            .with_context(|| format!("unable to create {}", home.display()))?;
        ownership::set_mode(home, 0o755)?;
        Ok(())
    }

    async fn ensure_group(&self, group: &str) -> ExternalResult<()> {
        let existing =
            Group::from_name(group).with_context(|| format!("failed to look up group {group}"))?;
        if existing.is_some() {
            debug!(group, "group already present");
            return Ok(());
        }
        command::run_checked("groupadd", &["--system", group]).await?;
        info!(group, "group created");
        Ok(())
    }

    async fn ensure_user(&self, user: &str, group: &str, home: &Path) -> ExternalResult<()> {
        let existing =
            User::from_name(user).with_context(|| format!("failed to look up user {user}"))?;
        if existing.is_some() {
            debug!(user, "user already present");
            return Ok(());
        }
        let home = home.to_string_lossy();
        command::run_checked(
            "useradd",
            &["--system", "--gid", group, "--home-dir", &home, user],
        )
        .await?;
        info!(user, group, "user created");
        Ok(())
    }

    async fn own_recursively(&self, root: &Path, user: &str, group: &str) -> ExternalResult<()> {
        if !self.apply_ownership {
            debug!(root = %root.display(), "ownership changes disabled");
            return Ok(());
        }
        ownership::set_owner_recursive(root, user, group)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    #[tokio::test]
    async fn home_is_created_with_traversable_mode() {
        let dir = tempfile::tempdir().unwrap();
        let home = dir.path().join("opt").join("minecraft");
        let provisioner = SystemProvisioner::new(vec!["true".into()], false);
        provisioner.create_home(&home).await.unwrap();
        let mode = fs::metadata(&home).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }

    #[tokio::test]
    async fn installer_receives_package_name() {
        let provisioner = SystemProvisioner::new(vec!["true".into()], false);
        provisioner
            .install_package("openjdk-17-jre-headless")
            .await
            .unwrap();

        let failing = SystemProvisioner::new(vec!["false".into()], false);
        assert!(failing.install_package("openjdk-17-jre-headless").await.is_err());

        let empty = SystemProvisioner::new(Vec::new(), false);
        assert!(empty.install_package("openjdk-17-jre-headless").await.is_err());
    }

    #[tokio::test]
    async fn ownership_can_be_disabled() {
        let dir = tempfile::tempdir().unwrap();
        let provisioner = SystemProvisioner::new(vec!["true".into()], false);
        provisioner
            .own_recursively(dir.path(), "mcs-no-such-user-xyz", "mcs-no-such-group-xyz")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn existing_root_account_is_left_alone() {
        let provisioner = SystemProvisioner::new(vec!["true".into()], false);
        provisioner.ensure_group("root").await.unwrap();
        provisioner
            .ensure_user("root", "root", Path::new("/root"))
            .await
            .unwrap();
    }
}
