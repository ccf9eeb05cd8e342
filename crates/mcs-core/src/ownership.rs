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
use std::os::unix::fs::{chown, PermissionsExt};
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use nix::unistd::{Group, User};
use walkdir::WalkDir;

/// Look up the numeric ids for a user and group name.
pub fn resolve_ids(user: &str, group: &str) -> Result<(u32, u32)> {
    let uid = User::from_name(user)
        .with_context(|| format!("failed to look up user {user}"))?
        .ok_or_else(|| anyhow!("user {user} does not exist"))?
        .uid
        .as_raw();
    let gid = Group::from_name(group)
        .with_context(|| format!("failed to look up group {group}"))?
        .ok_or_else(|| anyhow!("group {group} does not exist"))?
        .gid
        .as_raw();
    Ok((uid, gid))
}

pub fn set_mode(path: &Path, mode: u32) -> Result<()> {
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
        .with_context(|| format!("unable to set mode {mode:o} on {}", path.display()))
}

pub fn set_owner(path: &Path, user: &str, group: &str) -> Result<()> {
    let (uid, gid) = resolve_ids(user, group)?;
    chown(path, Some(uid), Some(gid))
        .with_context(|| format!("unable to chown {} to {user}:{group}", path.display()))
}

/// Chown `root` and everything below it. Symlinks are changed themselves, not followed.
pub fn set_owner_recursive(root: &Path, user: &str, group: &str) -> Result<()> {
    let (uid, gid) = resolve_ids(user, group)?;
    for entry in WalkDir::new(root).follow_links(false) {
        let entry = entry.with_context(|| format!("unable to walk {}", root.display()))?;
        std::os::unix::fs::lchown(entry.path(), Some(uid), Some(gid)).with_context(|| {
            format!(
                "unable to chown {} to {user}:{group}",
                entry.path().display()
            )
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_mode_applies_permission_bits() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("file");
        fs::write(&path, "x").unwrap();
        set_mode(&path, 0o640).unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o640);
    }

    #[test]
    fn unknown_user_is_reported() {
        let err = resolve_ids("mcs-no-such-user-xyz", "root").unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }
}
