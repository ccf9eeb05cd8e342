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
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::error::{ExternalError, ExternalResult};

/// Artifact as handed out by the resource store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedArtifact {
    pub name: String,
    pub path: PathBuf,
    pub size: u64,
}

impl ResolvedArtifact {
    /// A zero-byte artifact is the placeholder uploaded before the real one.
    pub fn is_delivered(&self) -> bool {
        self.size > 0
    }
}

/// External store that delivers named resources as files.
#[async_trait]
pub trait ResourceStore: Send + Sync {
    async fn fetch(&self, name: &str) -> ExternalResult<PathBuf>;
}

/// Resources delivered under `<directory>/<name>/`, one file per resource.
#[derive(Debug, Clone)]
pub struct DirectoryResourceStore {
    directory: PathBuf,
    declared: Vec<String>,
}

impl DirectoryResourceStore {
    pub fn new(directory: impl Into<PathBuf>, declared: Vec<String>) -> Self {
        Self {
            directory: directory.into(),
            declared,
        }
    }

    fn locate(&self, name: &str) -> io::Result<PathBuf> {
        let slot = self.directory.join(name);
        let meta = fs::metadata(&slot)?;
        if meta.is_file() {
            return Ok(slot);
        }
        let mut files: Vec<PathBuf> = WalkDir::new(&slot)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .collect();
        files.sort();
        files.into_iter().next().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("no file delivered under {}", slot.display()),
            )
        })
    }
}

#[async_trait]
impl ResourceStore for DirectoryResourceStore {
    async fn fetch(&self, name: &str) -> ExternalResult<PathBuf> {
        if !self.declared.iter().any(|declared| declared == name) {
            return Err(ExternalError::ArtifactNotDeclared {
                name: name.to_owned(),
            });
        }
        self.locate(name)
            .map_err(|source| ExternalError::ArtifactClaimFailed {
                name: name.to_owned(),
                source,
            })
    }
}

/// Resolves the managed artifact and keeps the stable link to it current.
#[derive(Clone)]
pub struct ArtifactResolver {
    store: Arc<dyn ResourceStore>,
    name: String,
}

impl ArtifactResolver {
    pub fn new(store: Arc<dyn ResourceStore>, name: impl Into<String>) -> Self {
        Self {
            store,
            name: name.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn resolve(&self) -> ExternalResult<ResolvedArtifact> {
        let path = self.store.fetch(&self.name).await?;
        let size = fs::metadata(&path)
            .map_err(|source| ExternalError::ArtifactClaimFailed {
                name: self.name.clone(),
                source,
            })?
            .len();
        debug!(artifact = %self.name, path = %path.display(), size, "artifact resolved");
        Ok(ResolvedArtifact {
            name: self.name.clone(),
            path,
            size,
        })
    }

    /// Resolve afresh and point `link` at the result, replacing any previous link.
    pub async fn link(&self, link: &Path) -> ExternalResult<ResolvedArtifact> {
        let artifact = self.resolve().await?;
        replace_symlink(&artifact.path, link)?;
        info!(artifact = %self.name, target = %artifact.path.display(), link = %link.display(), "artifact linked");
        Ok(artifact)
    }
}

fn replace_symlink(target: &Path, link: &Path) -> anyhow::Result<()> {
    if let Ok(meta) = fs::symlink_metadata(link) {
        if meta.is_dir() {
            return Err(anyhow!(
                "expected symlink or file at {} but found directory",
                link.display()
            ));
        }
        fs::remove_file(link)
            .with_context(|| format!("unable to remove existing link {}", link.display()))?;
    }
    if let Some(parent) = link.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("unable to create directory {}", parent.display()))?;
    }
    std::os::unix::fs::symlink(target, link).with_context(|| {
        format!(
            "unable to update symlink {} -> {}",
            link.display(),
            target.display()
        )
    })
}
