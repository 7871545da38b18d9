//! Asset enumeration and removal.

use crate::errors::SweepError;

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

/// A stored asset, addressed by its path inside a container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    /// Handle of the container the asset belongs to
    pub container: String,
    /// Storage disk backing the container
    pub disk: String,
    /// Path relative to the container root, `/`-separated
    pub path: String,
    /// Size in bytes
    pub size: u64,
}

/// Backend that owns the assets
pub trait AssetStore {
    fn list_all(&self) -> Result<Vec<Asset>, SweepError>;
    fn delete(&self, asset: &Asset) -> Result<(), SweepError>;
}

/// A named directory of assets on a disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Container {
    pub handle: String,
    pub disk: String,
    pub root: PathBuf,
}

/// Filesystem store over one or more container roots
pub struct FsAssetStore {
    containers: Vec<Container>,
}

/// Directory holding per-asset metadata sidecars
const META_DIR: &str = ".meta";

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with('.'))
}

impl FsAssetStore {
    pub fn new(containers: Vec<Container>) -> Self {
        Self { containers }
    }

    fn container(&self, handle: &str) -> Option<&Container> {
        self.containers.iter().find(|c| c.handle == handle)
    }

    fn list_container(&self, container: &Container) -> Result<Vec<Asset>, SweepError> {
        let unavailable = |source: std::io::Error| SweepError::StorageUnavailable {
            container: container.handle.clone(),
            root: container.root.clone(),
            source,
        };

        if !container.root.is_dir() {
            return Err(unavailable(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "container root is not a directory",
            )));
        }

        let mut assets = Vec::new();
        for entry in WalkDir::new(&container.root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !is_hidden(e))
        {
            let entry = entry.map_err(|e| unavailable(e.into()))?;
            if !entry.file_type().is_file() {
                continue;
            }

            let metadata = entry.metadata().map_err(|e| unavailable(e.into()))?;
            let Ok(relative) = entry.path().strip_prefix(&container.root) else {
                continue;
            };

            assets.push(Asset {
                container: container.handle.clone(),
                disk: container.disk.clone(),
                path: to_asset_path(relative),
                size: metadata.len(),
            });
        }

        debug!(
            event = "store.container_listed",
            container = %container.handle,
            count = assets.len()
        );
        Ok(assets)
    }
}

/// Join path components with `/` regardless of platform
fn to_asset_path(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

impl AssetStore for FsAssetStore {
    fn list_all(&self) -> Result<Vec<Asset>, SweepError> {
        let mut assets = Vec::new();
        for container in &self.containers {
            assets.extend(self.list_container(container)?);
        }
        Ok(assets)
    }

    fn delete(&self, asset: &Asset) -> Result<(), SweepError> {
        let deletion = |source: std::io::Error| SweepError::Deletion {
            path: asset.path.clone(),
            source,
        };

        let container = self.container(&asset.container).ok_or_else(|| {
            deletion(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("unknown container '{}'", asset.container),
            ))
        })?;

        let file = container.root.join(&asset.path);
        fs::remove_file(&file).map_err(deletion)?;

        // Sidecar lives next to the asset: <dir>/.meta/<name>.yaml
        if let (Some(dir), Some(name)) = (file.parent(), file.file_name()) {
            let sidecar = dir
                .join(META_DIR)
                .join(format!("{}.yaml", name.to_string_lossy()));
            if sidecar.exists() {
                if let Err(err) = fs::remove_file(&sidecar) {
                    warn!(
                        event = "store.sidecar_remove_failed",
                        path = %sidecar.display(),
                        error = %err
                    );
                }
            }
        }

        Ok(())
    }
}
