//! Settings file loading.

use crate::errors::SweepError;
use crate::scanner::ProtectionRules;
use crate::store::Container;

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Default settings file name, looked up in the base path
pub const CONFIG_FILE: &str = "assetsweep.toml";

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ContainerConfig {
    pub handle: String,
    /// Defaults to the handle
    #[serde(default)]
    pub disk: Option<String>,
    pub root: PathBuf,
}

/// Raw contents of `assetsweep.toml`
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields, default)]
pub struct Config {
    pub content_root: PathBuf,
    pub entries: Option<PathBuf>,
    pub icon_disk: Option<String>,
    pub protected_prefix: String,
    pub protected: Vec<String>,
    pub containers: Vec<ContainerConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            content_root: PathBuf::from("content"),
            entries: None,
            icon_disk: Some("svg_icons".to_string()),
            protected_prefix: "/assets/".to_string(),
            protected: Vec::new(),
            containers: Vec::new(),
        }
    }
}

impl Config {
    pub fn parse(text: &str, origin: &Path) -> Result<Self, SweepError> {
        toml::from_str(text).map_err(|e| SweepError::Config {
            path: origin.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Load settings for a site rooted at `base`.
    ///
    /// An explicit `path` must exist. Otherwise `<base>/assetsweep.toml` is
    /// used when present and built-in defaults when not.
    pub fn load(base: &Path, path: Option<&Path>) -> Result<Self, SweepError> {
        let file = match path {
            Some(p) => p.to_path_buf(),
            None => {
                let candidate = base.join(CONFIG_FILE);
                if !candidate.exists() {
                    return Ok(Config::default());
                }
                candidate
            }
        };

        let text = fs::read_to_string(&file).map_err(|e| SweepError::Config {
            path: file.clone(),
            reason: e.to_string(),
        })?;
        Config::parse(&text, &file)
    }

    /// Append protected URLs coming from the environment, skipping blanks
    pub fn with_protected_urls<I, S>(mut self, urls: I) -> Self
    where
        I: IntoIterator<Item = Option<S>>,
        S: Into<String>,
    {
        for url in urls.into_iter().flatten() {
            let url = url.into();
            if !url.trim().is_empty() {
                self.protected.push(url);
            }
        }
        self
    }

    /// Containers with roots resolved against `base`
    pub fn containers(&self, base: &Path) -> Vec<Container> {
        if self.containers.is_empty() {
            return vec![Container {
                handle: "assets".to_string(),
                disk: "assets".to_string(),
                root: base.join("public/assets"),
            }];
        }

        self.containers
            .iter()
            .map(|c| Container {
                handle: c.handle.clone(),
                disk: c.disk.clone().unwrap_or_else(|| c.handle.clone()),
                root: base.join(&c.root),
            })
            .collect()
    }

    pub fn content_root(&self, base: &Path) -> PathBuf {
        base.join(&self.content_root)
    }

    pub fn entries_root(&self, base: &Path) -> Option<PathBuf> {
        self.entries.as_ref().map(|p| base.join(p))
    }

    pub fn protection(&self) -> ProtectionRules {
        ProtectionRules {
            icon_disk: self.icon_disk.clone(),
            prefix: self.protected_prefix.clone(),
            urls: self.protected.clone(),
        }
    }
}
