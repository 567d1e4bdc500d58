//! `masterpatch.toml` loading.

use crate::error::{PatchError, Result};
use crate::model::Status;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

pub mod settings;

pub use settings::{CatalogSource, CliOverrides, Settings};

pub const CONFIG_FILE_NAME: &str = "masterpatch.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    pub catalog: CatalogSection,
    pub update: UpdateSection,
    /// Directory the file was read from; relative paths resolve against it.
    #[serde(skip)]
    pub base_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CatalogSection {
    pub directory: Option<PathBuf>,
    pub url: Option<String>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UpdateSection {
    pub min_status: Option<Status>,
    pub templates: Vec<String>,
    pub filter: Option<String>,
    pub backup: Option<bool>,
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load `explicit` when given (it must exist), otherwise
    /// `masterpatch.toml` next to the package when present.
    pub fn discover(package_path: &Path, explicit: Option<&Path>) -> Result<ConfigFile> {
        if let Some(path) = explicit {
            if !path.is_file() {
                return Err(PatchError::Config(format!(
                    "config file {} does not exist",
                    path.display()
                )));
            }
            return Self::load(path);
        }

        let candidate = package_path
            .parent()
            .map(|dir| dir.join(CONFIG_FILE_NAME))
            .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME));
        if candidate.is_file() {
            Self::load(&candidate)
        } else {
            Ok(ConfigFile::default())
        }
    }

    pub fn load(path: &Path) -> Result<ConfigFile> {
        let content = fs::read_to_string(path)?;
        let mut config = Self::parse(&content)?;
        config.base_dir = path.parent().map(Path::to_path_buf);
        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<ConfigFile> {
        Ok(toml::from_str(content)?)
    }
}
