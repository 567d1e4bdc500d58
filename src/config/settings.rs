use crate::catalog::http::DEFAULT_TIMEOUT_SECS;
use crate::config::ConfigFile;
use crate::error::{PatchError, Result};
use crate::model::{Status, TemplateId};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogSource {
    Directory(PathBuf),
    Url(String),
}

/// Values given on the command line; each one wins over the config file.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub catalog_dir: Option<PathBuf>,
    pub catalog_url: Option<String>,
    pub min_status: Option<Status>,
    pub templates: Vec<String>,
    pub filter: Option<String>,
    pub no_backup: bool,
}

/// Effective settings for one run.
#[derive(Debug, Clone)]
pub struct Settings {
    pub catalog: CatalogSource,
    pub timeout: Duration,
    pub min_status: Status,
    pub templates: Vec<TemplateId>,
    pub filter: Option<String>,
    pub backup: bool,
}

impl Settings {
    pub fn resolve(file: &ConfigFile, cli: &CliOverrides) -> Result<Self> {
        Ok(Self {
            catalog: Self::catalog_source(file, cli)?,
            timeout: Duration::from_secs(file.catalog.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS)),
            min_status: cli
                .min_status
                .or(file.update.min_status)
                .unwrap_or_default(),
            templates: if cli.templates.is_empty() {
                file.update.templates.iter().map(|t| TemplateId::new(t)).collect()
            } else {
                cli.templates.iter().map(|t| TemplateId::new(t)).collect()
            },
            filter: cli.filter.clone().or_else(|| file.update.filter.clone()),
            backup: !cli.no_backup && file.update.backup.unwrap_or(true),
        })
    }

    fn catalog_source(file: &ConfigFile, cli: &CliOverrides) -> Result<CatalogSource> {
        match (&cli.catalog_dir, &cli.catalog_url) {
            (Some(_), Some(_)) => {
                return Err(PatchError::Config(
                    "--catalog-dir and --catalog-url are mutually exclusive".to_string(),
                ));
            }
            (Some(dir), None) => return Ok(CatalogSource::Directory(dir.clone())),
            (None, Some(url)) => return Ok(CatalogSource::Url(url.clone())),
            (None, None) => {}
        }

        match (&file.catalog.directory, &file.catalog.url) {
            (Some(_), Some(_)) => Err(PatchError::Config(
                "[catalog] sets both directory and url".to_string(),
            )),
            (Some(dir), None) => {
                let resolved = match &file.base_dir {
                    Some(base) if dir.is_relative() => base.join(dir),
                    _ => dir.clone(),
                };
                Ok(CatalogSource::Directory(resolved))
            }
            (None, Some(url)) => Ok(CatalogSource::Url(url.clone())),
            (None, None) => Err(PatchError::Config(
                "no catalog configured; pass --catalog-dir or --catalog-url".to_string(),
            )),
        }
    }
}
