use crate::catalog::{Catalog, DirectoryCatalog, HttpCatalog};
use crate::config::{CatalogSource, Settings};
use crate::error::Result;
use std::sync::Arc;

pub struct CatalogFactory;

impl CatalogFactory {
    pub fn create(settings: &Settings) -> Result<Arc<dyn Catalog>> {
        let catalog: Arc<dyn Catalog> = match &settings.catalog {
            CatalogSource::Directory(dir) => Arc::new(DirectoryCatalog::open(dir)?),
            CatalogSource::Url(url) => Arc::new(HttpCatalog::new(url, settings.timeout)?),
        };
        Ok(catalog)
    }
}
