use crate::catalog::{Catalog, SnapshotSelector};
use crate::error::{PatchError, Result};
use crate::model::{Status, TemplateId, TemplateSnapshot};
use crate::utils::path_validator::PathValidator;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Catalog backed by a directory tree of `*.json` files, each holding one
/// snapshot or an array of snapshots.
pub struct DirectoryCatalog {
    root: PathBuf,
    snapshots: Vec<TemplateSnapshot>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SnapshotFile {
    One(Box<TemplateSnapshot>),
    Many(Vec<TemplateSnapshot>),
}

impl DirectoryCatalog {
    pub fn open(root: &Path) -> Result<Self> {
        if !root.is_dir() {
            return Err(PatchError::Catalog(format!(
                "catalog directory {} does not exist",
                root.display()
            )));
        }

        let mut snapshots = Vec::new();
        let mut pending = vec![root.to_path_buf()];
        while let Some(dir) = pending.pop() {
            let mut entries: Vec<PathBuf> = fs::read_dir(&dir)?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .collect();
            entries.sort();

            for path in entries {
                if path.is_dir() {
                    pending.push(path);
                } else if path
                    .extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
                {
                    if let Err(e) = PathValidator::validate_file_path(&path, root) {
                        warn!("Skipping {}: {}", path.display(), e);
                        continue;
                    }
                    match Self::read_file(&path) {
                        Ok(found) => snapshots.extend(found),
                        Err(e) => warn!("Skipping {}: {}", path.display(), e),
                    }
                }
            }
        }

        debug!(
            "Loaded {} snapshots from {}",
            snapshots.len(),
            root.display()
        );

        let catalog = Self {
            root: root.to_path_buf(),
            snapshots,
        };
        if catalog.is_empty() {
            warn!("No snapshots found under {}", root.display());
        }
        Ok(catalog)
    }

    fn read_file(path: &Path) -> Result<Vec<TemplateSnapshot>> {
        let content = fs::read_to_string(path)?;
        Ok(match serde_json::from_str::<SnapshotFile>(&content)? {
            SnapshotFile::One(snapshot) => vec![*snapshot],
            SnapshotFile::Many(list) => list,
        })
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}

impl Catalog for DirectoryCatalog {
    fn latest_eligible(
        &self,
        template_id: &TemplateId,
        min_status: Status,
    ) -> Result<Option<TemplateSnapshot>> {
        Ok(SnapshotSelector::select(&self.snapshots, template_id, min_status).cloned())
    }

    fn describe(&self) -> String {
        format!("directory {} ({} snapshots)", self.root.display(), self.len())
    }
}
