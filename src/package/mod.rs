//! Diagram package access: a zip container of interlinked XML parts.
//!
//! A [`Package`] keeps every zip entry in memory exactly as read and stages
//! modified parts in an overlay. Nothing touches the file on disk until
//! [`Package::save`], which writes a complete new archive next to the
//! original and renames it into place.

pub mod content_types;
pub mod masters;
pub mod parts;
pub mod relationships;
pub mod styles;
pub mod xml;

#[cfg(test)]
pub(crate) mod fixtures;

use crate::error::{PatchError, Result};
use parts::Part;
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use xml::XmlDocument;
use zip::ZipArchive;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

/// Largest inflated size accepted for a single entry.
pub const MAX_PART_BYTES: u64 = 256 * 1024 * 1024;

/// Largest inflated size accepted for the whole package.
pub const MAX_PACKAGE_BYTES: u64 = 512 * 1024 * 1024;

pub struct Package {
    path: PathBuf,
    /// Entry names in archive order; directories keep their trailing slash.
    entries: Vec<String>,
    raw: HashMap<String, Vec<u8>>,
    overlay: HashMap<String, XmlDocument>,
    _lock: PackageLock,
}

impl Package {
    /// Open `path` for exclusive modification.
    pub fn open(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(PatchError::PackageValidation(format!(
                "{} is not a file",
                path.display()
            )));
        }

        let lock = PackageLock::acquire(path)?;
        let file = File::open(path)?;
        let mut archive = ZipArchive::new(BufReader::new(file)).map_err(|e| {
            PatchError::PackageValidation(format!("{} is not a zip package: {}", path.display(), e))
        })?;

        let mut entries = Vec::with_capacity(archive.len());
        let mut raw = HashMap::with_capacity(archive.len());
        let mut total: u64 = 0;

        for index in 0..archive.len() {
            let entry = archive.by_index(index)?;
            let name = entry.name().to_string();

            if entry.is_dir() {
                entries.push(name);
                continue;
            }

            if entry.size() > MAX_PART_BYTES {
                return Err(PatchError::PackageValidation(format!(
                    "entry '{}' exceeds {} bytes",
                    name, MAX_PART_BYTES
                )));
            }
            total += entry.size();
            if total > MAX_PACKAGE_BYTES {
                return Err(PatchError::PackageValidation(format!(
                    "package content exceeds {} bytes",
                    MAX_PACKAGE_BYTES
                )));
            }

            let mut bytes = Vec::with_capacity(entry.size() as usize);
            entry.take(MAX_PART_BYTES + 1).read_to_end(&mut bytes)?;
            if bytes.len() as u64 > MAX_PART_BYTES {
                return Err(PatchError::PackageValidation(format!(
                    "entry '{}' inflates beyond {} bytes",
                    name, MAX_PART_BYTES
                )));
            }

            entries.push(name.clone());
            raw.insert(name, bytes);
        }

        debug!("Opened {} ({} entries)", path.display(), entries.len());

        Ok(Self {
            path: path.to_path_buf(),
            entries,
            raw,
            overlay: HashMap::new(),
            _lock: lock,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn contains(&self, part_path: &str) -> bool {
        self.entry_name(part_path).is_some()
    }

    /// Parsed content of `part_path`, including staged changes. `None` when
    /// the package has no such entry.
    pub fn read_xml(&self, part_path: &str) -> Result<Option<XmlDocument>> {
        let Some(name) = self.entry_name(part_path) else {
            return Ok(None);
        };

        if let Some(doc) = self.overlay.get(name) {
            return Ok(Some(doc.clone()));
        }

        match self.raw.get(name) {
            Some(bytes) => XmlDocument::from_bytes(bytes)
                .map(Some)
                .map_err(|e| PatchError::XmlParsing(format!("{}: {}", name, e))),
            None => Ok(None),
        }
    }

    /// Stage `doc` as the full content of `part_path`, creating the entry if
    /// the package does not have one yet.
    pub fn write_xml(&mut self, part_path: &str, doc: XmlDocument) {
        let name = match self.entry_name(part_path) {
            Some(existing) => existing.to_string(),
            None => {
                let name = part_path.trim_start_matches('/').to_string();
                self.entries.push(name.clone());
                name
            }
        };
        debug!("Staged {}", name);
        self.overlay.insert(name, doc);
    }

    pub fn get_part(&self, part: &Part) -> Result<XmlDocument> {
        self.read_xml(&part.path)?.ok_or_else(|| {
            if part.kind.is_structural() {
                PatchError::StructuralPartMissing(part.to_string())
            } else {
                PatchError::PartNotFound(part.to_string())
            }
        })
    }

    /// Replace the whole content of `part`.
    pub fn put_part(&mut self, part: &Part, doc: XmlDocument) {
        self.write_xml(&part.path, doc);
    }

    pub fn is_modified(&self) -> bool {
        !self.overlay.is_empty()
    }

    /// Write the package back to its original location. The new archive is
    /// built in a temporary file in the same directory and renamed over the
    /// original, so readers never observe a half-written package.
    pub fn save(&mut self) -> Result<()> {
        if !self.is_modified() {
            debug!("Nothing staged for {}", self.path.display());
            return Ok(());
        }

        let mut serialized = HashMap::with_capacity(self.overlay.len());
        for (name, doc) in &self.overlay {
            serialized.insert(name.clone(), doc.to_bytes()?);
        }

        let directory = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let mut temp = tempfile::Builder::new()
            .prefix(".masterpatch-")
            .suffix(".tmp")
            .tempfile_in(&directory)
            .map_err(|e| persist_failure(&self.path, e))?;

        self.write_archive(temp.as_file_mut(), &serialized)
            .map_err(|e| persist_failure(&self.path, e))?;
        temp.as_file()
            .sync_all()
            .map_err(|e| persist_failure(&self.path, e))?;

        if let Ok(metadata) = fs::metadata(&self.path) {
            if let Err(e) = temp.as_file().set_permissions(metadata.permissions()) {
                warn!("Could not carry permissions over to {}: {}", self.path.display(), e);
            }
        }

        temp.persist(&self.path)
            .map_err(|e| persist_failure(&self.path, e.error))?;

        self.raw.extend(serialized);
        self.overlay.clear();
        debug!("Saved {}", self.path.display());
        Ok(())
    }

    fn write_archive(
        &self,
        file: &mut File,
        serialized: &HashMap<String, Vec<u8>>,
    ) -> Result<()> {
        let options =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
        let mut writer = ZipWriter::new(file);

        for name in &self.entries {
            if name.ends_with('/') {
                writer.add_directory(name.as_str(), options)?;
                continue;
            }

            let bytes = serialized
                .get(name)
                .or_else(|| self.raw.get(name))
                .map(Vec::as_slice)
                .unwrap_or_default();
            writer.start_file(name.as_str(), options)?;
            writer.write_all(bytes)?;
        }

        writer.finish()?;
        Ok(())
    }

    /// Stored entry name for `part_path`. Part names compare
    /// case-insensitively inside a package.
    fn entry_name(&self, part_path: &str) -> Option<&str> {
        let wanted = part_path.trim_start_matches('/');
        self.entries
            .iter()
            .find(|name| name.as_str() == wanted)
            .or_else(|| {
                self.entries
                    .iter()
                    .find(|name| name.eq_ignore_ascii_case(wanted))
            })
            .filter(|name| !name.ends_with('/'))
            .map(String::as_str)
    }
}

impl std::fmt::Debug for Package {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Package")
            .field("path", &self.path)
            .field("entries", &self.entries.len())
            .field("modified", &self.overlay.len())
            .finish()
    }
}

fn persist_failure(path: &Path, err: impl std::fmt::Display) -> PatchError {
    PatchError::PersistFailure(format!("{}: {}", path.display(), err))
}

/// Advisory `<package>.lock` file held while a package is open.
#[derive(Debug)]
struct PackageLock {
    path: PathBuf,
}

impl PackageLock {
    fn acquire(package_path: &Path) -> Result<Self> {
        let path = lock_path_for(package_path);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                let _ = writeln!(file, "{}", std::process::id());
                Ok(Self { path })
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                let owner = fs::read_to_string(&path).unwrap_or_default();
                let owner = owner.trim();
                if owner.is_empty() {
                    Err(PatchError::PackageLocked(path.display().to_string()))
                } else {
                    Err(PatchError::PackageLocked(format!(
                        "{}, held by process {}",
                        path.display(),
                        owner
                    )))
                }
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl Drop for PackageLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!("Failed to remove lock file {}: {}", self.path.display(), e);
        }
    }
}

pub fn lock_path_for(package_path: &Path) -> PathBuf {
    let mut name = package_path.as_os_str().to_owned();
    name.push(".lock");
    PathBuf::from(name)
}
