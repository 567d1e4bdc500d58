use crate::error::{PatchError, Result};
use jiff::Zoned;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Copy `package_path` to `<stem>.<YYYYMMDD-HHMMSS>.bak` beside it.
pub fn create_backup(package_path: &Path) -> Result<PathBuf> {
    let timestamp = Zoned::now().strftime("%Y%m%d-%H%M%S").to_string();
    let target = backup_path(package_path, &timestamp);

    fs::copy(package_path, &target).map_err(|e| {
        PatchError::PersistFailure(format!(
            "could not back up {} to {}: {e}",
            package_path.display(),
            target.display()
        ))
    })?;

    debug!("Backed up {} to {}", package_path.display(), target.display());
    Ok(target)
}

/// First free backup name for `timestamp`; a numeric suffix separates runs
/// within the same second.
fn backup_path(package_path: &Path, timestamp: &str) -> PathBuf {
    let stem = package_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "package".to_string());
    let directory = package_path.parent().unwrap_or_else(|| Path::new(""));

    let mut candidate = directory.join(format!("{stem}.{timestamp}.bak"));
    let mut counter = 1;
    while candidate.exists() {
        candidate = directory.join(format!("{stem}.{timestamp}-{counter}.bak"));
        counter += 1;
    }
    candidate
}
