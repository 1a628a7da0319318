//! Copies of the store files taken before any maintenance is written.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use tracing::info;

const BACKUP_SUFFIX: &str = ".backup";
const TIMESTAMP_FORMAT: &str = "%Y%m%d-%H%M%S";

/// Naming scheme of backup files.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackupMode {
    /// A single `<file>.backup`, overwritten on every run.
    Overwrite,
    /// One `<file>.backup<timestamp>` per run.
    Timestamped,
}

/// Path of the backup of `original` taken at `now`.
#[must_use]
pub fn backup_path(original: &Path, mode: BackupMode, now: DateTime<Local>) -> PathBuf {
    let mut name = original.as_os_str().to_owned();
    name.push(BACKUP_SUFFIX);
    if mode == BackupMode::Timestamped {
        name.push(now.format(TIMESTAMP_FORMAT).to_string());
    }
    PathBuf::from(name)
}

/// Copies every file next to itself, returning the backup paths.
///
/// The first failed copy aborts; nothing has been modified at that point.
pub fn create_backups(files: &[&Path], mode: BackupMode) -> Result<Vec<PathBuf>> {
    let now = Local::now();
    files
        .iter()
        .map(|original| {
            let target = backup_path(original, mode, now);
            let _ = fs::copy(original, &target).with_context(|| {
                format!(
                    "failed to back up {} to {}",
                    original.display(),
                    target.display()
                )
            })?;
            info!(source = %original.display(), backup = %target.display(), "backup written");
            Ok(target)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn backup_names_follow_mode() {
        let now = Local
            .with_ymd_and_hms(2024, 3, 9, 7, 5, 1)
            .single()
            .expect("unambiguous local time");
        let original = Path::new("/saves/world/Sandbox.sbc");

        assert_eq!(
            backup_path(original, BackupMode::Overwrite, now),
            PathBuf::from("/saves/world/Sandbox.sbc.backup")
        );
        assert_eq!(
            backup_path(original, BackupMode::Timestamped, now),
            PathBuf::from("/saves/world/Sandbox.sbc.backup20240309-070501")
        );
    }
}
