//! Snapshot storage for terrain volume files.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};

/// Directory inside the save folder holding terrain snapshots.
pub const ARCHIVE_DIRECTORY: &str = "VoxelBackups";
/// File extension of voxel storage files.
pub const VOXEL_EXTENSION: &str = "vx2";

/// Stores and restores terrain volume files by storage name.
pub trait VoxelArchive {
    /// Copies the live volume into the archive.
    fn save(&self, storage_name: &str) -> Result<()>;

    /// Copies the archived volume over the live one; `false` when no snapshot exists.
    fn restore(&self, storage_name: &str) -> Result<bool>;
}

/// Archive kept in a sub-directory of the save folder.
#[derive(Clone, Debug)]
pub struct FsVoxelArchive {
    save_dir: PathBuf,
}

impl FsVoxelArchive {
    /// Creates an archive for the provided save folder.
    #[must_use]
    pub fn new(save_dir: impl Into<PathBuf>) -> Self {
        Self {
            save_dir: save_dir.into(),
        }
    }

    fn live_path(&self, storage_name: &str) -> PathBuf {
        self.save_dir.join(file_name(storage_name))
    }

    fn archived_path(&self, storage_name: &str) -> PathBuf {
        self.save_dir
            .join(ARCHIVE_DIRECTORY)
            .join(file_name(storage_name))
    }
}

impl VoxelArchive for FsVoxelArchive {
    fn save(&self, storage_name: &str) -> Result<()> {
        let archive_dir = self.save_dir.join(ARCHIVE_DIRECTORY);
        fs::create_dir_all(&archive_dir)
            .with_context(|| format!("failed to create {}", archive_dir.display()))?;
        copy(&self.live_path(storage_name), &self.archived_path(storage_name))
    }

    fn restore(&self, storage_name: &str) -> Result<bool> {
        let archived = self.archived_path(storage_name);
        if !archived.is_file() {
            return Ok(false);
        }
        copy(&archived, &self.live_path(storage_name))?;
        Ok(true)
    }
}

fn file_name(storage_name: &str) -> String {
    format!("{storage_name}.{VOXEL_EXTENSION}")
}

fn copy(source: &Path, target: &Path) -> Result<()> {
    let _ = fs::copy(source, target).with_context(|| {
        format!("failed to copy {} to {}", source.display(), target.display())
    })?;
    Ok(())
}
