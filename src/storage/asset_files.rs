//! Asset File Store
//!
//! Flat directory of rendered frames. The root is canonicalised once at open,
//! so every path handed out by [`AssetFileStore::path_for`] is absolute and
//! compares equal to the `canonical_path` column of the metadata index.
//!
//! ```text
//! images/
//!   GOES19_FullDisk_Band13_CleanIR_Multichannel_20250820_2130Z.png
//!   GOES19_FullDisk_Band13_CleanIR_Multichannel_20250820_2133Z.png
//! ```

use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Result of removing one stored file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileRemoval {
    Removed,
    /// Nothing to remove; the file was already gone.
    AlreadyMissing,
    Failed(String),
}

impl FileRemoval {
    /// The file is no longer on disk
    pub fn is_gone(&self) -> bool {
        matches!(self, FileRemoval::Removed | FileRemoval::AlreadyMissing)
    }
}

/// Directory of stored frame files
#[derive(Debug, Clone)]
pub struct AssetFileStore {
    root: PathBuf,
    extension: String,
}

impl AssetFileStore {
    /// Open (and create if needed) the image directory
    ///
    /// # Arguments
    ///
    /// * `root` - Image directory
    /// * `extension` - Extension of stored frames, without the dot
    pub async fn open(root: &Path, extension: &str) -> Result<Self> {
        fs::create_dir_all(root).await.map_err(|e| {
            AppError::io_error(
                format!("Failed to create image directory: {}", e),
                Some(root.to_path_buf()),
            )
        })?;

        let root = fs::canonicalize(root).await.map_err(|e| {
            AppError::io_error(
                format!("Failed to resolve image directory: {}", e),
                Some(root.to_path_buf()),
            )
        })?;

        Ok(Self {
            root,
            extension: extension.trim_start_matches('.').to_string(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Absolute target path for a file name
    pub fn path_for(&self, file_name: &str) -> PathBuf {
        self.root.join(file_name)
    }

    pub async fn exists(&self, path: &Path) -> bool {
        fs::try_exists(path).await.unwrap_or(false)
    }

    /// Move a rendered artifact to its target path
    ///
    /// Tries an atomic rename first and falls back to copy + remove when the
    /// staging area is on another filesystem. An existing target is replaced.
    ///
    /// # Returns
    ///
    /// Size of the placed file in bytes
    pub async fn place(&self, source: &Path, target: &Path) -> Result<u64> {
        if let Err(rename_err) = fs::rename(source, target).await {
            debug!(
                source = %source.display(),
                target = %target.display(),
                error = %rename_err,
                "Rename failed, falling back to copy"
            );

            if let Err(e) = fs::copy(source, target).await {
                // 清理可能残留的部分文件
                let _ = fs::remove_file(target).await;
                return Err(AppError::io_error(
                    format!("Failed to move rendered file: {}", e),
                    Some(target.to_path_buf()),
                ));
            }

            if let Err(e) = fs::remove_file(source).await {
                warn!(
                    source = %source.display(),
                    error = %e,
                    "Failed to remove source after copy"
                );
            }
        }

        self.file_size(target).await
    }

    pub async fn file_size(&self, path: &Path) -> Result<u64> {
        let metadata = fs::metadata(path).await.map_err(|e| {
            AppError::io_error(
                format!("Failed to read file metadata: {}", e),
                Some(path.to_path_buf()),
            )
        })?;
        Ok(metadata.len())
    }

    /// Delete a stored file; a missing file is not an error
    pub async fn remove(&self, path: &Path) -> FileRemoval {
        match fs::remove_file(path).await {
            Ok(()) => FileRemoval::Removed,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => FileRemoval::AlreadyMissing,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to remove file");
                FileRemoval::Failed(e.to_string())
            }
        }
    }

    /// Entries carrying the frame extension directly under the root (no recursion)
    ///
    /// A directory named like a frame is listed as well, so reconciliation
    /// reports it instead of leaving it in the store unnoticed. The walk runs
    /// on the blocking pool.
    pub async fn list_files(&self) -> Result<Vec<PathBuf>> {
        let root = self.root.clone();
        let extension = self.extension.clone();

        tokio::task::spawn_blocking(move || {
            let mut files = Vec::new();

            for entry in WalkDir::new(&root).min_depth(1).max_depth(1) {
                let entry = entry.map_err(|e| {
                    AppError::io_error(
                        format!("Failed to list image directory: {}", e),
                        Some(root.clone()),
                    )
                })?;

                let matches_extension = entry
                    .path()
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .map(|ext| ext.eq_ignore_ascii_case(&extension))
                    .unwrap_or(false);

                if matches_extension {
                    files.push(entry.into_path());
                }
            }

            files.sort();
            Ok(files)
        })
        .await
        .map_err(|e| AppError::Internal(format!("Directory listing task failed: {}", e)))?
    }
}
