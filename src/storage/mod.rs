//! Asset Storage Module
//!
//! Frames live in two places that must agree:
//!
//! ```text
//! data/
//! ├── metadata.db          # SQLite index (WAL)
//! ├── staging/             # renderer output, not yet admitted
//! └── images/              # admitted frames (flat)
//!     ├── GOES19_FullDisk_Band13_CleanIR_Multichannel_20250820_2130Z.png
//!     └── GOES19_FullDisk_Band13_CleanIR_Multichannel_20250820_2133Z.png
//! ```
//!
//! Every write to either side goes through [`AssetStore::write_lock`]. Reads
//! use the pool directly and only ever see committed rows.

pub mod asset_files;
pub mod metadata_store;
pub mod reconcile;

pub use asset_files::{AssetFileStore, FileRemoval};
pub use metadata_store::MetadataIndex;
pub use reconcile::{ReconcileFailure, ReconcileReport, ReconciliationEngine};

use crate::error::Result;
use std::path::Path;
use tokio::sync::{Mutex, MutexGuard};

/// Proof that the caller holds the single-writer gate
pub type WriteGuard<'a> = MutexGuard<'a, ()>;

/// Index and image directory behind one write gate
#[derive(Debug)]
pub struct AssetStore {
    index: MetadataIndex,
    files: AssetFileStore,
    writer: Mutex<()>,
}

impl AssetStore {
    /// Open the index and the image directory
    pub async fn open(db_path: &Path, image_dir: &Path, extension: &str) -> Result<Self> {
        let index = MetadataIndex::open(db_path).await?;
        let files = AssetFileStore::open(image_dir, extension).await?;
        Ok(Self::new(index, files))
    }

    pub fn new(index: MetadataIndex, files: AssetFileStore) -> Self {
        Self {
            index,
            files,
            writer: Mutex::new(()),
        }
    }

    pub fn index(&self) -> &MetadataIndex {
        &self.index
    }

    pub fn files(&self) -> &AssetFileStore {
        &self.files
    }

    /// Acquire the single-writer gate
    ///
    /// Held across file placement, record insertion and eviction so that a
    /// file and its record always change together as seen by other writers.
    pub async fn write_lock(&self) -> WriteGuard<'_> {
        self.writer.lock().await
    }
}
