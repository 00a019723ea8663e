//! Startup reconciliation between the image directory and the metadata index
//!
//! Drift comes from crashes between file placement and record insertion, or
//! from files deleted by hand. Two kinds are repaired:
//!
//! - orphan file: a frame file no record points to, deleted
//! - dangling record: a record whose file is gone, deleted
//!
//! The pass is best effort. A per-item failure is logged and collected in the
//! report; it never aborts the remaining items. Running the pass twice in a
//! row changes nothing the second time.

use crate::error::Result;
use crate::storage::{AssetStore, FileRemoval};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Outcome of one reconciliation pass
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReconcileReport {
    /// Frame files found on disk
    pub files_scanned: usize,
    /// Records found in the index
    pub records_scanned: usize,
    /// Orphan files that were deleted
    pub orphans_removed: Vec<PathBuf>,
    /// Ids of dangling records that were deleted
    pub dangling_removed: Vec<i64>,
    /// Items that could not be repaired
    pub failures: Vec<ReconcileFailure>,
}

/// A drift item the pass could not repair
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileFailure {
    pub path: PathBuf,
    /// Set for dangling records, empty for orphan files
    pub record_id: Option<i64>,
    pub reason: String,
}

impl ReconcileReport {
    /// No drift was found and nothing failed
    pub fn is_clean(&self) -> bool {
        self.change_count() == 0 && self.failures.is_empty()
    }

    /// Number of repairs applied
    pub fn change_count(&self) -> usize {
        self.orphans_removed.len() + self.dangling_removed.len()
    }
}

/// Repairs drift between the file store and the index
pub struct ReconciliationEngine<'a> {
    store: &'a AssetStore,
}

impl<'a> ReconciliationEngine<'a> {
    pub fn new(store: &'a AssetStore) -> Self {
        Self { store }
    }

    /// Run one pass under the store's write gate
    ///
    /// # Errors
    ///
    /// Only listing failures abort the pass (the directory or the index cannot
    /// be read at all). Per-item delete failures are reported instead.
    pub async fn run(&self) -> Result<ReconcileReport> {
        let _writer = self.store.write_lock().await;

        info!(root = %self.store.files().root().display(), "Starting reconciliation");

        let files = self.store.files().list_files().await?;
        let records = self.store.index().list_all().await?;

        let mut report = ReconcileReport {
            files_scanned: files.len(),
            records_scanned: records.len(),
            ..Default::default()
        };

        let on_disk: HashSet<PathBuf> = files.into_iter().collect();
        let indexed: HashMap<PathBuf, i64> = records
            .iter()
            .map(|r| (r.canonical_path.clone(), r.id))
            .collect();

        // 孤立文件：磁盘上存在但没有记录
        let mut orphans: Vec<&PathBuf> =
            on_disk.iter().filter(|p| !indexed.contains_key(*p)).collect();
        orphans.sort();

        for path in orphans {
            match self.store.files().remove(path).await {
                FileRemoval::Removed | FileRemoval::AlreadyMissing => {
                    debug!(path = %path.display(), "Removed orphan file");
                    report.orphans_removed.push(path.clone());
                }
                FileRemoval::Failed(reason) => {
                    warn!(path = %path.display(), reason = %reason, "Failed to remove orphan file");
                    report.failures.push(ReconcileFailure {
                        path: path.clone(),
                        record_id: None,
                        reason,
                    });
                }
            }
        }

        // 悬空记录：有记录但文件已丢失
        for record in records.iter().filter(|r| !on_disk.contains(&r.canonical_path)) {
            match self.store.index().delete_by_id(record.id).await {
                Ok(_) => {
                    debug!(
                        id = record.id,
                        path = %record.canonical_path.display(),
                        "Removed dangling record"
                    );
                    report.dangling_removed.push(record.id);
                }
                Err(e) => {
                    warn!(id = record.id, error = %e, "Failed to remove dangling record");
                    report.failures.push(ReconcileFailure {
                        path: record.canonical_path.clone(),
                        record_id: Some(record.id),
                        reason: e.to_string(),
                    });
                }
            }
        }

        if report.is_clean() {
            info!(
                files = report.files_scanned,
                records = report.records_scanned,
                "Reconciliation found no drift"
            );
        } else {
            warn!(
                orphans_removed = report.orphans_removed.len(),
                dangling_removed = report.dangling_removed.len(),
                failures = report.failures.len(),
                "Reconciliation repaired drift"
            );
        }

        Ok(report)
    }
}
