//! Oldest-first capacity enforcement
//!
//! Metadata is authoritative: a record is deleted even when its file could not
//! be, and the leftover file is collected as an orphan by the next
//! reconciliation.

use crate::error::Result;
use crate::storage::{AssetStore, FileRemoval, WriteGuard};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Outcome for one evicted record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvictedAsset {
    pub id: i64,
    pub url_path: String,
    pub canonical_path: PathBuf,
    pub file: FileRemoval,
    pub record_removed: bool,
    pub error: Option<String>,
}

/// Result of one capacity check
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EvictionReport {
    pub max_assets: u64,
    pub count_before: u64,
    pub evicted: Vec<EvictedAsset>,
}

impl EvictionReport {
    pub fn removed_count(&self) -> usize {
        self.evicted.iter().filter(|e| e.record_removed).count()
    }

    pub fn was_evicted(&self, id: i64) -> bool {
        self.evicted.iter().any(|e| e.id == id && e.record_removed)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CapacityEvictor {
    max_assets: u64,
}

impl CapacityEvictor {
    pub fn new(max_assets: u64) -> Self {
        Self { max_assets }
    }

    pub fn max_assets(&self) -> u64 {
        self.max_assets
    }

    /// Acquire the write gate and enforce the bound
    pub async fn enforce(&self, store: &AssetStore) -> Result<EvictionReport> {
        let guard = store.write_lock().await;
        self.enforce_locked(store, &guard).await
    }

    /// Enforce the bound; the caller already holds the write gate
    ///
    /// # Errors
    ///
    /// Fails only when the count or the candidate list cannot be read.
    /// Per-item failures are recorded in the report.
    pub async fn enforce_locked(
        &self,
        store: &AssetStore,
        _guard: &WriteGuard<'_>,
    ) -> Result<EvictionReport> {
        let count = store.index().count_all().await?;
        let mut report = EvictionReport {
            max_assets: self.max_assets,
            count_before: count,
            evicted: Vec::new(),
        };

        if count <= self.max_assets {
            return Ok(report);
        }

        let excess = count - self.max_assets;
        let candidates = store.index().list_oldest(excess).await?;

        for record in candidates {
            let file = store.files().remove(&record.canonical_path).await;
            match &file {
                FileRemoval::Removed => {}
                FileRemoval::AlreadyMissing => {
                    debug!(path = %record.canonical_path.display(), "Evicted file was already missing");
                }
                FileRemoval::Failed(reason) => {
                    warn!(
                        path = %record.canonical_path.display(),
                        reason = %reason,
                        "Failed to delete evicted file; removing record anyway"
                    );
                }
            }

            let (record_removed, error) = match store.index().delete_by_id(record.id).await {
                Ok(removed) => (removed, None),
                Err(e) => {
                    warn!(id = record.id, error = %e, "Failed to delete evicted record");
                    (false, Some(e.to_string()))
                }
            };

            report.evicted.push(EvictedAsset {
                id: record.id,
                url_path: record.url_path,
                canonical_path: record.canonical_path,
                file,
                record_removed,
                error,
            });
        }

        info!(
            count_before = count,
            max_assets = self.max_assets,
            removed = report.removed_count(),
            "Evicted oldest assets"
        );

        Ok(report)
    }
}
