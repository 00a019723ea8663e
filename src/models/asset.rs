//! 资产记录数据结构
//!
//! `AssetRecord` 创建后不可变；只有生成周期会创建它，只有淘汰和启动对账会删除它。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Frame identity attributes reported by a renderer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameDescriptor {
    pub satellite: String,
    pub sector: String,
    pub product: String,
    pub band: String,
}

impl FrameDescriptor {
    pub fn new(
        satellite: impl Into<String>,
        sector: impl Into<String>,
        product: impl Into<String>,
        band: impl Into<String>,
    ) -> Self {
        Self {
            satellite: satellite.into(),
            sector: sector.into(),
            product: product.into(),
            band: band.into(),
        }
    }

    /// Identity used by the mock renderer.
    pub fn mock() -> Self {
        Self::new("MOCK-GOES19", "F", "MOCK", "13")
    }
}

/// Row stored in the metadata index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetRecord {
    pub id: i64,
    pub canonical_path: PathBuf,
    pub url_path: String,
    pub file_name: String,
    pub captured_at: DateTime<Utc>,
    pub satellite: String,
    pub sector: String,
    pub product: String,
    pub band: String,
    pub caption: Option<String>,
    pub file_size_bytes: u64,
    pub fingerprint: String,
    pub created_at: DateTime<Utc>,
}

impl AssetRecord {
    /// Absolute URL under the public base, e.g. `https://host/api/goes/GOES19_...`
    pub fn public_url(&self, base_url: &str) -> String {
        format!("{}{}", base_url.trim_end_matches('/'), self.url_path)
    }

    /// Size in KiB rounded to one decimal place.
    pub fn size_kb(&self) -> f64 {
        (self.file_size_bytes as f64 / 1024.0 * 10.0).round() / 10.0
    }

    pub fn frame(&self) -> FrameDescriptor {
        FrameDescriptor::new(&self.satellite, &self.sector, &self.product, &self.band)
    }
}

/// Values supplied to `MetadataIndex::insert`; id and created_at are assigned by the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAsset {
    pub canonical_path: PathBuf,
    pub url_path: String,
    pub file_name: String,
    pub captured_at: DateTime<Utc>,
    pub frame: FrameDescriptor,
    pub caption: Option<String>,
    pub file_size_bytes: u64,
    pub fingerprint: String,
}
