//! 生成周期与查询的结果类型
//!
//! 重复帧是正常结果 (`Duplicate`)，与真正的失败 (`Failed`) 区分开。

use crate::error::AppError;
use crate::models::AssetRecord;
use std::fmt;

/// What started a generation cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Periodic scheduler tick; failures are logged only.
    Scheduled,
    /// Read miss in `AssetRegistry::get_by_url_path`.
    OnDemand,
    /// Explicit `trigger_generation` call.
    Manual,
    /// Initial asset for an empty store.
    Startup,
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trigger::Scheduled => write!(f, "scheduled"),
            Trigger::OnDemand => write!(f, "on_demand"),
            Trigger::Manual => write!(f, "manual"),
            Trigger::Startup => write!(f, "startup"),
        }
    }
}

/// Result of one `GenerationArbiter` cycle.
#[derive(Debug)]
pub enum GenerationOutcome {
    Created(AssetRecord),
    /// The frame is already stored; nothing changed.
    Duplicate,
    Failed(AppError),
}

impl GenerationOutcome {
    pub fn is_created(&self) -> bool {
        matches!(self, GenerationOutcome::Created(_))
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, GenerationOutcome::Duplicate)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, GenerationOutcome::Failed(_))
    }

    pub fn record(&self) -> Option<&AssetRecord> {
        match self {
            GenerationOutcome::Created(record) => Some(record),
            _ => None,
        }
    }

    pub fn into_record(self) -> Option<AssetRecord> {
        match self {
            GenerationOutcome::Created(record) => Some(record),
            _ => None,
        }
    }
}

/// Result of `AssetRegistry::get_by_url_path`.
#[derive(Debug)]
pub enum Lookup {
    /// The requested asset was already stored.
    Found(AssetRecord),
    /// The request missed and the on-demand cycle created this asset.
    Generated(AssetRecord),
    /// The request missed and the on-demand cycle produced no new frame.
    NotFound,
    /// The request missed and the on-demand cycle failed.
    Failed(AppError),
}

impl Lookup {
    pub fn record(&self) -> Option<&AssetRecord> {
        match self {
            Lookup::Found(record) | Lookup::Generated(record) => Some(record),
            _ => None,
        }
    }
}
