//! 服务健康状态
//!
//! `AssetRegistry::health_check` 返回的快照类型。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 健康状态枚举
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthStatus {
    /// 健康
    Healthy,
    /// 降级（索引可用但尚无帧）
    Degraded,
    /// 不健康
    Unhealthy,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "Healthy"),
            HealthStatus::Degraded => write!(f, "Degraded"),
            HealthStatus::Unhealthy => write!(f, "Unhealthy"),
        }
    }
}

/// 服务健康快照
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceHealth {
    /// 服务名称
    pub service_name: String,
    /// 是否健康
    pub is_healthy: bool,
    /// 检查时间
    pub last_check: DateTime<Utc>,
    /// 健康状态
    pub status: HealthStatus,
    /// 详细信息
    pub details: BTreeMap<String, String>,
    /// 可选的消息
    pub message: Option<String>,
}

impl ServiceHealth {
    fn with_status(
        service_name: impl Into<String>,
        status: HealthStatus,
        message: Option<String>,
    ) -> Self {
        Self {
            service_name: service_name.into(),
            is_healthy: status != HealthStatus::Unhealthy,
            last_check: Utc::now(),
            status,
            details: BTreeMap::new(),
            message,
        }
    }

    /// 创建健康状态
    pub fn healthy(service_name: impl Into<String>) -> Self {
        Self::with_status(service_name, HealthStatus::Healthy, None)
    }

    /// 创建不健康状态
    pub fn unhealthy(service_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::with_status(service_name, HealthStatus::Unhealthy, Some(message.into()))
    }

    /// 创建降级状态
    pub fn degraded(service_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::with_status(service_name, HealthStatus::Degraded, Some(message.into()))
    }

    /// 添加详细信息
    pub fn with_detail(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.details.insert(key.into(), value.to_string());
        self
    }

    pub fn detail(&self, key: &str) -> Option<&str> {
        self.details.get(key).map(String::as_str)
    }
}
