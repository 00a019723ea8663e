//! 服务层：配置与健康状态

pub mod service_config;
pub mod service_lifecycle;

pub use service_config::{
    FrameSettings, GenerationSettings, LoggingSettings, NamingSettings, RendererMode,
    RendererSettings, StorageSettings, StoreConfiguration,
};
pub use service_lifecycle::{HealthStatus, ServiceHealth};
