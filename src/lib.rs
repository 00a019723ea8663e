//! frame-vault
//!
//! 周期性渲染卫星帧的有界、去重、崩溃一致的存储。
//!
//! - `storage`: SQLite 元数据索引 + 图片目录，单写者门控
//! - `lifecycle`: 命名、去重、淘汰、生成周期与定时调度
//! - `renderer`: 渲染器接口及 mock / 外部命令实现
//! - `registry`: 对外读取与触发接口

pub mod clock;
pub mod error;
pub mod lifecycle;
pub mod logging;
pub mod models;
pub mod registry;
pub mod renderer;
pub mod services;
pub mod storage;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{AppError, Result};
pub use models::{AssetRecord, FrameDescriptor, GenerationOutcome, Lookup, NewAsset, Trigger};
pub use registry::{AssetRegistry, StartupReport};
pub use renderer::{RenderedArtifact, Renderer};
pub use services::{ServiceHealth, StoreConfiguration};
