pub mod asset;
pub mod outcome;

// 重新导出核心类型
pub use asset::{AssetRecord, FrameDescriptor, NewAsset};
pub use outcome::{GenerationOutcome, Lookup, Trigger};
