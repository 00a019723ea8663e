//! Asset lifecycle: naming, dedup, eviction, the generation cycle and its scheduler

pub mod arbiter;
pub mod dedup;
pub mod evictor;
pub mod naming;
pub mod scheduler;

pub use arbiter::{ArbiterOptions, CycleState, GenerationArbiter};
pub use dedup::DedupGuard;
pub use evictor::{CapacityEvictor, EvictedAsset, EvictionReport};
pub use naming::AssetNaming;
pub use scheduler::GenerationScheduler;
