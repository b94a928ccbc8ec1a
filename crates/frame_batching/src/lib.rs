pub mod config;
pub mod error;
pub mod items;
pub mod readers;
pub mod sampler;

pub use config::{BatchingConfig, ShardConfig};
pub use error::BatchingError;
pub use items::{CategoryLookup, CostLookup, InMemoryItems, ItemInfo};
pub use readers::ManifestSource;
pub use sampler::{
    Batch, EpochSampler, FrameBudgetSampler, PartitionedFrameBudgetSampler, ReshuffledSampler,
    Sampler, ShardedSampler,
};
