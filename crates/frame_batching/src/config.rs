//! src/config.rs
//!
//! Configuration for the frame samplers and the shard distributor.
//!
//! `BatchingConfig` controls how batches are formed. `ShardConfig` controls how
//! they are split across processes. Both can be built in code or loaded from
//! JSON.
//!
//! Example:
//! ```ignore
//! let batching = BatchingConfig::builder()
//!     .max_frames_per_batch(20_000)
//!     .shuffle(true)
//!     .seed(1234)
//!     .category_range(2, 6)
//!     .build();
//!
//! let sharding = ShardConfig::builder()
//!     .seed(1234)
//!     .build()
//!     .with_env_overrides()?; // picks up WORLD_SIZE / RANK from the launcher
//! ```
//!
//! # Seeds
//! Use the same `seed` for both configs on every rank. Shards agree on the
//! batch order only through shared seeds and epochs.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::BatchingError;
use crate::sampler::{CategoryRange, CostModel, GreedyGrouper, OutOfRangePolicy};

/// Configuration for batch formation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchingConfig {
    /// Frame budget per batch (per device). Required, must be > 0.
    pub max_frames_per_batch: u64,
    /// Optional cap on items per batch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_items_per_batch: Option<usize>,
    /// How a batch's cost is measured against the budget.
    pub cost_model: CostModel,
    /// Whether equal-cost items are reshuffled every epoch.
    pub shuffle: bool,
    /// Base seed; epoch `e` shuffles with `seed + e`.
    pub seed: u64,
    /// Categories batched by the partitioned sampler.
    pub category_range: CategoryRange,
    /// What the partitioned sampler does with items outside `category_range`.
    pub out_of_range: OutOfRangePolicy,
}

impl Default for BatchingConfig {
    fn default() -> Self {
        Self {
            max_frames_per_batch: 0,
            max_items_per_batch: None,
            cost_model: CostModel::Sum,
            shuffle: true,
            seed: 0,
            category_range: CategoryRange::default(),
            out_of_range: OutOfRangePolicy::Drop,
        }
    }
}

impl BatchingConfig {
    pub fn builder() -> BatchingConfigBuilder {
        BatchingConfigBuilder::default()
    }

    /// Parses a config from a JSON string. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).context("Failed to parse batching config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_json_str(&json).with_context(|| format!("Invalid config in {}", path.display()))
    }

    pub fn validate(&self) -> Result<()> {
        self.grouper()?;
        self.category_range.validate()
    }

    /// The grouping primitive described by this config.
    pub fn grouper(&self) -> Result<GreedyGrouper> {
        let mut grouper =
            GreedyGrouper::new(self.max_frames_per_batch)?.with_cost_model(self.cost_model);
        if let Some(max_items) = self.max_items_per_batch {
            grouper = grouper.with_max_items(max_items)?;
        }
        Ok(grouper)
    }
}

/// Builder for BatchingConfig with method chaining
#[derive(Default)]
pub struct BatchingConfigBuilder {
    config: BatchingConfig,
}

impl BatchingConfigBuilder {
    /// Set the frame budget per batch (must be > 0)
    pub fn max_frames_per_batch(mut self, frames: u64) -> Self {
        self.config.max_frames_per_batch = frames;
        self
    }

    /// Cap the number of items per batch
    pub fn max_items_per_batch(mut self, items: usize) -> Self {
        self.config.max_items_per_batch = Some(items);
        self
    }

    pub fn cost_model(mut self, cost_model: CostModel) -> Self {
        self.config.cost_model = cost_model;
        self
    }

    /// Set whether to shuffle equal-cost items every epoch
    pub fn shuffle(mut self, shuffle: bool) -> Self {
        self.config.shuffle = shuffle;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = seed;
        self
    }

    /// Set the inclusive category range for partitioned sampling
    pub fn category_range(mut self, low: i64, high: i64) -> Self {
        self.config.category_range = CategoryRange { low, high };
        self
    }

    pub fn out_of_range(mut self, policy: OutOfRangePolicy) -> Self {
        self.config.out_of_range = policy;
        self
    }

    /// Build the final configuration. Validation happens when a sampler is
    /// built from it, or explicitly through `validate()`.
    pub fn build(self) -> BatchingConfig {
        self.config
    }
}

/// Configuration for splitting batches across processes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShardConfig {
    /// Number of participating processes (world size).
    pub num_shards: usize,
    /// Rank of this process, in `0..num_shards`.
    pub rank: usize,
    /// Whether batch positions are permuted per epoch before splitting.
    pub shuffle: bool,
    /// Truncate instead of pad when batches don't divide evenly.
    pub drop_last: bool,
    /// Shared seed; must be identical on every rank.
    pub seed: u64,
}

impl Default for ShardConfig {
    fn default() -> Self {
        Self {
            num_shards: 1,
            rank: 0,
            shuffle: true,
            drop_last: false,
            seed: 0,
        }
    }
}

impl ShardConfig {
    pub fn builder() -> ShardConfigBuilder {
        ShardConfigBuilder::default()
    }

    /// Apply `WORLD_SIZE` and `RANK` from the process environment, as set by
    /// common distributed launchers.
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    pub fn with_overrides_from<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(val) = lookup("WORLD_SIZE") {
            self.num_shards = val
                .trim()
                .parse()
                .with_context(|| format!("Invalid WORLD_SIZE '{}'", val))?;
        }
        if let Some(val) = lookup("RANK") {
            self.rank = val
                .trim()
                .parse()
                .with_context(|| format!("Invalid RANK '{}'", val))?;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.num_shards == 0 {
            return Err(BatchingError::config("num_shards must be > 0").into());
        }
        if self.rank >= self.num_shards {
            return Err(BatchingError::config(format!(
                "rank {} is out of range for {} shards",
                self.rank, self.num_shards
            ))
            .into());
        }
        Ok(())
    }
}

/// Builder for ShardConfig with method chaining
#[derive(Default)]
pub struct ShardConfigBuilder {
    config: ShardConfig,
}

impl ShardConfigBuilder {
    pub fn num_shards(mut self, num_shards: usize) -> Self {
        self.config.num_shards = num_shards;
        self
    }

    pub fn rank(mut self, rank: usize) -> Self {
        self.config.rank = rank;
        self
    }

    pub fn shuffle(mut self, shuffle: bool) -> Self {
        self.config.shuffle = shuffle;
        self
    }

    pub fn drop_last(mut self, drop: bool) -> Self {
        self.config.drop_last = drop;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = seed;
        self
    }

    pub fn build(self) -> ShardConfig {
        self.config
    }
}
