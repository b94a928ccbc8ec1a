//! src/sampler/mod.rs
//!
//! Samplers that turn an item collection into frame-budgeted batches of indices,
//! plus wrappers that redistribute those batches for multi-process training.
//!
//! # Architecture Overview
//!
//! ```text
//!        ┌────────────────┐
//!        │ Item collection│ (CostLookup / CategoryLookup)
//!        └───────┬────────┘
//!                │ per-item cost (and category)
//!                ↓
//!      ┌──────────────────────┐
//!      │  CostOrderedIndexer  │ (cost desc, epoch-seeded tiebreak)
//!      └─────────┬────────────┘
//!                │ permutation (one per category when partitioned)
//!                ↓
//!        ┌───────────────┐
//!        │ GreedyGrouper │ (first-fit along the order, never reorders)
//!        └───────┬───────┘
//!                │ Vec<Batch>
//!                ↓
//!   FrameBudgetSampler / PartitionedFrameBudgetSampler
//!                │
//!                ↓ (optional)
//!        ┌───────────────┐
//!        │ SnapshotSource│ (one materialized pass per epoch)
//!        └───┬───────┬───┘
//!            ↓       ↓
//!   ShardedSampler  ReshuffledSampler
//! ```
//!
//! # Module Structure
//!
//! ```text
//! src/sampler/
//! ├── mod.rs          # Sampler / EpochSampler traits
//! ├── ordering.rs     # CostOrderedIndexer
//! ├── grouping.rs     # GreedyGrouper and CostModel
//! ├── frame.rs        # FrameBudgetSampler
//! ├── partitioned.rs  # PartitionedFrameBudgetSampler, CategoryRange
//! ├── snapshot.rs     # SnapshotSource
//! ├── sharded.rs      # ShardedSampler
//! └── reshuffle.rs    # ReshuffledSampler
//! ```
//!
//! # Seed handling
//! Every epoch-dependent shuffle seeds a fresh `StdRng` with `base_seed + epoch`
//! (wrapping). Shards never talk to each other: they agree on the order only
//! because they share `base_seed` and the epoch number. The formula is therefore
//! part of the cross-process contract and must not change between ranks.

mod frame;
mod grouping;
mod ordering;
mod partitioned;
mod reshuffle;
mod sharded;
mod snapshot;

pub use frame::FrameBudgetSampler;
pub use grouping::{CostModel, GreedyGrouper};
pub use ordering::CostOrderedIndexer;
pub use partitioned::{CategoryRange, OutOfRangePolicy, PartitionedFrameBudgetSampler};
pub use reshuffle::ReshuffledSampler;
pub use sharded::ShardedSampler;
pub use snapshot::SnapshotSource;

use rand::{rngs::StdRng, SeedableRng};

/// A group of item indices processed together.
pub type Batch = Vec<usize>;

/// A `Sampler` defines the strategy for how to iterate and draw samples from
/// a dataset.
///
/// # Associated type
/// - `Item`: The handle yielded by the iterator. For the frame samplers in this
///   crate it is a [`Batch`].
///
/// # Method
/// - `iter(epoch)`: returns a sequential or shuffled sequence for that epoch.
///    - The epoch is combined with the sampler's base seed, so the same epoch
///      always yields the same sequence.
///
/// Implementations must be `Send + Sync` so the same sampler instance can be
/// safely shared across threads.
pub trait Sampler: Send + Sync {
    type Item: Send + Sync;

    fn iter(&self, epoch: usize) -> Box<dyn Iterator<Item = Self::Item> + Send + '_>;
}

/// A [`Sampler`] with a known length and an owned current epoch.
///
/// The epoch is explicit state that only `set_epoch` mutates. The training
/// driver calls it once per epoch before iterating. `iter_current` reads it at
/// the start of each iteration, so changing the epoch never affects an iterator
/// that already exists.
pub trait EpochSampler: Sampler {
    /// Number of items one full pass yields. This is fixed at construction.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn epoch(&self) -> usize;

    fn set_epoch(&mut self, epoch: usize);

    /// Iterates the pass for the current epoch.
    fn iter_current(&self) -> Box<dyn Iterator<Item = Self::Item> + Send + '_> {
        self.iter(self.epoch())
    }
}

/// Derives the deterministic random number generator for the given epoch.
#[inline]
pub(crate) fn derive_rng_for_epoch(base_seed: u64, epoch: usize) -> StdRng {
    StdRng::seed_from_u64(base_seed.wrapping_add(epoch as u64))
}
