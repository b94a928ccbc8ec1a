use anyhow::{ensure, Result};
use rand::seq::SliceRandom;

use super::{derive_rng_for_epoch, EpochSampler, SnapshotSource};
use crate::config::ShardConfig;
use crate::error::BatchingError;

/// ============================================================================
/// Splits the output of any [`EpochSampler`] across `num_shards` processes.
///
/// Each process wraps its own copy of the same sampler. The sampler's pass for
/// the current epoch is materialized once through a [`SnapshotSource`], and
/// each rank receives a disjoint, equally sized subset of it.
///
/// # Arguments:
/// - `sampler`: The sampler to distribute (e.g. `FrameBudgetSampler`).
/// - `num_shards`: Total number of processes. Must be > 0.
/// - `rank`: This process's shard. Must satisfy `0 <= rank < num_shards`.
/// - `shuffle`: Whether snapshot positions are permuted before splitting.
/// - `drop_last`: If true, positions beyond a multiple of `num_shards` are dropped.
///                If false, positions are padded by cycling from the front until
///                the count is evenly divisible.
/// - `base_seed`: Base RNG seed. Must be identical on every rank.
///
/// # Shard allocation
/// - For a snapshot of 10 batches across 3 shards, without shuffling:
/// ```text
/// Positions: [0, 1, 2, 3, 4, 5, 6, 7, 8, 9]
///
/// drop_last=true (truncate to 9 positions)
///   Shard 0: [0, 3, 6]
///   Shard 1: [1, 4, 7]
///   Shard 2: [2, 5, 8] // 9 is dropped
///
/// drop_last=false (pad to 12 positions)
///   Shard 0: [0, 3, 6, 9]
///   Shard 1: [1, 4, 7, 0] // padded with position 0
///   Shard 2: [2, 5, 8, 1] // padded with position 1
/// ```
///
/// # Deterministic shuffling
/// - The position permutation is drawn from `base_seed + epoch`. Every rank
///   computes the same permutation independently, so no communication is needed.
/// - `set_epoch` also forwards the epoch to the wrapped sampler. Its own
///   shuffle, and with it the snapshot, changes every epoch.
///
/// # Example
/// ```ignore
/// let sampler = FrameBudgetSampler::new(items, 4096, true, seed)?;
/// let mut sharded = ShardedSampler::new(sampler, world_size, rank, true, false, seed)?;
///
/// for epoch in 0..num_epochs {
///     sharded.set_epoch(epoch);
///     for batch in sharded.iter()? {
///         // fetch and train on `batch`
///     }
/// }
/// ```
#[derive(Debug)]
pub struct ShardedSampler<S: EpochSampler> {
    source: SnapshotSource<S>,
    num_shards: usize,
    rank: usize,
    shuffle: bool,
    drop_last: bool,
    base_seed: u64,
    epoch: usize,
}

impl<S> ShardedSampler<S>
where
    S: EpochSampler,
    S::Item: Clone,
{
    pub fn new(
        sampler: S,
        num_shards: usize,
        rank: usize,
        shuffle: bool,
        drop_last: bool,
        base_seed: u64,
    ) -> Result<Self> {
        ensure!(
            num_shards > 0,
            BatchingError::config("Number of shards must be > 0")
        );
        ensure!(
            rank < num_shards,
            BatchingError::config(format!(
                "Invalid rank {rank}, rank should be in the interval [0, {}]",
                num_shards - 1
            ))
        );
        Ok(Self {
            source: SnapshotSource::new(sampler),
            num_shards,
            rank,
            shuffle,
            drop_last,
            base_seed,
            epoch: 0,
        })
    }

    /// Builds the distributor from a validated [`ShardConfig`].
    pub fn from_config(sampler: S, config: &ShardConfig) -> Result<Self> {
        config.validate()?;
        Self::new(
            sampler,
            config.num_shards,
            config.rank,
            config.shuffle,
            config.drop_last,
            config.seed,
        )
    }

    /// Total number of positions across all shards after padding or truncation.
    ///
    /// If `drop_last = true`:
    /// - Truncate to the largest multiple of `num_shards` not above the sampler length.
    /// - Example: `len = 10`, `num_shards = 3` → `9`.
    ///
    /// If `drop_last = false`:
    /// - Pad up to the smallest multiple of `num_shards` not below the sampler length.
    /// - Example: `len = 10`, `num_shards = 3` → `12`.
    pub fn total_size(&self) -> usize {
        let len = self.source.size();
        if self.drop_last {
            len - (len % self.num_shards)
        } else {
            len.div_ceil(self.num_shards) * self.num_shards
        }
    }

    /// Number of items this shard yields per epoch; identical on every rank.
    pub fn num_samples(&self) -> usize {
        self.total_size() / self.num_shards
    }

    pub fn len(&self) -> usize {
        self.num_samples()
    }

    pub fn is_empty(&self) -> bool {
        self.num_samples() == 0
    }

    pub fn epoch(&self) -> usize {
        self.epoch
    }

    /// Sets the epoch for the shard permutation and the wrapped sampler.
    pub fn set_epoch(&mut self, epoch: usize) {
        self.epoch = epoch;
        self.source.inner_mut().set_epoch(epoch);
    }

    pub fn num_shards(&self) -> usize {
        self.num_shards
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn inner(&self) -> &S {
        self.source.inner()
    }

    pub fn into_inner(self) -> S {
        self.source.into_inner()
    }

    /// Snapshot positions assigned to this rank for the current epoch.
    pub fn shard_positions(&self) -> Vec<usize> {
        let mut positions: Vec<usize> = (0..self.source.size()).collect();

        if self.shuffle {
            positions.shuffle(&mut derive_rng_for_epoch(self.base_seed, self.epoch));
        }

        let total_size = self.total_size();

        if self.drop_last {
            positions.truncate(total_size);
        } else if total_size > positions.len() {
            let padding: Vec<_> = positions
                .iter()
                .cycle()
                .take(total_size - positions.len())
                .cloned()
                .collect();
            positions.extend(padding);
        }

        // Each rank picks every `num_shards`th position starting at its own rank.
        positions
            .into_iter()
            .skip(self.rank)
            .step_by(self.num_shards)
            .collect()
    }

    /// Iterates this rank's items for the current epoch.
    ///
    /// # Errors
    /// - [`BatchingError::Consistency`] if the wrapped sampler's pass does not
    ///   match its declared length.
    pub fn iter(&self) -> Result<Box<dyn Iterator<Item = S::Item> + Send + '_>> {
        let snapshot = self.source.snapshot()?;
        let positions = self.shard_positions();
        Ok(Box::new(
            positions
                .into_iter()
                .map(move |position| snapshot[position].clone()),
        ))
    }
}
