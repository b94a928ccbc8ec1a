use anyhow::{ensure, Result};
use std::sync::Arc;

use super::{Batch, CostOrderedIndexer, EpochSampler, GreedyGrouper, Sampler};
use crate::config::BatchingConfig;
use crate::error::BatchingError;
use crate::items::CostLookup;

/// ============================================================================
/// Yields batches whose total cost (frames) stays within a per-device budget.
///
/// Each pass orders all items by cost, largest first, using
/// [`CostOrderedIndexer`] (equal costs are shuffled per epoch when `shuffle` is
/// set). [`GreedyGrouper`] then cuts that order into batches. Items of similar
/// length end up together, which keeps padding low.
///
/// # Type parameters
/// - `D`: The item collection. It is held through an `Arc` and never copied.
///
/// # Arguments:
/// - `items`: Shared item collection. Must not be empty.
/// - `grouper`: Budget, optional item cap and cost model.
/// - `shuffle`: Whether equal-cost items are reshuffled every epoch.
/// - `base_seed`: Base RNG seed. Epoch `e` uses `base_seed + e`.
///
/// # Length
/// The batch count is computed once at construction from an epoch-0 pass.
/// Shuffling only reorders equal-cost items, so every epoch yields the same
/// number of batches.
///
/// # Example
/// ```ignore
/// let items = Arc::new(InMemoryItems::from_costs([3, 1, 4, 1, 5]));
/// let mut sampler = FrameBudgetSampler::new(items, 5, false, 0)?;
/// assert_eq!(sampler.len(), 3);
///
/// for epoch in 0..num_epochs {
///     sampler.set_epoch(epoch);
///     for batch in sampler.iter_current() {
///         // `batch` is a Vec<usize> of item indices
///     }
/// }
/// ```
#[derive(Debug, Clone)]
pub struct FrameBudgetSampler<D> {
    items: Arc<D>,
    indexer: CostOrderedIndexer,
    grouper: GreedyGrouper,
    num_batches: usize,
    epoch: usize,
}

impl<D: CostLookup> FrameBudgetSampler<D> {
    pub fn new(
        items: Arc<D>,
        max_frames_per_batch: u64,
        shuffle: bool,
        base_seed: u64,
    ) -> Result<Self> {
        let grouper = GreedyGrouper::new(max_frames_per_batch)?;
        Self::with_grouper(items, grouper, shuffle, base_seed)
    }

    /// Builds the sampler from a validated [`BatchingConfig`].
    ///
    /// The config's category settings are ignored here.
    pub fn from_config(items: Arc<D>, config: &BatchingConfig) -> Result<Self> {
        config.validate()?;
        Self::with_grouper(items, config.grouper()?, config.shuffle, config.seed)
    }

    pub fn with_grouper(
        items: Arc<D>,
        grouper: GreedyGrouper,
        shuffle: bool,
        base_seed: u64,
    ) -> Result<Self> {
        ensure!(
            !items.is_empty(),
            BatchingError::config("Item collection must not be empty")
        );

        let mut sampler = Self {
            items,
            indexer: CostOrderedIndexer::new(shuffle, base_seed),
            grouper,
            num_batches: 0,
            epoch: 0,
        };
        sampler.num_batches = sampler.build(0).len();

        tracing::info!(
            "Frame sampler: {} items -> {} batches (max {} frames per batch)",
            sampler.items.len(),
            sampler.num_batches,
            sampler.grouper.max_cost()
        );
        Ok(sampler)
    }

    /// Computes every batch of the pass for `epoch`.
    pub fn build(&self, epoch: usize) -> Vec<Batch> {
        let cost = |index: usize| self.items.cost(index);
        let order = self.indexer.indices(self.items.len(), cost, epoch);
        self.grouper.group(&order, cost)
    }

    pub fn items(&self) -> &Arc<D> {
        &self.items
    }

    pub fn max_frames_per_batch(&self) -> u64 {
        self.grouper.max_cost()
    }
}

impl<D: CostLookup> Sampler for FrameBudgetSampler<D> {
    type Item = Batch;

    fn iter(&self, epoch: usize) -> Box<dyn Iterator<Item = Batch> + Send + '_> {
        Box::new(self.build(epoch).into_iter())
    }
}

impl<D: CostLookup> EpochSampler for FrameBudgetSampler<D> {
    fn len(&self) -> usize {
        self.num_batches
    }

    fn epoch(&self) -> usize {
        self.epoch
    }

    fn set_epoch(&mut self, epoch: usize) {
        self.epoch = epoch;
    }
}
