use anyhow::{bail, ensure, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use super::{Batch, CostOrderedIndexer, EpochSampler, GreedyGrouper, Sampler};
use crate::config::BatchingConfig;
use crate::error::BatchingError;
use crate::items::{CategoryLookup, CostLookup};

/// Inclusive range `[low, high]` of category ids a partitioned sampler batches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRange {
    pub low: i64,
    pub high: i64,
}

impl CategoryRange {
    pub fn new(low: i64, high: i64) -> Result<Self> {
        let range = Self { low, high };
        range.validate()?;
        Ok(range)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.low <= self.high,
            BatchingError::config(format!(
                "Category range is empty: low ({}) > high ({})",
                self.low, self.high
            ))
        );
        Ok(())
    }

    pub fn contains(&self, category: i64) -> bool {
        (self.low..=self.high).contains(&category)
    }
}

/// Language tokens start at 2; ids 0 and 1 are reserved.
impl Default for CategoryRange {
    fn default() -> Self {
        Self { low: 2, high: 6 }
    }
}

/// What happens to items whose category is missing or outside the [`CategoryRange`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutOfRangePolicy {
    /// Exclude them from every batch and log how many were excluded.
    #[default]
    Drop,
    /// Fail construction with [`BatchingError::CategoryOutOfRange`].
    Reject,
}

/// The global indices of one category, in ascending order.
#[derive(Debug, Clone)]
struct Partition {
    category: i64,
    indices: Vec<usize>,
}

/// ============================================================================
/// A [`FrameBudgetSampler`](super::FrameBudgetSampler) that never mixes categories
/// (e.g. languages) within a batch.
///
/// # Algorithm Overview
/// 1. Partitioning (construction)
///     - Groups item indices by category. Only categories inside `range` are
///       kept; the rest follow `out_of_range`.
///
/// 2. Per-partition batching (every pass)
///     - Orders each partition's local indices `0..partition_len` with its own
///       [`CostOrderedIndexer`] pass, seeded with `base_seed + epoch` like the
///       unpartitioned sampler.
///     - Groups the local order with the shared [`GreedyGrouper`].
///     - Maps every local index back to its global index.
///
/// 3. Concatenation
///     - Appends each partition's batches in ascending category id. All batches
///       of a lower category precede those of a higher one.
///
/// Categories inside the range with no items produce no batches.
///
/// # Example
/// ```ignore
/// let items = Arc::new(InMemoryItems::from_pairs([(2, 2), (2, 2), (10, 3), (1, 1)]));
/// let sampler = PartitionedFrameBudgetSampler::new(
///     items,
///     GreedyGrouper::new(10)?,
///     false,                          // shuffle
///     0,                              // base_seed
///     CategoryRange::new(2, 3)?,
///     OutOfRangePolicy::Drop,          // item 3 (category 1) is excluded
/// )?;
/// assert_eq!(sampler.iter(0).collect::<Vec<_>>(), vec![vec![0, 1], vec![2]]);
/// ```
#[derive(Debug, Clone)]
pub struct PartitionedFrameBudgetSampler<D> {
    items: Arc<D>,
    partitions: Vec<Partition>,
    indexer: CostOrderedIndexer,
    grouper: GreedyGrouper,
    range: CategoryRange,
    num_excluded: usize,
    num_batches: usize,
    epoch: usize,
}

impl<D: CategoryLookup> PartitionedFrameBudgetSampler<D> {
    pub fn new(
        items: Arc<D>,
        grouper: GreedyGrouper,
        shuffle: bool,
        base_seed: u64,
        range: CategoryRange,
        out_of_range: OutOfRangePolicy,
    ) -> Result<Self> {
        ensure!(
            !items.is_empty(),
            BatchingError::config("Item collection must not be empty")
        );
        range.validate()?;

        let mut by_category: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
        let mut num_excluded = 0;
        for index in 0..items.len() {
            match items.category(index) {
                Some(category) if range.contains(category) => {
                    by_category.entry(category).or_default().push(index);
                }
                category => {
                    if out_of_range == OutOfRangePolicy::Reject {
                        bail!(BatchingError::CategoryOutOfRange {
                            index,
                            category,
                            low: range.low,
                            high: range.high,
                        });
                    }
                    num_excluded += 1;
                }
            }
        }

        if num_excluded > 0 {
            tracing::warn!(
                "Excluding {} of {} items whose category is outside [{}, {}]",
                num_excluded,
                items.len(),
                range.low,
                range.high
            );
        }

        // BTreeMap iteration is ascending by category id.
        let partitions: Vec<Partition> = by_category
            .into_iter()
            .map(|(category, indices)| Partition { category, indices })
            .collect();

        let mut sampler = Self {
            items,
            partitions,
            indexer: CostOrderedIndexer::new(shuffle, base_seed),
            grouper,
            range,
            num_excluded,
            num_batches: 0,
            epoch: 0,
        };
        sampler.num_batches = sampler.build(0).len();

        if sampler.num_batches == 0 {
            tracing::warn!("No item falls inside [{}, {}]; sampler is empty", range.low, range.high);
        }
        tracing::info!(
            "Partitioned frame sampler: {} categories, {} batches (max {} frames per batch)",
            sampler.partitions.len(),
            sampler.num_batches,
            sampler.grouper.max_cost()
        );
        Ok(sampler)
    }

    /// Builds the sampler from a validated [`BatchingConfig`].
    pub fn from_config(items: Arc<D>, config: &BatchingConfig) -> Result<Self> {
        config.validate()?;
        Self::new(
            items,
            config.grouper()?,
            config.shuffle,
            config.seed,
            config.category_range,
            config.out_of_range,
        )
    }

    /// Computes every batch of the pass for `epoch`, partition by partition.
    pub fn build(&self, epoch: usize) -> Vec<Batch> {
        let mut batches: Vec<Batch> = Vec::new();
        for partition in &self.partitions {
            let local_cost = |local: usize| self.items.cost(partition.indices[local]);
            let order = self
                .indexer
                .indices(partition.indices.len(), local_cost, epoch);

            batches.extend(
                self.grouper
                    .group(&order, local_cost)
                    .into_iter()
                    .map(|batch| {
                        batch
                            .into_iter()
                            .map(|local| partition.indices[local])
                            .collect::<Batch>()
                    }),
            );
        }
        batches
    }

    /// Non-empty categories that are batched, ascending.
    pub fn categories(&self) -> impl Iterator<Item = i64> + '_ {
        self.partitions.iter().map(|partition| partition.category)
    }

    pub fn num_partitions(&self) -> usize {
        self.partitions.len()
    }

    /// Number of items in `category`, zero when the category has no items.
    pub fn partition_len(&self, category: i64) -> usize {
        self.partitions
            .iter()
            .find(|partition| partition.category == category)
            .map_or(0, |partition| partition.indices.len())
    }

    /// Number of items left out because of their category.
    pub fn num_excluded(&self) -> usize {
        self.num_excluded
    }

    pub fn category_range(&self) -> CategoryRange {
        self.range
    }

    pub fn items(&self) -> &Arc<D> {
        &self.items
    }
}

impl<D: CategoryLookup> Sampler for PartitionedFrameBudgetSampler<D> {
    type Item = Batch;

    fn iter(&self, epoch: usize) -> Box<dyn Iterator<Item = Batch> + Send + '_> {
        Box::new(self.build(epoch).into_iter())
    }
}

impl<D: CategoryLookup> EpochSampler for PartitionedFrameBudgetSampler<D> {
    fn len(&self) -> usize {
        self.num_batches
    }

    fn epoch(&self) -> usize {
        self.epoch
    }

    /// Applies to every partition, since they all share the same indexer.
    fn set_epoch(&mut self, epoch: usize) {
        self.epoch = epoch;
    }
}
