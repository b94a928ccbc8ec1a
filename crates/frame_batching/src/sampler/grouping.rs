use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};

use super::Batch;
use crate::error::BatchingError;

/// How the cost of a candidate batch is measured against the budget.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostModel {
    /// Sum of member costs (total frames in the batch).
    #[default]
    Sum,
    /// `max member cost * number of members`, i.e. the frames the batch
    /// occupies once every member is padded to the longest one.
    Padded,
}

/// Greedy first-fit grouping of an ordered index stream into cost-bounded batches.
///
/// Walks `order` once and appends each index to the open batch while the batch
/// stays within `max_cost` (and `max_items`, when set). Otherwise it closes the
/// batch and opens a new one. It never reorders: concatenating the output gives
/// back `order`.
///
/// An item that exceeds the budget on its own is emitted as a singleton batch.
/// It is never dropped.
///
/// # Example
/// ```ignore
/// let costs = [3, 1, 4, 1, 5];
/// let grouper = GreedyGrouper::new(5)?;
/// let batches = grouper.group(&[4, 2, 0, 1, 3], |i| costs[i]);
/// assert_eq!(batches, vec![vec![4], vec![2], vec![0, 1, 3]]);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GreedyGrouper {
    max_cost: u64,
    max_items: Option<usize>,
    cost_model: CostModel,
}

impl GreedyGrouper {
    pub fn new(max_cost: u64) -> Result<Self> {
        ensure!(
            max_cost > 0,
            BatchingError::config(format!(
                "max_frames_per_batch must be > 0, but got max_frames_per_batch={}",
                max_cost
            ))
        );
        Ok(Self {
            max_cost,
            max_items: None,
            cost_model: CostModel::Sum,
        })
    }

    /// Caps the number of items per batch in addition to the cost budget.
    pub fn with_max_items(mut self, max_items: usize) -> Result<Self> {
        ensure!(
            max_items > 0,
            BatchingError::config(format!(
                "max_items_per_batch must be > 0, but got max_items_per_batch={}",
                max_items
            ))
        );
        self.max_items = Some(max_items);
        Ok(self)
    }

    pub fn with_cost_model(mut self, cost_model: CostModel) -> Self {
        self.cost_model = cost_model;
        self
    }

    pub fn max_cost(&self) -> u64 {
        self.max_cost
    }

    pub fn max_items(&self) -> Option<usize> {
        self.max_items
    }

    pub fn cost_model(&self) -> CostModel {
        self.cost_model
    }

    /// Groups `order` into batches, looking up each index's cost with `cost`.
    pub fn group<F>(&self, order: &[usize], cost: F) -> Vec<Batch>
    where
        F: Fn(usize) -> u64,
    {
        let mut batches = Vec::new();
        let mut current: Batch = Vec::new();
        let mut sum = 0u64;
        let mut max = 0u64;

        for &index in order {
            let item_cost = cost(index);
            if !current.is_empty() && !self.fits(current.len(), sum, max, item_cost) {
                batches.push(std::mem::take(&mut current));
                sum = 0;
                max = 0;
            }
            current.push(index);
            sum = sum.saturating_add(item_cost);
            max = max.max(item_cost);
        }

        if !current.is_empty() {
            batches.push(current);
        }
        batches
    }

    /// Whether one more item of `item_cost` fits into an open batch of `len`
    /// items with the given running `sum` and `max`.
    fn fits(&self, len: usize, sum: u64, max: u64, item_cost: u64) -> bool {
        if self.max_items.is_some_and(|cap| len >= cap) {
            return false;
        }
        let batch_cost = match self.cost_model {
            CostModel::Sum => sum.saturating_add(item_cost),
            CostModel::Padded => max.max(item_cost).saturating_mul(len as u64 + 1),
        };
        batch_cost <= self.max_cost
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::kind_of;

    #[test]
    fn rejects_invalid_parameters() {
        let err = GreedyGrouper::new(0).unwrap_err();
        assert!(kind_of(&err).is_some_and(BatchingError::is_config));

        let err = GreedyGrouper::new(10).unwrap().with_max_items(0).unwrap_err();
        assert!(kind_of(&err).is_some_and(BatchingError::is_config));
    }

    #[test]
    fn groups_greedily_along_order() -> Result<()> {
        let costs = [3u64, 1, 4, 1, 5];
        let grouper = GreedyGrouper::new(5)?;
        let batches = grouper.group(&[4, 2, 0, 1, 3], |i| costs[i]);
        assert_eq!(batches, vec![vec![4], vec![2], vec![0, 1, 3]]);
        Ok(())
    }

    #[test]
    fn never_reorders() -> Result<()> {
        let costs: Vec<u64> = (0..50).map(|i| (i * 13 % 17) as u64).collect();
        let order: Vec<usize> = (0..50).rev().collect();
        let batches = GreedyGrouper::new(20)?.group(&order, |i| costs[i]);
        let flattened: Vec<usize> = batches.into_iter().flatten().collect();
        assert_eq!(flattened, order);
        Ok(())
    }

    #[test]
    fn oversized_items_become_singletons() -> Result<()> {
        let costs = [2u64, 12, 0, 3, 9];
        let grouper = GreedyGrouper::new(8)?;
        let batches = grouper.group(&[0, 1, 2, 3, 4], |i| costs[i]);
        assert_eq!(batches, vec![vec![0], vec![1], vec![2, 3], vec![4]]);
        Ok(())
    }

    #[test]
    fn respects_item_cap() -> Result<()> {
        let costs = [1u64; 7];
        let grouper = GreedyGrouper::new(100)?.with_max_items(3)?;
        let batches = grouper.group(&[0, 1, 2, 3, 4, 5, 6], |i| costs[i]);
        assert_eq!(batches, vec![vec![0, 1, 2], vec![3, 4, 5], vec![6]]);
        Ok(())
    }

    #[test]
    fn padded_model_charges_longest_member() -> Result<()> {
        // Sorted descending as the indexer would hand them over.
        let costs = [5u64, 4, 3, 1, 1];
        let grouper = GreedyGrouper::new(8)?.with_cost_model(CostModel::Padded);
        let batches = grouper.group(&[0, 1, 2, 3, 4], |i| costs[i]);
        // [5] + 4 -> 5*2=10 > 8; [4] + 3 -> 4*2=8; + 1 -> 4*3=12 > 8; [1, 1].
        assert_eq!(batches, vec![vec![0], vec![1, 2], vec![3, 4]]);

        let sum_batches = GreedyGrouper::new(8)?.group(&[0, 1, 2, 3, 4], |i| costs[i]);
        assert_eq!(sum_batches, vec![vec![0], vec![1, 2, 3], vec![4]]);
        Ok(())
    }

    #[test]
    fn handles_empty_order() -> Result<()> {
        assert!(GreedyGrouper::new(1)?.group(&[], |_| 0).is_empty());
        Ok(())
    }
}
