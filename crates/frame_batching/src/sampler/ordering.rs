use rand::seq::SliceRandom;
use std::cmp::Reverse;

use super::derive_rng_for_epoch;

/// Orders item indices by cost, largest first, with an epoch-dependent tiebreak.
///
/// # Algorithm
/// 1. Pick the tiebreak order:
///    - `shuffle = true`: a uniformly random permutation of `0..len`, drawn from
///      `StdRng::seed_from_u64(base_seed + epoch)`.
///    - `shuffle = false`: the identity order `0, 1, ..., len-1`.
/// 2. Stable-sort that order by cost, descending.
///
/// Items of equal cost keep their tiebreak order. Shuffling therefore only
/// changes which equal-cost items end up next to each other, never the overall
/// cost profile. That keeps batch sizes, and the batch count, stable across
/// epochs.
///
/// The result depends only on `(len, costs, epoch, shuffle, base_seed)`.
///
/// # Example
/// ```ignore
/// let costs = [3, 1, 4, 1, 5];
/// let indexer = CostOrderedIndexer::new(false, 0);
/// let order = indexer.indices(costs.len(), |i| costs[i], 0);
/// assert_eq!(order, vec![4, 2, 0, 1, 3]);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CostOrderedIndexer {
    shuffle: bool,
    base_seed: u64,
}

impl CostOrderedIndexer {
    pub fn new(shuffle: bool, base_seed: u64) -> Self {
        Self { shuffle, base_seed }
    }

    pub fn shuffle(&self) -> bool {
        self.shuffle
    }

    pub fn base_seed(&self) -> u64 {
        self.base_seed
    }

    /// Returns the cost-ordered permutation of `0..len` for `epoch`.
    pub fn indices<F>(&self, len: usize, cost: F, epoch: usize) -> Vec<usize>
    where
        F: Fn(usize) -> u64,
    {
        let mut order: Vec<usize> = (0..len).collect();
        if self.shuffle {
            order.shuffle(&mut derive_rng_for_epoch(self.base_seed, epoch));
        }
        // `sort_by_key` is stable: ties keep the tiebreak order chosen above.
        order.sort_by_key(|&index| Reverse(cost(index)));
        order
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    const TEST_SEED: u64 = 42;

    #[test]
    fn orders_by_cost_descending_without_shuffle() {
        let costs = [3u64, 1, 4, 1, 5];
        let indexer = CostOrderedIndexer::new(false, TEST_SEED);
        assert_eq!(
            indexer.indices(costs.len(), |i| costs[i], 0),
            vec![4, 2, 0, 1, 3]
        );
    }

    #[test]
    fn identity_tiebreak_ignores_epoch() {
        let costs = vec![2u64; 10];
        let indexer = CostOrderedIndexer::new(false, TEST_SEED);
        let expected: Vec<_> = (0..10).collect();
        assert_eq!(indexer.indices(10, |i| costs[i], 0), expected);
        assert_eq!(indexer.indices(10, |i| costs[i], 5), expected);
    }

    #[test]
    fn produces_deterministic_results() {
        let costs: Vec<u64> = (0..200).map(|i| (i % 7) as u64).collect();
        let indexer = CostOrderedIndexer::new(true, TEST_SEED);

        let epoch1 = indexer.indices(costs.len(), |i| costs[i], 1);
        assert_eq!(epoch1, indexer.indices(costs.len(), |i| costs[i], 1));
        assert_ne!(epoch1, indexer.indices(costs.len(), |i| costs[i], 2));

        // A separately constructed indexer with the same seed agrees (e.g. another rank).
        let other = CostOrderedIndexer::new(true, TEST_SEED);
        assert_eq!(epoch1, other.indices(costs.len(), |i| costs[i], 1));
    }

    #[test]
    fn shuffled_order_is_a_permutation_sorted_by_cost() {
        let costs: Vec<u64> = (0..100).map(|i| ((i * 37) % 11) as u64).collect();
        let indexer = CostOrderedIndexer::new(true, TEST_SEED);
        let order = indexer.indices(costs.len(), |i| costs[i], 3);

        assert_eq!(order.len(), costs.len());
        assert_eq!(HashSet::<_>::from_iter(order.iter().copied()).len(), costs.len());
        assert!(order.windows(2).all(|w| costs[w[0]] >= costs[w[1]]));
    }

    #[test]
    fn shuffle_only_reorders_equal_costs() {
        let costs: Vec<u64> = (0..60).map(|i| (i / 10) as u64).collect();
        let indexer = CostOrderedIndexer::new(true, TEST_SEED);
        let profile = |order: &[usize]| order.iter().map(|&i| costs[i]).collect::<Vec<_>>();

        let epoch0 = indexer.indices(costs.len(), |i| costs[i], 0);
        let epoch1 = indexer.indices(costs.len(), |i| costs[i], 1);
        assert_eq!(profile(&epoch0), profile(&epoch1));
        assert_ne!(epoch0, epoch1);
    }

    #[test]
    fn handles_empty_input() {
        let indexer = CostOrderedIndexer::new(true, TEST_SEED);
        assert!(indexer.indices(0, |_| 0, 0).is_empty());
    }
}
