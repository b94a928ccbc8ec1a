#![allow(dead_code)]

use frame_batching::{Batch, CostLookup, InMemoryItems, ItemInfo};

use rand::{rngs::StdRng, Rng, SeedableRng};
use std::collections::HashSet;
use std::sync::Arc;

/// Items with random costs in `1..=max_cost` and categories in `0..num_categories`.
pub fn random_items(n: usize, max_cost: u64, num_categories: i64, seed: u64) -> Arc<InMemoryItems> {
    let mut rng = StdRng::seed_from_u64(seed);
    Arc::new(
        (0..n)
            .map(|_| {
                ItemInfo::new(rng.random_range(1..=max_cost))
                    .with_category(rng.random_range(0..num_categories))
            })
            .collect(),
    )
}

pub fn batch_cost(items: &InMemoryItems, batch: &Batch) -> u64 {
    batch.iter().map(|&index| items.cost(index)).sum()
}

/// Asserts that `batches` contain every index in `expected` exactly once and nothing else.
pub fn assert_exact_cover(batches: &[Batch], expected: impl IntoIterator<Item = usize>) {
    let mut seen = HashSet::new();
    for &index in batches.iter().flatten() {
        assert!(seen.insert(index), "index {} appears more than once", index);
    }
    let expected: HashSet<usize> = expected.into_iter().collect();
    assert_eq!(seen, expected);
}
