//! Batch formation tests for the plain and partitioned frame samplers.
//!
//! Tests cover:
//! - Exact batch partitions for small hand-computed inputs
//! - Budget and coverage over random collections
//! - Category homogeneity and ordering of partitioned batches
//! - Determinism per (seed, epoch)

mod common;
use common::{assert_exact_cover, batch_cost, random_items};

use frame_batching::{
    sampler::{CostModel, OutOfRangePolicy},
    Batch, BatchingConfig, BatchingError, CategoryLookup, EpochSampler, FrameBudgetSampler,
    InMemoryItems, PartitionedFrameBudgetSampler, Sampler,
};

use anyhow::Result;
use std::sync::Arc;

const TEST_SEED: u64 = 42;

// ============================================================================
// Plain frame sampler
// ============================================================================

#[test]
fn test_descending_cost_greedy_partition() -> Result<()> {
    let items = Arc::new(InMemoryItems::from_costs(vec![3, 1, 4, 1, 5]));
    let sampler = FrameBudgetSampler::new(items, 5, false, TEST_SEED)?;

    let batches: Vec<Batch> = sampler.iter_current().collect();
    assert_eq!(batches, vec![vec![4], vec![2], vec![0, 1, 3]]);
    assert_eq!(sampler.len(), 3);
    Ok(())
}

#[test]
fn test_budget_and_coverage_on_random_items() -> Result<()> {
    for seed in 0..5 {
        let items = random_items(500, 300, 1, seed);
        let config = BatchingConfig::builder()
            .max_frames_per_batch(1000)
            .seed(seed)
            .build();
        let sampler = FrameBudgetSampler::from_config(Arc::clone(&items), &config)?;

        for epoch in 0..3 {
            let batches: Vec<Batch> = sampler.iter(epoch).collect();
            assert_eq!(batches.len(), sampler.len());
            assert!(batches.iter().all(|b| batch_cost(&items, b) <= 1000));
            assert_exact_cover(&batches, 0..500);
        }
    }
    Ok(())
}

#[test]
fn test_oversized_items_stand_alone() -> Result<()> {
    let items = Arc::new(InMemoryItems::from_costs(vec![2, 50, 3, 70]));
    let sampler = FrameBudgetSampler::new(items, 10, false, TEST_SEED)?;
    let batches: Vec<Batch> = sampler.iter_current().collect();
    assert_eq!(batches, vec![vec![3], vec![1], vec![2, 0]]);
    Ok(())
}

#[test]
fn test_same_seed_and_epoch_reproduce_batches() -> Result<()> {
    let items = random_items(300, 20, 1, TEST_SEED);
    let a = FrameBudgetSampler::new(Arc::clone(&items), 60, true, 7)?;
    let b = FrameBudgetSampler::new(Arc::clone(&items), 60, true, 7)?;

    for epoch in 0..4 {
        assert_eq!(a.build(epoch), b.build(epoch));
    }
    assert_ne!(a.build(0), a.build(1));
    Ok(())
}

#[test]
fn test_padded_cost_model_bounds_padded_frames() -> Result<()> {
    let items = random_items(400, 100, 1, 3);
    let config = BatchingConfig::builder()
        .max_frames_per_batch(400)
        .cost_model(CostModel::Padded)
        .build();
    let sampler = FrameBudgetSampler::from_config(Arc::clone(&items), &config)?;

    let batches: Vec<Batch> = sampler.iter_current().collect();
    for batch in &batches {
        let longest = batch.iter().map(|&i| items.get(i).map_or(0, |item| item.cost)).max();
        assert!(longest.unwrap_or(0) * batch.len() as u64 <= 400);
    }
    assert_exact_cover(&batches, 0..400);
    Ok(())
}

// ============================================================================
// Partitioned frame sampler
// ============================================================================

#[test]
fn test_out_of_range_category_never_batched() -> Result<()> {
    let items = Arc::new(InMemoryItems::from_pairs(vec![(2, 2), (2, 2), (10, 3), (1, 1)]));
    let config = BatchingConfig::builder()
        .max_frames_per_batch(100)
        .shuffle(false)
        .category_range(2, 3)
        .build();
    let sampler = PartitionedFrameBudgetSampler::from_config(items, &config)?;

    assert_eq!(sampler.num_partitions(), 2);
    assert_eq!(sampler.num_excluded(), 1);

    let batches: Vec<Batch> = sampler.iter_current().collect();
    assert_eq!(batches, vec![vec![0, 1], vec![2]]);
    assert!(batches.iter().flatten().all(|&i| i != 3));
    Ok(())
}

#[test]
fn test_reject_policy_fails_construction() {
    let items = Arc::new(InMemoryItems::from_pairs(vec![(2, 2), (1, 9)]));
    let config = BatchingConfig::builder()
        .max_frames_per_batch(100)
        .out_of_range(OutOfRangePolicy::Reject)
        .build();

    let err = PartitionedFrameBudgetSampler::from_config(items, &config).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<BatchingError>(),
        Some(BatchingError::CategoryOutOfRange {
            index: 1,
            category: Some(9),
            ..
        })
    ));
}

#[test]
fn test_batches_are_single_category_in_ascending_order() -> Result<()> {
    let items = random_items(600, 50, 8, TEST_SEED);
    let config = BatchingConfig::builder()
        .max_frames_per_batch(200)
        .seed(TEST_SEED)
        .build();
    let sampler = PartitionedFrameBudgetSampler::from_config(Arc::clone(&items), &config)?;

    for epoch in 0..3 {
        let batches: Vec<Batch> = sampler.iter(epoch).collect();
        let categories: Vec<i64> = batches
            .iter()
            .map(|batch| {
                let first = items.category(batch[0]);
                assert!(batch.iter().all(|&i| items.category(i) == first));
                first.unwrap_or(i64::MIN)
            })
            .collect();

        assert!(categories.windows(2).all(|w| w[0] <= w[1]));
        assert!(categories.iter().all(|c| (2..=6).contains(c)));
        assert!(batches.iter().all(|b| batch_cost(&items, b) <= 200));

        let in_range = (0..600).filter(|&i| items.category(i).is_some_and(|c| (2..=6).contains(&c)));
        assert_exact_cover(&batches, in_range);
    }
    Ok(())
}
