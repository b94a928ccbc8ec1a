use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Read-only access to the per-item cost (e.g. frame count) of a collection.
///
/// Samplers only ever need the number of items and each item's cost, so this is
/// all they ask for. Indices passed to `cost` are always in `0..len()`.
///
/// All implementations must be `Send + Sync` so a collection can be shared by
/// every sampler and every shard in the process.
pub trait CostLookup: Send + Sync {
    /// Returns total number of items.
    fn len(&self) -> usize;

    /// Returns the cost of the item at `index`.
    fn cost(&self, index: usize) -> u64;

    /// Checks if the collection is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A [`CostLookup`] that also exposes a categorical key (e.g. language id) per item.
///
/// `None` means the item carries no category. Partitioned samplers treat it the
/// same as a category outside their configured range.
pub trait CategoryLookup: CostLookup {
    fn category(&self, index: usize) -> Option<i64>;
}

/// Metadata of a single item as seen by the samplers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemInfo {
    /// Cost charged against the batch budget.
    #[serde(alias = "frames", alias = "num_frames")]
    pub cost: u64,
    #[serde(default, alias = "language")]
    pub category: Option<i64>,
}

impl ItemInfo {
    pub fn new(cost: u64) -> Self {
        Self {
            cost,
            category: None,
        }
    }

    pub fn with_category(mut self, category: i64) -> Self {
        self.category = Some(category);
        self
    }
}

/// An item collection stored contiguously behind an `Arc<[ItemInfo]>`.
///
/// Cloning only bumps the reference count, so the same items can back several
/// samplers without copying.
#[derive(Debug, Clone)]
pub struct InMemoryItems {
    items: Arc<[ItemInfo]>,
}

impl InMemoryItems {
    pub fn new(items: Vec<ItemInfo>) -> Self {
        Self {
            items: items.into(),
        }
    }

    /// Builds a collection without categories from a list of costs.
    pub fn from_costs(costs: impl IntoIterator<Item = u64>) -> Self {
        Self::new(costs.into_iter().map(ItemInfo::new).collect())
    }

    /// Builds a collection from `(cost, category)` pairs.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (u64, i64)>) -> Self {
        Self::new(
            pairs
                .into_iter()
                .map(|(cost, category)| ItemInfo::new(cost).with_category(category))
                .collect(),
        )
    }

    pub fn get(&self, index: usize) -> Option<&ItemInfo> {
        self.items.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ItemInfo> {
        self.items.iter()
    }

    /// Largest cost in the collection, `None` if empty.
    pub fn max_cost(&self) -> Option<u64> {
        self.items.iter().map(|item| item.cost).max()
    }

    pub fn total_cost(&self) -> u64 {
        self.items.iter().map(|item| item.cost).sum()
    }
}

impl CostLookup for InMemoryItems {
    fn len(&self) -> usize {
        self.items.len()
    }

    fn cost(&self, index: usize) -> u64 {
        self.items[index].cost
    }
}

impl CategoryLookup for InMemoryItems {
    fn category(&self, index: usize) -> Option<i64> {
        self.items[index].category
    }
}

impl FromIterator<ItemInfo> for InMemoryItems {
    fn from_iter<I: IntoIterator<Item = ItemInfo>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
