use anyhow::{anyhow, ensure, Result};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use super::EpochSampler;
use crate::error::BatchingError;

/// One materialized pass of a sampler, keyed by the epoch that produced it.
struct Snapshot<T> {
    epoch: usize,
    items: Arc<[T]>,
}

/// ============================================================================
/// A fixed-size, indexable view over one full pass of an [`EpochSampler`].
///
/// Wrappers that need random access into a sampler's output (to split it
/// across shards or to re-shuffle it) read it through this type.
///
/// # Caching
/// - Nothing is materialized at construction.
/// - The first `snapshot()` / `element_at()` collects `sampler.iter_current()`
///   into an `Arc<[T]>` and caches it with the sampler's current epoch as key.
/// - When the sampler's epoch differs from the key, the cache is discarded and
///   rebuilt from scratch.
///
/// # Size
/// `size()` returns the sampler's declared `len()` without materializing. If a
/// pass does not produce exactly `len()` items, the sampler is not
/// deterministic within an epoch. Materialization then fails with
/// [`BatchingError::Consistency`] instead of truncating or padding.
///
/// # Thread safety
/// The cache sits behind a `Mutex`, so a `SnapshotSource` is `Send + Sync`
/// whenever the sampler is.
pub struct SnapshotSource<S: EpochSampler> {
    sampler: S,
    cache: Mutex<Option<Snapshot<S::Item>>>,
}

impl<S> SnapshotSource<S>
where
    S: EpochSampler,
    S::Item: Clone,
{
    pub fn new(sampler: S) -> Self {
        Self {
            sampler,
            cache: Mutex::new(None),
        }
    }

    /// Declared length of the wrapped sampler.
    pub fn size(&self) -> usize {
        self.sampler.len()
    }

    /// Returns the item at `index` of the current epoch's pass.
    pub fn element_at(&self, index: usize) -> Result<S::Item> {
        let snapshot = self.snapshot()?;
        snapshot.get(index).cloned().ok_or_else(|| {
            anyhow!(
                "Index {} out of bounds for snapshot of size {}",
                index,
                snapshot.len()
            )
        })
    }

    /// Returns the full pass for the sampler's current epoch, building it if needed.
    pub fn snapshot(&self) -> Result<Arc<[S::Item]>> {
        let epoch = self.sampler.epoch();
        let mut cache = self.lock_cache()?;

        if let Some(snapshot) = cache.as_ref() {
            if snapshot.epoch == epoch {
                return Ok(Arc::clone(&snapshot.items));
            }
        }

        let items: Arc<[S::Item]> = self.sampler.iter(epoch).collect();
        ensure!(
            items.len() == self.sampler.len(),
            BatchingError::consistency(format!(
                "Sampler declared {} items but yielded {} at epoch {}",
                self.sampler.len(),
                items.len(),
                epoch
            ))
        );

        tracing::debug!("Materialized {} items for epoch {}", items.len(), epoch);
        *cache = Some(Snapshot {
            epoch,
            items: Arc::clone(&items),
        });
        Ok(items)
    }

    /// Whether a snapshot for the sampler's current epoch is cached.
    pub fn is_materialized(&self) -> bool {
        let epoch = self.sampler.epoch();
        self.lock_cache()
            .map(|cache| cache.as_ref().is_some_and(|snapshot| snapshot.epoch == epoch))
            .unwrap_or(false)
    }

    pub fn inner(&self) -> &S {
        &self.sampler
    }

    /// Mutable access to the wrapped sampler, e.g. to call `set_epoch`.
    /// A changed epoch invalidates the cache on the next read.
    pub fn inner_mut(&mut self) -> &mut S {
        &mut self.sampler
    }

    pub fn into_inner(self) -> S {
        self.sampler
    }

    fn lock_cache(&self) -> Result<MutexGuard<'_, Option<Snapshot<S::Item>>>> {
        self.cache
            .lock()
            .map_err(|_| BatchingError::consistency("Snapshot cache lock poisoned").into())
    }
}

impl<S: EpochSampler + fmt::Debug> fmt::Debug for SnapshotSource<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SnapshotSource")
            .field("sampler", &self.sampler)
            .finish_non_exhaustive()
    }
}
