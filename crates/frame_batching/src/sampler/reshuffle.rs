use anyhow::Result;
use rand::seq::SliceRandom;
use rand::{rngs::StdRng, Rng, SeedableRng};

use super::{EpochSampler, SnapshotSource};

/// ============================================================================
/// Re-shuffles the output of any [`EpochSampler`] with a fresh random order on
/// every iteration.
///
/// Unlike [`ShardedSampler`](super::ShardedSampler), the order is not
/// reproducible: each call to `iter()` seeds a new `StdRng` from the thread RNG.
/// Use it for single-process training where batch order should vary between
/// runs as well as between epochs.
///
/// The wrapper does not forward epochs. Advance the wrapped sampler with
/// `inner_mut().set_epoch(epoch)`; the snapshot is rebuilt on the next `iter()`.
///
/// # Example
/// ```ignore
/// let mut sampler = ReshuffledSampler::new(FrameBudgetSampler::new(items, 4096, true, 0)?);
/// for epoch in 0..num_epochs {
///     sampler.inner_mut().set_epoch(epoch);
///     for batch in sampler.iter()? {
///         // ...
///     }
/// }
/// ```
#[derive(Debug)]
pub struct ReshuffledSampler<S: EpochSampler> {
    source: SnapshotSource<S>,
}

impl<S> ReshuffledSampler<S>
where
    S: EpochSampler,
    S::Item: Clone,
{
    pub fn new(sampler: S) -> Self {
        Self {
            source: SnapshotSource::new(sampler),
        }
    }

    pub fn len(&self) -> usize {
        self.source.size()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn inner(&self) -> &S {
        self.source.inner()
    }

    pub fn inner_mut(&mut self) -> &mut S {
        self.source.inner_mut()
    }

    pub fn into_inner(self) -> S {
        self.source.into_inner()
    }

    /// Iterates the wrapped sampler's current pass in a freshly drawn random order.
    pub fn iter(&self) -> Result<Box<dyn Iterator<Item = S::Item> + Send + '_>> {
        let snapshot = self.source.snapshot()?;

        let seed: u64 = rand::rng().random();
        tracing::trace!("Reshuffling {} items with seed {}", snapshot.len(), seed);

        let mut positions: Vec<usize> = (0..snapshot.len()).collect();
        positions.shuffle(&mut StdRng::seed_from_u64(seed));
        Ok(Box::new(
            positions
                .into_iter()
                .map(move |position| snapshot[position].clone()),
        ))
    }
}
