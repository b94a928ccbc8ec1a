use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::{Path, PathBuf},
};

use crate::items::{InMemoryItems, ItemInfo};

/// A line-by-line reader for JSONL item manifests.
///
/// Each non-blank line describes one item. Only its cost and optional category
/// are read; any other fields (paths, transcripts, ...) are ignored:
/// ```text
/// {"cost": 812, "category": 3, "path": "clips/0001.wav"}
/// {"frames": 95, "language": 2}
/// {"num_frames": 1204}
/// ```
///
/// The line order defines the item indices that the samplers emit.
///
/// # Example
/// ```ignore
/// let items = Arc::new(ManifestSource::new("train.jsonl").load_items()?);
/// let sampler = FrameBudgetSampler::new(items, 20_000, true, 0)?;
/// ```
#[derive(Debug, Clone)]
pub struct ManifestSource {
    path: PathBuf,
}

impl ManifestSource {
    /// Creates a new reader for a manifest at the given path.
    ///
    /// # Arguments
    /// - `path`: Accepts `String`, `&str`, or `PathBuf`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Streams lines parsed as `T`.
    ///
    /// # Errors
    /// - Fails if the file cannot be opened.
    /// - Yields an error for any line that is not valid JSON for `T`, with its
    ///   1-based line number (e.g., "Invalid manifest entry at line 3").
    pub fn stream<T: DeserializeOwned>(
        &self,
    ) -> Result<Box<dyn Iterator<Item = Result<T>> + Send>> {
        let file = File::open(&self.path)
            .with_context(|| format!("Failed to open {}", self.path.display()))?;
        let reader = BufReader::new(file);

        let iter = reader.lines().enumerate().filter_map(|(line_num, line)| {
            let line = match line {
                Ok(l) if l.trim().is_empty() => return None,
                Ok(l) => l,
                Err(e) => return Some(Err(e.into())),
            };
            Some(
                serde_json::from_str::<T>(&line)
                    .with_context(|| format!("Invalid manifest entry at line {}", line_num + 1)),
            )
        });
        Ok(Box::new(iter))
    }

    /// Reads the whole manifest into an [`InMemoryItems`] collection.
    pub fn load_items(&self) -> Result<InMemoryItems> {
        let items = self
            .stream::<ItemInfo>()?
            .collect::<Result<Vec<_>>>()
            .with_context(|| format!("Failed to load items from {}", self.path.display()))?;

        tracing::info!(
            "Loaded {} items from {}",
            items.len(),
            self.path.display()
        );
        Ok(InMemoryItems::new(items))
    }
}
