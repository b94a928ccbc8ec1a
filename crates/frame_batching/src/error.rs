//! src/error.rs
//!
//! Error kinds that callers need to tell apart.
//!
//! Every fallible API in this crate returns `anyhow::Result`. When the failure is
//! one of the kinds below, the `anyhow::Error` wraps a `BatchingError` and can be
//! inspected with `err.downcast_ref::<BatchingError>()`.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BatchingError {
    /// Invalid construction parameters (budget, shard count, rank, ranges, ...).
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// An item's category is outside the configured range under `OutOfRangePolicy::Reject`.
    #[error("Item {index} has category {category:?} outside of [{low}, {high}]")]
    CategoryOutOfRange {
        index: usize,
        category: Option<i64>,
        low: i64,
        high: i64,
    },

    /// A wrapped sampler produced a different number of items than it declared.
    /// This means its iteration is not deterministic within an epoch.
    #[error("Consistency violation: {message}")]
    Consistency { message: String },
}

impl BatchingError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn consistency(message: impl Into<String>) -> Self {
        Self::Consistency {
            message: message.into(),
        }
    }

    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config { .. })
    }

    pub fn is_consistency(&self) -> bool {
        matches!(self, Self::Consistency { .. })
    }
}

/// Returns the `BatchingError` carried by an `anyhow::Error`, if any.
pub fn kind_of(err: &anyhow::Error) -> Option<&BatchingError> {
    err.downcast_ref::<BatchingError>()
}
