//! Construction-time configuration errors.
//!
//! These fail fast: a coordinator or cache is never built from an invalid
//! configuration. Runtime outcomes (transport failures, cancellation) are not
//! errors of this kind; they are reported as download events.

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("priority_levels must be at least 1")]
    ZeroPriorityLevels,
    #[error("concurrency_budget must be at least 1")]
    ZeroConcurrencyBudget,
    #[error("cache max_bytes must be greater than 0")]
    ZeroCacheSize,
    #[error("cleaning_ratio must be in (0, 1], got {0}")]
    InvalidCleaningRatio(f64),
    #[error("no Tokio runtime available to run fetch tasks")]
    NoRuntime,
}
