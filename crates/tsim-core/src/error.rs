//! Core error type.
//!
//! Sub-crates define their own error enums and wrap `CoreError` as one
//! variant via `#[from]`.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CoreError {
    #[error("invalid clock configuration: {0}")]
    InvalidClock(String),

    #[error("time value {0} is not finite")]
    NonFiniteTime(f64),
}

/// Shorthand result type for `tsim-core`.
pub type CoreResult<T> = Result<T, CoreError>;
