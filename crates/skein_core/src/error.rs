//! # Pool Error Types
//!
//! Errors surfaced by fallible pool construction and allocation.
//! Handle-returning operations fold these into [`crate::Handle::INVALID`].

use thiserror::Error;

/// Errors that can occur in the string pool.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    /// Configuration values are out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration file could not be read or parsed.
    #[error("failed to load configuration: {0}")]
    ConfigParse(String),

    /// Every page slot allowed by the configuration is in use and full.
    #[error("page budget exhausted: all {max_pages} pages are full")]
    PageBudgetExhausted {
        /// Configured page budget.
        max_pages: usize,
    },

    /// The memory source could not supply a new page.
    #[error("out of memory: could not reserve {bytes} bytes for a page")]
    OutOfMemory {
        /// Size of the failed reservation.
        bytes: usize,
    },

    /// A single allocation larger than a page was requested.
    #[error("allocation of {requested} bytes exceeds page capacity of {max} bytes")]
    CapacityExceeded {
        /// Requested size.
        requested: usize,
        /// Largest size a page can hold.
        max: usize,
    },
}

/// Result type for pool operations.
pub type PoolResult<T> = Result<T, PoolError>;
