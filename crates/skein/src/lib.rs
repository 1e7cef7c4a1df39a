//! # SKEIN
//!
//! String pool for the editor, plus the tooling built around it.
//!
//! ## Modules
//!
//! - `soak`: multi-threaded create/concat/destroy load against one pool

pub mod soak;

pub use skein_core as core;

pub use skein_core::{Handle, PoolConfig, PoolError, PoolStats, StringPool};
pub use soak::{run_soak, SoakConfig, SoakReport};
