//! # Pool Configuration
//!
//! Loaded once at startup, typically from a TOML file:
//!
//! ```toml
//! max_pages = 64
//! initial_pages = 2
//! hash_seed = 0x9747B28C
//! ```

use std::path::Path;

use serde::Deserialize;

use crate::error::{PoolError, PoolResult};
use crate::handle::MAX_PAGES;
use crate::hash::DEFAULT_HASH_SEED;

/// Tunables for a [`crate::StringPool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PoolConfig {
    /// Page budget. Allocation fails once this many pages are full.
    pub max_pages: usize,
    /// Pages created up front.
    pub initial_pages: usize,
    /// Seed for content hashes.
    pub hash_seed: u32,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_pages: MAX_PAGES,
            initial_pages: 1,
            hash_seed: DEFAULT_HASH_SEED,
        }
    }
}

impl PoolConfig {
    /// Checks that every value is in range.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::InvalidConfig`] naming the first bad field.
    pub fn validate(&self) -> PoolResult<()> {
        if self.max_pages == 0 || self.max_pages > MAX_PAGES {
            return Err(PoolError::InvalidConfig(format!(
                "max_pages must be in 1..={MAX_PAGES}, got {}",
                self.max_pages
            )));
        }
        if self.initial_pages == 0 || self.initial_pages > self.max_pages {
            return Err(PoolError::InvalidConfig(format!(
                "initial_pages must be in 1..={}, got {}",
                self.max_pages, self.initial_pages
            )));
        }
        Ok(())
    }

    /// Parses and validates a TOML document.
    ///
    /// Missing keys take their default values.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::ConfigParse`] for malformed TOML or unknown keys,
    /// and [`PoolError::InvalidConfig`] for out-of-range values.
    pub fn from_toml_str(source: &str) -> PoolResult<Self> {
        let config: Self =
            toml::from_str(source).map_err(|e| PoolError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// Same as [`Self::from_toml_str`], plus [`PoolError::ConfigParse`] when
    /// the file cannot be read.
    pub fn load(path: impl AsRef<Path>) -> PoolResult<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .map_err(|e| PoolError::ConfigParse(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&source)
    }
}
