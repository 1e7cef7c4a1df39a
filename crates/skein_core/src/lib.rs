//! # SKEIN Core String Pool
//!
//! Paged, handle-indexed string storage for the editor:
//! - 2MB pages, each with its own free-list allocator
//! - 32-bit handles packing a page index and an in-page offset
//! - A length/hash footer behind every string, so length and equality
//!   checks never scan content
//!
//! ## Architecture Rules
//!
//! 1. **Strings are immutable** - concatenation always builds a new record
//! 2. **Pages never move** - only new pages are appended
//! 3. **One coarse lock** - allocate and release are serialized, reads are not
//!
//! ## Example
//!
//! ```rust
//! use skein_core::StringPool;
//!
//! let pool = StringPool::new()?;
//! let greeting = pool.create_from_bytes(b"hello");
//! assert_eq!(pool.length_of(greeting), 5);
//! # Ok::<(), skein_core::PoolError>(())
//! ```

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod config;
pub mod error;
pub mod footer;
pub mod handle;
pub mod hash;
pub mod log;
pub mod memory;
pub mod page;
pub mod pool;
pub mod string;

mod lock;

pub use config::PoolConfig;
pub use error::{PoolError, PoolResult};
pub use footer::{Footer, FOOTER_SIZE};
pub use handle::{Handle, MAX_PAGES};
pub use hash::{hash_bytes, DEFAULT_HASH_SEED};
pub use memory::{MemorySource, PageMemory, SystemMemory};
pub use page::{PageAllocator, PAGE_SIZE};
pub use pool::{PoolStats, StringPool};
pub use string::{INVALID_HASH, MAX_STRING_LEN};
