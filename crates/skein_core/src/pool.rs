//! # String Pool
//!
//! Owner of every page and the only place string memory is allocated from.
//!
//! ## Architecture
//!
//! ```text
//!   ┌───────────────────────── StringPool ─────────────────────────┐
//!   │  PoolLock ─► [PageAllocator 0, PageAllocator 1, ...]         │
//!   │                                                              │
//!   │  page slots [OnceLock<PageMemory>; max_pages]  (append-only) │
//!   └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Allocator state lives behind one coarse lock. Page memory lives in
//! write-once slots outside the lock, so resolving a handle never waits.
//! Pages are never moved or freed before the pool is dropped, which keeps
//! every resolved address valid for the pool's lifetime.
//!
//! ## Thread Safety
//!
//! - `allocate` / `release` / teardown: serialized by the lock
//! - `resolve` and footer reads: lock-free
//! - Releasing a handle while another thread still reads it is a
//!   use-after-free; no reference counting guards against it

#![allow(unsafe_code)]

use std::ptr::NonNull;
use std::sync::OnceLock;

use crate::config::PoolConfig;
use crate::error::{PoolError, PoolResult};
use crate::handle::Handle;
use crate::lock::PoolLock;
use crate::memory::{MemorySource, PageMemory, SystemMemory};
use crate::page::{PageAllocator, PAGE_SIZE};

/// Allocator state guarded by the pool lock. Index is the page index.
#[derive(Debug, Default)]
struct PoolState {
    allocators: Vec<PageAllocator>,
}

/// Snapshot of pool occupancy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Pages created so far.
    pub pages: usize,
    /// Live blocks across all pages.
    pub live_allocations: usize,
    /// Bytes held by live blocks.
    pub bytes_in_use: usize,
    /// Bytes available across created pages.
    pub bytes_free: usize,
}

/// Paged string storage.
///
/// Construct one per application session and pass it by reference to every
/// consumer. Share across threads with `Arc<StringPool>`.
///
/// # Handles and pools
///
/// A handle carries no pool identity. Reads trust the footer it points at, so
/// a handle must only be used with the pool that issued it. Handed to a
/// different pool it resolves to that pool's page at the same index, which
/// may hold a record another thread is still filling. Applications that run
/// more than one pool must keep their handles apart.
///
/// # Example
///
/// ```rust
/// use skein_core::StringPool;
///
/// let pool = StringPool::new()?;
/// let hello = pool.create_from_bytes(b"hello");
/// let world = pool.create_from_bytes(b" world");
/// let both = pool.concat(hello, world);
/// assert_eq!(pool.as_str(both), Some("hello world"));
/// # Ok::<(), skein_core::PoolError>(())
/// ```
pub struct StringPool {
    state: PoolLock<PoolState>,
    pages: Box<[OnceLock<PageMemory>]>,
    source: Box<dyn MemorySource>,
    config: PoolConfig,
}

impl std::fmt::Debug for StringPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StringPool")
            .field("config", &self.config)
            .field("pages", &self.pages.iter().filter(|p| p.get().is_some()).count())
            .finish_non_exhaustive()
    }
}

impl StringPool {
    /// Creates a pool with the default configuration.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::OutOfMemory`] if the first page cannot be reserved.
    pub fn new() -> PoolResult<Self> {
        Self::with_config(PoolConfig::default())
    }

    /// Creates a pool backed by the global allocator.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::InvalidConfig`] for a bad configuration and
    /// [`PoolError::OutOfMemory`] if the initial pages cannot be reserved.
    pub fn with_config(config: PoolConfig) -> PoolResult<Self> {
        Self::with_source(config, Box::new(SystemMemory))
    }

    /// Creates a pool that takes its pages from `source`.
    ///
    /// # Errors
    ///
    /// Same as [`Self::with_config`].
    pub fn with_source(config: PoolConfig, source: Box<dyn MemorySource>) -> PoolResult<Self> {
        config.validate()?;

        let pages = (0..config.max_pages).map(|_| OnceLock::new()).collect();
        let pool = Self {
            state: PoolLock::new(PoolState::default()),
            pages,
            source,
            config,
        };

        {
            let mut state = pool.state.lock();
            for _ in 0..config.initial_pages {
                pool.create_page(&mut *state)?;
            }
        }

        tracing::debug!(
            initial_pages = config.initial_pages,
            max_pages = config.max_pages,
            "string pool initialized"
        );
        Ok(pool)
    }

    /// The configuration this pool was built with.
    #[inline]
    #[must_use]
    pub const fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Appends a page. Caller holds the lock.
    fn create_page(&self, state: &mut PoolState) -> PoolResult<usize> {
        let index = state.allocators.len();
        if index >= self.pages.len() {
            tracing::warn!(max_pages = self.pages.len(), "string pool page budget exhausted");
            return Err(PoolError::PageBudgetExhausted {
                max_pages: self.pages.len(),
            });
        }

        let Some(memory) = self.source.reserve_zeroed(PAGE_SIZE) else {
            tracing::error!(page = index, bytes = PAGE_SIZE, "failed to reserve string page");
            return Err(PoolError::OutOfMemory { bytes: PAGE_SIZE });
        };

        // Slots are filled in order under the lock, so this one is empty.
        if let Err(memory) = self.pages[index].set(memory) {
            tracing::error!(page = index, "page slot already filled");
            self.source.release(memory);
            return Err(PoolError::OutOfMemory { bytes: PAGE_SIZE });
        }
        state.allocators.push(PageAllocator::new(PAGE_SIZE));

        tracing::debug!(page = index, "string page created");
        Ok(index)
    }

    /// Allocates a raw block of `size` bytes.
    ///
    /// Pages are tried in creation order; a new page is appended when none
    /// has room. The returned handle's offset is the start of the block.
    ///
    /// # Errors
    ///
    /// - [`PoolError::CapacityExceeded`] if `size` is larger than a page
    /// - [`PoolError::PageBudgetExhausted`] if every allowed page is full
    /// - [`PoolError::OutOfMemory`] if a new page cannot be reserved
    pub fn try_allocate(&self, size: usize) -> PoolResult<Handle> {
        if size > PAGE_SIZE {
            return Err(PoolError::CapacityExceeded {
                requested: size,
                max: PAGE_SIZE,
            });
        }

        let mut state = self.state.lock();

        for (index, allocator) in state.allocators.iter_mut().enumerate() {
            if let Some(offset) = allocator.allocate(size) {
                return Ok(Handle::new(page_index(index), offset));
            }
        }

        let index = self.create_page(&mut *state)?;
        state.allocators[index]
            .allocate(size)
            .map(|offset| Handle::new(page_index(index), offset))
            .ok_or(PoolError::CapacityExceeded {
                requested: size,
                max: PAGE_SIZE,
            })
    }

    /// Allocates a raw block of `size` bytes.
    ///
    /// Returns [`Handle::INVALID`] when the page budget or the memory source
    /// is exhausted.
    ///
    /// # Panics
    ///
    /// Panics if `size` exceeds [`PAGE_SIZE`]. Oversized requests are a
    /// contract violation, not a recoverable condition.
    pub fn allocate(&self, size: usize) -> Handle {
        assert!(
            size <= PAGE_SIZE,
            "allocation of {size} bytes exceeds page capacity of {PAGE_SIZE} bytes"
        );
        match self.try_allocate(size) {
            Ok(handle) => handle,
            Err(error) => {
                tracing::warn!(size, %error, "string allocation failed");
                Handle::INVALID
            }
        }
    }

    /// Returns a raw block to its page. Invalid handles are ignored.
    ///
    /// # Returns
    ///
    /// Whether a live block started at the handle's offset.
    ///
    /// # Safety
    ///
    /// The block must not be read or written after this call, and no slice
    /// obtained from it may still be alive. The memory is handed to the next
    /// allocation that fits.
    pub unsafe fn release(&self, handle: Handle) -> bool {
        if !handle.is_valid() {
            return false;
        }
        let mut state = self.state.lock();
        state
            .allocators
            .get_mut(usize::from(handle.page_index()))
            .and_then(|allocator| allocator.release(handle.offset()))
            .is_some()
    }

    /// Resolves a handle to the address its offset points at.
    ///
    /// Returns `None` for the invalid sentinel or a page that does not exist.
    #[must_use]
    pub fn resolve(&self, handle: Handle) -> Option<NonNull<u8>> {
        if !handle.is_valid() {
            return None;
        }
        self.page(handle.page_index())?
            .ptr_at(handle.offset() as usize)
    }

    /// Page memory for `index`, if that page exists.
    #[inline]
    pub(crate) fn page(&self, index: u8) -> Option<&PageMemory> {
        self.pages.get(usize::from(index))?.get()
    }

    /// Number of pages created so far.
    #[must_use]
    pub fn page_count(&self) -> usize {
        self.state.lock().allocators.len()
    }

    /// Current occupancy across all pages.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        let state = self.state.lock();
        state
            .allocators
            .iter()
            .fold(PoolStats::default(), |mut stats, allocator| {
                stats.pages += 1;
                stats.live_allocations += allocator.allocated_count();
                stats.bytes_in_use += allocator.bytes_in_use();
                stats.bytes_free += allocator.free_bytes();
                stats
            })
    }

    /// Tears the pool down, returning every page to the memory source.
    ///
    /// Equivalent to dropping the pool; spelled out for call sites that want
    /// the shutdown to be visible.
    pub fn shutdown(self) {
        let stats = self.stats();
        tracing::info!(
            pages = stats.pages,
            live_allocations = stats.live_allocations,
            bytes_in_use = stats.bytes_in_use,
            "string pool shutting down"
        );
        drop(self);
    }
}

impl Drop for StringPool {
    fn drop(&mut self) {
        let released = self.state.get_mut().allocators.drain(..).count();
        for slot in self.pages.iter_mut() {
            if let Some(memory) = slot.take() {
                self.source.release(memory);
            }
        }
        tracing::debug!(pages = released, "string pool pages released");
    }
}

#[inline]
fn page_index(index: usize) -> u8 {
    // create_page caps the page count at the slot count, which is at most 256.
    u8::try_from(index).unwrap_or(u8::MAX)
}
