//! # Page Memory
//!
//! The pool asks its [`MemorySource`] for zeroed page-sized blocks when a page
//! is created and hands them back at shutdown. Nothing else allocates.
//!
//! ## Safety Note
//!
//! Page memory is shared between threads through raw pointers. The pool's
//! allocator guarantees that live regions never overlap, which is what makes
//! the region accessors below sound.

#![allow(unsafe_code)]

use std::alloc::{alloc_zeroed, dealloc, Layout};
use std::ptr::NonNull;

/// Alignment of page base addresses.
pub const PAGE_ALIGN: usize = 4096;

/// An owned block of page memory.
///
/// Dropping a `PageMemory` does not free it; it must be returned to the
/// [`MemorySource`] that produced it.
#[derive(Debug)]
pub struct PageMemory {
    ptr: NonNull<u8>,
    len: usize,
}

// SAFETY: PageMemory is a uniquely owned heap block. Concurrent access to its
// bytes goes through the region accessors, whose callers uphold disjointness.
unsafe impl Send for PageMemory {}
// SAFETY: see above.
unsafe impl Sync for PageMemory {}

impl PageMemory {
    /// Wraps a block obtained from an allocator.
    ///
    /// # Safety
    ///
    /// `ptr` must point to `len` initialized bytes, valid until the block is
    /// passed back to the source that produced it.
    #[must_use]
    pub unsafe fn from_raw_parts(ptr: NonNull<u8>, len: usize) -> Self {
        Self { ptr, len }
    }

    /// Base address of the block.
    #[inline]
    #[must_use]
    pub fn as_ptr(&self) -> NonNull<u8> {
        self.ptr
    }

    /// Size of the block in bytes.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Whether the block is empty.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Pointer to `offset` bytes into the block, if in bounds.
    #[inline]
    pub(crate) fn ptr_at(&self, offset: usize) -> Option<NonNull<u8>> {
        if offset > self.len {
            return None;
        }
        // SAFETY: offset is within (or one past) the block.
        Some(unsafe { NonNull::new_unchecked(self.ptr.as_ptr().add(offset)) })
    }

    /// Shared view of `len` bytes at `offset`.
    ///
    /// # Safety
    ///
    /// No `&mut` view of an overlapping region may be alive.
    #[inline]
    pub(crate) unsafe fn region(&self, offset: usize, len: usize) -> Option<&[u8]> {
        let end = offset.checked_add(len)?;
        if end > self.len {
            return None;
        }
        Some(std::slice::from_raw_parts(self.ptr.as_ptr().add(offset), len))
    }

    /// Exclusive view of `len` bytes at `offset`.
    ///
    /// # Safety
    ///
    /// No other view of an overlapping region may be alive.
    #[inline]
    #[allow(clippy::mut_from_ref)]
    pub(crate) unsafe fn region_mut(&self, offset: usize, len: usize) -> Option<&mut [u8]> {
        let end = offset.checked_add(len)?;
        if end > self.len {
            return None;
        }
        Some(std::slice::from_raw_parts_mut(self.ptr.as_ptr().add(offset), len))
    }
}

/// The hosting environment's memory primitives.
///
/// Called exactly at page creation and at pool teardown.
pub trait MemorySource: Send + Sync {
    /// Reserves and commits `len` zero-initialized bytes.
    ///
    /// Returns `None` when the environment cannot supply the block.
    fn reserve_zeroed(&self, len: usize) -> Option<PageMemory>;

    /// Returns a block previously produced by [`Self::reserve_zeroed`].
    fn release(&self, memory: PageMemory);
}

/// [`MemorySource`] backed by the global allocator.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemMemory;

impl MemorySource for SystemMemory {
    fn reserve_zeroed(&self, len: usize) -> Option<PageMemory> {
        if len == 0 {
            return None;
        }
        let layout = Layout::from_size_align(len, PAGE_ALIGN).ok()?;
        // SAFETY: layout has non-zero size.
        let ptr = NonNull::new(unsafe { alloc_zeroed(layout) })?;
        // SAFETY: alloc_zeroed returned `len` zeroed bytes.
        Some(unsafe { PageMemory::from_raw_parts(ptr, len) })
    }

    fn release(&self, memory: PageMemory) {
        // SAFETY: the same layout was accepted by reserve_zeroed.
        unsafe {
            let layout = Layout::from_size_align_unchecked(memory.len, PAGE_ALIGN);
            dealloc(memory.ptr.as_ptr(), layout);
        }
    }
}
