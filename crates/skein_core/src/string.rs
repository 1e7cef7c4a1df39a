//! # String Operations
//!
//! Construction, transformation and comparison of string records.
//!
//! A record is `[content][footer]` inside one block. Handles returned from
//! here point at the footer, so the content starts `len` bytes before the
//! handle's offset.
//!
//! Records are immutable once created: concatenation and prepending always
//! allocate a new record and leave the operands alone. The one exception is
//! [`StringPool::create_with_capacity`], whose bytes the caller fills in and
//! then rehashes.

#![allow(unsafe_code)]

use std::ptr::NonNull;

use crate::footer::{Footer, FOOTER_SIZE};
use crate::handle::Handle;
use crate::hash::hash_bytes;
use crate::page::PAGE_SIZE;
use crate::pool::StringPool;

/// Longest string a single record can hold.
pub const MAX_STRING_LEN: usize = PAGE_SIZE - FOOTER_SIZE;

/// Hash reported for the invalid handle.
pub const INVALID_HASH: u32 = u32::MAX;

impl StringPool {
    // =========================================================================
    // FOOTER ACCESS
    // =========================================================================

    /// Reads the footer a handle points at.
    fn footer(&self, handle: Handle) -> Option<Footer> {
        if !handle.is_valid() {
            return None;
        }
        let page = self.page(handle.page_index())?;
        // SAFETY: footers are only written while their record is unpublished
        // or through `rehash`, whose caller guarantees exclusive use.
        let bytes = unsafe { page.region(handle.offset() as usize, FOOTER_SIZE) }?;
        Some(Footer::read(bytes))
    }

    /// Overwrites the footer a handle points at.
    ///
    /// # Safety
    ///
    /// The caller must have exclusive use of the record.
    unsafe fn write_footer(&self, handle: Handle, footer: Footer) {
        let Some(page) = self.page(handle.page_index()) else {
            return;
        };
        if let Some(bytes) = page.region_mut(handle.offset() as usize, FOOTER_SIZE) {
            footer.write(bytes);
        }
    }

    /// Page and start offset of a record's content.
    fn content_range(&self, handle: Handle) -> Option<(u8, usize, usize)> {
        let footer = self.footer(handle)?;
        let len = footer.len();
        let start = (handle.offset() as usize).checked_sub(len)?;
        Some((handle.page_index(), start, len))
    }

    // =========================================================================
    // CONSTRUCTION
    // =========================================================================

    /// Creates a record holding a copy of `bytes`.
    ///
    /// Returns [`Handle::INVALID`] if the pool cannot supply memory.
    ///
    /// # Panics
    ///
    /// Panics if `bytes` is longer than [`MAX_STRING_LEN`].
    pub fn create_from_bytes(&self, bytes: &[u8]) -> Handle {
        self.create_with(bytes.len(), |buf| buf.copy_from_slice(bytes))
    }

    /// Creates a record of `capacity` bytes whose content is left as found.
    ///
    /// The footer records the length but the stored hash is zero, not the
    /// hash of the content. Fill the bytes through [`Self::bytes_mut`] and
    /// call [`Self::rehash`] before comparing or printing the string.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is larger than [`MAX_STRING_LEN`].
    pub fn create_with_capacity(&self, capacity: usize) -> Handle {
        assert!(
            capacity <= MAX_STRING_LEN,
            "string of {capacity} bytes exceeds the {MAX_STRING_LEN} byte limit"
        );

        let block = self.allocate(capacity + FOOTER_SIZE);
        if !block.is_valid() {
            return Handle::INVALID;
        }

        // Block starts are below PAGE_SIZE and capacity fits in a page.
        #[allow(clippy::cast_possible_truncation)]
        let handle = block.with_offset(block.offset() + capacity as u32);
        // SAFETY: the block was just allocated and nobody else has its handle.
        unsafe { self.write_footer(handle, Footer::new(capacity, 0)) };
        handle
    }

    /// Creates a record of `capacity` bytes, filled by `fill`, then hashed.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is larger than [`MAX_STRING_LEN`].
    pub fn create_with<F>(&self, capacity: usize, fill: F) -> Handle
    where
        F: FnOnce(&mut [u8]),
    {
        let handle = self.create_with_capacity(capacity);
        if !handle.is_valid() {
            return handle;
        }
        // SAFETY: the handle has not been returned to anyone yet.
        unsafe {
            if let Some(buf) = self.bytes_mut(handle) {
                fill(buf);
            }
            self.rehash(handle);
        }
        handle
    }

    /// Destroys a record and returns its block to the pool.
    ///
    /// Destroying [`Handle::INVALID`] is a no-op.
    ///
    /// # Safety
    ///
    /// No slice borrowed from this record may be alive, and the handle (and
    /// every copy of it) must not be used again. Nothing detects a stale
    /// handle; it reads whatever the next allocation puts there.
    pub unsafe fn destroy(&self, handle: Handle) {
        let Some((page, start, _)) = self.content_range(handle) else {
            return;
        };
        #[allow(clippy::cast_possible_truncation)]
        let block = Handle::new(page, start as u32);
        let released = self.release(block);
        debug_assert!(released, "destroyed a record that was not live");
    }

    // =========================================================================
    // ACCESS
    // =========================================================================

    /// Content length in bytes, or 0 for the invalid handle.
    #[must_use]
    pub fn length_of(&self, handle: Handle) -> usize {
        self.footer(handle).map_or(0, |footer| footer.len())
    }

    /// Address of the first content byte, or `None` for the invalid handle.
    ///
    /// This is not the address the handle's offset points at; that is the
    /// footer.
    #[must_use]
    pub fn raw_pointer(&self, handle: Handle) -> Option<NonNull<u8>> {
        let (page, start, _) = self.content_range(handle)?;
        self.page(page)?.ptr_at(start)
    }

    /// The content bytes of a record.
    #[must_use]
    pub fn bytes(&self, handle: Handle) -> Option<&[u8]> {
        let (page, start, len) = self.content_range(handle)?;
        // SAFETY: safe code only holds handles this pool returned, which name
        // published records. Writers to a published record need `unsafe`.
        unsafe { self.page(page)?.region(start, len) }
    }

    /// The content of a record as UTF-8, if it is valid UTF-8.
    #[must_use]
    pub fn as_str(&self, handle: Handle) -> Option<&str> {
        std::str::from_utf8(self.bytes(handle)?).ok()
    }

    /// Mutable access to a record's content.
    ///
    /// Writing through this slice bypasses immutability and leaves the stored
    /// hash stale until [`Self::rehash`] is called.
    ///
    /// # Safety
    ///
    /// The caller must have exclusive use of the record: no other slice of it
    /// may be alive and no other thread may be reading it.
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn bytes_mut(&self, handle: Handle) -> Option<&mut [u8]> {
        let (page, start, len) = self.content_range(handle)?;
        self.page(page)?.region_mut(start, len)
    }

    // =========================================================================
    // HASHING & COMPARISON
    // =========================================================================

    /// Hashes a record's content and stores the result in its footer.
    ///
    /// The pool never rehashes on its own; call this after writing through
    /// [`Self::bytes_mut`].
    ///
    /// # Returns
    ///
    /// The new hash, or [`INVALID_HASH`] for the invalid handle.
    ///
    /// # Safety
    ///
    /// Same as [`Self::bytes_mut`]: the footer is written in place.
    pub unsafe fn rehash(&self, handle: Handle) -> u32 {
        let Some(mut footer) = self.footer(handle) else {
            return INVALID_HASH;
        };
        let hash = self
            .bytes(handle)
            .map_or(INVALID_HASH, |bytes| hash_bytes(bytes, self.config().hash_seed));
        footer.set_hash(hash);
        self.write_footer(handle, footer);
        hash
    }

    /// The stored hash, or [`INVALID_HASH`] for the invalid handle.
    #[must_use]
    pub fn get_hash(&self, handle: Handle) -> u32 {
        self.footer(handle).map_or(INVALID_HASH, |footer| footer.hash())
    }

    /// Compares two records by their stored 32-bit hashes.
    ///
    /// This is not a byte comparison. Two different strings whose hashes
    /// collide compare equal. Use [`Self::content_eq`] when that matters.
    #[must_use]
    pub fn compare(&self, left: Handle, right: Handle) -> bool {
        self.get_hash(left) == self.get_hash(right)
    }

    /// Compares two records byte for byte.
    ///
    /// Invalid handles compare equal only to other invalid handles.
    #[must_use]
    pub fn content_eq(&self, left: Handle, right: Handle) -> bool {
        self.bytes(left) == self.bytes(right)
    }

    // =========================================================================
    // TRANSFORMATION
    // =========================================================================

    /// New record holding `left` followed by `right`.
    ///
    /// An invalid operand counts as empty. The result is always a fresh
    /// handle, even when one side is empty.
    ///
    /// # Panics
    ///
    /// Panics if the combined length exceeds [`MAX_STRING_LEN`].
    pub fn concat(&self, left: Handle, right: Handle) -> Handle {
        let left = self.bytes(left).unwrap_or_default();
        let right = self.bytes(right).unwrap_or_default();
        self.concat_raw(left, right)
    }

    /// New record holding `left` followed by one byte.
    ///
    /// # Panics
    ///
    /// Panics if the combined length exceeds [`MAX_STRING_LEN`].
    pub fn concat_char(&self, left: Handle, ch: u8) -> Handle {
        self.concat_bytes(left, &[ch])
    }

    /// New record holding `left` followed by `bytes`.
    ///
    /// # Panics
    ///
    /// Panics if the combined length exceeds [`MAX_STRING_LEN`].
    pub fn concat_bytes(&self, left: Handle, bytes: &[u8]) -> Handle {
        let left = self.bytes(left).unwrap_or_default();
        self.concat_raw(left, bytes)
    }

    /// New record holding `bytes` followed by `left`.
    ///
    /// # Panics
    ///
    /// Panics if the combined length exceeds [`MAX_STRING_LEN`].
    pub fn prepend(&self, left: Handle, bytes: &[u8]) -> Handle {
        let left = self.bytes(left).unwrap_or_default();
        self.concat_raw(bytes, left)
    }

    /// New record holding `first` followed by `second`, neither of which
    /// needs to live in the pool.
    ///
    /// # Panics
    ///
    /// Panics if the combined length exceeds [`MAX_STRING_LEN`].
    pub fn concat_raw(&self, first: &[u8], second: &[u8]) -> Handle {
        let split = first.len();
        self.create_with(split + second.len(), |buf| {
            buf[..split].copy_from_slice(first);
            buf[split..].copy_from_slice(second);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::DEFAULT_HASH_SEED;

    #[test]
    fn test_create_hello() {
        let pool = StringPool::new().unwrap();
        let handle = pool.create_from_bytes(b"hello");

        assert_eq!(pool.length_of(handle), 5);
        assert_eq!(pool.bytes(handle), Some(&b"hello"[..]));
        assert_eq!(pool.get_hash(handle), hash_bytes(b"hello", DEFAULT_HASH_SEED));
    }

    #[test]
    fn test_handle_points_at_footer() {
        let pool = StringPool::new().unwrap();
        let handle = pool.create_from_bytes(b"abc");

        let footer_ptr = pool.resolve(handle).unwrap().as_ptr() as usize;
        let data_ptr = pool.raw_pointer(handle).unwrap().as_ptr() as usize;
        assert_eq!(footer_ptr - data_ptr, 3);
    }

    #[test]
    fn test_empty_string() {
        let pool = StringPool::new().unwrap();
        let handle = pool.create_from_bytes(b"");

        assert!(handle.is_valid());
        assert_eq!(pool.length_of(handle), 0);
        assert_eq!(pool.bytes(handle), Some(&b""[..]));
    }

    #[test]
    fn test_capacity_constructor_leaves_hash_stale() {
        let pool = StringPool::new().unwrap();
        let handle = pool.create_with_capacity(4);

        assert_eq!(pool.length_of(handle), 4);
        assert_eq!(pool.get_hash(handle), 0);

        unsafe {
            pool.bytes_mut(handle).unwrap().copy_from_slice(b"abcd");
            assert_eq!(pool.get_hash(handle), 0);
            let hash = pool.rehash(handle);
            assert_eq!(hash, hash_bytes(b"abcd", DEFAULT_HASH_SEED));
        }
        assert_eq!(pool.get_hash(handle), hash_bytes(b"abcd", DEFAULT_HASH_SEED));
    }

    #[test]
    fn test_create_with_fills_and_hashes() {
        let pool = StringPool::new().unwrap();
        let handle = pool.create_with(3, |buf| buf.copy_from_slice(b"xyz"));
        let copy = pool.create_from_bytes(b"xyz");

        assert_eq!(pool.as_str(handle), Some("xyz"));
        assert!(pool.compare(handle, copy));
    }

    #[test]
    fn test_destroy_frees_block() {
        let pool = StringPool::new().unwrap();
        let handle = pool.create_from_bytes(b"transient");
        assert_eq!(pool.stats().live_allocations, 1);

        unsafe { pool.destroy(handle) };
        assert_eq!(pool.stats().live_allocations, 0);
        assert_eq!(pool.stats().bytes_in_use, 0);

        unsafe { pool.destroy(Handle::INVALID) };
    }

    #[test]
    fn test_destroyed_block_is_reused() {
        let pool = StringPool::new().unwrap();
        let first = pool.create_from_bytes(b"12345678");
        let start = pool.raw_pointer(first).unwrap();
        unsafe { pool.destroy(first) };

        let second = pool.create_from_bytes(b"abcdefgh");
        assert_eq!(pool.raw_pointer(second), Some(start));
    }

    #[test]
    fn test_concat_variants() {
        let pool = StringPool::new().unwrap();
        let base = pool.create_from_bytes(b"core");

        assert_eq!(pool.as_str(pool.concat_char(base, b'!')), Some("core!"));
        assert_eq!(pool.as_str(pool.concat_bytes(base, b"_dump")), Some("core_dump"));
        assert_eq!(pool.as_str(pool.prepend(base, b"hard")), Some("hardcore"));
        assert_eq!(pool.as_str(pool.concat_raw(b"pa", b"ge")), Some("page"));
        assert_eq!(pool.as_str(base), Some("core"));
    }

    #[test]
    fn test_concat_with_invalid_operand_copies() {
        let pool = StringPool::new().unwrap();
        let base = pool.create_from_bytes(b"solo");

        let copy = pool.concat(base, Handle::INVALID);
        assert_ne!(copy, base);
        assert_eq!(pool.bytes(copy), pool.bytes(base));

        let copy = pool.concat(Handle::INVALID, base);
        assert_ne!(copy, base);
        assert_eq!(pool.as_str(copy), Some("solo"));
    }

    #[test]
    fn test_concat_hash_covers_whole_buffer() {
        let pool = StringPool::new().unwrap();
        let joined = pool.concat_raw(b"foo", b"bar");
        assert_eq!(pool.get_hash(joined), hash_bytes(b"foobar", DEFAULT_HASH_SEED));
    }

    #[test]
    fn test_invalid_handle_queries() {
        let pool = StringPool::new().unwrap();

        assert_eq!(pool.length_of(Handle::INVALID), 0);
        assert_eq!(pool.get_hash(Handle::INVALID), INVALID_HASH);
        assert!(pool.raw_pointer(Handle::INVALID).is_none());
        assert!(pool.bytes(Handle::INVALID).is_none());
        assert_eq!(unsafe { pool.rehash(Handle::INVALID) }, INVALID_HASH);
    }

    #[test]
    fn test_content_eq_is_exact() {
        let pool = StringPool::new().unwrap();
        let a = pool.create_from_bytes(b"same");
        let b = pool.create_from_bytes(b"same");
        let c = pool.create_from_bytes(b"diff");

        assert!(pool.content_eq(a, b));
        assert!(!pool.content_eq(a, c));
        assert!(pool.content_eq(Handle::INVALID, Handle::INVALID));
    }

    #[test]
    #[should_panic(expected = "byte limit")]
    fn test_oversized_string_panics() {
        let pool = StringPool::new().unwrap();
        let _ = pool.create_with_capacity(MAX_STRING_LEN + 1);
    }

    #[test]
    fn test_max_length_string_fits_one_page() {
        let pool = StringPool::new().unwrap();
        let handle = pool.create_with(MAX_STRING_LEN, |buf| buf.fill(b'x'));

        assert!(handle.is_valid());
        assert_eq!(pool.length_of(handle), MAX_STRING_LEN);
        assert_eq!(pool.page_count(), 1);
    }
}
