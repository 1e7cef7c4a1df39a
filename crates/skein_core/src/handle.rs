//! # String Handles
//!
//! A handle is a single `u32` split into two fields:
//! - Lower 24 bits: byte offset of the record's footer inside its page
//! - Upper 8 bits: index of the owning page
//!
//! The offset points at the footer, not at the first content byte, so the
//! length and hash of a string are one read away from the handle.

#![allow(unsafe_code)]

/// Number of bits used for the in-page offset.
pub const OFFSET_BITS: u32 = 24;

/// Mask selecting the offset field.
pub const OFFSET_MASK: u32 = (1 << OFFSET_BITS) - 1;

/// Maximum number of pages addressable by a handle.
pub const MAX_PAGES: usize = 1 << (32 - OFFSET_BITS);

/// Packed reference to a string record.
///
/// Handles are plain values: copy them freely, compare them bitwise.
/// A handle whose offset field is all ones is the invalid sentinel.
///
/// There is no generation counter. Using a handle after the string it names
/// has been destroyed reads whatever now occupies that memory.
///
/// Only a [`StringPool`](crate::StringPool) hands out valid handles. Safe code
/// cannot pack one from raw parts:
///
/// ```compile_fail
/// let forged = skein_core::Handle::new(0, 4);
/// ```
///
/// and rebuilding one from its raw form is `unsafe`:
///
/// ```compile_fail
/// let forged = skein_core::Handle::from_raw(4);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct Handle(u32);

impl Handle {
    /// The "no string" sentinel.
    pub const INVALID: Self = Self(u32::MAX);

    /// Packs a page index and an in-page offset.
    ///
    /// # Arguments
    ///
    /// * `page_index` - Owning page (0 to 255)
    /// * `offset` - Byte offset inside the page (0 to 2^24-2)
    #[inline]
    #[must_use]
    pub(crate) const fn new(page_index: u8, offset: u32) -> Self {
        debug_assert!(offset < OFFSET_MASK, "offset collides with the sentinel");
        Self(((page_index as u32) << OFFSET_BITS) | (offset & OFFSET_MASK))
    }

    /// Rebuilds a handle from its raw 32-bit form.
    ///
    /// # Safety
    ///
    /// `raw` must come from [`Self::to_raw`] on a handle issued by the pool
    /// it will be used with, and that record must still be live. Safe reads
    /// trust the footer a handle points at; a made-up value can point into a
    /// record that is still being written.
    #[inline]
    #[must_use]
    pub const unsafe fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw 32-bit form.
    #[inline]
    #[must_use]
    pub const fn to_raw(self) -> u32 {
        self.0
    }

    /// Returns the in-page byte offset.
    #[inline]
    #[must_use]
    pub const fn offset(self) -> u32 {
        self.0 & OFFSET_MASK
    }

    /// Returns the owning page index.
    #[inline]
    #[must_use]
    pub const fn page_index(self) -> u8 {
        (self.0 >> OFFSET_BITS) as u8
    }

    /// Checks whether this handle can refer to a string.
    #[inline]
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.offset() != OFFSET_MASK
    }

    /// Returns a handle on the same page with a different offset.
    #[inline]
    #[must_use]
    pub(crate) const fn with_offset(self, offset: u32) -> Self {
        Self::new(self.page_index(), offset)
    }
}

impl Default for Handle {
    fn default() -> Self {
        Self::INVALID
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_roundtrip() {
        let handle = Handle::new(200, 0x1F_FFF8);
        assert_eq!(handle.page_index(), 200);
        assert_eq!(handle.offset(), 0x1F_FFF8);
        assert!(handle.is_valid());
    }

    #[test]
    fn test_handle_layout_is_explicit() {
        let handle = Handle::new(0x12, 0x34_5678);
        assert_eq!(handle.to_raw(), 0x1234_5678);
        assert_eq!(unsafe { Handle::from_raw(0x1234_5678) }, handle);
    }

    #[test]
    fn test_invalid_sentinel() {
        assert!(!Handle::INVALID.is_valid());
        assert!(!Handle::default().is_valid());
        // Any page index with an all-ones offset is the sentinel.
        assert!(!unsafe { Handle::from_raw(0x00FF_FFFF) }.is_valid());
        assert_eq!(Handle::INVALID.offset(), OFFSET_MASK);
    }

    #[test]
    fn test_max_pages() {
        assert_eq!(MAX_PAGES, 256);
    }
}
