//! # Record Footer
//!
//! Every string record is `[content bytes][footer]`. The footer is 8 bytes:
//!
//! ```text
//! byte 0      : marker (always zero, not a terminator)
//! bytes 1..4  : content length, 24 bits little-endian
//! bytes 4..8  : content hash, 32 bits little-endian
//! ```
//!
//! Footers sit at arbitrary byte offsets, so they are read and written with
//! unaligned copies rather than by casting page memory.

use bytemuck::{Pod, Zeroable};

/// Size of a footer in bytes.
pub const FOOTER_SIZE: usize = std::mem::size_of::<Footer>();

/// Largest length the footer can record.
pub const MAX_FOOTER_LEN: usize = (1 << 24) - 1;

/// Length and hash trailer of a string record.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct Footer {
    /// Marker byte in the low 8 bits, length in the high 24 bits.
    meta: u32,
    /// Content hash.
    hash: u32,
}

impl Footer {
    /// Creates a footer for `len` content bytes.
    ///
    /// # Panics
    ///
    /// Panics if `len` does not fit in 24 bits.
    #[inline]
    #[must_use]
    pub fn new(len: usize, hash: u32) -> Self {
        assert!(len <= MAX_FOOTER_LEN, "string length {len} exceeds footer range");
        #[allow(clippy::cast_possible_truncation)]
        let meta = ((len as u32) << 8).to_le();
        Self {
            meta,
            hash: hash.to_le(),
        }
    }

    /// Content length in bytes.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        (u32::from_le(self.meta) >> 8) as usize
    }

    /// Whether the record has no content bytes.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stored content hash.
    #[inline]
    #[must_use]
    pub const fn hash(&self) -> u32 {
        u32::from_le(self.hash)
    }

    /// The marker byte. Zero for every footer this crate writes.
    #[inline]
    #[must_use]
    pub const fn marker(&self) -> u8 {
        (u32::from_le(self.meta) & 0xFF) as u8
    }

    /// Replaces the stored hash.
    #[inline]
    pub fn set_hash(&mut self, hash: u32) {
        self.hash = hash.to_le();
    }

    /// Reads a footer from the first [`FOOTER_SIZE`] bytes of `bytes`.
    #[inline]
    #[must_use]
    pub fn read(bytes: &[u8]) -> Self {
        bytemuck::pod_read_unaligned(&bytes[..FOOTER_SIZE])
    }

    /// Writes this footer into the first [`FOOTER_SIZE`] bytes of `bytes`.
    #[inline]
    pub fn write(&self, bytes: &mut [u8]) {
        bytes[..FOOTER_SIZE].copy_from_slice(bytemuck::bytes_of(self));
    }
}
