//! # Page Allocator
//!
//! Sub-allocation inside one fixed-size page.
//!
//! The allocator only deals in offsets; it never touches page bytes. Free
//! space is a bump cursor plus holes below it. Holes are coalesced on
//! release and filed into size bins, so finding one never walks the hole
//! list:
//!
//! ```text
//! 0                                   top                      capacity
//! ├──live──┤ hole ├──live──┤ hole ├live┤─────── untouched ───────┤
//!
//! bins: [8] [16] [24] ... [512] | [513..1K) [1K..2K) ... [8M..16M)
//!       └──── one per size ───┘   └──── one per power of two ─────┘
//! ```
//!
//! A request is served from the smallest bin whose every hole fits it, then
//! from the bump cursor, and only when the page is otherwise full from the
//! one bin whose holes may or may not fit. Bins are stacks of start offsets
//! checked against the hole maps when popped, so merging a hole away leaves
//! a stale entry behind instead of searching for it.

use std::collections::HashMap;

use crate::handle::OFFSET_BITS;

/// Size of every page in bytes.
pub const PAGE_SIZE: usize = 2 * 1024 * 1024;

/// Block sizes are rounded up to this many bytes.
pub const ALLOC_GRANULE: u32 = 8;

/// Holes up to this size get a bin of their own size.
const EXACT_LIMIT: u32 = 512;

/// Number of exact-size bins.
const EXACT_BINS: usize = (EXACT_LIMIT / ALLOC_GRANULE) as usize;

/// Exact bins plus one per power of two up to the offset range.
const BIN_COUNT: usize = EXACT_BINS + (OFFSET_BITS - EXACT_LIMIT.ilog2()) as usize;

/// Stale entries a bin may carry beyond the live hole count before compaction.
const BIN_SLACK: usize = 16;

#[inline]
const fn round_up(size: u32) -> u32 {
    (size + ALLOC_GRANULE - 1) & !(ALLOC_GRANULE - 1)
}

/// Bin a hole of `len` bytes is filed under. `len` is a non-zero granule multiple.
#[inline]
const fn bin_of(len: u32) -> usize {
    if len <= EXACT_LIMIT {
        (len / ALLOC_GRANULE) as usize - 1
    } else {
        EXACT_BINS + (len.ilog2() - EXACT_LIMIT.ilog2()) as usize
    }
}

/// First bin in which every hole is at least `size` bytes.
#[inline]
const fn first_fitting_bin(size: u32) -> usize {
    if size <= EXACT_LIMIT || size.is_power_of_two() {
        bin_of(size)
    } else {
        bin_of(size) + 1
    }
}

/// Free-list allocator for a single page.
///
/// Blocks returned by [`Self::allocate`] never overlap while live. A full
/// page is not an error: `allocate` returns `None` and the pool moves on to
/// the next page.
///
/// `allocate` and `release` cost a bounded number of bin pops and hash map
/// lookups, independent of how many holes the page has. Stale bin entries
/// are paid for by the insertion that created them. The one exception is
/// a page with no room at the cursor and no hole in a guaranteed bin: it
/// then scans the single bin of holes close to the request size before
/// giving up.
#[derive(Debug)]
pub struct PageAllocator {
    /// Total bytes managed.
    capacity: u32,
    /// Bump cursor; everything at or above it is free.
    top: u32,
    /// Holes below `top`, start offset to length. No hole ends at `top`.
    holes: HashMap<u32, u32>,
    /// The same holes keyed by end offset, for merging with a left neighbour.
    hole_ends: HashMap<u32, u32>,
    /// Hole start offsets by [`bin_of`]; may hold stale entries.
    bins: Vec<Vec<u32>>,
    /// Live blocks, keyed by start offset.
    live: HashMap<u32, u32>,
    /// Sum of live block sizes.
    bytes_in_use: usize,
}

impl PageAllocator {
    /// Creates an allocator managing `capacity` bytes.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero or does not fit the handle offset field.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "Capacity must be greater than zero");
        let capacity = u32::try_from(capacity)
            .ok()
            .filter(|&c| c < crate::handle::OFFSET_MASK)
            .unwrap_or_else(|| panic!("page capacity {capacity} exceeds handle offset range"));

        Self {
            capacity: capacity & !(ALLOC_GRANULE - 1),
            top: 0,
            holes: HashMap::new(),
            hole_ends: HashMap::new(),
            bins: vec![Vec::new(); BIN_COUNT],
            live: HashMap::new(),
            bytes_in_use: 0,
        }
    }

    /// Total capacity in bytes.
    #[inline]
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity as usize
    }

    /// Number of live blocks.
    #[inline]
    #[must_use]
    pub fn allocated_count(&self) -> usize {
        self.live.len()
    }

    /// Bytes held by live blocks, after rounding.
    #[inline]
    #[must_use]
    pub const fn bytes_in_use(&self) -> usize {
        self.bytes_in_use
    }

    /// Bytes not held by live blocks (holes plus untouched tail).
    #[inline]
    #[must_use]
    pub const fn free_bytes(&self) -> usize {
        self.capacity as usize - self.bytes_in_use
    }

    /// Carves out a block of at least `size` bytes.
    ///
    /// Holes that certainly fit are preferred over the bump cursor, smallest
    /// bin first.
    ///
    /// # Returns
    ///
    /// The block's start offset, or `None` if no contiguous run is large enough.
    pub fn allocate(&mut self, size: usize) -> Option<u32> {
        let size = u32::try_from(size).ok().filter(|&s| s <= self.capacity)?;
        let size = round_up(size.max(1));

        let start = if let Some((start, len)) = self.take_fitting_hole(size) {
            self.split_hole(start, len, size);
            start
        } else if self.capacity - self.top >= size {
            let start = self.top;
            self.top += size;
            start
        } else if let Some((start, len)) = self.take_near_hole(size) {
            self.split_hole(start, len, size);
            start
        } else {
            return None;
        };

        self.live.insert(start, size);
        self.bytes_in_use += size as usize;
        Some(start)
    }

    /// Releases the block starting at `offset`.
    ///
    /// Releasing an offset that is not the start of a live block is a caller
    /// bug; it is detected here only because the lookup is free, and reported
    /// as `None`.
    ///
    /// # Returns
    ///
    /// The size of the released block.
    pub fn release(&mut self, offset: u32) -> Option<usize> {
        let size = self.live.remove(&offset)?;
        self.bytes_in_use -= size as usize;

        let mut start = offset;
        let mut len = size;

        if let Some(next_len) = self.holes.get(&(start + len)).copied() {
            self.remove_hole(start + len, next_len);
            len += next_len;
        }
        if let Some(prev_start) = self.hole_ends.get(&start).copied() {
            let prev_len = start - prev_start;
            self.remove_hole(prev_start, prev_len);
            start = prev_start;
            len += prev_len;
        }

        if start + len == self.top {
            self.top = start;
        } else {
            self.insert_hole(start, len);
        }

        Some(size as usize)
    }

    // =========================================================================
    // HOLE BOOKKEEPING
    // =========================================================================

    /// Length of the hole at `start`, if it exists and is filed under `bin`.
    #[inline]
    fn live_hole(&self, start: u32, bin: usize) -> Option<u32> {
        self.holes
            .get(&start)
            .copied()
            .filter(|&len| bin_of(len) == bin)
    }

    fn insert_hole(&mut self, start: u32, len: u32) {
        self.holes.insert(start, len);
        self.hole_ends.insert(start + len, start);

        let bin = bin_of(len);
        self.bins[bin].push(start);
        if self.bins[bin].len() > 2 * self.holes.len() + BIN_SLACK {
            self.compact_bin(bin);
        }
    }

    fn remove_hole(&mut self, start: u32, len: u32) {
        self.holes.remove(&start);
        self.hole_ends.remove(&(start + len));
    }

    /// Gives the unused tail of a taken hole back as a smaller hole.
    fn split_hole(&mut self, start: u32, len: u32, size: u32) {
        if len > size {
            self.insert_hole(start + size, len - size);
        }
    }

    /// Pops a hole of at least `size` bytes from the bins that guarantee one.
    fn take_fitting_hole(&mut self, size: u32) -> Option<(u32, u32)> {
        for bin in first_fitting_bin(size)..BIN_COUNT {
            while let Some(start) = self.bins[bin].pop() {
                if let Some(len) = self.live_hole(start, bin) {
                    self.remove_hole(start, len);
                    return Some((start, len));
                }
            }
        }
        None
    }

    /// Searches the bin holding holes around `size` for one that fits.
    fn take_near_hole(&mut self, size: u32) -> Option<(u32, u32)> {
        let bin = bin_of(size);
        let index = self.bins[bin]
            .iter()
            .position(|&start| self.live_hole(start, bin).is_some_and(|len| len >= size))?;
        let start = self.bins[bin].swap_remove(index);
        let len = self.live_hole(start, bin)?;
        self.remove_hole(start, len);
        Some((start, len))
    }

    /// Drops stale and duplicate entries from a bin.
    fn compact_bin(&mut self, bin: usize) {
        let mut entries = std::mem::take(&mut self.bins[bin]);
        entries.retain(|&start| self.live_hole(start, bin).is_some());
        entries.sort_unstable();
        entries.dedup();
        self.bins[bin] = entries;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_allocate_release() {
        let mut page = PageAllocator::new(1024);

        let a = page.allocate(13).unwrap();
        assert_eq!(a, 0);
        assert_eq!(page.bytes_in_use(), 16);
        assert_eq!(page.allocated_count(), 1);

        assert_eq!(page.release(a), Some(16));
        assert_eq!(page.allocated_count(), 0);
        assert_eq!(page.free_bytes(), 1024);
    }

    #[test]
    fn test_page_full() {
        let mut page = PageAllocator::new(64);

        assert!(page.allocate(32).is_some());
        assert!(page.allocate(32).is_some());
        assert!(page.allocate(1).is_none());
        assert!(page.allocate(65).is_none());
    }

    #[test]
    fn test_page_reuse() {
        let mut page = PageAllocator::new(64);

        let a = page.allocate(16).unwrap();
        let b = page.allocate(16).unwrap();
        let _c = page.allocate(16).unwrap();
        page.release(b);

        // The hole left by `b` is reused before the tail.
        let d = page.allocate(8).unwrap();
        assert_eq!(d, b);
        assert_ne!(d, a);
    }

    #[test]
    fn test_page_coalesces_holes() {
        let mut page = PageAllocator::new(96);

        let a = page.allocate(32).unwrap();
        let b = page.allocate(32).unwrap();
        let _c = page.allocate(32).unwrap();

        page.release(a);
        page.release(b);

        // Two adjacent 32-byte holes merge into one 64-byte hole.
        assert_eq!(page.allocate(64), Some(0));
    }

    #[test]
    fn test_page_tail_release_lowers_cursor() {
        let mut page = PageAllocator::new(64);

        let a = page.allocate(32).unwrap();
        let b = page.allocate(32).unwrap();
        page.release(b);
        page.release(a);

        assert_eq!(page.allocate(64), Some(0));
    }

    #[test]
    fn test_page_release_unknown_offset() {
        let mut page = PageAllocator::new(64);
        let a = page.allocate(16).unwrap();

        assert_eq!(page.release(a + 8), None);
        assert_eq!(page.release(a), Some(16));
        assert_eq!(page.release(a), None);
    }

    #[test]
    fn test_page_blocks_do_not_overlap() {
        let mut page = PageAllocator::new(4096);
        let mut blocks = Vec::new();

        for size in [5usize, 100, 8, 33, 250, 1, 64] {
            blocks.push((page.allocate(size).unwrap(), size));
        }
        page.release(blocks[1].0);
        page.release(blocks[4].0);
        for size in [40usize, 40, 200] {
            blocks.push((page.allocate(size).unwrap(), size));
        }
        blocks.remove(4);
        blocks.remove(1);

        blocks.sort_unstable();
        for pair in blocks.windows(2) {
            let (start, size) = pair[0];
            assert!(start as usize + size <= pair[1].0 as usize);
        }
    }

    #[test]
    fn test_page_prefers_exact_size_hole() {
        let mut page = PageAllocator::new(1024);

        let wide = page.allocate(64).unwrap();
        let _fence = page.allocate(8).unwrap();
        let narrow = page.allocate(24).unwrap();
        let _tail = page.allocate(8).unwrap();

        page.release(wide);
        page.release(narrow);

        // The 24-byte hole is taken whole; the lower 64-byte hole stays intact.
        assert_eq!(page.allocate(24), Some(narrow));
        assert_eq!(page.allocate(64), Some(wide));
    }

    #[test]
    fn test_page_uses_near_hole_when_full() {
        let mut page = PageAllocator::new(4096);

        let big = page.allocate(1000).unwrap();
        let _fence = page.allocate(8).unwrap();
        let _rest = page.allocate(4096 - 1008).unwrap();
        assert!(page.allocate(8).is_none());

        page.release(big);

        // 900 files in the same bin as the 1000-byte hole, which is not a
        // guaranteed fit, so it is only reached once the cursor is out of room.
        assert_eq!(page.allocate(900), Some(0));
        assert_eq!(page.allocate(96), Some(904));
        assert!(page.allocate(8).is_none());
    }

    #[test]
    fn test_page_churn_keeps_bins_compact() {
        let mut page = PageAllocator::new(1024);

        let slot = page.allocate(48).unwrap();
        let _fence = page.allocate(8).unwrap();
        page.release(slot);

        // Each round splits the 48-byte hole and merges the 8-byte remainder
        // away again, leaving a stale entry in a bin nothing allocates from.
        for _ in 0..10_000 {
            let block = page.allocate(40).unwrap();
            assert_eq!(block, slot);
            page.release(block);
        }

        assert!(page.bins[bin_of(8)].len() <= 2 * page.holes.len() + BIN_SLACK + 1);
        assert_eq!(page.holes.len(), 1);
        assert_eq!(page.allocate(48), Some(slot));
    }

    #[test]
    fn test_bin_boundaries() {
        assert_eq!(bin_of(8), 0);
        assert_eq!(bin_of(EXACT_LIMIT), EXACT_BINS - 1);
        assert_eq!(bin_of(EXACT_LIMIT + 8), EXACT_BINS);
        assert_eq!(bin_of(1024), EXACT_BINS + 1);
        assert_eq!(bin_of(crate::handle::OFFSET_MASK & !7), BIN_COUNT - 1);

        assert_eq!(first_fitting_bin(24), bin_of(24));
        assert_eq!(first_fitting_bin(1024), bin_of(1024));
        assert_eq!(first_fitting_bin(900), bin_of(900) + 1);
    }

    #[test]
    fn test_full_page_size() {
        let mut page = PageAllocator::new(PAGE_SIZE);
        assert_eq!(page.allocate(PAGE_SIZE), Some(0));
        assert!(page.allocate(1).is_none());
    }
}
