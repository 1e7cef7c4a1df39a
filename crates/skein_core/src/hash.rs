//! # Content Hash
//!
//! MurmurHash3 x86_32. Public domain mixing function, reproduced here so the
//! stored footer hashes are stable across builds and platforms.

/// Seed used when a pool is built without an explicit one.
pub const DEFAULT_HASH_SEED: u32 = 0x9747_B28C;

const C1: u32 = 0xCC9E_2D51;
const C2: u32 = 0x1B87_3593;

#[inline]
const fn mix_block(mut k: u32) -> u32 {
    k = k.wrapping_mul(C1);
    k = k.rotate_left(15);
    k.wrapping_mul(C2)
}

/// Final avalanche.
#[inline]
const fn fmix32(mut h: u32) -> u32 {
    h ^= h >> 16;
    h = h.wrapping_mul(0x85EB_CA6B);
    h ^= h >> 13;
    h = h.wrapping_mul(0xC2B2_AE35);
    h ^= h >> 16;
    h
}

/// Hashes `bytes` with MurmurHash3 x86_32.
///
/// Blocks are read little-endian regardless of host byte order.
#[must_use]
pub fn hash_bytes(bytes: &[u8], seed: u32) -> u32 {
    let mut h = seed;

    let mut blocks = bytes.chunks_exact(4);
    for block in &mut blocks {
        let k = u32::from_le_bytes([block[0], block[1], block[2], block[3]]);
        h ^= mix_block(k);
        h = h.rotate_left(13);
        h = h.wrapping_mul(5).wrapping_add(0xE654_6B64);
    }

    let tail = blocks.remainder();
    if !tail.is_empty() {
        let mut k = 0u32;
        for (i, &byte) in tail.iter().enumerate() {
            k ^= u32::from(byte) << (8 * i);
        }
        h ^= mix_block(k);
    }

    // The length is folded in modulo 2^32, as the reference does.
    #[allow(clippy::cast_possible_truncation)]
    let len = bytes.len() as u32;
    fmix32(h ^ len)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_vectors() {
        assert_eq!(hash_bytes(b"", 0), 0);
        assert_eq!(hash_bytes(b"", 1), 0x514E_28B7);
        assert_eq!(hash_bytes(b"test", 0), 0xBA6B_D213);
        assert_eq!(hash_bytes(b"Hello, world!", 1234), 0xFAF6_CDB3);
        assert_eq!(
            hash_bytes(b"The quick brown fox jumps over the lazy dog", 0),
            0x2E4F_F723
        );
    }

    #[test]
    fn test_tail_lengths_differ() {
        let a = hash_bytes(b"abc", DEFAULT_HASH_SEED);
        let b = hash_bytes(b"abcd", DEFAULT_HASH_SEED);
        let c = hash_bytes(b"abcde", DEFAULT_HASH_SEED);
        assert_ne!(a, b);
        assert_ne!(b, c);
    }

    #[test]
    fn test_seed_changes_output() {
        assert_ne!(hash_bytes(b"hello", 0), hash_bytes(b"hello", DEFAULT_HASH_SEED));
    }

    #[test]
    fn test_known_collision_under_default_seed() {
        let a = b"skein-ab";
        let b = [112u8, 111, 111, 108, 76, 200, 226, 205];
        assert_ne!(&a[..], &b[..]);
        assert_eq!(hash_bytes(a, DEFAULT_HASH_SEED), 0x9858_4527);
        assert_eq!(hash_bytes(&b, DEFAULT_HASH_SEED), 0x9858_4527);
    }
}
