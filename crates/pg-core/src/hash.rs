//! Hash functions for pattern fingerprints
//!
//! Uses Murmur3 32-bit with two different seeds to create a 64-bit composite
//! key. Pattern ids are the hex form of that key, so the same fingerprint
//! yields the same id in the extension, the engine and the CLI.
//!
//! # Sentinel Handling
//!
//! `(lo=0, hi=0)` is reserved. We ensure it never occurs by OR-ing `lo |= 1`.

/// 64-bit hash represented as two 32-bit parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Hash64 {
    pub lo: u32,
    pub hi: u32,
}

impl Hash64 {
    #[inline]
    pub const fn new(lo: u32, hi: u32) -> Self {
        Self { lo, hi }
    }

    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.lo == 0 && self.hi == 0
    }

    #[inline]
    pub const fn to_u64(&self) -> u64 {
        ((self.hi as u64) << 32) | (self.lo as u64)
    }

    /// Fixed-width lowercase hex, 16 characters.
    pub fn to_hex(&self) -> String {
        format!("{:016x}", self.to_u64())
    }
}

const SEED_LO: u32 = 0x9e3779b9; // Golden ratio
const SEED_HI: u32 = 0x85ebca6b; // Murmur3 constant

/// Murmur3 32-bit hash.
#[inline]
pub fn murmur3_32(data: &[u8], seed: u32) -> u32 {
    let len = data.len();
    let mut h = seed;

    let mut chunks = data.chunks_exact(4);
    for chunk in &mut chunks {
        let k = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        h ^= mix_k(k);
        h = h.rotate_left(13);
        h = h.wrapping_mul(5).wrapping_add(0xe6546b64);
    }

    let tail = chunks.remainder();
    let mut k: u32 = 0;
    if tail.len() >= 3 {
        k ^= (tail[2] as u32) << 16;
    }
    if tail.len() >= 2 {
        k ^= (tail[1] as u32) << 8;
    }
    if !tail.is_empty() {
        k ^= tail[0] as u32;
        h ^= mix_k(k);
    }

    // Finalization
    h ^= len as u32;
    h ^= h >> 16;
    h = h.wrapping_mul(0x85ebca6b);
    h ^= h >> 13;
    h = h.wrapping_mul(0xc2b2ae35);
    h ^= h >> 16;

    h
}

#[inline]
fn mix_k(k: u32) -> u32 {
    k.wrapping_mul(0xcc9e2d51)
        .rotate_left(15)
        .wrapping_mul(0x1b873593)
}

/// Compute 64-bit hash as (lo, hi) pair using two Murmur3 passes.
#[inline]
pub fn hash64(data: &[u8]) -> Hash64 {
    let mut lo = murmur3_32(data, SEED_LO);
    let hi = murmur3_32(data, SEED_HI);

    if lo == 0 && hi == 0 {
        lo = 1;
    }

    Hash64 { lo, hi }
}

/// Hash a fingerprint key. Case-insensitive.
pub fn hash_fingerprint(key: &str) -> Hash64 {
    hash64(key.to_ascii_lowercase().as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_murmur3_consistent() {
        assert_eq!(murmur3_32(b"div|fixed|5x3", 0), murmur3_32(b"div|fixed|5x3", 0));
    }

    #[test]
    fn test_murmur3_known_vectors() {
        // Reference values for the canonical Murmur3 x86_32.
        assert_eq!(murmur3_32(b"", 0), 0);
        assert_eq!(murmur3_32(b"", 1), 0x514e28b7);
        assert_eq!(murmur3_32(b"hello", 0), 0x248bfa47);
    }

    #[test]
    fn test_murmur3_different_seeds() {
        assert_ne!(murmur3_32(b"example", 0), murmur3_32(b"example", 1));
    }

    #[test]
    fn test_hash64_never_empty() {
        for s in [b"" as &[u8], b"a", b"div|fixed|5x3", b"section|absolute|0x0"] {
            assert!(!hash64(s).is_empty(), "hash64({:?}) returned empty sentinel", s);
        }
    }

    #[test]
    fn test_fingerprint_case_insensitive() {
        assert_eq!(hash_fingerprint("DIV|fixed|5x3"), hash_fingerprint("div|fixed|5x3"));
        assert_ne!(hash_fingerprint("div|fixed|5x3"), hash_fingerprint("div|fixed|6x3"));
    }

    #[test]
    fn test_to_hex_width() {
        assert_eq!(Hash64::new(1, 0).to_hex(), "0000000000000001");
        assert_eq!(hash_fingerprint("x").to_hex().len(), 16);
    }
}
