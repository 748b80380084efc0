//! # wirec-dsa: Murmur3 Mixing
//!
//! 32-bit MurmurHash3 (x86 variant) exposed as a streaming `Hasher`, so any
//! `T: Hash` can be fed to the sketch and the heavy hitter table without
//! pulling in `std`'s randomly seeded `DefaultHasher`.

use core::hash::{Hash, Hasher};

const C1: u32 = 0xcc9e_2d51;
const C2: u32 = 0x1b87_3593;

/// Murmur3 avalanche finalizer.
#[inline(always)]
pub const fn fmix32(mut h: u32) -> u32 {
    h ^= h >> 16;
    h = h.wrapping_mul(0x85eb_ca6b);
    h ^= h >> 13;
    h = h.wrapping_mul(0xc2b2_ae35);
    h ^= h >> 16;
    h
}

#[inline(always)]
fn mix_k1(k1: u32) -> u32 {
    k1.wrapping_mul(C1).rotate_left(15).wrapping_mul(C2)
}

#[inline(always)]
fn mix_h1(h1: u32, k1: u32) -> u32 {
    (h1 ^ k1)
        .rotate_left(13)
        .wrapping_mul(5)
        .wrapping_add(0xe654_6b64)
}

/// Streaming MurmurHash3_x86_32.
///
/// Bytes written across several `write` calls hash identically to the same
/// bytes written at once; partial 4-byte blocks are carried in `tail`.
#[derive(Clone, Copy, Debug)]
pub struct Murmur3Hasher {
    h1: u32,
    tail: u32,
    tail_len: u8,
    len: u32,
}

impl Murmur3Hasher {
    pub const fn with_seed(seed: u32) -> Self {
        Self {
            h1: seed,
            tail: 0,
            tail_len: 0,
            len: 0,
        }
    }

    /// Finalized 32-bit digest.
    #[inline]
    pub fn finish32(&self) -> u32 {
        let mut h1 = self.h1;
        if self.tail_len > 0 {
            h1 ^= mix_k1(self.tail);
        }
        h1 ^= self.len;
        fmix32(h1)
    }

    #[inline(always)]
    fn push_block(&mut self, k1: u32) {
        self.h1 = mix_h1(self.h1, mix_k1(k1));
    }
}

impl Default for Murmur3Hasher {
    fn default() -> Self {
        Self::with_seed(0)
    }
}

impl Hasher for Murmur3Hasher {
    fn write(&mut self, bytes: &[u8]) {
        self.len = self.len.wrapping_add(bytes.len() as u32);

        let mut rest = bytes;
        // Complete a block left open by a previous write first.
        while self.tail_len != 0 && !rest.is_empty() {
            self.tail |= (rest[0] as u32) << (8 * self.tail_len as u32);
            self.tail_len += 1;
            rest = &rest[1..];
            if self.tail_len == 4 {
                let block = self.tail;
                self.push_block(block);
                self.tail = 0;
                self.tail_len = 0;
            }
        }

        let mut blocks = rest.chunks_exact(4);
        for b in &mut blocks {
            self.push_block(u32::from_le_bytes([b[0], b[1], b[2], b[3]]));
        }
        for (i, &byte) in blocks.remainder().iter().enumerate() {
            self.tail |= (byte as u32) << (8 * i as u32);
            self.tail_len += 1;
        }
    }

    #[inline]
    fn finish(&self) -> u64 {
        self.finish32() as u64
    }
}

/// Hashes any `Hash` value with Murmur3 under `seed`.
#[inline]
pub fn hash32<T: Hash + ?Sized>(item: &T, seed: u32) -> u32 {
    let mut hasher = Murmur3Hasher::with_seed(seed);
    item.hash(&mut hasher);
    hasher.finish32()
}
