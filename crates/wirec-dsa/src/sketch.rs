//! # wirec-dsa: Count-Min Sketch
//!
//! Fixed `depth × width` counter matrix. Memory never grows with the number
//! of distinct values observed, and estimates only ever overshoot.

use alloc::vec;
use alloc::vec::Vec;
use core::hash::Hash;

use crate::error::DsaError;
use crate::hash::{fmix32, hash32};

/// Odd constant used to derive the second bucket hash from the first.
const H2_SALT: u32 = 0x9e37_79b9;

/// An approximate frequency counter in the cash-register model.
///
/// ## Guarantees
/// - `estimate(x) >= true_count(x)` for every `x`.
/// - Estimates never decrease.
/// - `add` and `estimate` cost O(depth).
#[derive(Clone, Debug)]
pub struct CountMinSketch {
    depth: usize,
    width: usize,
    mask: u32,
    seed: u32,
    /// Row-major `depth * width` counters.
    table: Vec<u64>,
    size: u64,
}

impl CountMinSketch {
    /// Creates a sketch with `depth` rows of `width` counters.
    ///
    /// `width` must be a power of two so that bucket selection can use a
    /// bit mask instead of a modulo.
    pub fn new(depth: usize, width: usize, seed: u32) -> Result<Self, DsaError> {
        if depth == 0 {
            return Err(DsaError::ZeroDepth);
        }
        if !width.is_power_of_two() || width > u32::MAX as usize {
            return Err(DsaError::NonPowerOfTwoWidth { width });
        }

        tracing::debug!("CountMinSketch: {}x{} counters (seed {:#x})", depth, width, seed);

        Ok(Self {
            depth,
            width,
            mask: (width - 1) as u32,
            seed,
            table: vec![0; depth * width],
            size: 0,
        })
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Sum of all increments applied so far.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Double hashing: one Murmur3 pass yields `h1`, `h2` is its remix.
    /// Row `i` uses bucket `(h1 + i * h2) & (width - 1)`.
    #[inline(always)]
    fn bucket_hashes<T: Hash + ?Sized>(&self, item: &T) -> (u32, u32) {
        let h1 = hash32(item, self.seed);
        let h2 = fmix32(h1 ^ H2_SALT) | 1;
        (h1, h2)
    }

    #[inline(always)]
    fn cell(&self, row: usize, h1: u32, h2: u32) -> usize {
        let col = h1.wrapping_add((row as u32).wrapping_mul(h2)) & self.mask;
        row * self.width + col as usize
    }

    /// Adds `count` occurrences of `item` and returns its updated estimate.
    ///
    /// Increment and estimate share the bucket computation, so doing both in
    /// one pass halves the hashing cost on the hot path.
    pub fn add<T: Hash + ?Sized>(&mut self, item: &T, count: i64) -> Result<u64, DsaError> {
        if count < 0 {
            return Err(DsaError::NegativeIncrement { count });
        }
        let n = count as u64;
        let (h1, h2) = self.bucket_hashes(item);

        let mut estimate = u64::MAX;
        for row in 0..self.depth {
            let idx = self.cell(row, h1, h2);
            let counter = &mut self.table[idx];
            *counter = counter.saturating_add(n);
            estimate = estimate.min(*counter);
        }
        self.size = self.size.saturating_add(n);
        Ok(estimate)
    }

    /// Current (over-)estimate for `item`.
    pub fn estimate<T: Hash + ?Sized>(&self, item: &T) -> u64 {
        let (h1, h2) = self.bucket_hashes(item);
        (0..self.depth)
            .map(|row| self.table[self.cell(row, h1, h2)])
            .min()
            .unwrap_or(0)
    }
}
