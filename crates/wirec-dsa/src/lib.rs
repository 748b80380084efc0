//! # wirec-dsa: Counting Structures
//!
//! The two statistics every compression engine keeps per origin: a Count-Min
//! sketch for approximate frequencies and a top-N tracker that turns those
//! estimates into the current set of heavy hitters.
//!
//! ## Performance
//! Both structures are flat arrays sized once at construction. Hashing is
//! Murmur3 (32-bit), so estimates are stable across processes.

#![cfg_attr(not(test), no_std)]
extern crate alloc;

pub mod error;
pub mod hash;
pub mod heavy_hitters;
pub mod sketch;

pub use error::DsaError;
pub use hash::{hash32, Murmur3Hasher};
pub use heavy_hitters::TopHeavyHitters;
pub use sketch::CountMinSketch;
