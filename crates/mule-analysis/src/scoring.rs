//! Deterministic score jitter and rounding helpers.
//!
//! Every random component of a score is drawn from a PRNG seeded with the
//! run seed mixed with a finding-specific key (ring id, account id). The
//! same seed and input therefore always produce the same scores, and a
//! value does not depend on how many other draws happened before it.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Keyed jitter source.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Jitter {
    seed: u64,
}

impl Jitter {
    /// Jitter source for one run.
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    /// Uniform draw in `[0, 1)` for `key`.
    pub fn unit(&self, key: &str) -> f64 {
        let mut rng = StdRng::seed_from_u64(self.seed ^ fnv1a(key.as_bytes()));
        rng.gen::<f64>()
    }

    /// Uniform draw in `[low, high)` for `key`.
    pub fn between(&self, key: &str, low: f64, high: f64) -> f64 {
        low + (high - low) * self.unit(key)
    }
}

/// 64-bit FNV-1a.
fn fnv1a(bytes: &[u8]) -> u64 {
    const OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    bytes.iter().fold(OFFSET_BASIS, |hash, &byte| {
        (hash ^ u64::from(byte)).wrapping_mul(PRIME)
    })
}

/// Round to one decimal place.
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Round to two decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
