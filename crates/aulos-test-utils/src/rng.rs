//! Deterministic PRNG for reproducible payload generation.

use bytes::Bytes;

/// Minimal xorshift64 PRNG — deterministic and reproducible.
///
/// Use a fixed seed so test payloads are identical across runs.
pub struct Xorshift64(u64);

impl Xorshift64 {
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self(seed.max(1))
    }

    pub fn next_u64(&mut self) -> u64 {
        self.0 ^= self.0 << 13;
        self.0 ^= self.0 >> 7;
        self.0 ^= self.0 << 17;
        self.0
    }

    /// Returns `u64` in `[min, max)`.
    pub fn range_u64(&mut self, min: u64, max: u64) -> u64 {
        min + self.next_u64() % (max - min)
    }
}

/// A `len`-byte body whose content is fully determined by `seed`.
#[must_use]
pub fn deterministic_body(len: usize, seed: u64) -> Bytes {
    let mut rng = Xorshift64::new(seed);
    let mut out = Vec::with_capacity(len);
    while out.len() < len {
        out.extend_from_slice(&rng.next_u64().to_le_bytes());
    }
    out.truncate(len);
    Bytes::from(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_is_reproducible() {
        assert_eq!(deterministic_body(1000, 42), deterministic_body(1000, 42));
        assert_ne!(deterministic_body(1000, 42), deterministic_body(1000, 43));
        assert_eq!(deterministic_body(7, 1).len(), 7);
    }
}
