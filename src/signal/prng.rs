//! SplitMix64: the single source of randomness for stimulus synthesis.
//!
//! Every stochastic generator owns one of these, seeded from the coverage
//! configuration, so a plan replays bit-identically for a given seed.

use rand::RngCore;

const GOLDEN_GAMMA: u64 = 0x9e37_79b9_7f4a_7c15;

/// Seedable 64-bit mixing generator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitMix64 {
    state: u64,
}

impl SplitMix64 {
    #[must_use]
    pub const fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    /// Advance and return the next mixed 64-bit word.
    pub fn next_word(&mut self) -> u64 {
        self.state = self.state.wrapping_add(GOLDEN_GAMMA);
        let mut z = self.state;
        z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
        z ^ (z >> 31)
    }

    /// Uniform sample in `[0, 1)` with 53 bits of precision.
    #[allow(clippy::cast_precision_loss)]
    pub fn next_unit(&mut self) -> f64 {
        (self.next_word() >> 11) as f64 * (1.0 / (1_u64 << 53) as f64)
    }

    /// One bit of the stream, used for PRBS sign draws.
    pub fn next_bit(&mut self) -> bool {
        self.next_word() & 1 == 1
    }
}

impl RngCore for SplitMix64 {
    #[allow(clippy::cast_possible_truncation)]
    fn next_u32(&mut self) -> u32 {
        (self.next_word() >> 32) as u32
    }

    fn next_u64(&mut self) -> u64 {
        self.next_word()
    }

    fn fill_bytes(&mut self, dst: &mut [u8]) {
        for chunk in dst.chunks_mut(8) {
            let bytes = self.next_word().to_le_bytes();
            chunk.copy_from_slice(&bytes[..chunk.len()]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::SplitMix64;
    use rand::{Rng, RngCore};

    #[test]
    fn matches_reference_sequence_for_zero_seed() {
        // Published SplitMix64 outputs for seed 0.
        let mut rng = SplitMix64::new(0);
        assert_eq!(rng.next_word(), 0xe220_a839_7b1d_cdaf);
        assert_eq!(rng.next_word(), 0x6e78_9e6a_a1b9_65f4);
        assert_eq!(rng.next_word(), 0x06c4_5d18_8009_454f);
    }

    #[test]
    fn identical_seeds_give_identical_streams() {
        let mut a = SplitMix64::new(42);
        let mut b = SplitMix64::new(42);
        for _ in 0..1_000 {
            assert_eq!(a.next_word(), b.next_word());
        }
    }

    #[test]
    fn unit_samples_stay_in_half_open_interval() {
        let mut rng = SplitMix64::new(7);
        for _ in 0..10_000 {
            let u = rng.next_unit();
            assert!((0.0..1.0).contains(&u), "out of range: {u}");
        }
    }

    #[test]
    fn rng_core_agrees_with_unit_mapping() {
        let mut a = SplitMix64::new(99);
        let mut b = SplitMix64::new(99);
        let via_rand: f64 = a.random();
        assert_eq!(via_rand.to_bits(), b.next_unit().to_bits());
    }

    #[test]
    fn fill_bytes_handles_partial_chunks() {
        let mut rng = SplitMix64::new(1);
        let mut buf = [0_u8; 13];
        rng.fill_bytes(&mut buf);
        assert!(buf.iter().any(|b| *b != 0));
    }
}
