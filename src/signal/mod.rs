//! Deterministic stimulus synthesis: PRNG, filter, generators, and families.

pub mod family;
pub mod filter;
pub mod generators;
pub mod prng;
