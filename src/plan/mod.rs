//! Coverage configuration and its expansion into a conformance plan.

pub mod builder;
pub mod coverage;
