//! Core types: errors, channel values, and certification configuration.

pub mod channels;
pub mod config;
pub mod errors;
