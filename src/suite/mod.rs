//! Certification orchestration: tolerances, engine, context hashing, and the
//! final report.

pub mod config;
pub mod context;
pub mod engine;
pub mod report;
