//! Drives a target policy through input families and records trajectories.

pub mod conformance;
pub mod normalization;
pub mod residual;
pub mod target;
