//! Append-only JSONL certification event log with graceful degradation.

pub mod jsonl;
