//! Append-only JSONL diagnostics with graceful degradation.

pub mod jsonl;
