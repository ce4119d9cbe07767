//! Strata - tiered associative memory for LLM trading agents
//!
//! Per-asset memory tenants store JSON records alongside embeddings, answer
//! nearest-neighbor queries, keep a bounded recency buffer, and merge
//! results from several phrasings of the same query.

pub mod config;
pub mod embedding;
pub mod error;
pub mod index;
pub mod memory;
pub mod query;
pub mod server;
pub mod storage;
pub mod testing;

pub use error::{Result, StrataError};
