//! Tiered associative memory
//!
//! Records with embeddings live in per-tenant [`MemoryUnit`]s; raw recent
//! observations live in per-tenant [`RecencyBuffer`]s. [`MemoryRegistry`]
//! routes `(symbol, memory_type)` to both.

pub mod recency;
pub mod registry;
pub mod store;
pub mod types;
pub mod unit;

pub use recency::RecencyBuffer;
pub use registry::{
    MemoryRegistry, PersistReport, RegistryOptions, TenantFailure, TenantStats, validate_symbol,
};
pub use store::RecordStore;
pub use types::{Embedding, MemoryType, QueryResult, Record, RecordId, TenantKey};
pub use unit::{MemoryUnit, RecordIdGenerator};
