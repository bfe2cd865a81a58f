//! Cache Store Module
//!
//! The wire contract of the key-value cache store and an in-process
//! implementation with TTL expiration.

mod client;
mod entry;
mod memory;
mod stats;
mod store;


// Re-export public types
pub use client::CacheClient;
pub use entry::{CacheEntry, Slot};
pub use memory::MemoryCache;
pub use stats::CacheStats;
pub use store::CacheStore;

// == Public Constants ==
/// Maximum allowed key length in bytes
pub const MAX_KEY_LENGTH: usize = 512;

/// Maximum allowed value size in bytes
pub const MAX_VALUE_SIZE: usize = 8 * 1024 * 1024; // 8 MB
