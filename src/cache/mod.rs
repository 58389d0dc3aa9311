//! Cache Module
//!
//! Namespaced caching with TTL expiration over a distributed store or an
//! in-process map.

mod backend;
mod entry;
mod local;
mod manager;
mod namespace;
mod stats;
mod store;


// Re-export public types
pub use backend::{Backend, BackendKind};
pub use entry::CacheEntry;
pub use local::LocalStore;
pub use manager::{CacheManager, CacheOptions};
pub use namespace::Namespace;
pub use stats::{CacheStats, StatsCounters};
pub use store::{Lookup, NamespaceCache};

// == Public Constants ==
/// Maximum allowed key length in bytes
pub const MAX_KEY_LENGTH: usize = 256;
