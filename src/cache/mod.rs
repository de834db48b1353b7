// Cache module - content-addressed store of rendered PDFs

pub mod config;
pub mod entry;
pub mod stats;
pub mod store;

pub use config::CacheConfig;
pub use entry::{CacheEntry, Fingerprint};
pub use stats::CacheStats;
pub use store::CacheStore;
