//! Rendered-page caching.

mod config;
mod lock;
mod middleware;
mod store;

pub use config::CacheConfig;
pub use middleware::{CacheState, page_cache_layer};
pub use store::{CachedPage, PageKey, PageStore, hash_query};
