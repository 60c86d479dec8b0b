// Cache module for URL-keyed response caching.
// Stores successful GET bodies on disk for reuse without a network call.

pub mod paths;
pub mod store;

pub use paths::{CacheLayout, default_cache_dir, url_key};
pub use store::{CachedEntry, FileCache, ResponseCache};
