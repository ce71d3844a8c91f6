//! Keyed, disk-backed caching.
//!
//! - [`CacheKey`]: fingerprint of an artwork rendition (identity, size,
//!   source modification time, encoding settings)
//! - [`DiskCache`]: bounded LRU cache of byte blobs on disk with singleflight
//!   generation through a [`Generator`]
//!
//! # Example
//!
//! ```no_run
//! use artwork_cache::cache::{DiskCache, DiskCacheConfig, Generated, Generator};
//! use async_trait::async_trait;
//!
//! struct Upper;
//!
//! #[async_trait]
//! impl Generator for Upper {
//!     type Input = String;
//!     type Error = String;
//!
//!     async fn generate(&self, input: String) -> Result<Generated, String> {
//!         Ok(Generated::new(input.to_uppercase()))
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = DiskCacheConfig::new("upper", "/tmp/upper-cache").with_capacity(1024 * 1024);
//!     let cache = DiskCache::open(config, Upper).await.unwrap();
//!
//!     let value = cache.get("greeting", "hello".to_string()).await.unwrap();
//!     assert_eq!(&value.data[..], b"HELLO");
//! }
//! ```

mod disk;
mod entry;
mod key;

pub use disk::{
    CacheStats, DiskCache, DiskCacheConfig, Generated, Generator, Lookup, Origin,
    DEFAULT_CACHE_CAPACITY, DEFAULT_MAX_ENTRIES,
};
pub use key::{CacheKey, ORIGINAL_SIZE};
