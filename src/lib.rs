//! # Artwork Cache
//!
//! A lazily-populated, disk-backed cache of resized artwork images.
//!
//! Given "artwork X at size N", the cache returns stored bytes on repeat
//! requests. On the first request it reads the original artwork, resizes it
//! preserving aspect ratio, encodes it, stores it and returns it. Concurrent
//! requests for the same rendition share a single resize.
//!
//! ## Features
//!
//! - **Self-invalidating keys**: keys include the source modification time and
//!   the encoding settings, so changed artwork or settings miss automatically
//! - **Singleflight generation**: one generation per key, no matter how many
//!   concurrent callers
//! - **Bounded disk storage**: LRU eviction by total bytes and entry count,
//!   index rebuilt from disk on startup
//! - **Passthrough on failure**: undecodable artwork is served as-is
//!
//! ## Architecture
//!
//! - [`cache`] - Cache keys and the generic disk-backed keyed cache
//! - [`artwork`] - Artwork sources, the resize pipeline and the image cache
//! - [`config`] - CLI and configuration types
//! - [`error`] - Error types

pub mod artwork;
pub mod cache;
pub mod config;
pub mod error;

// Re-export commonly used types
pub use artwork::{
    ArtworkId, ArtworkImage, ArtworkReader, ArtworkSource, FsArtworkSource, ImageCache,
    ImageVariant, ResizeOutcome, ResizePipeline,
};
pub use cache::{
    CacheKey, CacheStats, DiskCache, DiskCacheConfig, Generated, Generator, Lookup, Origin,
};
pub use config::{parse_byte_size, Cli, Command, Config, ImageSettings};
pub use error::{ArtworkError, CacheError, ResizeError, SourceError};
