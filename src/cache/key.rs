//! Cache key fingerprints for resized artwork.
//!
//! A key is a pure function of the artwork identity, the requested size, the
//! modification time of the original, and the global settings that change the
//! encoded output. Any change in those inputs yields a different fingerprint,
//! so stale entries simply stop being addressed and age out through normal
//! eviction. There is no explicit invalidation.
//!
//! # Format
//!
//! ```text
//! <artwork>.<modified_ms>.<size>.<quality>.<cover_art_enabled>
//! ```
//!
//! The four trailing fields never contain `.`, so the string splits back into
//! the original tuple from the right even when the artwork id contains dots.

use std::fmt;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Size value requesting the original, unresized artwork.
pub const ORIGINAL_SIZE: u32 = 0;

/// Composite key for one cached rendition of an artwork.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Stable artwork identity
    pub artwork: Arc<str>,

    /// Target size in pixels (0 = original)
    pub size: u32,

    /// Last modification time of the original artwork
    pub last_modified: SystemTime,

    /// JPEG quality used for encoding
    pub quality: u8,

    /// Whether embedded media-file cover art participates in resolution
    pub cover_art_enabled: bool,
}

impl CacheKey {
    /// Create a new cache key.
    pub fn new(
        artwork: impl Into<Arc<str>>,
        size: u32,
        last_modified: SystemTime,
        quality: u8,
        cover_art_enabled: bool,
    ) -> Self {
        Self {
            artwork: artwork.into(),
            size,
            last_modified,
            quality,
            cover_art_enabled,
        }
    }

    /// Deterministic string fingerprint used as the cache address.
    pub fn fingerprint(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}.{}",
            self.artwork,
            unix_millis(self.last_modified),
            self.size,
            self.quality,
            self.cover_art_enabled
        )
    }
}

/// Milliseconds since the Unix epoch; negative for earlier timestamps.
fn unix_millis(time: SystemTime) -> i128 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(after) => after.as_millis() as i128,
        Err(before) => -(before.duration().as_millis() as i128),
    }
}
