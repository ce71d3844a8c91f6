//! Image cache service: the single entry point for artwork bytes.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      ImageCache::get_image                       │
//! │  1. Snapshot settings     3. Build CacheKey                      │
//! │  2. Source mtime          4. DiskCache::get (generate on miss)   │
//! └─────────────────────────────────────────────────────────────────┘
//!            │                          │
//!            ▼                          ▼
//!    ┌───────────────┐       ┌─────────────────────┐
//!    │ ArtworkSource │       │  ArtworkGenerator   │
//!    └───────────────┘       │  original (size 0,  │
//!                            │  cached) → resize   │
//!                            └─────────────────────┘
//! ```
//!
//! Size 0 requests the original artwork. It is stored in the same cache under
//! its own key, and resized generations read the original through that entry.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::RwLock;
use tracing::{debug, trace, warn};

use super::resize::{content_type_of, ResizeOutcome, ResizePipeline};
use super::source::{ArtworkId, ArtworkSource};
use crate::cache::{
    CacheKey, CacheStats, DiskCache, DiskCacheConfig, Generated, Generator, Origin, ORIGINAL_SIZE,
};
use crate::config::ImageSettings;
use crate::error::{ArtworkError, ResizeError, SourceError};

// =============================================================================
// Generator
// =============================================================================

/// Deferred read of the original artwork bytes, only polled on a cache miss.
pub type OriginalFetch = Pin<Box<dyn Future<Output = Result<Bytes, ArtworkError>> + Send>>;

/// Input for one artwork generation.
pub struct ArtworkJob {
    pub artwork: ArtworkId,
    /// Target size (0 = original)
    pub size: u32,
    /// JPEG quality from the settings snapshot the key was built with
    pub quality: u8,
    pub original: OriginalFetch,
}

/// Cache generator that produces originals and resized renditions.
#[derive(Debug, Clone, Default)]
pub struct ArtworkGenerator {
    pipeline: ResizePipeline,
}

#[async_trait]
impl Generator for ArtworkGenerator {
    type Input = ArtworkJob;
    type Error = ArtworkError;

    async fn generate(&self, job: ArtworkJob) -> Result<Generated, ArtworkError> {
        // Unreadable originals are fatal: there is nothing to fall back to
        let original = job.original.await?;

        if job.size == ORIGINAL_SIZE {
            return Ok(Generated::new(original));
        }

        let pipeline = self.pipeline.clone();
        let fallback = original.clone();
        let (size, quality) = (job.size, job.quality);
        let outcome = tokio::task::spawn_blocking(move || {
            pipeline.resize_or_passthrough(original, size, quality)
        })
        .await
        .unwrap_or_else(|e| ResizeOutcome::Passthrough {
            data: fallback,
            reason: ResizeError::Encode {
                message: e.to_string(),
            },
        });

        match outcome {
            ResizeOutcome::Resized(resized) => {
                trace!(
                    artwork = %job.artwork,
                    original = resized.original_dimension,
                    resized = size,
                    "Resized artwork"
                );
                Ok(Generated::new(resized.data).with_label(format!("{}@{}", job.artwork, size)))
            }
            ResizeOutcome::Passthrough { data, reason } => {
                warn!(
                    artwork = %job.artwork,
                    size,
                    error = %reason,
                    "Could not resize image, returning it as is"
                );
                Ok(Generated::new(data))
            }
        }
    }
}

// =============================================================================
// Image Cache
// =============================================================================

/// How the bytes of an [`ArtworkImage`] relate to the original artwork.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageVariant {
    /// Unmodified original (size 0 was requested)
    Original,
    /// Resized rendition, labelled `<artwork>@<size>`
    Resized { label: String },
    /// Resizing failed and the original bytes were served instead
    Passthrough,
}

/// Image bytes returned by [`ImageCache::get_image`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtworkImage {
    pub data: Bytes,
    /// MIME type sniffed from the bytes, if recognized
    pub content_type: Option<&'static str>,
    pub variant: ImageVariant,
    pub origin: Origin,
}

impl ArtworkImage {
    pub fn is_cache_hit(&self) -> bool {
        self.origin == Origin::Hit
    }
}

/// Disk-cached access to original and resized artwork.
///
/// Construct one per cache directory at startup and share it by reference;
/// every `get_image` call reads a snapshot of the current [`ImageSettings`].
pub struct ImageCache<S: ArtworkSource> {
    source: Arc<S>,
    cache: DiskCache<ArtworkGenerator>,
    settings: RwLock<ImageSettings>,
}

impl<S: ArtworkSource> ImageCache<S> {
    /// Open the cache directory and wire it to `source`.
    pub async fn open(
        source: S,
        config: DiskCacheConfig,
        settings: ImageSettings,
    ) -> Result<Self, ArtworkError> {
        let cache = DiskCache::open(config, ArtworkGenerator::default()).await?;
        Ok(Self {
            source: Arc::new(source),
            cache,
            settings: RwLock::new(settings),
        })
    }

    /// Get artwork at `size` pixels on its longer side (0 = original).
    ///
    /// # Errors
    ///
    /// Returns [`ArtworkError::SourceUnavailable`] when the original cannot be
    /// read. Resize failures are not errors: the original bytes are returned
    /// with [`ImageVariant::Passthrough`].
    pub async fn get_image(
        &self,
        artwork: &ArtworkId,
        size: u32,
    ) -> Result<ArtworkImage, ArtworkError> {
        let settings = *self.settings.read().await;

        let last_modified = self
            .source
            .last_modified(artwork)
            .await
            .map_err(|e| unavailable(artwork, e))?;

        let key = CacheKey::new(
            artwork,
            size,
            last_modified,
            settings.jpeg_quality,
            settings.cover_art_enabled,
        );

        let original: OriginalFetch = if size == ORIGINAL_SIZE {
            Box::pin(read_original(self.source.clone(), artwork.clone()))
        } else {
            Box::pin(cached_original(
                self.source.clone(),
                self.cache.clone(),
                artwork.clone(),
                last_modified,
                settings,
            ))
        };

        let job = ArtworkJob {
            artwork: artwork.clone(),
            size,
            quality: settings.jpeg_quality,
            original,
        };

        let lookup = self.cache.get(&key.fingerprint(), job).await?;
        debug!(artwork = %artwork, size, origin = ?lookup.origin, "Serving artwork");

        let variant = match (size, lookup.label) {
            (ORIGINAL_SIZE, _) => ImageVariant::Original,
            (_, Some(label)) => ImageVariant::Resized { label },
            (_, None) => ImageVariant::Passthrough,
        };

        Ok(ArtworkImage {
            content_type: content_type_of(&lookup.data),
            data: lookup.data,
            variant,
            origin: lookup.origin,
        })
    }

    /// Current settings snapshot.
    pub async fn settings(&self) -> ImageSettings {
        *self.settings.read().await
    }

    /// Replace the settings used by subsequent requests.
    ///
    /// Entries built with the old settings are no longer addressed and age
    /// out through eviction.
    pub async fn update_settings(&self, settings: ImageSettings) {
        *self.settings.write().await = settings;
    }

    /// Occupancy of the underlying disk cache.
    pub async fn stats(&self) -> CacheStats {
        self.cache.stats().await
    }

    /// The artwork source.
    pub fn source(&self) -> &Arc<S> {
        &self.source
    }
}

fn unavailable(artwork: &ArtworkId, source: SourceError) -> ArtworkError {
    ArtworkError::SourceUnavailable {
        artwork: artwork.to_string(),
        source,
    }
}

/// Read the original straight from the source.
async fn read_original<S: ArtworkSource>(
    source: Arc<S>,
    artwork: ArtworkId,
) -> Result<Bytes, ArtworkError> {
    let reader = source
        .reader(&artwork)
        .await
        .map_err(|e| unavailable(&artwork, e))?;
    reader.read_all().await.map_err(|e| unavailable(&artwork, e))
}

/// Read the original through its size-0 cache entry.
async fn cached_original<S: ArtworkSource>(
    source: Arc<S>,
    cache: DiskCache<ArtworkGenerator>,
    artwork: ArtworkId,
    last_modified: SystemTime,
    settings: ImageSettings,
) -> Result<Bytes, ArtworkError> {
    let key = CacheKey::new(
        &artwork,
        ORIGINAL_SIZE,
        last_modified,
        settings.jpeg_quality,
        settings.cover_art_enabled,
    );
    let job = ArtworkJob {
        artwork: artwork.clone(),
        size: ORIGINAL_SIZE,
        quality: settings.jpeg_quality,
        original: Box::pin(read_original(source, artwork)),
    };
    let lookup = cache.get(&key.fingerprint(), job).await?;
    Ok(lookup.data)
}
