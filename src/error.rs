use thiserror::Error;

/// Errors raised by an artwork source when the original bytes cannot be read.
#[derive(Debug, Clone, Error)]
pub enum SourceError {
    /// No artwork exists for the identifier
    #[error("Artwork not found: {0}")]
    NotFound(String),

    /// Identifier cannot be mapped to a location (e.g. escapes the source root)
    #[error("Invalid artwork id: {0}")]
    InvalidId(String),

    /// Underlying read failed
    #[error("I/O error: {0}")]
    Io(String),
}

/// Errors from the decode/resample/encode stages of the resize pipeline.
///
/// These never reach the end consumer: the pipeline degrades to the original
/// bytes instead.
#[derive(Debug, Clone, Error)]
pub enum ResizeError {
    /// Target size of zero cannot be resized to
    #[error("Invalid target size: must be greater than 0")]
    InvalidSize,

    /// Output would exceed the pixel limit
    #[error("Output of {width}x{height} exceeds the pixel limit")]
    TooLarge { width: u32, height: u32 },

    /// Source bytes are not a decodable image
    #[error("Failed to decode image: {message}")]
    Decode { message: String },

    /// Resampled image could not be encoded
    #[error("Failed to encode image: {message}")]
    Encode { message: String },
}

/// Errors returned by the disk-backed keyed cache.
///
/// `E` is the error type of the cache's generator. Every waiter of a
/// generation receives its own clone of the outcome.
#[derive(Debug, Clone, Error)]
pub enum CacheError<E> {
    /// Cache directory could not be prepared or scanned
    #[error("Storage error at {path}: {message}")]
    Storage { path: String, message: String },

    /// The generator failed; nothing was stored
    #[error("Generation failed: {0}")]
    Generation(E),

    /// The generation task ended without publishing a result
    #[error("Generation aborted before completion")]
    Aborted,
}

/// Errors surfaced by [`ImageCache::get_image`](crate::artwork::ImageCache::get_image).
#[derive(Debug, Clone, Error)]
pub enum ArtworkError {
    /// Original artwork could not be read; there is nothing to fall back to
    #[error("Artwork {artwork} unavailable: {source}")]
    SourceUnavailable {
        artwork: String,
        #[source]
        source: SourceError,
    },

    /// Cache storage could not be used
    #[error("Storage error at {path}: {message}")]
    Storage { path: String, message: String },

    /// Generation ended without a result
    #[error("Image generation aborted")]
    Aborted,
}

impl From<CacheError<ArtworkError>> for ArtworkError {
    fn from(err: CacheError<ArtworkError>) -> Self {
        match err {
            CacheError::Storage { path, message } => ArtworkError::Storage { path, message },
            CacheError::Generation(inner) => inner,
            CacheError::Aborted => ArtworkError::Aborted,
        }
    }
}
