//! Original artwork sources.
//!
//! The cache never resolves artwork itself. It asks an [`ArtworkSource`] for
//! the modification time of the original (to build cache keys) and, on a miss,
//! for the original bytes.

use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::SourceError;

// =============================================================================
// Artwork Identity
// =============================================================================

/// Stable identifier of a piece of artwork.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArtworkId(Arc<str>);

impl ArtworkId {
    pub fn new(id: impl Into<Arc<str>>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArtworkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ArtworkId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ArtworkId {
    fn from(id: String) -> Self {
        Self::new(id)
    }
}

impl From<&ArtworkId> for Arc<str> {
    fn from(id: &ArtworkId) -> Self {
        id.0.clone()
    }
}

// =============================================================================
// ArtworkSource Trait
// =============================================================================

/// An open original artwork.
pub struct ArtworkReader {
    /// Byte stream of the original image
    pub stream: Pin<Box<dyn AsyncRead + Send>>,

    /// When the original was last modified
    pub last_modified: SystemTime,
}

impl ArtworkReader {
    pub fn new(stream: impl AsyncRead + Send + 'static, last_modified: SystemTime) -> Self {
        Self {
            stream: Box::pin(stream),
            last_modified,
        }
    }

    /// Drain the stream into memory.
    ///
    /// The stream is consumed to the end and closed when this returns, on
    /// success and on error alike.
    pub async fn read_all(mut self) -> Result<Bytes, SourceError> {
        let mut buf = Vec::new();
        self.stream
            .read_to_end(&mut buf)
            .await
            .map_err(|e| SourceError::Io(e.to_string()))?;
        Ok(Bytes::from(buf))
    }
}

/// Resolves artwork identities to original image bytes.
///
/// Implementations must tolerate concurrent calls for the same identity.
#[async_trait]
pub trait ArtworkSource: Send + Sync + 'static {
    /// Open the original artwork.
    async fn reader(&self, artwork: &ArtworkId) -> Result<ArtworkReader, SourceError>;

    /// Modification time of the original artwork.
    ///
    /// The default opens a reader and drops it; override when the time is
    /// available without opening the content.
    async fn last_modified(&self, artwork: &ArtworkId) -> Result<SystemTime, SourceError> {
        Ok(self.reader(artwork).await?.last_modified)
    }
}

// =============================================================================
// Filesystem Source
// =============================================================================

/// Serves artwork from files below a root directory.
///
/// The artwork id is the file path relative to the root. Absolute paths and
/// ids containing `..` are rejected.
#[derive(Debug, Clone)]
pub struct FsArtworkSource {
    root: PathBuf,
}

impl FsArtworkSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, artwork: &ArtworkId) -> Result<PathBuf, SourceError> {
        let relative = Path::new(artwork.as_str());
        let is_safe = !artwork.as_str().is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        if !is_safe {
            return Err(SourceError::InvalidId(artwork.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

fn map_io_error(artwork: &ArtworkId, err: std::io::Error) -> SourceError {
    match err.kind() {
        std::io::ErrorKind::NotFound => SourceError::NotFound(artwork.to_string()),
        _ => SourceError::Io(err.to_string()),
    }
}

#[async_trait]
impl ArtworkSource for FsArtworkSource {
    async fn reader(&self, artwork: &ArtworkId) -> Result<ArtworkReader, SourceError> {
        let path = self.resolve(artwork)?;
        let file = File::open(&path)
            .await
            .map_err(|e| map_io_error(artwork, e))?;
        let meta = file.metadata().await.map_err(|e| map_io_error(artwork, e))?;
        let last_modified = meta
            .modified()
            .map_err(|e| SourceError::Io(e.to_string()))?;
        Ok(ArtworkReader::new(file, last_modified))
    }

    async fn last_modified(&self, artwork: &ArtworkId) -> Result<SystemTime, SourceError> {
        let path = self.resolve(artwork)?;
        let meta = tokio::fs::metadata(&path)
            .await
            .map_err(|e| map_io_error(artwork, e))?;
        if !meta.is_file() {
            return Err(SourceError::NotFound(artwork.to_string()));
        }
        meta.modified().map_err(|e| SourceError::Io(e.to_string()))
    }
}
