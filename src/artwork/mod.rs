//! Artwork layer.
//!
//! - [`ArtworkSource`]: where original artwork bytes come from
//! - [`ResizePipeline`]: aspect-preserving resize with passthrough on failure
//! - [`ImageCache`]: wires sources, keys, the resize pipeline and the disk
//!   cache into `get_image(artwork, size)`
//!
//! # Example
//!
//! ```no_run
//! use artwork_cache::artwork::{ArtworkId, FsArtworkSource, ImageCache};
//! use artwork_cache::cache::DiskCacheConfig;
//! use artwork_cache::config::ImageSettings;
//!
//! #[tokio::main]
//! async fn main() {
//!     let source = FsArtworkSource::new("/srv/music/covers");
//!     let config = DiskCacheConfig::new("image", "/var/cache/artwork");
//!     let images = ImageCache::open(source, config, ImageSettings::default())
//!         .await
//!         .unwrap();
//!
//!     let thumb = images
//!         .get_image(&ArtworkId::from("album/cover.jpg"), 300)
//!         .await
//!         .unwrap();
//!     println!("{} bytes, {:?}", thumb.data.len(), thumb.variant);
//! }
//! ```

mod resize;
mod service;
mod source;

pub use resize::{
    clamp_quality, content_type_of, target_dimensions, OutputFormat, ResizeOutcome,
    ResizePipeline, Resized, DEFAULT_JPEG_QUALITY, MAX_JPEG_QUALITY, MAX_OUTPUT_PIXELS,
    MIN_JPEG_QUALITY,
};
pub use service::{
    ArtworkGenerator, ArtworkImage, ArtworkJob, ImageCache, ImageVariant, OriginalFetch,
};
pub use source::{ArtworkId, ArtworkReader, ArtworkSource, FsArtworkSource};
