//! Aspect-preserving artwork resizing.
//!
//! # Pipeline
//!
//! 1. Sniff the output family from the leading bytes (PNG stays PNG, anything
//!    else becomes JPEG)
//! 2. Decode the full image
//! 3. Fix the longer side to the target size and scale the other side
//! 4. Resample with Lanczos3
//! 5. Encode as PNG, or as JPEG at the configured quality
//!
//! Any failure in steps 2-5 is recoverable: [`ResizePipeline::resize_or_passthrough`]
//! returns the original bytes untouched along with the reason.

use std::io::Cursor;

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, ImageReader};

use crate::error::ResizeError;

/// Number of leading bytes inspected to pick the output format.
pub const SNIFF_LEN: usize = 512;

/// Largest output, in pixels, the pipeline will allocate.
pub const MAX_OUTPUT_PIXELS: u64 = 64 * 1024 * 1024;

/// Default JPEG quality (1-100).
pub const DEFAULT_JPEG_QUALITY: u8 = 75;

/// Minimum allowed JPEG quality.
pub const MIN_JPEG_QUALITY: u8 = 1;

/// Maximum allowed JPEG quality.
pub const MAX_JPEG_QUALITY: u8 = 100;

/// Clamp quality to the valid range.
#[inline]
pub fn clamp_quality(quality: u8) -> u8 {
    quality.clamp(MIN_JPEG_QUALITY, MAX_JPEG_QUALITY)
}

// =============================================================================
// Formats
// =============================================================================

/// Encoding family of resized output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Png,
    Jpeg,
}

impl OutputFormat {
    /// Pick the output family from the leading bytes of an image.
    pub fn sniff(data: &[u8]) -> Self {
        let head = &data[..data.len().min(SNIFF_LEN)];
        match image::guess_format(head) {
            Ok(ImageFormat::Png) => OutputFormat::Png,
            _ => OutputFormat::Jpeg,
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            OutputFormat::Png => "image/png",
            OutputFormat::Jpeg => "image/jpeg",
        }
    }
}

/// MIME type of encoded image bytes, if recognized.
pub fn content_type_of(data: &[u8]) -> Option<&'static str> {
    let head = &data[..data.len().min(SNIFF_LEN)];
    match image::guess_format(head).ok()? {
        ImageFormat::Png => Some("image/png"),
        ImageFormat::Jpeg => Some("image/jpeg"),
        ImageFormat::Gif => Some("image/gif"),
        ImageFormat::WebP => Some("image/webp"),
        ImageFormat::Bmp => Some("image/bmp"),
        _ => None,
    }
}

/// Output dimensions for fitting `width`x`height` to `size` on its longer side.
///
/// Landscape images get width `size`; portrait and square images get height
/// `size`. The other side is rounded and never below 1.
pub fn target_dimensions(width: u32, height: u32, size: u32) -> (u32, u32) {
    if width > height {
        (size, scale_side(height, width, size))
    } else {
        (scale_side(width, height, size), size)
    }
}

fn scale_side(side: u32, longest: u32, size: u32) -> u32 {
    if longest == 0 {
        return size.max(1);
    }
    let scaled = (side as u64 * size as u64 + longest as u64 / 2) / longest as u64;
    scaled.clamp(1, u32::MAX as u64) as u32
}

// =============================================================================
// Pipeline
// =============================================================================

/// A successfully resized image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resized {
    pub data: Bytes,
    pub format: OutputFormat,
    pub width: u32,
    pub height: u32,
    /// Larger of the original width and height
    pub original_dimension: u32,
}

/// Result of [`ResizePipeline::resize_or_passthrough`].
#[derive(Debug, Clone)]
pub enum ResizeOutcome {
    Resized(Resized),
    /// Original bytes returned unchanged because resizing failed
    Passthrough { data: Bytes, reason: ResizeError },
}

impl ResizeOutcome {
    pub fn data(&self) -> &Bytes {
        match self {
            ResizeOutcome::Resized(resized) => &resized.data,
            ResizeOutcome::Passthrough { data, .. } => data,
        }
    }

    pub fn is_resized(&self) -> bool {
        matches!(self, ResizeOutcome::Resized(_))
    }
}

/// Decodes, resamples and re-encodes artwork.
#[derive(Debug, Clone)]
pub struct ResizePipeline {
    filter: FilterType,
}

impl Default for ResizePipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl ResizePipeline {
    /// Create a pipeline using the Lanczos3 filter.
    pub fn new() -> Self {
        Self {
            filter: FilterType::Lanczos3,
        }
    }

    /// Resize `original` so its longer side is `size` pixels.
    ///
    /// # Errors
    ///
    /// - [`ResizeError::InvalidSize`] if `size` is 0
    /// - [`ResizeError::Decode`] if `original` is not a supported image
    /// - [`ResizeError::TooLarge`] if the output exceeds [`MAX_OUTPUT_PIXELS`]
    /// - [`ResizeError::Encode`] if the output cannot be encoded
    pub fn resize(&self, original: &[u8], size: u32, quality: u8) -> Result<Resized, ResizeError> {
        if size == 0 {
            return Err(ResizeError::InvalidSize);
        }

        let format = OutputFormat::sniff(original);

        let img = ImageReader::new(Cursor::new(original))
            .with_guessed_format()
            .map_err(|e| ResizeError::Decode {
                message: e.to_string(),
            })?
            .decode()
            .map_err(|e| ResizeError::Decode {
                message: e.to_string(),
            })?;

        let (width, height) = (img.width(), img.height());
        let (target_width, target_height) = target_dimensions(width, height, size);
        if target_width as u64 * target_height as u64 > MAX_OUTPUT_PIXELS {
            return Err(ResizeError::TooLarge {
                width: target_width,
                height: target_height,
            });
        }
        let resized = img.resize_exact(target_width, target_height, self.filter);

        let data = encode(&resized, format, quality)?;

        Ok(Resized {
            data: Bytes::from(data),
            format,
            width: target_width,
            height: target_height,
            original_dimension: width.max(height),
        })
    }

    /// Resize, or hand back `original` unchanged if any stage fails.
    pub fn resize_or_passthrough(&self, original: Bytes, size: u32, quality: u8) -> ResizeOutcome {
        match self.resize(&original, size, quality) {
            Ok(resized) => ResizeOutcome::Resized(resized),
            Err(reason) => ResizeOutcome::Passthrough {
                data: original,
                reason,
            },
        }
    }
}

fn encode(img: &DynamicImage, format: OutputFormat, quality: u8) -> Result<Vec<u8>, ResizeError> {
    let encode_error = |e: image::ImageError| ResizeError::Encode {
        message: e.to_string(),
    };

    match format {
        OutputFormat::Png => {
            let mut output = Cursor::new(Vec::new());
            img.write_to(&mut output, ImageFormat::Png)
                .map_err(encode_error)?;
            Ok(output.into_inner())
        }
        OutputFormat::Jpeg => {
            // JPEG has no alpha channel
            let rgb = img.to_rgb8();
            let mut output = Vec::new();
            JpegEncoder::new_with_quality(&mut output, clamp_quality(quality))
                .encode_image(&rgb)
                .map_err(encode_error)?;
            Ok(output)
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
