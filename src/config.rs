//! Configuration management for the artwork cache.
//!
//! This module provides:
//! - Command-line arguments via clap
//! - Environment variables with `ARTCACHE_` prefix
//! - Sensible defaults for all optional settings
//!
//! # Environment Variables
//!
//! - `ARTCACHE_ARTWORK_ROOT` - Directory holding original artwork (required)
//! - `ARTCACHE_CACHE_DIR` - Image cache directory (default: cache/images)
//! - `ARTCACHE_CACHE_SIZE` - Cache capacity, e.g. `100MB` (default: 100MB)
//! - `ARTCACHE_CACHE_MAX_ITEMS` - Maximum cached images (default: 200000)
//! - `ARTCACHE_JPEG_QUALITY` - JPEG quality for resized artwork (default: 75)
//! - `ARTCACHE_COVER_ART_ENABLED` - Cover-art toggle folded into cache keys (default: true)

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::artwork::{DEFAULT_JPEG_QUALITY, MAX_JPEG_QUALITY, MIN_JPEG_QUALITY};
use crate::cache::{DiskCacheConfig, DEFAULT_MAX_ENTRIES};

// =============================================================================
// Default Values
// =============================================================================

/// Default image cache directory.
pub const DEFAULT_CACHE_DIR: &str = "cache/images";

/// Default image cache size.
pub const DEFAULT_CACHE_SIZE: &str = "100MB";

/// Name of the image cache in log output.
pub const IMAGE_CACHE_NAME: &str = "image";

// =============================================================================
// Runtime Settings
// =============================================================================

/// Settings that change encoded output and therefore take part in cache keys.
///
/// Read as a snapshot once per request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageSettings {
    /// JPEG quality for resized artwork (1-100)
    pub jpeg_quality: u8,

    /// Cover-art toggle. Only part of cache keys: flipping it makes every
    /// cached image miss once.
    pub cover_art_enabled: bool,
}

impl Default for ImageSettings {
    fn default() -> Self {
        Self {
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            cover_art_enabled: true,
        }
    }
}

// =============================================================================
// CLI Arguments
// =============================================================================

/// artcache - disk-cached artwork resizing.
#[derive(Parser, Debug, Clone)]
#[command(name = "artcache")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub config: Config,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Fetch an image, resizing and caching it on first use.
    Get {
        /// Artwork id (path relative to the artwork root)
        id: String,

        /// Longest side in pixels; 0 returns the original
        #[arg(short, long, default_value_t = 0)]
        size: u32,

        /// Write the image here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print cache occupancy.
    Stats,
}

/// Settings shared by all commands.
#[derive(Args, Debug, Clone)]
pub struct Config {
    // =========================================================================
    // Source Configuration
    // =========================================================================
    /// Directory holding the original artwork files.
    #[arg(long, env = "ARTCACHE_ARTWORK_ROOT")]
    pub artwork_root: PathBuf,

    // =========================================================================
    // Cache Configuration
    // =========================================================================
    /// Directory for cached images.
    #[arg(long, default_value = DEFAULT_CACHE_DIR, env = "ARTCACHE_CACHE_DIR")]
    pub cache_dir: PathBuf,

    /// Maximum total size of cached images (e.g. 500KB, 100MB, 1GiB).
    #[arg(long, default_value = DEFAULT_CACHE_SIZE, env = "ARTCACHE_CACHE_SIZE")]
    pub cache_size: String,

    /// Maximum number of cached images.
    #[arg(long, default_value_t = DEFAULT_MAX_ENTRIES, env = "ARTCACHE_CACHE_MAX_ITEMS")]
    pub cache_max_items: usize,

    // =========================================================================
    // Encoding Configuration
    // =========================================================================
    /// JPEG quality for resized artwork (1-100).
    #[arg(long, default_value_t = DEFAULT_JPEG_QUALITY, env = "ARTCACHE_JPEG_QUALITY")]
    pub jpeg_quality: u8,

    /// Cover-art toggle; changing it invalidates all cached images.
    #[arg(
        long,
        default_value_t = true,
        action = clap::ArgAction::Set,
        env = "ARTCACHE_COVER_ART_ENABLED"
    )]
    pub cover_art_enabled: bool,

    // =========================================================================
    // Logging Configuration
    // =========================================================================
    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl Config {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        let capacity = parse_byte_size(&self.cache_size)?;
        if capacity == 0 {
            return Err("cache_size must be greater than 0".to_string());
        }

        if self.cache_max_items == 0 {
            return Err("cache_max_items must be greater than 0".to_string());
        }

        if !(MIN_JPEG_QUALITY..=MAX_JPEG_QUALITY).contains(&self.jpeg_quality) {
            return Err("jpeg_quality must be between 1 and 100".to_string());
        }

        if self.artwork_root.as_os_str().is_empty() {
            return Err(
                "Artwork root is required. Set --artwork-root or ARTCACHE_ARTWORK_ROOT"
                    .to_string(),
            );
        }

        Ok(())
    }

    /// Settings snapshot for the image cache.
    pub fn image_settings(&self) -> ImageSettings {
        ImageSettings {
            jpeg_quality: self.jpeg_quality,
            cover_art_enabled: self.cover_art_enabled,
        }
    }

    /// Disk cache location and bounds (call `validate()` first).
    pub fn disk_cache_config(&self) -> Result<DiskCacheConfig, String> {
        Ok(DiskCacheConfig::new(IMAGE_CACHE_NAME, &self.cache_dir)
            .with_capacity(parse_byte_size(&self.cache_size)?)
            .with_max_entries(self.cache_max_items))
    }
}

/// Parse a human-readable byte size.
///
/// Accepts a plain number of bytes or a number followed by `B`, `KB`, `MB`,
/// `GB` or `TB` (case-insensitive, optional `i`, optional whitespace). Units
/// are 1024-based.
pub fn parse_byte_size(input: &str) -> Result<u64, String> {
    let trimmed = input.trim();
    let split = trimmed
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(trimmed.len());
    let (digits, unit) = trimmed.split_at(split);

    if digits.is_empty() {
        return Err(format!("Invalid size '{}': missing number", input));
    }
    let value: u64 = digits
        .parse()
        .map_err(|_| format!("Invalid size '{}': number too large", input))?;

    let multiplier: u64 = match unit.trim().to_ascii_uppercase().as_str() {
        "" | "B" => 1,
        "K" | "KB" | "KIB" => 1024,
        "M" | "MB" | "MIB" => 1024 * 1024,
        "G" | "GB" | "GIB" => 1024 * 1024 * 1024,
        "T" | "TB" | "TIB" => 1024 * 1024 * 1024 * 1024,
        other => return Err(format!("Invalid size '{}': unknown unit '{}'", input, other)),
    };

    value
        .checked_mul(multiplier)
        .ok_or_else(|| format!("Invalid size '{}': too large", input))
}

// =============================================================================
// Tests
// =============================================================================
