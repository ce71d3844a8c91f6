//! artcache - fetch artwork through the disk-backed image cache.

use std::process::ExitCode;

use clap::Parser;
use tokio::io::AsyncWriteExt;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use artwork_cache::{ArtworkId, Cli, Command, Config, FsArtworkSource, ImageCache};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(cli.config.verbose);

    if let Err(e) = cli.config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    let images = match open_image_cache(&cli.config).await {
        Ok(images) => images,
        Err(e) => {
            error!("Failed to open image cache: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match cli.command {
        Command::Get { id, size, output } => run_get(&images, id, size, output).await,
        Command::Stats => run_stats(&images).await,
    }
}

async fn open_image_cache(config: &Config) -> Result<ImageCache<FsArtworkSource>, String> {
    let disk = config.disk_cache_config()?;

    info!("Configuration:");
    info!("  Artwork root: {}", config.artwork_root.display());
    info!("  Cache dir: {}", disk.dir.display());
    info!(
        "  Cache: {}MB, {} items max",
        disk.capacity / (1024 * 1024),
        disk.max_entries
    );
    info!(
        "  JPEG quality: {}, cover art: {}",
        config.jpeg_quality, config.cover_art_enabled
    );

    let source = FsArtworkSource::new(&config.artwork_root);
    ImageCache::open(source, disk, config.image_settings())
        .await
        .map_err(|e| e.to_string())
}

// =============================================================================
// Get Command
// =============================================================================

async fn run_get(
    images: &ImageCache<FsArtworkSource>,
    id: String,
    size: u32,
    output: Option<std::path::PathBuf>,
) -> ExitCode {
    let artwork = ArtworkId::from(id);

    let image = match images.get_image(&artwork, size).await {
        Ok(image) => image,
        Err(e) => {
            error!("Failed to get artwork {}: {}", artwork, e);
            return ExitCode::FAILURE;
        }
    };

    info!(
        "Artwork {} at size {}: {} bytes, {:?}, {}, origin {:?}",
        artwork,
        size,
        image.data.len(),
        image.variant,
        image.content_type.unwrap_or("unknown type"),
        image.origin
    );

    let written = match output {
        Some(path) => tokio::fs::write(&path, &image.data).await,
        None => {
            let mut stdout = tokio::io::stdout();
            match stdout.write_all(&image.data).await {
                Ok(()) => stdout.flush().await,
                Err(e) => Err(e),
            }
        }
    };

    if let Err(e) = written {
        error!("Failed to write image: {}", e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

// =============================================================================
// Stats Command
// =============================================================================

async fn run_stats(images: &ImageCache<FsArtworkSource>) -> ExitCode {
    let stats = images.stats().await;
    println!(
        "entries: {}/{}\nsize: {}/{} bytes",
        stats.entries, stats.max_entries, stats.size, stats.capacity
    );
    ExitCode::SUCCESS
}

// =============================================================================
// Logging
// =============================================================================

fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "artwork_cache=debug,artcache=debug"
    } else {
        "artwork_cache=info,artcache=info"
    };

    // Logs go to stderr so image bytes on stdout stay clean
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
