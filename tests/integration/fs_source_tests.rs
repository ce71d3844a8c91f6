//! End-to-end tests over artwork files on disk.

use std::fs::File;
use std::path::Path;

use tempfile::TempDir;

use artwork_cache::artwork::{ArtworkId, FsArtworkSource, ImageVariant};
use artwork_cache::cache::Origin;
use artwork_cache::error::{ArtworkError, SourceError};

use super::test_utils::{at, dimensions, jpeg, open_cache, png};

fn write_artwork(root: &Path, id: &str, data: &[u8], modified_ms: u64) {
    let path = root.join(id);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, data).unwrap();
    File::options()
        .write(true)
        .open(&path)
        .unwrap()
        .set_modified(at(modified_ms))
        .unwrap();
}

#[tokio::test]
async fn test_file_artwork_is_resized_and_cached() {
    let artwork = TempDir::new().unwrap();
    let cache = TempDir::new().unwrap();
    write_artwork(artwork.path(), "albums/a/cover.jpg", &jpeg(640, 480), 1_000);

    let images = open_cache(FsArtworkSource::new(artwork.path()), cache.path()).await;
    let id = ArtworkId::from("albums/a/cover.jpg");

    let first = images.get_image(&id, 320).await.unwrap();
    assert_eq!(dimensions(&first.data), (320, 240));
    assert_eq!(
        first.variant,
        ImageVariant::Resized {
            label: "albums/a/cover.jpg@320".to_string()
        }
    );

    let second = images.get_image(&id, 320).await.unwrap();
    assert_eq!(second.origin, Origin::Hit);
    assert_eq!(second.data, first.data);
}

#[tokio::test]
async fn test_rewritten_file_is_picked_up() {
    let artwork = TempDir::new().unwrap();
    let cache = TempDir::new().unwrap();
    write_artwork(artwork.path(), "cover.png", &png(300, 100), 1_000);

    let images = open_cache(FsArtworkSource::new(artwork.path()), cache.path()).await;
    let id = ArtworkId::from("cover.png");

    let before = images.get_image(&id, 60).await.unwrap();
    assert_eq!(dimensions(&before.data), (60, 20));

    write_artwork(artwork.path(), "cover.png", &png(100, 300), 1_000 + 60_000);

    let after = images.get_image(&id, 60).await.unwrap();
    assert_eq!(after.origin, Origin::Generated);
    assert_eq!(dimensions(&after.data), (20, 60));
}

#[tokio::test]
async fn test_original_file_bytes_are_returned_unchanged() {
    let artwork = TempDir::new().unwrap();
    let cache = TempDir::new().unwrap();
    let original = jpeg(120, 90);
    write_artwork(artwork.path(), "front.jpg", &original, 5_000);

    let images = open_cache(FsArtworkSource::new(artwork.path()), cache.path()).await;
    let image = images
        .get_image(&ArtworkId::from("front.jpg"), 0)
        .await
        .unwrap();

    assert_eq!(&image.data[..], &original[..]);
    assert_eq!(image.variant, ImageVariant::Original);
}

#[tokio::test]
async fn test_escaping_id_is_rejected() {
    let artwork = TempDir::new().unwrap();
    let cache = TempDir::new().unwrap();
    let images = open_cache(FsArtworkSource::new(artwork.path()), cache.path()).await;

    let result = images
        .get_image(&ArtworkId::from("../outside.jpg"), 100)
        .await;
    assert!(matches!(
        result,
        Err(ArtworkError::SourceUnavailable {
            source: SourceError::InvalidId(_),
            ..
        })
    ));
}

#[tokio::test]
async fn test_missing_file_then_created() {
    let artwork = TempDir::new().unwrap();
    let cache = TempDir::new().unwrap();
    let images = open_cache(FsArtworkSource::new(artwork.path()), cache.path()).await;
    let id = ArtworkId::from("late.jpg");

    assert!(images.get_image(&id, 50).await.is_err());

    write_artwork(artwork.path(), "late.jpg", &jpeg(100, 100), 9_000);

    let image = images.get_image(&id, 50).await.unwrap();
    assert_eq!(dimensions(&image.data), (50, 50));
}
