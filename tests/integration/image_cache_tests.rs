//! Image cache behavior tests.

use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use artwork_cache::artwork::{ArtworkId, ImageCache, ImageVariant};
use artwork_cache::cache::{DiskCacheConfig, Origin};
use artwork_cache::config::ImageSettings;
use artwork_cache::error::{ArtworkError, SourceError};

use super::test_utils::{dimensions, jpeg, open_cache, png, MockArtworkSource};

// =============================================================================
// Retrieval
// =============================================================================

#[tokio::test]
async fn test_original_size_returns_source_bytes() {
    let dir = TempDir::new().unwrap();
    let original = jpeg(64, 48);
    let source = MockArtworkSource::new().with_artwork("al-1", original.clone(), 1_000);
    let images = open_cache(source, dir.path()).await;
    let id = ArtworkId::from("al-1");

    let image = images.get_image(&id, 0).await.unwrap();
    assert_eq!(&image.data[..], &original[..]);
    assert_eq!(image.variant, ImageVariant::Original);
    assert_eq!(image.origin, Origin::Generated);
    assert_eq!(image.content_type, Some("image/jpeg"));

    let again = images.get_image(&id, 0).await.unwrap();
    assert!(again.is_cache_hit());
    assert_eq!(again.variant, ImageVariant::Original);
    assert_eq!(again.data, image.data);
    assert_eq!(images.source().read_count(), 1);
}

#[tokio::test]
async fn test_landscape_jpeg_is_resized_by_width() {
    let dir = TempDir::new().unwrap();
    let source = MockArtworkSource::new().with_artwork("al-1", jpeg(800, 400), 1_000);
    let images = open_cache(source, dir.path()).await;

    let image = images.get_image(&ArtworkId::from("al-1"), 200).await.unwrap();
    assert_eq!(dimensions(&image.data), (200, 100));
    assert_eq!(image.content_type, Some("image/jpeg"));
    assert_eq!(
        image.variant,
        ImageVariant::Resized {
            label: "al-1@200".to_string()
        }
    );
    assert_eq!(image.origin, Origin::Generated);
}

#[tokio::test]
async fn test_portrait_png_stays_png() {
    let dir = TempDir::new().unwrap();
    let source = MockArtworkSource::new().with_artwork("ar-7", png(400, 800), 1_000);
    let images = open_cache(source, dir.path()).await;

    let image = images.get_image(&ArtworkId::from("ar-7"), 100).await.unwrap();
    assert_eq!(dimensions(&image.data), (50, 100));
    assert_eq!(image.content_type, Some("image/png"));
}

#[tokio::test]
async fn test_repeat_request_is_served_from_cache() {
    let dir = TempDir::new().unwrap();
    let source = MockArtworkSource::new().with_artwork("al-1", jpeg(300, 300), 1_000);
    let images = open_cache(source, dir.path()).await;
    let id = ArtworkId::from("al-1");

    let first = images.get_image(&id, 150).await.unwrap();
    let second = images.get_image(&id, 150).await.unwrap();

    assert!(!first.is_cache_hit());
    assert!(second.is_cache_hit());
    assert_eq!(first.data, second.data);
    assert_eq!(first.variant, second.variant);
    assert_eq!(images.source().read_count(), 1);
}

#[tokio::test]
async fn test_resized_sizes_share_the_cached_original() {
    let dir = TempDir::new().unwrap();
    let source = MockArtworkSource::new().with_artwork("al-1", jpeg(600, 300), 1_000);
    let images = open_cache(source, dir.path()).await;
    let id = ArtworkId::from("al-1");

    images.get_image(&id, 0).await.unwrap();
    images.get_image(&id, 300).await.unwrap();
    images.get_image(&id, 100).await.unwrap();

    assert_eq!(images.source().read_count(), 1);
    // original + two renditions
    assert_eq!(images.stats().await.entries, 3);
}

// =============================================================================
// Invalidation
// =============================================================================

#[tokio::test]
async fn test_source_modification_regenerates() {
    let dir = TempDir::new().unwrap();
    let source = MockArtworkSource::new().with_artwork("al-1", jpeg(400, 200), 1_000);
    let images = open_cache(source, dir.path()).await;
    let id = ArtworkId::from("al-1");

    let before = images.get_image(&id, 100).await.unwrap();
    assert_eq!(dimensions(&before.data), (100, 50));

    images
        .source()
        .set_artwork("al-1", jpeg(200, 400), 2_000)
        .await;

    let after = images.get_image(&id, 100).await.unwrap();
    assert_eq!(after.origin, Origin::Generated);
    assert_eq!(dimensions(&after.data), (50, 100));
    assert_eq!(images.source().read_count(), 2);
}

#[tokio::test]
async fn test_settings_change_regenerates() {
    let dir = TempDir::new().unwrap();
    let source = MockArtworkSource::new().with_artwork("al-1", jpeg(400, 400), 1_000);
    let images = open_cache(source, dir.path()).await;
    let id = ArtworkId::from("al-1");

    images.get_image(&id, 200).await.unwrap();
    assert!(images.get_image(&id, 200).await.unwrap().is_cache_hit());

    images
        .update_settings(ImageSettings {
            jpeg_quality: 40,
            cover_art_enabled: true,
        })
        .await;
    assert_eq!(images.settings().await.jpeg_quality, 40);
    let requality = images.get_image(&id, 200).await.unwrap();
    assert_eq!(requality.origin, Origin::Generated);

    images
        .update_settings(ImageSettings {
            jpeg_quality: 40,
            cover_art_enabled: false,
        })
        .await;
    let recovered = images.get_image(&id, 200).await.unwrap();
    assert_eq!(recovered.origin, Origin::Generated);
}

// =============================================================================
// Failures
// =============================================================================

#[tokio::test]
async fn test_missing_artwork_is_source_unavailable() {
    let dir = TempDir::new().unwrap();
    let images = open_cache(MockArtworkSource::new(), dir.path()).await;

    let result = images.get_image(&ArtworkId::from("ghost"), 200).await;
    match result {
        Err(ArtworkError::SourceUnavailable { artwork, source }) => {
            assert_eq!(artwork, "ghost");
            assert!(matches!(source, SourceError::NotFound(_)));
        }
        other => panic!("Expected SourceUnavailable, got {:?}", other),
    }
    assert_eq!(images.stats().await.entries, 0);
}

#[tokio::test]
async fn test_read_failure_is_not_cached() {
    let dir = TempDir::new().unwrap();
    let source = MockArtworkSource::new().with_artwork("al-1", jpeg(100, 100), 1_000);
    let images = open_cache(source, dir.path()).await;
    let id = ArtworkId::from("al-1");

    images.source().set_fail_reads(true);
    let failed = images.get_image(&id, 50).await;
    assert!(matches!(
        failed,
        Err(ArtworkError::SourceUnavailable { .. })
    ));
    assert_eq!(images.stats().await.entries, 0);

    images.source().set_fail_reads(false);
    let image = images.get_image(&id, 50).await.unwrap();
    assert_eq!(image.origin, Origin::Generated);
    assert_eq!(dimensions(&image.data), (50, 50));
}

#[tokio::test]
async fn test_undecodable_artwork_passes_through() {
    let dir = TempDir::new().unwrap();
    let garbage = b"definitely not an image".to_vec();
    let source = MockArtworkSource::new().with_artwork("al-1", garbage.clone(), 1_000);
    let images = open_cache(source, dir.path()).await;
    let id = ArtworkId::from("al-1");

    let image = images.get_image(&id, 200).await.unwrap();
    assert_eq!(&image.data[..], &garbage[..]);
    assert_eq!(image.variant, ImageVariant::Passthrough);
    assert_eq!(image.content_type, None);

    // The passthrough is cached and still reported as such
    let again = images.get_image(&id, 200).await.unwrap();
    assert!(again.is_cache_hit());
    assert_eq!(again.variant, ImageVariant::Passthrough);
    assert_eq!(images.source().read_count(), 1);
}

#[tokio::test]
async fn test_huge_target_size_passes_through() {
    let dir = TempDir::new().unwrap();
    let original = jpeg(2, 1);
    let source = MockArtworkSource::new().with_artwork("tiny", original.clone(), 1_000);
    let images = open_cache(source, dir.path()).await;

    let image = images
        .get_image(&ArtworkId::from("tiny"), 200_000)
        .await
        .unwrap();
    assert_eq!(&image.data[..], &original[..]);
    assert_eq!(image.variant, ImageVariant::Passthrough);
}

// =============================================================================
// Concurrency
// =============================================================================

#[tokio::test]
async fn test_concurrent_requests_read_and_resize_once() {
    let dir = TempDir::new().unwrap();
    let source = MockArtworkSource::new()
        .with_artwork("al-1", jpeg(500, 250), 1_000)
        .with_read_delay(Duration::from_millis(50));
    let images = Arc::new(open_cache(source, dir.path()).await);

    let mut handles = Vec::new();
    for _ in 0..10 {
        let images = images.clone();
        handles.push(tokio::spawn(async move {
            images.get_image(&ArtworkId::from("al-1"), 100).await
        }));
    }

    let mut results = Vec::new();
    for handle in handles {
        results.push(handle.await.unwrap().unwrap());
    }

    assert_eq!(images.source().read_count(), 1);
    assert!(results.iter().all(|r| r.data == results[0].data));
    assert_eq!(images.stats().await.entries, 2);
}

#[tokio::test]
async fn test_cancelled_caller_does_not_fail_others() {
    let dir = TempDir::new().unwrap();
    let source = MockArtworkSource::new()
        .with_artwork("al-1", jpeg(300, 150), 1_000)
        .with_read_delay(Duration::from_millis(100));
    let images = Arc::new(open_cache(source, dir.path()).await);

    let first = {
        let images = images.clone();
        tokio::spawn(async move { images.get_image(&ArtworkId::from("al-1"), 60).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    let second = {
        let images = images.clone();
        tokio::spawn(async move { images.get_image(&ArtworkId::from("al-1"), 60).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    first.abort();
    assert!(first.await.unwrap_err().is_cancelled());

    let image = second.await.unwrap().unwrap();
    assert_eq!(dimensions(&image.data), (60, 30));
    assert_eq!(images.source().read_count(), 1);
}

#[tokio::test]
async fn test_different_artworks_resize_independently() {
    let dir = TempDir::new().unwrap();
    let source = MockArtworkSource::new()
        .with_artwork("al-1", jpeg(200, 100), 1_000)
        .with_artwork("al-2", png(100, 200), 1_000);
    let images = Arc::new(open_cache(source, dir.path()).await);

    let id1 = ArtworkId::from("al-1");
    let id2 = ArtworkId::from("al-2");
    let (a, b) = tokio::join!(
        images.get_image(&id1, 50),
        images.get_image(&id2, 50),
    );

    assert_eq!(dimensions(&a.unwrap().data), (50, 25));
    assert_eq!(dimensions(&b.unwrap().data), (25, 50));
    assert_eq!(images.source().read_count(), 2);
}

// =============================================================================
// Persistence and Bounds
// =============================================================================

#[tokio::test]
async fn test_entries_survive_reopen() {
    let dir = TempDir::new().unwrap();
    let original = jpeg(400, 200);

    let first_data = {
        let source = MockArtworkSource::new().with_artwork("al-1", original.clone(), 1_000);
        let images = open_cache(source, dir.path()).await;
        images
            .get_image(&ArtworkId::from("al-1"), 120)
            .await
            .unwrap()
            .data
    };

    let source = MockArtworkSource::new().with_artwork("al-1", original, 1_000);
    let images = open_cache(source, dir.path()).await;
    let image = images.get_image(&ArtworkId::from("al-1"), 120).await.unwrap();

    assert!(image.is_cache_hit());
    assert_eq!(image.data, first_data);
    assert_eq!(
        image.variant,
        ImageVariant::Resized {
            label: "al-1@120".to_string()
        }
    );
    assert_eq!(images.source().read_count(), 0);
}

#[tokio::test]
async fn test_cache_stays_within_entry_limit() {
    let dir = TempDir::new().unwrap();
    let mut source = MockArtworkSource::new();
    for i in 0..6 {
        source = source.with_artwork(&format!("al-{}", i), jpeg(64, 64), 1_000);
    }

    let config = DiskCacheConfig::new("bounded", dir.path())
        .with_capacity(64 * 1024 * 1024)
        .with_max_entries(4);
    let images = ImageCache::open(source, config, ImageSettings::default())
        .await
        .unwrap();

    for i in 0..6 {
        let image = images
            .get_image(&ArtworkId::from(format!("al-{}", i)), 32)
            .await
            .unwrap();
        assert_eq!(dimensions(&image.data), (32, 32));
    }

    let stats = images.stats().await;
    assert!(stats.entries <= 4);
    assert!(stats.size <= stats.capacity);
}
