//! Registry reload tests.
//!
//! Tests verify:
//! - A reload picks up added and removed datasets
//! - Snapshots taken before a reload keep serving
//! - A failed reload keeps the current registry
//! - Reads finishing on a replaced dataset never poison the cache
//! - Concurrent requests during a reload never fail

use std::fs;
use std::sync::Arc;

use mrf_streamer::tile::{TileService, TileTarget};

use super::test_utils::{build_handle, create_test_jpeg, Record, TestTree};

#[tokio::test]
async fn test_reload_adds_datasets() {
    let tree = TestTree::new();
    tree.add_gebco();
    let service = TileService::new(build_handle(tree.registry_config()));
    assert_eq!(service.dataset_count().await, 1);

    tree.add_shaded();
    let report = service.reload().await.unwrap();

    assert_eq!(report.registered.len(), 2);
    assert_eq!(service.dataset_count().await, 2);
    assert!(service.get_tile("Shaded/tile/0/0/0").await.is_ok());
}

#[tokio::test]
async fn test_snapshot_survives_reload() {
    let tree = TestTree::new();
    tree.add_gebco();
    let service = TileService::new(build_handle(tree.registry_config()));

    let snapshot = service.registry().snapshot().await;

    fs::remove_file(tree.webconf().join("Tif/Gebco.webconf")).unwrap();
    service.reload().await.unwrap();

    assert_eq!(service.dataset_count().await, 0);
    assert!(service.get_tile("Tif/tile/0/0/0").await.is_err());

    // The old snapshot still holds open stores
    let (entry, rest) = snapshot.route("Tif/tile/0/0/0").unwrap();
    assert_eq!(rest, "tile/0/0/0");
    assert!(entry.store.read_tile(0, 0, 0).await.is_ok());
}

#[tokio::test]
async fn test_failed_reload_keeps_registry() {
    let tree = TestTree::new();
    tree.add_gebco();
    let service = TileService::new(build_handle(tree.registry_config()));

    fs::remove_dir_all(tree.webconf()).unwrap();
    assert!(service.reload().await.is_err());

    assert_eq!(service.dataset_count().await, 1);
    assert!(service.get_tile("Tif/tile/0/0/0").await.is_ok());
}

#[tokio::test]
async fn test_reload_clears_cache() {
    let tree = TestTree::new();
    tree.add_gebco();
    let service = TileService::new(build_handle(tree.registry_config()));

    service.get_tile("Tif/tile/0/0/0").await.unwrap();
    assert_eq!(service.cache_stats().await.entries, 1);

    service.reload().await.unwrap();
    assert_eq!(service.cache_stats().await.entries, 0);

    let response = service.get_tile("Tif/tile/0/0/0").await.unwrap();
    assert!(!response.cache_hit);
}

#[tokio::test]
async fn test_read_finishing_after_reload_does_not_poison_cache() {
    let tree = TestTree::new();
    tree.add_gebco();
    let service = TileService::new(build_handle(tree.registry_config()));

    let old = match service.resolve("Tif/tile/0/0/0").await.unwrap() {
        TileTarget::Tile { entry, .. } => entry,
        TileTarget::Dataset(_) => panic!("expected a tile address"),
    };

    // Same route, new dataset behind it
    fs::rename(tree.data().join("Tif/Gebco"), tree.data().join("Retired")).unwrap();
    let replacement: Vec<Record> = (0..11u8)
        .map(|i| Record::Tile(create_test_jpeg(100 + i)))
        .collect();
    tree.write_pair("Tif/Gebco", "Gebco", "pjg", &replacement);
    service.reload().await.unwrap();

    // A request that resolved before the reload completes afterwards
    let stale = service.read_tile(&old, 0, 0, 0).await.unwrap();
    assert_eq!(stale.data.as_ref(), create_test_jpeg(10).as_slice());

    let fresh = service.get_tile("Tif/tile/0/0/0").await.unwrap();
    assert!(!fresh.cache_hit);
    assert_eq!(fresh.data.as_ref(), create_test_jpeg(110).as_slice());

    let again = service.get_tile("Tif/tile/0/0/0").await.unwrap();
    assert!(again.cache_hit);
    assert_eq!(again.data, fresh.data);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_requests_during_reload() {
    let tree = TestTree::new();
    tree.add_gebco();
    let service = Arc::new(TileService::new(build_handle(tree.registry_config())));

    let mut readers = Vec::new();
    for i in 0..8u32 {
        let service = Arc::clone(&service);
        readers.push(tokio::spawn(async move {
            for _ in 0..25 {
                let col = i % 4;
                let row = (i / 4) % 2;
                service
                    .get_tile(&format!("Tif/tile/2/{}/{}", col, row))
                    .await
                    .unwrap();
            }
        }));
    }

    for _ in 0..3 {
        service.reload().await.unwrap();
    }

    for reader in readers {
        reader.await.unwrap();
    }
    assert_eq!(service.dataset_count().await, 1);
}
