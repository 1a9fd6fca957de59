//! Tile store tests over in-memory readers.
//!
//! Tests verify:
//! - Index records are read with one positional read each
//! - Concurrent reads of one store return the right payloads
//! - Addresses outside the pyramid never touch the readers

use std::sync::Arc;

use mrf_streamer::dataset::{PyramidGeometry, TileStore};
use mrf_streamer::error::TileError;
use mrf_streamer::format::TileFormat;

use super::test_utils::{build_pair, create_test_jpeg, Record, TrackingMockReader};

/// 2048x1024 / 512 / max level 7: 16 records.
fn scenario_store() -> (TileStore<TrackingMockReader>, TrackingMockReader, TrackingMockReader) {
    let records: Vec<Record> = (0..16u8).map(|i| Record::Tile(create_test_jpeg(i))).collect();
    let (data, index) = build_pair(&records);
    let index = TrackingMockReader::new(index, "scenario.idx");
    let data = TrackingMockReader::new(data, "scenario.pjg");

    let geometry = PyramidGeometry::new(2048, 1024, 512, 512, Some(7), 0).unwrap();
    let store = TileStore::open(
        "scenario",
        geometry,
        TileFormat::Jpeg,
        index.clone(),
        data.clone(),
    )
    .unwrap();
    (store, index, data)
}

#[tokio::test]
async fn test_scenario_reads() {
    let (store, index, data) = scenario_store();

    let top = store.read(0, 0, 0).await.unwrap();
    assert_eq!(top, create_test_jpeg(15));

    let finest = store.read(7, 3, 1).await.unwrap();
    assert_eq!(finest, create_test_jpeg(7));

    assert_eq!(index.request_count(), 2);
    assert_eq!(data.request_count(), 2);
}

#[tokio::test]
async fn test_out_of_range_never_reads() {
    let (store, index, data) = scenario_store();

    for (level, col, row) in [(8, 0, 0), (7, 4, 0), (7, 0, 2), (0, 1, 0), (u32::MAX, 0, 0)] {
        assert!(matches!(
            store.read(level, col, row).await,
            Err(TileError::OutOfRange { .. })
        ));
    }

    assert_eq!(index.request_count(), 0);
    assert_eq!(data.request_count(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_reads() {
    let (store, _, data) = scenario_store();
    let store = Arc::new(store);

    let mut tasks = Vec::new();
    for round in 0..4 {
        for col in 0..4u32 {
            for row in 0..2u32 {
                let store = Arc::clone(&store);
                tasks.push(tokio::spawn(async move {
                    let tile = store.read(7, col, row).await.unwrap();
                    (round, col, row, tile)
                }));
            }
        }
    }

    for task in tasks {
        let (_, col, row, tile) = task.await.unwrap();
        let record = (row * 4 + col) as u8;
        assert_eq!(tile, create_test_jpeg(record));
    }
    assert_eq!(data.request_count(), 32);
}
