mod common;

use std::sync::Arc;

use common::{sheet_plant, write_workbook, Gen, InstrumentedStore, SHEET};
use plant_service::{
    store::{MemoryPlantStore, PlantStore},
    AppError, ErrorKind, PlantAggregationService,
};

#[tokio::test]
async fn refresh_loads_rows_and_skips_code_row() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_workbook(
        dir.path(),
        "egrid.xlsx",
        SHEET,
        &[
            sheet_plant(10, "CA", Gen::Number(1200.5)),
            sheet_plant(11, "tx", Gen::Text("(300)")),
            sheet_plant(12, "NY", Gen::Blank),
        ],
    );

    let store = Arc::new(MemoryPlantStore::new());
    let service = PlantAggregationService::new(store.clone());
    let summary = service.refresh(&path, SHEET).await.unwrap();

    assert_eq!(summary.rows_read, 3);
    assert_eq!(summary.rows_skipped, 0);
    assert_eq!(summary.upsert.records, 3);
    assert_eq!(summary.upsert.inserted, 3);
    assert_eq!(summary.upsert.batches, 1);

    let ca = store.get(10).await.unwrap();
    assert_eq!(ca.annual_net_generation, 1200.5);
    assert_eq!(ca.latitude, 34.5);
    assert_eq!(ca.longitude, -117.25);

    let tx = store.get(11).await.unwrap();
    assert_eq!(tx.state, "TX");
    assert_eq!(tx.annual_net_generation, -300.0);

    assert_eq!(store.get(12).await.unwrap().annual_net_generation, 0.0);
}

#[tokio::test]
async fn refresh_twice_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let plants: Vec<_> = (1..=25)
        .map(|id| sheet_plant(id, if id % 2 == 0 { "CA" } else { "TX" }, Gen::Number(id as f64 * 10.0)))
        .collect();
    let path = write_workbook(dir.path(), "egrid.xlsx", SHEET, &plants);

    let store = Arc::new(MemoryPlantStore::new());
    let service = PlantAggregationService::new(store.clone()).with_batch_size(7);

    let first = service.refresh(&path, SHEET).await.unwrap();
    let after_first = store.snapshot().await;

    let second = service.refresh(&path, SHEET).await.unwrap();
    let after_second = store.snapshot().await;

    assert_eq!(first.upsert.inserted, 25);
    assert_eq!(first.upsert.batches, 4);
    assert_eq!(second.upsert.inserted, 0);
    assert_eq!(second.upsert.updated, 0);
    assert_eq!(second.upsert.unchanged, 25);
    assert_eq!(after_first.len(), 25);
    assert_eq!(after_first, after_second);
}

#[tokio::test]
async fn second_refresh_overwrites_by_facility_code() {
    let dir = tempfile::tempdir().unwrap();
    let first = write_workbook(
        dir.path(),
        "first.xlsx",
        SHEET,
        &[sheet_plant(1, "CA", Gen::Text("500")), sheet_plant(2, "CA", Gen::Text(""))],
    );
    let second = write_workbook(dir.path(), "second.xlsx", SHEET, &[sheet_plant(1, "CA", Gen::Text("600"))]);

    let store = Arc::new(MemoryPlantStore::new());
    let service = PlantAggregationService::new(store.clone());
    service.refresh(&first, SHEET).await.unwrap();
    let summary = service.refresh(&second, SHEET).await.unwrap();

    assert_eq!(summary.upsert.updated, 1);
    assert_eq!(store.len().await, 2);
    assert_eq!(store.get(1).await.unwrap().annual_net_generation, 600.0);
    assert_eq!(store.get(2).await.unwrap().annual_net_generation, 0.0);
}

#[tokio::test]
async fn duplicate_facility_rows_keep_last_in_sheet_order() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_workbook(
        dir.path(),
        "egrid.xlsx",
        SHEET,
        &[
            sheet_plant(1, "CA", Gen::Text("500")),
            sheet_plant(2, "CA", Gen::Text("")),
            sheet_plant(1, "CA", Gen::Text("600")),
        ],
    );

    let store = Arc::new(MemoryPlantStore::new());
    let service = PlantAggregationService::new(store.clone());

    let first = service.refresh(&path, SHEET).await.unwrap();
    assert_eq!(first.rows_read, 3);
    assert_eq!(first.rows_superseded, 1);
    assert_eq!(first.upsert.records, 2);
    assert_eq!(first.upsert.inserted, 2);

    let second = service.refresh(&path, SHEET).await.unwrap();
    assert_eq!(second.upsert.unchanged, 2);

    assert_eq!(store.len().await, 2);
    assert_eq!(store.get(1).await.unwrap().annual_net_generation, 600.0);
    assert_eq!(store.get(2).await.unwrap().annual_net_generation, 0.0);
}

#[tokio::test]
async fn missing_file_and_sheet_are_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let service = PlantAggregationService::new(Arc::new(MemoryPlantStore::new()));

    let missing = service
        .refresh(dir.path().join("absent.xlsx"), SHEET)
        .await
        .unwrap_err();
    assert_eq!(missing.kind(), ErrorKind::NotFound);

    let path = write_workbook(dir.path(), "egrid.xlsx", "PLNT20", &[sheet_plant(1, "CA", Gen::Number(1.0))]);
    let wrong_sheet = service.refresh(&path, SHEET).await.unwrap_err();
    assert_eq!(wrong_sheet.kind(), ErrorKind::NotFound);
    assert!(wrong_sheet.to_string().contains(SHEET));
}

#[tokio::test]
async fn failing_batch_keeps_earlier_batches_and_stops() {
    let dir = tempfile::tempdir().unwrap();
    let plants: Vec<_> = (1..=6)
        .map(|id| sheet_plant(id, "CA", Gen::Number(100.0 - id as f64)))
        .collect();
    let path = write_workbook(dir.path(), "egrid.xlsx", SHEET, &plants);

    let store = Arc::new(InstrumentedStore::failing_on(2));
    let service = PlantAggregationService::new(store.clone()).with_batch_size(2);

    let err = service.refresh(&path, SHEET).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StoreWrite);
    match err {
        AppError::StoreWrite(e) => {
            assert_eq!(e.batch, 2);
            assert_eq!(e.batches, 3);
            assert_eq!(e.committed.inserted, 2);
        }
        other => panic!("expected store write error, got {other:?}"),
    }

    // Batch 3 was never attempted.
    assert_eq!(store.batch_calls(), 2);

    // Batch 1 holds the two largest generators (sorted before writing).
    let stored: Vec<i64> = store.inner.snapshot().await.iter().map(|p| p.facility_id).collect();
    assert_eq!(stored, vec![1, 2]);
}

#[tokio::test]
async fn rerun_after_failure_completes_without_duplicates() {
    let dir = tempfile::tempdir().unwrap();
    let plants: Vec<_> = (1..=5).map(|id| sheet_plant(id, "TX", Gen::Number(id as f64))).collect();
    let path = write_workbook(dir.path(), "egrid.xlsx", SHEET, &plants);

    let flaky = Arc::new(InstrumentedStore::failing_on(2));
    let service = PlantAggregationService::new(flaky.clone()).with_batch_size(2);
    assert!(service.refresh(&path, SHEET).await.is_err());

    // Only the second call failed; a rerun goes through.
    let summary = service.refresh(&path, SHEET).await.unwrap();
    assert_eq!(summary.upsert.records, 5);
    assert_eq!(flaky.inner.len().await, 5);
}

#[tokio::test]
async fn zero_batch_size_is_rejected() {
    let store = MemoryPlantStore::new();
    let err = store.bulk_upsert(&[common::record(1, "CA", 1.0)], 0).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    assert!(store.is_empty().await);
}
