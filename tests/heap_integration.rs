//! Integration tests for heap files driven through the buffer pool:
//! insertion with page growth, deletion, and scanning.

use std::sync::Arc;

use silt::catalog::Catalog;
use silt::datum::{Field, Type};
use silt::heap::{HeapFile, HeapPage};
use silt::storage::{BufferPool, PageId};
use silt::tuple::{Tuple, TupleDesc};
use silt::tx::TransactionId;
use tempfile::{TempDir, tempdir};

fn int_desc() -> TupleDesc {
    TupleDesc::new(vec![Type::Int], vec![Some("v".to_string())])
}

async fn int_table(capacity: usize) -> (TempDir, Arc<BufferPool>, Arc<HeapFile>) {
    let dir = tempdir().unwrap();
    let file = Arc::new(
        HeapFile::open(dir.path().join("t.dat"), int_desc())
            .await
            .unwrap(),
    );
    let catalog = Arc::new(Catalog::new());
    catalog.register(file.clone(), "t");
    let pool = Arc::new(BufferPool::new(catalog, capacity));
    (dir, pool, file)
}

async fn scan_values(pool: &Arc<BufferPool>, file: &Arc<HeapFile>) -> Vec<i32> {
    let tid = TransactionId::new();
    let mut scan = file.scan(pool.clone(), tid);
    scan.open().await.unwrap();
    let mut values = Vec::new();
    while let Some(tuple) = scan.next().await.unwrap() {
        let Field::Int(v) = tuple.field(0) else {
            panic!("expected INT column");
        };
        values.push(*v);
    }
    pool.transaction_complete(tid, true).await.unwrap();
    values
}

#[tokio::test]
async fn test_insert_creates_first_page() {
    let (_dir, pool, file) = int_table(8).await;
    assert_eq!(file.num_pages().await.unwrap(), 0);

    let tid = TransactionId::new();
    pool.insert_tuple(tid, file.table_id(), Tuple::new(vec![Field::Int(7)]))
        .await
        .unwrap();
    pool.transaction_complete(tid, true).await.unwrap();

    assert_eq!(file.num_pages().await.unwrap(), 1);
    assert_eq!(scan_values(&pool, &file).await, vec![7]);
}

#[tokio::test]
async fn test_full_page_forces_growth() {
    let (_dir, pool, file) = int_table(8).await;
    let slots = HeapPage::slots_per_page(&int_desc());

    // Fill page 0 exactly.
    let tid = TransactionId::new();
    for i in 0..slots {
        pool.insert_tuple(tid, file.table_id(), Tuple::new(vec![Field::Int(i as i32)]))
            .await
            .unwrap();
    }
    pool.transaction_complete(tid, true).await.unwrap();
    assert_eq!(file.num_pages().await.unwrap(), 1);

    // The next insertion lands on a freshly appended page 1.
    let tid = TransactionId::new();
    let pages = file
        .insert_tuple(&pool, tid, Tuple::new(vec![Field::Int(-1)]))
        .await
        .unwrap();
    assert_eq!(pages.len(), 1);
    assert_eq!(pages[0].read().id().page_no(), 1);
    assert_eq!(file.num_pages().await.unwrap(), 2);
    pages[0].write().mark_dirty(Some(tid));
    pool.transaction_complete(tid, true).await.unwrap();

    let values = scan_values(&pool, &file).await;
    assert_eq!(values.len(), slots + 1);
    assert_eq!(values[slots], -1);
}

#[tokio::test]
async fn test_scan_crosses_page_boundaries() {
    let (_dir, pool, file) = int_table(8).await;
    let slots = HeapPage::slots_per_page(&int_desc());
    let total = slots * 2 + 5;

    let tid = TransactionId::new();
    for i in 0..total {
        pool.insert_tuple(tid, file.table_id(), Tuple::new(vec![Field::Int(i as i32)]))
            .await
            .unwrap();
    }
    pool.transaction_complete(tid, true).await.unwrap();

    assert_eq!(file.num_pages().await.unwrap(), 3);
    let values = scan_values(&pool, &file).await;
    assert_eq!(values.len(), total);
    // The heap preserves page order, and slots fill in order within pages.
    assert_eq!(values, (0..total as i32).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_delete_then_reinsert_reuses_slot() {
    let (_dir, pool, file) = int_table(8).await;

    let tid = TransactionId::new();
    for v in [1, 2, 3] {
        pool.insert_tuple(tid, file.table_id(), Tuple::new(vec![Field::Int(v)]))
            .await
            .unwrap();
    }
    pool.transaction_complete(tid, true).await.unwrap();

    // Find the stored tuple holding 2 (its record id comes from the scan).
    let tid = TransactionId::new();
    let mut scan = file.scan(pool.clone(), tid);
    scan.open().await.unwrap();
    let mut victim = None;
    while let Some(tuple) = scan.next().await.unwrap() {
        if tuple.field(0) == &Field::Int(2) {
            victim = Some(tuple);
            break;
        }
    }
    let victim = victim.expect("tuple with value 2 exists");
    assert_eq!(victim.record_id().unwrap().slot, 1);

    pool.delete_tuple(tid, &victim).await.unwrap();
    pool.transaction_complete(tid, true).await.unwrap();
    assert_eq!(scan_values(&pool, &file).await, vec![1, 3]);

    // The freed slot is the first empty one, so the next insert fills it.
    let tid = TransactionId::new();
    let pages = file
        .insert_tuple(&pool, tid, Tuple::new(vec![Field::Int(9)]))
        .await
        .unwrap();
    pages[0].write().mark_dirty(Some(tid));
    pool.transaction_complete(tid, true).await.unwrap();
    assert_eq!(pages[0].read().id().page_no(), 0);
    assert_eq!(scan_values(&pool, &file).await, vec![1, 9, 3]);
}

#[tokio::test]
async fn test_scan_rewind_replays() {
    let (_dir, pool, file) = int_table(8).await;

    let tid = TransactionId::new();
    for v in 0..50 {
        pool.insert_tuple(tid, file.table_id(), Tuple::new(vec![Field::Int(v)]))
            .await
            .unwrap();
    }
    pool.transaction_complete(tid, true).await.unwrap();

    let tid = TransactionId::new();
    let mut scan = file.scan(pool.clone(), tid);
    scan.open().await.unwrap();
    let mut first = Vec::new();
    while let Some(t) = scan.next().await.unwrap() {
        first.push(t);
    }

    scan.rewind().await.unwrap();
    let mut second = Vec::new();
    while let Some(t) = scan.next().await.unwrap() {
        second.push(t);
    }
    pool.transaction_complete(tid, true).await.unwrap();

    assert_eq!(first.len(), 50);
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_closed_scan_yields_nothing() {
    let (_dir, pool, file) = int_table(8).await;

    let tid = TransactionId::new();
    pool.insert_tuple(tid, file.table_id(), Tuple::new(vec![Field::Int(1)]))
        .await
        .unwrap();
    pool.transaction_complete(tid, true).await.unwrap();

    let tid = TransactionId::new();
    let mut scan = file.scan(pool.clone(), tid);
    // Never opened.
    assert!(scan.next().await.unwrap().is_none());

    scan.open().await.unwrap();
    assert!(scan.next().await.unwrap().is_some());
    scan.close();
    assert!(scan.next().await.unwrap().is_none());
    pool.transaction_complete(tid, true).await.unwrap();
}

#[tokio::test]
async fn test_random_inserts_preserve_the_multiset() {
    use rand::prelude::*;

    let (_dir, pool, file) = int_table(8).await;
    let mut rng = rand::rng();
    let mut expected: Vec<i32> = (0..200).map(|_| rng.random_range(-1000..1000)).collect();

    let tid = TransactionId::new();
    for v in &expected {
        pool.insert_tuple(tid, file.table_id(), Tuple::new(vec![Field::Int(*v)]))
            .await
            .unwrap();
    }
    pool.transaction_complete(tid, true).await.unwrap();

    let mut got = scan_values(&pool, &file).await;
    got.sort_unstable();
    expected.sort_unstable();
    assert_eq!(got, expected);
}

#[tokio::test]
async fn test_committed_data_survives_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("t.dat");

    {
        let file = Arc::new(HeapFile::open(&path, int_desc()).await.unwrap());
        let catalog = Arc::new(Catalog::new());
        catalog.register(file.clone(), "t");
        let pool = Arc::new(BufferPool::new(catalog, 8));

        let tid = TransactionId::new();
        for v in [10, 20, 30] {
            pool.insert_tuple(tid, file.table_id(), Tuple::new(vec![Field::Int(v)]))
                .await
                .unwrap();
        }
        pool.transaction_complete(tid, true).await.unwrap();
    }

    // Fresh handles over the same backing file observe the committed rows.
    let file = Arc::new(HeapFile::open(&path, int_desc()).await.unwrap());
    let catalog = Arc::new(Catalog::new());
    catalog.register(file.clone(), "t");
    let pool = Arc::new(BufferPool::new(catalog, 8));
    assert_eq!(scan_values(&pool, &file).await, vec![10, 20, 30]);
}

#[tokio::test]
async fn test_scan_extent_is_captured_at_open() {
    let (_dir, pool, file) = int_table(8).await;
    let slots = HeapPage::slots_per_page(&int_desc());

    let tid = TransactionId::new();
    for i in 0..slots {
        pool.insert_tuple(tid, file.table_id(), Tuple::new(vec![Field::Int(i as i32)]))
            .await
            .unwrap();
    }
    pool.transaction_complete(tid, true).await.unwrap();

    // The same transaction scans, then grows the file mid-scan (its
    // shared lock upgrades cleanly since it is the sole holder). The page
    // count was captured at open, so the scan stops at the old extent.
    let tid = TransactionId::new();
    let mut scan = file.scan(pool.clone(), tid);
    scan.open().await.unwrap();

    pool.insert_tuple(tid, file.table_id(), Tuple::new(vec![Field::Int(-1)]))
        .await
        .unwrap();
    assert_eq!(file.num_pages().await.unwrap(), 2);

    let mut seen = 0;
    while scan.next().await.unwrap().is_some() {
        seen += 1;
    }
    assert_eq!(seen, slots);

    // Rewinding re-captures the extent and picks up the appended page.
    scan.rewind().await.unwrap();
    let mut seen = 0;
    while scan.next().await.unwrap().is_some() {
        seen += 1;
    }
    assert_eq!(seen, slots + 1);
    pool.transaction_complete(tid, true).await.unwrap();
}

#[tokio::test]
async fn test_disk_bytes_round_trip_through_pool() {
    let (_dir, pool, file) = int_table(8).await;

    let tid = TransactionId::new();
    for v in 0..10 {
        pool.insert_tuple(tid, file.table_id(), Tuple::new(vec![Field::Int(v)]))
            .await
            .unwrap();
    }
    pool.transaction_complete(tid, true).await.unwrap();

    // Reading straight from disk matches the cached page's serialization.
    let pid = PageId::new(file.table_id(), 0);
    let from_disk = file.read_page(pid).await.unwrap();
    let tid = TransactionId::new();
    let cached = pool
        .get_page(tid, pid, silt::tx::Permissions::ReadOnly)
        .await
        .unwrap();
    assert_eq!(from_disk.page_data(), cached.read().page_data());
    pool.transaction_complete(tid, true).await.unwrap();
}
