//! Integration tests for transactional behavior: NO-STEAL eviction, FORCE
//! commit, abort rollback, lock timeouts, and upgrade conflicts.

use std::sync::Arc;
use std::time::{Duration, Instant};

use silt::catalog::Catalog;
use silt::datum::{Field, Type};
use silt::heap::{HeapFile, HeapPage};
use silt::storage::{BufferError, BufferPool, PageId};
use silt::tuple::{Tuple, TupleDesc};
use silt::tx::{Permissions, TransactionId};
use tempfile::{TempDir, tempdir};

fn int_desc() -> TupleDesc {
    TupleDesc::new(vec![Type::Int], vec![Some("v".to_string())])
}

/// A registered table with `pages` pre-written empty pages and a pool of
/// the given capacity over it.
async fn table_with_pages(
    capacity: usize,
    pages: u64,
) -> (TempDir, Arc<BufferPool>, Arc<HeapFile>) {
    let dir = tempdir().unwrap();
    let file = Arc::new(
        HeapFile::open(dir.path().join("t.dat"), int_desc())
            .await
            .unwrap(),
    );
    for page_no in 0..pages {
        let pid = PageId::new(file.table_id(), page_no);
        let page = HeapPage::parse(pid, int_desc(), &HeapPage::empty_page_data()).unwrap();
        file.write_page(&page).await.unwrap();
    }
    let catalog = Arc::new(Catalog::new());
    catalog.register(file.clone(), "t");
    let pool = Arc::new(BufferPool::new(catalog, capacity));
    (dir, pool, file)
}

#[tokio::test]
async fn test_no_steal_eviction_prefers_clean_pages() {
    let (_dir, pool, file) = table_with_pages(2, 4).await;
    let page0 = PageId::new(file.table_id(), 0);

    // tid1 dirties page 0 and stays open.
    let tid1 = TransactionId::new();
    pool.insert_tuple(tid1, file.table_id(), Tuple::new(vec![Field::Int(42)]))
        .await
        .unwrap();

    // tid2 reads three more pages; the last read pushes the cache past
    // capacity and forces an eviction, which must skip dirty page 0 and
    // discard the least recently used clean page instead.
    let tid2 = TransactionId::new();
    for page_no in 1..4 {
        pool.get_page(tid2, PageId::new(file.table_id(), page_no), Permissions::ReadOnly)
            .await
            .unwrap();
    }
    assert_eq!(pool.cached_pages(), 3);

    // NO-STEAL: the uncommitted insert has not reached disk.
    let on_disk = file.read_page(page0).await.unwrap();
    assert_eq!(on_disk.tuples().len(), 0);

    // FORCE: after commit the bytes are on disk.
    pool.transaction_complete(tid1, true).await.unwrap();
    let on_disk = file.read_page(page0).await.unwrap();
    assert_eq!(on_disk.tuples().len(), 1);
    assert_eq!(on_disk.tuples()[0].field(0), &Field::Int(42));

    pool.transaction_complete(tid2, true).await.unwrap();
}

#[tokio::test]
async fn test_commit_releases_locks_and_clears_dirty() {
    let (_dir, pool, file) = table_with_pages(4, 1).await;
    let pid = PageId::new(file.table_id(), 0);

    let tid = TransactionId::new();
    pool.insert_tuple(tid, file.table_id(), Tuple::new(vec![Field::Int(7)]))
        .await
        .unwrap();
    assert!(pool.holds_lock(tid, pid));

    pool.transaction_complete(tid, true).await.unwrap();
    assert!(!pool.holds_lock(tid, pid));

    // The cached page is clean again and another transaction can lock it.
    let tid2 = TransactionId::new();
    let page = pool.get_page(tid2, pid, Permissions::ReadWrite).await.unwrap();
    assert_eq!(page.read().is_dirty(), None);
    assert_eq!(page.read().tuples().len(), 1);
    pool.transaction_complete(tid2, true).await.unwrap();
}

#[tokio::test]
async fn test_abort_rolls_back_in_memory_changes() {
    let (_dir, pool, file) = table_with_pages(4, 1).await;
    let pid = PageId::new(file.table_id(), 0);

    let tid = TransactionId::new();
    pool.insert_tuple(tid, file.table_id(), Tuple::new(vec![Field::Int(13)]))
        .await
        .unwrap();

    // The cached page holds the uncommitted tuple.
    let cached = pool.get_page(tid, pid, Permissions::ReadWrite).await.unwrap();
    assert_eq!(cached.read().tuples().len(), 1);

    pool.transaction_complete(tid, false).await.unwrap();

    // The same handle now shows the on-disk (empty) image, clean.
    assert_eq!(cached.read().tuples().len(), 0);
    assert_eq!(cached.read().is_dirty(), None);
    assert!(!pool.holds_lock(tid, pid));

    // Disk never saw the tuple.
    assert_eq!(file.read_page(pid).await.unwrap().tuples().len(), 0);
}

#[tokio::test]
async fn test_abort_then_commit_from_fresh_transaction() {
    let (_dir, pool, file) = table_with_pages(4, 1).await;

    let tid = TransactionId::new();
    pool.insert_tuple(tid, file.table_id(), Tuple::new(vec![Field::Int(1)]))
        .await
        .unwrap();
    pool.transaction_complete(tid, false).await.unwrap();

    let tid = TransactionId::new();
    pool.insert_tuple(tid, file.table_id(), Tuple::new(vec![Field::Int(2)]))
        .await
        .unwrap();
    pool.transaction_complete(tid, true).await.unwrap();

    let pid = PageId::new(file.table_id(), 0);
    let on_disk = file.read_page(pid).await.unwrap();
    assert_eq!(on_disk.tuples().len(), 1);
    assert_eq!(on_disk.tuples()[0].field(0), &Field::Int(2));
}

#[tokio::test]
async fn test_lock_wait_times_out_as_abort() {
    let dir = tempdir().unwrap();
    let file = Arc::new(
        HeapFile::open(dir.path().join("t.dat"), int_desc())
            .await
            .unwrap(),
    );
    let pid = PageId::new(file.table_id(), 0);
    let page = HeapPage::parse(pid, int_desc(), &HeapPage::empty_page_data()).unwrap();
    file.write_page(&page).await.unwrap();

    let catalog = Arc::new(Catalog::new());
    catalog.register(file.clone(), "t");
    let pool =
        Arc::new(BufferPool::new(catalog, 4).with_lock_timeout(Duration::from_millis(100)));

    let tid1 = TransactionId::new();
    pool.get_page(tid1, pid, Permissions::ReadWrite).await.unwrap();

    let tid2 = TransactionId::new();
    let start = Instant::now();
    let err = pool
        .get_page(tid2, pid, Permissions::ReadOnly)
        .await
        .unwrap_err();
    let waited = start.elapsed();

    assert!(matches!(err, BufferError::TransactionAborted { .. }));
    assert!(waited >= Duration::from_millis(90), "waited {:?}", waited);
    assert!(waited < Duration::from_millis(1000), "waited {:?}", waited);

    // The caller's contract: abort the failed transaction.
    pool.transaction_complete(tid2, false).await.unwrap();
    pool.transaction_complete(tid1, true).await.unwrap();
}

#[tokio::test]
async fn test_shared_upgrade_races_abort() {
    let (_dir, pool, file) = table_with_pages(4, 1).await;
    let pid = PageId::new(file.table_id(), 0);

    let tid1 = TransactionId::new();
    let tid2 = TransactionId::new();
    pool.get_page(tid1, pid, Permissions::ReadOnly).await.unwrap();
    pool.get_page(tid2, pid, Permissions::ReadOnly).await.unwrap();

    // Upgrading while another shared holder remains fails immediately.
    let err = pool
        .get_page(tid1, pid, Permissions::ReadWrite)
        .await
        .unwrap_err();
    assert!(matches!(err, BufferError::TransactionAborted { .. }));
    pool.transaction_complete(tid1, false).await.unwrap();

    // Now the sole holder, tid2 upgrades cleanly.
    pool.get_page(tid2, pid, Permissions::ReadWrite).await.unwrap();
    assert!(pool.holds_lock(tid2, pid));
    pool.transaction_complete(tid2, true).await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_writer_blocks_reader_until_commit() {
    let (_dir, pool, file) = table_with_pages(4, 1).await;
    let pid = PageId::new(file.table_id(), 0);

    let tid1 = TransactionId::new();
    pool.insert_tuple(tid1, file.table_id(), Tuple::new(vec![Field::Int(99)]))
        .await
        .unwrap();

    // The reader starts while the writer holds its exclusive lock, and
    // must not observe the page until after commit.
    let reader_pool = pool.clone();
    let reader = tokio::spawn(async move {
        let tid2 = TransactionId::new();
        let page = reader_pool
            .get_page(tid2, pid, Permissions::ReadOnly)
            .await
            .unwrap();
        let values: Vec<Tuple> = page.read().tuples();
        reader_pool.transaction_complete(tid2, true).await.unwrap();
        values
    });

    // Give the reader time to reach the lock wait, then commit.
    tokio::time::sleep(Duration::from_millis(50)).await;
    pool.transaction_complete(tid1, true).await.unwrap();

    let seen = reader.await.unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].field(0), &Field::Int(99));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_single_insert_transactions() {
    let (_dir, pool, file) = table_with_pages(8, 1).await;

    let mut handles = Vec::new();
    for task in 0..4 {
        let pool = pool.clone();
        let table_id = file.table_id();
        handles.push(tokio::spawn(async move {
            for i in 0..10 {
                let value = task * 100 + i;
                loop {
                    let tid = TransactionId::new();
                    match pool
                        .insert_tuple(tid, table_id, Tuple::new(vec![Field::Int(value)]))
                        .await
                    {
                        Ok(()) => {
                            pool.transaction_complete(tid, true).await.unwrap();
                            break;
                        }
                        Err(BufferError::TransactionAborted { .. }) => {
                            pool.transaction_complete(tid, false).await.unwrap();
                        }
                        Err(err) => panic!("unexpected error: {}", err),
                    }
                }
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    // All 40 committed inserts are present on disk.
    let pid = PageId::new(file.table_id(), 0);
    let on_disk = file.read_page(pid).await.unwrap();
    assert_eq!(on_disk.tuples().len(), 40);
}

#[tokio::test]
async fn test_flush_page_is_noop_for_clean_and_absent_pages() {
    let (_dir, pool, file) = table_with_pages(4, 1).await;
    let pid = PageId::new(file.table_id(), 0);

    // Absent from cache.
    pool.flush_page(pid).await.unwrap();

    // Cached but clean.
    let tid = TransactionId::new();
    pool.get_page(tid, pid, Permissions::ReadOnly).await.unwrap();
    pool.flush_page(pid).await.unwrap();
    pool.transaction_complete(tid, true).await.unwrap();
}

#[tokio::test]
async fn test_rollback_only_touches_own_pages() {
    let (_dir, pool, file) = table_with_pages(4, 2).await;
    let page1 = PageId::new(file.table_id(), 1);

    // tid1 dirties page 0 via insert; tid2 dirties page 1 directly.
    let tid1 = TransactionId::new();
    pool.insert_tuple(tid1, file.table_id(), Tuple::new(vec![Field::Int(1)]))
        .await
        .unwrap();

    let tid2 = TransactionId::new();
    let page = pool.get_page(tid2, page1, Permissions::ReadWrite).await.unwrap();
    page.write()
        .insert_tuple(Tuple::new(vec![Field::Int(2)]))
        .unwrap();
    page.write().mark_dirty(Some(tid2));

    // Aborting tid1 leaves tid2's page dirty and intact.
    pool.transaction_complete(tid1, false).await.unwrap();
    assert_eq!(page.read().is_dirty(), Some(tid2));
    assert_eq!(page.read().tuples().len(), 1);

    pool.transaction_complete(tid2, true).await.unwrap();
    assert_eq!(file.read_page(page1).await.unwrap().tuples().len(), 1);
}
