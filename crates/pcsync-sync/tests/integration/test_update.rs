//! Update: paginated cache refresh

use pcsync_core::domain::action::update_signature;
use pcsync_core::domain::{ActionStatus, SyncFlag};
use pcsync_core::ports::{IActionLedger, ICacheRepository, SubtreeOrder};
use pcsync_sync::SyncError;

use crate::common::{self, rp, MemoryRemote};

#[tokio::test]
async fn test_update_pages_through_large_directory() {
    let h = common::setup().await;
    for i in 0..150 {
        h.remote
            .add_file(&format!("/apps/big/file{i:03}.txt"), b"x", 1_000 + i);
    }

    let summary = h.engine.update(&rp("/apps/big")).await.unwrap();

    assert!(summary.found);
    assert_eq!(summary.direct, 150);
    assert_eq!(summary.total, 150);
    // One full page of 100, then a short page of 50
    assert_eq!(MemoryRemote::calls(&h.remote.list_calls), 2);
    assert_eq!(h.cache.count().await.unwrap(), 151);

    let row = h
        .ledger
        .get(&update_signature(&rp("/apps/big")))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.state(), Some(ActionStatus::Finished));
}

#[tokio::test]
async fn test_update_recurses_into_subdirectories() {
    let h = common::setup().await;
    h.remote.add_file("/apps/docs/a.txt", b"a", 1_000);
    h.remote.add_file("/apps/docs/sub/b.txt", b"b", 1_000);
    h.remote.add_file("/apps/docs/sub/deeper/c.txt", b"c", 1_000);

    let summary = h.engine.update(&rp("/apps/docs")).await.unwrap();

    assert_eq!(summary.direct, 2);
    assert_eq!(summary.total, 5);

    let cached = h
        .cache
        .list_subtree(&rp("/apps/docs"), SubtreeOrder::ByPath)
        .await
        .unwrap();
    let paths: Vec<_> = cached.iter().map(|e| e.path().as_str()).collect();
    assert_eq!(
        paths,
        [
            "/apps/docs/a.txt",
            "/apps/docs/sub",
            "/apps/docs/sub/b.txt",
            "/apps/docs/sub/deeper",
            "/apps/docs/sub/deeper/c.txt",
        ]
    );
    assert!(cached.iter().all(|e| e.flag == SyncFlag::Unset));
}

#[tokio::test]
async fn test_update_of_a_file_caches_only_the_file() {
    let h = common::setup().await;
    h.remote.add_file("/apps/one.txt", b"1", 1_000);

    let summary = h.engine.update(&rp("/apps/one.txt")).await.unwrap();

    assert!(summary.found);
    assert_eq!(summary.total, 0);
    assert_eq!(MemoryRemote::calls(&h.remote.list_calls), 0);
    assert!(h.cache.get(&rp("/apps/one.txt")).await.unwrap().is_some());
}

#[tokio::test]
async fn test_update_of_missing_path_finishes() {
    let h = common::setup().await;

    let summary = h.engine.update(&rp("/nowhere")).await.unwrap();

    assert!(!summary.found);
    assert!(h.cache.get(&rp("/nowhere")).await.unwrap().is_none());
    let row = h.ledger.get("UPDATE: /nowhere").await.unwrap().unwrap();
    assert_eq!(row.state(), Some(ActionStatus::Finished));
}

#[tokio::test]
async fn test_update_drops_entries_gone_from_remote() {
    let h = common::setup().await;
    h.remote.add_file("/apps/docs/keep.txt", b"k", 1_000);
    h.remote.add_file("/apps/docs/gone/x.txt", b"x", 1_000);
    h.engine.update(&rp("/apps/docs")).await.unwrap();

    h.remote.drop_path("/apps/docs/gone");
    h.engine.update(&rp("/apps/docs")).await.unwrap();

    assert!(h.cache.get(&rp("/apps/docs/keep.txt")).await.unwrap().is_some());
    assert!(h.cache.get(&rp("/apps/docs/gone")).await.unwrap().is_none());
    assert!(h.cache.get(&rp("/apps/docs/gone/x.txt")).await.unwrap().is_none());
}

#[tokio::test]
async fn test_update_requires_login() {
    let h = common::setup_with(MemoryRemote::logged_out()).await;

    let err = h.engine.update(&rp("/apps")).await.unwrap_err();

    assert!(matches!(err, SyncError::Auth(_)));
    assert!(h.ledger.get("UPDATE: /apps").await.unwrap().is_none());
}

#[tokio::test]
async fn test_update_is_busy_while_another_run_holds_the_row() {
    let h = common::setup().await;
    h.remote.add_dir("/apps");
    h.ledger.try_start("UPDATE: /apps").await.unwrap();

    let err = h.engine.update(&rp("/apps")).await.unwrap_err();

    assert!(matches!(err, SyncError::Busy { .. }));
    let row = h.ledger.get("UPDATE: /apps").await.unwrap().unwrap();
    assert!(row.is_running());
    assert_eq!(MemoryRemote::calls(&h.remote.list_calls), 0);
}

#[tokio::test]
async fn test_update_of_vanished_directory_drops_cached_subtree() {
    let h = common::setup().await;
    h.remote.add_file("/apps/docs/a.txt", b"a", 1_000);
    h.remote.add_file("/apps/docs/sub/b.txt", b"b", 1_000);
    h.engine.update(&rp("/apps/docs")).await.unwrap();
    h.remote.drop_path("/apps/docs");

    let summary = h.engine.update(&rp("/apps/docs")).await.unwrap();

    assert!(!summary.found);
    assert!(h.cache.get(&rp("/apps/docs")).await.unwrap().is_none());
    assert!(h
        .cache
        .list_subtree(&rp("/apps/docs"), SubtreeOrder::ByPath)
        .await
        .unwrap()
        .is_empty());

    // The next backup must not trust the stale rows
    let local = h.local("docs");
    common::write_file(&local.join("a.txt"), b"a", 1_000);
    let stats = h.engine.backup(&local, &rp("/apps/docs"), false).await.unwrap();

    assert_eq!(stats.transferred_files, 1);
    assert_eq!(h.remote.content("/apps/docs/a.txt").unwrap(), b"a");
}
