//! Restore: remote to local, driven by the cache

use pcsync_core::domain::action::restore_signature;
use pcsync_core::domain::ActionStatus;
use pcsync_core::ports::{IActionLedger, ICacheRepository};
use pcsync_sync::SyncError;

use crate::common::{self, mtime_of, rp, write_file, MemoryRemote};

#[tokio::test]
async fn test_restore_downloads_tree_and_sets_mtimes() {
    let h = common::setup().await;
    h.remote.add_file("/apps/docs/a.txt", b"alpha", 1_600_000_000);
    h.remote.add_file("/apps/docs/sub/b.txt", b"bravo", 1_600_000_100);
    let local = h.local("restored");

    let stats = h.engine.restore(&local, &rp("/apps/docs"), false).await.unwrap();

    assert_eq!(stats.transferred_files, 2);
    assert_eq!(stats.transferred_dirs, 2);
    assert_eq!(std::fs::read(local.join("a.txt")).unwrap(), b"alpha");
    assert_eq!(std::fs::read(local.join("sub/b.txt")).unwrap(), b"bravo");
    assert_eq!(mtime_of(&local.join("a.txt")), 1_600_000_000);
    assert_eq!(mtime_of(&local.join("sub/b.txt")), 1_600_000_100);
    // No temp files left behind
    assert_eq!(std::fs::read_dir(&local).unwrap().count(), 2);

    let row = h
        .ledger
        .get(&restore_signature(&local, &rp("/apps/docs")))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.state(), Some(ActionStatus::Finished));
}

#[tokio::test]
async fn test_restore_skips_local_files_that_are_newer() {
    let h = common::setup().await;
    h.remote.add_file("/apps/docs/a.txt", b"remote", 1_000);
    let local = h.local("docs");
    write_file(&local.join("a.txt"), b"local", 2_000);

    let stats = h.engine.restore(&local, &rp("/apps/docs"), false).await.unwrap();

    assert_eq!(stats.skipped_files, 1);
    assert_eq!(MemoryRemote::calls(&h.remote.download_calls), 0);
    assert_eq!(std::fs::read(local.join("a.txt")).unwrap(), b"local");
}

#[tokio::test]
async fn test_restore_md5_skips_identical_content() {
    let h = common::setup().await;
    h.remote.add_file("/apps/docs/a.txt", b"same", 2_000);
    let local = h.local("docs");
    write_file(&local.join("a.txt"), b"same", 1_000);

    let stats = h.engine.restore(&local, &rp("/apps/docs"), true).await.unwrap();

    assert_eq!(stats.skipped_files, 1);
    assert_eq!(stats.transferred_files, 0);
    // Content matched, so the local mtime is left alone
    assert_eq!(mtime_of(&local.join("a.txt")), 1_000);
}

#[tokio::test]
async fn test_restore_md5_mismatch_with_equal_mtimes_is_a_conflict() {
    let h = common::setup().await;
    h.remote.add_file("/apps/docs/a.txt", b"remote", 1_500);
    let local = h.local("docs");
    write_file(&local.join("a.txt"), b"local", 1_500);
    let remote_md5 = format!("{:x}", md5::compute(b"remote"));

    let err = h.engine.restore(&local, &rp("/apps/docs"), true).await.unwrap_err();

    assert!(matches!(err, SyncError::Conflict { .. }));
    assert_eq!(MemoryRemote::calls(&h.remote.download_calls), 0);
    assert_eq!(std::fs::read(local.join("a.txt")).unwrap(), b"local");
    let cached = h.cache.get(&rp("/apps/docs/a.txt")).await.unwrap().unwrap();
    assert_eq!(cached.meta.md5.as_deref(), Some(remote_md5.as_str()));

    let row = h
        .ledger
        .get(&restore_signature(&local, &rp("/apps/docs")))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.state(), Some(ActionStatus::Error));
}

#[tokio::test]
async fn test_restore_failed_download_removes_partial_file() {
    let h = common::setup().await;
    h.remote.add_file("/apps/docs/a.txt", b"alpha bravo", 1_000);
    h.remote.break_download("/apps/docs/a.txt");
    let local = h.local("docs");

    let err = h.engine.restore(&local, &rp("/apps/docs"), false).await.unwrap_err();

    assert!(matches!(err, SyncError::Remote(_)));
    assert!(!local.join(".a.txt.pcsync-tmp").exists());
    assert!(!local.join("a.txt").exists());
}

#[tokio::test]
async fn test_restore_sweep_keeps_partial_download_files() {
    let h = common::setup().await;
    h.remote.add_file("/apps/docs/a.txt", b"a", 1_000);
    let local = h.local("docs");
    write_file(&local.join(".b.txt.pcsync-tmp"), b"half", 1_000);

    let stats = h.engine.restore(&local, &rp("/apps/docs"), false).await.unwrap();

    assert_eq!(stats.removed_files, 0);
    assert!(local.join(".b.txt.pcsync-tmp").exists());
}

#[tokio::test]
async fn test_restore_removes_local_extras() {
    let h = common::setup().await;
    h.remote.add_file("/apps/docs/keep.txt", b"k", 1_000);
    let local = h.local("docs");
    write_file(&local.join("keep.txt"), b"k", 1_000);
    write_file(&local.join("extra.txt"), b"e", 1_000);
    write_file(&local.join("extra_dir/nested.txt"), b"n", 1_000);

    let stats = h.engine.restore(&local, &rp("/apps/docs"), false).await.unwrap();

    assert_eq!(stats.removed_files, 1);
    assert_eq!(stats.removed_dirs, 1);
    assert!(local.join("keep.txt").exists());
    assert!(!local.join("extra.txt").exists());
    assert!(!local.join("extra_dir").exists());
}

#[tokio::test]
async fn test_restore_replaces_local_directory_with_file() {
    let h = common::setup().await;
    h.remote.add_file("/apps/docs/thing", b"file now", 1_000);
    let local = h.local("docs");
    write_file(&local.join("thing/inner.txt"), b"i", 1_000);

    let stats = h.engine.restore(&local, &rp("/apps/docs"), false).await.unwrap();

    assert_eq!(stats.removed_dirs, 1);
    assert_eq!(stats.transferred_files, 1);
    assert_eq!(std::fs::read(local.join("thing")).unwrap(), b"file now");
}

#[tokio::test]
async fn test_restore_single_file_root() {
    let h = common::setup().await;
    h.remote.add_file("/apps/one.txt", b"one", 1_500);
    let local = h.local("one.txt");

    let stats = h.engine.restore(&local, &rp("/apps/one.txt"), false).await.unwrap();

    assert_eq!(stats.transferred_files, 1);
    assert_eq!(stats.total_dirs, 0);
    assert_eq!(std::fs::read(&local).unwrap(), b"one");
}

#[tokio::test]
async fn test_restore_missing_remote_root_fails() {
    let h = common::setup().await;
    let local = h.local("docs");

    let err = h.engine.restore(&local, &rp("/apps/missing"), false).await.unwrap_err();

    assert!(matches!(err, SyncError::RemoteNotFound(_)));
    let row = h
        .ledger
        .get(&restore_signature(&local, &rp("/apps/missing")))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.state(), Some(ActionStatus::Error));
}

#[tokio::test]
async fn test_backup_then_restore_round_trip() {
    let h = common::setup().await;
    let source = h.local("source");
    write_file(&source.join("a.txt"), b"alpha", 1_700_000_000);
    write_file(&source.join("sub/b.txt"), b"bravo", 1_700_000_100);
    write_file(&source.join("sub/deep/c.txt"), b"charlie", 1_700_000_200);
    std::fs::create_dir_all(source.join("empty")).unwrap();

    h.engine.backup(&source, &rp("/apps/rt"), true).await.unwrap();

    let target = h.local("target");
    let stats = h.engine.restore(&target, &rp("/apps/rt"), true).await.unwrap();

    assert_eq!(stats.transferred_files, 3);
    for name in ["a.txt", "sub/b.txt", "sub/deep/c.txt"] {
        assert_eq!(
            std::fs::read(target.join(name)).unwrap(),
            std::fs::read(source.join(name)).unwrap(),
            "{name}"
        );
        assert_eq!(mtime_of(&target.join(name)), mtime_of(&source.join(name)));
    }
    assert!(target.join("empty").is_dir());
}
