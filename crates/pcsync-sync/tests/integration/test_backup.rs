//! Backup: local to remote with mark-and-sweep deletion

use pcsync_core::domain::action::backup_signature;
use pcsync_core::domain::{ActionStatus, SyncFlag};
use pcsync_core::ports::{IActionLedger, ICacheRepository};
use pcsync_sync::SyncError;

use crate::common::{self, mtime_of, rp, write_file, MemoryRemote};

#[tokio::test]
async fn test_backup_uploads_new_and_skips_identical_with_md5() {
    let h = common::setup().await;
    let local = h.local("docs");
    write_file(&local.join("a.txt"), b"alpha", 1_700_000_000);
    write_file(&local.join("b.txt"), b"bravo", 1_700_000_000);
    h.remote.add_file("/apps/docs/b.txt", b"bravo", 1_600_000_000);

    let stats = h.engine.backup(&local, &rp("/apps/docs"), true).await.unwrap();

    assert_eq!(stats.transferred_files, 1);
    assert_eq!(stats.skipped_files, 1);
    assert_eq!(stats.total_files, 2);
    assert_eq!(stats.skipped_dirs, 1);
    assert_eq!(MemoryRemote::calls(&h.remote.upload_calls), 1);
    assert_eq!(h.remote.content("/apps/docs/a.txt").unwrap(), b"alpha");
    assert_eq!(h.remote.mtime("/apps/docs/a.txt"), Some(1_700_000_000));

    let a = h.cache.get(&rp("/apps/docs/a.txt")).await.unwrap().unwrap();
    assert_eq!(a.flag, SyncFlag::Succ);
    assert_eq!(a.meta.server_mtime, 1_700_000_000);

    let row = h
        .ledger
        .get(&backup_signature(&local, &rp("/apps/docs")))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.state(), Some(ActionStatus::Finished));
}

#[tokio::test]
async fn test_backup_md5_mismatch_uploads_even_if_remote_is_newer() {
    let h = common::setup().await;
    let local = h.local("docs");
    write_file(&local.join("a.txt"), b"local", 1_000);
    h.remote.add_file("/apps/docs/a.txt", b"remote", 2_000);

    let stats = h.engine.backup(&local, &rp("/apps/docs"), true).await.unwrap();

    assert_eq!(stats.transferred_files, 1);
    assert_eq!(h.remote.content("/apps/docs/a.txt").unwrap(), b"local");
}

#[tokio::test]
async fn test_backup_md5_mismatch_with_equal_mtimes_is_a_conflict() {
    let h = common::setup().await;
    let local = h.local("docs");
    write_file(&local.join("a.txt"), b"local", 1_500);
    h.remote.add_file("/apps/docs/a.txt", b"remote", 1_500);
    let remote_md5 = format!("{:x}", md5::compute(b"remote"));

    let err = h.engine.backup(&local, &rp("/apps/docs"), true).await.unwrap_err();

    assert!(matches!(err, SyncError::Conflict { .. }));
    assert_eq!(MemoryRemote::calls(&h.remote.upload_calls), 0);
    assert_eq!(h.remote.content("/apps/docs/a.txt").unwrap(), b"remote");
    let cached = h.cache.get(&rp("/apps/docs/a.txt")).await.unwrap().unwrap();
    assert_eq!(cached.meta.md5.as_deref(), Some(remote_md5.as_str()));
    assert_eq!(cached.meta.server_mtime, 1_500);

    let row = h
        .ledger
        .get(&backup_signature(&local, &rp("/apps/docs")))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.state(), Some(ActionStatus::Error));
}

#[tokio::test]
async fn test_backup_ignores_partial_download_files() {
    let h = common::setup().await;
    let local = h.local("docs");
    write_file(&local.join("a.txt"), b"a", 1_000);
    write_file(&local.join(".b.txt.pcsync-tmp"), b"half", 1_000);

    let stats = h.engine.backup(&local, &rp("/apps/docs"), false).await.unwrap();

    assert_eq!(stats.transferred_files, 1);
    assert_eq!(stats.total_files, 1);
    assert!(!h.remote.exists("/apps/docs/.b.txt.pcsync-tmp"));
}

#[tokio::test]
async fn test_backup_without_md5_compares_mtimes() {
    let h = common::setup().await;
    let local = h.local("docs");
    write_file(&local.join("old.txt"), b"local old", 1_000);
    write_file(&local.join("new.txt"), b"local new", 3_000);
    h.remote.add_file("/apps/docs/old.txt", b"remote", 2_000);
    h.remote.add_file("/apps/docs/new.txt", b"remote", 2_000);

    let stats = h.engine.backup(&local, &rp("/apps/docs"), false).await.unwrap();

    assert_eq!(stats.transferred_files, 1);
    assert_eq!(stats.skipped_files, 1);
    assert_eq!(h.remote.content("/apps/docs/old.txt").unwrap(), b"remote");
    assert_eq!(h.remote.content("/apps/docs/new.txt").unwrap(), b"local new");
}

#[tokio::test]
async fn test_backup_creates_missing_directories() {
    let h = common::setup().await;
    let local = h.local("tree");
    write_file(&local.join("sub/deeper/f.txt"), b"f", 1_000);

    let stats = h.engine.backup(&local, &rp("/apps/tree"), false).await.unwrap();

    assert_eq!(stats.transferred_dirs, 3);
    assert_eq!(stats.total_dirs, 3);
    assert_eq!(stats.transferred_files, 1);
    assert!(h.remote.is_dir("/apps/tree/sub/deeper"));
    assert_eq!(h.remote.content("/apps/tree/sub/deeper/f.txt").unwrap(), b"f");

    let dir = h.cache.get(&rp("/apps/tree/sub")).await.unwrap().unwrap();
    assert!(dir.is_dir());
    assert_eq!(dir.flag, SyncFlag::Succ);
}

#[tokio::test]
async fn test_backup_removes_remote_only_objects() {
    let h = common::setup().await;
    let local = h.local("docs");
    write_file(&local.join("a.txt"), b"a", 1_000);
    h.remote.add_file("/apps/docs/a.txt", b"a", 1_000);
    h.remote.add_file("/apps/docs/old.txt", b"o", 1_000);
    h.remote.add_file("/apps/docs/olddir/x.txt", b"x", 1_000);

    let stats = h.engine.backup(&local, &rp("/apps/docs"), false).await.unwrap();

    assert_eq!(stats.removed_files, 2);
    assert_eq!(stats.removed_dirs, 1);
    assert!(h.remote.exists("/apps/docs/a.txt"));
    assert!(!h.remote.exists("/apps/docs/old.txt"));
    assert!(!h.remote.exists("/apps/docs/olddir"));
    // old.txt and olddir in one call; x.txt went with its directory
    assert_eq!(MemoryRemote::calls(&h.remote.delete_calls), 1);
    assert!(h.cache.get(&rp("/apps/docs/olddir/x.txt")).await.unwrap().is_none());
    assert!(h.cache.list_untracked(&rp("/apps/docs")).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_backup_deletes_in_batches_of_ten() {
    let h = common::setup().await;
    let local = h.local("docs");
    std::fs::create_dir_all(&local).unwrap();
    for i in 0..25 {
        h.remote.add_file(&format!("/apps/docs/stale{i:02}.txt"), b"s", 1_000);
    }

    let stats = h.engine.backup(&local, &rp("/apps/docs"), false).await.unwrap();

    assert_eq!(stats.removed_files, 25);
    assert_eq!(MemoryRemote::calls(&h.remote.delete_calls), 3);
    assert!(h.remote.is_dir("/apps/docs"));
}

#[tokio::test]
async fn test_backup_replaces_remote_file_with_directory() {
    let h = common::setup().await;
    let local = h.local("docs");
    write_file(&local.join("thing/inner.txt"), b"i", 1_000);
    h.remote.add_file("/apps/docs/thing", b"was a file", 1_000);

    let stats = h.engine.backup(&local, &rp("/apps/docs"), false).await.unwrap();

    assert_eq!(stats.removed_files, 1);
    assert!(h.remote.is_dir("/apps/docs/thing"));
    assert_eq!(h.remote.content("/apps/docs/thing/inner.txt").unwrap(), b"i");
}

#[tokio::test]
async fn test_backup_single_file_root() {
    let h = common::setup().await;
    let local = h.local("single.txt");
    write_file(&local, b"only", 1_234);

    let stats = h
        .engine
        .backup(&local, &rp("/apps/single.txt"), false)
        .await
        .unwrap();

    assert_eq!(stats.transferred_files, 1);
    assert_eq!(stats.total_dirs, 0);
    assert_eq!(h.remote.mtime("/apps/single.txt"), Some(mtime_of(&local)));
}

#[tokio::test]
async fn test_backup_refuses_with_insufficient_quota() {
    let h = common::setup_with(MemoryRemote::with_quota(5 * 1024 * 1024)).await;
    let local = h.local("docs");
    write_file(&local.join("a.txt"), b"a", 1_000);

    let err = h.engine.backup(&local, &rp("/apps/docs"), false).await.unwrap_err();

    assert!(matches!(err, SyncError::InsufficientQuota { .. }));
    assert_eq!(MemoryRemote::calls(&h.remote.upload_calls), 0);
    let signature = backup_signature(&local, &rp("/apps/docs"));
    assert!(h.ledger.get(&signature).await.unwrap().is_none());
}

#[tokio::test]
async fn test_backup_missing_local_root_marks_error() {
    let h = common::setup().await;
    let local = h.local("absent");

    let err = h.engine.backup(&local, &rp("/apps/docs"), false).await.unwrap_err();

    assert!(matches!(err, SyncError::LocalIo(_)));
    let row = h
        .ledger
        .get(&backup_signature(&local, &rp("/apps/docs")))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.state(), Some(ActionStatus::Error));
}

#[tokio::test]
async fn test_backup_requires_login() {
    let h = common::setup_with(MemoryRemote::logged_out()).await;
    let local = h.local("docs");
    write_file(&local.join("a.txt"), b"a", 1_000);

    let err = h.engine.backup(&local, &rp("/apps/docs"), false).await.unwrap_err();

    assert!(matches!(err, SyncError::Auth(_)));
    assert!(h.ledger.list_all().await.unwrap().iter().all(|r| r.is_version_row()));
}
