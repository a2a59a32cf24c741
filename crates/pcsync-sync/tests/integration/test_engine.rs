//! Combine, Reset and ledger exclusion

use pcsync_cache::SCHEMA_VERSION;
use pcsync_core::domain::action::{backup_signature, restore_signature};
use pcsync_core::domain::ActionStatus;
use pcsync_core::ports::{IActionLedger, ICacheRepository};
use pcsync_sync::SyncError;

use crate::common::{self, rp, write_file, MemoryRemote};

#[tokio::test]
async fn test_combine_merges_both_sides_without_deleting() {
    let h = common::setup().await;
    let local = h.local("docs");
    write_file(&local.join("local_only.txt"), b"L", 1_000);
    write_file(&local.join("shared.txt"), b"local newer", 3_000);
    h.remote.add_file("/apps/docs/remote_only.txt", b"R", 1_000);
    h.remote.add_file("/apps/docs/shared.txt", b"remote older", 2_000);

    let stats = h.engine.combine(&local, &rp("/apps/docs"), true).await.unwrap();

    assert_eq!(stats.backup.transferred_files, 2);
    assert_eq!(stats.backup.removed_files, 0);
    assert_eq!(stats.restore.transferred_files, 1);
    assert_eq!(stats.restore.removed_files, 0);

    assert_eq!(h.remote.content("/apps/docs/local_only.txt").unwrap(), b"L");
    assert_eq!(h.remote.content("/apps/docs/shared.txt").unwrap(), b"local newer");
    assert_eq!(std::fs::read(local.join("remote_only.txt")).unwrap(), b"R");
    assert_eq!(std::fs::read(local.join("shared.txt")).unwrap(), b"local newer");
}

#[tokio::test]
async fn test_combine_does_not_upload_partial_download_files() {
    let h = common::setup().await;
    let local = h.local("docs");
    write_file(&local.join("a.txt"), b"a", 1_000);
    write_file(&local.join(".b.txt.pcsync-tmp"), b"half", 1_000);

    let stats = h.engine.combine(&local, &rp("/apps/docs"), false).await.unwrap();

    assert_eq!(stats.backup.transferred_files, 1);
    assert!(h.remote.exists("/apps/docs/a.txt"));
    assert!(!h.remote.exists("/apps/docs/.b.txt.pcsync-tmp"));
}

#[tokio::test]
async fn test_combine_takes_newer_remote_file() {
    let h = common::setup().await;
    let local = h.local("docs");
    write_file(&local.join("shared.txt"), b"local older", 1_000);
    h.remote.add_file("/apps/docs/shared.txt", b"remote newer", 2_000);

    let stats = h.engine.combine(&local, &rp("/apps/docs"), true).await.unwrap();

    assert_eq!(stats.backup.transferred_files, 0);
    assert_eq!(stats.restore.transferred_files, 1);
    assert_eq!(std::fs::read(local.join("shared.txt")).unwrap(), b"remote newer");
    assert_eq!(h.remote.content("/apps/docs/shared.txt").unwrap(), b"remote newer");
}

#[tokio::test]
async fn test_combine_conflict_leaves_cache_untouched() {
    let h = common::setup().await;
    let local = h.local("docs");
    write_file(&local.join("shared.txt"), b"local", 1_500);
    h.remote.add_file("/apps/docs/shared.txt", b"remote", 1_500);
    let remote_md5 = format!("{:x}", md5::compute(b"remote"));

    let err = h.engine.combine(&local, &rp("/apps/docs"), true).await.unwrap_err();

    assert!(matches!(err, SyncError::Conflict { .. }));
    let cached = h.cache.get(&rp("/apps/docs/shared.txt")).await.unwrap().unwrap();
    assert_eq!(cached.meta.md5.as_deref(), Some(remote_md5.as_str()));
    assert_eq!(h.remote.content("/apps/docs/shared.txt").unwrap(), b"remote");
    assert_eq!(std::fs::read(local.join("shared.txt")).unwrap(), b"local");

    let backup = h
        .ledger
        .get(&backup_signature(&local, &rp("/apps/docs")))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(backup.state(), Some(ActionStatus::Error));
    // Restore never started
    let restore = h
        .ledger
        .get(&restore_signature(&local, &rp("/apps/docs")))
        .await
        .unwrap();
    assert!(restore.is_none());
}

#[tokio::test]
async fn test_reset_flips_running_rows_without_login() {
    let h = common::setup_with(MemoryRemote::logged_out()).await;
    h.ledger.try_start("BACKUP: /data -> /apps").await.unwrap();
    h.ledger.try_start("UPDATE: /apps").await.unwrap();
    h.ledger
        .finish("UPDATE: /apps", ActionStatus::Finished)
        .await
        .unwrap();

    let changed = h.engine.reset().await.unwrap();

    assert_eq!(changed, 1);
    let backup = h.ledger.get("BACKUP: /data -> /apps").await.unwrap().unwrap();
    assert_eq!(backup.state(), Some(ActionStatus::Error));
    let update = h.ledger.get("UPDATE: /apps").await.unwrap().unwrap();
    assert_eq!(update.state(), Some(ActionStatus::Finished));
    assert_eq!(h.ledger.schema_version().await.unwrap(), SCHEMA_VERSION);
}

#[tokio::test]
async fn test_busy_backup_leaves_holder_row_running() {
    let h = common::setup().await;
    let local = h.local("docs");
    write_file(&local.join("a.txt"), b"a", 1_000);
    let signature = backup_signature(&local, &rp("/apps/docs"));
    h.ledger.try_start(&signature).await.unwrap();

    let err = h.engine.backup(&local, &rp("/apps/docs"), false).await.unwrap_err();

    assert!(matches!(err, SyncError::Busy { .. }));
    assert!(h.ledger.get(&signature).await.unwrap().unwrap().is_running());
    assert_eq!(MemoryRemote::calls(&h.remote.upload_calls), 0);
}

#[tokio::test]
async fn test_backup_waits_for_no_running_update() {
    let h = common::setup().await;
    let local = h.local("docs");
    write_file(&local.join("a.txt"), b"a", 1_000);
    h.ledger.try_start("UPDATE: /apps/docs").await.unwrap();

    let err = h.engine.backup(&local, &rp("/apps/docs"), false).await.unwrap_err();

    assert!(matches!(err, SyncError::Busy { .. }));
    // The backup claimed its own row, so that row ends in ERROR
    let row = h
        .ledger
        .get(&backup_signature(&local, &rp("/apps/docs")))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.state(), Some(ActionStatus::Error));
    assert!(h.ledger.get("UPDATE: /apps/docs").await.unwrap().unwrap().is_running());
}

#[tokio::test]
async fn test_finished_update_is_not_repeated() {
    let h = common::setup().await;
    h.remote.add_file("/apps/docs/a.txt", b"a", 1_000);
    let local = h.local("docs");

    h.engine.restore(&local, &rp("/apps/docs"), false).await.unwrap();
    let after_first = MemoryRemote::calls(&h.remote.list_calls);
    h.engine.restore(&local, &rp("/apps/docs"), false).await.unwrap();

    assert_eq!(after_first, 1);
    assert_eq!(MemoryRemote::calls(&h.remote.list_calls), after_first);
}
