//! Compare: dry-run report

use pcsync_core::domain::action::compare_signature;
use pcsync_core::domain::{ActionStatus, SyncFlag};
use pcsync_core::ports::{IActionLedger, ICacheRepository, SubtreeOrder};
use pcsync_sync::SyncError;

use crate::common::{self, rp, write_file, MemoryRemote};

#[tokio::test]
async fn test_compare_after_backup_is_clean() {
    let h = common::setup().await;
    let local = h.local("docs");
    write_file(&local.join("a.txt"), b"alpha", 1_700_000_000);
    write_file(&local.join("sub/b.txt"), b"bravo", 1_700_000_000);
    h.engine.backup(&local, &rp("/apps/docs"), true).await.unwrap();

    let with_md5 = h.engine.compare(&local, &rp("/apps/docs"), true).await.unwrap();
    let by_mtime = h.engine.compare(&local, &rp("/apps/docs"), false).await.unwrap();

    assert!(with_md5.is_clean(), "{}", with_md5.render());
    assert!(by_mtime.is_clean(), "{}", by_mtime.render());
}

#[tokio::test]
async fn test_compare_reports_every_kind_of_difference() {
    let h = common::setup().await;
    h.remote.add_file("/r/newer.txt", b"remote", 2_000);
    h.remote.add_file("/r/older.txt", b"remote", 500);
    h.remote.add_file("/r/only_remote.txt", b"remote", 1_000);
    h.remote.add_dir("/r/rdir");
    let local = h.local("l");
    write_file(&local.join("newer.txt"), b"local", 1_000);
    write_file(&local.join("older.txt"), b"local", 1_000);
    write_file(&local.join("only_local.txt"), b"local", 1_000);
    write_file(&local.join("ldir/f.txt"), b"local", 1_000);

    let report = h.engine.compare(&local, &rp("/r"), false).await.unwrap();

    let l = local.display();
    let rows: Vec<String> = report.items.iter().map(ToString::to_string).collect();
    assert_eq!(
        rows,
        [
            "V F R:/r/newer.txt".to_string(),
            format!("A F L:{l}/older.txt"),
            format!("+ F L:{l}/only_remote.txt"),
            format!("+ D L:{l}/rdir"),
            "+ D R:/r/ldir".to_string(),
            "+ F R:/r/ldir/f.txt".to_string(),
            "+ F R:/r/only_local.txt".to_string(),
        ]
    );

    let totals = report.totals();
    assert_eq!(totals.download, 1);
    assert_eq!(totals.upload, 1);
    assert_eq!(totals.create_local_file, 1);
    assert_eq!(totals.create_local_dir, 1);
    assert_eq!(totals.create_remote_dir, 1);
    assert_eq!(totals.create_remote_file, 2);
    assert_eq!(totals.total, 7);
    assert!(report.render().contains("Upload 1 Local File, Download 1 Remote File."));
}

#[tokio::test]
async fn test_compare_checks_each_cached_directory() {
    let h = common::setup().await;
    h.remote.add_dir("/r/a");
    h.remote.add_dir("/r/b");
    let local = h.local("l");
    std::fs::create_dir_all(local.join("a")).unwrap();
    write_file(&local.join("b"), b"file where a dir should be", 1_000);

    let report = h.engine.compare(&local, &rp("/r"), false).await.unwrap();

    let rows: Vec<String> = report.items.iter().map(ToString::to_string).collect();
    assert_eq!(rows, [format!("- F L:{}/b", local.display())]);
}

#[tokio::test]
async fn test_compare_file_against_local_directory() {
    let h = common::setup().await;
    h.remote.add_file("/r/thing", b"file", 1_000);
    let local = h.local("l");
    std::fs::create_dir_all(local.join("thing")).unwrap();

    let report = h.engine.compare(&local, &rp("/r"), false).await.unwrap();

    let path = local.join("thing").display().to_string();
    let rows: Vec<String> = report.items.iter().map(ToString::to_string).collect();
    assert_eq!(rows, [format!("- D L:{path}"), format!("+ F L:{path}")]);
}

#[tokio::test]
async fn test_compare_leaves_everything_untouched() {
    let h = common::setup().await;
    h.remote.add_file("/r/a.txt", b"remote", 2_000);
    let local = h.local("l");
    write_file(&local.join("a.txt"), b"local", 1_000);
    write_file(&local.join("b.txt"), b"local", 1_000);

    h.engine.compare(&local, &rp("/r"), false).await.unwrap();

    assert_eq!(MemoryRemote::calls(&h.remote.upload_calls), 0);
    assert_eq!(MemoryRemote::calls(&h.remote.download_calls), 0);
    assert_eq!(MemoryRemote::calls(&h.remote.delete_calls), 0);
    assert_eq!(std::fs::read(local.join("a.txt")).unwrap(), b"local");
    let cached = h
        .cache
        .list_subtree(&rp("/r"), SubtreeOrder::ByPath)
        .await
        .unwrap();
    assert!(cached.iter().all(|e| e.flag == SyncFlag::Unset));
}

#[tokio::test]
async fn test_compare_conflict_on_same_mtime_different_content() {
    let h = common::setup().await;
    h.remote.add_file("/r/a.txt", b"remote", 1_000);
    let local = h.local("l");
    write_file(&local.join("a.txt"), b"local", 1_000);

    let err = h.engine.compare(&local, &rp("/r"), true).await.unwrap_err();

    assert!(matches!(err, SyncError::Conflict { .. }));
    let row = h
        .ledger
        .get(&compare_signature(&local, &rp("/r")))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.state(), Some(ActionStatus::Error));
}

#[tokio::test]
async fn test_compare_requires_cached_root() {
    let h = common::setup().await;
    let local = h.local("l");
    std::fs::create_dir_all(&local).unwrap();

    let err = h.engine.compare(&local, &rp("/missing"), false).await.unwrap_err();

    assert!(matches!(err, SyncError::RemoteNotFound(_)));
}

#[tokio::test]
async fn test_compare_does_not_report_partial_download_files() {
    let h = common::setup().await;
    let local = h.local("docs");
    write_file(&local.join("a.txt"), b"alpha", 1_700_000_000);
    h.engine.backup(&local, &rp("/apps/docs"), false).await.unwrap();
    write_file(&local.join(".b.txt.pcsync-tmp"), b"half", 1_700_000_000);

    let report = h.engine.compare(&local, &rp("/apps/docs"), false).await.unwrap();

    assert!(report.is_clean(), "{}", report.render());
}
