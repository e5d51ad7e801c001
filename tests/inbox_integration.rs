//! Inbox 端到端测试
//!
//! 覆盖入库 → 查询 → 送付 → 删除的完整生命周期，以及容量边界、
//! 登记失败时的回滚等跨模块行为。

use assert_matches::assert_matches;
use rusqlite::Connection;
use tempfile::TempDir;
use walkdir::WalkDir;

use portal_inbox::paths::{items_db_path, send_log_path, user_root};
use portal_inbox::quota::folder_size_bytes;
use portal_inbox::{
    delete_item, ensure_user_dirs, ingest_to_inbox, read_item_bytes, send_item_copy,
    InboxConfig, InboxError, IngestRequest, ItemKind, ItemsStore, ThumbStatus,
};

fn config_with_quota(quota_bytes: u64) -> InboxConfig {
    InboxConfig {
        quota_bytes,
        ..InboxConfig::default()
    }
}

/// 用户目录下的普通文件数（_meta 的 DB 文件除外）
fn stored_file_count(inbox_root: &std::path::Path, sub: &str) -> usize {
    WalkDir::new(user_root(inbox_root, sub))
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| !e.path().components().any(|c| c.as_os_str() == "_meta"))
        .count()
}

#[test]
fn test_ingest_fails_when_root_missing() {
    let tmp = TempDir::new().expect("tempdir");
    let missing = tmp.path().join("no_such_root");

    let err = ingest_to_inbox(
        &missing,
        &InboxConfig::default(),
        IngestRequest::new("alice", "a.txt", b"hello".to_vec()),
    )
    .expect_err("missing root must fail");
    assert_matches!(err, InboxError::NotAvailable(_));
}

#[test]
fn test_quota_boundary_exact_fit_passes_one_byte_over_fails() {
    let tmp = TempDir::new().expect("tempdir");
    let root = tmp.path();

    // DB ファイル等も容量に数えるので、実測値を基準に上限を組む
    ensure_user_dirs(root, "alice").expect("dirs");
    ItemsStore::new(items_db_path(root, "alice"))
        .ensure_schema()
        .expect("schema");

    let current = folder_size_bytes(&user_root(root, "alice"));
    let quota = current + 40;

    // ちょうど收まる：成功
    ingest_to_inbox(
        root,
        &config_with_quota(quota),
        IngestRequest::new("alice", "fit.bin", vec![0u8; 40]),
    )
    .expect("exact fit must pass");

    // 1 バイト超過：QuotaExceeded（内訳付き）
    let current2 = folder_size_bytes(&user_root(root, "alice"));
    let quota2 = current2 + 40;
    let err = ingest_to_inbox(
        root,
        &config_with_quota(quota2),
        IngestRequest::new("alice", "over.bin", vec![0u8; 41]),
    )
    .expect_err("one byte over must fail");
    match err {
        InboxError::QuotaExceeded {
            current,
            incoming,
            quota,
        } => {
            assert_eq!(current, current2);
            assert_eq!(incoming, 41);
            assert_eq!(quota, quota2);
        }
        other => panic!("expected QuotaExceeded, got {:?}", other),
    }
}

#[test]
fn test_insert_failure_rolls_back_written_file() {
    let tmp = TempDir::new().expect("tempdir");
    let root = tmp.path();

    ensure_user_dirs(root, "alice").expect("dirs");
    let store = ItemsStore::new(items_db_path(root, "alice"));
    store.ensure_schema().expect("schema");

    // INSERT だけを人工的に失敗させる（schema 保証はそのまま通る）
    {
        let conn = Connection::open(store.db_path()).expect("open");
        conn.execute_batch(
            "CREATE TRIGGER block_inserts BEFORE INSERT ON inbox_items
             BEGIN SELECT RAISE(ABORT, 'insert disabled'); END;",
        )
        .expect("create trigger");
    }

    let err = ingest_to_inbox(
        root,
        &InboxConfig::default(),
        IngestRequest::new("alice", "doomed.bin", vec![1u8; 16]),
    )
    .expect_err("insert failure must surface");
    assert_matches!(err, InboxError::IngestFailed(_));

    // ファイルは残っていない（孤児ファイル禁止）、行も無い
    assert_eq!(stored_file_count(root, "alice"), 0);
    let conn = Connection::open(store.db_path()).expect("open");
    let rows: i64 = conn
        .query_row("SELECT COUNT(*) FROM inbox_items", [], |r| r.get(0))
        .expect("count");
    assert_eq!(rows, 0);
}

#[test]
fn test_pdf_lifecycle_ingest_fetch_delete() {
    let tmp = TempDir::new().expect("tempdir");
    let root = tmp.path();

    let result = ingest_to_inbox(
        root,
        &InboxConfig::default(),
        IngestRequest::new("alice", "report.pdf", b"0123456789".to_vec()),
    )
    .expect("ingest");

    assert_eq!(result.kind, ItemKind::Pdf);
    assert_eq!(result.size_bytes, 10);
    assert_eq!(result.thumb_status, ThumbStatus::None);
    assert!(result.stored_rel.starts_with("pdf/files/"));
    assert!(result.stored_rel.contains(&result.item_id));

    let store = ItemsStore::new(items_db_path(root, "alice"));
    let row = store
        .fetch_by_id(&result.item_id)
        .expect("fetch")
        .expect("row present");
    assert_eq!(row.kind, ItemKind::Pdf);
    assert_eq!(row.size_bytes, 10);
    assert_eq!(row.thumb_status, ThumbStatus::None);
    assert_eq!(row.thumb_rel, "");
    assert_eq!(row.original_name, "report.pdf");
    assert_eq!(row.origin_type, "");

    // 実体も読める
    let picked = read_item_bytes(root, "alice", &result.item_id).expect("read");
    assert_eq!(picked.data, b"0123456789");
    assert_eq!(picked.kind, ItemKind::Pdf);

    // 削除：行と実体が両方消える
    delete_item(root, "alice", &result.item_id).expect("delete");
    assert!(store.fetch_by_id(&result.item_id).expect("fetch").is_none());
    assert_eq!(stored_file_count(root, "alice"), 0);

    // 二重削除は NotFound
    let err = delete_item(root, "alice", &result.item_id).expect_err("second delete");
    assert_matches!(err, InboxError::NotFound(_));
}

#[test]
fn test_image_ingest_generates_thumbnail() {
    let tmp = TempDir::new().expect("tempdir");
    let root = tmp.path();

    // 有効な PNG をメモリ上で作る
    let mut png_bytes = Vec::new();
    {
        use image::{Rgb, RgbImage};
        let img = RgbImage::from_pixel(400, 300, Rgb([200, 30, 30]));
        let mut cursor = std::io::Cursor::new(&mut png_bytes);
        img.write_to(&mut cursor, image::ImageOutputFormat::Png)
            .expect("encode png");
    }

    let result = ingest_to_inbox(
        root,
        &InboxConfig::default(),
        IngestRequest::new("alice", "photo.png", png_bytes),
    )
    .expect("ingest image");

    assert_eq!(result.kind, ItemKind::Image);
    assert_eq!(result.thumb_status, ThumbStatus::Ok);

    let store = ItemsStore::new(items_db_path(root, "alice"));
    let row = store
        .fetch_by_id(&result.item_id)
        .expect("fetch")
        .expect("present");
    assert_eq!(row.thumb_status, ThumbStatus::Ok);
    assert_eq!(row.thumb_rel, format!("image/thumbs/{}.webp", result.item_id));
    assert!(user_root(root, "alice").join(&row.thumb_rel).is_file());

    // 削除でサムネも消える
    delete_item(root, "alice", &result.item_id).expect("delete");
    assert!(!user_root(root, "alice").join(&row.thumb_rel).exists());
}

#[test]
fn test_send_copy_provenance_and_log() {
    let tmp = TempDir::new().expect("tempdir");
    let root = tmp.path();
    let config = InboxConfig::default();

    let src = ingest_to_inbox(
        root,
        &config,
        IngestRequest::new("alice", "spec.pdf", b"pdf-bytes".to_vec())
            .with_tags_json(r#"["projectx","urgent"]"#),
    )
    .expect("ingest");

    let new_id = send_item_copy(root, &config, "alice", "bob", &src.item_id).expect("send");
    assert_ne!(new_id, src.item_id);

    // 送付先：origin_* とタグが引き継がれる
    let bob_store = ItemsStore::new(items_db_path(root, "bob"));
    let copy = bob_store
        .fetch_by_id(&new_id)
        .expect("fetch")
        .expect("copy present");
    assert_eq!(copy.kind, ItemKind::Pdf);
    assert_eq!(copy.origin_user, "alice");
    assert_eq!(copy.origin_item_id, src.item_id);
    assert_eq!(copy.origin_type, "copy");
    assert_eq!(copy.tags_json, r#"["projectx","urgent"]"#);
    assert_eq!(copy.original_name, "spec.pdf");

    // コピーの実体は独立（中身は同一）
    let picked = read_item_bytes(root, "bob", &new_id).expect("read copy");
    assert_eq!(picked.data, b"pdf-bytes");

    // 送付元は無傷
    let alice_store = ItemsStore::new(items_db_path(root, "alice"));
    let original = alice_store
        .fetch_by_id(&src.item_id)
        .expect("fetch")
        .expect("original present");
    assert_eq!(original.origin_type, "");
    assert_eq!(original.tags_json, r#"["projectx","urgent"]"#);
    let picked = read_item_bytes(root, "alice", &src.item_id).expect("read original");
    assert_eq!(picked.data, b"pdf-bytes");

    // 送付ログ（JSONL）：1 行追記されている
    let log = std::fs::read_to_string(send_log_path(root)).expect("send log");
    let last = log.lines().last().expect("at least one line");
    let rec: serde_json::Value = serde_json::from_str(last).expect("valid json line");
    assert_eq!(rec["from_user"], "alice");
    assert_eq!(rec["to_user"], "bob");
    assert_eq!(rec["origin_item_id"], src.item_id.as_str());
    assert_eq!(rec["new_item_id"], new_id.as_str());
    assert_eq!(rec["kind"], "pdf");
    assert_eq!(rec["origin_type"], "copy");
    assert_eq!(rec["origin_name"], "spec.pdf");
    assert_eq!(rec["tags"], serde_json::json!(["projectx", "urgent"]));
}

#[test]
fn test_send_rejects_same_or_blank_users_and_missing_item() {
    let tmp = TempDir::new().expect("tempdir");
    let root = tmp.path();
    let config = InboxConfig::default();

    let err = send_item_copy(root, &config, "alice", "alice", "x").expect_err("same user");
    assert_matches!(err, InboxError::IngestFailed(_));
    let err = send_item_copy(root, &config, "", "bob", "x").expect_err("blank user");
    assert_matches!(err, InboxError::IngestFailed(_));

    // alice に DB を作ってから、存在しない item を送る
    ingest_to_inbox(
        root,
        &config,
        IngestRequest::new("alice", "a.txt", b"x".to_vec()),
    )
    .expect("ingest");
    let err = send_item_copy(root, &config, "alice", "bob", "no-such-item")
        .expect_err("missing item");
    assert_matches!(err, InboxError::NotFound(_));
}

#[test]
fn test_send_respects_destination_quota() {
    let tmp = TempDir::new().expect("tempdir");
    let root = tmp.path();

    let src = ingest_to_inbox(
        root,
        &InboxConfig::default(),
        IngestRequest::new("alice", "big.bin", vec![0u8; 64]),
    )
    .expect("ingest");

    // 送付先の上限を足りなくしておく
    ensure_user_dirs(root, "bob").expect("dirs");
    let bob_current = folder_size_bytes(&user_root(root, "bob"));
    let err = send_item_copy(
        root,
        &config_with_quota(bob_current + 10),
        "alice",
        "bob",
        &src.item_id,
    )
    .expect_err("destination over quota");
    assert_matches!(err, InboxError::QuotaExceeded { incoming: 64, .. });
}
