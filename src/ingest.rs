//! 他アプリ → Inbox 保存（正本 API、UI なし）
//!
//! 失敗は全部 [`InboxError`] で呼び出し元へ（UI 側が warning / error 表示）。
//! 流程：根目录确认 → 用户目录 + schema 准备 → 容量判定 → 种别判定 →
//! 日付目录下写文件 → 目录登记（失败时回滚删文件）→ 缩略图。
//!
//! 不变式：磁盘上的文件和目录行要么都在要么都不在（写文件成功而登记
//! 失败时，文件会被尽力删除）。

use std::fs;
use std::path::Path;

use tracing::{info, warn};
use uuid::Uuid;

use crate::config::InboxConfig;
use crate::error::{InboxError, InboxResult};
use crate::items_store::ItemsStore;
use crate::paths::{ensure_user_dirs, items_db_path};
use crate::quota::folder_size_bytes;
use crate::thumb::ensure_thumb_sized;
use crate::types::{IngestRequest, IngestResult, InboxItem, ItemKind, ThumbStatus};
use crate::util::{now_iso_jst, safe_filename, SAFE_FILENAME_MAX_LEN};

/// 生のバイト列を 1 件の Inbox 条目にする
pub fn ingest_to_inbox(
    inbox_root: &Path,
    config: &InboxConfig,
    req: IngestRequest,
) -> InboxResult<IngestResult> {
    // ------------------------------------------------------------
    // Inbox root 確認（無ければ UI 側で警告できるようにエラー）
    // ------------------------------------------------------------
    if !inbox_root.exists() {
        return Err(InboxError::NotAvailable(format!(
            "Inbox root not found: {}",
            inbox_root.display()
        )));
    }

    // ------------------------------------------------------------
    // ユーザー配下準備（ディレクトリ＋DB）
    // ------------------------------------------------------------
    let dirs = ensure_user_dirs(inbox_root, &req.user_sub)?;
    let items_store = ItemsStore::new(items_db_path(inbox_root, &req.user_sub));
    items_store.ensure_schema()?;

    // ------------------------------------------------------------
    // 容量チェック（保存前に判定）
    // ------------------------------------------------------------
    let current = folder_size_bytes(dirs.root());
    let incoming = req.data.len() as u64;
    let quota = config.quota_bytes_for_user(&req.user_sub);
    if current + incoming > quota {
        return Err(InboxError::QuotaExceeded {
            current,
            incoming,
            quota,
        });
    }

    // ------------------------------------------------------------
    // 保存先決定（kind 別 / YYYY/MM/DD）
    // ------------------------------------------------------------
    let kind = ItemKind::from_filename(&req.filename);
    let added_at = now_iso_jst();
    // added_at 先頭 10 文字（YYYY-MM-DD）→ YYYY/MM/DD
    let day_dir = dirs.files_dir(kind).join(added_at[..10].replace('-', "/"));
    fs::create_dir_all(&day_dir)?;

    let item_id = Uuid::new_v4().to_string();
    let safe_name = safe_filename(&req.filename, SAFE_FILENAME_MAX_LEN);
    let out_path = day_dir.join(format!("{}__{}", item_id, safe_name));

    // ------------------------------------------------------------
    // 実体保存
    // ------------------------------------------------------------
    if let Err(e) = fs::write(&out_path, &req.data) {
        return Err(InboxError::IngestFailed(format!(
            "Failed to write file: {}",
            e
        )));
    }

    let stored_rel = out_path
        .strip_prefix(dirs.root())
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_else(|_| out_path.to_string_lossy().into_owned());

    // ------------------------------------------------------------
    // DB 登録（失敗したらロールバック：ファイル削除）
    // ------------------------------------------------------------
    let item = InboxItem {
        item_id: item_id.clone(),
        kind,
        stored_rel: stored_rel.clone(),
        original_name: req.filename.clone(),
        added_at,
        size_bytes: incoming,
        note: String::new(),
        tags_json: if req.tags_json.is_empty() {
            "[]".to_string()
        } else {
            req.tags_json.clone()
        },
        thumb_rel: String::new(),
        thumb_status: ThumbStatus::None,
        thumb_error: String::new(),
        origin_user: req.origin.user.clone(),
        origin_item_id: req.origin.item_id.clone(),
        origin_type: req.origin.origin_type.clone(),
    };

    if let Err(e) = items_store.insert(&item) {
        if let Err(rm_err) = fs::remove_file(&out_path) {
            warn!(
                "[Inbox::Ingest] rollback unlink failed for {}: {}",
                out_path.display(),
                rm_err
            );
        }
        return Err(InboxError::IngestFailed(format!("DB insert failed: {}", e)));
    }

    // ------------------------------------------------------------
    // サムネ（image のみ。その他は none に正規化）
    // ------------------------------------------------------------
    let outcome = ensure_thumb_sized(
        inbox_root,
        &req.user_sub,
        &items_store,
        &item_id,
        kind,
        &stored_rel,
        None,
        None,
        config.thumb_width,
        config.thumb_height,
        config.thumb_quality,
    );

    info!(
        "[Inbox::Ingest] stored item={} user={} kind={} size={} thumb={}",
        item_id, req.user_sub, kind, incoming, outcome.status
    );

    Ok(IngestResult {
        item_id,
        kind,
        stored_rel,
        size_bytes: incoming,
        thumb_status: outcome.status,
    })
}
