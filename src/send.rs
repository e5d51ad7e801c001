//! Inbox「送付（コピー）」の正本 API（UI なし）
//!
//! from_user の条目を读出，向 to_user 的 Inbox 复制成一个全新条目。
//! 标签原样保留，`origin_*` 三列记录出处。缩略图只对 image 生成。
//! 送付结果追记到 `<inbox_root>/_meta/send_log.jsonl`（一行一 JSON），
//! 日志写失败只告警，不影响送付本体。
//!
//! 注意：源用户和目标用户是两个独立的单用户写入，之间没有跨库事务。

use std::fs;
use std::io::Write;
use std::path::Path;

use serde_json::{json, Value};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::InboxConfig;
use crate::error::{InboxError, InboxResult};
use crate::items_store::ItemsStore;
use crate::paths::{ensure_user_dirs, items_db_path, resolve_file_path, send_log_path};
use crate::quota::folder_size_bytes;
use crate::thumb::ensure_thumb_sized;
use crate::types::{InboxItem, ItemKind, ThumbStatus};
use crate::util::{now_iso_jst, safe_filename, SAFE_FILENAME_MAX_LEN};

/// 送付（コピー）。戻り値は送付先で採番された new_item_id。
pub fn send_item_copy(
    inbox_root: &Path,
    config: &InboxConfig,
    from_user: &str,
    to_user: &str,
    item_id: &str,
) -> InboxResult<String> {
    if !inbox_root.exists() {
        return Err(InboxError::NotAvailable(format!(
            "Inbox root not found: {}",
            inbox_root.display()
        )));
    }

    if from_user.trim().is_empty() || to_user.trim().is_empty() || from_user == to_user {
        return Err(InboxError::IngestFailed("invalid from/to user".to_string()));
    }

    // ------------------------------------------------------------
    // 送付元 item の情報取得
    // ------------------------------------------------------------
    let from_items_db = items_db_path(inbox_root, from_user);
    if !from_items_db.exists() {
        return Err(InboxError::IngestFailed(format!(
            "items db not found: {}",
            from_items_db.display()
        )));
    }
    let from_store = ItemsStore::new(&from_items_db);
    let row = from_store
        .fetch_by_id(item_id)?
        .ok_or_else(|| InboxError::NotFound(format!("item not found: {}", item_id)))?;

    if row.stored_rel.is_empty() {
        return Err(InboxError::IngestFailed("stored_rel missing".to_string()));
    }
    let src_path = resolve_file_path(inbox_root, from_user, &row.stored_rel);
    if !src_path.exists() {
        return Err(InboxError::IngestFailed(format!(
            "source file not found: {}",
            src_path.display()
        )));
    }

    let data = fs::read(&src_path)?;
    let incoming = data.len() as u64;

    // ------------------------------------------------------------
    // 容量チェック（送付先）
    // ------------------------------------------------------------
    let to_dirs = ensure_user_dirs(inbox_root, to_user)?;
    let current = folder_size_bytes(to_dirs.root());
    let quota = config.quota_bytes_for_user(to_user);
    if current + incoming > quota {
        return Err(InboxError::QuotaExceeded {
            current,
            incoming,
            quota,
        });
    }

    // ------------------------------------------------------------
    // 送付先へ保存（kind 別 / YYYY/MM/DD）
    // ------------------------------------------------------------
    let kind = row.kind;
    let added_at = now_iso_jst();
    let day_dir = to_dirs.files_dir(kind).join(added_at[..10].replace('-', "/"));
    fs::create_dir_all(&day_dir)?;

    let new_item_id = Uuid::new_v4().to_string();
    let safe_name = safe_filename(&row.original_name, SAFE_FILENAME_MAX_LEN);
    let out_path = day_dir.join(format!("{}__{}", new_item_id, safe_name));

    if let Err(e) = fs::write(&out_path, &data) {
        return Err(InboxError::IngestFailed(format!(
            "Failed to write file: {}",
            e
        )));
    }

    let new_stored_rel = out_path
        .strip_prefix(to_dirs.root())
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_else(|_| out_path.to_string_lossy().into_owned());

    // ------------------------------------------------------------
    // DB 登録（送付先）。失敗時はファイルをロールバック。
    // ------------------------------------------------------------
    let to_store = ItemsStore::new(items_db_path(inbox_root, to_user));
    let new_item = InboxItem {
        item_id: new_item_id.clone(),
        kind,
        stored_rel: new_stored_rel.clone(),
        original_name: row.original_name.clone(),
        added_at: added_at.clone(),
        size_bytes: incoming,
        note: String::new(),
        tags_json: row.tags_json.clone(),
        thumb_rel: String::new(),
        thumb_status: ThumbStatus::None,
        thumb_error: String::new(),
        origin_user: from_user.to_string(),
        origin_item_id: item_id.to_string(),
        origin_type: "copy".to_string(),
    };
    if let Err(e) = to_store.insert(&new_item) {
        if let Err(rm_err) = fs::remove_file(&out_path) {
            warn!(
                "[Inbox::Send] rollback unlink failed for {}: {}",
                out_path.display(),
                rm_err
            );
        }
        return Err(InboxError::IngestFailed(format!("DB insert failed: {}", e)));
    }

    // ------------------------------------------------------------
    // サムネ（image のみ）
    // ------------------------------------------------------------
    if kind == ItemKind::Image {
        ensure_thumb_sized(
            inbox_root,
            to_user,
            &to_store,
            &new_item_id,
            kind,
            &new_stored_rel,
            None,
            None,
            config.thumb_width,
            config.thumb_height,
            config.thumb_quality,
        );
    }

    // ------------------------------------------------------------
    // 送付ログ（JSONL、best-effort）
    // ------------------------------------------------------------
    let tags: Value =
        serde_json::from_str(&row.tags_json).unwrap_or_else(|_| Value::Array(vec![]));
    let record = json!({
        "at": now_iso_jst(),
        "from_user": from_user,
        "to_user": to_user,
        "origin_item_id": item_id,
        "new_item_id": new_item_id,
        "kind": kind.as_str(),
        "origin_type": "copy",
        "origin_name": row.original_name,
        "tags": tags,
    });
    if let Err(e) = append_send_log(inbox_root, &record) {
        warn!("[Inbox::Send] send log append failed (ignored): {}", e);
    }

    info!(
        "[Inbox::Send] copied item={} from={} to={} new_item={}",
        item_id, from_user, to_user, new_item_id
    );

    Ok(new_item_id)
}

fn append_send_log(inbox_root: &Path, record: &Value) -> std::io::Result<()> {
    let log_path = send_log_path(inbox_root);
    if let Some(parent) = log_path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut f = fs::OpenOptions::new().create(true).append(true).open(log_path)?;
    writeln!(f, "{}", record)?;
    Ok(())
}
