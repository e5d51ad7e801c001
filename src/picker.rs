//! Inbox からの読み出し（raw bytes、加工なし）
//!
//! stored_rel は必ず用户根配下に解決されることを検証してから読む
//! （path traversal 対策）。画像の正規化や text decode は用途ごとに
//! 呼び出し側の責務。

use std::fs;
use std::path::Path;

use crate::error::{InboxError, InboxResult};
use crate::items_store::ItemsStore;
use crate::paths::{items_db_path, resolve_stored_file_checked};
use crate::types::PickedFile;

/// item_id 指定で実ファイルの中身を読む
pub fn read_item_bytes(inbox_root: &Path, user_sub: &str, item_id: &str) -> InboxResult<PickedFile> {
    let store = ItemsStore::new(items_db_path(inbox_root, user_sub));
    let row = store
        .fetch_by_id(item_id)?
        .ok_or_else(|| InboxError::NotFound(format!("item not found: {}", item_id)))?;

    let path = resolve_stored_file_checked(inbox_root, user_sub, &row.stored_rel)?;
    let data = fs::read(path)?;

    Ok(PickedFile {
        data,
        item_id: row.item_id,
        kind: row.kind,
        original_name: row.original_name,
        stored_rel: row.stored_rel,
        added_at: row.added_at,
    })
}
