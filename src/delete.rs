//! Inbox 1 件削除（目录行 + 実体ファイル + サムネ）
//!
//! 顺序固定：先删文件后删行。中途崩溃最多留下孤儿文件，绝不留
//! 指向空文件的目录行。last_viewed 等派生 DB 不在这里动。

use std::fs;
use std::path::Path;

use tracing::info;

use crate::error::{InboxError, InboxResult};
use crate::items_store::ItemsStore;
use crate::paths::{items_db_path, resolve_file_path, user_root};

/// 指定条目を削除する
///
/// 文件已经不在不算错（文件系统维度幂等）；行不在时返回 `NotFound`。
pub fn delete_item(inbox_root: &Path, user_sub: &str, item_id: &str) -> InboxResult<()> {
    let store = ItemsStore::new(items_db_path(inbox_root, user_sub));

    let row = store
        .fetch_by_id(item_id)?
        .ok_or_else(|| InboxError::NotFound(format!("item not found: {}", item_id)))?;

    // 1) 実体ファイル（あれば）
    if !row.stored_rel.is_empty() {
        let p = resolve_file_path(inbox_root, user_sub, &row.stored_rel);
        if p.exists() {
            fs::remove_file(&p)?;
        }
    }

    // 2) サムネ（あれば）
    if !row.thumb_rel.is_empty() {
        let t = user_root(inbox_root, user_sub).join(&row.thumb_rel);
        if t.exists() {
            fs::remove_file(&t)?;
        }
    }

    // 3) 目录行（最後）
    store.delete_row(item_id)?;

    info!("[Inbox::Delete] deleted item={} user={}", item_id, user_sub);
    Ok(())
}
