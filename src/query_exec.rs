//! Inbox 检索执行（ATTACH + LEFT JOIN + 分页）
//!
//! 以 `inbox_items.db` 为主库、ATTACH `last_viewed.db`（固定逻辑名 `lvdb`）
//! 后 LEFT JOIN，跑 query_builder 产出的 WHERE 片段，返回一页行与总件数。
//!
//! COUNT 的保证：总件数只依赖条目表本身的过滤结果。WHERE 片段不含
//! `lv.` 条件时 COUNT 完全不碰 last_viewed 库，即使那个文件坏了
//! 也不影响计数；含 `lv.` 条件时片段离开 JOIN 就无法执行，才带上 JOIN。

use std::iter::once;
use std::path::Path;

use rusqlite::{params, params_from_iter, types::Value, Row};
use tracing::{debug, warn};

use crate::error::InboxResult;
use crate::items_store::ItemsStore;
use crate::last_viewed_store::LastViewedStore;
use crate::query_builder::WhereClause;
use crate::tags::first_tag;
use crate::types::{ItemKind, ThumbStatus};
use crate::util::{bytes_human, jst};

// ============================================================================
// 排序
// ============================================================================

/// 一覧の並び順（3 固定戦略）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemOrder {
    /// 新しく入れた順
    Newest,
    /// 閲覧済みを先頭に、最近見たもの順。未閲覧は最後、同値は入库順。
    Viewed,
    /// ファイル名昇順（同名は入库順）
    Name,
}

impl ItemOrder {
    fn sql(&self) -> &'static str {
        match self {
            ItemOrder::Newest => "ORDER BY it.added_at DESC",
            ItemOrder::Viewed => {
                "ORDER BY (lv.item_id IS NULL) ASC, lv.last_viewed_at DESC, it.added_at DESC"
            }
            ItemOrder::Name => "ORDER BY it.original_name ASC, it.added_at DESC",
        }
    }

    fn needs_last_viewed(&self) -> bool {
        matches!(self, ItemOrder::Viewed)
    }
}

// ============================================================================
// 結果行
// ============================================================================

/// 検索結果の 1 行（表示用の派生列込み）
#[derive(Debug, Clone)]
pub struct ItemPageRow {
    pub item_id: String,
    pub kind: ItemKind,
    pub tags_json: String,
    pub original_name: String,
    pub stored_rel: String,
    pub added_at: String,
    pub size_bytes: u64,
    pub thumb_rel: String,
    pub thumb_status: ThumbStatus,
    /// 最終閲覧時刻（未閲覧は None）
    pub last_viewed: Option<String>,

    // ---- 表示用派生列 ----
    /// 先頭タグ（コンパクト表示用）
    pub tag_disp: String,
    /// `YYYY/MM/DD HH:MM`（JST）
    pub added_at_disp: String,
    pub last_viewed_disp: String,
    /// 人間可読サイズ
    pub size_disp: String,
}

/// 1 ページ分の結果
#[derive(Debug, Clone)]
pub struct QueryPage {
    pub rows: Vec<ItemPageRow>,
    pub total: u64,
}

/// ISO 文字列 → `YYYY/MM/DD HH:MM`（JST）。解析不能はそのまま返す。
pub fn format_dt_jp(dt_str: &str) -> String {
    match chrono::DateTime::parse_from_rfc3339(dt_str) {
        Ok(dt) => dt.with_timezone(&jst()).format("%Y/%m/%d %H:%M").to_string(),
        Err(_) => dt_str.to_string(),
    }
}

// ============================================================================
// 実行本体
// ============================================================================

/// フィルタ済み・JOIN 済み・ページング済みの読み取りを実行する
///
/// 手順：last_viewed schema 保証（防御）→ ATTACH → COUNT → ページ取得
/// → DETACH → 表示用派生列の付与。
pub fn query_items_page(
    items_db: &Path,
    lv_db: &Path,
    user_sub: &str,
    clause: &WhereClause,
    order: ItemOrder,
    limit: u32,
    offset: u32,
) -> InboxResult<QueryPage> {
    // last_viewed 侧先行保证。坏掉的 lv 库只在真正需要它的条件/排序时
    // 才是致命的，其余场合降级继续（last_viewed 列全 None）。
    let lv_needed = clause.uses_last_viewed || order.needs_last_viewed();
    let lv_ok = match LastViewedStore::new(lv_db).ensure_schema() {
        Ok(()) => true,
        Err(e) if !lv_needed => {
            warn!(
                "[Inbox::QueryExec] last_viewed unavailable, serving page without it: {}",
                e
            );
            false
        }
        Err(e) => return Err(e),
    };

    let store = ItemsStore::new(items_db);
    let conn = store.open_connection()?;

    if lv_ok {
        conn.execute(
            "ATTACH DATABASE ?1 AS lvdb",
            params![lv_db.to_string_lossy().into_owned()],
        )?;
    }

    let where_clause = if clause.sql.trim().is_empty() {
        String::new()
    } else {
        format!("WHERE {}", clause.sql.trim())
    };

    // ------------------------------------------------------------
    // ① total（COUNT）
    // ------------------------------------------------------------
    let total: i64 = if clause.uses_last_viewed {
        let sql = format!(
            "SELECT COUNT(*) FROM inbox_items AS it \
             LEFT JOIN lvdb.last_viewed AS lv \
               ON lv.user_sub = ? AND lv.item_id = it.item_id \
             {}",
            where_clause
        );
        conn.query_row(
            &sql,
            params_from_iter(
                once(Value::from(user_sub.to_string())).chain(clause.params.iter().cloned()),
            ),
            |row| row.get(0),
        )?
    } else {
        // 条目表单独计数。lv 库的状态与计数无关。
        let sql = format!("SELECT COUNT(*) FROM inbox_items AS it {}", where_clause);
        conn.query_row(
            &sql,
            params_from_iter(clause.params.iter().cloned()),
            |row| row.get(0),
        )?
    };

    // ------------------------------------------------------------
    // ② page
    // ------------------------------------------------------------
    let rows = if lv_ok {
        let sql = format!(
            "SELECT \
               it.item_id, it.kind, it.tags_json, it.original_name, it.stored_rel, \
               it.added_at, it.size_bytes, it.thumb_rel, it.thumb_status, \
               lv.last_viewed_at AS last_viewed \
             FROM inbox_items AS it \
             LEFT JOIN lvdb.last_viewed AS lv \
               ON lv.user_sub = ? AND lv.item_id = it.item_id \
             {} {} LIMIT ? OFFSET ?",
            where_clause,
            order.sql(),
        );
        let bind = once(Value::from(user_sub.to_string()))
            .chain(clause.params.iter().cloned())
            .chain([Value::from(limit as i64), Value::from(offset as i64)]);
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(bind), page_row_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows
    } else {
        // 降級経路：JOIN 無し、last_viewed は全行 None
        let sql = format!(
            "SELECT \
               it.item_id, it.kind, it.tags_json, it.original_name, it.stored_rel, \
               it.added_at, it.size_bytes, it.thumb_rel, it.thumb_status, \
               NULL AS last_viewed \
             FROM inbox_items AS it \
             {} {} LIMIT ? OFFSET ?",
            where_clause,
            ItemOrder::Newest.sql(),
        );
        let bind = clause
            .params
            .iter()
            .cloned()
            .chain([Value::from(limit as i64), Value::from(offset as i64)]);
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(bind), page_row_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows
    };

    if lv_ok {
        conn.execute("DETACH DATABASE lvdb", [])?;
    }

    debug!(
        "[Inbox::QueryExec] user={} total={} page_rows={} limit={} offset={}",
        user_sub,
        total,
        rows.len(),
        limit,
        offset
    );

    Ok(QueryPage {
        rows,
        total: total.max(0) as u64,
    })
}

fn page_row_from_row(row: &Row<'_>) -> rusqlite::Result<ItemPageRow> {
    let tags_json: String = row
        .get::<_, Option<String>>(2)?
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "[]".to_string());
    let added_at: String = row.get(5)?;
    let size_bytes = row.get::<_, i64>(6)?.max(0) as u64;
    let last_viewed: Option<String> = row.get(9)?;

    Ok(ItemPageRow {
        item_id: row.get(0)?,
        kind: ItemKind::parse(&row.get::<_, String>(1)?),
        tag_disp: first_tag(&tags_json),
        tags_json,
        original_name: row.get(3)?,
        stored_rel: row.get(4)?,
        added_at_disp: format_dt_jp(&added_at),
        added_at,
        size_disp: bytes_human(size_bytes),
        size_bytes,
        thumb_rel: row.get::<_, Option<String>>(7)?.unwrap_or_default(),
        thumb_status: ThumbStatus::parse(&row.get::<_, Option<String>>(8)?.unwrap_or_default()),
        last_viewed_disp: last_viewed.as_deref().map(format_dt_jp).unwrap_or_default(),
        last_viewed,
    })
}
