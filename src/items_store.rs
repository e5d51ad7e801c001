//! `inbox_items` 正本 DB 管理模块
//!
//! Inbox 全条目（pdf / image / word / excel / text ...）元数据的唯一入口。
//! 本模块强保证：
//!
//! - `inbox_items.db` 的 schema 定义与演化（migration）正本在这里，
//!   页面侧不允许散落 DDL
//! - 所有 CRUD 都先经过 [`ItemsStore::ensure_schema`]
//! - 旧 DB 不破坏：缺列用 `ALTER TABLE ADD COLUMN` 补齐，
//!   绝不删列、不改列型
//!
//! 连接策略：每次操作独立 open / close，不持长连接。每个连接统一设置
//! `journal_mode=WAL`、`synchronous=NORMAL`、`busy_timeout`。

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use rusqlite::{params, params_from_iter, types::Value, Connection, OptionalExtension, Row};
use tracing::debug;

use crate::error::InboxResult;
use crate::types::{InboxItem, ItemKind, ThumbStatus};

/// SELECT 时的固定列序（行映射按位置取值，必须与此一致）
const ITEM_COLUMNS: &str = "item_id, kind, stored_rel, original_name, added_at, size_bytes, \
     note, tags_json, thumb_rel, thumb_status, thumb_error, \
     origin_user, origin_item_id, origin_type";

/// 旧 DB 的补列 migration（顺序固定，逐条幂等）
///
/// 列需要新增时在末尾追记一条，不改动既有条目。
const COLUMN_MIGRATIONS: &[(&str, &str)] = &[
    ("note", "ALTER TABLE inbox_items ADD COLUMN note TEXT DEFAULT ''"),
    ("tags_json", "ALTER TABLE inbox_items ADD COLUMN tags_json TEXT DEFAULT '[]'"),
    ("thumb_rel", "ALTER TABLE inbox_items ADD COLUMN thumb_rel TEXT DEFAULT ''"),
    ("thumb_status", "ALTER TABLE inbox_items ADD COLUMN thumb_status TEXT DEFAULT 'none'"),
    ("thumb_error", "ALTER TABLE inbox_items ADD COLUMN thumb_error TEXT DEFAULT ''"),
    ("origin_user", "ALTER TABLE inbox_items ADD COLUMN origin_user TEXT DEFAULT ''"),
    ("origin_item_id", "ALTER TABLE inbox_items ADD COLUMN origin_item_id TEXT DEFAULT ''"),
    ("origin_type", "ALTER TABLE inbox_items ADD COLUMN origin_type TEXT DEFAULT ''"),
];

/// `inbox_items.db` 的句柄（只持路径，不持连接）
#[derive(Debug, Clone)]
pub struct ItemsStore {
    db_path: PathBuf,
}

impl ItemsStore {
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self { db_path: db_path.into() }
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// 打开连接（目录自动创建、统一 pragma）
    fn open(&self) -> InboxResult<Connection> {
        if let Some(parent) = self.db_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(&self.db_path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "busy_timeout", 3000i64)?;
        Ok(conn)
    }

    /// 打开连接并保证 schema（所有公开操作的共同入口）
    fn open_ensured(&self) -> InboxResult<Connection> {
        let conn = self.open()?;
        Self::ensure_schema_on(&conn)?;
        Ok(conn)
    }

    /// query_exec 专用：拿到一条已保证 schema 的连接（ATTACH 用）
    pub(crate) fn open_connection(&self) -> InboxResult<Connection> {
        self.open_ensured()
    }

    // ------------------------------------------------------------
    // schema
    // ------------------------------------------------------------

    /// schema 保证（幂等）。旧 DB 缺列时补列，绝不做破坏性变更。
    pub fn ensure_schema(&self) -> InboxResult<()> {
        let conn = self.open()?;
        Self::ensure_schema_on(&conn)
    }

    fn ensure_schema_on(conn: &Connection) -> InboxResult<()> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS inbox_items (
               item_id       TEXT PRIMARY KEY,
               kind          TEXT NOT NULL,
               stored_rel    TEXT NOT NULL,
               original_name TEXT NOT NULL,
               added_at      TEXT NOT NULL,
               size_bytes    INTEGER NOT NULL,
               note          TEXT DEFAULT '',
               tags_json     TEXT DEFAULT '[]',
               thumb_rel     TEXT DEFAULT '',
               thumb_status  TEXT DEFAULT 'none',
               thumb_error   TEXT DEFAULT '',
               origin_user     TEXT DEFAULT '',
               origin_item_id  TEXT DEFAULT '',
               origin_type     TEXT DEFAULT ''
             )",
            [],
        )?;

        let cols = Self::table_columns(conn, "inbox_items")?;
        for (col, ddl) in COLUMN_MIGRATIONS {
            if !cols.contains(*col) {
                debug!("[Inbox::ItemsStore] adding missing column: {}", col);
                conn.execute(ddl, [])?;
            }
        }

        // --- index（最小限） ---
        conn.execute("CREATE INDEX IF NOT EXISTS idx_inbox_kind  ON inbox_items(kind)", [])?;
        conn.execute("CREATE INDEX IF NOT EXISTS idx_inbox_added ON inbox_items(added_at)", [])?;
        conn.execute("CREATE INDEX IF NOT EXISTS idx_inbox_name  ON inbox_items(original_name)", [])?;
        conn.execute("CREATE INDEX IF NOT EXISTS idx_inbox_thumb ON inbox_items(thumb_status)", [])?;

        Ok(())
    }

    fn table_columns(conn: &Connection, table: &str) -> InboxResult<HashSet<String>> {
        let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table))?;
        let cols = stmt
            .query_map([], |row| row.get::<_, String>(1))?
            .collect::<rusqlite::Result<HashSet<String>>>()?;
        Ok(cols)
    }

    // ------------------------------------------------------------
    // insert
    // ------------------------------------------------------------

    /// 插入一行。主键冲突原样上抛（item_id 由调用方用 UUID 保证无冲突）。
    pub fn insert(&self, item: &InboxItem) -> InboxResult<()> {
        let conn = self.open_ensured()?;
        conn.execute(
            "INSERT INTO inbox_items(
               item_id, kind, stored_rel, original_name, added_at, size_bytes,
               note, tags_json,
               thumb_rel, thumb_status, thumb_error,
               origin_user, origin_item_id, origin_type
             )
             VALUES(?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14)",
            params![
                item.item_id,
                item.kind.as_str(),
                item.stored_rel,
                item.original_name,
                item.added_at,
                item.size_bytes as i64,
                item.note,
                item.tags_json,
                item.thumb_rel,
                item.thumb_status.as_str(),
                item.thumb_error,
                item.origin_user,
                item.origin_item_id,
                item.origin_type,
            ],
        )?;
        Ok(())
    }

    // ------------------------------------------------------------
    // read
    // ------------------------------------------------------------

    fn item_from_row(row: &Row<'_>) -> rusqlite::Result<InboxItem> {
        Ok(InboxItem {
            item_id: row.get(0)?,
            kind: ItemKind::parse(&row.get::<_, String>(1)?),
            stored_rel: row.get(2)?,
            original_name: row.get(3)?,
            added_at: row.get(4)?,
            size_bytes: row.get::<_, i64>(5)?.max(0) as u64,
            note: row.get::<_, Option<String>>(6)?.unwrap_or_default(),
            tags_json: row
                .get::<_, Option<String>>(7)?
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "[]".to_string()),
            thumb_rel: row.get::<_, Option<String>>(8)?.unwrap_or_default(),
            thumb_status: ThumbStatus::parse(
                &row.get::<_, Option<String>>(9)?.unwrap_or_default(),
            ),
            thumb_error: row.get::<_, Option<String>>(10)?.unwrap_or_default(),
            origin_user: row.get::<_, Option<String>>(11)?.unwrap_or_default(),
            origin_item_id: row.get::<_, Option<String>>(12)?.unwrap_or_default(),
            origin_type: row.get::<_, Option<String>>(13)?.unwrap_or_default(),
        })
    }

    /// item_id 取一件
    pub fn fetch_by_id(&self, item_id: &str) -> InboxResult<Option<InboxItem>> {
        let conn = self.open_ensured()?;
        let item = conn
            .query_row(
                &format!("SELECT {} FROM inbox_items WHERE item_id = ?1", ITEM_COLUMNS),
                params![item_id],
                Self::item_from_row,
            )
            .optional()?;
        Ok(item)
    }

    /// 全件取得（added_at 降序）。仅限小规模/管理用途。
    pub fn list_all(&self) -> InboxResult<Vec<InboxItem>> {
        let conn = self.open_ensured()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM inbox_items ORDER BY added_at DESC",
            ITEM_COLUMNS
        ))?;
        let items = stmt
            .query_map([], Self::item_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(items)
    }

    /// 条件付き件数
    ///
    /// `where_sql` 是不含 `WHERE` 关键字的片段（`it.` 别名），由
    /// query_builder 产出；值只能走 `params` 绑定。含 `lv.` 别名的
    /// 片段不能用在这里（没有 JOIN），那是 query_exec 的领域。
    pub fn count(&self, where_sql: &str, query_params: &[Value]) -> InboxResult<u64> {
        let conn = self.open_ensured()?;
        let where_clause = compose_where(where_sql);
        let n: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM inbox_items it {}", where_clause),
            params_from_iter(query_params.iter().cloned()),
            |row| row.get(0),
        )?;
        Ok(n.max(0) as u64)
    }

    /// 分页取得（LIMIT / OFFSET）
    ///
    /// `order_sql` 为空时按 `it.added_at DESC`。
    pub fn list_page(
        &self,
        where_sql: &str,
        query_params: &[Value],
        limit: u32,
        offset: u32,
        order_sql: Option<&str>,
    ) -> InboxResult<Vec<InboxItem>> {
        let conn = self.open_ensured()?;
        let where_clause = compose_where(where_sql);
        let order = order_sql.unwrap_or("ORDER BY it.added_at DESC");

        // where 片段用的是无编号占位符，这里保持一致（顺序绑定）
        let sql = format!(
            "SELECT {cols} FROM inbox_items it {where_clause} {order} LIMIT ? OFFSET ?",
            cols = ITEM_COLUMNS,
            where_clause = where_clause,
            order = order,
        );

        let bind: Vec<Value> = query_params
            .iter()
            .cloned()
            .chain([Value::from(limit as i64), Value::from(offset as i64)])
            .collect();

        let mut stmt = conn.prepare(&sql)?;
        let items = stmt
            .query_map(params_from_iter(bind), Self::item_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(items)
    }

    // ------------------------------------------------------------
    // update
    // ------------------------------------------------------------

    /// 单标签运用的简易更新（空白 → 空列表）
    pub fn update_tag_single(&self, item_id: &str, new_tag: &str) -> InboxResult<()> {
        let tag = new_tag.trim();
        let tags: Vec<&str> = if tag.is_empty() { vec![] } else { vec![tag] };
        let tags_json = serde_json::to_string(&tags).unwrap_or_else(|_| "[]".to_string());

        let conn = self.open_ensured()?;
        conn.execute(
            "UPDATE inbox_items SET tags_json = ?1 WHERE item_id = ?2",
            params![tags_json, item_id],
        )?;
        Ok(())
    }

    pub fn update_note(&self, item_id: &str, note: &str) -> InboxResult<()> {
        let conn = self.open_ensured()?;
        conn.execute(
            "UPDATE inbox_items SET note = ?1 WHERE item_id = ?2",
            params![note, item_id],
        )?;
        Ok(())
    }

    /// 缩略图结果反映（error 截断到 500 字符）
    pub fn update_thumb(
        &self,
        item_id: &str,
        thumb_rel: &str,
        status: ThumbStatus,
        error: &str,
    ) -> InboxResult<()> {
        let error_short: String = error.chars().take(500).collect();
        let conn = self.open_ensured()?;
        conn.execute(
            "UPDATE inbox_items
             SET thumb_rel = ?1, thumb_status = ?2, thumb_error = ?3
             WHERE item_id = ?4",
            params![thumb_rel, status.as_str(), error_short, item_id],
        )?;
        Ok(())
    }

    // ------------------------------------------------------------
    // delete
    // ------------------------------------------------------------

    /// 删一行（实体文件删除是上层服务的职责）
    pub fn delete_row(&self, item_id: &str) -> InboxResult<()> {
        let conn = self.open_ensured()?;
        conn.execute("DELETE FROM inbox_items WHERE item_id = ?1", params![item_id])?;
        Ok(())
    }
}

fn compose_where(where_sql: &str) -> String {
    let trimmed = where_sql.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", trimmed)
    }
}
