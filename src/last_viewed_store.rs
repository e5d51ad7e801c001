//! `last_viewed` 正本 DB 管理模块
//!
//! 「最终阅览时刻」专用 DB（`_meta/last_viewed.db`）。方针与条目目录不同：
//!
//! - schema 固定为唯一正本：`(user_sub, item_id, kind, last_viewed_at)`，
//!   主键 `(user_sub, item_id)`
//! - 不做旧列名推定、不做自动改名救济；既存 DB 与正本不一致时
//!   直接以 [`InboxError::SchemaMismatch`] 顕在化
//! - 记录时机是「预览渲染成立」的瞬间，不是「试图查看」
//!
//! 删除条目不级联删除本表的行（孤儿行被容忍，JOIN 时自然失配）。

use std::fs;
use std::path::{Path, PathBuf};

use rusqlite::{params, Connection};
use tracing::debug;

use crate::error::{InboxError, InboxResult};
use crate::util::now_iso_jst;

const REQUIRED_COLUMNS: [&str; 4] = ["user_sub", "item_id", "kind", "last_viewed_at"];

/// `last_viewed.db` 的句柄（只持路径，不持连接）
#[derive(Debug, Clone)]
pub struct LastViewedStore {
    db_path: PathBuf,
}

impl LastViewedStore {
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self { db_path: db_path.into() }
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

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

    /// schema 保证（幂等）。正本仕様と不一致なら SchemaMismatch。
    ///
    /// JOIN する側（query_exec）が每页请求前都会防御性调用。
    pub fn ensure_schema(&self) -> InboxResult<()> {
        let conn = self.open()?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS last_viewed (
               user_sub       TEXT NOT NULL,
               item_id        TEXT NOT NULL,
               kind           TEXT NOT NULL,
               last_viewed_at TEXT NOT NULL,
               PRIMARY KEY (user_sub, item_id)
             )",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_last_viewed_user_kind ON last_viewed(user_sub, kind)",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_last_viewed_last_viewed_at ON last_viewed(last_viewed_at)",
            [],
        )?;

        // 仕様チェック：缺列不吸收，直接报错
        let mut stmt = conn.prepare("PRAGMA table_info(last_viewed)")?;
        let cols: Vec<String> = stmt
            .query_map([], |row| row.get::<_, String>(1))?
            .collect::<rusqlite::Result<_>>()?;
        let missing: Vec<&str> = REQUIRED_COLUMNS
            .iter()
            .copied()
            .filter(|c| !cols.iter().any(|have| have == c))
            .collect();
        if !missing.is_empty() {
            return Err(InboxError::SchemaMismatch(format!(
                "last_viewed.db missing columns: {:?}",
                missing
            )));
        }
        Ok(())
    }

    /// (user_sub, item_id) 维度的 upsert
    ///
    /// `viewed_at_iso` 必须非空；空值是调用契约错误，立即失败而不是
    /// 去踩 NOT NULL 约束。冲突时覆盖 `kind` 与 `last_viewed_at`。
    pub fn upsert(
        &self,
        user_sub: &str,
        item_id: &str,
        kind: &str,
        viewed_at_iso: &str,
    ) -> InboxResult<()> {
        if viewed_at_iso.trim().is_empty() {
            return Err(InboxError::EmptyTimestamp);
        }

        self.ensure_schema()?;

        let conn = self.open()?;
        conn.execute(
            "INSERT INTO last_viewed (user_sub, item_id, kind, last_viewed_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(user_sub, item_id)
             DO UPDATE SET
               kind = excluded.kind,
               last_viewed_at = excluded.last_viewed_at",
            params![user_sub, item_id, kind, viewed_at_iso],
        )?;
        debug!(
            "[Inbox::LastViewed] upsert user={} item={} at={}",
            user_sub, item_id, viewed_at_iso
        );
        Ok(())
    }

    /// 「今見えた」を記録する（プレビュー表示が成立した時点で呼ぶ）
    pub fn touch(&self, user_sub: &str, item_id: &str, kind: &str) -> InboxResult<()> {
        self.upsert(user_sub, item_id, kind, &now_iso_jst())
    }
}
