//! Inbox 模块错误类型
//!
//! 所有对外 API 统一返回 [`InboxResult`]。错误消息要求可直接展示给用户
//! （上层 UI 只做 warning/error 渲染，不再加工）。

use thiserror::Error;

/// Inbox 模块错误类型
#[derive(Debug, Error)]
pub enum InboxError {
    /// Inbox 根目录或被引用的文件不存在
    #[error("Inbox not available: {0}")]
    NotAvailable(String),

    /// 容量超限（带上当前用量、本次写入量与上限，供 UI 精确提示）
    #[error("Quota exceeded: current={current}, incoming={incoming}, quota={quota}")]
    QuotaExceeded {
        current: u64,
        incoming: u64,
        quota: u64,
    },

    /// 文件写入或目录登记失败
    #[error("Ingest failed: {0}")]
    IngestFailed(String),

    /// 指定的 item 不存在
    #[error("Item not found: {0}")]
    NotFound(String),

    /// stored_rel 解析到了用户目录之外
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// last_viewed_at 必须是非空 ISO 字符串（调用契约错误，立即失败）
    #[error("viewed_at_iso is empty: last_viewed_at must be a non-empty ISO string")]
    EmptyTimestamp,

    /// 既存 DB 与固定 schema 不一致（不做静默吸收）
    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    /// SQLite 错误
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// IO 错误
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Inbox 模块结果类型
pub type InboxResult<T> = Result<T, InboxError>;
