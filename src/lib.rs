//! Portal Inbox 共通库
//!
//! 多应用平台的「收件箱」核心：每个用户一棵目录树加两个 SQLite 元数据库
//! （`_meta/inbox_items.db` 与 `_meta/last_viewed.db`），在其上提供
//!
//! - 条目目录（catalog）的 schema 管理与 CRUD
//! - 结构化过滤条件到 WHERE 片段的纯函数构建
//! - ATTACH + LEFT JOIN 的分页查询（含最终阅览时间）
//! - 文件入库（ingest）、用户间送付（copy）、删除、缩略图
//!
//! UI 层（页面渲染、预览控件）与存储根路径的解析不在本库职责内：
//! 调用方传入已解析好的 inbox 根目录。

pub mod config;
pub mod delete;
pub mod error;
pub mod ingest;
pub mod items_store;
pub mod last_viewed_store;
pub mod paths;
pub mod picker;
pub mod query_builder;
pub mod query_exec;
pub mod quota;
pub mod send;
pub mod tags;
pub mod thumb;
pub mod types;
pub mod util;

pub use config::InboxConfig;
pub use delete::delete_item;
pub use error::{InboxError, InboxResult};
pub use ingest::ingest_to_inbox;
pub use items_store::ItemsStore;
pub use last_viewed_store::LastViewedStore;
pub use paths::{ensure_user_dirs, items_db_path, last_viewed_db_path, UserDirs};
pub use picker::read_item_bytes;
pub use query_builder::{
    build_where_and_params, ItemFilter, LastViewedFilter, SizeFilter, WhereClause,
};
pub use query_exec::{query_items_page, ItemOrder, ItemPageRow, QueryPage};
pub use send::send_item_copy;
pub use thumb::{ensure_thumb_for_item, ThumbOutcome};
pub use types::{IngestRequest, IngestResult, InboxItem, ItemKind, ItemOrigin, PickedFile, ThumbStatus};
