//! Inbox 目录规约（正本）
//!
//! 用户目录树的物理结构在所有页面间必须一致，所以集中定义在这里。
//! 根目录（inbox root）由调用方解析后传入，本模块只负责根以下的布局：
//!
//! ```text
//! <inbox_root>/
//!   _meta/send_log.jsonl          送付日志（跨用户共享）
//!   <user_sub>/
//!     _meta/inbox_items.db        条目目录 DB
//!     _meta/last_viewed.db        最终阅览 DB
//!     <kind>/files/YYYY/MM/DD/    原件（七种 kind 各一棵）
//!     <kind>/preview/             变换预览（image 以外）
//!     image/thumbs/<item_id>.webp 缩略图（仅 image 生成）
//!     pdf/thumbs/ word/thumbs/    预留
//!     word/work/ ppt/work/        变换工作区（不展示）
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{InboxError, InboxResult};
use crate::types::ItemKind;

/// 用户根目录
pub fn user_root(inbox_root: &Path, sub: &str) -> PathBuf {
    inbox_root.join(sub)
}

/// 条目目录 DB 路径
pub fn items_db_path(inbox_root: &Path, sub: &str) -> PathBuf {
    user_root(inbox_root, sub).join("_meta").join("inbox_items.db")
}

/// 最终阅览 DB 路径
pub fn last_viewed_db_path(inbox_root: &Path, sub: &str) -> PathBuf {
    user_root(inbox_root, sub).join("_meta").join("last_viewed.db")
}

/// 送付日志路径（inbox 根直下、跨用户共享）
pub fn send_log_path(inbox_root: &Path) -> PathBuf {
    inbox_root.join("_meta").join("send_log.jsonl")
}

/// stored_rel → 绝对路径（规约上的解析，不做存在性检查）
pub fn resolve_file_path(inbox_root: &Path, sub: &str, stored_rel: &str) -> PathBuf {
    user_root(inbox_root, sub).join(stored_rel)
}

/// 单缩略图的保存位置（仅 image 使用）
pub fn thumb_path_for_item(inbox_root: &Path, sub: &str, item_id: &str) -> PathBuf {
    user_root(inbox_root, sub)
        .join("image")
        .join("thumbs")
        .join(format!("{}.webp", item_id))
}

// ============================================================================
// 用户目录一览
// ============================================================================

/// 一个用户的 Inbox 目录树句柄（`ensure_user_dirs` 返回，目录已创建）
#[derive(Debug, Clone)]
pub struct UserDirs {
    root: PathBuf,
}

impl UserDirs {
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn meta_dir(&self) -> PathBuf {
        self.root.join("_meta")
    }

    /// 指定种别的原件保存目录
    pub fn files_dir(&self, kind: ItemKind) -> PathBuf {
        self.root.join(kind.as_str()).join("files")
    }

    /// 指定种别的预览目录
    pub fn preview_dir(&self, kind: ItemKind) -> PathBuf {
        self.root.join(kind.as_str()).join("preview")
    }

    /// 缩略图目录（仅 image 生成缩略图）
    pub fn thumbs_dir(&self) -> PathBuf {
        self.root.join("image").join("thumbs")
    }
}

/// 准备用户目录树（只建目录，DB 是别的职责）
///
/// 幂等。返回的 [`UserDirs`] 供入库/删除等服务定位各子目录。
pub fn ensure_user_dirs(inbox_root: &Path, sub: &str) -> InboxResult<UserDirs> {
    let root = user_root(inbox_root, sub);

    let mut dirs: Vec<PathBuf> = vec![root.join("_meta")];

    // ---- files（原件格納、全 kind）----
    for kind in ItemKind::ALL {
        dirs.push(root.join(kind.as_str()).join("files"));
    }

    // ---- preview（image 以外）----
    for kind in [
        ItemKind::Pdf,
        ItemKind::Word,
        ItemKind::Excel,
        ItemKind::Ppt,
        ItemKind::Text,
        ItemKind::Other,
    ] {
        dirs.push(root.join(kind.as_str()).join("preview"));
    }

    // ---- thumbs ----
    dirs.push(root.join("image").join("thumbs"));
    // 预留（互換維持）
    dirs.push(root.join("pdf").join("thumbs"));
    dirs.push(root.join("word").join("thumbs"));

    // ---- work（変換作業領域）----
    dirs.push(root.join("word").join("work"));
    dirs.push(root.join("ppt").join("work"));

    for d in &dirs {
        fs::create_dir_all(d)?;
    }

    Ok(UserDirs { root })
}

/// stored_rel 的安全解析：canonicalize 后必须仍在用户根之下
///
/// 防 path traversal。文件不存在时返回 `NotAvailable`。
pub fn resolve_stored_file_checked(
    inbox_root: &Path,
    sub: &str,
    stored_rel: &str,
) -> InboxResult<PathBuf> {
    let ur = user_root(inbox_root, sub);
    if !ur.exists() {
        return Err(InboxError::NotAvailable(format!(
            "user root not found: {}",
            ur.display()
        )));
    }
    let ur = ur.canonicalize()?;

    let p = ur.join(stored_rel);
    if !p.exists() {
        return Err(InboxError::NotAvailable(format!(
            "file not found: {}",
            p.display()
        )));
    }
    let p = p.canonicalize()?;

    if !p.starts_with(&ur) {
        return Err(InboxError::InvalidPath(
            "invalid stored_rel (path traversal detected)".to_string(),
        ));
    }
    Ok(p)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_ensure_user_dirs_idempotent() {
        let tmp = TempDir::new().expect("tempdir");
        let dirs = ensure_user_dirs(tmp.path(), "alice").expect("ensure dirs");
        let dirs2 = ensure_user_dirs(tmp.path(), "alice").expect("ensure dirs twice");
        assert_eq!(dirs.root(), dirs2.root());

        for kind in ItemKind::ALL {
            assert!(dirs.files_dir(kind).is_dir(), "missing files dir for {}", kind);
        }
        assert!(dirs.thumbs_dir().is_dir());
        assert!(dirs.meta_dir().is_dir());
    }

    #[test]
    fn test_db_paths_under_meta() {
        let root = Path::new("/data/inbox");
        assert_eq!(
            items_db_path(root, "u1"),
            Path::new("/data/inbox/u1/_meta/inbox_items.db")
        );
        assert_eq!(
            last_viewed_db_path(root, "u1"),
            Path::new("/data/inbox/u1/_meta/last_viewed.db")
        );
        assert_eq!(send_log_path(root), Path::new("/data/inbox/_meta/send_log.jsonl"));
    }

    #[test]
    fn test_resolve_stored_file_checked_rejects_traversal() {
        let tmp = TempDir::new().expect("tempdir");
        ensure_user_dirs(tmp.path(), "alice").expect("dirs");
        ensure_user_dirs(tmp.path(), "bob").expect("dirs");

        // bob 的文件不允许通过 alice 的 stored_rel 访问
        let secret = tmp.path().join("bob").join("other").join("files").join("secret.bin");
        std::fs::write(&secret, b"top secret").expect("write");

        let err = resolve_stored_file_checked(tmp.path(), "alice", "../bob/other/files/secret.bin")
            .expect_err("traversal must be rejected");
        assert!(matches!(err, InboxError::InvalidPath(_)), "got {:?}", err);
    }

    #[test]
    fn test_resolve_stored_file_checked_ok() {
        let tmp = TempDir::new().expect("tempdir");
        let dirs = ensure_user_dirs(tmp.path(), "alice").expect("dirs");
        let f = dirs.files_dir(ItemKind::Text).join("note.txt");
        std::fs::write(&f, b"hello").expect("write");

        let p = resolve_stored_file_checked(tmp.path(), "alice", "text/files/note.txt")
            .expect("resolve");
        assert!(p.ends_with("text/files/note.txt"));
    }
}
