//! Inbox 核心类型定义
//!
//! 目录行、入库请求/结果等跨模块「边界数据型」都集中在这里。
//! 不放任何 UI 依赖，不放 SQL。

use std::path::Path;

use serde::{Deserialize, Serialize};

// ============================================================================
// 种别枚举
// ============================================================================

/// 条目种别（由扩展名在入库时决定，之后不再变更）
///
/// 种别决定保存目录（`<kind>/files/...`）与缩略图策略（仅 image 生成）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Pdf,
    Word,
    Excel,
    Ppt,
    Text,
    Image,
    Other,
}

impl ItemKind {
    /// 全种别（筛选 UI 用）
    pub const ALL: [ItemKind; 7] = [
        ItemKind::Pdf,
        ItemKind::Word,
        ItemKind::Excel,
        ItemKind::Ppt,
        ItemKind::Text,
        ItemKind::Image,
        ItemKind::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ItemKind::Pdf => "pdf",
            ItemKind::Word => "word",
            ItemKind::Excel => "excel",
            ItemKind::Ppt => "ppt",
            ItemKind::Text => "text",
            ItemKind::Image => "image",
            ItemKind::Other => "other",
        }
    }

    /// 从字符串解析（未知值一律归入 Other）
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "pdf" => ItemKind::Pdf,
            "word" => ItemKind::Word,
            "excel" => ItemKind::Excel,
            "ppt" => ItemKind::Ppt,
            "text" => ItemKind::Text,
            "image" => ItemKind::Image,
            _ => ItemKind::Other,
        }
    }

    /// 由文件名（扩展名）判定种别
    ///
    /// 扩展名大小写不敏感。未登记的扩展名一律 Other。
    pub fn from_filename(filename: &str) -> Self {
        let ext = Path::new(filename)
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "pdf" => ItemKind::Pdf,
            "docx" | "doc" => ItemKind::Word,
            // 旧二进制 Excel（.xls）不按 excel 处理，落到 other
            "xlsx" | "xlsm" | "csv" | "tsv" => ItemKind::Excel,
            "xls" => ItemKind::Other,
            "pptx" | "ppt" => ItemKind::Ppt,
            // .tex 按 LaTeX 源码归入 text
            "txt" | "md" | "log" | "json" | "tex" => ItemKind::Text,
            "png" | "jpg" | "jpeg" | "webp" | "gif" | "bmp" | "tiff" | "tif" => ItemKind::Image,
            _ => ItemKind::Other,
        }
    }

    /// UI 展示用标签
    pub fn label(&self) -> &'static str {
        match self {
            ItemKind::Pdf => "PDF",
            ItemKind::Word => "Word",
            ItemKind::Excel => "Excel",
            ItemKind::Ppt => "PowerPoint",
            ItemKind::Text => "Text",
            ItemKind::Image => "Image",
            ItemKind::Other => "Other",
        }
    }
}

impl std::fmt::Display for ItemKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// 缩略图状态
// ============================================================================

/// 缩略图生成状态（DB 列 `thumb_status`）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThumbStatus {
    /// 方针上不生成（image 以外恒为 none）
    None,
    /// 已生成且路径有效
    Ok,
    /// 生成失败（原因见 `thumb_error`）
    Failed,
}

impl ThumbStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThumbStatus::None => "none",
            ThumbStatus::Ok => "ok",
            ThumbStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "ok" => ThumbStatus::Ok,
            "failed" => ThumbStatus::Failed,
            _ => ThumbStatus::None,
        }
    }
}

impl std::fmt::Display for ThumbStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// 目录行
// ============================================================================

/// `inbox_items` 的一行（一个物理文件对应一条记录）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboxItem {
    /// 主键（UUID 字符串，入库时生成，不可变）
    pub item_id: String,
    pub kind: ItemKind,
    /// 相对用户根目录的保存路径（唯一，不可变）
    pub stored_rel: String,
    /// 用户上传时的原始文件名（展示用）
    pub original_name: String,
    /// 入库时刻（ISO 字符串，JST）
    pub added_at: String,
    pub size_bytes: u64,
    /// 用户备注
    pub note: String,
    /// 标签（JSON 数组字符串，`[]` 表示无标签）
    pub tags_json: String,
    pub thumb_rel: String,
    pub thumb_status: ThumbStatus,
    pub thumb_error: String,
    /// 送付（copy）来源。直接上传时三个字段均为空字符串。
    pub origin_user: String,
    pub origin_item_id: String,
    pub origin_type: String,
}

// ============================================================================
// 入库请求 / 结果
// ============================================================================

/// 送付・コピー由来情報（直接上传时保持 Default 的空值）
#[derive(Debug, Clone, Default)]
pub struct ItemOrigin {
    pub user: String,
    pub item_id: String,
    pub origin_type: String,
}

/// 其他应用 → Inbox 保存请求
#[derive(Debug, Clone)]
pub struct IngestRequest {
    pub user_sub: String,
    pub filename: String,
    pub data: Vec<u8>,
    /// 标签（JSON 数组字符串）。默认 `"[]"`。
    pub tags_json: String,
    pub origin: ItemOrigin,
}

impl IngestRequest {
    pub fn new(user_sub: impl Into<String>, filename: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            user_sub: user_sub.into(),
            filename: filename.into(),
            data,
            tags_json: "[]".to_string(),
            origin: ItemOrigin::default(),
        }
    }

    pub fn with_tags_json(mut self, tags_json: impl Into<String>) -> Self {
        self.tags_json = tags_json.into();
        self
    }
}

/// 入库结果
#[derive(Debug, Clone)]
pub struct IngestResult {
    pub item_id: String,
    pub kind: ItemKind,
    pub stored_rel: String,
    pub size_bytes: u64,
    pub thumb_status: ThumbStatus,
}

/// 从 Inbox 读出的一个文件（raw bytes 不加工）
#[derive(Debug, Clone)]
pub struct PickedFile {
    pub data: Vec<u8>,
    pub item_id: String,
    pub kind: ItemKind,
    pub original_name: String,
    pub stored_rel: String,
    pub added_at: String,
}
