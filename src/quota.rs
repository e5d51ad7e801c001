//! 容量計算
//!
//! 入库前的「当前用量 + 本次写入 ≤ 上限」判定用。用量是用户根目录下
//! 全文件尺寸的递归合计。扫描中途被删掉的文件静默跳过。

use std::path::Path;

use walkdir::WalkDir;

/// 目录树下的总字节数（目录不存在时为 0）
pub fn folder_size_bytes(p: &Path) -> u64 {
    if !p.exists() {
        return 0;
    }

    WalkDir::new(p)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| entry.metadata().ok())
        .map(|meta| meta.len())
        .sum()
}
