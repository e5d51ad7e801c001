//! 缩略图生成（正本）
//!
//! 方针：
//! - 生成对象只有 image 一种。pdf / word / excel / text / other 一律不生成
//!   （状态恒为 `none`，残留的旧状态会被纠正回去）
//! - 保存位置的正本是 [`crate::paths::thumb_path_for_item`]
//! - 生成结果必须反映到 `inbox_items` 的 `thumb_*` 三列
//! - 已经 `ok` 且实体文件仍在时不重复生成
//!
//! 本模块对调用方绝不抛错：解码/编码失败都折叠进返回的状态里。

use std::fs;
use std::path::Path;

use image::imageops::FilterType;
use image::{Rgb, RgbImage};
use tracing::{debug, error, warn};

use crate::config::{THUMB_H, THUMB_QUALITY, THUMB_W};
use crate::items_store::ItemsStore;
use crate::paths::{resolve_file_path, thumb_path_for_item, user_root};
use crate::types::{ItemKind, ThumbStatus};

/// 缩略图处理的最终结果（DB に反映済み）
#[derive(Debug, Clone)]
pub struct ThumbOutcome {
    pub thumb_rel: String,
    pub status: ThumbStatus,
    pub error: String,
}

impl ThumbOutcome {
    fn none() -> Self {
        Self {
            thumb_rel: String::new(),
            status: ThumbStatus::None,
            error: String::new(),
        }
    }

    fn ok(thumb_rel: String) -> Self {
        Self {
            thumb_rel,
            status: ThumbStatus::Ok,
            error: String::new(),
        }
    }

    fn failed(error: String) -> Self {
        Self {
            thumb_rel: String::new(),
            status: ThumbStatus::Failed,
            error,
        }
    }
}

/// 1 件分のサムネを保証し、`thumb_*` 列へ反映する
///
/// `current_*` 是既存记录的值（新规插入后的首次生成传 `None`）。
pub fn ensure_thumb_for_item(
    inbox_root: &Path,
    user_sub: &str,
    items_store: &ItemsStore,
    item_id: &str,
    kind: ItemKind,
    stored_rel: &str,
    current_thumb_rel: Option<&str>,
    current_thumb_status: Option<ThumbStatus>,
) -> ThumbOutcome {
    ensure_thumb_sized(
        inbox_root,
        user_sub,
        items_store,
        item_id,
        kind,
        stored_rel,
        current_thumb_rel,
        current_thumb_status,
        THUMB_W,
        THUMB_H,
        THUMB_QUALITY,
    )
}

#[allow(clippy::too_many_arguments)]
pub fn ensure_thumb_sized(
    inbox_root: &Path,
    user_sub: &str,
    items_store: &ItemsStore,
    item_id: &str,
    kind: ItemKind,
    stored_rel: &str,
    current_thumb_rel: Option<&str>,
    current_thumb_status: Option<ThumbStatus>,
    w: u32,
    h: u32,
    quality: f32,
) -> ThumbOutcome {
    let current_rel = current_thumb_rel.unwrap_or("");
    let current_status = current_thumb_status.unwrap_or(ThumbStatus::None);

    // ------------------------------------------------------------
    // image 以外は作らない → none に正規化（旧値の自己修復込み）
    // ------------------------------------------------------------
    if kind != ItemKind::Image {
        if current_status != ThumbStatus::None || !current_rel.is_empty() {
            record(items_store, item_id, "", ThumbStatus::None, "");
        }
        return ThumbOutcome::none();
    }

    // ------------------------------------------------------------
    // 既に ok + 実体ありなら再生成しない
    // ------------------------------------------------------------
    if current_status == ThumbStatus::Ok && !current_rel.is_empty() {
        let abs_thumb = user_root(inbox_root, user_sub).join(current_rel);
        if abs_thumb.is_file() {
            return ThumbOutcome::ok(current_rel.to_string());
        }
        // 実体が消えていたら下で再生成
    }

    // ------------------------------------------------------------
    // 原本チェック
    // ------------------------------------------------------------
    let src_path = resolve_file_path(inbox_root, user_sub, stored_rel);
    if !src_path.exists() {
        let msg = format!("source file missing: {}", stored_rel);
        record(items_store, item_id, "", ThumbStatus::Failed, &msg);
        return ThumbOutcome::failed(msg);
    }

    // ------------------------------------------------------------
    // 生成
    // ------------------------------------------------------------
    let out_webp = thumb_path_for_item(inbox_root, user_sub, item_id);
    match make_image_thumb_webp(&src_path, &out_webp, w, h, quality) {
        Ok(()) => {
            let rel = out_webp
                .strip_prefix(user_root(inbox_root, user_sub))
                .map(|p| p.to_string_lossy().into_owned())
                .unwrap_or_else(|_| out_webp.to_string_lossy().into_owned());
            record(items_store, item_id, &rel, ThumbStatus::Ok, "");
            debug!("[Inbox::Thumb] generated thumb for item={} at {}", item_id, rel);
            ThumbOutcome::ok(rel)
        }
        Err(msg) => {
            warn!("[Inbox::Thumb] generation failed for item={}: {}", item_id, msg);
            record(items_store, item_id, "", ThumbStatus::Failed, &msg);
            ThumbOutcome::failed(msg)
        }
    }
}

/// 画像ファイル → letterbox WEBP
///
/// 失敗理由は文字列で返す（そのまま `thumb_error` に入る想定）。
fn make_image_thumb_webp(
    src_path: &Path,
    out_webp: &Path,
    w: u32,
    h: u32,
    quality: f32,
) -> Result<(), String> {
    let img = image::open(src_path).map_err(|e| format!("decode failed: {}", e))?;
    let rgb = img.to_rgb8();
    let (sw, sh) = rgb.dimensions();
    if sw == 0 || sh == 0 {
        return Err("source image has zero dimension".to_string());
    }

    // letterbox：縦横比維持で内接、余白は白
    let scale = f64::min(w as f64 / sw as f64, h as f64 / sh as f64);
    let nw = ((sw as f64 * scale) as u32).max(1);
    let nh = ((sh as f64 * scale) as u32).max(1);

    let resized = image::imageops::resize(&rgb, nw, nh, FilterType::Lanczos3);
    let mut canvas = RgbImage::from_pixel(w, h, Rgb([255, 255, 255]));
    let x = (w.saturating_sub(nw)) / 2;
    let y = (h.saturating_sub(nh)) / 2;
    image::imageops::replace(&mut canvas, &resized, x as i64, y as i64);

    let encoded = webp::Encoder::from_rgb(canvas.as_raw(), w, h)
        .encode(quality)
        .to_vec();

    if let Some(parent) = out_webp.parent() {
        fs::create_dir_all(parent).map_err(|e| format!("mkdir failed: {}", e))?;
    }
    fs::write(out_webp, &encoded).map_err(|e| format!("write failed: {}", e))?;
    Ok(())
}

/// `thumb_*` 列への反映。DB 更新自体の失敗はログに残すだけで握りつぶす
/// （サムネ経路から呼び出し元へ例外を漏らさない）。
fn record(items_store: &ItemsStore, item_id: &str, thumb_rel: &str, status: ThumbStatus, error: &str) {
    if let Err(e) = items_store.update_thumb(item_id, thumb_rel, status, error) {
        error!(
            "[Inbox::Thumb] failed to record thumb status for item={}: {}",
            item_id, e
        );
    }
}
