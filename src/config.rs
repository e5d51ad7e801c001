//! Inbox 运行参数
//!
//! 目前所有用户共用同一容量上限。按用户覆盖的扩展点保留在
//! [`InboxConfig::quota_bytes_for_user`]，将来可以接设置文件或 DB。

/// 默认容量上限：5 GiB / 用户
pub const QUOTA_BYTES_DEFAULT: u64 = 5 * 1024 * 1024 * 1024;

/// 缩略图画布宽
pub const THUMB_W: u32 = 320;
/// 缩略图画布高
pub const THUMB_H: u32 = 240;
/// WEBP 编码质量（0-100）
pub const THUMB_QUALITY: f32 = 80.0;

/// Inbox 运行参数
#[derive(Debug, Clone)]
pub struct InboxConfig {
    /// 每用户容量上限（bytes）
    pub quota_bytes: u64,
    pub thumb_width: u32,
    pub thumb_height: u32,
    pub thumb_quality: f32,
}

impl Default for InboxConfig {
    fn default() -> Self {
        Self {
            quota_bytes: QUOTA_BYTES_DEFAULT,
            thumb_width: THUMB_W,
            thumb_height: THUMB_H,
            thumb_quality: THUMB_QUALITY,
        }
    }
}

impl InboxConfig {
    /// 指定用户的容量上限
    ///
    /// 现状全员一致。保留 `_sub` 参数作为按用户分级的扩展点。
    pub fn quota_bytes_for_user(&self, _sub: &str) -> u64 {
        self.quota_bytes
    }
}
