//! 小工具：JST 时刻、尺寸表示、文件名消毒

use chrono::{DateTime, FixedOffset, SecondsFormat, Utc};

/// JST（UTC+9）。日期筛选与入库时刻统一按 JST 解释。
pub fn jst() -> FixedOffset {
    FixedOffset::east_opt(9 * 3600).expect("UTC+9 is a valid fixed offset")
}

/// 当前时刻（JST、秒精度 ISO 字符串）
///
/// 例：`2026-08-06T21:00:00+09:00`
pub fn now_iso_jst() -> String {
    now_jst().to_rfc3339_opts(SecondsFormat::Secs, false)
}

pub fn now_jst() -> DateTime<FixedOffset> {
    Utc::now().with_timezone(&jst())
}

/// 人类可读的字节数表示
pub fn bytes_human(n: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = 1024 * 1024;
    const GB: u64 = 1024 * 1024 * 1024;
    if n < KB {
        format!("{} B", n)
    } else if n < MB {
        format!("{:.1} KB", n as f64 / KB as f64)
    } else if n < GB {
        format!("{:.1} MB", n as f64 / MB as f64)
    } else {
        format!("{:.2} GB", n as f64 / GB as f64)
    }
}

/// 文件名消毒：替换文件系统非法字符并限制长度
///
/// - `/ \ : * ? " < > |` 一律替换为 `_`
/// - 超过 `max_len` 字符时截断主干、保留扩展名
/// - 按字符（非字节）截断，多字节文件名安全
pub fn safe_filename(name: &str, max_len: usize) -> String {
    let mut out: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            other => other,
        })
        .collect();
    out = out.trim().to_string();

    if out.chars().count() <= max_len {
        return out;
    }

    // 保留扩展名，截断主干
    let (stem, ext) = match out.rfind('.') {
        Some(pos) if pos > 0 => (out[..pos].to_string(), out[pos..].to_string()),
        _ => (out.clone(), String::new()),
    };
    let ext_len = ext.chars().count();
    let keep = max_len.saturating_sub(ext_len).max(1);
    let stem_cut: String = stem.chars().take(keep).collect();
    format!("{}{}", stem_cut, ext)
}

/// `safe_filename` 的默认长度上限
pub const SAFE_FILENAME_MAX_LEN: usize = 120;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_iso_jst_has_offset() {
        let s = now_iso_jst();
        assert!(s.ends_with("+09:00"), "unexpected timestamp: {}", s);
        // 秒精度：没有小数部分
        assert!(!s.contains('.'), "unexpected timestamp: {}", s);
    }

    #[test]
    fn test_bytes_human() {
        assert_eq!(bytes_human(0), "0 B");
        assert_eq!(bytes_human(1023), "1023 B");
        assert_eq!(bytes_human(1024), "1.0 KB");
        assert_eq!(bytes_human(1536), "1.5 KB");
        assert_eq!(bytes_human(10 * 1024 * 1024), "10.0 MB");
        assert_eq!(bytes_human(5 * 1024 * 1024 * 1024), "5.00 GB");
    }

    #[test]
    fn test_safe_filename_replaces_bad_chars() {
        assert_eq!(safe_filename("a/b\\c:d*e?f\"g<h>i|j.pdf", 120), "a_b_c_d_e_f_g_h_i_j.pdf");
        assert_eq!(safe_filename("  plain.txt  ", 120), "plain.txt");
    }

    #[test]
    fn test_safe_filename_caps_length_keeps_extension() {
        let long = format!("{}.pdf", "x".repeat(200));
        let out = safe_filename(&long, 120);
        assert_eq!(out.chars().count(), 120);
        assert!(out.ends_with(".pdf"));
    }

    #[test]
    fn test_safe_filename_multibyte() {
        let long = format!("{}.txt", "資".repeat(200));
        let out = safe_filename(&long, 120);
        assert_eq!(out.chars().count(), 120);
        assert!(out.ends_with(".txt"));
    }
}
