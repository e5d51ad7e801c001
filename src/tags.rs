//! 标签工具（UI 非依赖）
//!
//! 标签在 DB 里以 JSON 数组字符串（`tags_json`）保存，`[]` 表示无标签。

use serde_json::Value;

/// 把用户输入整理成标签列表
///
/// - 换行先归一为逗号
/// - 含逗号时按逗号切分，否则按空白切分
/// - 去除空要素
pub fn normalize_tags(tag_text: &str) -> Vec<String> {
    let s = tag_text.trim();
    if s.is_empty() {
        return Vec::new();
    }

    let s = s.replace('\n', ",");
    let parts: Vec<&str> = if s.contains(',') {
        s.split(',').collect()
    } else {
        s.split_whitespace().collect()
    };

    parts
        .into_iter()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

/// 用户输入 → DB 保存用 tags_json
pub fn tags_json_from_input(tag_text: &str) -> String {
    let tags = normalize_tags(tag_text);
    serde_json::to_string(&tags).unwrap_or_else(|_| "[]".to_string())
}

/// 取 tags_json 的第一个标签（紧凑表示用）
///
/// 解析失败、非数组、空数组时一律返回空字符串。
pub fn first_tag(tags_json: &str) -> String {
    match serde_json::from_str::<Value>(tags_json) {
        Ok(Value::Array(arr)) => match arr.first() {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        },
        _ => String::new(),
    }
}
