//! Inbox 检索条件 → WHERE 片段构建
//!
//! 把筛选画面的各种条件（种别、标签、文件名、入库日、尺寸、最终阅览）
//! 机械地翻译成
//!
//! - WHERE 片段（`it.kind IN (?, ?) AND ...`，不带 `WHERE` 关键字）
//! - 与 `?` 占位符一一对应的参数列表
//!
//! 本模块纯函数、零 I/O、不执行 SQL。SQL 的拼装与执行是 exec 侧的职责。
//! 前提的 FROM / JOIN 结构：
//!
//! ```sql
//! FROM inbox_items AS it
//! LEFT JOIN lvdb.last_viewed AS lv
//!        ON lv.user_sub = ? AND lv.item_id = it.item_id
//! ```
//!
//! 未阅览判定用 `lv.item_id IS NULL`。条件未指定时「不缩小」；
//! 唯一例外是种别集合为空，那代表「一个都不选」，片段固定为 `1=0`。

use std::sync::OnceLock;

use chrono::{Duration, NaiveDate, SecondsFormat, TimeZone};
use regex::Regex;
use rusqlite::types::Value;

use crate::types::ItemKind;
use crate::util::{jst, now_jst};

// ============================================================================
// 筛选条件
// ============================================================================

/// 尺寸条件（bytes）
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SizeFilter {
    /// 指定值以上
    AtLeast(u64),
    /// 指定值以下
    AtMost(u64),
    /// 范围（两端各自可省略）
    Range { min: Option<u64>, max: Option<u64> },
}

/// 最终阅览条件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LastViewedFilter {
    /// 仅未阅览（JOIN 失配 = 没看过）
    UnviewedOnly,
    /// 期间指定（实质上只命中「看过的」）
    ViewedBetween {
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    },
    /// 最近 N 天/小时/分钟。`since_iso` 算不出来时不缩小（软失败，
    /// 警告由 UI 侧负责）。
    RecentSince { since_iso: Option<String> },
}

/// 筛选画面的条件一式
///
/// `kinds` 为空集合时片段为 `1=0`（零命中）。「不按种别筛」要传全种别，
/// 见 [`ItemFilter::all_kinds`]。
#[derive(Debug, Clone, Default)]
pub struct ItemFilter {
    pub kinds: Vec<ItemKind>,
    /// 各项 AND 的 `tags_json LIKE '%term%'`（子串匹配，现行仕様）
    pub tag_terms: Vec<String>,
    /// 各项 AND 的 `original_name LIKE '%term%'`
    pub name_terms: Vec<String>,
    /// 入库日下限（含、JST 当日 0 点）
    pub added_from: Option<NaiveDate>,
    /// 入库日上限（不含、翌日 0 点）
    pub added_to: Option<NaiveDate>,
    pub size: Option<SizeFilter>,
    pub last_viewed: Option<LastViewedFilter>,
}

impl ItemFilter {
    /// 全种别选中（实质「不按种别缩小」）
    pub fn all_kinds() -> Self {
        Self {
            kinds: ItemKind::ALL.to_vec(),
            ..Self::default()
        }
    }
}

/// 构建结果
#[derive(Debug, Clone)]
pub struct WhereClause {
    /// WHERE 片段（不含 `WHERE`；空字符串 = 无条件）
    pub sql: String,
    /// `?` 占位符按声明顺序对应的值
    pub params: Vec<Value>,
    /// 片段里是否出现了 `lv.` 条件（exec 侧据此决定 COUNT 是否需要 JOIN）
    pub uses_last_viewed: bool,
}

// ============================================================================
// 构建本体
// ============================================================================

/// 筛选条件 → (WHERE 片段, 参数)
///
/// 参数顺序固定：种别 → 标签 → 文件名 → 入库日 → 尺寸 → 最终阅览。
pub fn build_where_and_params(filter: &ItemFilter) -> WhereClause {
    let mut conds: Vec<String> = Vec::new();
    let mut params: Vec<Value> = Vec::new();
    let mut uses_last_viewed = false;

    // ----------------------------
    // 種別
    // ----------------------------
    if filter.kinds.is_empty() {
        conds.push("1=0".to_string());
    } else {
        let ph = vec!["?"; filter.kinds.len()].join(",");
        conds.push(format!("it.kind IN ({})", ph));
        params.extend(
            filter
                .kinds
                .iter()
                .map(|k| Value::from(k.as_str().to_string())),
        );
    }

    // ----------------------------
    // タグ（tags_json への LIKE：現行仕様）
    // ----------------------------
    for t in &filter.tag_terms {
        conds.push("it.tags_json LIKE ?".to_string());
        params.push(Value::from(format!("%{}%", t)));
    }

    // ----------------------------
    // ファイル名
    // ----------------------------
    for t in &filter.name_terms {
        conds.push("it.original_name LIKE ?".to_string());
        params.push(Value::from(format!("%{}%", t)));
    }

    // ----------------------------
    // 格納日（[start, end) 形式）
    // ----------------------------
    if let Some(d) = filter.added_from {
        conds.push("it.added_at >= ?".to_string());
        params.push(Value::from(date_to_iso_start(d)));
    }
    if let Some(d) = filter.added_to {
        conds.push("it.added_at < ?".to_string());
        params.push(Value::from(date_to_iso_end_exclusive(d)));
    }

    // ----------------------------
    // サイズ
    // ----------------------------
    match &filter.size {
        Some(SizeFilter::AtLeast(min)) => {
            conds.push("it.size_bytes >= ?".to_string());
            params.push(Value::from(*min as i64));
        }
        Some(SizeFilter::AtMost(max)) => {
            conds.push("it.size_bytes <= ?".to_string());
            params.push(Value::from(*max as i64));
        }
        Some(SizeFilter::Range { min, max }) => {
            if let Some(min) = min {
                conds.push("it.size_bytes >= ?".to_string());
                params.push(Value::from(*min as i64));
            }
            if let Some(max) = max {
                conds.push("it.size_bytes <= ?".to_string());
                params.push(Value::from(*max as i64));
            }
        }
        None => {}
    }

    // ----------------------------
    // 最終閲覧（lv エイリアス前提）
    // ----------------------------
    match &filter.last_viewed {
        Some(LastViewedFilter::UnviewedOnly) => {
            conds.push("lv.item_id IS NULL".to_string());
            uses_last_viewed = true;
        }
        Some(LastViewedFilter::ViewedBetween { from, to }) => {
            // 期間指定は「閲覧済み」だけが対象
            conds.push("lv.item_id IS NOT NULL".to_string());
            uses_last_viewed = true;
            if let Some(d) = from {
                conds.push("lv.last_viewed_at >= ?".to_string());
                params.push(Value::from(date_to_iso_start(*d)));
            }
            if let Some(d) = to {
                conds.push("lv.last_viewed_at < ?".to_string());
                params.push(Value::from(date_to_iso_end_exclusive(*d)));
            }
        }
        Some(LastViewedFilter::RecentSince { since_iso }) => {
            // since が取れたときだけ絞る（取れなければ絞らない）
            if let Some(since) = since_iso.as_deref().filter(|s| !s.is_empty()) {
                conds.push("lv.item_id IS NOT NULL".to_string());
                conds.push("lv.last_viewed_at >= ?".to_string());
                params.push(Value::from(since.to_string()));
                uses_last_viewed = true;
            }
        }
        None => {}
    }

    WhereClause {
        sql: conds.join(" AND "),
        params,
        uses_last_viewed,
    }
}

// ============================================================================
// 文字列・日付ヘルパ
// ============================================================================

/// 检索语正规化：trim + 空白连打（含全角空格）折叠为单个半角空格
pub fn norm_text(s: &str) -> String {
    static WS_RE: OnceLock<Regex> = OnceLock::new();
    let re = WS_RE.get_or_init(|| Regex::new(r"[ \t\u{3000}]+").expect("valid whitespace regex"));
    re.replace_all(s.trim(), " ").into_owned()
}

/// AND 检索用的词项切分
///
/// 分隔符：空白类、逗号、斜线（半角/全角）。连续分隔符合并、空项丢弃。
/// 标签框与文件名框共用这一条规则。
pub fn split_terms(s: &str) -> Vec<String> {
    static SEP_RE: OnceLock<Regex> = OnceLock::new();
    let re = SEP_RE.get_or_init(|| Regex::new(r"[,\s/／]+").expect("valid separator regex"));

    let s = s.trim();
    if s.is_empty() {
        return Vec::new();
    }
    re.split(s)
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// 「3日」「12h」「30分」等の表記 → Duration
///
/// 解析不能は None（呼び出し側でそのまま「絞らない」扱い）。
pub fn parse_recent(s: &str) -> Option<Duration> {
    static RECENT_RE: OnceLock<Regex> = OnceLock::new();
    let re = RECENT_RE.get_or_init(|| {
        Regex::new(r"(?i)^(\d+)\s*(日|時間|分|d|h|m)$").expect("valid recent regex")
    });

    let s = norm_text(s);
    let caps = re.captures(&s)?;
    let n: i64 = caps.get(1)?.as_str().parse().ok()?;
    match caps.get(2)?.as_str().to_ascii_lowercase().as_str() {
        "日" | "d" => Some(Duration::days(n)),
        "時間" | "h" => Some(Duration::hours(n)),
        "分" | "m" => Some(Duration::minutes(n)),
        _ => None,
    }
}

/// 「最近」モードの since 算出（現在時刻 - 指定幅、JST ISO）
pub fn recent_since_iso(s: &str) -> Option<String> {
    let delta = parse_recent(s)?;
    Some((now_jst() - delta).to_rfc3339_opts(SecondsFormat::Secs, false))
}

/// MB 入力 → bytes（筛选 UI 的尺寸栏用）
pub fn mb_to_bytes(x: f64) -> u64 {
    if !x.is_finite() || x <= 0.0 {
        return 0;
    }
    (x * 1024.0 * 1024.0) as u64
}

/// date → JST 当日 0 点の ISO 文字列（含む側の境界）
pub fn date_to_iso_start(d: NaiveDate) -> String {
    let naive = d.and_hms_opt(0, 0, 0).expect("midnight is a valid time");
    jst()
        .from_local_datetime(&naive)
        .single()
        .expect("fixed offset has a single local time")
        .to_rfc3339_opts(SecondsFormat::Secs, false)
}

/// date → 翌日 0 点の ISO 文字列（含まない側の境界、[start, end) 形式）
pub fn date_to_iso_end_exclusive(d: NaiveDate) -> String {
    date_to_iso_start(d + Duration::days(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_terms_mixed_separators() {
        assert_eq!(split_terms("a, b/c  d"), vec!["a", "b", "c", "d"]);
        assert_eq!(split_terms(""), Vec::<String>::new());
        assert_eq!(split_terms("   "), Vec::<String>::new());
        assert_eq!(split_terms("a,,b//c"), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_split_terms_fullwidth() {
        assert_eq!(split_terms("契約／2025　報告"), vec!["契約", "2025", "報告"]);
    }

    #[test]
    fn test_norm_text() {
        assert_eq!(norm_text("  a\t b　　c  "), "a b c");
        assert_eq!(norm_text(""), "");
    }

    #[test]
    fn test_parse_recent() {
        assert_eq!(parse_recent("3日"), Some(Duration::days(3)));
        assert_eq!(parse_recent("3d"), Some(Duration::days(3)));
        assert_eq!(parse_recent("12h"), Some(Duration::hours(12)));
        assert_eq!(parse_recent("12時間"), Some(Duration::hours(12)));
        assert_eq!(parse_recent("30分"), Some(Duration::minutes(30)));
        assert_eq!(parse_recent("30 m"), Some(Duration::minutes(30)));
        assert_eq!(parse_recent("12H"), Some(Duration::hours(12)));
        assert_eq!(parse_recent("gibberish"), None);
        assert_eq!(parse_recent(""), None);
        assert_eq!(parse_recent("3週間"), None);
    }

    #[test]
    fn test_mb_to_bytes() {
        assert_eq!(mb_to_bytes(1.0), 1024 * 1024);
        assert_eq!(mb_to_bytes(0.5), 512 * 1024);
        assert_eq!(mb_to_bytes(0.0), 0);
        assert_eq!(mb_to_bytes(-3.0), 0);
        assert_eq!(mb_to_bytes(f64::NAN), 0);
    }

    #[test]
    fn test_date_bounds() {
        let d = NaiveDate::from_ymd_opt(2026, 8, 6).expect("valid date");
        assert_eq!(date_to_iso_start(d), "2026-08-06T00:00:00+09:00");
        assert_eq!(date_to_iso_end_exclusive(d), "2026-08-07T00:00:00+09:00");
    }

    #[test]
    fn test_empty_kinds_matches_nothing() {
        let clause = build_where_and_params(&ItemFilter::default());
        assert_eq!(clause.sql, "1=0");
        assert!(clause.params.is_empty());
        assert!(!clause.uses_last_viewed);
    }

    #[test]
    fn test_empty_kinds_wins_even_with_other_filters() {
        let filter = ItemFilter {
            kinds: vec![],
            name_terms: vec!["report".to_string()],
            ..ItemFilter::default()
        };
        let clause = build_where_and_params(&filter);
        assert!(clause.sql.starts_with("1=0"), "sql={}", clause.sql);
    }

    #[test]
    fn test_kinds_and_terms_clause_shape() {
        let filter = ItemFilter {
            kinds: vec![ItemKind::Pdf, ItemKind::Image],
            tag_terms: vec!["2025".to_string()],
            name_terms: vec!["report".to_string(), "final".to_string()],
            ..ItemFilter::default()
        };
        let clause = build_where_and_params(&filter);
        assert_eq!(
            clause.sql,
            "it.kind IN (?,?) AND it.tags_json LIKE ? AND it.original_name LIKE ? AND it.original_name LIKE ?"
        );
        assert_eq!(clause.params.len(), 5);
        assert_eq!(clause.params[0], Value::from("pdf".to_string()));
        assert_eq!(clause.params[1], Value::from("image".to_string()));
        assert_eq!(clause.params[2], Value::from("%2025%".to_string()));
        assert_eq!(clause.params[3], Value::from("%report%".to_string()));
        assert_eq!(clause.params[4], Value::from("%final%".to_string()));
        assert!(!clause.uses_last_viewed);
    }

    #[test]
    fn test_date_and_size_params_in_declared_order() {
        let filter = ItemFilter {
            kinds: vec![ItemKind::Pdf],
            added_from: NaiveDate::from_ymd_opt(2026, 1, 1),
            added_to: NaiveDate::from_ymd_opt(2026, 1, 31),
            size: Some(SizeFilter::Range {
                min: Some(100),
                max: Some(10_000),
            }),
            ..ItemFilter::default()
        };
        let clause = build_where_and_params(&filter);
        assert_eq!(
            clause.sql,
            "it.kind IN (?) AND it.added_at >= ? AND it.added_at < ? AND it.size_bytes >= ? AND it.size_bytes <= ?"
        );
        assert_eq!(clause.params[1], Value::from("2026-01-01T00:00:00+09:00".to_string()));
        assert_eq!(clause.params[2], Value::from("2026-02-01T00:00:00+09:00".to_string()));
        assert_eq!(clause.params[3], Value::from(100i64));
        assert_eq!(clause.params[4], Value::from(10_000i64));
    }

    #[test]
    fn test_size_single_bounds() {
        let filter = ItemFilter {
            kinds: vec![ItemKind::Pdf],
            size: Some(SizeFilter::AtLeast(5)),
            ..ItemFilter::default()
        };
        let clause = build_where_and_params(&filter);
        assert!(clause.sql.ends_with("it.size_bytes >= ?"));

        let filter = ItemFilter {
            kinds: vec![ItemKind::Pdf],
            size: Some(SizeFilter::AtMost(5)),
            ..ItemFilter::default()
        };
        let clause = build_where_and_params(&filter);
        assert!(clause.sql.ends_with("it.size_bytes <= ?"));
    }

    #[test]
    fn test_unviewed_only() {
        let filter = ItemFilter {
            kinds: vec![ItemKind::Pdf],
            last_viewed: Some(LastViewedFilter::UnviewedOnly),
            ..ItemFilter::default()
        };
        let clause = build_where_and_params(&filter);
        assert_eq!(clause.sql, "it.kind IN (?) AND lv.item_id IS NULL");
        assert!(clause.uses_last_viewed);
    }

    #[test]
    fn test_viewed_between() {
        let filter = ItemFilter {
            kinds: vec![ItemKind::Pdf],
            last_viewed: Some(LastViewedFilter::ViewedBetween {
                from: NaiveDate::from_ymd_opt(2026, 8, 1),
                to: NaiveDate::from_ymd_opt(2026, 8, 6),
            }),
            ..ItemFilter::default()
        };
        let clause = build_where_and_params(&filter);
        assert_eq!(
            clause.sql,
            "it.kind IN (?) AND lv.item_id IS NOT NULL AND lv.last_viewed_at >= ? AND lv.last_viewed_at < ?"
        );
        assert!(clause.uses_last_viewed);
    }

    #[test]
    fn test_recent_without_since_is_soft_noop() {
        let filter = ItemFilter {
            kinds: vec![ItemKind::Pdf],
            last_viewed: Some(LastViewedFilter::RecentSince { since_iso: None }),
            ..ItemFilter::default()
        };
        let clause = build_where_and_params(&filter);
        assert_eq!(clause.sql, "it.kind IN (?)");
        assert!(!clause.uses_last_viewed);
    }

    #[test]
    fn test_recent_with_since() {
        let filter = ItemFilter {
            kinds: vec![ItemKind::Pdf],
            last_viewed: Some(LastViewedFilter::RecentSince {
                since_iso: Some("2026-08-03T00:00:00+09:00".to_string()),
            }),
            ..ItemFilter::default()
        };
        let clause = build_where_and_params(&filter);
        assert_eq!(
            clause.sql,
            "it.kind IN (?) AND lv.item_id IS NOT NULL AND lv.last_viewed_at >= ?"
        );
        assert!(clause.uses_last_viewed);
    }

    #[test]
    fn test_recent_since_iso_computation() {
        assert!(recent_since_iso("junk").is_none());
        let since = recent_since_iso("1日").expect("parseable");
        let parsed = chrono::DateTime::parse_from_rfc3339(&since).expect("valid iso");
        let expected = now_jst() - Duration::days(1);
        let drift = (parsed.timestamp() - expected.timestamp()).abs();
        assert!(drift < 5, "since should be about one day ago, drift={}s", drift);
        // JST 固定オフセット
        assert_eq!(parsed.offset().local_minus_utc(), 9 * 3600);
    }
}
