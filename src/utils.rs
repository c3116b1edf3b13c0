use chrono::{Local, NaiveDate, Utc};
use sha2::{Digest, Sha256};

/// 单据日期格式
pub const DATE_FORMAT: &str = "%Y-%m-%d";

pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339()
}

/// 轨迹时间戳 (本地时间 时:分:秒)
pub fn now_clock() -> String {
    Local::now().format("%H:%M:%S").to_string()
}

pub fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).ok()
}

/// 名称规范化：去首尾空白 + 小写
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

pub fn sha256_hex(input: &[u8]) -> String {
    hex::encode(Sha256::digest(input))
}

/// 金额格式化：千分位 + 两位小数 (590000 -> "590,000.00")
pub fn format_amount(value: f64) -> String {
    let raw = format!("{:.2}", value.abs());
    let (int_part, frac_part) = raw.split_once('.').unwrap_or((raw.as_str(), "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (idx, ch) in int_part.chars().enumerate() {
        if idx > 0 && (int_part.len() - idx) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if value < 0.0 && raw != "0.00" { "-" } else { "" };
    format!("{}{}.{}", sign, grouped, frac_part)
}

/// 双向、忽略大小写的子串匹配
pub fn descriptions_overlap(a: &str, b: &str) -> bool {
    let a = a.to_lowercase();
    let b = b.to_lowercase();
    a.contains(&b) || b.contains(&a)
}
