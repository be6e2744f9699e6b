//! Canonical magnitude levels and number formatting
//!
//! The display always shows one of sixteen round values (10 … 10^16), each
//! with a Chinese reading, a unit group, and a container metaphor. Arithmetic
//! results leave the canonical ladder and are rendered through the same
//! formatting helpers.

/// One canonical magnitude level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Level {
    /// Numeric value (a power of ten between 10 and 10^16)
    pub value: u64,
    /// Unit group shown on the badge (empty, 万, 亿, 万亿, 亿亿)
    pub unit: &'static str,
    /// Chinese reading (十, 一百, …, 一亿亿)
    pub cn: &'static str,
    /// Container metaphor label (颗, 小袋, 礼盒, …)
    pub container_label: &'static str,
    /// Container metaphor emoji
    pub container_emoji: &'static str,
}

/// The fixed ladder of canonical magnitudes, ascending
pub const LEVELS: [Level; 16] = [
    Level { value: 10, unit: "", cn: "十", container_label: "颗", container_emoji: "🍬" },
    Level { value: 100, unit: "", cn: "一百", container_label: "颗", container_emoji: "🍬" },
    Level { value: 1_000, unit: "", cn: "一千", container_label: "颗", container_emoji: "🍬" },
    Level { value: 10_000, unit: "万", cn: "一万", container_label: "小袋", container_emoji: "🢋" },
    Level { value: 100_000, unit: "万", cn: "十万", container_label: "礼盒", container_emoji: "🎁" },
    Level { value: 1_000_000, unit: "万", cn: "一百万", container_label: "大箱", container_emoji: "📦" },
    Level { value: 10_000_000, unit: "万", cn: "一千万", container_label: "小车", container_emoji: "🛒" },
    Level { value: 100_000_000, unit: "亿", cn: "一亿", container_label: "货车", container_emoji: "🚚" },
    Level { value: 1_000_000_000, unit: "亿", cn: "十亿", container_label: "仓库", container_emoji: "🏬" },
    Level { value: 10_000_000_000, unit: "亿", cn: "一百亿", container_label: "城堡", container_emoji: "🏰" },
    Level { value: 100_000_000_000, unit: "亿", cn: "一千亿", container_label: "王国", container_emoji: "👑" },
    Level { value: 1_000_000_000_000, unit: "万亿", cn: "一万亿", container_label: "星海", container_emoji: "✨" },
    Level { value: 10_000_000_000_000, unit: "万亿", cn: "十万亿", container_label: "星河", container_emoji: "🌌" },
    Level { value: 100_000_000_000_000, unit: "万亿", cn: "一百万亿", container_label: "星系", container_emoji: "🪐" },
    Level { value: 1_000_000_000_000_000, unit: "万亿", cn: "一千万亿", container_label: "宇宙", container_emoji: "🌠" },
    Level { value: 10_000_000_000_000_000, unit: "亿亿", cn: "一亿亿", container_label: "无限", container_emoji: "♾️" },
];

/// Index of the canonical level closest to `value`
///
/// Exact matches win; otherwise the level with the smallest absolute
/// difference is chosen.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn nearest_index(value: f64) -> usize {
    let mut best = 0;
    let mut best_dist = f64::INFINITY;
    for (i, level) in LEVELS.iter().enumerate() {
        let d = (level.value as f64 - value).abs();
        if d < best_dist {
            best_dist = d;
            best = i;
        }
    }
    best
}

/// The canonical level closest to `value`
#[must_use]
pub fn nearest(value: f64) -> &'static Level {
    &LEVELS[nearest_index(value)]
}

/// Unit group for an arbitrary value (used for custom-mode badges)
#[must_use]
pub fn unit_for(value: f64) -> &'static str {
    if value >= 1e16 {
        "亿亿"
    } else if value >= 1e12 {
        "万亿"
    } else if value >= 1e8 {
        "亿"
    } else if value >= 1e4 {
        "万"
    } else {
        ""
    }
}

/// Round to two decimals and split into integer part and 0..=99 fraction
///
/// Integers bypass the scaling so magnitudes beyond 2^53/100 stay exact.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::float_cmp)]
fn split_rounded(n: f64) -> (u64, u8) {
    let n = n.abs();
    if n.fract() == 0.0 {
        return (n as u64, 0);
    }
    let rounded = (n * 100.0).round() / 100.0;
    let int = rounded.trunc();
    let frac = ((rounded - int) * 100.0).round() as u8;
    (int as u64, frac)
}

fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    let len = digits.len();
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

fn push_fraction(out: &mut String, frac: u8) {
    if frac == 0 {
        return;
    }
    if frac % 10 == 0 {
        out.push_str(&format!(".{}", frac / 10));
    } else {
        out.push_str(&format!(".{frac:02}"));
    }
}

/// Thousands-grouped Arabic rendering ("10,000", "2.5")
///
/// Fractions are rounded to at most two decimals with trailing zeros
/// trimmed; grouping applies to the integer part only.
#[must_use]
pub fn format_grouped(n: f64) -> String {
    if !n.is_finite() {
        return String::new();
    }
    let (int, frac) = split_rounded(n);
    let mut out = String::new();
    if n < 0.0 {
        out.push('-');
    }
    out.push_str(&group_thousands(int));
    push_fraction(&mut out, frac);
    out
}

/// Ungrouped rendering for spoken text ("15000", "2.5")
#[must_use]
pub fn format_plain(n: f64) -> String {
    if !n.is_finite() {
        return String::new();
    }
    let (int, frac) = split_rounded(n);
    let mut out = String::new();
    if n < 0.0 {
        out.push('-');
    }
    out.push_str(&int.to_string());
    push_fraction(&mut out, frac);
    out
}

const DIGITS: [char; 10] = ['零', '一', '二', '三', '四', '五', '六', '七', '八', '九'];
const SMALL_UNITS: [&str; 4] = ["", "十", "百", "千"];
const BIG_UNITS: [&str; 5] = ["", "万", "亿", "万亿", "亿亿"];

/// Render a number as Chinese numerals
///
/// Handles zero, negatives, up to two decimals ("二点五") and integers up to
/// the 亿亿 range. Interior zeros collapse to a single 零 and a leading 一十
/// becomes 十 ("十万", not "一十万").
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::float_cmp)]
pub fn to_chinese(n: f64) -> String {
    if !n.is_finite() {
        return String::new();
    }
    if n == 0.0 {
        return "零".to_string();
    }
    if n < 0.0 {
        return format!("负{}", to_chinese(-n));
    }
    if n.fract() != 0.0 {
        let (int, frac) = split_rounded(n);
        if frac == 0 {
            return chinese_integer(int);
        }
        let mut out = chinese_integer(int);
        out.push('点');
        if frac % 10 == 0 {
            out.push(DIGITS[(frac / 10) as usize]);
        } else {
            out.push(DIGITS[(frac / 10) as usize]);
            out.push(DIGITS[(frac % 10) as usize]);
        }
        return out;
    }
    chinese_integer(n as u64)
}

/// Render a positive integer, 4-digit section at a time
fn chinese_integer(mut x: u64) -> String {
    if x == 0 {
        return "零".to_string();
    }
    let mut parts: Vec<String> = Vec::new();
    let mut big = 0;
    // A lower section with leading zeros (or an all-zero gap) needs a 零
    // marker once a higher section lands above it.
    let mut lower_needs_zero = false;
    while x > 0 && big < BIG_UNITS.len() {
        let chunk = (x % 10_000) as u32;
        if chunk != 0 {
            if lower_needs_zero {
                parts.insert(0, "零".to_string());
            }
            let section = chinese_section(chunk);
            parts.insert(0, format!("{}{}", section, BIG_UNITS[big]));
            lower_needs_zero = chunk < 1_000;
        } else if !parts.is_empty() {
            lower_needs_zero = true;
        }
        x /= 10_000;
        big += 1;
    }
    collapse_zeros(&parts.concat())
}

/// Render a 1..=9999 section with 十/百/千 and interior-zero markers
fn chinese_section(chunk: u32) -> String {
    let mut s = String::new();
    let mut pending_zero = false;
    for i in (0..4).rev() {
        let d = (chunk / 10u32.pow(i)) % 10;
        if d == 0 {
            if !s.is_empty() {
                pending_zero = true;
            }
        } else {
            if pending_zero {
                s.push('零');
                pending_zero = false;
            }
            s.push(DIGITS[d as usize]);
            s.push_str(SMALL_UNITS[i as usize]);
        }
    }
    if let Some(rest) = s.strip_prefix("一十") {
        return format!("十{rest}");
    }
    s
}

fn collapse_zeros(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_zero = false;
    for ch in s.chars() {
        if ch == '零' {
            if !prev_zero {
                out.push(ch);
            }
            prev_zero = true;
        } else {
            out.push(ch);
            prev_zero = false;
        }
    }
    while out.ends_with('零') {
        out.truncate(out.len() - '零'.len_utf8());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_levels_have_expected_readings() {
        #[allow(clippy::cast_precision_loss)]
        for level in &LEVELS {
            assert_eq!(to_chinese(level.value as f64), level.cn, "value {}", level.value);
        }
    }

    #[test]
    fn interior_zeros_collapse() {
        assert_eq!(to_chinese(10_100.0), "一万零一百");
        assert_eq!(to_chinese(100_000_005.0), "一亿零五");
        assert_eq!(to_chinese(1_005.0), "一千零五");
    }

    #[test]
    fn decimals_and_negatives() {
        assert_eq!(to_chinese(2.5), "二点五");
        assert_eq!(to_chinese(0.25), "零点二五");
        assert_eq!(to_chinese(-300.0), "负三百");
        assert_eq!(to_chinese(0.0), "零");
    }

    #[test]
    fn grouped_formatting() {
        assert_eq!(format_grouped(15_000.0), "15,000");
        assert_eq!(format_grouped(10_000_000_000_000_000.0), "10,000,000,000,000,000");
        assert_eq!(format_grouped(2.5), "2.5");
        assert_eq!(format_grouped(-1_234.0), "-1,234");
        assert_eq!(format_grouped(999.0), "999");
    }

    #[test]
    fn plain_formatting() {
        assert_eq!(format_plain(15_000.0), "15000");
        assert_eq!(format_plain(2.5), "2.5");
        assert_eq!(format_plain(0.33), "0.33");
    }

    #[test]
    fn nearest_prefers_exact_then_distance() {
        assert_eq!(nearest(1_000.0).value, 1_000);
        assert_eq!(nearest(999.0).value, 1_000);
        assert_eq!(nearest(7_000.0).value, 10_000);
        assert_eq!(nearest(1e18).value, 10_000_000_000_000_000);
    }

    #[test]
    fn unit_groups() {
        assert_eq!(unit_for(100.0), "");
        assert_eq!(unit_for(50_000.0), "万");
        assert_eq!(unit_for(2e8), "亿");
        assert_eq!(unit_for(1e13), "万亿");
        assert_eq!(unit_for(1e16), "亿亿");
    }
}
