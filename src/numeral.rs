//! Local arithmetic interpretation of spoken transcripts
//!
//! Scans a transcript for one of the four operators and its operands
//! (Arabic digits first, Chinese numerals as a fallback) and evaluates the
//! expression without a network round trip. When no operator or no operands
//! are found the interpreter declines with `None` and the caller falls back
//! to the remote responder. Division by zero is an explicit, user-facing
//! error and never falls through.

use std::sync::LazyLock;

use regex::Regex;

use crate::levels::format_grouped;

/// Fixed phrase spoken when a division by zero is requested
pub const DIVIDE_BY_ZERO: &str = "不能除以零";

static ARABIC_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+(?:\.\d+)?").expect("static regex"));

static CHINESE_RUN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("[零一二两三四五六七八九十百千万亿兆]+").expect("static regex"));

/// One of the four supported arithmetic operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl Operator {
    /// Display symbol used in equation strings
    #[must_use]
    pub const fn symbol(self) -> char {
        match self {
            Self::Add => '+',
            Self::Subtract => '-',
            Self::Multiply => '*',
            Self::Divide => '/',
        }
    }
}

/// A fully evaluated local expression
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    pub operand_a: f64,
    pub operand_b: f64,
    pub operator: Operator,
    pub result: f64,
    /// Human-readable "A op B = result" with thousands grouping
    pub equation: String,
}

/// Outcome of a successful operator detection
#[derive(Debug, Clone, PartialEq)]
pub enum Interpretation {
    /// An evaluated expression ready to display and speak
    Expression(Expression),
    /// A hard arithmetic error with its spoken message
    Error(String),
}

/// Detect an operator by symbol or Chinese word, add/sub/mul/div in order
#[must_use]
pub fn detect_operator(text: &str) -> Option<Operator> {
    if text.contains(['+', '＋']) || text.contains('加') {
        Some(Operator::Add)
    } else if text.contains(['-', '－']) || text.contains('减') {
        Some(Operator::Subtract)
    } else if text.contains(['x', '×', '*']) || text.contains('乘') {
        Some(Operator::Multiply)
    } else if text.contains(['/', '÷']) || text.contains('除') {
        Some(Operator::Divide)
    } else {
        None
    }
}

/// Evaluate a run of Chinese numeral characters with a positional accumulator
///
/// 万亿 and 亿亿 are substituted to the single-character internal units 兆 and
/// 京 first so they read as one big unit. Within a 4-digit section each small
/// unit multiplies the preceding digit (implicit 一 when omitted); a big unit
/// rolls the section into the grand total at its magnitude.
#[must_use]
pub fn parse_chinese_numeral(run: &str) -> f64 {
    let run = run.replace("万亿", "兆").replace("亿亿", "京");
    let mut total = 0.0f64;
    let mut section = 0.0f64;
    let mut number = 0.0f64;
    for ch in run.chars() {
        if let Some(d) = digit_value(ch) {
            number = d;
            continue;
        }
        if let Some(unit) = unit_value(ch) {
            if unit < 10_000.0 {
                section += if number == 0.0 { 1.0 } else { number } * unit;
            } else {
                section += number;
                total += section * unit;
                section = 0.0;
            }
            number = 0.0;
        }
    }
    total + section + number
}

fn digit_value(ch: char) -> Option<f64> {
    Some(match ch {
        '零' => 0.0,
        '一' => 1.0,
        '二' | '两' => 2.0,
        '三' => 3.0,
        '四' => 4.0,
        '五' => 5.0,
        '六' => 6.0,
        '七' => 7.0,
        '八' => 8.0,
        '九' => 9.0,
        _ => return None,
    })
}

fn unit_value(ch: char) -> Option<f64> {
    Some(match ch {
        '十' => 10.0,
        '百' => 100.0,
        '千' => 1_000.0,
        '万' => 10_000.0,
        '亿' => 100_000_000.0,
        '兆' => 1_000_000_000_000.0,
        '京' => 10_000_000_000_000_000.0,
        _ => return None,
    })
}

/// Collect operands in appearance order, Arabic digits first
///
/// If any Arabic numeral is present the Chinese fallback is skipped entirely.
/// Chinese runs that evaluate to zero are rejected as noise (stray units,
/// interior 零 markers). A literal 零 run is the exception: that is a
/// deliberate zero operand ("除以零").
#[must_use]
#[allow(clippy::float_cmp)]
pub fn extract_operands(text: &str) -> Vec<f64> {
    let mut nums: Vec<f64> = ARABIC_RE
        .find_iter(text)
        .filter_map(|m| m.as_str().parse().ok())
        .collect();
    if !nums.is_empty() {
        return nums;
    }

    for m in CHINESE_RUN_RE.find_iter(text) {
        let run = m.as_str();
        let v = parse_chinese_numeral(run);
        if !v.is_finite() {
            continue;
        }
        if v == 0.0 {
            if run.chars().all(|c| c == '零') {
                nums.push(0.0);
            }
            continue;
        }
        nums.push(v);
    }
    nums
}

/// Interpret a transcript against the current displayed value
///
/// Returns `None` when no operator or no operands are found (the caller
/// falls back to the remote responder). With two or more operands the first
/// two are used in order; with exactly one, the current displayed value
/// becomes operand A.
#[must_use]
#[allow(clippy::float_cmp)]
pub fn interpret(transcript: &str, current_value: f64) -> Option<Interpretation> {
    let operator = detect_operator(transcript)?;
    let nums = extract_operands(transcript);
    if nums.is_empty() {
        return None;
    }
    let (a, b) = if nums.len() >= 2 {
        (nums[0], nums[1])
    } else {
        (current_value, nums[0])
    };
    if !a.is_finite() || !b.is_finite() {
        return None;
    }

    let result = match operator {
        Operator::Add => a + b,
        Operator::Subtract => a - b,
        Operator::Multiply => a * b,
        Operator::Divide => {
            if b == 0.0 {
                return Some(Interpretation::Error(DIVIDE_BY_ZERO.to_string()));
            }
            a / b
        }
    };
    if !result.is_finite() {
        return None;
    }

    let equation = format!(
        "{} {} {} = {}",
        format_grouped(a),
        operator.symbol(),
        format_grouped(b),
        format_grouped(result)
    );
    Some(Interpretation::Expression(Expression {
        operand_a: a,
        operand_b: b,
        operator,
        result,
        equation,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::levels::{LEVELS, to_chinese};

    #[test]
    fn operator_detection_symbols_and_words() {
        assert_eq!(detect_operator("3+4"), Some(Operator::Add));
        assert_eq!(detect_operator("一万加五千"), Some(Operator::Add));
        assert_eq!(detect_operator("十减五"), Some(Operator::Subtract));
        assert_eq!(detect_operator("2×3"), Some(Operator::Multiply));
        assert_eq!(detect_operator("六除以二"), Some(Operator::Divide));
        assert_eq!(detect_operator("8÷2"), Some(Operator::Divide));
        assert_eq!(detect_operator("有多少颗糖"), None);
    }

    #[test]
    fn chinese_readings_round_trip_for_all_levels() {
        #[allow(clippy::cast_precision_loss)]
        for level in &LEVELS {
            let reading = to_chinese(level.value as f64);
            assert_eq!(
                parse_chinese_numeral(&reading),
                level.value as f64,
                "reading {reading}"
            );
        }
    }

    #[test]
    fn compound_chinese_numbers() {
        assert_eq!(parse_chinese_numeral("一万零一百"), 10_100.0);
        assert_eq!(parse_chinese_numeral("两百"), 200.0);
        assert_eq!(parse_chinese_numeral("三千五百万"), 35_000_000.0);
        assert_eq!(parse_chinese_numeral("十万亿"), 1e13);
        assert_eq!(parse_chinese_numeral("一亿亿"), 1e16);
    }

    #[test]
    fn arabic_operands_shadow_chinese_ones() {
        assert_eq!(extract_operands("3加五"), vec![3.0]);
        assert_eq!(extract_operands("1.5乘2"), vec![1.5, 2.0]);
    }

    #[test]
    fn zero_value_runs_are_noise_except_literal_zero() {
        assert!(extract_operands("乘以万").is_empty());
        assert_eq!(extract_operands("除以零"), vec![0.0]);
    }

    #[test]
    fn two_operands_ignore_current_value() {
        let Some(Interpretation::Expression(expr)) = interpret("一万加五千", 42.0) else {
            panic!("expected an expression");
        };
        assert_eq!(expr.operand_a, 10_000.0);
        assert_eq!(expr.operand_b, 5_000.0);
        assert_eq!(expr.result, 15_000.0);
        assert_eq!(expr.equation, "10,000 + 5,000 = 15,000");
    }

    #[test]
    fn single_operand_uses_current_value_first() {
        let Some(Interpretation::Expression(expr)) = interpret("加五千", 10_000.0) else {
            panic!("expected an expression");
        };
        assert_eq!(expr.operand_a, 10_000.0);
        assert_eq!(expr.operand_b, 5_000.0);
    }

    #[test]
    fn division_by_zero_is_explicit() {
        assert_eq!(
            interpret("100除以0", 10.0),
            Some(Interpretation::Error(DIVIDE_BY_ZERO.to_string()))
        );
        assert_eq!(
            interpret("除以零", 100.0),
            Some(Interpretation::Error(DIVIDE_BY_ZERO.to_string()))
        );
    }

    #[test]
    fn division_keeps_two_decimals() {
        let Some(Interpretation::Expression(expr)) = interpret("10除以4", 0.0) else {
            panic!("expected an expression");
        };
        assert_eq!(expr.result, 2.5);
        assert_eq!(expr.equation, "10 / 4 = 2.5");
    }

    #[test]
    fn no_operator_or_no_operands_decline() {
        assert_eq!(interpret("好多糖果", 10.0), None);
        assert_eq!(interpret("加很多糖", 10.0), None);
    }
}
