//! 运行时值语义
//!
//! 运行时值直接使用 `serde_json::Value`。比较与类型转换采用宽松语义：
//! - 数字与数字字符串按数值比较（`30 == "30"` 为真）
//! - `===` 要求 JSON 类型与值完全一致（整数与浮点数视为不同类型）
//! - 大小比较仅允许 数值/数字字符串 之间或字符串之间，其余组合报类型错误

use crate::error::{ExpressionError, Result};
use serde_json::{Number, Value};
use std::cmp::Ordering;

/// 数值（整数保持为 i64，必要时退化为 f64）
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Numeric {
    Int(i64),
    Float(f64),
}

impl Numeric {
    pub fn as_f64(self) -> f64 {
        match self {
            Self::Int(i) => i as f64,
            Self::Float(f) => f,
        }
    }

    pub fn into_value(self) -> Value {
        match self {
            Self::Int(i) => Value::from(i),
            Self::Float(f) => Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null),
        }
    }

    fn cmp_numeric(self, other: Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => Some(a.cmp(&b)),
            (a, b) => a.as_f64().partial_cmp(&b.as_f64()),
        }
    }
}

/// 值的类型名称（用于错误信息）
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// 真值判断
///
/// 以下值视为假：null、false、0、0.0、""、"0"、空数组、空对象。
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !(s.is_empty() || s == "0"),
        Value::Array(arr) => !arr.is_empty(),
        Value::Object(obj) => !obj.is_empty(),
    }
}

/// 将 JSON 数字转为 Numeric
pub fn number_to_numeric(n: &Number) -> Numeric {
    match n.as_i64() {
        Some(i) => Numeric::Int(i),
        None => Numeric::Float(n.as_f64().unwrap_or(f64::NAN)),
    }
}

/// 解析数字字符串，允许首尾空白、符号、小数和指数部分
pub fn parse_numeric_str(s: &str) -> Option<Numeric> {
    let trimmed = s.trim();
    let body = trimmed
        .strip_prefix('-')
        .or_else(|| trimmed.strip_prefix('+'))
        .unwrap_or(trimmed);

    let (mantissa, exponent) = match body.find(['e', 'E']) {
        Some(idx) => (&body[..idx], Some(&body[idx + 1..])),
        None => (body, None),
    };

    let (int_part, frac_part) = match mantissa.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (mantissa, None),
    };

    let all_digits = |s: &str| s.chars().all(|c| c.is_ascii_digit());
    if !all_digits(int_part) || !frac_part.is_none_or(all_digits) {
        return None;
    }
    if int_part.is_empty() && frac_part.is_none_or(str::is_empty) {
        return None;
    }
    if let Some(exp) = exponent {
        let digits = exp
            .strip_prefix('-')
            .or_else(|| exp.strip_prefix('+'))
            .unwrap_or(exp);
        if digits.is_empty() || !all_digits(digits) {
            return None;
        }
    }

    if frac_part.is_none() && exponent.is_none() {
        if let Ok(i) = trimmed.parse::<i64>() {
            return Some(Numeric::Int(i));
        }
    }
    trimmed.parse::<f64>().ok().map(Numeric::Float)
}

/// 严格数值：仅数字或数字字符串
pub fn as_numeric(value: &Value) -> Option<Numeric> {
    match value {
        Value::Number(n) => Some(number_to_numeric(n)),
        Value::String(s) => parse_numeric_str(s),
        _ => None,
    }
}

/// 算术运算使用的数值转换：额外接受 null 与布尔值
pub fn to_arithmetic(value: &Value) -> Option<Numeric> {
    match value {
        Value::Null => Some(Numeric::Int(0)),
        Value::Bool(b) => Some(Numeric::Int(i64::from(*b))),
        other => as_numeric(other),
    }
}

/// 格式化浮点数：整数值的浮点数不带小数部分
pub fn format_float(f: f64) -> String {
    if f.fract() == 0.0 && f.abs() < 1e15 {
        format!("{}", f as i64)
    } else {
        f.to_string()
    }
}

/// 标量转字符串
///
/// null 与 false 转为空串，true 转为 "1"；数组和对象没有字符串形式。
pub fn to_string_lossy(value: &Value) -> Option<String> {
    match value {
        Value::Null => Some(String::new()),
        Value::Bool(true) => Some("1".to_string()),
        Value::Bool(false) => Some(String::new()),
        Value::Number(n) => Some(match number_to_numeric(n) {
            Numeric::Int(i) => i.to_string(),
            Numeric::Float(f) => format_float(f),
        }),
        Value::String(s) => Some(s.clone()),
        Value::Array(_) | Value::Object(_) => None,
    }
}

/// 宽松相等（`==`）
pub fn loose_eq(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(b), other) | (other, Value::Bool(b)) => *b == is_truthy(other),
        (Value::Null, other) | (other, Value::Null) => match other {
            Value::String(s) => s.is_empty(),
            Value::Number(n) => n.as_f64() == Some(0.0),
            Value::Array(arr) => arr.is_empty(),
            Value::Object(obj) => obj.is_empty(),
            _ => false,
        },
        (Value::Number(a), Value::Number(b)) => {
            number_to_numeric(a).cmp_numeric(number_to_numeric(b)) == Some(Ordering::Equal)
        }
        (Value::Number(n), Value::String(s)) | (Value::String(s), Value::Number(n)) => {
            match parse_numeric_str(s) {
                Some(parsed) => {
                    number_to_numeric(n).cmp_numeric(parsed) == Some(Ordering::Equal)
                }
                None => to_string_lossy(&Value::Number(n.clone())).as_deref() == Some(s),
            }
        }
        (Value::String(a), Value::String(b)) => {
            match (parse_numeric_str(a), parse_numeric_str(b)) {
                (Some(x), Some(y)) => x.cmp_numeric(y) == Some(Ordering::Equal),
                _ => a == b,
            }
        }
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| loose_eq(x, y))
        }
        (Value::Object(a), Value::Object(b)) => {
            a.len() == b.len()
                && a.iter()
                    .all(|(k, v)| b.get(k).is_some_and(|other| loose_eq(v, other)))
        }
        _ => false,
    }
}

/// 严格相等（`===`）
pub fn strict_eq(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => match (a.is_f64(), b.is_f64()) {
            (false, false) => a.as_i64() == b.as_i64() && a.as_u64() == b.as_u64(),
            (true, true) => a.as_f64() == b.as_f64(),
            _ => false,
        },
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| strict_eq(x, y))
        }
        (Value::Object(a), Value::Object(b)) => {
            a.len() == b.len()
                && a.iter()
                    .all(|(k, v)| b.get(k).is_some_and(|other| strict_eq(v, other)))
        }
        _ => left == right,
    }
}

/// 大小比较（`<` `<=` `>` `>=`）
pub fn compare(operator: &str, left: &Value, right: &Value) -> Result<Ordering> {
    if let (Some(a), Some(b)) = (as_numeric(left), as_numeric(right)) {
        return a
            .cmp_numeric(b)
            .ok_or_else(|| ExpressionError::type_mismatch(operator, left, right));
    }

    match (left, right) {
        (Value::String(a), Value::String(b)) => Ok(a.cmp(b)),
        _ => Err(ExpressionError::type_mismatch(operator, left, right)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_truthiness() {
        assert!(!is_truthy(&json!(null)));
        assert!(!is_truthy(&json!("")));
        assert!(!is_truthy(&json!("0")));
        assert!(!is_truthy(&json!(0)));
        assert!(!is_truthy(&json!(0.0)));
        assert!(!is_truthy(&json!([])));
        assert!(!is_truthy(&json!({})));
        assert!(is_truthy(&json!("x")));
        assert!(is_truthy(&json!(-1)));
        assert!(is_truthy(&json!([0])));
    }

    #[test]
    fn test_parse_numeric_str() {
        assert_eq!(parse_numeric_str("30"), Some(Numeric::Int(30)));
        assert_eq!(parse_numeric_str(" -7 "), Some(Numeric::Int(-7)));
        assert_eq!(parse_numeric_str("1.5"), Some(Numeric::Float(1.5)));
        assert_eq!(parse_numeric_str("1e3"), Some(Numeric::Float(1000.0)));
        assert_eq!(parse_numeric_str(".5"), Some(Numeric::Float(0.5)));
        assert_eq!(parse_numeric_str(""), None);
        assert_eq!(parse_numeric_str("abc"), None);
        assert_eq!(parse_numeric_str("inf"), None);
        assert_eq!(parse_numeric_str("NaN"), None);
        assert_eq!(parse_numeric_str("1990-01-01"), None);
        assert_eq!(parse_numeric_str("1e"), None);
    }

    #[test]
    fn test_loose_eq_number_and_numeric_string() {
        assert!(loose_eq(&json!(30), &json!("30")));
        assert!(loose_eq(&json!("30"), &json!(30)));
        assert!(loose_eq(&json!(30), &json!("30.0")));
        assert!(loose_eq(&json!(100.0), &json!(100)));
        assert!(!loose_eq(&json!(30), &json!("31")));
        assert!(!loose_eq(&json!(30), &json!("abc")));
    }

    #[test]
    fn test_loose_eq_null_and_bool() {
        assert!(loose_eq(&json!(null), &json!(false)));
        assert!(loose_eq(&json!(null), &json!("")));
        assert!(loose_eq(&json!(null), &json!([])));
        assert!(loose_eq(&json!(null), &json!(0)));
        assert!(!loose_eq(&json!(null), &json!("0")));
        assert!(!loose_eq(&json!(null), &json!("a")));
        assert!(loose_eq(&json!(true), &json!("yes")));
        assert!(loose_eq(&json!(false), &json!(0)));
    }

    #[test]
    fn test_strict_eq() {
        assert!(strict_eq(&json!(30), &json!(30)));
        assert!(!strict_eq(&json!(30), &json!("30")));
        assert!(!strict_eq(&json!(30), &json!(30.0)));
        assert!(strict_eq(&json!(null), &json!(null)));
        assert!(strict_eq(&json!([1, "a"]), &json!([1, "a"])));
    }

    #[test]
    fn test_compare() {
        assert_eq!(compare(">", &json!(30), &json!("18")).unwrap(), Ordering::Greater);
        assert_eq!(compare("<", &json!("9"), &json!("10")).unwrap(), Ordering::Less);
        assert_eq!(
            compare("<", &json!("1990-01-01"), &json!("2000-06-15")).unwrap(),
            Ordering::Less
        );
        assert!(matches!(
            compare("<", &json!("John"), &json!(18)),
            Err(ExpressionError::TypeMismatch { .. })
        ));
        assert!(compare("<", &json!(null), &json!(1)).is_err());
    }

    #[test]
    fn test_to_string_lossy() {
        assert_eq!(to_string_lossy(&json!(30)).unwrap(), "30");
        assert_eq!(to_string_lossy(&json!(2.0)).unwrap(), "2");
        assert_eq!(to_string_lossy(&json!(2.5)).unwrap(), "2.5");
        assert_eq!(to_string_lossy(&json!(true)).unwrap(), "1");
        assert_eq!(to_string_lossy(&json!(null)).unwrap(), "");
        assert!(to_string_lossy(&json!([1])).is_none());
    }
}
