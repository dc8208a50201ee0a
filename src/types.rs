//! Runtime values shared by the parser, the resolver and the commands.

use serde_json::Number;

/// Every value the engine moves around is plain JSON.
pub type Value = serde_json::Value;

/// Keyword arguments handed to a command, in the order they were bound.
pub type Kwargs = serde_json::Map<String, Value>;

/// Text view of a value, the way it is shown to the user and concatenated.
///
/// Arrays render as their members joined by `,`; objects render as JSON.
pub fn display_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => number_text(n),
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(display_text)
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(_) => value.to_string(),
    }
}

fn number_text(n: &Number) -> String {
    if let Some(f) = n.as_f64().filter(|_| n.is_f64()) {
        if f.fract() == 0.0 && f.abs() < 1e15 {
            return format!("{}", f as i64);
        }
    }
    n.to_string()
}

/// Text of a scalar value. `None` for arrays and objects.
pub fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::Array(_) | Value::Object(_) => None,
        other => Some(display_text(other)),
    }
}

/// Parses a numeric literal (`12`, `-3`, `0.5`, `1e3`).
///
/// Only plain decimal notation is accepted; `inf`, `NaN` and hex are not numbers here.
pub fn parse_number(text: &str) -> Option<Value> {
    let text = text.trim();
    if text.is_empty()
        || !text
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+' | 'e' | 'E'))
        || !text.chars().any(|c| c.is_ascii_digit())
    {
        return None;
    }
    if let Ok(i) = text.parse::<i64>() {
        return Some(Value::from(i));
    }
    let f = text.parse::<f64>().ok().filter(|f| f.is_finite())?;
    Number::from_f64(f).map(Value::Number)
}

pub fn is_numeric(text: &str) -> bool {
    parse_number(text).is_some()
}

/// True when the whole text is a number whose value equals its leading
/// decimal integer prefix: `"12"` and `" 7 "` qualify, `"1.5"`, `"1e3"` and `""` don't.
pub fn is_integer_text(text: &str) -> bool {
    let text = text.trim();
    let Some(value) = parse_number(text).and_then(|v| v.as_f64()) else {
        return false;
    };
    let sign_len = usize::from(text.starts_with(['-', '+']));
    let digits = text[sign_len..]
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .count();
    if digits == 0 {
        return false;
    }
    text[..sign_len + digits]
        .parse::<f64>()
        .map(|prefix| prefix == value)
        .unwrap_or(false)
}

/// Numeric truthiness used by flags: non-zero numbers are `true`, anything
/// that is not a number is `false`.
pub fn numeric_truthiness(text: &str) -> bool {
    parse_number(text)
        .and_then(|v| v.as_f64())
        .map(|f| f != 0.0)
        .unwrap_or(false)
}

/// Integer-valued text becomes an integer number; everything else an `f64`.
pub fn number_value(text: &str) -> Value {
    match parse_number(text) {
        Some(Value::Number(n)) if n.is_f64() => match n.as_f64() {
            Some(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => Value::from(f as i64),
            _ => Value::Number(n),
        },
        Some(v) => v,
        None => Value::Null,
    }
}

/// `+` between two values: numeric addition when both sides are numbers,
/// text concatenation otherwise.
pub fn concat(a: &Value, b: &Value) -> Value {
    if let (Value::Number(x), Value::Number(y)) = (a, b) {
        if let (Some(x), Some(y)) = (x.as_i64(), y.as_i64()) {
            if let Some(sum) = x.checked_add(y) {
                return Value::from(sum);
            }
        }
        if let (Some(x), Some(y)) = (x.as_f64(), y.as_f64()) {
            if let Some(n) = Number::from_f64(x + y) {
                return Value::Number(n);
            }
        }
    }
    Value::String(format!("{}{}", display_text(a), display_text(b)))
}
