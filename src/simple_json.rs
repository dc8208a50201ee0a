//! The forgiving "simple JSON" literal dialect.
//!
//! Accepts plain JSON (single quotes allowed), or space separated
//! `key=value` pairs whose values may be quoted and may themselves be
//! nested pair lists:
//!
//! ```text
//! name=Test street='The Street' extra='zip=1234 city=\'Old Town\''
//! ```

use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

use crate::args::try_all_formats;
use crate::types::{Kwargs, Value};

#[derive(Debug, Error)]
pub enum SimpleJsonError {
    #[error("JSON Error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("No key=value pairs found in '{0}'")]
    NoPairs(String),
}

const PAIR_PATTERN: &str = concat!(
    r#"([^=\s]*)\s?=\s?(?:"#,
    r#""(?:\\.|[^"\\])*"|'(?:\\.|[^'\\])*'|`(?:\\.|[^`\\])*`"#,
    r#"|\\"(?:[^\\]|\\[^"])*\\"|\\'(?:[^\\]|\\[^'])*\\'|\\`(?:[^\\]|\\[^`])*\\`"#,
    r#")|([^=\s]*)\s?=\s?[^\s]+"#,
);

fn pair_regex() -> Option<&'static Regex> {
    static PAIRS: OnceLock<Option<Regex>> = OnceLock::new();
    PAIRS.get_or_init(|| Regex::new(PAIR_PATTERN).ok()).as_ref()
}

/// True when the text contains at least one `key=value` pair.
pub fn looks_like_pairs(text: &str) -> bool {
    pair_regex().is_some_and(|re| re.is_match(text))
}

pub fn parse_simple_json(text: &str) -> Result<Value, SimpleJsonError> {
    let err = match serde_json::from_str::<Value>(&sanitize(text)) {
        Ok(value) => return Ok(value),
        Err(err) => err,
    };
    let pairs: Vec<&str> = pair_regex()
        .map(|re| re.find_iter(text).map(|m| m.as_str()).collect())
        .unwrap_or_default();
    if text.starts_with(['[', '{']) {
        return Err(err.into());
    }
    if pairs.is_empty() {
        return Err(SimpleJsonError::NoPairs(text.to_string()));
    }

    let mut object = Kwargs::new();
    for pair in pairs {
        let (key, raw_value) = pair.trim().split_once('=').unwrap_or((pair, ""));
        let value = unescape_quotes(&trim_quotes(raw_value));
        let parsed = try_all_formats(&Value::String(value.clone()), false)
            .unwrap_or(Value::String(value));
        object.insert(key.trim().to_string(), parsed);
    }
    Ok(Value::Object(object))
}

/// Turns every unescaped `'` into `"` so single-quoted JSON parses.
pub fn sanitize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut prev = '\0';
    for c in text.chars() {
        if c == '\'' && prev != '\\' {
            out.push('"');
        } else {
            out.push(c);
        }
        prev = c;
    }
    out
}

/// Strips one pair of matching surrounding quotes and the blanks around the content.
pub fn trim_quotes(text: &str) -> String {
    let trimmed = text.trim();
    let mut chars = trimmed.chars();
    match (chars.next(), chars.next_back()) {
        (Some(first), Some(last)) if first == last && matches!(first, '"' | '\'' | '`') => {
            trimmed[1..trimmed.len() - 1].trim().to_string()
        }
        _ => trimmed.to_string(),
    }
}

pub fn unescape_quotes(text: &str) -> String {
    text.replace("\\'", "'")
        .replace("\\\"", "\"")
        .replace("\\`", "`")
}
