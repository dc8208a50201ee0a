//! Parameter generators: `$INT[1,10]`, `$NOW`, `$INTITER[5,5]`...
//!
//! Commands that accept generators get every string value scanned for these
//! templates before their arguments are resolved. A value that is exactly
//! one numeric template becomes a number.

use std::collections::HashMap;
use std::sync::OnceLock;

use chrono::Local;
use rand::distributions::Alphanumeric;
use rand::Rng;
use regex::{Captures, Regex};

use crate::types::Value;

const TEMPLATE_PATTERN: &str =
    r"\$(STR|FLOAT|INTSEQ|INTITER|INT|EMAIL|URL|NOWDATE|NOWTIME|NOW)(?:\[([^\]]*)\])?";

/// Longest `$INTSEQ` and longest random text a template may ask for.
/// Templates beyond these are left as written.
const MAX_SEQUENCE: i64 = 10_000;
const MAX_TEXT: i64 = 1_024;

fn template_regex() -> Option<&'static Regex> {
    static TEMPLATES: OnceLock<Option<Regex>> = OnceLock::new();
    TEMPLATES.get_or_init(|| Regex::new(TEMPLATE_PATTERN).ok()).as_ref()
}

/// Counter state for `$INTITER`, keyed by the template text.
#[derive(Debug, Default)]
pub struct Generators {
    counters: HashMap<String, i64>,
}

impl Generators {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.counters.clear();
    }

    pub fn expand_all(&mut self, values: Vec<Value>) -> Vec<Value> {
        values.into_iter().map(|v| self.expand(v)).collect()
    }

    pub fn expand(&mut self, value: Value) -> Value {
        let Value::String(text) = value else {
            return value;
        };
        let Some(re) = template_regex() else {
            return Value::String(text);
        };
        if let Some(caps) = re.captures(&text) {
            if caps.get(0).is_some_and(|m| m.as_str() == text) {
                if let Some(generated) = self.generate(&caps) {
                    return generated;
                }
            }
        }
        let expanded = re.replace_all(&text, |caps: &Captures| match self.generate(caps) {
            Some(value) => crate::types::display_text(&value),
            None => caps[0].to_string(),
        });
        Value::String(expanded.into_owned())
    }

    fn generate(&mut self, caps: &Captures) -> Option<Value> {
        let params = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
        let mut rng = rand::thread_rng();
        let value = match &caps[1] {
            "STR" => {
                let (min, max) = text_bounds(params, 1, 8)?;
                Value::String(random_text(&mut rng, min, max))
            }
            "INT" => {
                let (min, max) = bounds(params, 0, 100)?;
                Value::from(rng.gen_range(min..=max))
            }
            "FLOAT" => {
                let (min, max) = bounds(params, 0, 100)?;
                let f: f64 = rng.gen_range(min as f64..=max as f64);
                Value::from((f * 100.0).round() / 100.0)
            }
            "INTSEQ" => {
                let (min, max) = bounds(params, 0, 10)?;
                max.checked_sub(min).filter(|span| *span < MAX_SEQUENCE)?;
                let seq: Vec<String> = (min..=max).map(|i| i.to_string()).collect();
                Value::String(seq.join(","))
            }
            "INTITER" => {
                let mut parts = numbers(params)?.into_iter();
                let start = parts.next().unwrap_or(1);
                let step = parts.next().unwrap_or(1);
                let key = caps[0].to_string();
                let next = match self.counters.get(&key) {
                    Some(n) => n.checked_add(step)?,
                    None => start,
                };
                self.counters.insert(key, next);
                Value::from(next)
            }
            "EMAIL" => {
                let (min, max) = text_bounds(params, 3, 8)?;
                let user = random_text(&mut rng, min, max).to_lowercase();
                let domain = random_text(&mut rng, min, max).to_lowercase();
                Value::String(format!("{}@{}.{}", user, domain, random_tld(&mut rng)))
            }
            "URL" => {
                let (min, max) = text_bounds(params, 3, 8)?;
                let host = random_text(&mut rng, min, max).to_lowercase();
                Value::String(format!("https://www.{}.{}", host, random_tld(&mut rng)))
            }
            "NOW" => Value::String(Local::now().format("%Y-%m-%d %H:%M:%S").to_string()),
            "NOWDATE" => Value::String(Local::now().format("%Y-%m-%d").to_string()),
            "NOWTIME" => Value::String(Local::now().format("%H:%M:%S").to_string()),
            _ => return None,
        };
        Some(value)
    }
}

fn numbers(params: &str) -> Option<Vec<i64>> {
    if params.trim().is_empty() {
        return Some(Vec::new());
    }
    params.split(',').map(|p| p.trim().parse().ok()).collect()
}

/// `[max]` or `[min,max]`, ordered; `None` when a bound is not a number.
fn bounds(params: &str, default_min: i64, default_max: i64) -> Option<(i64, i64)> {
    let (min, max) = match numbers(params)?.as_slice() {
        [] => (default_min, default_max),
        [max] => (default_min.min(*max), *max),
        [min, max, ..] => (*min, *max),
    };
    Some((min.min(max), min.max(max)))
}

fn text_bounds(params: &str, default_min: i64, default_max: i64) -> Option<(i64, i64)> {
    bounds(params, default_min, default_max).filter(|(_, max)| *max <= MAX_TEXT)
}

fn random_text(rng: &mut impl Rng, min: i64, max: i64) -> String {
    let len = rng.gen_range(min.max(0)..=max.max(0)) as usize;
    rng.sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

fn random_tld(rng: &mut impl Rng) -> &'static str {
    const TLDS: [&str; 5] = ["com", "net", "org", "es", "io"];
    TLDS[rng.gen_range(0..TLDS.len())]
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn integer_templates_stay_in_range() {
        let mut generators = Generators::new();
        for _ in 0..50 {
            let value = generators.expand(json!("$INT[3,5]"));
            let n = value.as_i64().unwrap();
            assert!((3..=5).contains(&n));
        }
    }

    #[test]
    fn iterators_advance_until_reset() {
        let mut generators = Generators::new();
        assert_eq!(generators.expand(json!("$INTITER[10,5]")), json!(10));
        assert_eq!(generators.expand(json!("$INTITER[10,5]")), json!(15));
        assert_eq!(generators.expand(json!("id-$INTITER")), json!("id-1"));
        generators.reset();
        assert_eq!(generators.expand(json!("$INTITER[10,5]")), json!(10));
    }

    #[test]
    fn sequences_and_embedded_templates() {
        let mut generators = Generators::new();
        assert_eq!(generators.expand(json!("$INTSEQ[1,4]")), json!("1,2,3,4"));
        let text = generators.expand(json!("user $STR[6,6]!"));
        let text = text.as_str().unwrap();
        assert!(text.starts_with("user ") && text.ends_with('!'));
        assert_eq!(text.len(), "user !".len() + 6);
    }

    #[test]
    fn emails_and_dates_have_their_shape() {
        let mut generators = Generators::new();
        let email = generators.expand(json!("$EMAIL"));
        assert!(email.as_str().unwrap().contains('@'));
        let date = generators.expand(json!("$NOWDATE"));
        assert_eq!(date.as_str().unwrap().len(), 10);
    }

    #[test]
    fn oversized_or_overflowing_templates_stay_as_written() {
        let mut generators = Generators::new();
        let top = format!("$INTITER[{},1]", i64::MAX);
        assert_eq!(generators.expand(json!(top.clone())), json!(i64::MAX));
        assert_eq!(generators.expand(json!(top.clone())), json!(top.clone()));
        let joined = generators.expand(json!(format!("{} {}", top, top)));
        assert_eq!(joined, json!(format!("{} {}", top, top)));

        let huge = format!("$INTSEQ[{},{}]", i64::MIN, i64::MAX);
        assert_eq!(generators.expand(json!(huge.clone())), json!(huge));
        assert_eq!(generators.expand(json!("$INTSEQ[0,100000]")), json!("$INTSEQ[0,100000]"));
        assert_eq!(generators.expand(json!("$STR[5,99999999]")), json!("$STR[5,99999999]"));
        assert_eq!(generators.expand(json!("$INTSEQ[1,3]")), json!("1,2,3"));
    }

    #[test]
    fn non_templates_pass_through() {
        let mut generators = Generators::new();
        assert_eq!(generators.expand(json!("$1 and $HOME")), json!("$1 and $HOME"));
        assert_eq!(generators.expand(json!("$INT[a,b]")), json!("$INT[a,b]"));
        assert_eq!(generators.expand(json!(42)), json!(42));
    }
}
