//! User aliases: a name bound to a command template with positional
//! placeholders `$1`, `$2[fallback]`...

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::{Captures, Regex};

/// Key/value storage for alias templates.
pub trait AliasStore: Send + Sync {
    fn get(&self, name: &str) -> Option<String>;
    fn set(&mut self, name: &str, template: &str);
    fn remove(&mut self, name: &str) -> Option<String>;
    /// All aliases, sorted by name.
    fn list(&self) -> Vec<(String, String)>;
}

#[derive(Debug, Clone, Default)]
pub struct MemoryAliasStore {
    aliases: BTreeMap<String, String>,
}

impl MemoryAliasStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AliasStore for MemoryAliasStore {
    fn get(&self, name: &str) -> Option<String> {
        self.aliases.get(name).cloned()
    }

    fn set(&mut self, name: &str, template: &str) {
        self.aliases.insert(name.to_string(), template.to_string());
    }

    fn remove(&mut self, name: &str) -> Option<String> {
        self.aliases.remove(name)
    }

    fn list(&self) -> Vec<(String, String)> {
        self.aliases
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

fn placeholder_regex() -> Option<&'static Regex> {
    static PLACEHOLDER: OnceLock<Option<Regex>> = OnceLock::new();
    PLACEHOLDER
        .get_or_init(|| Regex::new(r"\$(\d+)(?:\[([^\]]+)\])?").ok())
        .as_ref()
}

/// Substitutes `$n` with the n-th parameter (1-based). A missing parameter
/// takes the bracketed fallback, or nothing.
pub fn expand(template: &str, params: &[String]) -> String {
    let Some(re) = placeholder_regex() else {
        return template.to_string();
    };
    re.replace_all(template, |caps: &Captures| {
        let param = caps[1]
            .parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .and_then(|i| params.get(i));
        match (param, caps.get(2)) {
            (Some(value), _) => value.clone(),
            (None, Some(fallback)) => fallback.as_str().to_string(),
            (None, None) => String::new(),
        }
    })
    .into_owned()
}

/// True if `text` still holds a placeholder.
pub fn has_placeholders(text: &str) -> bool {
    placeholder_regex().is_some_and(|re| re.is_match(text))
}
