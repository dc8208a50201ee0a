//! Declared argument specifications and the resolver that validates and
//! coerces the keyword arguments a command receives.

use std::fmt;
use std::str::FromStr;

use crate::error::EngineError;
use crate::simple_json::parse_simple_json;
use crate::types::{
    display_text, is_integer_text, is_numeric, number_value, numeric_truthiness, scalar_text, Kwargs, Value,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgKind {
    String,
    Integer,
    Json,
    Flag,
    Alphanumeric,
    Any,
}

impl ArgKind {
    fn from_code(code: char) -> Option<Self> {
        Some(match code {
            's' => ArgKind::String,
            'i' => ArgKind::Integer,
            'j' => ArgKind::Json,
            'f' => ArgKind::Flag,
            'a' => ArgKind::Alphanumeric,
            '-' => ArgKind::Any,
            _ => return None,
        })
    }

    fn human_name(self) -> &'static str {
        match self {
            ArgKind::String => "STRING",
            ArgKind::Integer => "NUMBER",
            ArgKind::Json => "JSON",
            ArgKind::Flag => "FLAG",
            ArgKind::Alphanumeric => "ALPHANUMERIC",
            ArgKind::Any => "ANY",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArgSpec {
    pub kind: ArgKind,
    pub list: bool,
    pub short: String,
    pub long: String,
    pub required: bool,
    pub description: String,
    /// Raw default text; it goes through validation like any supplied value.
    pub default: Option<String>,
    /// Permitted values, kept for help and completion.
    pub strict: Option<Vec<Value>>,
}

impl ArgSpec {
    pub fn new(kind: ArgKind, short: impl Into<String>, long: impl Into<String>) -> Self {
        ArgSpec {
            kind,
            list: false,
            short: short.into(),
            long: long.into(),
            required: false,
            description: String::new(),
            default: None,
            strict: None,
        }
    }

    pub fn list(mut self) -> Self {
        self.list = true;
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn default_value(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn matches(&self, name: &str) -> bool {
        self.short == name || self.long == name
    }

    /// `STRING`, `LIST OF NUMBERS`, `LIST OF JSON`...
    pub fn human_type(&self) -> String {
        let name = self.kind.human_name();
        match (self.list, self.kind) {
            (false, _) => name.to_string(),
            (true, ArgKind::Json | ArgKind::Any) => format!("LIST OF {}", name),
            (true, _) => format!("LIST OF {}S", name),
        }
    }

    /// The default value after formatting, if it is valid for the declared type.
    pub fn formatted_default(&self) -> Option<Value> {
        let raw = Value::String(self.default.clone()?);
        format_value(self.kind, &raw, self.list)
    }
}

/// Parses the compact form `type::short:long::required::description[::default[::strict]]`,
/// e.g. `li::c:count::0::How many::1`.
impl FromStr for ArgSpec {
    type Err = EngineError;

    fn from_str(def: &str) -> Result<Self, Self::Err> {
        let invalid = || EngineError::Init(format!("Invalid argument definition '{}'", def));
        let mut parts = def.split("::");
        let type_code = parts.next().filter(|t| !t.is_empty()).ok_or_else(invalid)?;
        let names = parts.next().ok_or_else(invalid)?;
        let (short, long) = names.split_once(':').ok_or_else(invalid)?;
        let required = parts.next().map(numeric_truthiness).unwrap_or(false);
        let description = parts.next().unwrap_or_default();
        let default = parts.next().filter(|d| !d.is_empty());
        let strict = parts.next().filter(|s| !s.is_empty());

        let list = type_code.starts_with('l') && type_code.len() > 1;
        let code = type_code.chars().last().ok_or_else(invalid)?;
        let kind = ArgKind::from_code(code).ok_or_else(invalid)?;
        if long.is_empty() {
            return Err(invalid());
        }

        let mut spec = ArgSpec::new(kind, short, long).describe(description);
        spec.list = list;
        spec.required = required;
        spec.default = default.map(str::to_string);
        spec.strict = strict.and_then(|s| {
            match format_value(kind, &Value::String(s.replace(':', ",")), true) {
                Some(Value::Array(items)) => Some(items),
                _ => None,
            }
        });
        Ok(spec)
    }
}

impl fmt::Display for ArgSpec {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if !self.short.is_empty() {
            write!(f, "-{}, ", self.short)?;
        }
        write!(f, "--{} <{}>", self.long, self.human_type())?;
        if self.required {
            write!(f, " (required)")?;
        }
        if !self.description.is_empty() {
            write!(f, " {}", self.description)?;
        }
        if let Some(default) = &self.default {
            write!(f, " [default: {}]", default)?;
        }
        Ok(())
    }
}

/// Normalizes names, applies defaults, enforces required arguments and
/// validates each value against its declared type.
///
/// Output keys are the long names with `-` replaced by `_`.
pub fn resolve(specs: &[ArgSpec], supplied: Kwargs) -> Result<Kwargs, EngineError> {
    let mut by_long = Kwargs::new();
    for (name, value) in supplied {
        let spec = specs
            .iter()
            .find(|s| s.matches(&name))
            .ok_or(EngineError::UnknownArgument(name))?;
        by_long.insert(spec.long.clone(), value);
    }

    for spec in specs {
        if let Some(default) = &spec.default {
            if !by_long.contains_key(&spec.long) {
                by_long.insert(spec.long.clone(), Value::String(default.clone()));
            }
        }
    }

    let missing: Vec<String> = specs
        .iter()
        .filter(|s| s.required && !by_long.contains_key(&s.long))
        .map(|s| s.long.clone())
        .collect();
    if !missing.is_empty() {
        return Err(EngineError::MissingRequiredArguments(missing));
    }

    let mut resolved = Kwargs::new();
    for (long, value) in by_long {
        let Some(spec) = specs.iter().find(|s| s.long == long) else {
            continue;
        };
        let formatted = match spec.kind {
            ArgKind::Any => try_all_formats(&value, spec.list)
                .or_else(|| format_value(ArgKind::String, &value, spec.list)),
            kind => format_value(kind, &value, spec.list),
        };
        let formatted = formatted.ok_or_else(|| EngineError::InvalidArgument {
            name: long.clone(),
            value: display_text(&value),
        })?;
        resolved.insert(long.replace('-', "_"), formatted);
    }
    Ok(resolved)
}

/// Tries the integer, JSON, flag and alphanumeric formats in that order and
/// returns the first one that accepts the value.
pub fn try_all_formats(value: &Value, list: bool) -> Option<Value> {
    [ArgKind::Integer, ArgKind::Json, ArgKind::Flag, ArgKind::Alphanumeric]
        .into_iter()
        .find_map(|kind| format_value(kind, value, list))
}

/// Validates and formats in one step: `None` means the value is not valid
/// for the kind.
pub fn format_value(kind: ArgKind, value: &Value, list: bool) -> Option<Value> {
    if matches!(value, Value::Array(_) | Value::Object(_)) {
        return match kind {
            ArgKind::String | ArgKind::Json | ArgKind::Any => Some(value.clone()),
            _ => None,
        };
    }
    if let (ArgKind::Flag, Value::Bool(_)) = (kind, value) {
        return Some(value.clone());
    }
    let text = scalar_text(value)?;

    if list {
        if kind == ArgKind::Json {
            return None;
        }
        let items = split_and_trim(&text);
        return items
            .iter()
            .map(|item| format_scalar(kind, item))
            .collect::<Option<Vec<_>>>()
            .map(Value::Array);
    }
    format_scalar(kind, &text)
}

fn format_scalar(kind: ArgKind, text: &str) -> Option<Value> {
    match kind {
        ArgKind::String => (!is_integer_text(text)).then(|| Value::String(text.to_string())),
        ArgKind::Integer => is_integer_text(text).then(|| number_value(text)),
        ArgKind::Alphanumeric => Some(Value::String(text.to_string())),
        ArgKind::Json => parse_simple_json(text.trim()).ok(),
        ArgKind::Flag => match text.trim() {
            "true" => Some(Value::Bool(true)),
            "false" => Some(Value::Bool(false)),
            t if is_numeric(t) => Some(Value::Bool(numeric_truthiness(t))),
            _ => None,
        },
        ArgKind::Any => try_all_formats(&Value::String(text.to_string()), false),
    }
}

fn split_and_trim(text: &str) -> Vec<String> {
    text.split(',').map(|item| item.trim().to_string()).collect()
}
