//! Classifies raw fragments into typed tokens.

use std::fmt;

use crate::error::LexError;
use crate::simple_json;
use crate::tokenizer::{self, FragmentKind};
use crate::types::is_numeric;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Delimiter,
    BinaryAdd,
    Name,
    ArgumentShort,
    ArgumentLong,
    String,
    Number,
    Assignment,
    DataAttribute,
    SubEval,
    Array,
    Dictionary,
    DictionarySimple,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    /// Post-processed text: prefixes, brackets and quotes removed.
    pub value: String,
    /// Original slice including trailing blanks.
    pub raw: String,
    pub start: usize,
    pub end: usize,
    pub index: usize,
}

impl Token {
    pub fn is_value(&self) -> bool {
        matches!(
            self.kind,
            TokenKind::Name
                | TokenKind::String
                | TokenKind::Number
                | TokenKind::DataAttribute
                | TokenKind::SubEval
                | TokenKind::Array
                | TokenKind::Dictionary
                | TokenKind::DictionarySimple
        )
    }
}

/// What the lexer needs to know about the session to tell a bare word that
/// names something apart from a free string.
pub trait Vocabulary {
    fn is_variable(&self, name: &str) -> bool;
    /// Canonical command name for `name`, following declared aliases.
    fn canonical_command(&self, name: &str) -> Option<String>;
}

pub fn lex(input: &str, vocabulary: &dyn Vocabulary) -> Result<Vec<Token>, LexError> {
    let mut tokens: Vec<Token> = Vec::new();
    let mut local_names: Vec<String> = Vec::new();

    for (index, fragment) in tokenizer::fragments(input).enumerate() {
        let fragment = fragment?;
        let text = fragment.text;
        let prev = tokens.last();

        let (mut kind, value) = if fragment.kind == FragmentKind::Delimiter {
            (TokenKind::Delimiter, text.to_string())
        } else if let Some(long) = text.strip_prefix("--") {
            (TokenKind::ArgumentLong, long.to_string())
        } else if let Some(short) = text.strip_prefix('-') {
            (TokenKind::ArgumentShort, short.to_string())
        } else if text == "+" {
            (TokenKind::BinaryAdd, text.to_string())
        } else if text == "=" {
            if let Some(prev) = prev {
                local_names.push(prev.value.clone());
            }
            (TokenKind::Assignment, text.to_string())
        } else if text.starts_with('[') && text.ends_with(']') {
            // Only something that yields a value can be indexed, so `-m[0]`
            // keeps its brackets as an array literal.
            let attached = prev
                .map(|p| p.is_value() && !p.raw.ends_with([' ', '\t', '\r', '\x0c']))
                .unwrap_or(false);
            if attached {
                (TokenKind::DataAttribute, text[1..text.len() - 1].trim().to_string())
            } else {
                (TokenKind::Array, text.to_string())
            }
        } else if text.starts_with('{') && text.ends_with('}') {
            (TokenKind::Dictionary, text.to_string())
        } else if let Some(inner) = sub_eval_body(text) {
            (TokenKind::SubEval, inner.trim().to_string())
        } else if let Some(name) = text.strip_prefix('$') {
            (TokenKind::Name, name.to_string())
        } else if fragment.kind == FragmentKind::Quoted {
            (TokenKind::String, unquote(text))
        } else if is_numeric(text) {
            (TokenKind::Number, text.to_string())
        } else if prev.map_or(true, |p| p.kind == TokenKind::Delimiter)
            || vocabulary.is_variable(text)
            || local_names.iter().any(|n| n == text)
            || vocabulary.canonical_command(text).is_some()
        {
            (TokenKind::Name, text.to_string())
        } else {
            (TokenKind::String, text.to_string())
        };

        if kind == TokenKind::String && simple_json::looks_like_pairs(&value) {
            kind = TokenKind::DictionarySimple;
        }

        tokens.push(Token {
            kind,
            value,
            raw: fragment.raw.to_string(),
            start: fragment.start,
            end: fragment.end,
            index,
        });
    }
    Ok(tokens)
}

fn sub_eval_body(text: &str) -> Option<&str> {
    text.strip_prefix("${")
        .and_then(|t| t.strip_suffix('}'))
        .or_else(|| text.strip_prefix("$(").and_then(|t| t.strip_suffix(')')))
}

/// Removes the surrounding quotes and unescapes the delimiting quote.
fn unquote(text: &str) -> String {
    let quote = text.chars().next().unwrap_or('"');
    let trimmed = simple_json::trim_quotes(text);
    trimmed.replace(&format!("\\{}", quote), &quote.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Known;

    impl Vocabulary for Known {
        fn is_variable(&self, name: &str) -> bool {
            name == "counter"
        }
        fn canonical_command(&self, name: &str) -> Option<String> {
            match name {
                "print" | "help" => Some(name.to_string()),
                "echo" => Some("print".to_string()),
                _ => None,
            }
        }
    }

    fn kinds(input: &str) -> Vec<(TokenKind, String)> {
        lex(input, &Known)
            .unwrap()
            .into_iter()
            .map(|t| (t.kind, t.value))
            .collect()
    }

    #[test]
    fn classifies_a_flagged_command() {
        assert_eq!(
            kinds("print -m 'This is a test!' --count 3"),
            vec![
                (TokenKind::Name, "print".into()),
                (TokenKind::ArgumentShort, "m".into()),
                (TokenKind::String, "This is a test!".into()),
                (TokenKind::ArgumentLong, "count".into()),
                (TokenKind::Number, "3".into()),
            ]
        );
    }

    #[test]
    fn bare_words_become_names_only_when_known() {
        assert_eq!(
            kinds("print counter echo other"),
            vec![
                (TokenKind::Name, "print".into()),
                (TokenKind::Name, "counter".into()),
                (TokenKind::Name, "echo".into()),
                (TokenKind::String, "other".into()),
            ]
        );
    }

    #[test]
    fn every_statement_starts_with_a_name() {
        let tokens = kinds("print a; other b\nmore");
        assert_eq!(tokens[3], (TokenKind::Name, "other".into()));
        assert_eq!(tokens[4], (TokenKind::String, "b".into()));
        assert_eq!(tokens[6], (TokenKind::Name, "more".into()));
    }

    #[test]
    fn assignment_targets_become_local_names() {
        let tokens = kinds("tmp = 4; print tmp");
        assert_eq!(tokens[1].0, TokenKind::Assignment);
        assert_eq!(tokens[5], (TokenKind::Name, "tmp".into()));
    }

    #[test]
    fn brackets_attached_to_a_value_are_attribute_access() {
        assert_eq!(
            kinds("print $rec[0] [1,2]"),
            vec![
                (TokenKind::Name, "print".into()),
                (TokenKind::Name, "rec".into()),
                (TokenKind::DataAttribute, "0".into()),
                (TokenKind::Array, "[1,2]".into()),
            ]
        );
        assert_eq!(kinds("$x=[1]")[2].0, TokenKind::Array);
        assert_eq!(
            kinds("print -m[0]")[2],
            (TokenKind::Array, "[0]".into())
        );
    }

    #[test]
    fn sub_evaluations_and_dictionaries() {
        assert_eq!(
            kinds("print ${help} $(help -c print) {\"a\": 1}"),
            vec![
                (TokenKind::Name, "print".into()),
                (TokenKind::SubEval, "help".into()),
                (TokenKind::SubEval, "help -c print".into()),
                (TokenKind::Dictionary, "{\"a\": 1}".into()),
            ]
        );
    }

    #[test]
    fn pairs_are_tagged_as_simple_dictionaries() {
        let tokens = kinds("print \"name=Test street='The Street'\"");
        assert_eq!(
            tokens[1],
            (
                TokenKind::DictionarySimple,
                "name=Test street='The Street'".into()
            )
        );
    }

    #[test]
    fn quotes_unescape_only_their_own_delimiter() {
        let tokens = kinds(r#"print "say \"hi\" and \'bye\'""#);
        assert_eq!(tokens[1].1, r#"say "hi" and \'bye\'"#);
    }

    #[test]
    fn offsets_cover_the_raw_slice() {
        let tokens = lex("print  -m x;help", &Known).unwrap();
        assert_eq!((tokens[0].start, tokens[0].end), (0, 7));
        assert_eq!((tokens[1].start, tokens[1].end), (7, 10));
        assert_eq!(tokens[3].kind, TokenKind::Delimiter);
        assert_eq!(tokens[4].index, 4);
    }
}
