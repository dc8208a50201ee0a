//! Splits raw input into fragments with one composite `logos` pattern.

use logos::{Lexer, Logos};
use tracing::debug;

use crate::error::{LexError, Span};

#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
#[logos(skip r"[ \t\r\f]+")]
pub enum FragmentKind {
    #[regex(r"//[^\n]*", logos::skip)]
    Comment,

    #[regex(r#""([^"\\]|\\.)*""#)]
    #[regex(r"'([^'\\]|\\.)*'")]
    #[regex(r"`([^`\\]|\\.)*`")]
    Quoted,

    #[token(";")]
    #[token("\n")]
    Delimiter,

    #[token("+")]
    Plus,

    #[token("=")]
    Equals,

    #[regex(r"\$[a-zA-Z0-9_]+")]
    Variable,

    #[token("$(", |lex| close_group(lex, b'(', b')'))]
    #[token("${", |lex| close_group(lex, b'{', b'}'))]
    SubEval,

    #[token("[", |lex| close_group(lex, b'[', b']'))]
    Array,

    #[token("{", |lex| close_group(lex, b'{', b'}'))]
    Dictionary,

    #[regex(r"[a-zA-Z0-9_.\-]+")]
    Word,
}

/// Extends the current match up to the bracket that balances the opening one.
/// Quoted sections are skipped so brackets inside strings don't count.
fn close_group(lex: &mut Lexer<FragmentKind>, open: u8, close: u8) -> bool {
    let rest = lex.remainder().as_bytes();
    let mut depth = 1usize;
    let mut quote: Option<u8> = None;
    let mut i = 0;
    while i < rest.len() {
        let c = rest[i];
        match quote {
            Some(_) if c == b'\\' => i += 1,
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if matches!(c, b'"' | b'\'' | b'`') => quote = Some(c),
            None if c == open => depth += 1,
            None if c == close => {
                depth -= 1;
                if depth == 0 {
                    lex.bump(i + 1);
                    return true;
                }
            }
            None => {}
        }
        i += 1;
    }
    false
}

/// One lexical fragment. `raw` keeps trailing blanks, `text` doesn't.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFragment<'a> {
    pub kind: FragmentKind,
    pub text: &'a str,
    pub raw: &'a str,
    pub start: usize,
    pub end: usize,
}

/// Lazy fragment iterator over one input. Holds no state beyond the input
/// itself, so tokenizing the same text twice yields the same fragments.
pub struct Fragments<'a> {
    lexer: Lexer<'a, FragmentKind>,
    source: &'a str,
}

pub fn fragments(source: &str) -> Fragments<'_> {
    Fragments {
        lexer: FragmentKind::lexer(source),
        source,
    }
}

/// Collects every fragment, failing on the first malformed quote or group.
pub fn tokenize(source: &str) -> Result<Vec<RawFragment<'_>>, LexError> {
    fragments(source).collect()
}

impl<'a> Iterator for Fragments<'a> {
    type Item = Result<RawFragment<'a>, LexError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let kind = self.lexer.next()?;
            let span = self.lexer.span();
            match kind {
                Ok(kind) => {
                    let bytes = self.source.as_bytes();
                    let mut end = span.end;
                    while end < bytes.len() && matches!(bytes[end], b' ' | b'\t' | b'\r' | b'\x0c') {
                        end += 1;
                    }
                    return Some(Ok(RawFragment {
                        kind,
                        text: &self.source[span.clone()],
                        raw: &self.source[span.start..end],
                        start: span.start,
                        end,
                    }));
                }
                Err(()) => {
                    let slice = self.lexer.slice();
                    let at = Span::new(span.start, self.source.len());
                    if slice.starts_with(['"', '\'', '`']) {
                        return Some(Err(LexError::UnterminatedString(at)));
                    }
                    if let Some(open) = ["$(", "${", "[", "{"]
                        .into_iter()
                        .find(|open| slice.starts_with(open))
                    {
                        return Some(Err(LexError::UnbalancedGroup {
                            open: open.to_string(),
                            span: at,
                        }));
                    }
                    debug!(fragment = slice, at = span.start, "skipping unmatched input");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<(FragmentKind, &str)> {
        tokenize(input)
            .unwrap()
            .into_iter()
            .map(|f| (f.kind, f.text))
            .collect()
    }

    #[test]
    fn splits_a_command_line() {
        assert_eq!(
            kinds("print -m 'This is a test!'; $x = 5 + 3"),
            vec![
                (FragmentKind::Word, "print"),
                (FragmentKind::Word, "-m"),
                (FragmentKind::Quoted, "'This is a test!'"),
                (FragmentKind::Delimiter, ";"),
                (FragmentKind::Variable, "$x"),
                (FragmentKind::Equals, "="),
                (FragmentKind::Word, "5"),
                (FragmentKind::Plus, "+"),
                (FragmentKind::Word, "3"),
            ]
        );
    }

    #[test]
    fn groups_are_balanced_and_respect_quotes() {
        assert_eq!(
            kinds("print $(print ')' + $(help)) [1,[2]] {'a': '}'}"),
            vec![
                (FragmentKind::Word, "print"),
                (FragmentKind::SubEval, "$(print ')' + $(help))"),
                (FragmentKind::Array, "[1,[2]]"),
                (FragmentKind::Dictionary, "{'a': '}'}"),
            ]
        );
    }

    #[test]
    fn raw_keeps_trailing_blanks_but_not_newlines() {
        let frags = tokenize("a   b\nc").unwrap();
        assert_eq!(frags[0].raw, "a   ");
        assert_eq!((frags[0].start, frags[0].end), (0, 4));
        assert_eq!(frags[1].raw, "b");
        assert_eq!(frags[2].kind, FragmentKind::Delimiter);
        assert_eq!(frags[3].start, 6);
    }

    #[test]
    fn comments_are_stripped() {
        assert_eq!(
            kinds("print 1 // trailing note\nhelp"),
            vec![
                (FragmentKind::Word, "print"),
                (FragmentKind::Word, "1"),
                (FragmentKind::Delimiter, "\n"),
                (FragmentKind::Word, "help"),
            ]
        );
    }

    #[test]
    fn escaped_quotes_stay_inside_strings() {
        assert_eq!(
            kinds(r#""say \"hi\"" x"#),
            vec![
                (FragmentKind::Quoted, r#""say \"hi\"""#),
                (FragmentKind::Word, "x"),
            ]
        );
    }

    #[test]
    fn malformed_input_fails_fast() {
        assert!(matches!(
            tokenize("print 'open"),
            Err(LexError::UnterminatedString(_))
        ));
        assert!(matches!(
            tokenize("print $(help"),
            Err(LexError::UnbalancedGroup { .. })
        ));
    }

    #[test]
    fn stray_characters_are_skipped() {
        assert_eq!(
            kinds("a @ b"),
            vec![(FragmentKind::Word, "a"), (FragmentKind::Word, "b")]
        );
    }
}
