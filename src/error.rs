//! Error taxonomy for the command engine.
//!
//! Every failure the tokenizer, parser, resolver or interpreter can raise is a
//! variant of [`EngineError`]. Failures are recoverable at statement level: a
//! failing statement aborts the rest of the current evaluation, never the host.

use std::fmt;
use std::io;

use thiserror::Error;

use crate::command::CommandError;

/// Half-open character range `[start, end)` in the evaluated input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Span { start, end }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.start, self.end)
    }
}

/// Malformed quoting or bracket nesting found while tokenizing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LexError {
    #[error("Unterminated string starting at {0}")]
    UnterminatedString(Span),
    #[error("Unbalanced '{open}' starting at {span}")]
    UnbalancedGroup { open: String, span: Span },
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Lexing failed: {0}")]
    Lex(#[from] LexError),

    #[error("{}", unknown_name_message(.name, .suggestion.as_deref(), .span))]
    UnknownName {
        name: String,
        suggestion: Option<String>,
        span: Span,
    },

    #[error("The argument '{0}' does not exist")]
    UnknownArgument(String),

    #[error("Required arguments not set! ({})", .0.join(","))]
    MissingRequiredArguments(Vec<String>),

    #[error("Invalid parameter for '{name}' argument: '{value}'")]
    InvalidArgument { name: String, value: String },

    #[error("Invalid arguments!")]
    InvalidArguments,

    #[error("Unexpected '{0}' value!")]
    UnexpectedValue(String),

    #[error("Token '{token}' not expected at {span}")]
    UnexpectedToken { token: String, span: Span },

    #[error("Argument '{name}' not expected at {span}")]
    UnexpectedArgument { name: String, span: Span },

    #[error("Invalid name '{name}' at {span}")]
    InvalidName { name: String, span: Span },

    #[error("Cannot read properties of undefined (reading '{key}')")]
    PropertyAccess { key: String },

    #[error("Error executing '{command}': {source}")]
    CommandExecution {
        command: String,
        #[source]
        source: CommandError,
    },

    #[error("Evaluation nested deeper than {0} levels")]
    DepthExceeded(usize),

    #[error("Command '{0}' is already registered")]
    DuplicateCommand(String),

    #[error("Initialization failed: {0}")]
    Init(String),

    #[error("IO Error: {0}")]
    Io(#[from] io::Error),
}

impl EngineError {
    /// Character range in the input the error refers to, when known.
    pub fn span(&self) -> Option<Span> {
        match self {
            EngineError::UnknownName { span, .. }
            | EngineError::UnexpectedToken { span, .. }
            | EngineError::UnexpectedArgument { span, .. }
            | EngineError::InvalidName { span, .. } => Some(*span),
            EngineError::Lex(LexError::UnterminatedString(span))
            | EngineError::Lex(LexError::UnbalancedGroup { span, .. }) => Some(*span),
            _ => None,
        }
    }
}

fn unknown_name_message(name: &str, suggestion: Option<&str>, span: &Span) -> String {
    match suggestion {
        Some(similar) => format!(
            "Unknown command '{}' at {}. Did you mean '{}'?",
            name, span, similar
        ),
        None => format!("Unknown name '{}' at {}", name, span),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_name_mentions_suggestion_when_present() {
        let err = EngineError::UnknownName {
            name: "hepl".into(),
            suggestion: Some("help".into()),
            span: Span::new(0, 4),
        };
        assert_eq!(
            err.to_string(),
            "Unknown command 'hepl' at 0:4. Did you mean 'help'?"
        );

        let err = EngineError::UnknownName {
            name: "zz".into(),
            suggestion: None,
            span: Span::new(2, 4),
        };
        assert_eq!(err.to_string(), "Unknown name 'zz' at 2:4");
        assert_eq!(err.span(), Some(Span::new(2, 4)));
    }

    #[test]
    fn missing_arguments_are_listed() {
        let err = EngineError::MissingRequiredArguments(vec!["msg".into(), "count".into()]);
        assert_eq!(err.to_string(), "Required arguments not set! (msg,count)");
    }
}
