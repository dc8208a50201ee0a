//! cmdlang: an embeddable, line-oriented command language.
//!
//! Input goes through four stages:
//!
//! 1. `tokenizer` splits it into raw fragments,
//! 2. `lexer` classifies them into tokens,
//! 3. `parser` compiles the tokens in one pass into a flat instruction stack,
//! 4. `interpreter` walks that stack against a [`Shell`] session, invoking
//!    registered [`Command`]s.
//!
//! ```no_run
//! # async fn demo() -> Result<(), cmdlang::EngineError> {
//! let mut shell = cmdlang::Shell::new();
//! let value = shell.execute("print -m 'This is a test!'").await?;
//! assert_eq!(value, "This is a test!");
//! # Ok(())
//! # }
//! ```

pub mod alias;
pub mod args;
pub mod builtins;
pub mod bytecode;
pub mod command;
pub mod config;
pub mod error;
pub mod generator;
pub mod interpreter;
pub mod jobs;
pub mod lexer;
pub mod output;
pub mod parser;
pub mod shell;
pub mod similarity;
pub mod simple_json;
pub mod tokenizer;
pub mod types;

pub use args::{ArgKind, ArgSpec};
pub use command::{Command, CommandContext, CommandError, CommandRegistry, Signature};
pub use config::ShellConfig;
pub use error::{EngineError, LexError, Span};
pub use interpreter::EvalOptions;
pub use output::{BufferSink, OutputSink, StdoutSink};
pub use parser::ParseResult;
pub use shell::Shell;
pub use types::{Kwargs, Value};
