//! Single-pass compiler from tokens to an [`InstructionStack`].
//!
//! There is no syntax tree. Nested command calls are modeled by the order
//! of `LoadName` / `CallFunction` pairs, binary `+` by inserting its right
//! operand in front of an eagerly emitted `Concat`, and assignment by
//! turning the target load into a `StoreName` that runs after the
//! right-hand side.

use tracing::debug;

use crate::bytecode::{Instruction, InstructionStack, Opcode};
use crate::error::{EngineError, Span};
use crate::lexer::{lex, Token, TokenKind, Vocabulary};
use crate::simple_json::{parse_simple_json, trim_quotes};
use crate::types::{display_text, is_numeric, parse_number, Value};

#[derive(Debug, Clone, PartialEq)]
pub struct ParseResult {
    pub input: String,
    pub tokens: Vec<Token>,
    pub stack: InstructionStack,
}

impl ParseResult {
    /// Token under the caret: the one whose `(start, end]` range holds it.
    pub fn token_at(&self, caret: usize) -> Option<&Token> {
        self.tokens
            .iter()
            .find(|t| t.start < caret && caret <= t.end)
            .or_else(|| self.tokens.first().filter(|_| caret == 0))
    }

    /// Token index of the command invocation `token_index` belongs to.
    pub fn command_for(&self, token_index: usize) -> Option<usize> {
        self.stack
            .instructions
            .iter()
            .filter(|i| i.opcode == Opcode::CallFunction)
            .filter_map(|i| i.token)
            .filter(|&command| {
                command <= token_index
                    && self.tokens.get(command..=token_index).is_some_and(|span| {
                        !span.iter().any(|t| t.kind == TokenKind::Delimiter)
                    })
            })
            .max()
    }
}

pub fn parse(input: &str, vocabulary: &dyn Vocabulary) -> Result<ParseResult, EngineError> {
    let tokens = lex(input, vocabulary)?;
    let stack = Compiler::new(vocabulary).compile(&tokens)?;
    debug!(input, instructions = %stack, "parsed");
    Ok(ParseResult {
        input: input.to_string(),
        tokens,
        stack,
    })
}

/// Where the compiler stands with respect to a pending `+`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operator {
    Idle,
    /// `Concat` emitted, right operand not seen yet.
    Awaiting,
    /// Right operand placed before the `Concat`.
    Filled,
}

struct Compiler<'v> {
    vocabulary: &'v dyn Vocabulary,
    stack: InstructionStack,
    operator: Operator,
    command: Option<usize>,
    statement_start: usize,
    stores: Vec<(Instruction, String)>,
}

impl<'v> Compiler<'v> {
    fn new(vocabulary: &'v dyn Vocabulary) -> Self {
        Compiler {
            vocabulary,
            stack: InstructionStack::default(),
            operator: Operator::Idle,
            command: None,
            statement_start: 0,
            stores: Vec::new(),
        }
    }

    fn compile(mut self, tokens: &[Token]) -> Result<InstructionStack, EngineError> {
        for token in tokens {
            match token.kind {
                TokenKind::Name => {
                    let canonical = self.vocabulary.canonical_command(&token.value);
                    if self.command.is_none() && canonical.is_some() {
                        self.command = Some(token.index);
                    }
                    self.stack
                        .names
                        .push_back(canonical.unwrap_or_else(|| token.value.clone()));
                    self.push_operand(Instruction::new(Opcode::LoadName, token.index));
                }
                TokenKind::ArgumentShort | TokenKind::ArgumentLong => {
                    self.stack.arguments.push_back(token.value.clone());
                    self.stack
                        .instructions
                        .push(Instruction::new(Opcode::LoadArgument, token.index));
                }
                TokenKind::BinaryAdd => {
                    self.stack
                        .instructions
                        .push(Instruction::new(Opcode::Concat, token.index));
                    self.operator = Operator::Awaiting;
                }
                TokenKind::Number => {
                    let value = parse_number(&token.value)
                        .unwrap_or_else(|| Value::String(token.value.clone()));
                    self.push_constant(value, token.index);
                }
                TokenKind::String | TokenKind::DictionarySimple => {
                    self.push_constant(Value::String(token.value.clone()), token.index);
                }
                TokenKind::Array | TokenKind::Dictionary => {
                    let value = parse_simple_json(&token.value)
                        .unwrap_or_else(|_| Value::String(token.value.clone()));
                    self.push_constant(value, token.index);
                }
                TokenKind::SubEval => {
                    self.stack.values.push_back(Value::String(token.value.clone()));
                    self.push_operand(Instruction::new(Opcode::LoadSubEval, token.index));
                }
                TokenKind::Delimiter => self.end_statement(),
                TokenKind::Assignment => self.assign(token)?,
                TokenKind::DataAttribute => self.attribute(token),
            }
        }
        self.end_statement();
        Ok(self.stack)
    }

    fn push_constant(&mut self, value: Value, token: usize) {
        self.stack.values.push_back(value);
        self.push_operand(Instruction::new(Opcode::LoadConstant, token));
    }

    /// The first operand after `+` goes in front of the pending `Concat`.
    fn push_operand(&mut self, instruction: Instruction) {
        let instructions = &mut self.stack.instructions;
        match self.operator {
            Operator::Awaiting if !instructions.is_empty() => {
                let at = instructions.len() - 1;
                instructions.insert(at, instruction);
                self.operator = Operator::Filled;
            }
            _ => {
                instructions.push(instruction);
                self.operator = Operator::Idle;
            }
        }
    }

    fn attribute(&mut self, token: &Token) {
        let key = &token.value;
        let load = if key.starts_with(['\'', '"']) || is_numeric(key) {
            self.stack.values.push_back(Value::String(trim_quotes(key)));
            Instruction::new(Opcode::LoadConstant, token.index)
        } else {
            self.stack.names.push_back(key.clone());
            Instruction::new(Opcode::LoadName, token.index)
        };
        let access = Instruction::new(Opcode::LoadDataAttribute, token.index);

        let instructions = &mut self.stack.instructions;
        let pending_concat = instructions
            .last()
            .is_some_and(|last| last.opcode == Opcode::Concat);
        if self.operator == Operator::Filled && pending_concat {
            let at = instructions.len() - 1;
            instructions.insert(at, access);
            instructions.insert(at, load);
        } else {
            instructions.push(load);
            instructions.push(access);
        }
    }

    /// Turns the load just emitted into a store that runs once the
    /// right-hand side has been computed.
    fn assign(&mut self, token: &Token) -> Result<(), EngineError> {
        let unexpected = || EngineError::UnexpectedToken {
            token: token.value.clone(),
            span: Span::new(token.start, token.end),
        };
        let last = match self.stack.instructions.last() {
            Some(last) if self.stack.instructions.len() > self.statement_start => *last,
            _ => return Err(unexpected()),
        };
        let name = match last.opcode {
            Opcode::LoadName => self.stack.names.pop_back(),
            Opcode::LoadConstant => self.stack.values.pop_back().map(|v| display_text(&v)),
            _ => None,
        }
        .ok_or_else(unexpected)?;

        self.stack.instructions.pop();
        if last.token.is_some() && last.token == self.command {
            self.command = None;
        }
        self.stores.push((
            Instruction {
                opcode: Opcode::StoreName,
                token: last.token,
            },
            name,
        ));
        self.operator = Operator::Idle;
        Ok(())
    }

    fn end_statement(&mut self) {
        let produced = self.stack.instructions.len() > self.statement_start;
        if let Some(command) = self.command.take() {
            self.stack
                .instructions
                .push(Instruction::new(Opcode::CallFunction, command));
        }
        let stored = !self.stores.is_empty();
        for (store, name) in self.stores.drain(..).rev() {
            self.stack.names.push_back(name);
            self.stack.instructions.push(store);
        }
        if produced && !stored {
            self.stack
                .instructions
                .push(Instruction::bare(Opcode::ReturnValue));
        }
        self.operator = Operator::Idle;
        self.statement_start = self.stack.instructions.len();
    }
}
