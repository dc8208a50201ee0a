//! The command capability interface and the registry the interpreter
//! dispatches through.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::args::ArgSpec;
use crate::error::EngineError;
use crate::shell::Shell;
use crate::types::{Kwargs, Value};

/// Failure reported by a command callback.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct CommandError {
    pub message: String,
    /// Structured detail for callers that want more than the message.
    pub payload: Option<Value>,
}

impl CommandError {
    pub fn new(message: impl Into<String>) -> Self {
        CommandError {
            message: message.into(),
            payload: None,
        }
    }

    pub fn with_payload(message: impl Into<String>, payload: Value) -> Self {
        CommandError {
            message: message.into(),
            payload: Some(payload),
        }
    }
}

impl From<EngineError> for CommandError {
    fn from(err: EngineError) -> Self {
        CommandError::new(err.to_string())
    }
}

/// What a command declares about itself.
#[derive(Debug, Clone, PartialEq)]
pub struct Signature {
    pub description: String,
    pub args: Vec<ArgSpec>,
    pub aliases: Vec<String>,
    /// Hosts should ask before running it. The engine only carries the flag.
    pub requires_confirmation: bool,
    /// String values go through the generators before resolution.
    pub supports_generators: bool,
}

impl Signature {
    pub fn new(description: impl Into<String>) -> Self {
        Signature {
            description: description.into(),
            args: Vec::new(),
            aliases: Vec::new(),
            requires_confirmation: false,
            supports_generators: true,
        }
    }

    pub fn arg(mut self, spec: ArgSpec) -> Self {
        self.args.push(spec);
        self
    }

    /// Adds an argument from its compact definition (`s::n:name::0::...`).
    pub fn arg_def(mut self, definition: &str) -> Result<Self, EngineError> {
        self.args.push(definition.parse()?);
        Ok(self)
    }

    pub fn alias(mut self, name: impl Into<String>) -> Self {
        self.aliases.push(name.into());
        self
    }

    pub fn confirm(mut self) -> Self {
        self.requires_confirmation = true;
        self
    }

    pub fn without_generators(mut self) -> Self {
        self.supports_generators = false;
        self
    }
}

/// Per-invocation view handed to a command callback.
pub struct CommandContext<'a> {
    pub shell: &'a mut Shell,
    /// Canonical name the command was invoked under.
    pub name: String,
    /// The whole input the invocation came from.
    pub raw: String,
    pub job: usize,
    pub silent: bool,
}

impl CommandContext<'_> {
    /// Writes to the output surface unless the evaluation is silent.
    pub fn print(&self, text: &str) {
        if !self.silent {
            self.shell.output.print(text);
        }
    }

    /// Runs `input` as a nested silent evaluation in the same session.
    pub async fn eval(&mut self, input: &str) -> Result<Vec<Value>, EngineError> {
        self.shell
            .eval(input, crate::interpreter::EvalOptions::silent())
            .await
    }
}

#[async_trait]
pub trait Command: Send + Sync {
    fn name(&self) -> &str;

    fn signature(&self) -> &Signature;

    async fn invoke(&self, ctx: &mut CommandContext<'_>, kwargs: Kwargs) -> Result<Value, CommandError>;
}

/// Registered commands, ordered by name.
#[derive(Clone, Default)]
pub struct CommandRegistry {
    commands: BTreeMap<String, Arc<dyn Command>>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a command, failing if its name or one of its aliases is taken.
    pub fn register(&mut self, command: Arc<dyn Command>) -> Result<(), EngineError> {
        let name = command.name().to_string();
        if let Some(taken) = std::iter::once(&name)
            .chain(command.signature().aliases.iter())
            .find(|n| self.canonical(n).is_some())
        {
            return Err(EngineError::DuplicateCommand(taken.clone()));
        }
        self.commands.insert(name, command);
        Ok(())
    }

    pub fn remove(&mut self, name: &str) -> Option<Arc<dyn Command>> {
        self.commands.remove(name)
    }

    /// Resolves `name` directly or through a declared alias.
    pub fn canonical(&self, name: &str) -> Option<String> {
        if self.commands.contains_key(name) {
            return Some(name.to_string());
        }
        self.commands
            .iter()
            .find(|(_, cmd)| cmd.signature().aliases.iter().any(|a| a == name))
            .map(|(canonical, _)| canonical.clone())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Command>> {
        let canonical = self.canonical(name)?;
        self.commands.get(&canonical).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.canonical(name).is_some()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.commands.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<dyn Command>)> {
        self.commands.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}
