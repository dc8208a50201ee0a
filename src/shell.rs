//! The session: registered commands, aliases, persistent names, running
//! jobs and the output surface. Evaluation lives in `interpreter`.

use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard};

use tracing::{debug, info};

use crate::alias::{AliasStore, MemoryAliasStore};
use crate::builtins;
use crate::command::{Command, CommandRegistry};
use crate::config::ShellConfig;
use crate::error::EngineError;
use crate::generator::Generators;
use crate::interpreter::EvalOptions;
use crate::jobs::JobTable;
use crate::lexer::Vocabulary;
use crate::output::{OutputSink, StdoutSink};
use crate::parser::{self, ParseResult};
use crate::types::{Kwargs, Value};

/// Handle to a session.
///
/// Commands, aliases, persistent names, jobs and output are shared by every
/// clone of a handle. Nesting depth and generator counters belong to the
/// handle, so each clone can run its own submission while the others are
/// still in flight.
pub struct Shell {
    pub(crate) config: ShellConfig,
    registry: Arc<RwLock<CommandRegistry>>,
    aliases: Arc<Mutex<Box<dyn AliasStore>>>,
    /// Variables that survive between submissions.
    names: Arc<Mutex<Kwargs>>,
    pub(crate) jobs: JobTable,
    pub(crate) output: Arc<dyn OutputSink>,
    pub(crate) generators: Generators,
    /// Nesting level of the evaluation in progress.
    pub(crate) depth: usize,
    init_done: Arc<AtomicBool>,
    should_exit: Arc<AtomicBool>,
}

impl Clone for Shell {
    fn clone(&self) -> Self {
        Shell {
            config: self.config.clone(),
            registry: Arc::clone(&self.registry),
            aliases: Arc::clone(&self.aliases),
            names: Arc::clone(&self.names),
            jobs: self.jobs.clone(),
            output: Arc::clone(&self.output),
            generators: Generators::new(),
            depth: 0,
            init_done: Arc::clone(&self.init_done),
            should_exit: Arc::clone(&self.should_exit),
        }
    }
}

impl fmt::Debug for Shell {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Shell")
            .field("config", &self.config)
            .field("commands", &self.command_names())
            .field("names", &self.names())
            .field("depth", &self.depth)
            .finish()
    }
}

impl Default for Shell {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Shell {
    pub fn new() -> Self {
        Self::with_config(ShellConfig::default())
    }

    /// A session with the builtin commands, in-memory aliases and stdout output.
    pub fn with_config(config: ShellConfig) -> Self {
        let mut registry = CommandRegistry::new();
        for command in builtins::all() {
            if let Err(e) = registry.register(command) {
                debug!(error = %e, "builtin skipped");
            }
        }
        Shell {
            config,
            registry: Arc::new(RwLock::new(registry)),
            aliases: Arc::new(Mutex::new(Box::new(MemoryAliasStore::new()))),
            names: Arc::new(Mutex::new(Kwargs::new())),
            jobs: JobTable::new(),
            output: Arc::new(StdoutSink),
            generators: Generators::new(),
            depth: 0,
            init_done: Arc::new(AtomicBool::new(false)),
            should_exit: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_output(mut self, output: Arc<dyn OutputSink>) -> Self {
        self.output = output;
        self
    }

    pub fn with_alias_store(mut self, store: Box<dyn AliasStore>) -> Self {
        self.aliases = Arc::new(Mutex::new(store));
        self
    }

    fn commands(&self) -> RwLockReadGuard<'_, CommandRegistry> {
        self.registry.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds a command to the session, visible to every handle.
    pub fn register(&self, command: impl Command + 'static) -> Result<(), EngineError> {
        self.registry
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .register(Arc::new(command))
    }

    /// Snapshot of the registered commands.
    pub fn registry(&self) -> CommandRegistry {
        self.commands().clone()
    }

    /// The command registered as `name` or under one of its aliases.
    pub fn command(&self, name: &str) -> Option<Arc<dyn Command>> {
        self.commands().get(name)
    }

    pub fn command_names(&self) -> Vec<String> {
        self.commands().names().map(str::to_string).collect()
    }

    pub fn config(&self) -> &ShellConfig {
        &self.config
    }

    pub fn alias(&self, name: &str) -> Option<String> {
        lock(&self.aliases).get(name)
    }

    pub fn set_alias(&self, name: &str, template: &str) {
        lock(&self.aliases).set(name, template);
    }

    pub fn remove_alias(&self, name: &str) -> Option<String> {
        lock(&self.aliases).remove(name)
    }

    /// All aliases, sorted by name.
    pub fn aliases(&self) -> Vec<(String, String)> {
        lock(&self.aliases).list()
    }

    pub fn jobs(&self) -> &JobTable {
        &self.jobs
    }

    pub fn output(&self) -> &Arc<dyn OutputSink> {
        &self.output
    }

    /// Snapshot of the persistent names.
    pub fn names(&self) -> Kwargs {
        lock(&self.names).clone()
    }

    pub fn variable(&self, name: &str) -> Option<Value> {
        lock(&self.names).get(name).cloned()
    }

    pub fn set_variable(&self, name: &str, value: Value) {
        lock(&self.names).insert(name.to_string(), value);
    }

    pub(crate) fn merge_names(&self, store: Kwargs) {
        lock(&self.names).extend(store);
    }

    pub fn should_exit(&self) -> bool {
        self.should_exit.load(Ordering::SeqCst)
    }

    pub fn request_exit(&self) {
        self.should_exit.store(true, Ordering::SeqCst);
    }

    /// Tokenizes and compiles `input` against the current session without
    /// running anything.
    pub fn parse(&self, input: &str) -> Result<ParseResult, EngineError> {
        parser::parse(input, self)
    }

    /// Top-level submission: evaluates with fresh generator state and
    /// reports a failure on the output surface once.
    ///
    /// A single statement yields its value; several yield an array.
    pub async fn execute(&mut self, raw: &str) -> Result<Value, EngineError> {
        self.run(raw, false).await
    }

    /// Like [`Shell::execute`], but nothing is written to the output.
    pub async fn execute_silent(&mut self, raw: &str) -> Result<Value, EngineError> {
        self.run(raw, true).await
    }

    async fn run(&mut self, raw: &str, silent: bool) -> Result<Value, EngineError> {
        let options = EvalOptions {
            silent,
            reset_state: true,
        };
        match self.eval(raw, options).await {
            Ok(mut results) if results.len() == 1 => Ok(results.remove(0)),
            Ok(results) => Ok(Value::Array(results)),
            Err(e) => {
                if !silent {
                    self.output.print_error(&e.to_string());
                }
                Err(e)
            }
        }
    }

    /// Evaluates the configured init commands, once per session.
    pub async fn run_init_commands(&mut self) -> Result<(), EngineError> {
        if self.init_done.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let Some(commands) = self.config.init_commands.clone() else {
            return Ok(());
        };
        info!("running init commands");
        self.eval(
            &commands,
            EvalOptions {
                silent: true,
                reset_state: true,
            },
        )
        .await?;
        Ok(())
    }

    pub async fn execute_script_from_path(&mut self, path: &Path) -> Result<Value, EngineError> {
        let content = fs::read_to_string(path)?;
        info!(path = %path.display(), "running script");
        self.execute(&content).await
    }
}

impl Vocabulary for Shell {
    fn is_variable(&self, name: &str) -> bool {
        lock(&self.names).contains_key(name)
    }

    fn canonical_command(&self, name: &str) -> Option<String> {
        self.commands().canonical(name)
    }
}
