//! Session settings, with defaults and `CMDLANG_*` environment overrides.

use std::env;
use std::time::Duration;

use tracing::warn;

pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_MAX_DEPTH: usize = 32;

#[derive(Debug, Clone, PartialEq)]
pub struct ShellConfig {
    /// Soft timeout after which a running command is flagged unhealthy.
    pub command_timeout: Duration,
    /// Limit for nested evaluations and open command frames.
    pub max_depth: usize,
    /// Evaluated silently once, before the first submission.
    pub init_commands: Option<String>,
}

impl Default for ShellConfig {
    fn default() -> Self {
        ShellConfig {
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            max_depth: DEFAULT_MAX_DEPTH,
            init_commands: None,
        }
    }
}

impl ShellConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a config from any key lookup; malformed values keep the default.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = ShellConfig::default();
        if let Some(raw) = lookup("CMDLANG_COMMAND_TIMEOUT_MS") {
            match raw.trim().parse::<u64>() {
                Ok(ms) => config.command_timeout = Duration::from_millis(ms),
                Err(e) => warn!(value = %raw, error = %e, "invalid CMDLANG_COMMAND_TIMEOUT_MS"),
            }
        }
        if let Some(raw) = lookup("CMDLANG_MAX_DEPTH") {
            match raw.trim().parse::<usize>() {
                Ok(depth) if depth > 0 => config.max_depth = depth,
                _ => warn!(value = %raw, "invalid CMDLANG_MAX_DEPTH"),
            }
        }
        config.init_commands = lookup("CMDLANG_INIT").filter(|cmds| !cmds.trim().is_empty());
        config
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_init(mut self, commands: impl Into<String>) -> Self {
        self.init_commands = Some(commands.into());
        self
    }
}
