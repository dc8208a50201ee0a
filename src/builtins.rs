//! Commands every session starts with.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use crate::args::{ArgKind, ArgSpec};
use crate::command::{Command, CommandContext, CommandError, Signature};
use crate::similarity;
use crate::types::{display_text, Kwargs, Value};

pub fn all() -> Vec<Arc<dyn Command>> {
    vec![
        Arc::new(Print::new()),
        Arc::new(Alias::new()),
        Arc::new(ParseSimpleJson::new()),
        Arc::new(Help::new()),
        Arc::new(Jobs::new()),
        Arc::new(Exit::new()),
    ]
}

fn text_arg(kwargs: &Kwargs, name: &str) -> Option<String> {
    kwargs.get(name).map(display_text).filter(|s| !s.is_empty())
}

/// Prints a value and returns it.
pub struct Print {
    signature: Signature,
}

impl Print {
    pub fn new() -> Self {
        let signature = Signature::new("Print a message").arg(
            ArgSpec::new(ArgKind::Any, "m", "msg")
                .required()
                .describe("The message to print"),
        );
        Print { signature }
    }
}

#[async_trait]
impl Command for Print {
    fn name(&self) -> &str {
        "print"
    }

    fn signature(&self) -> &Signature {
        &self.signature
    }

    async fn invoke(&self, ctx: &mut CommandContext<'_>, kwargs: Kwargs) -> Result<Value, CommandError> {
        let msg = kwargs.get("msg").cloned().unwrap_or(Value::Null);
        ctx.print(&display_text(&msg));
        Ok(msg)
    }
}

/// Lists, defines or removes aliases.
///
/// - `alias` lists them
/// - `alias -n name -c 'print $1'` defines one
/// - `alias -n name` removes it
pub struct Alias {
    signature: Signature,
}

impl Alias {
    pub fn new() -> Self {
        let signature = Signature::new("Create, remove or list aliases")
            .arg(ArgSpec::new(ArgKind::String, "n", "name").describe("The name of the alias"))
            .arg(
                ArgSpec::new(ArgKind::String, "c", "cmd")
                    .describe("The command to run. Use $1, $2[fallback]... for parameters"),
            )
            .without_generators();
        Alias { signature }
    }
}

#[async_trait]
impl Command for Alias {
    fn name(&self) -> &str {
        "alias"
    }

    fn signature(&self) -> &Signature {
        &self.signature
    }

    async fn invoke(&self, ctx: &mut CommandContext<'_>, kwargs: Kwargs) -> Result<Value, CommandError> {
        let name = text_arg(&kwargs, "name");
        let cmd = text_arg(&kwargs, "cmd");
        match (name, cmd) {
            (Some(name), Some(cmd)) => {
                if ctx.shell.command(&name).is_some() {
                    return Err(CommandError::new(format!(
                        "'{}' is already a command",
                        name
                    )));
                }
                ctx.shell.set_alias(&name, &cmd);
                ctx.print(&format!("Alias '{}' created", name));
            }
            (Some(name), None) => {
                if ctx.shell.remove_alias(&name).is_none() {
                    return Err(CommandError::new(format!("Alias '{}' not found", name)));
                }
                ctx.print(&format!("Alias '{}' removed", name));
            }
            (None, Some(_)) => {
                return Err(CommandError::new("An alias needs a name"));
            }
            (None, None) => {
                for (name, cmd) in ctx.shell.aliases() {
                    ctx.print(&format!("{} = {}", name, cmd));
                }
            }
        }
        let table: Kwargs = ctx
            .shell
            .aliases()
            .into_iter()
            .map(|(name, cmd)| (name, Value::String(cmd)))
            .collect();
        Ok(Value::Object(table))
    }
}

pub struct ParseSimpleJson {
    signature: Signature,
}

impl ParseSimpleJson {
    pub fn new() -> Self {
        let signature = Signature::new("Parse a simple JSON text").arg(
            ArgSpec::new(ArgKind::Json, "i", "input")
                .required()
                .describe("The text to parse"),
        );
        ParseSimpleJson { signature }
    }
}

#[async_trait]
impl Command for ParseSimpleJson {
    fn name(&self) -> &str {
        "parse_simple_json"
    }

    fn signature(&self) -> &Signature {
        &self.signature
    }

    async fn invoke(&self, ctx: &mut CommandContext<'_>, kwargs: Kwargs) -> Result<Value, CommandError> {
        let value = kwargs.get("input").cloned().unwrap_or(Value::Null);
        ctx.print(&value.to_string());
        Ok(value)
    }
}

pub struct Help {
    signature: Signature,
}

impl Help {
    pub fn new() -> Self {
        let signature = Signature::new("Show the available commands or how to use one")
            .arg(ArgSpec::new(ArgKind::String, "c", "cmd").describe("The command to describe"));
        Help { signature }
    }
}

#[async_trait]
impl Command for Help {
    fn name(&self) -> &str {
        "help"
    }

    fn signature(&self) -> &Signature {
        &self.signature
    }

    async fn invoke(&self, ctx: &mut CommandContext<'_>, kwargs: Kwargs) -> Result<Value, CommandError> {
        let Some(wanted) = text_arg(&kwargs, "cmd") else {
            let mut listing = Kwargs::new();
            for (name, command) in ctx.shell.registry().iter() {
                listing.insert(
                    name.to_string(),
                    Value::String(command.signature().description.clone()),
                );
            }
            for (name, description) in &listing {
                ctx.print(&format!("{} - {}", name, display_text(description)));
            }
            return Ok(Value::Object(listing));
        };

        let Some(command) = ctx.shell.command(&wanted) else {
            let names = ctx.shell.command_names();
            let message = match similarity::find_similar(&wanted, names.iter().map(String::as_str)) {
                Some(similar) => format!("Command '{}' not found. Did you mean '{}'?", wanted, similar),
                None => format!("Command '{}' not found", wanted),
            };
            return Err(CommandError::new(message));
        };

        let signature = command.signature();
        ctx.print(&format!("{} - {}", command.name(), signature.description));
        if !signature.aliases.is_empty() {
            ctx.print(&format!("Aliases: {}", signature.aliases.join(", ")));
        }
        for spec in &signature.args {
            ctx.print(&format!("  {}", spec));
        }
        let args: Vec<Value> = signature
            .args
            .iter()
            .map(|spec| {
                json!({
                    "short": spec.short,
                    "long": spec.long,
                    "type": spec.human_type(),
                    "required": spec.required,
                    "description": spec.description,
                    "default": spec.formatted_default(),
                })
            })
            .collect();
        Ok(json!({
            "name": command.name(),
            "description": signature.description,
            "aliases": signature.aliases,
            "args": args,
        }))
    }
}

/// Lists the command invocations in flight, this one included.
pub struct Jobs {
    signature: Signature,
}

impl Jobs {
    pub fn new() -> Self {
        Jobs {
            signature: Signature::new("List the running commands"),
        }
    }
}

#[async_trait]
impl Command for Jobs {
    fn name(&self) -> &str {
        "jobs"
    }

    fn signature(&self) -> &Signature {
        &self.signature
    }

    async fn invoke(&self, ctx: &mut CommandContext<'_>, _kwargs: Kwargs) -> Result<Value, CommandError> {
        let jobs = ctx.shell.jobs().list();
        for job in &jobs {
            ctx.print(&job.to_string());
        }
        Ok(Value::Array(jobs.iter().map(|job| job.to_value()).collect()))
    }
}

pub struct Exit {
    signature: Signature,
}

impl Exit {
    pub fn new() -> Self {
        Exit {
            signature: Signature::new("Leave the session").alias("quit"),
        }
    }
}

#[async_trait]
impl Command for Exit {
    fn name(&self) -> &str {
        "exit"
    }

    fn signature(&self) -> &Signature {
        &self.signature
    }

    async fn invoke(&self, ctx: &mut CommandContext<'_>, _kwargs: Kwargs) -> Result<Value, CommandError> {
        ctx.shell.request_exit();
        Ok(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use crate::error::EngineError;
    use crate::output::BufferSink;
    use crate::shell::Shell;
    use serde_json::json;
    use std::sync::Arc;

    fn buffered() -> (Shell, BufferSink) {
        let sink = BufferSink::new();
        (Shell::new().with_output(Arc::new(sink.clone())), sink)
    }

    #[tokio::test]
    async fn print_writes_and_returns() {
        let (mut shell, sink) = buffered();
        assert_eq!(shell.execute("print -m 42").await.unwrap(), json!(42));
        assert_eq!(sink.lines(), vec!["42"]);
    }

    #[tokio::test]
    async fn alias_lifecycle() {
        let (mut shell, _) = buffered();
        let table = shell
            .execute("alias -n hi -c 'print hello'")
            .await
            .unwrap();
        assert_eq!(table, json!({"hi": "print hello"}));
        assert_eq!(shell.execute("hi").await.unwrap(), json!("hello"));
        assert_eq!(shell.execute("alias").await.unwrap(), json!({"hi": "print hello"}));
        assert_eq!(shell.execute("alias -n hi").await.unwrap(), json!({}));
        assert!(shell.execute_silent("alias -n hi").await.is_err());
        assert!(shell.execute_silent("alias -n print -c 'help'").await.is_err());
    }

    #[tokio::test]
    async fn help_describes_commands() {
        let (mut shell, sink) = buffered();
        let listing = shell.execute("help").await.unwrap();
        assert_eq!(listing["print"], json!("Print a message"));

        sink.clear();
        let print = shell.execute("help 'print'").await.unwrap();
        assert_eq!(print["args"][0]["type"], json!("ANY"));
        assert_eq!(print["args"][0]["required"], json!(true));
        assert!(sink.lines()[1].contains("-m, --msg <ANY> (required)"));

        let err = shell.execute_silent("help prnit").await.unwrap_err();
        assert!(err.to_string().contains("Did you mean 'print'?"));
    }

    #[tokio::test]
    async fn jobs_lists_itself() {
        let (mut shell, _) = buffered();
        let jobs = shell.execute("jobs").await.unwrap();
        assert_eq!(jobs[0]["command"], json!("jobs"));
        assert_eq!(jobs[0]["healthy"], json!(true));
        assert!(shell.jobs().is_empty());
    }

    #[tokio::test]
    async fn quit_requests_exit() {
        let (mut shell, _) = buffered();
        assert!(!shell.should_exit());
        assert_eq!(shell.execute("quit").await.unwrap(), json!(null));
        assert!(shell.should_exit());
    }

    #[tokio::test]
    async fn parse_simple_json_rejects_bad_input() {
        let (mut shell, _) = buffered();
        let err = shell.execute_silent("parse_simple_json 'no pairs'").await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidArgument { name, .. } if name == "input"));
    }
}
