//! Walks an [`InstructionStack`] against the session.
//!
//! Values flow through a stack of frames: the root frame collects
//! top-level values and assignments, and every `LoadName` that resolves to
//! a command opens a frame that gathers its flags and values until the
//! matching `CallFunction` invokes it.

use std::sync::OnceLock;

use futures::future::{BoxFuture, FutureExt};
use regex::Regex;
use tracing::{debug, trace};

use crate::args;
use crate::bytecode::{InstructionStack, Opcode};
use crate::command::CommandContext;
use crate::error::{EngineError, Span};
use crate::alias;
use crate::lexer::{Token, TokenKind, Vocabulary};
use crate::parser::{self, ParseResult};
use crate::shell::Shell;
use crate::similarity;
use crate::types::{self, display_text, is_numeric, Kwargs, Value};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvalOptions {
    /// No output and no suggestions; errors still propagate.
    pub silent: bool,
    /// Start from fresh generator state.
    pub reset_state: bool,
}

impl EvalOptions {
    pub fn silent() -> Self {
        EvalOptions {
            silent: true,
            reset_state: false,
        }
    }
}

#[derive(Debug, Default)]
struct Frame {
    /// Canonical command name; empty for the root frame.
    command: String,
    /// Token that opened the frame.
    token: Option<usize>,
    store: Kwargs,
    flags: Vec<String>,
    values: Vec<Value>,
}

#[derive(Debug, Default)]
struct Frames {
    root: Frame,
    calls: Vec<Frame>,
}

impl Frames {
    fn active(&mut self) -> &mut Frame {
        match self.calls.last_mut() {
            Some(frame) => frame,
            None => &mut self.root,
        }
    }

    /// Innermost open frame's store first, then the root store.
    fn lookup(&self, name: &str) -> Option<Value> {
        self.calls
            .last()
            .and_then(|frame| frame.store.get(name))
            .or_else(|| self.root.store.get(name))
            .cloned()
    }
}

fn runner_regex() -> Option<&'static Regex> {
    static RUNNER: OnceLock<Option<Regex>> = OnceLock::new();
    RUNNER
        .get_or_init(|| Regex::new(r"^\$\((.+)\)$").ok())
        .as_ref()
}

fn span_of(token: Option<&Token>) -> Span {
    token.map(|t| Span::new(t.start, t.end)).unwrap_or_default()
}

fn unexpected(token: Option<&Token>) -> EngineError {
    EngineError::UnexpectedToken {
        token: token.map(|t| t.value.clone()).unwrap_or_default(),
        span: span_of(token),
    }
}

impl Shell {
    /// Evaluates `input` and returns one value per statement that produced
    /// one, in source order.
    ///
    /// Root-frame assignments are merged into the session names when the
    /// walk completes.
    pub fn eval<'a>(
        &'a mut self,
        input: &'a str,
        options: EvalOptions,
    ) -> BoxFuture<'a, Result<Vec<Value>, EngineError>> {
        async move {
            if self.depth >= self.config.max_depth {
                return Err(EngineError::DepthExceeded(self.config.max_depth));
            }
            self.depth += 1;
            let result = self.evaluate(input, options).await;
            self.depth -= 1;
            result
        }
        .boxed()
    }

    async fn evaluate(&mut self, input: &str, options: EvalOptions) -> Result<Vec<Value>, EngineError> {
        if options.reset_state {
            self.generators.reset();
        }
        let parsed = parser::parse(input, &*self)?;
        if let Some(expanded) = self.expand_aliases(&parsed) {
            debug!(input, expanded = %expanded, "alias expanded");
            let options = EvalOptions {
                reset_state: false,
                ..options
            };
            return self.eval(&expanded, options).await;
        }

        let ParseResult { tokens, stack, .. } = parsed;
        let InstructionStack {
            instructions,
            mut names,
            mut arguments,
            mut values,
        } = stack;
        let mut frames = Frames::default();
        let mut results = Vec::new();

        for (pc, instruction) in instructions.iter().enumerate() {
            let token = instruction.token.and_then(|i| tokens.get(i));
            trace!(%instruction, "step");
            match instruction.opcode {
                Opcode::LoadName => {
                    let name = names.pop_front().ok_or_else(|| unexpected(token))?;
                    if let Some(value) = frames.lookup(&name).or_else(|| self.variable(&name)) {
                        frames.active().values.push(value);
                    } else if let Some(command) = self.canonical_command(&name) {
                        if frames.calls.len() >= self.config.max_depth {
                            return Err(EngineError::DepthExceeded(self.config.max_depth));
                        }
                        frames.calls.push(Frame {
                            command,
                            token: instruction.token,
                            ..Frame::default()
                        });
                    } else {
                        let suggestion = if options.silent {
                            None
                        } else {
                            let names = self.command_names();
                            similarity::find_similar(&name, names.iter().map(String::as_str))
                        };
                        return Err(EngineError::UnknownName {
                            name,
                            suggestion,
                            span: span_of(token),
                        });
                    }
                }
                Opcode::LoadConstant => {
                    let value = values.pop_front().ok_or_else(|| unexpected(token))?;
                    let value = self.resolve_runner(value).await?;
                    frames.active().values.push(value);
                }
                Opcode::LoadSubEval => {
                    let value = values.pop_front().ok_or_else(|| unexpected(token))?;
                    let value = self.sub_eval(&display_text(&value)).await?;
                    frames.active().values.push(value);
                }
                Opcode::LoadArgument => {
                    let name = arguments.pop_front().ok_or_else(|| unexpected(token))?;
                    let Some(frame) = frames.calls.last_mut() else {
                        return Err(EngineError::UnexpectedArgument {
                            name,
                            span: span_of(token),
                        });
                    };
                    let valued = instructions.get(pc + 1).is_some_and(|next| {
                        matches!(
                            next.opcode,
                            Opcode::LoadConstant | Opcode::LoadSubEval | Opcode::LoadName
                        )
                    });
                    if !valued {
                        frame.values.push(Value::Bool(true));
                    }
                    frame.flags.push(name);
                }
                Opcode::Concat => {
                    let operands = pc >= 2
                        && instructions[pc - 2..pc]
                            .iter()
                            .all(|i| i.opcode.produces_value());
                    let frame = frames.active();
                    if !operands || frame.values.len() < 2 {
                        return Err(unexpected(token));
                    }
                    let (Some(right), Some(left)) = (frame.values.pop(), frame.values.pop()) else {
                        return Err(unexpected(token));
                    };
                    frame.values.push(types::concat(&left, &right));
                }
                Opcode::CallFunction => {
                    if frames.calls.is_empty() {
                        debug!(%instruction, "no open command to call");
                    }
                    while let Some(frame) = frames.calls.pop() {
                        let reached = frame.token == instruction.token;
                        let value = self.invoke(frame, input, options.silent).await?;
                        frames.active().values.push(value);
                        if reached {
                            break;
                        }
                    }
                }
                Opcode::ReturnValue => {
                    results.push(frames.root.values.pop().unwrap_or(Value::Null));
                }
                Opcode::StoreName => {
                    let name = names.pop_front().ok_or_else(|| unexpected(token))?;
                    if is_numeric(&name) {
                        return Err(EngineError::InvalidName {
                            name,
                            span: span_of(token),
                        });
                    }
                    let frame = frames.active();
                    let value = frame.values.pop().ok_or_else(|| unexpected(token))?;
                    frame.store.insert(name, value);
                }
                Opcode::LoadDataAttribute => {
                    let frame = frames.active();
                    let key = frame.values.pop().map(|k| display_text(&k)).unwrap_or_default();
                    let value = match frame.values.pop() {
                        None | Some(Value::Null) => return Err(EngineError::PropertyAccess { key }),
                        Some(container) => attribute(&container, &key),
                    };
                    frame.values.push(value);
                }
            }
        }

        debug!(input, results = results.len(), "evaluated");
        self.merge_names(frames.root.store);
        Ok(results)
    }

    /// Rewrites every statement that starts with an alias into its template,
    /// placeholders filled from that statement's values. `None` when no
    /// statement starts with an alias.
    fn expand_aliases(&self, parsed: &ParseResult) -> Option<String> {
        let mut statements = Vec::new();
        let mut expanded = false;
        for statement in parsed.tokens.split(|t| t.kind == TokenKind::Delimiter) {
            let (Some(first), Some(last)) = (statement.first(), statement.last()) else {
                continue;
            };
            match self.alias_template(first) {
                Some(template) => {
                    let params: Vec<String> = statement[1..]
                        .iter()
                        .filter(|t| t.is_value())
                        .map(|t| t.value.clone())
                        .collect();
                    statements.push(alias::expand(&template, &params));
                    expanded = true;
                }
                None => statements.push(parsed.input[first.start..last.end].trim().to_string()),
            }
        }
        expanded.then(|| statements.join("; "))
    }

    /// A bare word that is neither a variable nor a command and has an alias.
    fn alias_template(&self, token: &Token) -> Option<String> {
        if token.kind != TokenKind::Name
            || token.raw.starts_with('$')
            || self.is_variable(&token.value)
            || self.canonical_command(&token.value).is_some()
        {
            return None;
        }
        self.alias(&token.value)
    }

    /// A string constant of the form `$(cmd)` is replaced by the first
    /// result of evaluating `cmd`.
    async fn resolve_runner(&mut self, value: Value) -> Result<Value, EngineError> {
        let inner = match &value {
            Value::String(text) => runner_regex()
                .and_then(|re| re.captures(text))
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str().to_string()),
            _ => None,
        };
        match inner {
            Some(cmd) => self.sub_eval(&cmd).await,
            None => Ok(value),
        }
    }

    async fn sub_eval(&mut self, cmd: &str) -> Result<Value, EngineError> {
        let results = self.eval(cmd, EvalOptions::silent()).await?;
        Ok(results.into_iter().next().unwrap_or(Value::Null))
    }

    /// Binds the frame's values to argument names, resolves them and runs
    /// the command as a job.
    async fn invoke(&mut self, frame: Frame, raw: &str, silent: bool) -> Result<Value, EngineError> {
        let Frame {
            command: name,
            token,
            mut flags,
            values,
            ..
        } = frame;
        let command = self.command(&name).ok_or_else(|| EngineError::UnknownName {
                name: name.clone(),
                suggestion: None,
                span: Span::default(),
            })?;
        let signature = command.signature();
        if flags.len() > values.len() {
            return Err(EngineError::InvalidArguments);
        }
        let values = if signature.supports_generators {
            self.generators.expand_all(values)
        } else {
            values
        };

        let mut bound = Vec::with_capacity(values.len());
        for (index, value) in values.into_iter().enumerate().rev() {
            let arg = match flags.pop() {
                Some(flag) => flag,
                None => match signature.args.get(index) {
                    Some(spec) => spec.long.clone(),
                    None => return Err(EngineError::UnexpectedValue(display_text(&value))),
                },
            };
            bound.push((arg, value));
        }
        let mut supplied = Kwargs::new();
        for (arg, value) in bound.into_iter().rev() {
            if !supplied.contains_key(&arg) {
                supplied.insert(arg, value);
            }
        }
        let kwargs = args::resolve(&signature.args, supplied)?;
        debug!(command = %name, ?token, ?kwargs, "invoking");

        let jobs = self.jobs.clone();
        let job = jobs.start(&name);
        let timeout = self.config.command_timeout;
        let outcome = {
            let mut ctx = CommandContext {
                shell: &mut *self,
                name: name.clone(),
                raw: raw.to_string(),
                job,
                silent,
            };
            let mut call = command.invoke(&mut ctx, kwargs);
            let within = tokio::time::timeout(timeout, &mut call).await;
            match within {
                Ok(outcome) => outcome,
                Err(_) => {
                    jobs.mark_unhealthy(job);
                    call.await
                }
            }
        };
        jobs.finish(job);
        outcome.map_err(|source| EngineError::CommandExecution {
            command: name,
            source,
        })
    }
}

/// `container[key]`. On an array a non-numeric key plucks that member from
/// every element and joins the results with `,`.
fn attribute(container: &Value, key: &str) -> Value {
    match container {
        Value::Array(items) if !is_numeric(key) => {
            let plucked: Vec<String> = items
                .iter()
                .map(|item| item.get(key).map(display_text).unwrap_or_default())
                .collect();
            Value::String(plucked.join(","))
        }
        Value::Array(items) => key
            .parse::<usize>()
            .ok()
            .and_then(|i| items.get(i))
            .cloned()
            .unwrap_or(Value::Null),
        Value::Object(map) => map.get(key).cloned().unwrap_or(Value::Null),
        Value::String(text) => key
            .parse::<usize>()
            .ok()
            .and_then(|i| text.chars().nth(i))
            .map(|c| Value::String(c.to_string()))
            .unwrap_or(Value::Null),
        _ => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::BufferSink;
    use serde_json::json;
    use std::sync::Arc;

    fn shell() -> Shell {
        Shell::new().with_output(Arc::new(BufferSink::new()))
    }

    async fn eval(shell: &mut Shell, input: &str) -> Result<Vec<Value>, EngineError> {
        shell
            .eval(
                input,
                EvalOptions {
                    silent: false,
                    reset_state: true,
                },
            )
            .await
    }

    #[test]
    fn attribute_lookup() {
        let users = json!([{"name": "a"}, {"name": "b"}, {}]);
        assert_eq!(attribute(&users, "name"), json!("a,b,"));
        assert_eq!(attribute(&users, "1"), json!({"name": "b"}));
        assert_eq!(attribute(&users, "9"), Value::Null);
        assert_eq!(attribute(&json!({"k": 1}), "k"), json!(1));
        assert_eq!(attribute(&json!("abc"), "2"), json!("c"));
        assert_eq!(attribute(&json!(5), "x"), Value::Null);
    }

    #[tokio::test]
    async fn bare_values_are_returned() {
        let mut shell = shell();
        let results = eval(&mut shell, "'a'; 1 + 2; 'x' + 1").await.unwrap();
        assert_eq!(results, vec![json!("a"), json!(3), json!("x1")]);
    }

    #[tokio::test]
    async fn assignments_produce_no_result_and_persist() {
        let mut shell = shell();
        assert!(eval(&mut shell, "$x = 5").await.unwrap().is_empty());
        assert_eq!(shell.variable("x"), Some(json!(5)));
        assert_eq!(eval(&mut shell, "$x").await.unwrap(), vec![json!(5)]);
        eval(&mut shell, "$x = 'six'").await.unwrap();
        assert_eq!(eval(&mut shell, "print $x").await.unwrap(), vec![json!("six")]);
    }

    #[tokio::test]
    async fn assignment_is_visible_within_the_same_input() {
        let mut shell = shell();
        let results = eval(&mut shell, "$a = 'hi'; print $a + '!'").await.unwrap();
        assert_eq!(results, vec![json!("hi!")]);
    }

    #[tokio::test]
    async fn nested_commands_feed_their_enclosing_frame() {
        let mut shell = shell();
        let results = eval(&mut shell, "print -m parse_simple_json 'a=1'").await.unwrap();
        assert_eq!(results, vec![json!({"a": 1})]);
    }

    #[tokio::test]
    async fn sub_evaluations_and_runner_strings() {
        let mut shell = shell();
        let results = eval(&mut shell, "print $(print 'inner')").await.unwrap();
        assert_eq!(results, vec![json!("inner")]);
        let results = eval(&mut shell, "print '$(print nested)'").await.unwrap();
        assert_eq!(results, vec![json!("nested")]);
    }

    #[tokio::test]
    async fn data_attributes() {
        let mut shell = shell();
        eval(&mut shell, "$d = [10,20,30]").await.unwrap();
        assert_eq!(eval(&mut shell, "$d[1]").await.unwrap(), vec![json!(20)]);
        eval(&mut shell, r#"$u = [{"name": "a"}, {"name": "b"}]"#).await.unwrap();
        assert_eq!(eval(&mut shell, "$u['name']").await.unwrap(), vec![json!("a,b")]);
        let err = eval(&mut shell, "$d[1][0][0]").await.unwrap_err();
        assert!(matches!(err, EngineError::PropertyAccess { key } if key == "0"));
    }

    #[tokio::test]
    async fn structural_errors() {
        let mut shell = shell();
        assert!(matches!(
            eval(&mut shell, "'a' -m x").await,
            Err(EngineError::UnexpectedArgument { name, .. }) if name == "m"
        ));
        assert!(matches!(
            eval(&mut shell, "$1 = 5").await,
            Err(EngineError::InvalidName { name, .. }) if name == "1"
        ));
        assert!(matches!(
            eval(&mut shell, "print -m a -x b").await,
            Err(EngineError::UnknownArgument(name)) if name == "x"
        ));
        assert!(matches!(
            eval(&mut shell, "print a b").await,
            Err(EngineError::UnexpectedValue(value)) if value == "b"
        ));
        assert!(matches!(
            eval(&mut shell, "'a' +").await,
            Err(EngineError::UnexpectedToken { token, .. }) if token == "+"
        ));
        assert!(matches!(
            eval(&mut shell, "$x =").await,
            Err(EngineError::UnexpectedToken { token, .. }) if token == "x"
        ));
        assert!(shell.variable("x").is_none());
    }

    #[tokio::test]
    async fn more_flags_than_values_is_rejected() {
        let mut shell = shell();
        let frame = Frame {
            command: "print".into(),
            flags: vec!["msg".into(), "extra".into()],
            values: vec![json!(1)],
            ..Frame::default()
        };
        let err = shell.invoke(frame, "print", false).await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidArguments));
        assert!(shell.jobs().is_empty());
    }

    #[tokio::test]
    async fn unknown_names_carry_a_suggestion_unless_silent() {
        let mut shell = shell();
        let err = eval(&mut shell, "prnit hello").await.unwrap_err();
        assert!(matches!(
            &err,
            EngineError::UnknownName { name, suggestion: Some(s), span }
                if name == "prnit" && s == "print" && *span == Span::new(0, 6)
        ));
        let err = shell.eval("prnit hello", EvalOptions::silent()).await.unwrap_err();
        assert!(matches!(err, EngineError::UnknownName { suggestion: None, .. }));
    }

    #[tokio::test]
    async fn nesting_is_bounded() {
        let mut shell = Shell::with_config(crate::config::ShellConfig::default().with_max_depth(2))
            .with_output(Arc::new(BufferSink::new()));
        let err = eval(&mut shell, "print $(print $(print deep))").await.unwrap_err();
        assert!(matches!(err, EngineError::DepthExceeded(2)));
        assert_eq!(shell.depth, 0);
        assert_eq!(eval(&mut shell, "print $(print ok)").await.unwrap(), vec![json!("ok")]);
    }

    #[tokio::test]
    async fn aliases_expand_before_parsing() {
        let mut shell = shell();
        shell.set_alias("greet", "print 'Hello $1[world]'");
        assert_eq!(eval(&mut shell, "greet").await.unwrap(), vec![json!("Hello world")]);
        assert_eq!(
            eval(&mut shell, "greet you; print done").await.unwrap(),
            vec![json!("Hello you"), json!("done")]
        );

        shell.set_alias("test", "print -m 'T $1'");
        assert_eq!(
            eval(&mut shell, "print done; test Foo").await.unwrap(),
            vec![json!("done"), json!("T Foo")]
        );
        assert_eq!(
            eval(&mut shell, "test A\ntest B").await.unwrap(),
            vec![json!("T A"), json!("T B")]
        );
        let err = eval(&mut shell, "print done; nothing here").await.unwrap_err();
        assert!(matches!(err, EngineError::UnknownName { name, .. } if name == "nothing"));
    }
}
