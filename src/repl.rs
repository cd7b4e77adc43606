// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Interactive REPL over a bridge.
//!
//! Async host calls whose `function_name` has a built-in handler are served
//! right away. Any other call stays pending until settled by hand with
//! `.resolve` or `.reject`.

use crate::display;
use crate::handlers::{self, Unknown};
use owo_colors::OwoColorize;
use qjsbridge_core::{
    AsyncCallId, AsyncOutcome, AsyncRequest, Bridge, BridgeConfig, CompiledUnit, UnitKind,
};
use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::history::DefaultHistory;
use rustyline::validate::{ValidationContext, ValidationResult, Validator};
use rustyline::{Config, Editor, Helper};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

const HISTORY_FILE: &str = ".qjsbridge_history";
const MAX_HISTORY_SIZE: usize = 1000;
const REPL_FILENAME: &str = "<repl>";

/// Dot-prefixed REPL commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplCommand {
    Help,
    Exit,
    Load,
    Pending,
    Resolve,
    Reject,
    Modules,
}

impl ReplCommand {
    /// Parse a command and its argument text.
    pub fn parse(input: &str) -> Option<(Self, Option<&str>)> {
        let rest = input.trim().strip_prefix('.')?;
        let (name, arg) = match rest.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, Some(arg.trim()).filter(|arg| !arg.is_empty())),
            None => (rest, None),
        };

        let command = match name.to_lowercase().as_str() {
            "help" | "h" | "?" => Self::Help,
            "exit" | "quit" | "q" => Self::Exit,
            "load" | "l" => Self::Load,
            "pending" | "p" => Self::Pending,
            "resolve" => Self::Resolve,
            "reject" => Self::Reject,
            "modules" | "m" => Self::Modules,
            _ => return None,
        };
        Some((command, arg))
    }

    pub fn all_commands() -> &'static [(&'static str, &'static str)] {
        &[
            (".help", "Show this help message"),
            (".exit", "Exit the REPL"),
            (".load <file>", "Run a source file (.mjs as a module) or a bytecode blob"),
            (".pending", "List async host calls waiting to be settled"),
            (".resolve <id> [json]", "Resolve an async host call"),
            (".reject <id> <message>", "Reject an async host call"),
            (".modules", "List loaded modules"),
        ]
    }
}

/// Split `.resolve`/`.reject` arguments into a call id and the remainder.
fn parse_call_args(arg: Option<&str>) -> Result<(AsyncCallId, &str), String> {
    let arg = arg.ok_or("expected a call id")?;
    let (id, rest) = arg.split_once(char::is_whitespace).unwrap_or((arg, ""));
    let id = id.strip_prefix("call-").unwrap_or(id);
    let id: u64 = id.parse().map_err(|_| format!("'{id}' is not a call id"))?;
    Ok((AsyncCallId::from_raw(id), rest.trim()))
}

const WORDS: &[&str] = &[
    "async", "await", "class", "const", "export", "function", "import", "let", "new", "return",
    "typeof", "undefined", "Promise", "JSON", "print", "globalThis",
];

/// Completion, hints and multi-line validation for the editor
struct BridgeHelper {
    words: Vec<String>,
}

impl BridgeHelper {
    fn new(config: &BridgeConfig) -> Self {
        let mut words: Vec<String> = WORDS.iter().map(|word| word.to_string()).collect();
        words.push(config.namespace.clone());
        words.push(format!("{}.{}", config.namespace, config.async_entry));
        words.extend(
            ReplCommand::all_commands()
                .iter()
                .filter_map(|(usage, _)| usage.split_whitespace().next())
                .map(String::from),
        );
        Self { words }
    }

    fn current_word(line: &str) -> (usize, &str) {
        let start = line
            .rfind(|c: char| !c.is_alphanumeric() && c != '_' && c != '.')
            .map(|i| i + 1)
            .unwrap_or(0);
        (start, &line[start..])
    }
}

impl Completer for BridgeHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &rustyline::Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let (_, word) = Self::current_word(&line[..pos]);
        if word.is_empty() {
            return Ok((pos, vec![]));
        }

        let matches = self
            .words
            .iter()
            .filter(|candidate| candidate.starts_with(word))
            .map(|candidate| Pair {
                display: candidate.clone(),
                replacement: candidate[word.len()..].to_string(),
            })
            .collect();
        Ok((pos, matches))
    }
}

impl Hinter for BridgeHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &rustyline::Context<'_>) -> Option<String> {
        if pos < line.len() {
            return None;
        }
        let (_, word) = Self::current_word(line);
        if word.len() < 2 {
            return None;
        }
        self.words
            .iter()
            .find(|candidate| candidate.starts_with(word) && candidate.len() > word.len())
            .map(|candidate| (&candidate[word.len()..]).dimmed().to_string())
    }
}

impl Highlighter for BridgeHelper {
    fn highlight_hint<'h>(&self, hint: &'h str) -> Cow<'h, str> {
        Cow::Borrowed(hint)
    }

    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        if line.trim_start().starts_with('.') {
            return Cow::Owned(line.magenta().to_string());
        }
        Cow::Borrowed(line)
    }
}

impl Validator for BridgeHelper {
    fn validate(&self, ctx: &mut ValidationContext<'_>) -> rustyline::Result<ValidationResult> {
        let input = ctx.input();
        if input.trim_start().starts_with('.') || is_balanced(input) {
            Ok(ValidationResult::Valid(None))
        } else {
            Ok(ValidationResult::Incomplete)
        }
    }
}

impl Helper for BridgeHelper {}

/// Whether every bracket opened outside a string literal is closed
fn is_balanced(input: &str) -> bool {
    let mut open = Vec::new();
    let mut quote = None;
    let mut escaped = false;

    for c in input.chars() {
        if escaped {
            escaped = false;
            continue;
        }
        match (quote, c) {
            (Some(_), '\\') => escaped = true,
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'' | '`') => quote = Some(c),
            (None, '(') => open.push(')'),
            (None, '[') => open.push(']'),
            (None, '{') => open.push('}'),
            // A stray closer is the parser's problem, not the editor's
            (None, ')' | ']' | '}') if open.pop() != Some(c) => return true,
            _ => {}
        }
    }
    open.is_empty() && quote.is_none()
}

/// Result of executing a REPL command
enum CommandResult {
    Continue,
    Exit,
}

/// The interactive REPL
pub struct Repl {
    bridge: Bridge,
    editor: Editor<BridgeHelper, DefaultHistory>,
    history_path: PathBuf,
    /// Requests left for `.resolve` / `.reject`
    held: BTreeMap<AsyncCallId, AsyncRequest>,
}

impl Repl {
    pub fn new(config: BridgeConfig) -> anyhow::Result<Self> {
        let editor_config = Config::builder()
            .history_ignore_dups(true)?
            .history_ignore_space(true)
            .max_history_size(MAX_HISTORY_SIZE)?
            .auto_add_history(true)
            .build();

        let mut editor = Editor::with_config(editor_config)?;
        editor.set_helper(Some(BridgeHelper::new(&config)));

        let history_path = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("qjsbridge")
            .join(HISTORY_FILE);
        if let Some(parent) = history_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let _ = editor.load_history(&history_path);

        Ok(Self {
            bridge: Bridge::new(config)?,
            editor,
            history_path,
            held: BTreeMap::new(),
        })
    }

    pub fn run(&mut self) -> anyhow::Result<()> {
        self.print_banner();

        loop {
            let prompt = format!("{} ", "qjs>".bright_green().bold());
            match self.editor.readline(&prompt) {
                Ok(line) => {
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    if trimmed.starts_with('.') {
                        match ReplCommand::parse(trimmed) {
                            Some((command, arg)) => match self.execute_command(command, arg) {
                                CommandResult::Continue => continue,
                                CommandResult::Exit => break,
                            },
                            None => {
                                eprintln!(
                                    "{}: unknown command {} (try {})",
                                    "Error".red().bold(),
                                    trimmed.cyan(),
                                    ".help".cyan()
                                );
                                continue;
                            }
                        }
                    }
                    self.eval_and_print(trimmed);
                }
                Err(ReadlineError::Interrupted) => {
                    println!("{}", "^C".dimmed());
                }
                Err(ReadlineError::Eof) => {
                    println!("{}", "^D".dimmed());
                    break;
                }
                Err(err) => {
                    eprintln!("{}: {err:?}", "Error".red().bold());
                    break;
                }
            }
        }

        let _ = self.editor.save_history(&self.history_path);
        if !self.held.is_empty() {
            println!(
                "{} {} async call(s) left pending",
                "note:".yellow(),
                self.held.len()
            );
        }
        Ok(())
    }

    fn print_banner(&self) {
        println!();
        println!(
            "  {} {}",
            "qjsbridge".bright_cyan().bold(),
            qjsbridge_core::VERSION.bright_yellow()
        );
        println!("  {}", qjsbridge_core::codec::ENGINE_TAG.dimmed());
        println!(
            "  {} {} {}",
            "Type".dimmed(),
            ".help".cyan(),
            "for available commands".dimmed()
        );
        println!();
    }

    fn execute_command(&mut self, command: ReplCommand, arg: Option<&str>) -> CommandResult {
        match command {
            ReplCommand::Help => self.print_help(),
            ReplCommand::Exit => return CommandResult::Exit,
            ReplCommand::Load => match arg {
                Some(path) => self.load_file(Path::new(path)),
                None => usage(".load <file>"),
            },
            ReplCommand::Pending => self.print_pending(),
            ReplCommand::Resolve => match parse_call_args(arg) {
                Ok((call_id, json)) => {
                    let value = if json.is_empty() {
                        Ok(serde_json::Value::Null)
                    } else {
                        serde_json::from_str(json)
                    };
                    match value {
                        Ok(value) => self.complete(call_id, AsyncOutcome::ResolveJson(value)),
                        Err(err) => eprintln!("{}: invalid JSON: {err}", "Error".red().bold()),
                    }
                }
                Err(message) => {
                    eprintln!("{}: {message}", "Error".red().bold());
                    usage(".resolve <id> [json]");
                }
            },
            ReplCommand::Reject => match parse_call_args(arg) {
                Ok((call_id, message)) => {
                    let message = if message.is_empty() { "rejected" } else { message };
                    self.complete(call_id, AsyncOutcome::Reject(message.to_string()));
                }
                Err(message) => {
                    eprintln!("{}: {message}", "Error".red().bold());
                    usage(".reject <id> <message>");
                }
            },
            ReplCommand::Modules => {
                let modules = self.bridge.loaded_modules();
                if modules.is_empty() {
                    println!("{}", "no modules loaded".dimmed());
                }
                for module in modules {
                    println!("  {}", module.cyan());
                }
            }
        }
        CommandResult::Continue
    }

    fn print_help(&self) {
        println!();
        println!("{}", "REPL Commands:".white().bold());
        println!();
        for (command, description) in ReplCommand::all_commands() {
            println!("  {:24} {}", command.cyan(), description.dimmed());
        }
        println!();
        println!("{}", "Async host calls:".white().bold());
        println!();
        println!(
            "  {:24} {}",
            "echo".yellow(),
            "resolves with the payload".dimmed()
        );
        println!(
            "  {:24} {}",
            "sleep".yellow(),
            "waits `duration` ms, then resolves".dimmed()
        );
        println!(
            "  {:24} {}",
            "anything else".yellow(),
            "stays pending for .resolve / .reject".dimmed()
        );
        println!();
    }

    fn print_pending(&self) {
        let pending = self.bridge.pending_async_calls();
        if pending.is_empty() {
            println!("{}", "no pending calls".dimmed());
            return;
        }
        for call_id in pending {
            let payload = self
                .held
                .get(&call_id)
                .map(|request| request.payload.to_string())
                .unwrap_or_default();
            println!("  {} {}", call_id.to_string().yellow(), payload.dimmed());
        }
    }

    fn complete(&mut self, call_id: AsyncCallId, outcome: AsyncOutcome) {
        match self.bridge.complete_async_call(call_id, outcome) {
            Ok(completion) => {
                self.held.remove(&call_id);
                println!("{}", format!("{completion:?}").dimmed());
                self.serve();
            }
            Err(err) => display::print_error(&err),
        }
    }

    /// Serve what the built-in handlers know and hold the rest.
    fn serve(&mut self) {
        match handlers::serve(&mut self.bridge, Unknown::Hold) {
            Ok(held) => {
                for request in held {
                    println!(
                        "{} {} {}",
                        "pending".yellow(),
                        request.call_id,
                        request.function_name().unwrap_or("<no function_name>").dimmed()
                    );
                    self.held.insert(request.call_id, request);
                }
            }
            Err(err) => eprintln!("{}: {err:#}", "Error".red().bold()),
        }
        for failure in self.bridge.take_job_failures() {
            eprintln!("{}: {failure}", "Job failed".yellow().bold());
        }
    }

    fn load_file(&mut self, path: &Path) {
        let result = match path.extension().and_then(|ext| ext.to_str()) {
            Some("qjsb") => self.load_blob(path),
            ext => match std::fs::read_to_string(path) {
                Ok(source) => {
                    let filename = path.display().to_string();
                    self.bridge
                        .eval_source(&filename, &source, ext == Some("mjs"))
                        .map_err(anyhow::Error::from)
                }
                Err(err) => Err(anyhow::anyhow!("failed to read {}: {err}", path.display())),
            },
        };
        self.print_result(result);
    }

    fn load_blob(&mut self, path: &Path) -> anyhow::Result<qjsbridge_core::ValueHandle> {
        let blob = std::fs::read(path)?;
        let header = CompiledUnit::inspect(&blob).map_err(qjsbridge_core::BridgeError::from)?;
        Ok(match header.kind {
            UnitKind::Module => self.bridge.load_bytecode(&blob)?,
            UnitKind::Script => self.bridge.eval_bytecode(&blob)?,
        })
    }

    fn eval_and_print(&mut self, input: &str) {
        let result = self
            .bridge
            .eval_source(REPL_FILENAME, input, false)
            .map_err(anyhow::Error::from);
        self.print_result(result);
    }

    fn print_result(&mut self, result: anyhow::Result<qjsbridge_core::ValueHandle>) {
        self.serve();
        match result {
            Ok(handle) => {
                match display::format_value(&mut self.bridge, handle) {
                    Ok(text) => println!("{text}"),
                    Err(err) => display::print_error(&err),
                }
                let _ = self.bridge.release(handle);
            }
            Err(err) => match err.downcast_ref::<qjsbridge_core::BridgeError>() {
                Some(bridge_err) => display::print_error(bridge_err),
                None => eprintln!("{}: {err:#}", "Error".red().bold()),
            },
        }
    }
}

fn usage(text: &str) {
    eprintln!("{} {}", "usage:".dimmed(), text.cyan());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repl_command_parse() {
        assert_eq!(ReplCommand::parse(".help"), Some((ReplCommand::Help, None)));
        assert_eq!(ReplCommand::parse("  .exit  "), Some((ReplCommand::Exit, None)));
        assert_eq!(
            ReplCommand::parse(".load test.js"),
            Some((ReplCommand::Load, Some("test.js")))
        );
        assert_eq!(
            ReplCommand::parse(".resolve 3 {\"ok\": true}"),
            Some((ReplCommand::Resolve, Some("3 {\"ok\": true}")))
        );
        assert_eq!(ReplCommand::parse(".pending"), Some((ReplCommand::Pending, None)));
        assert!(ReplCommand::parse(".clear").is_none());
        assert!(ReplCommand::parse("not a command").is_none());
    }

    #[test]
    fn test_parse_call_args() {
        let (id, rest) = parse_call_args(Some("7 {\"a\": 1}")).unwrap();
        assert_eq!(id.into_raw(), 7);
        assert_eq!(rest, "{\"a\": 1}");

        let (id, rest) = parse_call_args(Some("call-12")).unwrap();
        assert_eq!(id.into_raw(), 12);
        assert_eq!(rest, "");

        assert!(parse_call_args(None).is_err());
        assert!(parse_call_args(Some("abc")).is_err());
    }

    #[test]
    fn test_is_balanced() {
        assert!(is_balanced("(1 + 2)"));
        assert!(is_balanced("function f() { return [1]; }"));
        assert!(!is_balanced("(1 + 2"));
        assert!(!is_balanced("{ a: 1"));
        assert!(!is_balanced("'unterminated"));
        assert!(is_balanced("'string with (unbalanced'"));
        assert!(is_balanced("\"escaped \\\" quote\""));
    }
}
