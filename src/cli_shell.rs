//! Interactive SQL shell
//!
//! Lines accumulate until the statement is terminated by `;`, then run
//! through the dispatcher. Lines starting with `.` are meta commands and are
//! only recognized when no statement is in progress.

use std::borrow::Cow;
use std::path::PathBuf;

use colored::Colorize;
use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::{Hinter, HistoryHinter};
use rustyline::history::DefaultHistory;
use rustyline::validate::Validator;
use rustyline::{CompletionType, Config, Context, EditMode, Editor};
use symql_vtab::{is_terminated, QueryDispatcher, TableInfo};

use crate::cli_format::{render_result, render_schema, render_tables, OutputFormat};
use crate::error::Result;

const PROMPT: &str = "symql> ";
const CONTINUATION_PROMPT: &str = "   ...> ";
const MAX_HISTORY: usize = 1000;

/// Shell commands starting with a dot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetaCommand {
    Tables,
    Schema(Option<String>),
    Help,
    Quit,
    Unknown(String),
}

impl MetaCommand {
    fn parse(line: &str) -> Self {
        let mut parts = line.split_whitespace();
        let cmd = parts.next().unwrap_or_default().to_ascii_lowercase();
        match cmd.as_str() {
            ".tables" => Self::Tables,
            ".schema" => Self::Schema(parts.next().map(str::to_string)),
            ".help" => Self::Help,
            ".quit" | ".exit" => Self::Quit,
            _ => Self::Unknown(cmd),
        }
    }
}

/// What a line of input amounts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellInput {
    Meta(MetaCommand),
    /// A complete statement, trailing `;` included.
    Statement(String),
    /// More lines are needed.
    Continue,
}

/// Statement accumulation across input lines.
#[derive(Debug, Default)]
pub struct StatementBuffer {
    buffer: String,
}

impl StatementBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.trim().is_empty()
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    pub fn feed(&mut self, line: &str) -> ShellInput {
        if self.is_empty() {
            let trimmed = line.trim();
            if trimmed.starts_with('.') {
                return ShellInput::Meta(MetaCommand::parse(trimmed));
            }
            if trimmed.is_empty() {
                return ShellInput::Continue;
            }
        }
        if !self.buffer.is_empty() {
            self.buffer.push('\n');
        }
        self.buffer.push_str(line);
        if is_terminated(&self.buffer) {
            let statement = std::mem::take(&mut self.buffer);
            ShellInput::Statement(statement.trim().to_string())
        } else {
            ShellInput::Continue
        }
    }
}

struct ShellHelper {
    words: Vec<String>,
    hinter: HistoryHinter,
}

impl ShellHelper {
    fn new(tables: &[TableInfo]) -> Self {
        let mut words: Vec<String> = [".tables", ".schema", ".help", ".quit", ".exit"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        for table in tables {
            words.push(table.name.clone());
            words.extend(table.columns.iter().map(|c| c.name.clone()));
        }
        words.sort();
        words.dedup();
        Self {
            words,
            hinter: HistoryHinter::new(),
        }
    }
}

impl rustyline::Helper for ShellHelper {}

impl Completer for ShellHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> std::result::Result<(usize, Vec<Pair>), ReadlineError> {
        let head = &line[..pos];
        let start = head
            .rfind(|c: char| !(c.is_ascii_alphanumeric() || c == '_' || c == '.'))
            .map(|i| i + 1)
            .unwrap_or(0);
        let prefix = &head[start..];
        if prefix.is_empty() {
            return Ok((pos, Vec::new()));
        }
        let matches = self
            .words
            .iter()
            .filter(|w| w.starts_with(prefix))
            .map(|w| Pair {
                display: w.clone(),
                replacement: w.clone(),
            })
            .collect();
        Ok((start, matches))
    }
}

impl Hinter for ShellHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, ctx: &Context<'_>) -> Option<String> {
        self.hinter.hint(line, pos, ctx)
    }
}

impl Highlighter for ShellHelper {
    fn highlight_hint<'h>(&self, hint: &'h str) -> Cow<'h, str> {
        Cow::Owned(format!("\x1b[90m{}\x1b[0m", hint))
    }
}

impl Validator for ShellHelper {}

fn history_file() -> Option<PathBuf> {
    dirs::data_dir().map(|d| d.join("symql").join("history"))
}

fn readline_error(e: ReadlineError) -> crate::error::SymqlError {
    std::io::Error::other(e.to_string()).into()
}

fn print_help() {
    println!(
        r#"
Enter SQL statements terminated by ';'. Meta commands:

  .tables           List tables with row estimates and indexed columns
  .schema [table]   Show columns of one table, or all tables
  .help             Show this help
  .quit / .exit     Leave the shell

Equality on an indexed column (for example WHERE id = 42 or
WHERE name = 'main') is answered by lookup instead of a full scan.
"#
    );
}

fn run_meta(cmd: MetaCommand, tables: &[TableInfo]) -> bool {
    match cmd {
        MetaCommand::Tables => println!("{}", render_tables(tables)),
        MetaCommand::Schema(None) => {
            for info in tables {
                println!("{}\n", render_schema(info));
            }
        }
        MetaCommand::Schema(Some(name)) => {
            match tables.iter().find(|t| t.name.eq_ignore_ascii_case(&name)) {
                Some(info) => println!("{}", render_schema(info)),
                None => println!("{}", format!("No such table: {}", name).red()),
            }
        }
        MetaCommand::Help => print_help(),
        MetaCommand::Quit => return false,
        MetaCommand::Unknown(cmd) => {
            println!("{}", format!("Unknown command: {} (try .help)", cmd).yellow())
        }
    }
    true
}

/// Run the interactive shell until `.quit` or end of input.
pub fn run_shell(dispatcher: &QueryDispatcher, format: OutputFormat) -> Result<()> {
    let config = Config::builder()
        .history_ignore_space(true)
        .completion_type(CompletionType::List)
        .edit_mode(EditMode::Emacs)
        .max_history_size(MAX_HISTORY)
        .map_err(readline_error)?
        .build();

    let mut rl: Editor<ShellHelper, DefaultHistory> =
        Editor::with_config(config).map_err(readline_error)?;
    rl.set_helper(Some(ShellHelper::new(dispatcher.tables())));

    let history = history_file();
    if let Some(ref path) = history {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let _ = rl.load_history(path);
    }

    println!("{}", "symql interactive shell".bold().cyan());
    println!("{}", "Type .help for commands, .quit to exit".dimmed());
    println!();

    let mut buffer = StatementBuffer::new();
    loop {
        let prompt = if buffer.is_empty() {
            PROMPT
        } else {
            CONTINUATION_PROMPT
        };
        match rl.readline(prompt) {
            Ok(line) => match buffer.feed(&line) {
                ShellInput::Continue => {}
                ShellInput::Meta(cmd) => {
                    let _ = rl.add_history_entry(line.trim());
                    if !run_meta(cmd, dispatcher.tables()) {
                        break;
                    }
                }
                ShellInput::Statement(sql) => {
                    let _ = rl.add_history_entry(sql.as_str());
                    match dispatcher.execute(sql) {
                        Ok(result) if result.success => {
                            println!("{}", render_result(&result, format))
                        }
                        Ok(result) => println!(
                            "{}",
                            format!("Error: {}", render_result(&result, format)).red()
                        ),
                        Err(e) => println!("{}", format!("Error: {}", e).red()),
                    }
                }
            },
            Err(ReadlineError::Interrupted) => {
                if !buffer.is_empty() {
                    buffer.clear();
                }
                println!("^C");
            }
            Err(ReadlineError::Eof) => break,
            Err(err) => {
                if let Some(ref path) = history {
                    let _ = rl.save_history(path);
                }
                return Err(readline_error(err));
            }
        }
    }

    if let Some(ref path) = history {
        let _ = rl.save_history(path);
    }
    println!("{}", "Goodbye!".dimmed());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statement_accumulates_until_semicolon() {
        let mut buffer = StatementBuffer::new();
        assert_eq!(buffer.feed("SELECT name"), ShellInput::Continue);
        assert_eq!(buffer.feed("FROM functions"), ShellInput::Continue);
        assert_eq!(
            buffer.feed("WHERE id = 1;"),
            ShellInput::Statement("SELECT name\nFROM functions\nWHERE id = 1;".into())
        );
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_semicolon_inside_string_does_not_terminate() {
        let mut buffer = StatementBuffer::new();
        assert_eq!(buffer.feed("SELECT 'a;"), ShellInput::Continue);
        assert!(matches!(buffer.feed("b';"), ShellInput::Statement(_)));
    }

    #[test]
    fn test_meta_commands_only_between_statements() {
        let mut buffer = StatementBuffer::new();
        assert_eq!(buffer.feed(".tables"), ShellInput::Meta(MetaCommand::Tables));
        assert_eq!(
            buffer.feed(".schema functions"),
            ShellInput::Meta(MetaCommand::Schema(Some("functions".into())))
        );
        assert_eq!(buffer.feed(".EXIT"), ShellInput::Meta(MetaCommand::Quit));
        assert_eq!(
            buffer.feed(".frobnicate"),
            ShellInput::Meta(MetaCommand::Unknown(".frobnicate".into()))
        );

        assert_eq!(buffer.feed("SELECT"), ShellInput::Continue);
        assert_eq!(buffer.feed(".tables"), ShellInput::Continue);
    }

    #[test]
    fn test_blank_lines_are_ignored() {
        let mut buffer = StatementBuffer::new();
        assert_eq!(buffer.feed("   "), ShellInput::Continue);
        assert!(buffer.is_empty());
    }
}
