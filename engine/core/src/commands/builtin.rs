//! Builtin commands

use std::sync::Arc;

use async_trait::async_trait;
use chrono::format::{Item, StrftimeItems};

use super::{CommandError, CommandHandler, CommandOutput, ParsedCommand};
use crate::profile::load_history;
use crate::store::{keys, KeyValueStore};

/// `pwd`
pub struct PwdCommand;

#[async_trait]
impl CommandHandler for PwdCommand {
    fn name(&self) -> &str {
        "pwd"
    }

    fn summary(&self) -> &str {
        "Print the working directory"
    }

    async fn run(&self, _parsed: &ParsedCommand, cwd: &str) -> Result<CommandOutput, CommandError> {
        Ok(CommandOutput::Text(cwd.to_string()))
    }
}

/// `echo`
pub struct EchoCommand;

#[async_trait]
impl CommandHandler for EchoCommand {
    fn name(&self) -> &str {
        "echo"
    }

    fn summary(&self) -> &str {
        "Print arguments"
    }

    async fn run(&self, parsed: &ParsedCommand, _cwd: &str) -> Result<CommandOutput, CommandError> {
        Ok(CommandOutput::Text(parsed.args.join(" ")))
    }
}

/// `whoami`
pub struct WhoamiCommand {
    username: String,
}

impl WhoamiCommand {
    /// Reports `username`
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
        }
    }
}

#[async_trait]
impl CommandHandler for WhoamiCommand {
    fn name(&self) -> &str {
        "whoami"
    }

    fn summary(&self) -> &str {
        "Print the current user"
    }

    async fn run(&self, _parsed: &ParsedCommand, _cwd: &str) -> Result<CommandOutput, CommandError> {
        Ok(CommandOutput::Text(self.username.clone()))
    }
}

/// `hostname`
pub struct HostnameCommand {
    hostname: String,
}

impl HostnameCommand {
    /// Reports `hostname`
    pub fn new(hostname: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
        }
    }
}

#[async_trait]
impl CommandHandler for HostnameCommand {
    fn name(&self) -> &str {
        "hostname"
    }

    fn summary(&self) -> &str {
        "Print the host name"
    }

    async fn run(&self, parsed: &ParsedCommand, _cwd: &str) -> Result<CommandOutput, CommandError> {
        if !parsed.args.is_empty() {
            return Err(CommandError::Failed(
                "hostname: you must be root to change the host name".to_string(),
            ));
        }
        Ok(CommandOutput::Text(self.hostname.clone()))
    }
}

/// `date`
pub struct DateCommand;

#[async_trait]
impl CommandHandler for DateCommand {
    fn name(&self) -> &str {
        "date"
    }

    fn summary(&self) -> &str {
        "Print the system date and time"
    }

    async fn run(&self, parsed: &ParsedCommand, _cwd: &str) -> Result<CommandOutput, CommandError> {
        let now = chrono::Utc::now();
        let text = match parsed.args.first() {
            Some(format) if format.starts_with('+') => {
                let pattern = &format[1..];
                if StrftimeItems::new(pattern).any(|item| matches!(item, Item::Error)) {
                    return Err(CommandError::Usage(format!(
                        "date: invalid format '{pattern}'"
                    )));
                }
                now.format_with_items(StrftimeItems::new(pattern)).to_string()
            }
            Some(other) => {
                return Err(CommandError::Usage(format!("date: invalid date '{other}'")));
            }
            None => now.format("%a %b %e %H:%M:%S UTC %Y").to_string(),
        };
        Ok(CommandOutput::Text(text))
    }
}

/// `history`
pub struct HistoryCommand {
    store: Arc<dyn KeyValueStore>,
}

impl HistoryCommand {
    /// History read from `store`
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl CommandHandler for HistoryCommand {
    fn name(&self) -> &str {
        "history"
    }

    fn summary(&self) -> &str {
        "Show command history (-c clears)"
    }

    async fn run(&self, parsed: &ParsedCommand, _cwd: &str) -> Result<CommandOutput, CommandError> {
        if parsed.has_flag("c") {
            self.store
                .remove(keys::HISTORY)
                .map_err(|e| CommandError::Failed(format!("history: {e}")))?;
            return Ok(CommandOutput::Lines(Vec::new()));
        }

        let history = load_history(self.store.as_ref());
        let limit = match parsed.args.first() {
            Some(n) => n.parse::<usize>().map_err(|_| {
                CommandError::Usage(format!("history: {n}: numeric argument required"))
            })?,
            None => history.len(),
        };
        let start = history.len().saturating_sub(limit);
        let lines = history
            .iter()
            .enumerate()
            .skip(start)
            .map(|(i, cmd)| format!("{:>5}  {cmd}", i + 1))
            .collect();
        Ok(CommandOutput::Lines(lines))
    }
}

/// `help`
pub struct HelpCommand {
    entries: Vec<(String, String)>,
}

impl HelpCommand {
    /// Help listing `(name, summary)` pairs
    #[must_use]
    pub fn new(entries: Vec<(String, String)>) -> Self {
        Self { entries }
    }
}

#[async_trait]
impl CommandHandler for HelpCommand {
    fn name(&self) -> &str {
        "help"
    }

    fn summary(&self) -> &str {
        "Show this list"
    }

    async fn run(&self, _parsed: &ParsedCommand, _cwd: &str) -> Result<CommandOutput, CommandError> {
        let width = self
            .entries
            .iter()
            .map(|(name, _)| name.len())
            .max()
            .unwrap_or(0)
            .max("help".len());
        let mut lines = vec!["Builtin commands:".to_string()];
        for (name, summary) in &self.entries {
            lines.push(format!("  {name:<width$}  {summary}"));
        }
        lines.push(format!("  {:<width$}  {}", "help", self.summary()));
        lines.push(String::new());
        lines.push("Anything else is run on the server.".to_string());
        Ok(CommandOutput::Lines(lines))
    }
}
