//! Shell commands
//!
//! A submitted shell line is tokenized into a [`ParsedCommand`] and looked
//! up in the [`CommandRegistry`]. Only a handful of builtins live here; the
//! rest of the simulated server is answered by the model fallback.
//!
//! The tokenizer understands quotes and flags, nothing more: no pipes,
//! redirects or expansion.

mod builtin;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

pub use builtin::{
    DateCommand, EchoCommand, HelpCommand, HistoryCommand, HostnameCommand, PwdCommand,
    WhoamiCommand,
};

use crate::store::KeyValueStore;

/// Value of a parsed flag
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FlagValue {
    /// Flag given without a value
    Set,
    /// `--name value`
    Value(String),
}

/// A tokenized command line
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParsedCommand {
    /// Program name (empty for a blank line)
    pub command: String,
    /// Positional arguments
    pub args: Vec<String>,
    /// Flags by name (`-la` yields `l` and `a`)
    pub flags: BTreeMap<String, FlagValue>,
    /// The trimmed input
    pub raw: String,
}

impl ParsedCommand {
    /// Tokenize `input`
    #[must_use]
    pub fn parse(input: &str) -> Self {
        let raw = input.trim().to_string();
        let mut parts = tokenize(&raw).into_iter();
        let Some(command) = parts.next() else {
            return Self {
                raw,
                ..Self::default()
            };
        };

        let mut args = Vec::new();
        let mut flags = BTreeMap::new();
        let mut parts = parts.peekable();
        while let Some(part) = parts.next() {
            if let Some(name) = part.strip_prefix("--") {
                let value = match parts.peek() {
                    Some(next) if !next.starts_with('-') => {
                        FlagValue::Value(parts.next().unwrap_or_default())
                    }
                    _ => FlagValue::Set,
                };
                flags.insert(name.to_string(), value);
            } else if part.len() > 1 && part.starts_with('-') {
                for c in part.chars().skip(1) {
                    flags.insert(c.to_string(), FlagValue::Set);
                }
            } else {
                args.push(part);
            }
        }

        Self {
            command,
            args,
            flags,
            raw,
        }
    }

    /// Whether flag `name` was given
    #[must_use]
    pub fn has_flag(&self, name: &str) -> bool {
        self.flags.contains_key(name)
    }

    /// Value of `--name value`
    #[must_use]
    pub fn flag_value(&self, name: &str) -> Option<&str> {
        match self.flags.get(name) {
            Some(FlagValue::Value(v)) => Some(v),
            _ => None,
        }
    }
}

/// Split on spaces outside single or double quotes; quotes are dropped
fn tokenize(input: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;

    for c in input.chars() {
        match (quote, c) {
            (None, '"' | '\'') => quote = Some(c),
            (Some(q), c) if c == q => quote = None,
            (None, c) if c.is_whitespace() => {
                if !current.is_empty() {
                    parts.push(std::mem::take(&mut current));
                }
            }
            (_, c) => current.push(c),
        }
    }
    if !current.is_empty() {
        parts.push(current);
    }
    parts
}

/// What a handler produced
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CommandOutput {
    /// One block of text (may span lines)
    Text(String),
    /// Separate lines
    Lines(Vec<String>),
    /// Clear the scrollback
    Clear,
}

impl CommandOutput {
    /// Output as scrollback lines
    #[must_use]
    pub fn into_lines(self) -> Vec<String> {
        match self {
            Self::Text(text) if text.is_empty() => Vec::new(),
            Self::Text(text) => text.split('\n').map(str::to_string).collect(),
            Self::Lines(lines) => lines,
            Self::Clear => Vec::new(),
        }
    }
}

/// Handler failures, rendered inline as `Error: <message>`
#[derive(Debug, Error)]
pub enum CommandError {
    /// Bad arguments
    #[error("{0}")]
    Usage(String),

    /// The command ran but failed
    #[error("{0}")]
    Failed(String),
}

/// A builtin command
#[async_trait]
pub trait CommandHandler: Send + Sync {
    /// Name the command is invoked by
    fn name(&self) -> &str;

    /// One-line description for `help`
    fn summary(&self) -> &str;

    /// Run with `parsed` in working directory `cwd`
    async fn run(&self, parsed: &ParsedCommand, cwd: &str) -> Result<CommandOutput, CommandError>;
}

/// Builtin lookup table
#[derive(Clone, Default)]
pub struct CommandRegistry {
    handlers: HashMap<String, Arc<dyn CommandHandler>>,
}

impl CommandRegistry {
    /// Empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the standard builtins
    #[must_use]
    pub fn with_builtins(
        hostname: &str,
        username: &str,
        store: Arc<dyn KeyValueStore>,
    ) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(PwdCommand));
        registry.register(Arc::new(EchoCommand));
        registry.register(Arc::new(WhoamiCommand::new(username)));
        registry.register(Arc::new(HostnameCommand::new(hostname)));
        registry.register(Arc::new(DateCommand));
        registry.register(Arc::new(HistoryCommand::new(store)));
        registry.register(Arc::new(HelpCommand::new(registry.summaries())));
        registry
    }

    /// Add or replace a handler
    pub fn register(&mut self, handler: Arc<dyn CommandHandler>) {
        tracing::debug!(command = handler.name(), "Registering command");
        self.handlers.insert(handler.name().to_string(), handler);
    }

    /// Handler for `command`
    #[must_use]
    pub fn lookup(&self, command: &str) -> Option<Arc<dyn CommandHandler>> {
        self.handlers.get(command).cloned()
    }

    /// Registered names, sorted
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.handlers.keys().cloned().collect();
        names.sort();
        names
    }

    /// `(name, summary)` pairs, sorted by name
    #[must_use]
    pub fn summaries(&self) -> Vec<(String, String)> {
        let mut pairs: Vec<_> = self
            .handlers
            .values()
            .map(|h| (h.name().to_string(), h.summary().to_string()))
            .collect();
        pairs.sort();
        pairs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_flags_and_args() {
        let parsed = ParsedCommand::parse("  ls -la --color auto /srv  ");
        assert_eq!(parsed.command, "ls");
        assert_eq!(parsed.args, vec!["/srv".to_string()]);
        assert!(parsed.has_flag("l"));
        assert!(parsed.has_flag("a"));
        assert_eq!(parsed.flag_value("color"), Some("auto"));
        assert_eq!(parsed.raw, "ls -la --color auto /srv");
    }

    #[test]
    fn test_parse_long_flag_before_flag_is_set() {
        let parsed = ParsedCommand::parse("grep --verbose -n x");
        assert_eq!(parsed.flags.get("verbose"), Some(&FlagValue::Set));
        assert!(parsed.has_flag("n"));
        assert_eq!(parsed.args, vec!["x".to_string()]);
    }

    #[test]
    fn test_parse_quotes() {
        let parsed = ParsedCommand::parse(r#"echo "hello   world" 'a b' - x"#);
        assert_eq!(
            parsed.args,
            vec![
                "hello   world".to_string(),
                "a b".to_string(),
                "-".to_string(),
                "x".to_string()
            ]
        );
    }

    #[test]
    fn test_parse_blank() {
        let parsed = ParsedCommand::parse("   ");
        assert_eq!(parsed.command, "");
        assert!(parsed.args.is_empty());
    }

    #[test]
    fn test_output_lines() {
        assert_eq!(
            CommandOutput::Text("a\nb".to_string()).into_lines(),
            vec!["a".to_string(), "b".to_string()]
        );
        assert!(CommandOutput::Text(String::new()).into_lines().is_empty());
        assert!(CommandOutput::Clear.into_lines().is_empty());
    }

    #[test]
    fn test_registry_builtins() {
        let registry = CommandRegistry::with_builtins("prod-srv-42", "root", Arc::new(MemoryStore::new()));
        assert_eq!(
            registry.names(),
            vec!["date", "echo", "help", "history", "hostname", "pwd", "whoami"]
        );
        assert!(registry.lookup("ls").is_none());
    }
}
