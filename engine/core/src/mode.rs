//! Session Mode State Machine
//!
//! Exactly one mode owns the input line at a time:
//!
//! ```text
//!                    agent N                  exit / quit / disconnect
//!          +--------------------------> AgentChat(N) ---------------+
//!          |                                                        |
//!          |         agq                                            v
//!        Shell ------------------------> GuidedAssistant -------> Shell
//!          |                                                        ^
//!          |         mc                     FileManagerExit         |
//!          +--------------------------> FileManager ----------------+
//! ```
//!
//! [`dispatch`] and [`dispatch_signal`] are pure: they look at the current
//! mode and the input and return the next mode plus the [`Action`] the
//! session must carry out. Nothing here performs I/O.

use serde::{Deserialize, Serialize};

use crate::commands::ParsedCommand;

/// Who owns the input line
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SessionMode {
    /// Plain shell
    #[default]
    Shell,
    /// Chatting with a numbered agent
    AgentChat {
        /// Agent identity
        agent_id: u32,
    },
    /// Talking to the guided assistant
    GuidedAssistant,
    /// Full-screen file manager; typed lines are ignored
    FileManager,
}

impl SessionMode {
    /// Whether lines are routed to a chat backend
    #[must_use]
    pub const fn is_chat(self) -> bool {
        matches!(self, Self::AgentChat { .. } | Self::GuidedAssistant)
    }
}

impl std::fmt::Display for SessionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Shell => f.write_str("shell"),
            Self::AgentChat { agent_id } => write!(f, "agent-{agent_id}"),
            Self::GuidedAssistant => f.write_str("assistant"),
            Self::FileManager => f.write_str("file-manager"),
        }
    }
}

/// Words that switch modes
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Keywords {
    /// Leave the shell entirely
    pub logout: Vec<String>,
    /// Clear the scrollback (any mode)
    pub clear: Vec<String>,
    /// Open the file manager
    pub file_manager: String,
    /// `agent <id>` opens an agent channel
    pub agent: String,
    /// Open the guided assistant
    pub assistant: String,
    /// Leave a chat mode
    pub chat_exit: Vec<String>,
    /// Local help inside the assistant
    pub assistant_help: String,
}

impl Default for Keywords {
    fn default() -> Self {
        let words = |list: &[&str]| list.iter().map(|w| (*w).to_string()).collect();
        Self {
            logout: words(&["exit", "logout"]),
            clear: words(&["clear", "cls"]),
            file_manager: "mc".to_string(),
            agent: "agent".to_string(),
            assistant: "agq".to_string(),
            chat_exit: words(&["exit", "quit", "disconnect"]),
            assistant_help: "help".to_string(),
        }
    }
}

impl Keywords {
    fn is_clear(&self, word: &str) -> bool {
        self.clear.iter().any(|k| k.eq_ignore_ascii_case(word))
    }

    fn is_chat_exit(&self, word: &str) -> bool {
        self.chat_exit.iter().any(|k| k.eq_ignore_ascii_case(word))
    }
}

/// Out-of-band input
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Signal {
    /// Ctrl+C
    Interrupt,
    /// The file manager closed itself
    FileManagerExit,
}

/// What the session must do after a dispatch
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Action {
    /// Nothing (blank line)
    Ignore,
    /// Clear the scrollback
    Clear,
    /// End the session; the surface quits
    Logout,
    /// Builtin, then model fallback
    RunCommand(ParsedCommand),
    /// Show the file manager
    EnterFileManager,
    /// The file manager closed
    LeaveFileManager,
    /// Open agent channel `id`
    ConnectAgent(u32),
    /// `agent` without a usable id
    AgentUsage(String),
    /// Reset the failure tally and run the assistant welcome
    EnterAssistant,
    /// Send the line to the agent
    ForwardToAgent {
        /// Agent identity
        agent_id: u32,
        /// Verbatim line
        message: String,
    },
    /// Send the line to the assistant
    ForwardToAssistant(String),
    /// Local assistant help
    AssistantHelp,
    /// Non-interruptible assistant exit flourish
    ExitAssistant,
    /// Close agent channel `id`
    DisconnectAgent(u32),
    /// Input swallowed by the file manager
    Suppressed,
    /// Cancel the running sequence
    AbortInFlight,
    /// Idle chat interrupted: marker, back to the shell
    InterruptChat,
    /// Idle shell interrupted: `^C` marker
    InterruptShell,
}

/// Result of a dispatch
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transition {
    /// Mode after the action
    pub next: SessionMode,
    /// What to do
    pub action: Action,
}

impl Transition {
    fn stay(mode: SessionMode, action: Action) -> Self {
        Self { next: mode, action }
    }

    fn to(next: SessionMode, action: Action) -> Self {
        Self { next, action }
    }
}

/// Route one submitted line
#[must_use]
pub fn dispatch(mode: SessionMode, line: &str, keywords: &Keywords) -> Transition {
    let trimmed = line.trim();
    match mode {
        SessionMode::FileManager => Transition::stay(mode, Action::Suppressed),
        _ if trimmed.is_empty() => Transition::stay(mode, Action::Ignore),
        SessionMode::Shell => dispatch_shell(trimmed, keywords),
        SessionMode::AgentChat { agent_id } => {
            if keywords.is_chat_exit(trimmed) {
                Transition::to(SessionMode::Shell, Action::DisconnectAgent(agent_id))
            } else if keywords.is_clear(trimmed) {
                Transition::stay(mode, Action::Clear)
            } else {
                Transition::stay(
                    mode,
                    Action::ForwardToAgent {
                        agent_id,
                        message: trimmed.to_string(),
                    },
                )
            }
        }
        SessionMode::GuidedAssistant => {
            if keywords.is_chat_exit(trimmed) {
                Transition::to(SessionMode::Shell, Action::ExitAssistant)
            } else if keywords.is_clear(trimmed) {
                Transition::stay(mode, Action::Clear)
            } else if trimmed.eq_ignore_ascii_case(&keywords.assistant_help) {
                Transition::stay(mode, Action::AssistantHelp)
            } else {
                Transition::stay(mode, Action::ForwardToAssistant(trimmed.to_string()))
            }
        }
    }
}

fn dispatch_shell(line: &str, keywords: &Keywords) -> Transition {
    let shell = SessionMode::Shell;
    let parsed = ParsedCommand::parse(line);
    let command = parsed.command.as_str();

    if keywords.logout.iter().any(|k| k == command) {
        return Transition::stay(shell, Action::Logout);
    }
    if keywords.clear.iter().any(|k| k == command) {
        return Transition::stay(shell, Action::Clear);
    }
    if command == keywords.file_manager {
        return Transition::to(SessionMode::FileManager, Action::EnterFileManager);
    }
    if command == keywords.agent {
        return match parsed.args.first().map(|a| a.parse::<u32>()) {
            Some(Ok(agent_id)) => Transition::to(
                SessionMode::AgentChat { agent_id },
                Action::ConnectAgent(agent_id),
            ),
            _ => Transition::stay(
                shell,
                Action::AgentUsage(format!("Usage: {} <id>", keywords.agent)),
            ),
        };
    }
    if command == keywords.assistant {
        return Transition::to(SessionMode::GuidedAssistant, Action::EnterAssistant);
    }
    Transition::stay(shell, Action::RunCommand(parsed))
}

/// Route a signal; `in_flight` is whether a sequence is running
#[must_use]
pub fn dispatch_signal(mode: SessionMode, signal: Signal, in_flight: bool) -> Transition {
    match (mode, signal) {
        (SessionMode::FileManager, Signal::FileManagerExit) => {
            Transition::to(SessionMode::Shell, Action::LeaveFileManager)
        }
        (_, Signal::FileManagerExit) | (SessionMode::FileManager, Signal::Interrupt) => {
            Transition::stay(mode, Action::Ignore)
        }
        (_, Signal::Interrupt) if in_flight => Transition::stay(mode, Action::AbortInFlight),
        (SessionMode::Shell, Signal::Interrupt) => Transition::stay(mode, Action::InterruptShell),
        (SessionMode::AgentChat { .. } | SessionMode::GuidedAssistant, Signal::Interrupt) => {
            Transition::to(SessionMode::Shell, Action::InterruptChat)
        }
    }
}

/// Prompt shown before the input line
#[must_use]
pub fn prompt(mode: SessionMode, user: &str, hostname: &str, cwd: &str) -> String {
    match mode {
        SessionMode::Shell | SessionMode::FileManager => {
            format!("{user}@{hostname}:{}#", display_dir(cwd))
        }
        SessionMode::AgentChat { agent_id } => format!("agent-{agent_id}>"),
        SessionMode::GuidedAssistant => "agq>".to_string(),
    }
}

/// Home directories show as `~`
#[must_use]
pub fn display_dir(cwd: &str) -> &str {
    match cwd {
        "/root" | "/home/user" => "~",
        other => other,
    }
}
