//! User profile
//!
//! What the session knows about the person typing: the command history, an
//! experience level inferred from it, and a short activity log that gives
//! the models some memory of what just happened.

use serde::{Deserialize, Serialize};

use crate::store::{keys, KeyValueStore, StoreError, StoreExt};

/// Most history entries kept
pub const HISTORY_LIMIT: usize = 1000;

/// Most activity log entries kept
pub const SESSION_LOG_LIMIT: usize = 100;

/// Longest activity log entry
pub const SESSION_LOG_ENTRY_CHARS: usize = 500;

const SUMMARY_ENTRIES: usize = 20;

const ADVANCED_COMMANDS: &[&str] = &[
    "awk", "sed", "grep", "find", "xargs", "tar", "gzip", "ssh", "scp", "rsync", "cron",
    "systemctl", "journalctl", "iptables", "netstat", "tcpdump", "strace", "gdb", "vim", "emacs",
    "git", "docker", "kubectl",
];

const INTERMEDIATE_COMMANDS: &[&str] = &[
    "cd", "ls", "cat", "mkdir", "rm", "cp", "mv", "chmod", "chown", "ps", "top", "df", "du",
    "free", "wget", "curl", "nano",
];

/// Inferred shell experience
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserLevel {
    /// Few or only basic commands
    #[default]
    Beginner,
    /// Everyday commands or some plumbing
    Intermediate,
    /// Power tools, especially combined with plumbing
    Advanced,
}

impl UserLevel {
    /// Infer a level from submitted lines
    ///
    /// Command names match by substring anywhere in the line.
    #[must_use]
    pub fn detect<S: AsRef<str>>(history: &[S]) -> Self {
        if history.is_empty() {
            return Self::Beginner;
        }
        let count = |set: &[&str]| {
            history
                .iter()
                .filter(|cmd| set.iter().any(|c| cmd.as_ref().contains(c)))
                .count()
        };
        let advanced = count(ADVANCED_COMMANDS);
        let intermediate = count(INTERMEDIATE_COMMANDS);
        let plumbing = history.iter().any(|cmd| {
            let cmd = cmd.as_ref();
            cmd.contains('|') || cmd.contains('>') || cmd.contains('<') || cmd.contains('&')
        });

        if advanced > 5 || (advanced > 2 && plumbing) {
            Self::Advanced
        } else if intermediate > 10 || plumbing || advanced > 0 {
            Self::Intermediate
        } else {
            Self::Beginner
        }
    }
}

impl std::fmt::Display for UserLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Beginner => "beginner",
            Self::Intermediate => "intermediate",
            Self::Advanced => "advanced",
        })
    }
}

/// Stored command history
pub fn load_history(store: &dyn KeyValueStore) -> Vec<String> {
    store.get_json(keys::HISTORY).unwrap_or_default()
}

/// Append `line` to the stored history, keeping the last [`HISTORY_LIMIT`]
///
/// # Errors
///
/// Fails if the store cannot persist the history.
pub fn record_history(store: &dyn KeyValueStore, line: &str) -> Result<Vec<String>, StoreError> {
    let mut history = load_history(store);
    history.push(line.to_string());
    if history.len() > HISTORY_LIMIT {
        let excess = history.len() - HISTORY_LIMIT;
        history.drain(..excess);
    }
    store.set_json(keys::HISTORY, &history)?;
    Ok(history)
}

/// Re-detect the user level from stored history and persist it
///
/// # Errors
///
/// Fails if the store cannot persist a changed level.
pub fn refresh_user_level(
    store: &dyn KeyValueStore,
    history: &[String],
) -> Result<UserLevel, StoreError> {
    let level = UserLevel::detect(history);
    let stored: Option<UserLevel> = store.get_json(keys::USER_LEVEL);
    if stored != Some(level) {
        tracing::info!(%level, "User level changed");
        store.set_json(keys::USER_LEVEL, &level)?;
    }
    Ok(level)
}

/// Kind of activity log entry
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityKind {
    /// A submitted command
    Command,
    /// Output shown for it
    Output,
    /// Agent or assistant traffic
    Agent,
}

/// One activity log entry
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActivityEntry {
    /// Entry kind
    pub kind: ActivityKind,
    /// Truncated content
    pub content: String,
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
}

/// Append to the stored activity log
///
/// # Errors
///
/// Fails if the store cannot persist the log.
pub fn log_activity(
    store: &dyn KeyValueStore,
    kind: ActivityKind,
    content: &str,
) -> Result<(), StoreError> {
    let mut log: Vec<ActivityEntry> = store.get_json(keys::SESSION_LOG).unwrap_or_default();
    log.push(ActivityEntry {
        kind,
        content: content.chars().take(SESSION_LOG_ENTRY_CHARS).collect(),
        timestamp: chrono::Utc::now().timestamp_millis(),
    });
    if log.len() > SESSION_LOG_LIMIT {
        let excess = log.len() - SESSION_LOG_LIMIT;
        log.drain(..excess);
    }
    store.set_json(keys::SESSION_LOG, &log)
}

/// Recent activity rendered as a transcript
#[must_use]
pub fn activity_summary(store: &dyn KeyValueStore) -> String {
    let log: Vec<ActivityEntry> = store.get_json(keys::SESSION_LOG).unwrap_or_default();
    if log.is_empty() {
        return "No session history.".to_string();
    }
    let start = log.len().saturating_sub(SUMMARY_ENTRIES);
    log[start..]
        .iter()
        .map(|entry| match entry.kind {
            ActivityKind::Command => format!("$ {}", entry.content),
            ActivityKind::Agent => format!("[Agent] {}", entry.content),
            ActivityKind::Output => entry.content.clone(),
        })
        .collect::<Vec<_>>()
        .join("\n")
}
