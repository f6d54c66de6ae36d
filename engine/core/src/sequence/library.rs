//! Built-in sequences
//!
//! Fixed scripts rendered without a backend round-trip: the help offer after
//! repeated failures, the assistant's welcome/help/exit flourishes, fallback
//! replies, and the shell's "command not found" line.

use crate::palette::Tone;
use crate::step::{
    ProcessKind, ProcessStep, ProgressStep, ProgressStyle, SectionContent, SectionStep,
    SectionStyle, StatusKind, Step, TextAnimation, TextStep,
};

use super::Sequence;

/// Tag prefixed to assistant lines
pub const ASSISTANT_TAG: &str = "[AGQ]";

/// Proactive help offer after `failed_count` consecutive misses
///
/// Not interruptible: the offer always renders in full.
#[must_use]
pub fn help_offer(failed_count: u32, assistant_keyword: &str) -> Sequence {
    Sequence::new(
        "help-offer",
        vec![
            Step::wait(500),
            Step::text(""),
            Step::Text(
                TextStep::new(format!(
                    "{ASSISTANT_TAG} {failed_count} commands in a row went unanswered."
                ))
                .with_animation(TextAnimation::Typewriter)
                .with_tone(Tone::Quantum)
                .with_interval(20),
            ),
            Step::wait(300),
            Step::Text(
                TextStep::new(format!(
                    "Need a hand? Type \"{assistant_keyword}\" to open a channel."
                ))
                .with_animation(TextAnimation::Typewriter)
                .with_tone(Tone::Dim)
                .with_interval(25),
            ),
        ],
    )
    .interruptible(false)
}

/// Assistant greeting, richer as the initiation level grows
#[must_use]
pub fn assistant_welcome(initiation_level: u8) -> Sequence {
    let mut steps = vec![
        Step::Text(
            TextStep::new(format!("{ASSISTANT_TAG} Opening channel..."))
                .with_animation(TextAnimation::Typewriter)
                .with_tone(Tone::Quantum)
                .with_interval(20),
        ),
        Step::Progress(ProgressStep {
            style: ProgressStyle::Blocks,
            text: Some("Negotiating handshake".to_string()),
            duration_ms: 1500,
            percent: None,
            show_percent: true,
        }),
        Step::status(StatusKind::Ok, "Channel stable"),
        Step::wait(200),
    ];

    if initiation_level < 20 {
        steps.push(welcome_section(
            &[
                "Guided assistant online.",
                "Ask about commands, the system, or anything that looks odd.",
                "Type \"exit\" to disconnect.",
            ],
            Tone::Info,
        ));
    } else if initiation_level < 50 {
        steps.push(welcome_section(
            &[
                "Welcome back.",
                "You have been poking around. There is more under the surface.",
                "Ask, and I will point the way.",
            ],
            Tone::Quantum,
        ));
    } else {
        steps.push(Step::Process(ProcessStep {
            kind: ProcessKind::Decrypt,
            text: "Restoring session context".to_string(),
            duration_ms: 1000,
            stages: vec![
                "Loading markers...".to_string(),
                "Re-aligning state...".to_string(),
            ],
            show_spinner: true,
        }));
        steps.push(Step::status(StatusKind::Done, "Session restored"));
        steps.push(Step::styled("Go ahead.", Tone::Highlight));
    }

    Sequence::new("assistant-welcome", steps)
}

fn welcome_section(lines: &[&str], tone: Tone) -> Step {
    Step::Section(SectionStep {
        title: "Assistant Online".to_string(),
        content: SectionContent::Many(lines.iter().map(|l| (*l).to_string()).collect()),
        style: SectionStyle::Box,
        tone,
    })
}

/// Local help for the guided assistant mode
#[must_use]
pub fn assistant_help() -> Sequence {
    Sequence::new(
        "assistant-help",
        vec![Step::Section(SectionStep {
            title: "Assistant Help".to_string(),
            content: SectionContent::Many(
                [
                    "Commands in assistant mode:",
                    "  help     - Show this help",
                    "  exit     - Disconnect",
                    "  clear    - Clear terminal",
                    "",
                    "Anything else is sent to the assistant.",
                ]
                .iter()
                .map(|l| (*l).to_string())
                .collect(),
            ),
            style: SectionStyle::Box,
            tone: Tone::Info,
        })],
    )
}

/// Closing flourish when leaving the assistant
///
/// Not interruptible. The session is already back in shell mode when this
/// plays, so a `^C` would only cut the goodbye short.
#[must_use]
pub fn assistant_exit(assistant_keyword: &str) -> Sequence {
    Sequence::new(
        "assistant-exit",
        vec![
            Step::Text(
                TextStep::new(format!("{ASSISTANT_TAG} Closing channel..."))
                    .with_animation(TextAnimation::Typewriter)
                    .with_tone(Tone::Dim)
                    .with_interval(30),
            ),
            Step::Progress(ProgressStep {
                style: ProgressStyle::Dots,
                text: Some("Saving session state".to_string()),
                duration_ms: 800,
                percent: None,
                show_percent: false,
            }),
            Step::status(
                StatusKind::Done,
                format!("Disconnected. Type \"{assistant_keyword}\" to reconnect."),
            ),
        ],
    )
    .interruptible(false)
}

/// Reply used when a backend round-trip fails
#[must_use]
pub fn backend_unavailable() -> Sequence {
    Sequence::new(
        "backend-unavailable",
        vec![
            Step::status(StatusKind::Warn, "Interference detected on the channel"),
            Step::styled(
                "Unable to process the request right now. Try again.",
                Tone::Warning,
            ),
        ],
    )
}

/// Shell miss line
#[must_use]
pub fn command_not_found(command: &str) -> Sequence {
    Sequence::new(
        "command-not-found",
        vec![Step::text(not_found_line(command))],
    )
}

/// Text of the shell miss line
#[must_use]
pub fn not_found_line(command: &str) -> String {
    format!("{command}: command not found")
}

/// Banner shown when an agent channel opens
#[must_use]
pub fn agent_connected(agent_id: u32, prior_messages: usize) -> Sequence {
    let mut steps = vec![
        Step::Process(ProcessStep {
            kind: ProcessKind::Sync,
            text: format!("Connecting to agent-{agent_id}"),
            duration_ms: 600,
            stages: Vec::new(),
            show_spinner: true,
        }),
        Step::status(StatusKind::Ok, format!("Connected to agent-{agent_id}")),
    ];
    if prior_messages > 0 {
        steps.push(Step::styled(
            format!("Resuming conversation ({prior_messages} messages)."),
            Tone::Dim,
        ));
    }
    steps.push(Step::styled(
        "Type \"exit\" to disconnect, Ctrl+C to interrupt.",
        Tone::Dim,
    ));
    Sequence::new(format!("agent-{agent_id}-connect"), steps)
}

/// Line shown when an agent channel closes
#[must_use]
pub fn agent_disconnected(agent_id: u32) -> Sequence {
    Sequence::new(
        format!("agent-{agent_id}-disconnect"),
        vec![Step::status(
            StatusKind::Info,
            format!("Connection to agent-{agent_id} closed."),
        )],
    )
}

/// Line shown when an idle chat mode is interrupted
#[must_use]
pub fn chat_interrupted() -> Sequence {
    Sequence::new(
        "chat-interrupted",
        vec![Step::styled("^C (interrupted, back to shell)", Tone::Warning)],
    )
}

/// Login banner figures that vary per session
#[derive(Clone, Debug, PartialEq)]
pub struct MotdStats {
    /// When the banner is shown
    pub now: chrono::DateTime<chrono::Utc>,
    /// Previous login time
    pub last_login: chrono::DateTime<chrono::Utc>,
    /// Previous login address
    pub last_login_ip: String,
    /// Load average
    pub load: f64,
    /// Process count
    pub processes: u32,
    /// Memory usage percentage
    pub memory_percent: u32,
    /// Pending package updates
    pub updates: u32,
}

impl MotdStats {
    /// Plausible random figures for `now`
    pub fn random(now: chrono::DateTime<chrono::Utc>, rng: &mut impl rand::Rng) -> Self {
        Self {
            now,
            last_login: now - chrono::Duration::seconds(rng.gen_range(600..172_800)),
            last_login_ip: format!("192.168.{}.{}", rng.gen_range(0..255), rng.gen_range(1..255)),
            load: rng.gen_range(0.1..0.6),
            processes: rng.gen_range(80..130),
            memory_percent: rng.gen_range(15..45),
            updates: rng.gen_range(5..25),
        }
    }
}

/// Login banner
#[must_use]
pub fn motd(stats: &MotdStats) -> Sequence {
    let stamp = |t: &chrono::DateTime<chrono::Utc>| t.format("%a %b %e %H:%M:%S UTC %Y").to_string();
    let lines = [
        "Welcome to Ubuntu 25.04 (GNU/Linux 6.14.0-36-generic x86_64)".to_string(),
        String::new(),
        " * Documentation:  https://help.ubuntu.com".to_string(),
        " * Management:     https://landscape.canonical.com".to_string(),
        " * Support:        https://ubuntu.com/pro".to_string(),
        String::new(),
        format!(" System information as of {}", stamp(&stats.now)),
        String::new(),
        format!(
            "  System load:  {:.2}               Processes:             {}",
            stats.load, stats.processes
        ),
        format!("  Memory usage: {}%                Users logged in:       1", stats.memory_percent),
        String::new(),
        format!("{} updates can be applied immediately.", stats.updates),
        "To see these additional updates run: apt list --upgradable".to_string(),
        String::new(),
        format!(
            "Last login: {} from {}",
            stamp(&stats.last_login),
            stats.last_login_ip
        ),
        String::new(),
    ];
    Sequence::new("motd", lines.into_iter().map(Step::text).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flourishes_are_not_interruptible() {
        assert!(!help_offer(3, "agq").interruptible);
        assert!(!assistant_exit("agq").interruptible);
        assert!(assistant_help().interruptible);
    }

    #[test]
    fn test_help_offer_mentions_count_and_keyword() {
        let sequence = help_offer(3, "agq");
        let texts: Vec<&str> = sequence
            .steps
            .iter()
            .filter_map(|s| match s {
                Step::Text(t) => Some(t.content.as_str()),
                _ => None,
            })
            .collect();
        assert!(texts.iter().any(|t| t.contains('3')));
        assert!(texts.iter().any(|t| t.contains("\"agq\"")));
    }

    #[test]
    fn test_welcome_grows_with_level() {
        let fresh = assistant_welcome(0);
        let initiated = assistant_welcome(80);
        assert!(matches!(fresh.steps.last(), Some(Step::Section(_))));
        assert!(initiated
            .steps
            .iter()
            .any(|s| matches!(s, Step::Process(_))));
    }

    #[test]
    fn test_not_found_line() {
        assert_eq!(not_found_line("foo"), "foo: command not found");
    }

    #[test]
    fn test_motd_is_static_text() {
        use chrono::TimeZone;
        let now = chrono::Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
        let stats = MotdStats {
            now,
            last_login: now,
            last_login_ip: "192.168.1.2".to_string(),
            load: 0.25,
            processes: 99,
            memory_percent: 20,
            updates: 7,
        };
        let sequence = motd(&stats);
        assert!(sequence.steps.iter().all(|s| !s.is_animated()));
        assert_eq!(
            sequence.steps.last().cloned(),
            Some(Step::text(""))
        );
        assert!(sequence
            .steps
            .contains(&Step::text("Last login: Sat Mar  1 12:00:00 UTC 2025 from 192.168.1.2")));
    }
}
