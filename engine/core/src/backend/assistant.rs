//! Guided assistant backend
//!
//! The assistant answers with whole sequences rather than text. Welcome,
//! exit and help are scripted locally; free-form messages go to the model,
//! which is asked for sequence JSON and may also move the initiation level.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::traits::{LlmBackend, LlmRequest};
use super::BackendError;
use crate::conversation::{ChatMessage, ChatRole};
use crate::sequence::library;
use crate::sequence::{AssistantReply, Sequence, StateUpdate};

/// Topic words that deepen the initiation level when mentioned
pub const TOPIC_KEYWORDS: [&str; 7] = [
    "temporal", "quantum", "anomaly", "hex", "gateway", "bridge", "16",
];

/// Highest initiation level
pub const MAX_INITIATION_LEVEL: u8 = 100;

const WELCOME_BONUS: u8 = 5;
const KEYWORD_BONUS: u8 = 3;
const RECENT_FAILED: usize = 5;
const RECENT_CONVERSATION: usize = 5;
const SUMMARY_CHARS: usize = 500;

/// What the assistant is asked to do
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssistantAction {
    /// Mode entered
    Welcome,
    /// Mode left
    Exit,
    /// Local help
    Help,
    /// Free-form message
    Message,
}

/// Session state sent with every assistant request
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssistantContext {
    /// Recent shell misses, oldest first
    pub failed_commands: Vec<String>,
    /// Short summary of recent shell activity
    pub session_history_summary: String,
    /// Recent assistant conversation
    pub conversation_history: Vec<ChatMessage>,
    /// Current initiation level (0 to 100)
    pub initiation_level: u8,
}

/// One assistant round-trip
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AssistantRequest {
    /// What the user typed (empty for welcome/exit)
    pub message: String,
    /// Requested action
    pub action: AssistantAction,
    /// Session context
    pub context: AssistantContext,
}

impl AssistantRequest {
    /// Request for `action` with no message
    #[must_use]
    pub fn action(action: AssistantAction, context: AssistantContext) -> Self {
        Self {
            message: String::new(),
            action,
            context,
        }
    }

    /// Free-form message
    pub fn message(message: impl Into<String>, context: AssistantContext) -> Self {
        Self {
            message: message.into(),
            action: AssistantAction::Message,
            context,
        }
    }
}

/// The guided assistant persona
#[async_trait]
pub trait AssistantBackend: Send + Sync {
    /// Produce the sequence answering `request`
    async fn exchange(&self, request: &AssistantRequest) -> Result<AssistantReply, BackendError>;
}

/// Level after a free-form `message`: +3 per topic keyword, +1 for talking
#[must_use]
pub fn bump_initiation_level(level: u8, message: &str) -> u8 {
    let lower = message.to_lowercase();
    let hits = TOPIC_KEYWORDS.iter().filter(|k| lower.contains(**k)).count();
    let bonus = u8::try_from(hits)
        .unwrap_or(u8::MAX)
        .saturating_mul(KEYWORD_BONUS)
        .saturating_add(1);
    level.saturating_add(bonus).min(MAX_INITIATION_LEVEL)
}

/// [`AssistantBackend`] over an [`LlmBackend`]
pub struct LlmAssistant<B> {
    backend: B,
    model: String,
    assistant_keyword: String,
}

impl<B: LlmBackend> LlmAssistant<B> {
    /// Assistant using `model`; `assistant_keyword` is quoted in exit hints
    pub fn new(backend: B, model: impl Into<String>, assistant_keyword: impl Into<String>) -> Self {
        Self {
            backend,
            model: model.into(),
            assistant_keyword: assistant_keyword.into(),
        }
    }

    fn local_reply(&self, request: &AssistantRequest) -> Option<AssistantReply> {
        let level = request.context.initiation_level;
        match request.action {
            AssistantAction::Welcome => Some(AssistantReply {
                sequence: library::assistant_welcome(level),
                state_update: Some(StateUpdate {
                    initiation_level: Some(
                        level.saturating_add(WELCOME_BONUS).min(MAX_INITIATION_LEVEL),
                    ),
                    unlocked_topics: Vec::new(),
                }),
            }),
            AssistantAction::Exit => Some(AssistantReply::from_sequence(library::assistant_exit(
                &self.assistant_keyword,
            ))),
            AssistantAction::Help => Some(AssistantReply::from_sequence(library::assistant_help())),
            AssistantAction::Message if request.message.trim().eq_ignore_ascii_case("help") => {
                Some(AssistantReply::from_sequence(library::assistant_help()))
            }
            AssistantAction::Message => None,
        }
    }

    fn system_prompt() -> &'static str {
        "You are AGQ, a terse and slightly cryptic assistant living inside a remote \
         server terminal. Stay in character. Be practical about shell questions; reveal \
         more about the system's anomalies only as the initiation level grows.\n\n\
         Reply ONLY with JSON of the form {\"sequence\": {\"steps\": [...]}, \
         \"stateUpdate\": {\"initiationLevel\": n, \"unlockedTopics\": [...]}}. \
         Each step has a \"tool\" field. Tools:\n\
         - text {content, animation: instant|typewriter|reveal|glitch|fade-in, style: \
         normal|success|error|warning|info|dim|highlight|quantum, speed}\n\
         - progress {style: npm|wget|spinner|dots|bar|pulse|blocks, text, duration}\n\
         - process {type: loading|scanning|compiling|decrypt|upload|download|analyze|sync, \
         text, duration, stages}\n\
         - section {title, content, style: box|line|minimal}\n\
         - table {headers, rows, style: simple|box|minimal}\n\
         - status {type: ok|fail|warn|info|skip|done, text}\n\
         - matrix {duration, density, message}\n\
         - tree {data: {name, children}}\n\
         - code {content, language, highlight}\n\
         - wait {duration}\n\
         Durations are milliseconds. Keep sequences short."
    }

    fn context_block(request: &AssistantRequest) -> String {
        let context = &request.context;
        let failed = if context.failed_commands.is_empty() {
            "none".to_string()
        } else {
            let start = context.failed_commands.len().saturating_sub(RECENT_FAILED);
            context.failed_commands[start..].join(", ")
        };
        let summary = tail_chars(&context.session_history_summary, SUMMARY_CHARS);
        let summary = if summary.is_empty() {
            "No recent activity"
        } else {
            summary
        };
        let start = context
            .conversation_history
            .len()
            .saturating_sub(RECENT_CONVERSATION);
        let conversation = context.conversation_history[start..]
            .iter()
            .map(|m| {
                let who = match m.role {
                    ChatRole::User => "user",
                    ChatRole::Assistant => "assistant",
                };
                format!("{who}: {}", m.content)
            })
            .collect::<Vec<_>>()
            .join("\n");
        let conversation = if conversation.is_empty() {
            "New conversation".to_string()
        } else {
            conversation
        };

        format!(
            "Initiation level: {}/100\nFailed commands: {failed}\n\
             Session history: {summary}\nConversation:\n{conversation}",
            context.initiation_level
        )
    }
}

/// Last `n` characters of `text`
fn tail_chars(text: &str, n: usize) -> &str {
    let count = text.chars().count();
    if count <= n {
        return text;
    }
    let skip = count - n;
    text.char_indices()
        .nth(skip)
        .map_or(text, |(offset, _)| &text[offset..])
}

#[async_trait]
impl<B: LlmBackend> AssistantBackend for LlmAssistant<B> {
    async fn exchange(&self, request: &AssistantRequest) -> Result<AssistantReply, BackendError> {
        if let Some(reply) = self.local_reply(request) {
            tracing::debug!(action = ?request.action, "Assistant answered locally");
            return Ok(reply);
        }

        let llm_request = LlmRequest::new(format!("User message: {}", request.message), &self.model)
            .with_system(Self::system_prompt())
            .with_context(Self::context_block(request));

        let response = self
            .backend
            .send(&llm_request)
            .await
            .map_err(BackendError::from_llm)?;

        let level = request.context.initiation_level;
        let reply = match AssistantReply::try_parse(&response.text) {
            Some(mut reply) => {
                let reported = reply
                    .state_update
                    .as_ref()
                    .and_then(|u| u.initiation_level)
                    .filter(|l| *l > 0);
                let unlocked = reply
                    .state_update
                    .take()
                    .map(|u| u.unlocked_topics)
                    .unwrap_or_default();
                reply.state_update = Some(StateUpdate {
                    initiation_level: Some(
                        reported
                            .unwrap_or_else(|| bump_initiation_level(level, &request.message))
                            .min(MAX_INITIATION_LEVEL),
                    ),
                    unlocked_topics: unlocked,
                });
                reply
            }
            None => {
                tracing::warn!(
                    backend = self.backend.name(),
                    "Assistant reply was not a sequence"
                );
                AssistantReply {
                    sequence: Sequence::raw_text_fallback(&response.text),
                    state_update: Some(StateUpdate {
                        initiation_level: Some(level.saturating_add(1).min(MAX_INITIATION_LEVEL)),
                        unlocked_topics: Vec::new(),
                    }),
                }
            }
        };
        Ok(reply)
    }
}
