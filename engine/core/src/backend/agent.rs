//! Agent chat backend
//!
//! Numbered agents are independent chat channels. Each keeps its own thread;
//! the model sees the recent part of it with every message. Replies may be
//! sequence JSON, but plain prose is the common case and renders as
//! typewriter text.

use async_trait::async_trait;

use super::traits::{LlmBackend, LlmRequest};
use super::BackendError;
use crate::conversation::ConversationThread;
use crate::palette::Tone;
use crate::sequence::{strip_code_fences, AssistantReply, Sequence};
use crate::step::{Step, TextAnimation, TextStep};

const THREAD_WINDOW: usize = 10;

/// What an agent said
#[derive(Clone, Debug, PartialEq)]
pub struct AgentReply {
    /// Sequence to render
    pub sequence: Sequence,
    /// Text recorded in the agent's thread
    pub text: String,
}

/// Numbered agent channels
#[async_trait]
pub trait AgentChat: Send + Sync {
    /// Send `message` to agent `agent_id`, given its prior `thread`
    async fn exchange(
        &self,
        agent_id: u32,
        thread: &ConversationThread,
        message: &str,
    ) -> Result<AgentReply, BackendError>;
}

/// [`AgentChat`] over an [`LlmBackend`]
pub struct LlmAgentChat<B> {
    backend: B,
    model: String,
}

impl<B: LlmBackend> LlmAgentChat<B> {
    /// Agent chat using `model` on `backend`
    pub fn new(backend: B, model: impl Into<String>) -> Self {
        Self {
            backend,
            model: model.into(),
        }
    }

    fn system_prompt(agent_id: u32) -> String {
        format!(
            "You are agent-{agent_id}, an autonomous operator reachable from a remote \
             server terminal. Answer in a few short lines of plain text, no markdown. \
             Stay in character and keep continuity with the conversation so far."
        )
    }
}

/// Turn raw agent output into something renderable
#[must_use]
pub fn agent_reply_from_raw(agent_id: u32, raw: &str) -> AgentReply {
    let text = strip_code_fences(raw).to_string();
    if let Some(reply) = AssistantReply::try_parse(raw) {
        return AgentReply {
            sequence: reply.sequence,
            text,
        };
    }
    let sequence = Sequence::new(
        format!("agent-{agent_id}-reply"),
        vec![Step::Text(
            TextStep::new(format!("[agent-{agent_id}] {text}"))
                .with_animation(TextAnimation::Typewriter)
                .with_tone(Tone::Info)
                .with_interval(15),
        )],
    );
    AgentReply { sequence, text }
}

#[async_trait]
impl<B: LlmBackend> AgentChat for LlmAgentChat<B> {
    async fn exchange(
        &self,
        agent_id: u32,
        thread: &ConversationThread,
        message: &str,
    ) -> Result<AgentReply, BackendError> {
        let mut request = LlmRequest::new(format!("user: {message}"), &self.model)
            .with_system(Self::system_prompt(agent_id));
        if !thread.is_empty() {
            request = request.with_context(thread.transcript(THREAD_WINDOW));
        }

        let response = self
            .backend
            .send(&request)
            .await
            .map_err(BackendError::from_llm)?;

        if response.text.trim().is_empty() {
            return Err(BackendError::Malformed("empty agent reply".to_string()));
        }
        tracing::debug!(agent_id, tokens = ?response.eval_count, "Agent replied");
        Ok(agent_reply_from_raw(agent_id, &response.text))
    }
}
