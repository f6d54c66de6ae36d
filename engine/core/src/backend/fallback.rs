//! Shell model fallback
//!
//! Commands without a builtin handler are shown to a language model that
//! plays the part of the server. A reply that is empty, or is itself the
//! shell's "command not found" line, counts as a miss.

use async_trait::async_trait;
use serde::Serialize;

use super::traits::{LlmBackend, LlmRequest};
use super::BackendError;
use crate::profile::UserLevel;
use crate::sequence::library::not_found_line;
use crate::sequence::strip_code_fences;

/// Context sent with a fallback request
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FallbackContext {
    /// Working directory shown in the prompt
    pub current_directory: String,
    /// Inferred experience level
    pub user_level: UserLevel,
    /// Most recent commands, oldest first
    pub recent_commands: Vec<String>,
}

/// A command the builtins could not resolve
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FallbackRequest {
    /// Full command line
    pub command: String,
    /// Session context
    pub context: FallbackContext,
}

/// What the fallback made of a command
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FallbackReply {
    /// Output to print
    Output(String),
    /// The command does not exist here either
    NotFound,
}

impl FallbackReply {
    /// Classify raw model text for `command`
    #[must_use]
    pub fn classify(command: &str, raw: &str) -> Self {
        let output = strip_code_fences(raw);
        let program = command.split_whitespace().next().unwrap_or(command);
        let miss = output.is_empty()
            || output.eq_ignore_ascii_case(&not_found_line(command))
            || output.eq_ignore_ascii_case(&not_found_line(program));
        if miss {
            Self::NotFound
        } else {
            Self::Output(output.to_string())
        }
    }
}

/// Resolves commands the builtins do not know
#[async_trait]
pub trait ModelFallback: Send + Sync {
    /// Ask the model what `request.command` prints
    async fn resolve(&self, request: &FallbackRequest) -> Result<FallbackReply, BackendError>;
}

/// [`ModelFallback`] over an [`LlmBackend`]
pub struct LlmFallback<B> {
    backend: B,
    model: String,
    hostname: String,
}

impl<B: LlmBackend> LlmFallback<B> {
    /// Fallback using `model` on `backend`, impersonating `hostname`
    pub fn new(backend: B, model: impl Into<String>, hostname: impl Into<String>) -> Self {
        Self {
            backend,
            model: model.into(),
            hostname: hostname.into(),
        }
    }

    fn system_prompt(&self, level: UserLevel) -> String {
        let tone = match level {
            UserLevel::Advanced => {
                "Be terse and technical; include realistic error messages when a command would fail."
            }
            UserLevel::Intermediate => "Use normal Linux output formatting without commentary.",
            UserLevel::Beginner => "Keep output simple and realistic.",
        };
        format!(
            "You are the Ubuntu server `{}`. Reply with exactly what the terminal would print \
             for the command, nothing else: no markdown, no explanations. If the command does \
             not exist, reply with `<command>: command not found`. {tone}",
            self.hostname
        )
    }

    fn context_block(context: &FallbackContext) -> String {
        let recent = if context.recent_commands.is_empty() {
            "none".to_string()
        } else {
            context.recent_commands.join(", ")
        };
        format!(
            "Current directory: {}\nRecent commands: {recent}",
            context.current_directory
        )
    }
}

#[async_trait]
impl<B: LlmBackend> ModelFallback for LlmFallback<B> {
    async fn resolve(&self, request: &FallbackRequest) -> Result<FallbackReply, BackendError> {
        let llm_request = LlmRequest::new(format!("$ {}", request.command), &self.model)
            .with_system(self.system_prompt(request.context.user_level))
            .with_context(Self::context_block(&request.context))
            .with_temperature(0.3)
            .with_stop("\n$ ");

        let response = self
            .backend
            .send(&llm_request)
            .await
            .map_err(BackendError::from_llm)?;

        tracing::debug!(
            backend = self.backend.name(),
            command = %request.command,
            tokens = ?response.eval_count,
            "Model fallback replied"
        );
        Ok(FallbackReply::classify(&request.command, &response.text))
    }
}
