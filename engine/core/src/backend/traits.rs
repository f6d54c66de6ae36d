//! LLM Backend Traits
//!
//! The shell fallback, the guided assistant and agent chat all reach a model
//! through [`LlmBackend`]. A request is a role prompt, a stack of context
//! sections (working directory, transcript, failed commands) and the user's
//! turn; providers decide how those map onto their API.

use std::time::Duration;

use async_trait::async_trait;

/// One completion request
#[derive(Clone, Debug, Default)]
pub struct LlmRequest {
    /// Backend-specific model identifier
    pub model: String,
    /// Role prompt
    pub system: Option<String>,
    /// Context sections, oldest first
    pub context: Vec<String>,
    /// The user's turn
    pub prompt: String,
    /// Sampling temperature; `None` keeps the model default
    pub temperature: Option<f32>,
    /// Generation stops at any of these strings
    pub stop: Vec<String>,
}

impl LlmRequest {
    /// Request for `prompt` on `model`
    pub fn new(prompt: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            ..Self::default()
        }
    }

    /// Set the role prompt
    #[must_use]
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Add a context section; empty sections are skipped
    #[must_use]
    pub fn with_context(mut self, section: impl Into<String>) -> Self {
        let section = section.into();
        if !section.trim().is_empty() {
            self.context.push(section);
        }
        self
    }

    /// Set the temperature, clamped to 0.0..=1.0
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature.clamp(0.0, 1.0));
        self
    }

    /// Stop generating when the model writes `marker`
    #[must_use]
    pub fn with_stop(mut self, marker: impl Into<String>) -> Self {
        self.stop.push(marker.into());
        self
    }

    /// Context sections separated by blank lines
    #[must_use]
    pub fn context_text(&self) -> String {
        self.context.join("\n\n")
    }

    /// Context followed by the user's turn, for single-prompt APIs
    #[must_use]
    pub fn user_turn(&self) -> String {
        if self.context.is_empty() {
            self.prompt.clone()
        } else {
            format!("{}\n\n{}", self.context_text(), self.prompt)
        }
    }
}

/// A finished completion
#[derive(Clone, Debug)]
pub struct LlmResponse {
    /// Generated text
    pub text: String,
    /// Model that answered
    pub model: String,
    /// Generated token count, when reported
    pub eval_count: Option<u32>,
    /// Wall time of the round-trip
    pub elapsed: Duration,
}

impl LlmResponse {
    /// Response with no usage figures
    pub fn new(text: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            model: model.into(),
            eval_count: None,
            elapsed: Duration::ZERO,
        }
    }
}

/// A language-model provider
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Provider name for logs
    fn name(&self) -> &str;

    /// Run `request` to completion
    async fn send(&self, request: &LlmRequest) -> anyhow::Result<LlmResponse>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_request_builder() {
        let request = LlmRequest::new("$ ls -la", "llama3.2")
            .with_system("shell")
            .with_temperature(1.7)
            .with_stop("\n$ ");

        assert_eq!(request.prompt, "$ ls -la");
        assert_eq!(request.system.as_deref(), Some("shell"));
        assert_eq!(request.temperature, Some(1.0));
        assert_eq!(request.stop, vec!["\n$ ".to_string()]);
    }

    #[test]
    fn test_blank_context_is_skipped() {
        let request = LlmRequest::new("hi", "m").with_context("  ").with_context("cwd: /root");
        assert_eq!(request.context, vec!["cwd: /root".to_string()]);
    }

    #[test]
    fn test_user_turn_layout() {
        let bare = LlmRequest::new("uptime", "m");
        assert_eq!(bare.user_turn(), "uptime");

        let framed = LlmRequest::new("uptime", "m")
            .with_context("cwd: /root")
            .with_context("level: beginner");
        assert_eq!(framed.user_turn(), "cwd: /root\n\nlevel: beginner\n\nuptime");
    }
}
