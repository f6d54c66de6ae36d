//! Backend Integration
//!
//! Everything the session talks to over the network sits behind a narrow
//! trait so tests can swap in fakes:
//!
//! - [`LlmBackend`]: raw model access (Ollama by default)
//! - [`ModelFallback`]: plays the server for commands the builtins do not know
//! - [`AssistantBackend`]: the guided assistant persona
//! - [`AgentChat`]: numbered agent channels
//! - [`ScanClient`]: the remote fetch behind `scan` steps
//!
//! # Usage
//!
//! ```ignore
//! use phantom_core::backend::{LlmFallback, OllamaBackend};
//!
//! let backend = OllamaBackend::new("localhost", 11434);
//! let fallback = LlmFallback::new(backend, "llama3.2", "prod-srv-42");
//! ```

mod agent;
mod assistant;
mod fallback;
mod ollama;
mod scan;
mod traits;

use thiserror::Error;

pub use agent::{agent_reply_from_raw, AgentChat, AgentReply, LlmAgentChat};
pub use assistant::{
    bump_initiation_level, AssistantAction, AssistantBackend, AssistantContext,
    AssistantRequest, LlmAssistant, MAX_INITIATION_LEVEL, TOPIC_KEYWORDS,
};
pub use fallback::{FallbackContext, FallbackReply, FallbackRequest, LlmFallback, ModelFallback};
pub use ollama::OllamaBackend;
pub use scan::{HttpScanClient, PendingScan, ScanClient, ScanMetadata, ScanRequest, ScanResult};
pub use traits::{LlmBackend, LlmRequest, LlmResponse};

/// Errors from backend round-trips
#[derive(Debug, Error)]
pub enum BackendError {
    /// No endpoint configured for this backend
    #[error("{0} is not configured")]
    NotConfigured(&'static str),

    /// Transport failure
    #[error("request failed: {0}")]
    Request(String),

    /// Non-success HTTP status
    #[error("backend returned {status}: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body, possibly empty
        body: String,
    },

    /// Response did not have the expected shape
    #[error("malformed response: {0}")]
    Malformed(String),

    /// No answer within the configured time
    #[error("timed out after {0}ms")]
    Timeout(u64),
}

impl BackendError {
    /// Wrap an error raised by an [`LlmBackend`]
    #[must_use]
    pub fn from_llm(error: anyhow::Error) -> Self {
        Self::Request(format!("{error:#}"))
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            return Self::Request(format!("timed out: {error}"));
        }
        Self::Request(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            BackendError::NotConfigured("scan endpoint").to_string(),
            "scan endpoint is not configured"
        );
        assert_eq!(BackendError::Timeout(2500).to_string(), "timed out after 2500ms");
        assert_eq!(
            BackendError::Status {
                status: 502,
                body: "bad gateway".to_string()
            }
            .to_string(),
            "backend returned 502: bad gateway"
        );
    }

    #[test]
    fn test_from_llm_keeps_context_chain() {
        let error = anyhow::anyhow!("connection refused").context("Ollama unreachable");
        let BackendError::Request(message) = BackendError::from_llm(error) else {
            panic!("expected a request error");
        };
        assert_eq!(message, "Ollama unreachable: connection refused");
    }
}
