//! Ollama backend
//!
//! Talks to a local Ollama server through `/api/generate`. Requests are
//! non-streaming: every caller needs the whole reply before it can decide
//! how to render it. The role prompt goes in Ollama's own `system` field;
//! context sections are folded into the prompt ahead of the user's turn.

use std::time::{Duration, Instant};

use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::traits::{LlmBackend, LlmRequest, LlmResponse};

/// `/api/generate` request body
#[derive(Debug, Serialize)]
struct GenerateBody<'a> {
    model: &'a str,
    prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    stream: bool,
    #[serde(skip_serializing_if = "GenerateOptions::is_empty")]
    options: GenerateOptions<'a>,
}

#[derive(Debug, Serialize)]
struct GenerateOptions<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "no_stops")]
    stop: &'a [String],
}

impl GenerateOptions<'_> {
    fn is_empty(&self) -> bool {
        self.temperature.is_none() && self.stop.is_empty()
    }
}

fn no_stops(stop: &&[String]) -> bool {
    stop.is_empty()
}

impl<'a> GenerateBody<'a> {
    fn from_request(request: &'a LlmRequest) -> Self {
        Self {
            model: &request.model,
            prompt: request.user_turn(),
            system: request.system.as_deref(),
            stream: false,
            options: GenerateOptions {
                temperature: request.temperature,
                stop: &request.stop,
            },
        }
    }
}

/// `/api/generate` reply (non-streaming)
#[derive(Debug, Deserialize)]
struct GenerateReply {
    #[serde(default)]
    response: String,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    eval_count: Option<u32>,
}

/// Ollama HTTP client
#[derive(Clone, Debug)]
pub struct OllamaBackend {
    /// `scheme://host:port` without a trailing slash
    base_url: String,
    http_client: reqwest::Client,
}

impl OllamaBackend {
    /// Backend at `host:port` with a two-minute request timeout
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self::with_timeout(host, port, Duration::from_secs(120))
    }

    /// Backend whose requests give up after `timeout`
    ///
    /// `host` may carry its own scheme (`https://gpu-box`); plain host names
    /// get `http://`.
    pub fn with_timeout(host: impl Into<String>, port: u16, timeout: Duration) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Falling back to default HTTP client");
                reqwest::Client::new()
            });
        Self {
            base_url: base_url(&host.into(), port),
            http_client,
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }
}

fn base_url(host: &str, port: u16) -> String {
    let host = host.trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        format!("{host}:{port}")
    } else {
        format!("http://{host}:{port}")
    }
}

#[async_trait]
impl LlmBackend for OllamaBackend {
    fn name(&self) -> &'static str {
        "Ollama"
    }

    async fn send(&self, request: &LlmRequest) -> anyhow::Result<LlmResponse> {
        let started = Instant::now();
        let response = self
            .http_client
            .post(self.endpoint("api/generate"))
            .json(&GenerateBody::from_request(request))
            .send()
            .await
            .with_context(|| format!("contacting Ollama at {}", self.base_url))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            anyhow::bail!("Ollama returned {status}: {}", detail.trim());
        }

        let reply: GenerateReply = response
            .json()
            .await
            .context("decoding Ollama reply")?;

        Ok(LlmResponse {
            text: reply.response,
            model: reply.model.unwrap_or_else(|| request.model.clone()),
            eval_count: reply.eval_count,
            elapsed: started.elapsed(),
        })
    }
}
