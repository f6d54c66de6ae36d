//! Sequences
//!
//! A [`Sequence`] is an ordered script of [`Step`]s plus the flag deciding
//! whether a cancellation request may cut it short. Sequences come either
//! from the local [`library`] or from a backend reply. Parsing a reply drops
//! unknown tools, and a reply that is not a sequence at all becomes a single
//! typewriter text step.

pub mod library;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::palette::Tone;
use crate::step::{Step, TextAnimation, TextStep};

/// Longest raw reply shown when a backend answer is not a sequence
pub const FALLBACK_TEXT_LIMIT: usize = 500;

/// Errors raised while reading a sequence from JSON
#[derive(Debug, Error)]
pub enum SequenceError {
    /// Input is not valid JSON
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// JSON has no `steps` array
    #[error("sequence has no steps array")]
    MissingSteps,
}

/// Ordered script of steps
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Sequence {
    /// Identifier, used in logs
    #[serde(default = "generated_id")]
    pub id: String,
    /// Whether cancellation may stop the sequence early
    #[serde(default = "default_interruptible")]
    pub interruptible: bool,
    /// Steps, executed strictly in order
    pub steps: Vec<Step>,
    /// Free-form metadata from the producer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

fn generated_id() -> String {
    format!("seq-{}", uuid::Uuid::new_v4())
}

fn default_interruptible() -> bool {
    true
}

impl Sequence {
    /// Interruptible sequence with the given steps
    pub fn new(id: impl Into<String>, steps: Vec<Step>) -> Self {
        Self {
            id: id.into(),
            interruptible: true,
            steps,
            metadata: None,
        }
    }

    /// Set the interruptible flag
    #[must_use]
    pub fn interruptible(mut self, interruptible: bool) -> Self {
        self.interruptible = interruptible;
        self
    }

    /// Attach metadata
    #[must_use]
    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Read a sequence object, skipping steps that fail to parse
    ///
    /// # Errors
    ///
    /// Returns [`SequenceError::MissingSteps`] if `value` has no `steps` array.
    pub fn from_value(value: &Value) -> Result<Self, SequenceError> {
        let raw_steps = value
            .get("steps")
            .and_then(Value::as_array)
            .ok_or(SequenceError::MissingSteps)?;

        let id = value
            .get("id")
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
            .map_or_else(generated_id, str::to_string);

        let mut steps = Vec::with_capacity(raw_steps.len());
        for raw in raw_steps {
            match serde_json::from_value::<Step>(raw.clone()) {
                Ok(step) => steps.push(step),
                Err(e) => {
                    let tool = raw.get("tool").and_then(Value::as_str).unwrap_or("?");
                    tracing::warn!(sequence = %id, tool, error = %e, "Dropping unreadable step");
                }
            }
        }

        Ok(Self {
            id,
            interruptible: value
                .get("interruptible")
                .and_then(Value::as_bool)
                .unwrap_or(true),
            steps,
            metadata: value.get("metadata").cloned(),
        })
    }

    /// Parse sequence JSON text
    ///
    /// # Errors
    ///
    /// Fails on invalid JSON or a missing `steps` array.
    pub fn from_json(text: &str) -> Result<Self, SequenceError> {
        let value: Value = serde_json::from_str(strip_code_fences(text))?;
        Self::from_value(&value)
    }

    /// Single typewriter step showing (a prefix of) `raw`
    #[must_use]
    pub fn raw_text_fallback(raw: &str) -> Self {
        let content: String = raw.trim().chars().take(FALLBACK_TEXT_LIMIT).collect();
        Self::new(
            format!("fallback-{}", chrono::Utc::now().timestamp_millis()),
            vec![Step::Text(
                TextStep::new(content)
                    .with_animation(TextAnimation::Typewriter)
                    .with_tone(Tone::Normal)
                    .with_interval(20),
            )],
        )
    }
}

/// Assistant state carried alongside a reply
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateUpdate {
    /// New initiation level (0 to 100)
    #[serde(default)]
    pub initiation_level: Option<u8>,
    /// Topics the user has unlocked
    #[serde(default)]
    pub unlocked_topics: Vec<String>,
}

/// A backend reply: what to render plus optional state changes
#[derive(Clone, Debug, PartialEq)]
pub struct AssistantReply {
    /// Sequence to render
    pub sequence: Sequence,
    /// State changes requested by the backend
    pub state_update: Option<StateUpdate>,
}

impl AssistantReply {
    /// Reply without state changes
    #[must_use]
    pub fn from_sequence(sequence: Sequence) -> Self {
        Self {
            sequence,
            state_update: None,
        }
    }

    /// Interpret raw model output
    ///
    /// Accepts `{"sequence": {...}, "stateUpdate": {...}}` or a bare sequence
    /// object, optionally wrapped in a markdown code fence. Anything else turns
    /// into [`Sequence::raw_text_fallback`]; this never fails.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        Self::try_parse(raw).unwrap_or_else(|| {
            Self::from_sequence(Sequence::raw_text_fallback(strip_code_fences(raw)))
        })
    }

    /// Like [`AssistantReply::parse`], but `None` when `raw` holds no sequence
    #[must_use]
    pub fn try_parse(raw: &str) -> Option<Self> {
        let cleaned = strip_code_fences(raw);
        let Ok(value) = serde_json::from_str::<Value>(cleaned) else {
            tracing::debug!("Reply is not JSON, rendering as text");
            return None;
        };

        let sequence_value = value.get("sequence").unwrap_or(&value);
        match Sequence::from_value(sequence_value) {
            Ok(sequence) => Some(Self {
                sequence,
                state_update: value
                    .get("stateUpdate")
                    .and_then(|v| serde_json::from_value(v.clone()).ok()),
            }),
            Err(e) => {
                tracing::warn!(error = %e, "Reply has no usable sequence, rendering as text");
                None
            }
        }
    }
}

/// Strip a surrounding markdown code fence (with or without a language tag)
#[must_use]
pub fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = rest.split_once('\n').map_or("", |(_, body)| body);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step::StatusKind;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults_applied() {
        let sequence = Sequence::from_json(r#"{"steps":[{"tool":"wait","duration":5}]}"#).unwrap();
        assert!(sequence.interruptible);
        assert!(sequence.id.starts_with("seq-"));
        assert_eq!(sequence.steps, vec![Step::wait(5)]);
    }

    #[test]
    fn test_unknown_steps_dropped_in_order() {
        let sequence = Sequence::from_json(
            r#"{"id":"s","interruptible":false,"steps":[
                {"tool":"status","type":"ok","text":"a"},
                {"tool":"hologram","text":"?"},
                {"tool":"wait","duration":10}
            ]}"#,
        )
        .unwrap();
        assert_eq!(sequence.id, "s");
        assert!(!sequence.interruptible);
        assert_eq!(
            sequence.steps,
            vec![Step::status(StatusKind::Ok, "a"), Step::wait(10)]
        );
    }

    #[test]
    fn test_missing_steps_is_error() {
        assert!(matches!(
            Sequence::from_json(r#"{"id":"x"}"#),
            Err(SequenceError::MissingSteps)
        ));
    }

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```\n{}\n```\n"), "{}");
        assert_eq!(strip_code_fences("  {}  "), "{}");
    }

    #[test]
    fn test_reply_with_state_update() {
        let reply = AssistantReply::parse(
            "```json\n{\"sequence\":{\"steps\":[{\"tool\":\"text\",\"content\":\"hi\"}]},\
             \"stateUpdate\":{\"initiationLevel\":42,\"unlockedTopics\":[\"hex\"]}}\n```",
        );
        assert_eq!(reply.sequence.steps, vec![Step::text("hi")]);
        let update = reply.state_update.unwrap();
        assert_eq!(update.initiation_level, Some(42));
        assert_eq!(update.unlocked_topics, vec!["hex".to_string()]);
    }

    #[test]
    fn test_plain_text_reply_becomes_typewriter() {
        let raw = "x".repeat(800);
        let reply = AssistantReply::parse(&raw);
        let [Step::Text(text)] = reply.sequence.steps.as_slice() else {
            panic!("expected one text step");
        };
        assert_eq!(text.animation, TextAnimation::Typewriter);
        assert_eq!(text.char_interval_ms, 20);
        assert_eq!(text.content.chars().count(), FALLBACK_TEXT_LIMIT);
        assert!(reply.sequence.interruptible);
    }

    #[test]
    fn test_json_without_sequence_falls_back() {
        let reply = AssistantReply::parse(r#"{"answer":"42"}"#);
        assert_eq!(reply.sequence.steps.len(), 1);
        assert!(reply.state_update.is_none());
    }

    #[test]
    fn test_try_parse_rejects_plain_text() {
        assert!(AssistantReply::try_parse("just words").is_none());
        assert!(AssistantReply::try_parse(r#"{"steps":[]}"#).is_some());
    }
}
