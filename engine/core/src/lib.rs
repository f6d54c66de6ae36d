//! Phantom Core - Headless engine for phantom-shell
//!
//! phantom-shell emulates a remote Linux login. Every piece of output is a
//! declarative [`Sequence`] of [`Step`]s rendered by the [`Interpreter`];
//! every line of input is routed by the pure [`mode::dispatch`] function.
//! Nothing in this crate touches a terminal, so the same engine can drive
//! the ratatui surface, a test harness, or anything else that implements
//! [`OutputSink`].
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                         Surface (TUI)                            │
//! │     keys ──► submit / signal          OutputSink ◄── lines       │
//! └───────────────┬───────────────────────────▲──────────────────────┘
//!                 │                           │
//! ┌───────────────┼───────────────────────────┼──────────────────────┐
//! │               ▼          PHANTOM CORE     │                      │
//! │  ┌─────────────────────┐      ┌───────────┴──────────────┐       │
//! │  │       Session       │      │       Interpreter        │       │
//! │  │ ┌──────┐ ┌────────┐ │ Seq  │ ┌──────────┐ ┌─────────┐ │       │
//! │  │ │ mode │ │ tally  │ ├─────►│ │scheduler │ │  clock  │ │       │
//! │  │ └──────┘ └────────┘ │      │ └──────────┘ └─────────┘ │       │
//! │  └──┬──────────┬───────┘      └──────────────────────────┘       │
//! │     │          │                                                 │
//! │  ┌──▼────┐  ┌──▼──────────────────────────────┐                  │
//! │  │ store │  │ backends: fallback, assistant,  │                  │
//! │  │       │  │ agents, scan (Ollama / HTTP)    │                  │
//! │  └───────┘  └─────────────────────────────────┘                  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Module Overview
//!
//! - [`step`]: The closed set of renderable steps
//! - [`sequence`]: Sequences, reply parsing and the canned sequence library
//! - [`interpreter`]: Frame scheduler and step renderers
//! - [`clock`]: Injectable time source (system or virtual)
//! - [`cancel`]: Cooperative cancellation tokens and the one-action gate
//! - [`sink`]: Output sinks and the bounded scrollback
//! - [`mode`]: Session modes and the pure input dispatcher
//! - [`session`]: Orchestration of one login
//! - [`tally`]: Consecutive-miss counter with a one-time help offer
//! - [`commands`]: Tokenizer and builtin commands
//! - [`backend`]: Model fallback, assistant, agent and scan clients
//! - [`store`]: Typed key-value persistence
//! - [`profile`]: Command history, user level and activity log
//! - [`conversation`]: Chat threads and assistant progress
//! - [`config`]: TOML and environment configuration
//!
//! # No TUI Dependencies
//!
//! This crate has **zero** dependencies on ratatui or crossterm.

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod backend;
pub mod cancel;
pub mod clock;
pub mod commands;
pub mod config;
pub mod conversation;
pub mod device;
pub mod interpreter;
pub mod mode;
pub mod palette;
pub mod profile;
pub mod sequence;
pub mod session;
pub mod sink;
pub mod step;
pub mod store;
pub mod tally;

// Re-exports for convenience
pub use backend::{
    AgentChat, AssistantBackend, BackendError, HttpScanClient, LlmAgentChat, LlmAssistant,
    LlmBackend, LlmFallback, ModelFallback, OllamaBackend, ScanClient,
};
pub use cancel::{ActionGate, ActionTicket, CancellationToken};
pub use clock::{Clock, SystemClock, VirtualClock};
pub use commands::{CommandHandler, CommandRegistry, ParsedCommand};
pub use config::{
    default_config_path, load_config, load_config_from_path, ConfigError, ConfigOverrides,
    ConfigSource, PhantomConfig,
};
pub use conversation::{AssistantState, ConversationThread};
pub use device::{AmbientDevice, LoggingDevice};
pub use interpreter::{Interpreter, InterpreterConfig, RunOutcome, ScanPacing};
pub use mode::{dispatch, dispatch_signal, Action, Keywords, SessionMode, Signal, Transition};
pub use sequence::{AssistantReply, Sequence, SequenceError};
pub use session::{Services, Session, SessionConfig, SubmitOutcome};
pub use sink::{OutputSink, Scrollback, SharedScrollback};
pub use step::Step;
pub use store::{FileStore, KeyValueStore, MemoryStore, StoreError, StoreExt};
pub use tally::FailureTally;
