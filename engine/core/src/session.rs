//! Session - the shell's orchestration core
//!
//! A [`Session`] owns everything that lives as long as the login: the
//! current [`SessionMode`], the [`FailureTally`], the working directory and
//! the collaborators (interpreter, store, builtins, model backends).
//!
//! # Flow
//!
//! ```text
//! submit(line)
//!   -> echo prompt + line
//!   -> mode::dispatch (pure)        -> Transition { next, action }
//!   -> persist next mode
//!   -> carry out action             -> builtin | model fallback | chat backend
//!   -> Sequence                     -> Interpreter -> OutputSink
//! ```
//!
//! The session is surface-agnostic: it writes lines to whatever
//! [`OutputSink`] it is handed and reports what the surface itself must do
//! (quit, show the file manager) through [`SubmitOutcome`]. Backend and
//! storage failures are logged and rendered, never returned.

use std::sync::Arc;

use crate::backend::{
    AgentChat, AssistantAction, AssistantBackend, AssistantContext, AssistantRequest,
    FallbackContext, FallbackReply, FallbackRequest, ModelFallback,
};
use crate::cancel::CancellationToken;
use crate::commands::{CommandOutput, CommandRegistry, ParsedCommand};
use crate::conversation::{AssistantState, ConversationThread};
use crate::interpreter::{Interpreter, RunOutcome};
use crate::mode::{self, Action, Keywords, SessionMode, Signal};
use crate::palette::{Tone, CANCEL_MARKER};
use crate::profile::{self, ActivityKind};
use crate::sequence::library;
use crate::sequence::Sequence;
use crate::sink::OutputSink;
use crate::store::{keys, KeyValueStore, StoreError, StoreExt};
use crate::tally::{FailureTally, DEFAULT_HELP_THRESHOLD};

/// Shell misses kept as assistant context
const FAILED_COMMANDS_KEPT: usize = 5;

// ============================================================================
// Configuration
// ============================================================================

/// Session settings
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionConfig {
    /// Host name shown in the prompt
    pub hostname: String,
    /// User name shown in the prompt
    pub username: String,
    /// Starting directory when none is stored
    pub home_dir: String,
    /// Consecutive misses before help is offered
    pub help_threshold: u32,
    /// Commands sent as model fallback context
    pub recent_commands: usize,
    /// Mode keywords
    pub keywords: Keywords,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            hostname: "prod-srv-42".to_string(),
            username: "root".to_string(),
            home_dir: "/root".to_string(),
            help_threshold: DEFAULT_HELP_THRESHOLD,
            recent_commands: 10,
            keywords: Keywords::default(),
        }
    }
}

/// Collaborators a session talks to
#[derive(Clone)]
pub struct Services {
    /// Renders sequences
    pub interpreter: Interpreter,
    /// Persistent state
    pub store: Arc<dyn KeyValueStore>,
    /// Plays the server for unknown commands
    pub fallback: Arc<dyn ModelFallback>,
    /// Guided assistant persona
    pub assistant: Arc<dyn AssistantBackend>,
    /// Numbered agent channels
    pub agents: Arc<dyn AgentChat>,
}

/// What the surface must do after a submit or signal
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Keep reading input
    Continue,
    /// A sequence was cut short by cancellation
    Aborted,
    /// Quit the surface
    Logout,
    /// Show the file manager until it signals exit
    OpenFileManager,
    /// Cancel the action in flight (the session did nothing)
    CancelInFlight,
}

impl From<RunOutcome> for SubmitOutcome {
    fn from(outcome: RunOutcome) -> Self {
        match outcome {
            RunOutcome::Completed => Self::Continue,
            RunOutcome::Aborted => Self::Aborted,
        }
    }
}

// ============================================================================
// Session
// ============================================================================

/// One login's worth of state
pub struct Session {
    config: SessionConfig,
    services: Services,
    registry: CommandRegistry,
    mode: SessionMode,
    tally: FailureTally,
    cwd: String,
}

impl Session {
    /// Session restoring mode, tally and directory from the store
    ///
    /// A stored file-manager mode comes back as the shell: the file manager
    /// screen does not survive a restart.
    pub fn new(config: SessionConfig, services: Services) -> Self {
        let store = services.store.as_ref();
        let mode = match store.get_json::<SessionMode>(keys::MODE) {
            Some(SessionMode::FileManager) | None => SessionMode::Shell,
            Some(mode) => mode,
        };
        let tally = FailureTally::load(store);
        let cwd = store
            .get_json::<String>(keys::CURRENT_DIR)
            .unwrap_or_else(|| config.home_dir.clone());
        let registry = CommandRegistry::with_builtins(
            &config.hostname,
            &config.username,
            Arc::clone(&services.store),
        );
        tracing::info!(%mode, count = tally.count, "Session restored");

        Self {
            config,
            services,
            registry,
            mode,
            tally,
            cwd,
        }
    }

    /// Replace the builtin table
    #[must_use]
    pub fn with_registry(mut self, registry: CommandRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Current mode
    #[must_use]
    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    /// Current failure tally
    #[must_use]
    pub fn tally(&self) -> FailureTally {
        self.tally
    }

    /// Working directory
    #[must_use]
    pub fn cwd(&self) -> &str {
        &self.cwd
    }

    /// Settings
    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Prompt for the current mode
    #[must_use]
    pub fn prompt(&self) -> String {
        mode::prompt(
            self.mode,
            &self.config.username,
            &self.config.hostname,
            &self.cwd,
        )
    }

    /// Render `sequence` outside any user command (banners)
    pub async fn show(
        &self,
        sequence: &Sequence,
        token: &CancellationToken,
        sink: &mut dyn OutputSink,
    ) -> RunOutcome {
        self.services.interpreter.run(sequence, token, sink).await
    }

    /// Handle one submitted line
    pub async fn submit(
        &mut self,
        line: &str,
        token: &CancellationToken,
        sink: &mut dyn OutputSink,
    ) -> SubmitOutcome {
        let transition = mode::dispatch(self.mode, line, &self.config.keywords);
        if transition.action == Action::Suppressed {
            tracing::debug!("Input suppressed while the file manager is open");
            return SubmitOutcome::Continue;
        }

        let trimmed = line.trim();
        let echo = if trimmed.is_empty() {
            self.prompt()
        } else {
            format!("{} {trimmed}", self.prompt())
        };
        sink.append_line(&echo);

        if self.mode == SessionMode::Shell && !trimmed.is_empty() {
            self.record_shell_line(trimmed);
        }

        tracing::debug!(mode = %self.mode, action = ?transition.action, "Dispatched line");
        self.set_mode(transition.next);
        self.perform(transition.action, token, sink).await
    }

    /// Handle an out-of-band signal
    ///
    /// `in_flight` tells whether an action is still running; in that case the
    /// caller cancels it and the session is left untouched.
    pub async fn signal(
        &mut self,
        signal: Signal,
        in_flight: bool,
        sink: &mut dyn OutputSink,
    ) -> SubmitOutcome {
        let transition = mode::dispatch_signal(self.mode, signal, in_flight);
        tracing::debug!(mode = %self.mode, ?signal, action = ?transition.action, "Dispatched signal");
        let prompt = self.prompt();
        self.set_mode(transition.next);

        match transition.action {
            Action::AbortInFlight => SubmitOutcome::CancelInFlight,
            Action::InterruptShell => {
                sink.append_line(&format!("{prompt} {CANCEL_MARKER}"));
                SubmitOutcome::Continue
            }
            Action::InterruptChat => {
                let token = CancellationToken::new();
                self.play(&library::chat_interrupted(), &token, sink).await.into()
            }
            Action::LeaveFileManager => {
                tracing::info!("File manager closed");
                SubmitOutcome::Continue
            }
            _ => SubmitOutcome::Continue,
        }
    }

    // ========================================================================
    // Actions
    // ========================================================================

    async fn perform(
        &mut self,
        action: Action,
        token: &CancellationToken,
        sink: &mut dyn OutputSink,
    ) -> SubmitOutcome {
        match action {
            Action::Ignore | Action::Suppressed => SubmitOutcome::Continue,
            Action::Clear => {
                sink.clear();
                SubmitOutcome::Continue
            }
            Action::Logout => {
                tracing::info!("Logout requested");
                SubmitOutcome::Logout
            }
            Action::RunCommand(parsed) => self.run_command(&parsed, token, sink).await,
            Action::EnterFileManager => SubmitOutcome::OpenFileManager,
            Action::ConnectAgent(agent_id) => {
                let thread = self.load_thread(agent_id);
                self.play(&library::agent_connected(agent_id, thread.len()), token, sink)
                    .await
                    .into()
            }
            Action::AgentUsage(usage) => {
                sink.append_line(&Tone::Warning.paint(&usage));
                SubmitOutcome::Continue
            }
            Action::DisconnectAgent(agent_id) => self
                .play(&library::agent_disconnected(agent_id), token, sink)
                .await
                .into(),
            Action::ForwardToAgent { agent_id, message } => {
                self.talk_to_agent(agent_id, &message, token, sink).await
            }
            Action::EnterAssistant => {
                self.tally.reset();
                self.persist("failure tally", self.tally.save(self.store()));
                self.exchange_with_assistant(AssistantAction::Welcome, "", token, sink)
                    .await
            }
            Action::ForwardToAssistant(message) => {
                self.exchange_with_assistant(AssistantAction::Message, &message, token, sink)
                    .await
            }
            Action::AssistantHelp => self
                .play(&library::assistant_help(), token, sink)
                .await
                .into(),
            Action::ExitAssistant => self
                .play(
                    &library::assistant_exit(&self.config.keywords.assistant),
                    token,
                    sink,
                )
                .await
                .into(),
            Action::LeaveFileManager
            | Action::AbortInFlight
            | Action::InterruptChat
            | Action::InterruptShell => SubmitOutcome::Continue,
        }
    }

    async fn run_command(
        &mut self,
        parsed: &ParsedCommand,
        token: &CancellationToken,
        sink: &mut dyn OutputSink,
    ) -> SubmitOutcome {
        if let Some(handler) = self.registry.lookup(&parsed.command) {
            match handler.run(parsed, &self.cwd).await {
                Ok(CommandOutput::Clear) => sink.clear(),
                Ok(output) => {
                    let lines = output.into_lines();
                    self.log(ActivityKind::Output, &lines.join("\n"));
                    for line in &lines {
                        sink.append_line(line);
                    }
                }
                Err(e) => {
                    tracing::debug!(command = %parsed.command, error = %e, "Builtin failed");
                    sink.append_line(&format!("Error: {e}"));
                    return SubmitOutcome::Continue;
                }
            }
            self.command_resolved();
            return SubmitOutcome::Continue;
        }

        let request = FallbackRequest {
            command: parsed.raw.clone(),
            context: self.fallback_context(),
        };
        match self.services.fallback.resolve(&request).await {
            Ok(FallbackReply::Output(text)) => {
                self.log(ActivityKind::Output, &text);
                for line in text.split('\n') {
                    sink.append_line(line);
                }
                self.command_resolved();
                SubmitOutcome::Continue
            }
            Ok(FallbackReply::NotFound) => self.command_missed(parsed, token, sink).await,
            Err(e) => {
                tracing::warn!(command = %parsed.command, error = %e, "Model fallback failed");
                self.play(&library::command_not_found(&parsed.command), token, sink)
                    .await
                    .into()
            }
        }
    }

    async fn command_missed(
        &mut self,
        parsed: &ParsedCommand,
        token: &CancellationToken,
        sink: &mut dyn OutputSink,
    ) -> SubmitOutcome {
        let outcome = self
            .play(&library::command_not_found(&parsed.command), token, sink)
            .await;

        let mut failed: Vec<String> = self
            .store()
            .get_json(keys::FAILED_COMMANDS)
            .unwrap_or_default();
        failed.push(parsed.raw.clone());
        if failed.len() > FAILED_COMMANDS_KEPT {
            failed.drain(..failed.len() - FAILED_COMMANDS_KEPT);
        }
        self.persist(
            "failed commands",
            self.store().set_json(keys::FAILED_COMMANDS, &failed),
        );

        let offer = self.tally.record_miss(self.config.help_threshold);
        self.persist("failure tally", self.tally.save(self.store()));
        tracing::debug!(count = self.tally.count, offer, "Shell miss");

        if offer {
            let help = library::help_offer(self.tally.count, &self.config.keywords.assistant);
            return self.play(&help, token, sink).await.into();
        }
        outcome.into()
    }

    fn command_resolved(&mut self) {
        if self.tally.count > 0 {
            self.tally.record_success();
            self.persist("failure tally", self.tally.save(self.store()));
        }
    }

    async fn talk_to_agent(
        &mut self,
        agent_id: u32,
        message: &str,
        token: &CancellationToken,
        sink: &mut dyn OutputSink,
    ) -> SubmitOutcome {
        let mut thread = self.load_thread(agent_id);
        self.log(ActivityKind::Agent, &format!("agent-{agent_id} <- {message}"));

        let sequence = match self.services.agents.exchange(agent_id, &thread, message).await {
            Ok(reply) => {
                thread.push_user(message);
                thread.push_assistant(reply.text.as_str());
                self.persist(
                    "agent thread",
                    self.store().set_json(&keys::agent(agent_id), &thread),
                );
                reply.sequence
            }
            Err(e) => {
                tracing::warn!(agent_id, error = %e, "Agent exchange failed");
                library::backend_unavailable()
            }
        };
        self.play(&sequence, token, sink).await.into()
    }

    async fn exchange_with_assistant(
        &mut self,
        action: AssistantAction,
        message: &str,
        token: &CancellationToken,
        sink: &mut dyn OutputSink,
    ) -> SubmitOutcome {
        let mut state: AssistantState = self.store().get_json(keys::ASSISTANT).unwrap_or_default();
        let context = AssistantContext {
            failed_commands: self
                .store()
                .get_json(keys::FAILED_COMMANDS)
                .unwrap_or_default(),
            session_history_summary: profile::activity_summary(self.store()),
            conversation_history: state.conversation.recent(5).to_vec(),
            initiation_level: state.initiation_level,
        };
        let request = AssistantRequest {
            message: message.to_string(),
            action,
            context,
        };

        let sequence = match self.services.assistant.exchange(&request).await {
            Ok(reply) => {
                if let Some(update) = &reply.state_update {
                    state.apply(update.initiation_level, &update.unlocked_topics);
                }
                if action == AssistantAction::Message {
                    state.conversation.push_user(message);
                    state.conversation.push_assistant(summarize(&reply.sequence));
                    self.log(ActivityKind::Agent, &format!("agq <- {message}"));
                }
                self.persist("assistant state", self.store().set_json(keys::ASSISTANT, &state));
                reply.sequence
            }
            Err(e) => {
                tracing::warn!(?action, error = %e, "Assistant exchange failed");
                library::backend_unavailable()
            }
        };
        self.play(&sequence, token, sink).await.into()
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    async fn play(
        &self,
        sequence: &Sequence,
        token: &CancellationToken,
        sink: &mut dyn OutputSink,
    ) -> RunOutcome {
        self.services.interpreter.run(sequence, token, sink).await
    }

    fn store(&self) -> &dyn KeyValueStore {
        self.services.store.as_ref()
    }

    fn set_mode(&mut self, next: SessionMode) {
        if next == self.mode {
            return;
        }
        tracing::info!(from = %self.mode, to = %next, "Mode transition");
        self.mode = next;
        self.persist("mode", self.store().set_json(keys::MODE, &next));
    }

    fn record_shell_line(&mut self, line: &str) {
        self.log(ActivityKind::Command, line);
        match profile::record_history(self.store(), line) {
            Ok(history) => {
                let result = profile::refresh_user_level(self.store(), &history);
                self.persist("user level", result.map(|_| ()));
            }
            Err(e) => self.persist("history", Err(e)),
        }
    }

    fn fallback_context(&self) -> FallbackContext {
        let history = profile::load_history(self.store());
        let start = history.len().saturating_sub(self.config.recent_commands);
        FallbackContext {
            current_directory: self.cwd.clone(),
            user_level: self
                .store()
                .get_json(keys::USER_LEVEL)
                .unwrap_or_default(),
            recent_commands: history[start..].to_vec(),
        }
    }

    fn load_thread(&self, agent_id: u32) -> ConversationThread {
        self.store()
            .get_json(&keys::agent(agent_id))
            .unwrap_or_default()
    }

    fn log(&self, kind: ActivityKind, content: &str) {
        self.persist("activity log", profile::log_activity(self.store(), kind, content));
    }

    #[allow(clippy::unused_self)]
    fn persist(&self, what: &str, result: Result<(), StoreError>) {
        if let Err(e) = result {
            tracing::warn!(what, error = %e, "Failed to persist session state");
        }
    }
}

/// Plain text of a sequence's text steps, for conversation history
fn summarize(sequence: &Sequence) -> String {
    sequence
        .steps
        .iter()
        .filter_map(|step| match step {
            crate::step::Step::Text(text) => Some(text.content.as_str()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{
        AgentReply, BackendError, PendingScan, ScanClient, ScanRequest, ScanResult,
    };
    use crate::clock::VirtualClock;
    use crate::device::LoggingDevice;
    use crate::sequence::AssistantReply;
    use crate::sink::Scrollback;
    use crate::store::MemoryStore;
    use crate::step::Step;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;

    struct NoScan;

    impl ScanClient for NoScan {
        fn start(&self, _request: ScanRequest) -> Box<dyn PendingScan> {
            Box::new(Never)
        }
    }

    struct Never;

    impl PendingScan for Never {
        fn poll_settled(&mut self) -> Option<Result<ScanResult, BackendError>> {
            None
        }
    }

    /// Knows `uptime`, fails on `boom`, misses everything else
    struct ScriptedFallback;

    #[async_trait]
    impl ModelFallback for ScriptedFallback {
        async fn resolve(&self, request: &FallbackRequest) -> Result<FallbackReply, BackendError> {
            match request.command.as_str() {
                "uptime" => Ok(FallbackReply::Output(" 10:00 up 3 days".to_string())),
                "boom" => Err(BackendError::Request("offline".to_string())),
                _ => Ok(FallbackReply::NotFound),
            }
        }
    }

    #[derive(Default)]
    struct RecordingAssistant {
        requests: Mutex<Vec<AssistantRequest>>,
    }

    #[async_trait]
    impl AssistantBackend for RecordingAssistant {
        async fn exchange(
            &self,
            request: &AssistantRequest,
        ) -> Result<AssistantReply, BackendError> {
            self.requests.lock().push(request.clone());
            Ok(AssistantReply::from_sequence(Sequence::new(
                "reply",
                vec![Step::text(format!("re: {}", request.message))],
            )))
        }
    }

    struct EchoAgents;

    #[async_trait]
    impl AgentChat for EchoAgents {
        async fn exchange(
            &self,
            agent_id: u32,
            thread: &ConversationThread,
            message: &str,
        ) -> Result<AgentReply, BackendError> {
            let text = format!("{agent_id}:{}:{message}", thread.len());
            Ok(AgentReply {
                sequence: Sequence::new("agent", vec![Step::text(text.clone())]),
                text,
            })
        }
    }

    struct Harness {
        session: Session,
        assistant: Arc<RecordingAssistant>,
        store: Arc<MemoryStore>,
        sink: Scrollback,
    }

    fn harness() -> Harness {
        let store = Arc::new(MemoryStore::new());
        let assistant = Arc::new(RecordingAssistant::default());
        let interpreter = Interpreter::new(
            Arc::new(VirtualClock::new()),
            Arc::new(LoggingDevice),
            Arc::new(NoScan),
        );
        let services = Services {
            interpreter,
            store: store.clone(),
            fallback: Arc::new(ScriptedFallback),
            assistant: assistant.clone(),
            agents: Arc::new(EchoAgents),
        };
        Harness {
            session: Session::new(SessionConfig::default(), services),
            assistant,
            store,
            sink: Scrollback::new(),
        }
    }

    impl Harness {
        async fn submit(&mut self, line: &str) -> SubmitOutcome {
            let token = CancellationToken::new();
            self.session.submit(line, &token, &mut self.sink).await
        }

        fn lines(&self) -> Vec<String> {
            self.sink.snapshot()
        }
    }

    #[tokio::test]
    async fn test_builtin_echoes_prompt_and_output() {
        let mut h = harness();
        assert_eq!(h.submit("pwd").await, SubmitOutcome::Continue);
        assert_eq!(h.lines(), vec!["root@prod-srv-42:~# pwd", "/root"]);
        assert_eq!(profile::load_history(h.store.as_ref()), vec!["pwd"]);
    }

    #[tokio::test]
    async fn test_fallback_output_is_printed() {
        let mut h = harness();
        h.submit("uptime").await;
        assert_eq!(h.lines(), vec!["root@prod-srv-42:~# uptime", " 10:00 up 3 days"]);
    }

    #[tokio::test]
    async fn test_three_misses_offer_help_once() {
        let mut h = harness();
        h.submit("frob").await;
        h.submit("frob").await;
        assert!(!h.lines().iter().any(|l| l.contains("[AGQ]")));

        h.submit("frob").await;
        let offers = h.lines().iter().filter(|l| l.contains("[AGQ]")).count();
        assert_eq!(offers, 1);
        assert!(h.session.tally().already_prompted);

        h.submit("frob").await;
        let offers = h.lines().iter().filter(|l| l.contains("[AGQ]")).count();
        assert_eq!(offers, 1);
        assert_eq!(h.session.tally().count, 4);
    }

    #[tokio::test]
    async fn test_fallback_failure_renders_not_found_without_counting() {
        let mut h = harness();
        h.submit("boom").await;
        assert_eq!(h.lines().last().map(String::as_str), Some("boom: command not found"));
        assert_eq!(h.session.tally().count, 0);
    }

    #[tokio::test]
    async fn test_resolved_command_resets_count() {
        let mut h = harness();
        h.submit("frob").await;
        h.submit("frob").await;
        h.submit("uptime").await;
        assert_eq!(h.session.tally().count, 0);
    }

    #[tokio::test]
    async fn test_builtin_error_is_inline() {
        let mut h = harness();
        h.submit("hostname other").await;
        assert_eq!(
            h.lines().last().map(String::as_str),
            Some("Error: hostname: you must be root to change the host name")
        );
        assert_eq!(h.session.mode(), SessionMode::Shell);
    }

    #[tokio::test]
    async fn test_assistant_entry_resets_tally_and_welcomes() {
        let mut h = harness();
        for _ in 0..3 {
            h.submit("frob").await;
        }
        h.submit("agq").await;

        assert_eq!(h.session.mode(), SessionMode::GuidedAssistant);
        assert_eq!(h.session.tally(), FailureTally::default());
        let requests = h.assistant.requests.lock().clone();
        assert_eq!(requests[0].action, AssistantAction::Welcome);
        assert_eq!(requests[0].context.failed_commands, vec!["frob"; 3]);
        assert_eq!(h.session.prompt(), "agq>");
    }

    #[tokio::test]
    async fn test_assistant_forwarding_and_exit() {
        let mut h = harness();
        h.submit("agq").await;
        h.submit("what is this place").await;
        assert_eq!(h.lines().last().map(String::as_str), Some("re: what is this place"));

        let state: AssistantState = h.store.get_json(keys::ASSISTANT).unwrap();
        assert_eq!(state.conversation.len(), 2);

        h.submit("exit").await;
        assert_eq!(h.session.mode(), SessionMode::Shell);
        assert!(h.lines().iter().any(|l| l.contains("Disconnected")));
    }

    #[tokio::test]
    async fn test_agent_chat_keeps_thread() {
        let mut h = harness();
        h.submit("agent 7").await;
        assert_eq!(h.session.mode(), SessionMode::AgentChat { agent_id: 7 });
        h.submit("ping").await;
        h.submit("ping").await;
        assert_eq!(h.lines().last().map(String::as_str), Some("7:2:ping"));

        h.submit("disconnect").await;
        assert_eq!(h.session.mode(), SessionMode::Shell);
        let thread: ConversationThread = h.store.get_json(&keys::agent(7)).unwrap();
        assert_eq!(thread.len(), 4);
    }

    #[tokio::test]
    async fn test_agent_without_id_prints_usage() {
        let mut h = harness();
        h.submit("agent x").await;
        assert_eq!(h.session.mode(), SessionMode::Shell);
        assert!(h.lines().last().unwrap().contains("Usage: agent <id>"));
    }

    #[tokio::test]
    async fn test_file_manager_round_trip() {
        let mut h = harness();
        assert_eq!(h.submit("mc").await, SubmitOutcome::OpenFileManager);
        let before = h.lines().len();
        h.submit("ls").await;
        assert_eq!(h.lines().len(), before);

        h.session
            .signal(Signal::FileManagerExit, false, &mut h.sink)
            .await;
        assert_eq!(h.session.mode(), SessionMode::Shell);
    }

    #[tokio::test]
    async fn test_idle_interrupts() {
        let mut h = harness();
        h.session.signal(Signal::Interrupt, false, &mut h.sink).await;
        assert_eq!(
            h.lines().last().map(String::as_str),
            Some("root@prod-srv-42:~# {{c:33}}^C{{c:0}}")
        );

        h.submit("agent 2").await;
        let outcome = h.session.signal(Signal::Interrupt, true, &mut h.sink).await;
        assert_eq!(outcome, SubmitOutcome::CancelInFlight);
        assert_eq!(h.session.mode(), SessionMode::AgentChat { agent_id: 2 });

        h.session.signal(Signal::Interrupt, false, &mut h.sink).await;
        assert_eq!(h.session.mode(), SessionMode::Shell);
        assert!(h.lines().last().unwrap().contains("interrupted"));
    }

    #[tokio::test]
    async fn test_clear_and_logout() {
        let mut h = harness();
        h.submit("pwd").await;
        h.submit("clear").await;
        assert!(h.sink.is_empty());
        assert_eq!(h.submit("exit").await, SubmitOutcome::Logout);
    }

    #[tokio::test]
    async fn test_mode_is_restored() {
        let mut h = harness();
        h.submit("agent 5").await;
        let services = h.session.services.clone();
        let restored = Session::new(SessionConfig::default(), services);
        assert_eq!(restored.mode(), SessionMode::AgentChat { agent_id: 5 });
    }
}
