//! End-to-end scenarios for the shell core
//!
//! Each test drives the public API the way a surface would: sequences through
//! the interpreter, lines through a session, with a virtual clock so timing is
//! exact and nothing sleeps.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use pretty_assertions::assert_eq;

use phantom_core::backend::{
    AgentReply, BackendError, FallbackReply, FallbackRequest, PendingScan, ScanMetadata,
    ScanRequest, ScanResult,
};
use phantom_core::palette::CANCEL_MARKER;
use phantom_core::sequence::{library, AssistantReply};
use phantom_core::step::{RemoteFetchStep, TextAnimation, TextStep};
use phantom_core::{
    AgentChat, AssistantBackend, CancellationToken, Clock, ConversationThread, Interpreter,
    InterpreterConfig, LoggingDevice, MemoryStore, ModelFallback, OutputSink, RunOutcome,
    ScanClient, ScanPacing, Scrollback, Sequence, Services, Session, SessionConfig, SessionMode,
    Step, SubmitOutcome, VirtualClock,
};

// =============================================================================
// Fakes
// =============================================================================

/// Settles successfully `settle_after_ms` after the request starts
struct DelayedScan {
    clock: VirtualClock,
    settle_after_ms: u64,
}

impl ScanClient for DelayedScan {
    fn start(&self, _request: ScanRequest) -> Box<dyn PendingScan> {
        Box::new(DelayedPending {
            clock: self.clock.clone(),
            due_ms: self.clock.now_ms() + self.settle_after_ms,
        })
    }
}

struct DelayedPending {
    clock: VirtualClock,
    due_ms: u64,
}

impl PendingScan for DelayedPending {
    fn poll_settled(&mut self) -> Option<Result<ScanResult, BackendError>> {
        (self.clock.now_ms() >= self.due_ms).then(|| {
            Ok(ScanResult {
                image: "aGVsbG8=".to_string(),
                mime_type: "image/png".to_string(),
                metadata: ScanMetadata {
                    classification: "TOP SECRET".to_string(),
                    ..ScanMetadata::default()
                },
            })
        })
    }
}

/// The request never comes back
struct NeverSettles;

impl ScanClient for NeverSettles {
    fn start(&self, _request: ScanRequest) -> Box<dyn PendingScan> {
        Box::new(Outstanding)
    }
}

struct Outstanding;

impl PendingScan for Outstanding {
    fn poll_settled(&mut self) -> Option<Result<ScanResult, BackendError>> {
        None
    }
}

/// Every command misses
struct NothingResolves;

#[async_trait]
impl ModelFallback for NothingResolves {
    async fn resolve(&self, _request: &FallbackRequest) -> Result<FallbackReply, BackendError> {
        Ok(FallbackReply::NotFound)
    }
}

struct QuietAssistant;

#[async_trait]
impl AssistantBackend for QuietAssistant {
    async fn exchange(
        &self,
        _request: &phantom_core::backend::AssistantRequest,
    ) -> Result<AssistantReply, BackendError> {
        Ok(AssistantReply::from_sequence(Sequence::new(
            "quiet",
            vec![Step::text("...")],
        )))
    }
}

/// Records every message forwarded to an agent
#[derive(Default)]
struct AgentLog {
    received: Mutex<Vec<(u32, String)>>,
}

#[async_trait]
impl AgentChat for AgentLog {
    async fn exchange(
        &self,
        agent_id: u32,
        _thread: &ConversationThread,
        message: &str,
    ) -> Result<AgentReply, BackendError> {
        self.received.lock().push((agent_id, message.to_string()));
        Ok(AgentReply {
            sequence: Sequence::new("ack", vec![Step::text("ack")]),
            text: "ack".to_string(),
        })
    }
}

/// Scrollback that notes when each frame was written
struct TimedSink {
    clock: VirtualClock,
    lines: Scrollback,
    frames: Vec<(u64, String)>,
}

impl TimedSink {
    fn new(clock: &VirtualClock) -> Self {
        Self {
            clock: clock.clone(),
            lines: Scrollback::new(),
            frames: Vec::new(),
        }
    }
}

impl OutputSink for TimedSink {
    fn append_line(&mut self, line: &str) {
        self.frames.push((self.clock.now_ms(), line.to_string()));
        self.lines.append_line(line);
    }

    fn replace_last_line(&mut self, line: &str) {
        self.frames.push((self.clock.now_ms(), line.to_string()));
        self.lines.replace_last_line(line);
    }

    fn remove_last_lines(&mut self, count: usize) {
        self.lines.remove_last_lines(count);
    }

    fn clear(&mut self) {
        self.lines.clear();
    }
}

/// Cancels `token` once `trigger` is the settled last line
struct CancelAfter {
    token: CancellationToken,
    trigger: String,
    lines: Scrollback,
}

impl OutputSink for CancelAfter {
    fn append_line(&mut self, line: &str) {
        self.lines.append_line(line);
    }

    fn replace_last_line(&mut self, line: &str) {
        self.lines.replace_last_line(line);
        if line == self.trigger {
            self.token.cancel();
        }
    }

    fn remove_last_lines(&mut self, count: usize) {
        self.lines.remove_last_lines(count);
    }

    fn clear(&mut self) {
        self.lines.clear();
    }
}

/// Timed scrollback that cancels `token` once the clock reaches `deadline_ms`
struct StopAt {
    token: CancellationToken,
    deadline_ms: u64,
    inner: TimedSink,
}

impl StopAt {
    fn check(&self) {
        if self.inner.clock.now_ms() >= self.deadline_ms {
            self.token.cancel();
        }
    }
}

impl OutputSink for StopAt {
    fn append_line(&mut self, line: &str) {
        self.inner.append_line(line);
        self.check();
    }

    fn replace_last_line(&mut self, line: &str) {
        self.inner.replace_last_line(line);
        self.check();
    }

    fn remove_last_lines(&mut self, count: usize) {
        self.inner.remove_last_lines(count);
    }

    fn clear(&mut self) {
        self.inner.clear();
    }
}

fn session(agents: Arc<AgentLog>) -> Session {
    let interpreter = Interpreter::new(
        Arc::new(VirtualClock::new()),
        Arc::new(LoggingDevice),
        Arc::new(DelayedScan {
            clock: VirtualClock::new(),
            settle_after_ms: 0,
        }),
    );
    Session::new(
        SessionConfig::default(),
        Services {
            interpreter,
            store: Arc::new(MemoryStore::new()),
            fallback: Arc::new(NothingResolves),
            assistant: Arc::new(QuietAssistant),
            agents,
        },
    )
}

fn reveal(content: &str) -> Step {
    Step::Text(TextStep::new(content).with_animation(TextAnimation::Reveal))
}

// =============================================================================
// Cancellation scoping
// =============================================================================

#[tokio::test]
async fn test_cancel_after_first_step_leaves_only_its_line() {
    let clock = VirtualClock::new();
    let interpreter = Interpreter::new(
        Arc::new(clock.clone()),
        Arc::new(LoggingDevice),
        Arc::new(DelayedScan {
            clock: clock.clone(),
            settle_after_ms: 0,
        }),
    );
    let sequence = Sequence::new("reveal", vec![reveal("alpha"), reveal("bravo"), reveal("charlie")]);
    let token = CancellationToken::new();
    let mut sink = CancelAfter {
        token: token.clone(),
        trigger: "alpha".to_string(),
        lines: Scrollback::new(),
    };

    let outcome = interpreter.run(&sequence, &token, &mut sink).await;

    assert_eq!(outcome, RunOutcome::Aborted);
    assert_eq!(sink.lines.snapshot(), vec!["alpha", CANCEL_MARKER]);
}

#[tokio::test]
async fn test_non_interruptible_sequence_finishes_despite_cancel() {
    let clock = VirtualClock::new();
    let interpreter = Interpreter::new(
        Arc::new(clock.clone()),
        Arc::new(LoggingDevice),
        Arc::new(DelayedScan {
            clock,
            settle_after_ms: 0,
        }),
    );
    let sequence = Sequence::new("reveal", vec![reveal("alpha"), reveal("bravo")]).interruptible(false);
    let token = CancellationToken::new();
    let mut sink = CancelAfter {
        token: token.clone(),
        trigger: "alpha".to_string(),
        lines: Scrollback::new(),
    };

    let outcome = interpreter.run(&sequence, &token, &mut sink).await;

    assert_eq!(outcome, RunOutcome::Completed);
    assert_eq!(sink.lines.snapshot(), vec!["alpha", "bravo"]);
}

// =============================================================================
// Failure tally
// =============================================================================

#[tokio::test]
async fn test_three_unresolved_commands_offer_help_once() {
    let mut session = session(Arc::new(AgentLog::default()));
    let mut sink = Scrollback::new();
    let token = CancellationToken::new();
    let offer_line = |lines: &[String]| {
        lines
            .iter()
            .filter(|l| l.contains(library::ASSISTANT_TAG))
            .count()
    };

    for command in ["foo", "bar"] {
        session.submit(command, &token, &mut sink).await;
    }
    assert_eq!(offer_line(&sink.snapshot()), 0);

    session.submit("baz", &token, &mut sink).await;
    let lines = sink.snapshot();
    assert_eq!(offer_line(&lines), 1);
    let not_found = lines
        .iter()
        .position(|l| l == "baz: command not found")
        .unwrap();
    let offer = lines
        .iter()
        .position(|l| l.contains(library::ASSISTANT_TAG))
        .unwrap();
    assert!(offer > not_found);

    session.submit("qux", &token, &mut sink).await;
    assert_eq!(offer_line(&sink.snapshot()), 1);
    assert_eq!(session.tally().count, 4);
}

#[tokio::test]
async fn test_assistant_entry_rearms_the_offer() {
    let mut session = session(Arc::new(AgentLog::default()));
    let mut sink = Scrollback::new();
    let token = CancellationToken::new();

    for command in ["foo", "bar", "baz"] {
        session.submit(command, &token, &mut sink).await;
    }
    assert!(session.tally().already_prompted);

    session.submit("agq", &token, &mut sink).await;
    session.submit("exit", &token, &mut sink).await;
    assert_eq!(session.mode(), SessionMode::Shell);
    assert_eq!(session.tally().count, 0);
    assert!(!session.tally().already_prompted);

    sink.clear();
    for command in ["foo", "bar", "baz"] {
        session.submit(command, &token, &mut sink).await;
    }
    let offers = sink
        .snapshot()
        .iter()
        .filter(|l| l.contains(library::ASSISTANT_TAG))
        .count();
    assert_eq!(offers, 1);
}

// =============================================================================
// Remote fetch reconciliation
// =============================================================================

#[tokio::test]
async fn test_fast_fetch_holds_progress_until_min_duration() {
    let clock = VirtualClock::new();
    let interpreter = Interpreter::new(
        Arc::new(clock.clone()),
        Arc::new(LoggingDevice),
        Arc::new(DelayedScan {
            clock: clock.clone(),
            settle_after_ms: 400,
        }),
    );
    let min_duration = interpreter.config().scan.min_duration_ms;
    assert_eq!(min_duration, 1500);
    let sequence = Sequence::new(
        "scan",
        vec![Step::RemoteFetch(RemoteFetchStep {
            target: "vault-7".to_string(),
            dimension: None,
            classification: "CLASSIFIED".to_string(),
            timestamp: Some("2026-01-01T00:00:00Z".to_string()),
        })],
    );
    let mut sink = TimedSink::new(&clock);

    let outcome = interpreter
        .run(&sequence, &CancellationToken::new(), &mut sink)
        .await;
    assert_eq!(outcome, RunOutcome::Completed);

    let extraction: Vec<&(u64, String)> = sink
        .frames
        .iter()
        .filter(|(_, line)| line.contains("Extracting payload"))
        .collect();
    let fetch_start = extraction.first().map(|(at, _)| *at).unwrap();

    let mut last_percent = 0;
    for (at, line) in &extraction {
        let percent: u32 = line
            .rsplit(' ')
            .next()
            .and_then(|p| p.trim_end_matches('%').parse().ok())
            .unwrap();
        assert!(percent >= last_percent, "progress went backwards: {line}");
        last_percent = percent;
        if *at - fetch_start < min_duration {
            assert!(percent < 100, "100% at {}ms: {line}", at - fetch_start);
        }
    }

    let (full_at, full_line) = extraction.last().unwrap();
    assert!(full_line.ends_with(" 100%"));
    assert!(*full_at - fetch_start >= min_duration);
    let full_count = extraction.iter().filter(|(_, l)| l.ends_with(" 100%")).count();
    assert_eq!(full_count, 1);

    let lines = sink.lines.snapshot();
    let full_index = lines.iter().position(|l| l.ends_with(" 100%")).unwrap();
    assert!(lines[full_index + 1..]
        .iter()
        .any(|l| l.contains("SCAN RESULT // vault-7")));
    assert_eq!(
        lines.iter().rev().nth(1).map(String::as_str),
        Some("[IMAGE:data:image/png;base64,aGVsbG8=]")
    );
}

fn vault_fetch() -> Sequence {
    Sequence::new(
        "scan",
        vec![Step::RemoteFetch(RemoteFetchStep {
            target: "vault-7".to_string(),
            dimension: None,
            classification: "CLASSIFIED".to_string(),
            timestamp: Some("2026-01-01T00:00:00Z".to_string()),
        })],
    )
}

fn scan_interpreter(clock: &VirtualClock, timeout_ms: Option<u64>) -> Interpreter {
    let config = InterpreterConfig {
        scan: ScanPacing {
            timeout_ms,
            ..ScanPacing::default()
        },
        ..InterpreterConfig::default()
    };
    Interpreter::new(
        Arc::new(clock.clone()),
        Arc::new(LoggingDevice),
        Arc::new(NeverSettles),
    )
    .with_config(config)
}

fn extraction_frames(frames: &[(u64, String)]) -> Vec<&(u64, String)> {
    frames
        .iter()
        .filter(|(_, line)| line.contains("Extracting payload"))
        .collect()
}

#[tokio::test]
async fn test_unanswered_fetch_fails_at_timeout() {
    let clock = VirtualClock::new();
    let interpreter = scan_interpreter(&clock, Some(2_000));
    let mut sink = TimedSink::new(&clock);

    let outcome = interpreter
        .run(&vault_fetch(), &CancellationToken::new(), &mut sink)
        .await;
    assert_eq!(outcome, RunOutcome::Completed);

    let extraction = extraction_frames(&sink.frames);
    let fetch_start = extraction.first().map(|(at, _)| *at).unwrap();
    let full: Vec<_> = extraction
        .iter()
        .filter(|(_, line)| line.ends_with(" 100%"))
        .collect();
    assert_eq!(full.len(), 1);
    assert!(full[0].0 - fetch_start >= 2_000);
    assert!(extraction
        .iter()
        .filter(|(at, _)| at - fetch_start < 2_000)
        .all(|(_, line)| !line.ends_with(" 100%")));

    let lines = sink.lines.snapshot();
    let full_index = lines.iter().position(|l| l.ends_with(" 100%")).unwrap();
    let tail = &lines[full_index + 1..];
    assert!(tail[0].contains("Extraction failed"));
    assert!(tail[1].contains("Scan error: timed out after 2000ms"));
    assert!(!lines.iter().any(|l| l.contains("SCAN RESULT")));
}

#[tokio::test]
async fn test_unanswered_fetch_without_timeout_never_completes() {
    let clock = VirtualClock::new();
    let interpreter = scan_interpreter(&clock, None);
    let token = CancellationToken::new();
    let mut sink = StopAt {
        token: token.clone(),
        deadline_ms: 60_000,
        inner: TimedSink::new(&clock),
    };

    let outcome = interpreter.run(&vault_fetch(), &token, &mut sink).await;
    assert_eq!(outcome, RunOutcome::Aborted);

    let extraction = extraction_frames(&sink.inner.frames);
    assert!(extraction.len() > 100);
    assert!(extraction.iter().all(|(_, line)| !line.ends_with(" 100%")));
    assert!(extraction.last().unwrap().1.ends_with(" 99%"));

    let lines = sink.inner.lines.snapshot();
    assert!(!lines.iter().any(|l| l.contains("Extraction failed")));
    assert!(lines.iter().any(|l| l.ends_with(CANCEL_MARKER)));
}

// =============================================================================
// Mode transitions
// =============================================================================

#[tokio::test]
async fn test_agent_exit_stops_forwarding() {
    let agents = Arc::new(AgentLog::default());
    let mut session = session(agents.clone());
    let mut sink = Scrollback::new();
    let token = CancellationToken::new();

    session.submit("agent 7", &token, &mut sink).await;
    assert_eq!(session.mode(), SessionMode::AgentChat { agent_id: 7 });
    session.submit("status report", &token, &mut sink).await;

    session.submit("exit", &token, &mut sink).await;
    assert_eq!(session.mode(), SessionMode::Shell);

    let outcome = session.submit("hello again", &token, &mut sink).await;
    assert_eq!(outcome, SubmitOutcome::Continue);
    assert_eq!(
        agents.received.lock().clone(),
        vec![(7, "status report".to_string())]
    );
    assert_eq!(
        sink.last(),
        Some("hello: command not found"),
        "shell handles the line after exit"
    );

    session.submit("agent 7", &token, &mut sink).await;
    session.submit("back", &token, &mut sink).await;
    assert_eq!(agents.received.lock().len(), 2);
}

#[tokio::test]
async fn test_exit_from_shell_logs_out() {
    let mut session = session(Arc::new(AgentLog::default()));
    let mut sink = Scrollback::new();
    let outcome = session
        .submit("logout", &CancellationToken::new(), &mut sink)
        .await;
    assert_eq!(outcome, SubmitOutcome::Logout);
}
