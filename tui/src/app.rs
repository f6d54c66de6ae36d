//! Main Application
//!
//! The App is a thin surface over a [`Session`]:
//! - Event loop (keyboard, resize, frame tick)
//! - One spawned task per user action, gated by an [`ActionGate`]
//! - A [`SharedScrollback`] the task writes into and the renderer reads
//!
//! # Action flow
//!
//! ```text
//! Enter ──► gate.begin() ──► spawn { session.submit(line, token, sink) }
//!                                        │
//! Ctrl+C ─► gate.interrupt()             ▼
//!           (idle: session.signal)   ActionDone ──► prompt, mode, quit?
//! ```
//!
//! The session sits behind a `tokio::sync::Mutex`; a new action cancels the
//! previous token and then waits for the old task to let go of the session.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use crossterm::event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use futures::StreamExt;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Position};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;
use ratatui::{Frame, Terminal};
use tokio::sync::{mpsc, Mutex};
use tokio::time::MissedTickBehavior;
use unicode_width::UnicodeWidthStr;

use phantom_core::{
    ActionGate, Sequence, Session, SessionMode, SharedScrollback, Signal, SubmitOutcome,
};

use crate::theme::{CHAT_MAGENTA, PROMPT_GREEN, STATUS_BG, STATUS_FG};
use crate::widgets::file_manager::FileManagerState;
use crate::widgets::{FileManagerView, ScrollbackState, ScrollbackView};

/// Redraw cadence while idle or animating
const FRAME_INTERVAL: Duration = Duration::from_millis(33);

/// Lines kept for Up/Down recall
const RECALL_LIMIT: usize = 200;

/// Work handed to a session task
#[derive(Debug)]
enum Job {
    Banner(Sequence),
    Submit(String),
    Signal(Signal),
}

/// Reported by a session task when it lets go of the session
#[derive(Debug)]
struct ActionDone {
    outcome: SubmitOutcome,
    prompt: String,
    mode: SessionMode,
}

/// What a key press means for the surface
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Intent {
    /// Insert a character
    Type(char),
    /// Delete before the cursor
    Backspace,
    /// Submit the input line
    Submit,
    /// Ctrl+C
    Interrupt,
    /// Recall an older line
    RecallOlder,
    /// Recall a newer line
    RecallNewer,
    /// Scroll the history by rows (positive = older)
    Scroll(isize),
    /// Jump to the newest output
    ScrollBottom,
    /// Leave the file manager
    CloseFileManager,
    /// Move the file manager selection
    MoveSelection(isize),
    /// Switch file manager panel
    SwitchPanel,
    /// Nothing
    None,
}

/// Map a key press to an [`Intent`]
#[must_use]
pub fn key_intent(key: KeyEvent, file_manager_open: bool, page: isize) -> Intent {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    if ctrl && key.code == KeyCode::Char('c') {
        return Intent::Interrupt;
    }

    if file_manager_open {
        return match key.code {
            KeyCode::F(10) | KeyCode::Esc => Intent::CloseFileManager,
            KeyCode::Up => Intent::MoveSelection(-1),
            KeyCode::Down => Intent::MoveSelection(1),
            KeyCode::Tab => Intent::SwitchPanel,
            _ => Intent::None,
        };
    }

    match key.code {
        KeyCode::Enter => Intent::Submit,
        KeyCode::Char(c) if !ctrl => Intent::Type(c),
        KeyCode::Backspace => Intent::Backspace,
        KeyCode::Up => Intent::RecallOlder,
        KeyCode::Down => Intent::RecallNewer,
        KeyCode::PageUp => Intent::Scroll(page),
        KeyCode::PageDown => Intent::Scroll(-page),
        KeyCode::End if ctrl => Intent::ScrollBottom,
        _ => Intent::None,
    }
}

/// Ctrl+C: cancel the action in flight, or hand an idle interrupt to the session
///
/// The running task holds the session lock, so an in-flight interrupt is
/// settled here on the gate.
fn interrupt_job(gate: &ActionGate) -> Option<Job> {
    if gate.interrupt() {
        tracing::debug!("Interrupted the action in flight");
        None
    } else {
        Some(Job::Signal(Signal::Interrupt))
    }
}

/// Main application state
pub struct App {
    // === Core State ===
    running: bool,
    session: Arc<Mutex<Session>>,
    gate: Arc<ActionGate>,
    scrollback: SharedScrollback,
    done_tx: mpsc::UnboundedSender<ActionDone>,
    done_rx: mpsc::UnboundedReceiver<ActionDone>,

    // === Mirrored Session State ===
    prompt: String,
    mode: SessionMode,
    hostname: String,

    // === Input State ===
    input: String,
    recall: Vec<String>,
    recall_index: Option<usize>,

    // === View State ===
    scroll: ScrollbackState,
    file_manager: Option<FileManagerState>,
    rendered_revision: Option<u64>,
    lines: Vec<String>,
    height: u16,
}

impl App {
    /// Surface over `session`, drawing from `scrollback`
    #[must_use]
    pub fn new(session: Session, scrollback: SharedScrollback) -> Self {
        let (done_tx, done_rx) = mpsc::unbounded_channel();
        let prompt = session.prompt();
        let mode = session.mode();
        let hostname = session.config().hostname.clone();

        Self {
            running: true,
            session: Arc::new(Mutex::new(session)),
            gate: Arc::new(ActionGate::new()),
            scrollback,
            done_tx,
            done_rx,
            prompt,
            mode,
            hostname,
            input: String::new(),
            recall: Vec::new(),
            recall_index: None,
            scroll: ScrollbackState::default(),
            file_manager: None,
            rendered_revision: None,
            lines: Vec::new(),
            height: 24,
        }
    }

    /// Host name shown in the prompt
    #[must_use]
    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    /// Main event loop; `banner` plays before the first prompt
    pub async fn run(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
        banner: Sequence,
    ) -> anyhow::Result<()> {
        let mut events = EventStream::new();
        let mut ticker = tokio::time::interval(FRAME_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        self.spawn(Job::Banner(banner));
        terminal.draw(|frame| self.render(frame))?;

        while self.running {
            tokio::select! {
                maybe_event = events.next() => match maybe_event {
                    Some(Ok(Event::Key(key))) if key.kind == KeyEventKind::Press => {
                        self.handle_key(key);
                    }
                    Some(Ok(Event::Resize(_, height))) => self.height = height,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => tracing::warn!(error = %e, "Terminal event error"),
                    None => self.running = false,
                },
                Some(done) = self.done_rx.recv() => self.apply(done),
                _ = ticker.tick() => {}
            }
            terminal.draw(|frame| self.render(frame))?;
        }

        self.gate.interrupt();
        Ok(())
    }

    fn spawn(&self, job: Job) {
        let ticket = self.gate.begin();
        let session = Arc::clone(&self.session);
        let gate = Arc::clone(&self.gate);
        let mut sink = self.scrollback.clone();
        let done = self.done_tx.clone();

        tokio::spawn(async move {
            let mut session = session.lock().await;
            let outcome: SubmitOutcome = match job {
                Job::Banner(sequence) => session.show(&sequence, &ticket.token, &mut sink).await.into(),
                Job::Submit(line) => session.submit(&line, &ticket.token, &mut sink).await,
                Job::Signal(signal) => session.signal(signal, false, &mut sink).await,
            };
            gate.finish(&ticket);
            let report = ActionDone {
                outcome,
                prompt: session.prompt(),
                mode: session.mode(),
            };
            if done.send(report).is_err() {
                tracing::debug!("Surface closed before the action finished");
            }
        });
    }

    fn apply(&mut self, done: ActionDone) {
        tracing::debug!(outcome = ?done.outcome, mode = %done.mode, "Action finished");
        self.prompt = done.prompt;
        self.mode = done.mode;

        match done.outcome {
            SubmitOutcome::Logout => self.running = false,
            SubmitOutcome::OpenFileManager => self.file_manager = Some(FileManagerState::default()),
            // Ctrl+C in flight never reaches the session; see `interrupt_job`
            SubmitOutcome::Continue | SubmitOutcome::Aborted | SubmitOutcome::CancelInFlight => {}
        }
        if self.mode != SessionMode::FileManager {
            self.file_manager = None;
        }
    }

    fn handle_key(&mut self, key: KeyEvent) {
        let page = ((self.height / 2) as isize).max(1);
        match key_intent(key, self.file_manager.is_some(), page) {
            Intent::Type(c) => {
                self.input.push(c);
                self.recall_index = None;
            }
            Intent::Backspace => {
                self.input.pop();
            }
            Intent::Submit => {
                let line = std::mem::take(&mut self.input);
                self.remember(&line);
                self.scroll.scroll_to_bottom();
                self.spawn(Job::Submit(line));
            }
            Intent::Interrupt => {
                self.input.clear();
                if let Some(job) = interrupt_job(&self.gate) {
                    self.spawn(job);
                }
            }
            Intent::RecallOlder => self.recall_step(true),
            Intent::RecallNewer => self.recall_step(false),
            Intent::Scroll(rows) => self.scroll.scroll(rows),
            Intent::ScrollBottom => self.scroll.scroll_to_bottom(),
            Intent::CloseFileManager => self.spawn(Job::Signal(Signal::FileManagerExit)),
            Intent::MoveSelection(delta) => {
                if let Some(state) = self.file_manager.as_mut() {
                    state.move_selection(delta);
                }
            }
            Intent::SwitchPanel => {
                if let Some(state) = self.file_manager.as_mut() {
                    state.switch_panel();
                }
            }
            Intent::None => {}
        }
    }

    fn remember(&mut self, line: &str) {
        self.recall_index = None;
        let line = line.trim();
        if line.is_empty() || self.recall.last().is_some_and(|last| last == line) {
            return;
        }
        self.recall.push(line.to_string());
        if self.recall.len() > RECALL_LIMIT {
            self.recall.remove(0);
        }
    }

    fn recall_step(&mut self, older: bool) {
        if self.recall.is_empty() {
            return;
        }
        let last = self.recall.len() - 1;
        self.recall_index = match (self.recall_index, older) {
            (None, true) => Some(last),
            (None, false) => None,
            (Some(i), true) => Some(i.saturating_sub(1)),
            (Some(i), false) if i < last => Some(i + 1),
            (Some(_), false) => None,
        };
        self.input = self
            .recall_index
            .map(|i| self.recall[i].clone())
            .unwrap_or_default();
    }

    // ========================================================================
    // Rendering
    // ========================================================================

    fn render(&mut self, frame: &mut Frame<'_>) {
        let area = frame.area();
        self.height = area.height;

        if let Some(state) = self.file_manager.as_mut() {
            frame.render_stateful_widget(FileManagerView, area, state);
            return;
        }

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Min(1),
                Constraint::Length(1),
                Constraint::Length(1),
            ])
            .split(area);

        let revision = self.scrollback.with(|s| s.revision());
        if self.rendered_revision != Some(revision) {
            self.lines = self.scrollback.with(|s| s.snapshot());
            self.rendered_revision = Some(revision);
        }
        frame.render_stateful_widget(ScrollbackView::new(&self.lines), chunks[0], &mut self.scroll);

        let busy = self.gate.in_flight();
        let prompt_color = if self.mode.is_chat() {
            CHAT_MAGENTA
        } else {
            PROMPT_GREEN
        };
        let input_line = if busy {
            Line::default()
        } else {
            Line::from(vec![
                Span::styled(
                    self.prompt.clone(),
                    Style::default().fg(prompt_color).add_modifier(Modifier::BOLD),
                ),
                Span::raw(" "),
                Span::raw(self.input.clone()),
            ])
        };
        frame.render_widget(Paragraph::new(input_line), chunks[1]);
        if !busy {
            let used = self.prompt.width() + 1 + self.input.width();
            let x = u16::try_from(used)
                .unwrap_or(u16::MAX)
                .min(chunks[1].width.saturating_sub(1));
            frame.set_cursor_position(Position::new(chunks[1].x + x, chunks[1].y));
        }

        let status = format!(
            " {} │ {} │ {}",
            self.hostname,
            self.mode,
            if busy {
                "Ctrl+C interrupt"
            } else {
                "PgUp/PgDn scroll · Ctrl+C cancel"
            }
        );
        frame.render_widget(
            Paragraph::new(status).style(Style::default().bg(STATUS_BG).fg(STATUS_FG)),
            chunks[2],
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn ctrl(c: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL)
    }

    #[test]
    fn test_terminal_keys() {
        assert_eq!(key_intent(key(KeyCode::Char('l')), false, 10), Intent::Type('l'));
        assert_eq!(key_intent(key(KeyCode::Enter), false, 10), Intent::Submit);
        assert_eq!(key_intent(key(KeyCode::PageUp), false, 10), Intent::Scroll(10));
        assert_eq!(key_intent(key(KeyCode::PageDown), false, 10), Intent::Scroll(-10));
        assert_eq!(key_intent(ctrl('c'), false, 10), Intent::Interrupt);
        assert_eq!(key_intent(ctrl('x'), false, 10), Intent::None);
    }

    #[test]
    fn test_file_manager_swallows_typing() {
        assert_eq!(key_intent(key(KeyCode::Char('l')), true, 10), Intent::None);
        assert_eq!(key_intent(key(KeyCode::Enter), true, 10), Intent::None);
        assert_eq!(key_intent(key(KeyCode::F(10)), true, 10), Intent::CloseFileManager);
        assert_eq!(key_intent(key(KeyCode::Esc), true, 10), Intent::CloseFileManager);
        assert_eq!(key_intent(key(KeyCode::Down), true, 10), Intent::MoveSelection(1));
        assert_eq!(key_intent(ctrl('c'), true, 10), Intent::Interrupt);
    }

    #[test]
    fn test_interrupt_cancels_in_flight_action() {
        let gate = ActionGate::new();
        let ticket = gate.begin();

        assert!(interrupt_job(&gate).is_none());
        assert!(ticket.token.is_cancelled());

        gate.finish(&ticket);
        assert!(matches!(
            interrupt_job(&gate),
            Some(Job::Signal(Signal::Interrupt))
        ));
    }
}
