//! Sequence Interpreter
//!
//! Renders a [`Sequence`] into an [`OutputSink`], one step at a time and
//! strictly in order:
//!
//! ```text
//! for each step:
//!     token cancelled && sequence.interruptible ?  -> append ^C marker, Aborted
//!     static step?    -> append its lines
//!     animated step?  -> FrameTask on the FrameScheduler (cancellation checked
//!                        at every frame dequeue)
//! -> Completed
//! ```
//!
//! Non-interruptible sequences never look at the token. Cancellation never
//! rolls back lines already written.

pub mod blocks;
pub mod frames;
pub mod remote_fetch;
pub mod scheduler;

use std::sync::Arc;

use crate::backend::ScanClient;
use crate::cancel::CancellationToken;
use crate::clock::Clock;
use crate::device::AmbientDevice;
use crate::palette::CANCEL_MARKER;
use crate::sequence::Sequence;
use crate::sink::OutputSink;
use crate::step::{ArtAnimation, Step};

use frames::{ArtFrames, MatrixFrames, ProcessFrames, ProgressFrames, TextFrames, WaitFrames};
use remote_fetch::RemoteFetchFrames;
pub use remote_fetch::{scan_progress, ScanPacing};
use scheduler::{Drain, FrameScheduler, FrameTask};

/// How a run ended
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every step finished
    Completed,
    /// Cancellation stopped the sequence; the marker was written
    Aborted,
}

/// Interpreter timing
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InterpreterConfig {
    /// Delay between frames of progress, process and scan steps
    pub frame_interval_ms: u64,
    /// Polling period of wait steps
    pub wait_poll_ms: u64,
    /// Remote fetch pacing
    pub scan: ScanPacing,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            frame_interval_ms: 80,
            wait_poll_ms: 50,
            scan: ScanPacing::default(),
        }
    }
}

/// Runs sequences against a clock, a device and a scan client
#[derive(Clone)]
pub struct Interpreter {
    clock: Arc<dyn Clock>,
    device: Arc<dyn AmbientDevice>,
    scanner: Arc<dyn ScanClient>,
    config: InterpreterConfig,
}

impl Interpreter {
    /// Interpreter with default timing
    pub fn new(
        clock: Arc<dyn Clock>,
        device: Arc<dyn AmbientDevice>,
        scanner: Arc<dyn ScanClient>,
    ) -> Self {
        Self {
            clock,
            device,
            scanner,
            config: InterpreterConfig::default(),
        }
    }

    /// Replace the timing configuration
    #[must_use]
    pub fn with_config(mut self, config: InterpreterConfig) -> Self {
        self.config = config;
        self
    }

    /// Current timing configuration
    #[must_use]
    pub fn config(&self) -> &InterpreterConfig {
        &self.config
    }

    /// Clock driving frame waits
    #[must_use]
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Render `sequence` to completion or cancellation
    pub async fn run(
        &self,
        sequence: &Sequence,
        token: &CancellationToken,
        sink: &mut dyn OutputSink,
    ) -> RunOutcome {
        let guard = sequence.interruptible.then_some(token);
        tracing::debug!(
            sequence = %sequence.id,
            steps = sequence.steps.len(),
            interruptible = sequence.interruptible,
            "Running sequence"
        );

        for (index, step) in sequence.steps.iter().enumerate() {
            if guard.is_some_and(CancellationToken::is_cancelled) {
                return Self::abort(sequence, index, sink);
            }
            if self.render_step(step, guard, sink).await == Drain::Cancelled {
                return Self::abort(sequence, index, sink);
            }
        }
        RunOutcome::Completed
    }

    fn abort(sequence: &Sequence, index: usize, sink: &mut dyn OutputSink) -> RunOutcome {
        tracing::debug!(sequence = %sequence.id, step = index, "Sequence cancelled");
        sink.append_line(CANCEL_MARKER);
        RunOutcome::Aborted
    }

    async fn render_step(
        &self,
        step: &Step,
        cancel: Option<&CancellationToken>,
        sink: &mut dyn OutputSink,
    ) -> Drain {
        let interval = self.config.frame_interval_ms;
        let task: Box<dyn FrameTask + '_> = match step {
            Step::Text(text) if !step.is_animated() => {
                sink.append_line(&blocks::text(text));
                return Drain::Completed;
            }
            Step::Text(text) => Box::new(TextFrames::new(text)),
            Step::AsciiArt(art) if art.animation == ArtAnimation::None => {
                for line in art.art.split('\n') {
                    sink.append_line(&art.tone.paint(line));
                }
                return Drain::Completed;
            }
            Step::AsciiArt(art) => Box::new(ArtFrames::new(art)),
            Step::Progress(progress) => Box::new(ProgressFrames::new(progress, interval)),
            Step::Process(process) => Box::new(ProcessFrames::new(process, interval)),
            Step::Matrix(matrix) => Box::new(MatrixFrames::new(matrix)),
            Step::Wait(wait) => Box::new(WaitFrames::new(wait, self.config.wait_poll_ms)),
            Step::RemoteFetch(fetch) => Box::new(RemoteFetchFrames::new(
                fetch,
                self.scanner.as_ref(),
                self.config.scan,
                interval,
            )),
            Step::Section(section) => {
                append_all(sink, blocks::section(section));
                return Drain::Completed;
            }
            Step::Table(table) => {
                append_all(sink, blocks::table(table));
                return Drain::Completed;
            }
            Step::Status(status) => {
                sink.append_line(&blocks::status(status));
                return Drain::Completed;
            }
            Step::Tree(tree) => {
                append_all(sink, blocks::tree(&tree.data));
                return Drain::Completed;
            }
            Step::Code(code) => {
                append_all(sink, blocks::code(code));
                return Drain::Completed;
            }
            Step::ClearLine(clear) => {
                sink.remove_last_lines(clear.count);
                return Drain::Completed;
            }
            Step::Ambient(ambient) => {
                self.device.command(ambient.action, ambient.value);
                sink.append_line(&blocks::ambient(ambient));
                return Drain::Completed;
            }
        };

        let mut scheduler = FrameScheduler::new(self.clock.as_ref());
        scheduler.schedule(task);
        scheduler.drain(sink, cancel).await
    }
}

fn append_all(sink: &mut dyn OutputSink, lines: Vec<String>) {
    for line in &lines {
        sink.append_line(line);
    }
}
