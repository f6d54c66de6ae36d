//! Frame Scheduler
//!
//! Animated steps are [`FrameTask`] state machines. Each tick writes one frame
//! and says when it wants the next one; the scheduler keeps pending frames in
//! due order and drives them from a single [`Clock`]. Cancellation is checked
//! whenever a frame is dequeued, so a cancelled interruptible sequence never
//! writes another frame.

use std::collections::VecDeque;

use crate::cancel::CancellationToken;
use crate::clock::Clock;
use crate::sink::OutputSink;

/// What a task wants after a tick
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tick {
    /// Run again after this many milliseconds
    Again(u64),
    /// Finished; the resting frame has been written
    Done,
}

/// State handed to a task on each tick
pub struct FrameContext<'s> {
    /// Where frames go
    pub sink: &'s mut dyn OutputSink,
    /// Milliseconds since the task was scheduled
    pub elapsed_ms: u64,
    /// Zero-based tick counter
    pub frame: u64,
}

/// A time-sliced renderer
pub trait FrameTask: Send {
    /// Write one frame
    fn tick(&mut self, ctx: &mut FrameContext<'_>) -> Tick;
}

/// How a drain ended
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Drain {
    /// Every task reached [`Tick::Done`]
    Completed,
    /// Cancellation was observed; remaining frames were dropped
    Cancelled,
}

struct Pending<'t> {
    due_ms: u64,
    started_ms: u64,
    frame: u64,
    task: Box<dyn FrameTask + 't>,
}

/// Queue of pending frames driven by one clock
pub struct FrameScheduler<'t> {
    clock: &'t dyn Clock,
    queue: VecDeque<Pending<'t>>,
}

impl<'t> FrameScheduler<'t> {
    /// Empty scheduler on `clock`
    pub fn new(clock: &'t dyn Clock) -> Self {
        Self {
            clock,
            queue: VecDeque::new(),
        }
    }

    /// Queue a task whose first frame is due now
    pub fn schedule(&mut self, task: Box<dyn FrameTask + 't>) {
        let now = self.clock.now_ms();
        self.enqueue(Pending {
            due_ms: now,
            started_ms: now,
            frame: 0,
            task,
        });
    }

    /// Number of queued frames
    #[must_use]
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    fn enqueue(&mut self, entry: Pending<'t>) {
        let at = self
            .queue
            .iter()
            .position(|queued| queued.due_ms > entry.due_ms)
            .unwrap_or(self.queue.len());
        self.queue.insert(at, entry);
    }

    /// Run frames until the queue is empty or `cancel` fires
    ///
    /// Pass `None` to ignore cancellation entirely.
    pub async fn drain(
        &mut self,
        sink: &mut dyn OutputSink,
        cancel: Option<&CancellationToken>,
    ) -> Drain {
        let cancelled = || cancel.is_some_and(CancellationToken::is_cancelled);

        while let Some(mut entry) = self.queue.pop_front() {
            if cancelled() {
                self.queue.clear();
                return Drain::Cancelled;
            }

            let now = self.clock.now_ms();
            if entry.due_ms > now {
                self.clock.sleep_ms(entry.due_ms.saturating_sub(now)).await;
                if cancelled() {
                    self.queue.clear();
                    return Drain::Cancelled;
                }
            }

            let now = self.clock.now_ms();
            let mut ctx = FrameContext {
                sink: &mut *sink,
                elapsed_ms: now.saturating_sub(entry.started_ms),
                frame: entry.frame,
            };
            match entry.task.tick(&mut ctx) {
                Tick::Again(delay_ms) => {
                    entry.due_ms = now.saturating_add(delay_ms);
                    entry.frame += 1;
                    self.enqueue(entry);
                }
                Tick::Done => {}
            }
        }

        Drain::Completed
    }
}
