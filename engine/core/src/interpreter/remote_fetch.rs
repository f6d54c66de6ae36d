//! Remote fetch with latency-aware progress
//!
//! The fetch runs as its own task; the frame loop only polls whether it has
//! settled. Progress is derived from elapsed time and settlement:
//!
//! - unsettled: `min(0.99, elapsed / assumed_max)`
//! - settled before `min_duration`: `min(0.99, elapsed / min_duration)`
//! - settled at or after `min_duration`: `1.0`
//!
//! so the bar never reads 100% before the payload exists, and never finishes
//! faster than `min_duration` even when the network does.

use super::frames::stage_done_line;
use super::scheduler::{FrameContext, FrameTask, Tick};
use crate::backend::{BackendError, PendingScan, ScanClient, ScanRequest, ScanResult};
use crate::palette::{Tone, SPINNER_QUANTUM};
use crate::step::RemoteFetchStep;

/// Timing knobs for the remote fetch step
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScanPacing {
    /// Shortest time the progress display may take
    pub min_duration_ms: u64,
    /// Duration assumed while the request is outstanding
    pub assumed_max_ms: u64,
    /// Length of each calibration stage before the request starts
    pub calibration_stage_ms: u64,
    /// Give up on an unsettled request after this long; `None` waits forever
    pub timeout_ms: Option<u64>,
}

impl Default for ScanPacing {
    fn default() -> Self {
        Self {
            min_duration_ms: 1500,
            assumed_max_ms: 10_000,
            calibration_stage_ms: 800,
            timeout_ms: None,
        }
    }
}

/// Progress fraction for a fetch `elapsed_ms` into its request
#[must_use]
pub fn scan_progress(elapsed_ms: u64, settled: bool, pacing: &ScanPacing) -> f64 {
    let ratio = |total: u64| {
        if total == 0 {
            1.0
        } else {
            elapsed_ms as f64 / total as f64
        }
    };
    if !settled {
        ratio(pacing.assumed_max_ms).min(0.99)
    } else if elapsed_ms < pacing.min_duration_ms {
        ratio(pacing.min_duration_ms).min(0.99)
    } else {
        1.0
    }
}

/// Integer percentage shown for `progress`; 100 only when complete
#[must_use]
pub fn percent_label(progress: f64) -> u32 {
    if progress >= 1.0 {
        100
    } else {
        ((progress * 100.0).round() as u32).min(99)
    }
}

const CALIBRATION_STAGES: [&str; 3] = [
    "Calibrating sensors",
    "Aligning lattice",
    "Locking onto target",
];

const SCAN_BAR_WIDTH: usize = 20;

fn scan_bar(progress: f64) -> String {
    (0..SCAN_BAR_WIDTH)
        .map(|i| {
            if progress * SCAN_BAR_WIDTH as f64 - i as f64 >= 1.0 {
                '█'
            } else {
                '░'
            }
        })
        .collect()
}

/// Frame shown while the payload is extracted
#[must_use]
pub fn extraction_line(progress: f64, frame: usize) -> String {
    let spinner = SPINNER_QUANTUM[frame % SPINNER_QUANTUM.len()];
    format!(
        "{} Extracting payload... [{}] {}%",
        Tone::Info.paint(&spinner.to_string()),
        scan_bar(progress),
        percent_label(progress)
    )
}

/// Lines appended after a successful fetch
#[must_use]
pub fn result_lines(target: &str, result: &ScanResult) -> Vec<String> {
    let rule = Tone::Dim.paint(&"─".repeat(48));
    let meta = &result.metadata;
    let field = |name: &str, value: &str| {
        format!("{} {value}", Tone::Dim.paint(&format!("{name:<15}")))
    };
    let captured = match meta.year {
        Some(year) => format!("{} ({year})", meta.date_created),
        None => meta.date_created.clone(),
    };

    vec![
        String::new(),
        rule.clone(),
        Tone::Highlight.paint(&format!("SCAN RESULT // {target}")),
        rule.clone(),
        field("Classification:", &Tone::Error.paint(&meta.classification)),
        field("Captured:", &captured),
        field("Dimension:", &meta.dimension),
        field("Signature:", &Tone::Quantum.paint(&meta.hex_code)),
        field("Source:", &meta.source),
        String::new(),
        result.image_marker(),
        rule,
    ]
}

/// Lines appended after a failed fetch
#[must_use]
pub fn failure_lines(error: &BackendError) -> Vec<String> {
    vec![
        format!("{} Extraction failed", Tone::Error.paint("[FAIL]")),
        Tone::Error.paint(&format!("Scan error: {error}")),
    ]
}

enum Phase {
    Intro,
    Calibrating { stage: usize, started_ms: u64 },
    Fetching { started_ms: u64, pending: Box<dyn PendingScan> },
}

/// Calibration preamble, concurrent fetch, reconciled progress, payload
pub(crate) struct RemoteFetchFrames<'a> {
    step: &'a RemoteFetchStep,
    scanner: &'a dyn ScanClient,
    pacing: ScanPacing,
    interval_ms: u64,
    phase: Phase,
    outcome: Option<Result<ScanResult, BackendError>>,
    last_progress: f64,
    spin: usize,
}

impl<'a> RemoteFetchFrames<'a> {
    pub(crate) fn new(
        step: &'a RemoteFetchStep,
        scanner: &'a dyn ScanClient,
        pacing: ScanPacing,
        interval_ms: u64,
    ) -> Self {
        Self {
            step,
            scanner,
            pacing,
            interval_ms: interval_ms.max(1),
            phase: Phase::Intro,
            outcome: None,
            last_progress: 0.0,
            spin: 0,
        }
    }

    fn request(&self) -> ScanRequest {
        ScanRequest {
            target: self.step.target.clone(),
            classification: self.step.classification.clone(),
            timestamp: self
                .step
                .timestamp
                .clone()
                .unwrap_or_else(|| chrono::Utc::now().to_rfc3339()),
            dimension: self.step.dimension.clone(),
        }
    }

    fn calibrate(&mut self, ctx: &mut FrameContext<'_>, stage: usize, started_ms: u64) -> Tick {
        let stage_elapsed = ctx.elapsed_ms.saturating_sub(started_ms);
        let stage_ms = self.pacing.calibration_stage_ms;
        if stage_elapsed < stage_ms {
            let spinner = SPINNER_QUANTUM[self.spin % SPINNER_QUANTUM.len()];
            self.spin += 1;
            ctx.sink.replace_last_line(&Tone::Info.paint(&format!(
                "{spinner} {}...",
                CALIBRATION_STAGES[stage]
            )));
            return Tick::Again(self.interval_ms.min(stage_ms.saturating_sub(stage_elapsed)));
        }

        ctx.sink
            .replace_last_line(&stage_done_line(CALIBRATION_STAGES[stage]));
        ctx.sink.append_line("");
        if stage + 1 < CALIBRATION_STAGES.len() {
            self.phase = Phase::Calibrating {
                stage: stage + 1,
                started_ms: ctx.elapsed_ms,
            };
        } else {
            tracing::debug!(target_name = %self.step.target, "Starting remote fetch");
            self.phase = Phase::Fetching {
                started_ms: ctx.elapsed_ms,
                pending: self.scanner.start(self.request()),
            };
        }
        Tick::Again(0)
    }
}

impl FrameTask for RemoteFetchFrames<'_> {
    fn tick(&mut self, ctx: &mut FrameContext<'_>) -> Tick {
        let (started_ms, pending) = match &mut self.phase {
            Phase::Intro => {
                let dimension = self.step.dimension.as_deref().unwrap_or("local");
                ctx.sink.append_line(&Tone::Quantum.paint(&format!(
                    "[SCAN] Target: {} // Dimension: {dimension} // {}",
                    self.step.target, self.step.classification
                )));
                ctx.sink.append_line("");
                self.phase = Phase::Calibrating {
                    stage: 0,
                    started_ms: ctx.elapsed_ms,
                };
                return Tick::Again(0);
            }
            Phase::Calibrating { stage, started_ms } => {
                let (stage, started_ms) = (*stage, *started_ms);
                return self.calibrate(ctx, stage, started_ms);
            }
            Phase::Fetching {
                started_ms,
                pending,
            } => (*started_ms, pending),
        };

        let elapsed = ctx.elapsed_ms.saturating_sub(started_ms);
        if self.outcome.is_none() {
            self.outcome = pending.poll_settled();
        }
        if self.outcome.is_none() {
            if let Some(timeout_ms) = self.pacing.timeout_ms.filter(|t| elapsed >= *t) {
                tracing::warn!(target_name = %self.step.target, timeout_ms, "Remote fetch timed out");
                self.outcome = Some(Err(BackendError::Timeout(timeout_ms)));
            }
        }

        let progress = scan_progress(elapsed, self.outcome.is_some(), &self.pacing)
            .max(self.last_progress);
        self.last_progress = progress;
        ctx.sink
            .replace_last_line(&extraction_line(progress, self.spin));
        self.spin += 1;

        if progress < 1.0 {
            return Tick::Again(self.interval_ms);
        }

        let lines = match &self.outcome {
            Some(Ok(result)) => result_lines(&self.step.target, result),
            Some(Err(error)) => failure_lines(error),
            None => Vec::new(),
        };
        for line in &lines {
            ctx.sink.append_line(line);
        }
        Tick::Done
    }
}
