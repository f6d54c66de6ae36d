//! Time-sliced renderers
//!
//! One [`FrameTask`] per animated step variant. Every task opens a line on its
//! first frame, rewrites it with `replace_last_line` on later frames, and ends
//! on the step's resting representation rather than an interpolated frame.

use rand::seq::SliceRandom;
use rand::Rng;

use super::blocks;
use super::scheduler::{FrameContext, FrameTask, Tick};
use crate::palette::{
    Tone, FADE_STEPS, MATRIX_CHARS, NOISE_CHARS, SPINNER_DOTS, SPINNER_PULSE, SPINNER_QUANTUM,
};
use crate::step::{
    ArtAnimation, AsciiArtStep, MatrixStep, ProcessKind, ProcessStep, ProgressStep,
    ProgressStyle, TextAnimation, TextStep, WaitStep,
};

/// Frame period of the falling-character effect
const MATRIX_FRAME_MS: u64 = 100;
/// Width of the falling-character effect
const MATRIX_WIDTH: usize = 60;
/// Per-character delay of typed ascii art
const ART_CHAR_MS: u64 = 5;
/// Per-line delay of revealed ascii art
const ART_LINE_MS: u64 = 50;
/// Phase length of the fade-in animation
const FADE_PHASE_MS: u64 = 100;
/// Extra frames a glitch keeps scrambling after the last character lands
const GLITCH_TAIL: usize = 5;

fn fraction(elapsed_ms: u64, duration_ms: u64) -> f64 {
    if duration_ms == 0 {
        1.0
    } else {
        (elapsed_ms as f64 / duration_ms as f64).min(1.0)
    }
}

fn percent(fraction: f64) -> u32 {
    (fraction * 100.0).round() as u32
}

fn noise_char(rng: &mut impl Rng, alphabet: &str) -> char {
    let chars: Vec<char> = alphabet.chars().collect();
    chars.choose(rng).copied().unwrap_or('#')
}

// ============================================================================
// Text
// ============================================================================

/// Animated text
pub(crate) struct TextFrames<'a> {
    step: &'a TextStep,
    chars: Vec<char>,
    delayed: bool,
    opened: bool,
    shown: usize,
}

impl<'a> TextFrames<'a> {
    pub(crate) fn new(step: &'a TextStep) -> Self {
        Self {
            step,
            chars: step.content.chars().collect(),
            delayed: step.delay_ms == 0,
            opened: false,
            shown: 0,
        }
    }

    fn prefix(&self, n: usize) -> String {
        self.chars[..n.min(self.chars.len())].iter().collect()
    }

    fn rest(ctx: &mut FrameContext<'_>, step: &TextStep) -> Tick {
        ctx.sink.replace_last_line(&blocks::text(step));
        Tick::Done
    }
}

impl FrameTask for TextFrames<'_> {
    fn tick(&mut self, ctx: &mut FrameContext<'_>) -> Tick {
        if !self.delayed {
            self.delayed = true;
            return Tick::Again(self.step.delay_ms);
        }
        if !self.opened {
            ctx.sink.append_line("");
            self.opened = true;
        }

        let len = self.chars.len();
        let interval = self.step.char_interval_ms.max(1);
        let tone = self.step.tone;

        match self.step.animation {
            TextAnimation::Instant => Self::rest(ctx, self.step),
            TextAnimation::Typewriter => {
                self.shown += 1;
                if self.shown >= len {
                    return Self::rest(ctx, self.step);
                }
                ctx.sink.replace_last_line(&tone.paint(&self.prefix(self.shown)));
                Tick::Again(interval)
            }
            TextAnimation::Reveal => {
                if self.shown >= len {
                    return Self::rest(ctx, self.step);
                }
                let hidden = "█".repeat(len - self.shown);
                let line = format!(
                    "{}{}",
                    tone.paint(&self.prefix(self.shown)),
                    Tone::Dim.paint(&hidden)
                );
                ctx.sink.replace_last_line(&line);
                self.shown += 1;
                Tick::Again(interval.saturating_mul(2))
            }
            TextAnimation::Glitch => {
                if self.shown >= len + GLITCH_TAIL {
                    return Self::rest(ctx, self.step);
                }
                let settled = self.shown.saturating_sub(GLITCH_TAIL);
                let mut rng = rand::thread_rng();
                let line: String = self
                    .chars
                    .iter()
                    .take(self.shown.min(len))
                    .enumerate()
                    .map(|(i, c)| {
                        if i < settled || c.is_whitespace() {
                            *c
                        } else {
                            noise_char(&mut rng, NOISE_CHARS)
                        }
                    })
                    .collect();
                ctx.sink.replace_last_line(&tone.paint(&line));
                self.shown += 1;
                Tick::Again(interval)
            }
            TextAnimation::FadeIn => {
                let Some(shade) = FADE_STEPS.get(self.shown) else {
                    return Self::rest(ctx, self.step);
                };
                let line: String = self
                    .chars
                    .iter()
                    .map(|c| if c.is_whitespace() { *c } else { *shade })
                    .collect();
                ctx.sink.replace_last_line(&tone.paint(&line));
                self.shown += 1;
                Tick::Again(FADE_PHASE_MS)
            }
        }
    }
}

// ============================================================================
// Ascii art
// ============================================================================

/// Ascii art typed out or revealed line by line
pub(crate) struct ArtFrames<'a> {
    step: &'a AsciiArtStep,
    lines: Vec<&'a str>,
    line: usize,
    column: usize,
}

impl<'a> ArtFrames<'a> {
    pub(crate) fn new(step: &'a AsciiArtStep) -> Self {
        Self {
            step,
            lines: step.art.split('\n').collect(),
            line: 0,
            column: 0,
        }
    }
}

impl FrameTask for ArtFrames<'_> {
    fn tick(&mut self, ctx: &mut FrameContext<'_>) -> Tick {
        let Some(current) = self.lines.get(self.line) else {
            return Tick::Done;
        };
        let tone = self.step.tone;

        match self.step.animation {
            ArtAnimation::None | ArtAnimation::Reveal => {
                ctx.sink.append_line(&tone.paint(current));
                self.line += 1;
                if self.line == self.lines.len() {
                    Tick::Done
                } else if self.step.animation == ArtAnimation::None {
                    Tick::Again(0)
                } else {
                    Tick::Again(ART_LINE_MS)
                }
            }
            ArtAnimation::Typewriter => {
                let width = current.chars().count();
                if self.column == 0 {
                    ctx.sink.append_line("");
                }
                self.column += 1;
                if self.column >= width {
                    ctx.sink.replace_last_line(&tone.paint(current));
                    self.line += 1;
                    self.column = 0;
                    return if self.line == self.lines.len() {
                        Tick::Done
                    } else {
                        Tick::Again(ART_CHAR_MS)
                    };
                }
                let typed: String = current.chars().take(self.column).collect();
                ctx.sink.replace_last_line(&tone.paint(&typed));
                Tick::Again(ART_CHAR_MS)
            }
        }
    }
}

// ============================================================================
// Progress
// ============================================================================

/// Render one progress frame
///
/// `resting` frames are deterministic: no random throughput, spinners settle
/// into a check mark.
#[must_use]
pub fn progress_line(step: &ProgressStep, fraction: f64, frame: u64, resting: bool) -> String {
    let pct = step.percent.unwrap_or_else(|| percent(fraction));
    let pct_suffix = if step.show_percent {
        format!(" {pct}%")
    } else {
        String::new()
    };
    let label = |fallback: &str| step.text.clone().unwrap_or_else(|| fallback.to_string());
    let cells = |width: usize| ((fraction * width as f64).round() as usize).min(width);
    let frame = usize::try_from(frame).unwrap_or(0);

    match step.style {
        ProgressStyle::Npm => {
            let filled = cells(40);
            format!(
                "{} [{}{}]{pct_suffix}",
                label("Loading"),
                "█".repeat(filled),
                "░".repeat(40 - filled)
            )
        }
        ProgressStyle::Wget => {
            let filled = cells(50);
            let arrow = if filled > 0 { ">" } else { "" };
            let rate = if resting {
                3.0 * fraction
            } else {
                rand::thread_rng().gen_range(1.0..6.0) * fraction
            };
            format!(
                "{} {pct}%[{}{arrow}{}] {rate:.2}MB/s",
                label("Downloading"),
                "=".repeat(filled.saturating_sub(1)),
                " ".repeat(50 - filled)
            )
        }
        ProgressStyle::Spinner | ProgressStyle::Pulse => {
            let text = label("Processing...");
            if resting {
                format!("{} {text}", Tone::Success.paint("✓"))
            } else if step.style == ProgressStyle::Spinner {
                format!("{} {text}", SPINNER_DOTS[frame % SPINNER_DOTS.len()])
            } else {
                format!("{} {text}", SPINNER_PULSE[frame % SPINNER_PULSE.len()])
            }
        }
        ProgressStyle::Dots => {
            let dots = if resting { 3 } else { (frame / 5) % 4 };
            format!("{}{:<3}", label("Loading"), ".".repeat(dots))
        }
        ProgressStyle::Bar => {
            let filled = cells(30);
            format!("[{}{}]{pct_suffix}", "▓".repeat(filled), "░".repeat(30 - filled))
        }
        ProgressStyle::Blocks => {
            let width = 20;
            let blocks: String = (0..width)
                .map(|i| {
                    let phase = fraction * width as f64 - i as f64;
                    if phase >= 1.0 {
                        '█'
                    } else if phase > 0.0 {
                        FADE_STEPS[((phase * FADE_STEPS.len() as f64) as usize)
                            .min(FADE_STEPS.len() - 1)]
                    } else {
                        '░'
                    }
                })
                .collect();
            format!("[{blocks}] {}", label(""))
                .trim_end()
                .to_string()
        }
    }
}

/// Progress bar or spinner over a fixed duration
pub(crate) struct ProgressFrames<'a> {
    step: &'a ProgressStep,
    interval_ms: u64,
}

impl<'a> ProgressFrames<'a> {
    pub(crate) fn new(step: &'a ProgressStep, interval_ms: u64) -> Self {
        Self { step, interval_ms }
    }
}

impl FrameTask for ProgressFrames<'_> {
    fn tick(&mut self, ctx: &mut FrameContext<'_>) -> Tick {
        if ctx.frame == 0 {
            ctx.sink.append_line("");
        }
        let done = fraction(ctx.elapsed_ms, self.step.duration_ms);
        if done >= 1.0 {
            ctx.sink
                .replace_last_line(&progress_line(self.step, 1.0, ctx.frame, true));
            return Tick::Done;
        }
        ctx.sink
            .replace_last_line(&progress_line(self.step, done, ctx.frame, false));
        let remaining = self.step.duration_ms.saturating_sub(ctx.elapsed_ms);
        Tick::Again(self.interval_ms.min(remaining))
    }
}

// ============================================================================
// Process
// ============================================================================

/// Resting line of a finished stage
#[must_use]
pub fn stage_done_line(stage: &str) -> String {
    format!("{} {stage}", Tone::Success.paint("✓"))
}

fn process_line(kind: ProcessKind, stage: &str, pct: u32, frame: usize, spinner: bool) -> String {
    let spin = if spinner {
        format!("{} ", SPINNER_QUANTUM[frame % SPINNER_QUANTUM.len()])
    } else {
        String::new()
    };
    let status = match kind {
        ProcessKind::Decrypt => format!("{stage} [{pct}%]"),
        ProcessKind::Scanning => format!("{stage} {}", "·".repeat(frame % 4)),
        ProcessKind::Sync => format!("{stage} ↔ {pct}%"),
        ProcessKind::Loading
        | ProcessKind::Compiling
        | ProcessKind::Upload
        | ProcessKind::Download
        | ProcessKind::Analyze => stage.to_string(),
    };
    Tone::Info.paint(&format!("{spin}{status}"))
}

/// Multi-stage process; the duration is split evenly across stages
pub(crate) struct ProcessFrames<'a> {
    step: &'a ProcessStep,
    stages: Vec<String>,
    stage: usize,
    stage_started_ms: Option<u64>,
    stage_frame: usize,
    interval_ms: u64,
}

impl<'a> ProcessFrames<'a> {
    pub(crate) fn new(step: &'a ProcessStep, interval_ms: u64) -> Self {
        Self {
            step,
            stages: step.effective_stages(),
            stage: 0,
            stage_started_ms: None,
            stage_frame: 0,
            interval_ms,
        }
    }

    fn stage_ms(&self) -> u64 {
        self.step.duration_ms / self.stages.len().max(1) as u64
    }
}

impl FrameTask for ProcessFrames<'_> {
    fn tick(&mut self, ctx: &mut FrameContext<'_>) -> Tick {
        let Some(label) = self.stages.get(self.stage) else {
            return Tick::Done;
        };
        let started = match self.stage_started_ms {
            Some(started) => started,
            None => {
                ctx.sink.append_line("");
                self.stage_started_ms = Some(ctx.elapsed_ms);
                self.stage_frame = 0;
                ctx.elapsed_ms
            }
        };

        let stage_ms = self.stage_ms();
        let stage_elapsed = ctx.elapsed_ms.saturating_sub(started);
        if stage_elapsed >= stage_ms {
            ctx.sink.replace_last_line(&stage_done_line(label));
            self.stage += 1;
            self.stage_started_ms = None;
            return if self.stage == self.stages.len() {
                Tick::Done
            } else {
                Tick::Again(0)
            };
        }

        let pct = percent(fraction(stage_elapsed, stage_ms));
        ctx.sink.replace_last_line(&process_line(
            self.step.kind,
            label,
            pct,
            self.stage_frame,
            self.step.show_spinner,
        ));
        self.stage_frame += 1;
        Tick::Again(self.interval_ms.min(stage_ms.saturating_sub(stage_elapsed)))
    }
}

// ============================================================================
// Matrix and wait
// ============================================================================

/// Falling-character noise, optionally resolving into a message
pub(crate) struct MatrixFrames<'a> {
    step: &'a MatrixStep,
}

impl<'a> MatrixFrames<'a> {
    pub(crate) fn new(step: &'a MatrixStep) -> Self {
        Self { step }
    }
}

impl FrameTask for MatrixFrames<'_> {
    fn tick(&mut self, ctx: &mut FrameContext<'_>) -> Tick {
        if ctx.frame == 0 {
            ctx.sink.append_line("");
        }
        let frames = self.step.duration_ms / MATRIX_FRAME_MS;
        if ctx.frame < frames {
            let density = f64::from(self.step.density.clamp(1, 10)) / 20.0;
            let mut rng = rand::thread_rng();
            let line: String = (0..MATRIX_WIDTH)
                .map(|_| {
                    if rng.gen_bool(density) {
                        Tone::Success.paint(&noise_char(&mut rng, MATRIX_CHARS).to_string())
                    } else {
                        " ".to_string()
                    }
                })
                .collect();
            ctx.sink.replace_last_line(&line);
            return Tick::Again(MATRIX_FRAME_MS);
        }

        if let Some(message) = &self.step.message {
            let padding = MATRIX_WIDTH.saturating_sub(message.chars().count()) / 2;
            ctx.sink.replace_last_line(&format!(
                "{}{}",
                " ".repeat(padding),
                Tone::Highlight.paint(message)
            ));
        }
        Tick::Done
    }
}

/// Silent delay, polled so cancellation lands promptly
pub(crate) struct WaitFrames {
    duration_ms: u64,
    poll_ms: u64,
}

impl WaitFrames {
    pub(crate) fn new(step: &WaitStep, poll_ms: u64) -> Self {
        Self {
            duration_ms: step.duration_ms,
            poll_ms: poll_ms.max(1),
        }
    }
}

impl FrameTask for WaitFrames {
    fn tick(&mut self, ctx: &mut FrameContext<'_>) -> Tick {
        if ctx.elapsed_ms >= self.duration_ms {
            Tick::Done
        } else {
            Tick::Again(self.poll_ms.min(self.duration_ms.saturating_sub(ctx.elapsed_ms)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Clock, VirtualClock};
    use crate::interpreter::scheduler::FrameScheduler;
    use crate::sink::{OutputSink, Scrollback};
    use pretty_assertions::assert_eq;

    /// Records every sink call so intermediate frames can be inspected
    #[derive(Default)]
    struct FrameLog {
        buffer: Scrollback,
        writes: Vec<String>,
    }

    impl OutputSink for FrameLog {
        fn append_line(&mut self, line: &str) {
            self.writes.push(format!("+{line}"));
            self.buffer.append_line(line);
        }
        fn replace_last_line(&mut self, line: &str) {
            self.writes.push(format!("={line}"));
            self.buffer.replace_last_line(line);
        }
        fn remove_last_lines(&mut self, count: usize) {
            self.buffer.remove_last_lines(count);
        }
        fn clear(&mut self) {
            self.buffer.clear();
        }
    }

    async fn run(task: Box<dyn FrameTask + '_>, clock: &VirtualClock) -> FrameLog {
        let mut log = FrameLog::default();
        let mut scheduler = FrameScheduler::new(clock);
        scheduler.schedule(task);
        scheduler.drain(&mut log, None).await;
        log
    }

    #[tokio::test]
    async fn test_typewriter_frames() {
        let clock = VirtualClock::new();
        let step = TextStep::new("abc")
            .with_animation(TextAnimation::Typewriter)
            .with_tone(Tone::Success)
            .with_interval(10);
        let log = run(Box::new(TextFrames::new(&step)), &clock).await;

        assert_eq!(
            log.writes,
            vec![
                "+",
                "={{c:32}}a{{c:0}}",
                "={{c:32}}ab{{c:0}}",
                "={{c:32}}abc{{c:0}}"
            ]
        );
        assert_eq!(clock.now_ms(), 20);
    }

    #[tokio::test]
    async fn test_text_delay_precedes_output() {
        let clock = VirtualClock::new();
        let step = TextStep::new("late").with_delay(250);
        let log = run(Box::new(TextFrames::new(&step)), &clock).await;

        assert_eq!(log.buffer.snapshot(), vec!["late"]);
        assert_eq!(clock.now_ms(), 250);
    }

    #[tokio::test]
    async fn test_every_text_animation_rests_on_content() {
        for animation in [
            TextAnimation::Reveal,
            TextAnimation::Glitch,
            TextAnimation::FadeIn,
        ] {
            let clock = VirtualClock::new();
            let step = TextStep::new("signal lost").with_animation(animation);
            let log = run(Box::new(TextFrames::new(&step)), &clock).await;
            assert_eq!(log.buffer.snapshot(), vec!["signal lost"], "{animation:?}");
        }
    }

    #[tokio::test]
    async fn test_progress_rests_at_full() {
        let clock = VirtualClock::new();
        let step = ProgressStep {
            style: ProgressStyle::Bar,
            text: None,
            duration_ms: 400,
            percent: None,
            show_percent: true,
        };
        let log = run(Box::new(ProgressFrames::new(&step, 80)), &clock).await;

        let last = log.buffer.last().unwrap().to_string();
        assert_eq!(last, format!("[{}] 100%", "▓".repeat(30)));
        assert_eq!(log.buffer.len(), 1);
        assert!(log.writes.iter().any(|w| w.ends_with(" 20%")));
    }

    #[test]
    fn test_progress_line_styles() {
        let step = |style| ProgressStep {
            style,
            text: Some("pkg".to_string()),
            duration_ms: 1000,
            percent: None,
            show_percent: true,
        };
        assert_eq!(
            progress_line(&step(ProgressStyle::Npm), 0.5, 0, false),
            format!("pkg [{}{}] 50%", "█".repeat(20), "░".repeat(20))
        );
        assert_eq!(
            progress_line(&step(ProgressStyle::Dots), 1.0, 0, true),
            "pkg..."
        );
        assert_eq!(
            progress_line(&step(ProgressStyle::Spinner), 1.0, 3, true),
            "{{c:32}}✓{{c:0}} pkg"
        );
        assert_eq!(
            progress_line(&step(ProgressStyle::Blocks), 1.0, 0, true),
            format!("[{}] pkg", "█".repeat(20))
        );
        assert!(progress_line(&step(ProgressStyle::Wget), 1.0, 0, true).ends_with("3.00MB/s"));
    }

    #[test]
    fn test_fixed_percent_label() {
        let step = ProgressStep {
            style: ProgressStyle::Bar,
            text: None,
            duration_ms: 1000,
            percent: Some(73),
            show_percent: true,
        };
        assert!(progress_line(&step, 0.1, 0, false).ends_with(" 73%"));
    }

    #[tokio::test]
    async fn test_process_stages_each_rest() {
        let clock = VirtualClock::new();
        let step = ProcessStep {
            kind: ProcessKind::Decrypt,
            text: "unused".to_string(),
            duration_ms: 600,
            stages: vec!["one".to_string(), "two".to_string()],
            show_spinner: true,
        };
        let log = run(Box::new(ProcessFrames::new(&step, 80)), &clock).await;

        assert_eq!(
            log.buffer.snapshot(),
            vec![stage_done_line("one"), stage_done_line("two")]
        );
        assert_eq!(clock.now_ms(), 600);
    }

    #[tokio::test]
    async fn test_matrix_resolves_to_message() {
        let clock = VirtualClock::new();
        let step = MatrixStep {
            duration_ms: 300,
            density: 5,
            message: Some("WAKE UP".to_string()),
        };
        let log = run(Box::new(MatrixFrames::new(&step)), &clock).await;

        let expected = format!("{}{{{{c:97}}}}WAKE UP{{{{c:0}}}}", " ".repeat(26));
        assert_eq!(log.buffer.snapshot(), vec![expected]);
        assert_eq!(clock.now_ms(), 300);
    }

    #[tokio::test]
    async fn test_typed_art_lines() {
        let clock = VirtualClock::new();
        let step = AsciiArtStep {
            art: "/\\\n\\/".to_string(),
            animation: ArtAnimation::Typewriter,
            tone: Tone::Normal,
        };
        let log = run(Box::new(ArtFrames::new(&step)), &clock).await;
        assert_eq!(log.buffer.snapshot(), vec!["/\\", "\\/"]);
    }

    #[tokio::test]
    async fn test_wait_polls_until_duration() {
        let clock = VirtualClock::new();
        let log = run(
            Box::new(WaitFrames::new(&WaitStep { duration_ms: 120 }, 50)),
            &clock,
        )
        .await;
        assert!(log.writes.is_empty());
        assert_eq!(clock.now_ms(), 120);
    }
}
