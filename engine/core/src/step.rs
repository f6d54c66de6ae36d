//! Step Model
//!
//! A [`Step`] is one renderable unit of a [`crate::Sequence`]. The set of
//! variants is closed: the interpreter matches on it exhaustively, so adding a
//! variant is a compile error everywhere it is not yet handled.
//!
//! # Wire Format
//!
//! Steps arrive from backends as JSON objects tagged by `tool`:
//!
//! ```json
//! { "tool": "text", "content": "Establishing link...", "animation": "typewriter" }
//! { "tool": "progress", "style": "npm", "duration": 1200, "text": "fetching" }
//! { "tool": "scan", "target": "sector 7", "dimension": "C-137" }
//! ```
//!
//! Omitted fields take the defaults documented on each payload.

use serde::{Deserialize, Serialize};

use crate::palette::Tone;

/// One renderable unit of output
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "tool", rename_all = "kebab-case")]
pub enum Step {
    /// Text with an optional reveal animation
    Text(TextStep),
    /// Progress bar or spinner for a fixed duration
    Progress(ProgressStep),
    /// Multi-stage process with a spinner per stage
    Process(ProcessStep),
    /// Bordered block of lines under a title
    Section(SectionStep),
    /// Column-aligned table
    Table(TableStep),
    /// Boot-log style status line
    Status(StatusStep),
    /// Falling-character effect
    Matrix(MatrixStep),
    /// Multi-line art
    AsciiArt(AsciiArtStep),
    /// Box-drawn tree
    Tree(TreeStep),
    /// Line-numbered code block
    Code(CodeStep),
    /// Remove trailing lines from the buffer
    ClearLine(ClearLineStep),
    /// Ambient device command
    #[serde(rename = "stream", alias = "quantum-stream")]
    Ambient(AmbientStep),
    /// Remote fetch reconciled with a progress display
    #[serde(rename = "scan", alias = "quantum-scan")]
    RemoteFetch(RemoteFetchStep),
    /// Raw delay
    Wait(WaitStep),
}

/// Effects a step has outside the output sink
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SideEffect {
    /// Drives the ambient device controller
    AmbientDevice,
    /// Issues a network request
    Network,
}

impl Step {
    /// Whether the step renders over multiple frames
    #[must_use]
    pub fn is_animated(&self) -> bool {
        match self {
            Self::Text(text) => text.animation != TextAnimation::Instant || text.delay_ms > 0,
            Self::AsciiArt(art) => art.animation != ArtAnimation::None,
            Self::Progress(_)
            | Self::Process(_)
            | Self::Matrix(_)
            | Self::RemoteFetch(_)
            | Self::Wait(_) => true,
            Self::Section(_)
            | Self::Table(_)
            | Self::Status(_)
            | Self::Tree(_)
            | Self::Code(_)
            | Self::ClearLine(_)
            | Self::Ambient(_) => false,
        }
    }

    /// Declared duration in milliseconds, if the step has one
    #[must_use]
    pub fn duration_ms(&self) -> Option<u64> {
        match self {
            Self::Progress(p) => Some(p.duration_ms),
            Self::Process(p) => Some(p.duration_ms),
            Self::Matrix(m) => Some(m.duration_ms),
            Self::Wait(w) => Some(w.duration_ms),
            _ => None,
        }
    }

    /// Effect outside the sink, if any
    #[must_use]
    pub fn side_effect(&self) -> Option<SideEffect> {
        match self {
            Self::Ambient(_) => Some(SideEffect::AmbientDevice),
            Self::RemoteFetch(_) => Some(SideEffect::Network),
            _ => None,
        }
    }

    /// Instant text step
    #[must_use]
    pub fn text(content: impl Into<String>) -> Self {
        Self::Text(TextStep::new(content))
    }

    /// Instant text step in `tone`
    #[must_use]
    pub fn styled(content: impl Into<String>, tone: Tone) -> Self {
        Self::Text(TextStep::new(content).with_tone(tone))
    }

    /// Typewriter text step
    #[must_use]
    pub fn typewriter(content: impl Into<String>, char_interval_ms: u64) -> Self {
        Self::Text(
            TextStep::new(content)
                .with_animation(TextAnimation::Typewriter)
                .with_interval(char_interval_ms),
        )
    }

    /// Status line
    #[must_use]
    pub fn status(kind: StatusKind, text: impl Into<String>) -> Self {
        Self::Status(StatusStep {
            kind,
            text: text.into(),
            prefix: None,
        })
    }

    /// Raw delay
    #[must_use]
    pub fn wait(duration_ms: u64) -> Self {
        Self::Wait(WaitStep { duration_ms })
    }
}

// ============================================================================
// Text
// ============================================================================

/// How a text step reveals its content
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TextAnimation {
    /// Written in one go
    #[default]
    Instant,
    /// One character per interval
    Typewriter,
    /// Hidden characters shown as blocks, uncovered left to right
    Reveal,
    /// Noise settling into the content
    Glitch,
    /// Shaded blocks fading into the content
    FadeIn,
}

/// Payload of [`Step::Text`]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextStep {
    /// Text to show
    pub content: String,
    /// Reveal animation
    #[serde(default)]
    pub animation: TextAnimation,
    /// Tone of the resting text
    #[serde(default, rename = "style")]
    pub tone: Tone,
    /// Milliseconds per character
    #[serde(default = "default_char_interval", rename = "speed")]
    pub char_interval_ms: u64,
    /// Milliseconds to wait before the first frame
    #[serde(default, rename = "delay")]
    pub delay_ms: u64,
}

fn default_char_interval() -> u64 {
    30
}

impl TextStep {
    /// Instant, unstyled text
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            animation: TextAnimation::Instant,
            tone: Tone::Normal,
            char_interval_ms: default_char_interval(),
            delay_ms: 0,
        }
    }

    /// Set the animation
    #[must_use]
    pub fn with_animation(mut self, animation: TextAnimation) -> Self {
        self.animation = animation;
        self
    }

    /// Set the tone
    #[must_use]
    pub fn with_tone(mut self, tone: Tone) -> Self {
        self.tone = tone;
        self
    }

    /// Set the per-character interval
    #[must_use]
    pub fn with_interval(mut self, char_interval_ms: u64) -> Self {
        self.char_interval_ms = char_interval_ms.max(1);
        self
    }

    /// Set the initial delay
    #[must_use]
    pub fn with_delay(mut self, delay_ms: u64) -> Self {
        self.delay_ms = delay_ms;
        self
    }
}

// ============================================================================
// Progress and process
// ============================================================================

/// Visual style of a progress step
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressStyle {
    /// `[████░░░░] 50%`, 40 cells
    #[default]
    Npm,
    /// `50%[====>    ] 1.2MB/s`, 50 cells
    Wget,
    /// Braille spinner
    Spinner,
    /// Growing ellipsis
    Dots,
    /// `|███░░░| 50%`, 30 cells
    Bar,
    /// Pulsing block
    Pulse,
    /// `▰▰▰▱▱`, 20 cells
    Blocks,
}

/// Payload of [`Step::Progress`]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressStep {
    /// Bar style
    #[serde(default)]
    pub style: ProgressStyle,
    /// Label shown next to the bar
    #[serde(default)]
    pub text: Option<String>,
    /// Total duration
    #[serde(rename = "duration")]
    pub duration_ms: u64,
    /// Fixed percentage shown instead of the computed one
    #[serde(default)]
    pub percent: Option<u32>,
    /// Whether to show a percentage
    #[serde(default = "default_true")]
    pub show_percent: bool,
}

fn default_true() -> bool {
    true
}

/// Kind of simulated process, which selects the spinner and stage wording
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessKind {
    /// Generic loading
    #[default]
    Loading,
    /// Scanning with a quadrant spinner
    Scanning,
    /// Compilation
    Compiling,
    /// Decryption with a hex preview
    Decrypt,
    /// Upload
    Upload,
    /// Download
    Download,
    /// Analysis
    Analyze,
    /// Synchronisation
    Sync,
}

/// Payload of [`Step::Process`]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessStep {
    /// Process kind
    #[serde(default, rename = "type")]
    pub kind: ProcessKind,
    /// Description, also the single stage when `stages` is empty
    pub text: String,
    /// Total duration, split evenly across stages
    #[serde(rename = "duration")]
    pub duration_ms: u64,
    /// Stage labels
    #[serde(default)]
    pub stages: Vec<String>,
    /// Whether to animate a spinner
    #[serde(default = "default_true")]
    pub show_spinner: bool,
}

impl ProcessStep {
    /// Stage labels, falling back to the description
    #[must_use]
    pub fn effective_stages(&self) -> Vec<String> {
        if self.stages.is_empty() {
            vec![self.text.clone()]
        } else {
            self.stages.clone()
        }
    }
}

// ============================================================================
// Static blocks
// ============================================================================

/// Border style of a section
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionStyle {
    /// Double-line box
    #[default]
    Box,
    /// Horizontal rules
    Line,
    /// Title only
    Minimal,
}

/// Section body, either one string or a list of lines
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SectionContent {
    /// Single line
    One(String),
    /// Several lines
    Many(Vec<String>),
}

impl SectionContent {
    /// Body as lines
    #[must_use]
    pub fn lines(&self) -> Vec<&str> {
        match self {
            Self::One(line) => vec![line.as_str()],
            Self::Many(lines) => lines.iter().map(String::as_str).collect(),
        }
    }
}

/// Payload of [`Step::Section`]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SectionStep {
    /// Heading
    pub title: String,
    /// Body
    pub content: SectionContent,
    /// Border style
    #[serde(default)]
    pub style: SectionStyle,
    /// Border tone
    #[serde(default = "default_section_tone", rename = "color")]
    pub tone: Tone,
}

fn default_section_tone() -> Tone {
    Tone::Info
}

/// Table layout
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableStyle {
    /// Header, dashed rule, rows
    #[default]
    Simple,
    /// Fully boxed
    Box,
    /// Header and rows only
    Minimal,
}

/// Payload of [`Step::Table`]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TableStep {
    /// Column headers
    pub headers: Vec<String>,
    /// Row cells
    #[serde(default)]
    pub rows: Vec<Vec<String>>,
    /// Layout
    #[serde(default)]
    pub style: TableStyle,
}

/// Outcome shown by a status line
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusKind {
    /// `[  OK  ]`
    Ok,
    /// `[ FAIL ]`
    Fail,
    /// `[ WARN ]`
    Warn,
    /// `[ INFO ]`
    Info,
    /// `[ SKIP ]`
    Skip,
    /// `[ DONE ]`
    Done,
}

impl StatusKind {
    /// Bracketed label
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Ok => "[  OK  ]",
            Self::Fail => "[ FAIL ]",
            Self::Warn => "[ WARN ]",
            Self::Info => "[ INFO ]",
            Self::Skip => "[ SKIP ]",
            Self::Done => "[ DONE ]",
        }
    }

    /// Label tone
    #[must_use]
    pub const fn tone(self) -> Tone {
        match self {
            Self::Ok | Self::Done => Tone::Success,
            Self::Fail => Tone::Error,
            Self::Warn => Tone::Warning,
            Self::Info => Tone::Info,
            Self::Skip => Tone::Dim,
        }
    }
}

/// Payload of [`Step::Status`]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StatusStep {
    /// Outcome
    #[serde(rename = "type")]
    pub kind: StatusKind,
    /// Message
    pub text: String,
    /// Extra label between the bracketed status and the message
    #[serde(default)]
    pub prefix: Option<String>,
}

/// Payload of [`Step::Matrix`]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MatrixStep {
    /// Total duration
    #[serde(rename = "duration")]
    pub duration_ms: u64,
    /// Character density, 1 to 10
    #[serde(default = "default_density")]
    pub density: u8,
    /// Message left behind when the effect ends
    #[serde(default)]
    pub message: Option<String>,
}

fn default_density() -> u8 {
    5
}

/// Reveal mode for ascii art
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtAnimation {
    /// All lines at once
    #[default]
    None,
    /// Each line typed out
    Typewriter,
    /// One line at a time
    Reveal,
}

/// Payload of [`Step::AsciiArt`]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AsciiArtStep {
    /// Newline separated art
    pub art: String,
    /// Reveal mode
    #[serde(default)]
    pub animation: ArtAnimation,
    /// Tone
    #[serde(default, rename = "color")]
    pub tone: Tone,
}

/// Node of a [`TreeStep`]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TreeNode {
    /// Label
    pub name: String,
    /// Children, rendered in order
    #[serde(default)]
    pub children: Vec<TreeNode>,
}

/// Payload of [`Step::Tree`]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TreeStep {
    /// Root node
    pub data: TreeNode,
}

/// Payload of [`Step::Code`]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CodeStep {
    /// Source text
    pub content: String,
    /// Language label
    #[serde(default)]
    pub language: Option<String>,
    /// One-based line numbers to emphasise
    #[serde(default)]
    pub highlight: Vec<usize>,
}

/// Payload of [`Step::ClearLine`]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClearLineStep {
    /// Number of trailing lines to remove
    #[serde(default = "default_clear_count")]
    pub count: usize,
}

fn default_clear_count() -> usize {
    1
}

// ============================================================================
// Side-effecting steps
// ============================================================================

/// Command sent to the ambient device
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceAction {
    /// Start playback
    Play,
    /// Pause playback
    Pause,
    /// Stop playback
    Stop,
    /// Jump to a position (seconds)
    Seek,
    /// Set the volume (0 to 1)
    Volume,
    /// Silence output
    Mute,
    /// Restore output
    Unmute,
    /// Report state only
    Status,
}

impl DeviceAction {
    /// Line shown when the step carries no message
    #[must_use]
    pub fn default_message(self, value: Option<f64>) -> String {
        match self {
            Self::Play => "Initiating quantum audio stream...".to_string(),
            Self::Pause => "Stream paused".to_string(),
            Self::Stop => "Stream terminated".to_string(),
            Self::Seek => format!("Seeking to position {}s", value.unwrap_or(0.0)),
            Self::Volume => format!(
                "Volume adjusted to {}%",
                (value.unwrap_or(0.5) * 100.0).round()
            ),
            Self::Mute => "Audio muted".to_string(),
            Self::Unmute => "Audio unmuted".to_string(),
            Self::Status => "Checking stream status...".to_string(),
        }
    }
}

/// Payload of [`Step::Ambient`]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AmbientStep {
    /// Device command
    pub action: DeviceAction,
    /// Command argument
    #[serde(default)]
    pub value: Option<f64>,
    /// Line shown in place of the default message
    #[serde(default)]
    pub message: Option<String>,
}

/// Payload of [`Step::RemoteFetch`]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RemoteFetchStep {
    /// What to fetch
    pub target: String,
    /// Source dimension
    #[serde(default)]
    pub dimension: Option<String>,
    /// Classification label
    #[serde(default = "default_classification")]
    pub classification: String,
    /// Requested timestamp
    #[serde(default)]
    pub timestamp: Option<String>,
}

fn default_classification() -> String {
    "CLASSIFIED".to_string()
}

/// Payload of [`Step::Wait`]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WaitStep {
    /// Delay
    #[serde(rename = "duration")]
    pub duration_ms: u64,
}

// ============================================================================
// Tests
// ============================================================================
