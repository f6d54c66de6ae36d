//! Inline color markers and glyph sets
//!
//! Output lines carry color as inline `{{c:NN}}` markers, where `NN` is an
//! ANSI SGR code. The core never emits escape sequences itself; surfaces
//! translate markers into their own styling.

use serde::{Deserialize, Serialize};

/// Marker that resets styling to the default
pub const RESET: &str = "{{c:0}}";

/// Marker appended when an interruptible sequence is cancelled
pub const CANCEL_MARKER: &str = "{{c:33}}^C{{c:0}}";

/// Named text tones
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    /// No color
    #[default]
    Normal,
    /// Green
    Success,
    /// Red
    Error,
    /// Yellow
    Warning,
    /// Cyan
    Info,
    /// Grey
    Dim,
    /// Bright white
    Highlight,
    /// Magenta
    Quantum,
}

impl Tone {
    /// SGR code for this tone, `None` for [`Tone::Normal`]
    #[must_use]
    pub const fn code(self) -> Option<u8> {
        match self {
            Self::Normal => None,
            Self::Success => Some(32),
            Self::Error => Some(31),
            Self::Warning => Some(33),
            Self::Info => Some(36),
            Self::Dim => Some(90),
            Self::Highlight => Some(97),
            Self::Quantum => Some(35),
        }
    }

    /// Opening marker, empty for [`Tone::Normal`]
    #[must_use]
    pub fn open(self) -> String {
        self.code().map(|c| format!("{{{{c:{c}}}}}")).unwrap_or_default()
    }

    /// Wrap `text` in this tone's markers
    #[must_use]
    pub fn paint(self, text: &str) -> String {
        match self.code() {
            Some(_) => format!("{}{text}{RESET}", self.open()),
            None => text.to_string(),
        }
    }
}

/// Braille dot spinner
pub const SPINNER_DOTS: [char; 10] = ['⠋', '⠙', '⠹', '⠸', '⠼', '⠴', '⠦', '⠧', '⠇', '⠏'];

/// Pulsing block spinner
pub const SPINNER_PULSE: [char; 6] = ['█', '▓', '▒', '░', '▒', '▓'];

/// Quadrant circle spinner
pub const SPINNER_QUANTUM: [char; 4] = ['◐', '◓', '◑', '◒'];

/// Fade-in shading, lightest to solid
pub const FADE_STEPS: [char; 4] = ['░', '▒', '▓', '█'];

/// Noise used by glitch and matrix effects
pub const NOISE_CHARS: &str = "!@#$%^&*()_+-=[]{}|;:,.<>?/~`01";

/// Falling-character alphabet
pub const MATRIX_CHARS: &str = "ｱｲｳｴｵｶｷｸｹｺｻｼｽｾｿﾀﾁﾂﾃﾄﾅﾆﾇﾈﾉ0123456789";
