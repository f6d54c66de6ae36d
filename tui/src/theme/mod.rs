//! Theme and Colors
//!
//! Maps the SGR codes carried by `{{c:NN}}` markers onto terminal colors,
//! plus the few colors the chrome itself uses.

use ratatui::style::{Color, Modifier, Style};

// ============================================================================
// Marker Colors
// ============================================================================

/// Style for one SGR code; `None` for codes that reset or are unknown
#[must_use]
pub fn sgr_style(code: u8) -> Option<Style> {
    let style = Style::default();
    let styled = match code {
        0 => return None,
        1 => style.add_modifier(Modifier::BOLD),
        2 => style.add_modifier(Modifier::DIM),
        3 => style.add_modifier(Modifier::ITALIC),
        4 => style.add_modifier(Modifier::UNDERLINED),
        7 => style.add_modifier(Modifier::REVERSED),
        30..=37 | 90..=97 => style.fg(ansi_color(code)?),
        40..=47 | 100..=107 => style.bg(ansi_color(code - 10)?),
        _ => return None,
    };
    Some(styled)
}

fn ansi_color(code: u8) -> Option<Color> {
    let color = match code {
        30 => Color::Black,
        31 => Color::Red,
        32 => Color::Green,
        33 => Color::Yellow,
        34 => Color::Blue,
        35 => Color::Magenta,
        36 => Color::Cyan,
        37 => Color::Gray,
        90 => Color::DarkGray,
        91 => Color::LightRed,
        92 => Color::LightGreen,
        93 => Color::LightYellow,
        94 => Color::LightBlue,
        95 => Color::LightMagenta,
        96 => Color::LightCyan,
        97 => Color::White,
        _ => return None,
    };
    Some(color)
}

// ============================================================================
// UI Colors
// ============================================================================

/// Prompt text
pub const PROMPT_GREEN: Color = Color::Rgb(130, 220, 130);

/// Status bar background
pub const STATUS_BG: Color = Color::Rgb(40, 40, 48);

/// Status bar text
pub const STATUS_FG: Color = Color::Rgb(170, 170, 180);

/// Chat mode accent
pub const CHAT_MAGENTA: Color = Color::Magenta;

/// File manager panel background
pub const PANEL_BLUE: Color = Color::Rgb(0, 0, 160);

/// File manager selection
pub const PANEL_CYAN: Color = Color::Rgb(0, 170, 170);

/// File manager text
pub const PANEL_TEXT: Color = Color::Rgb(220, 220, 220);
