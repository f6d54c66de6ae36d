//! Inline color markup
//!
//! Core output carries color as `{{c:NN}}` markers (`NN` an SGR code, or
//! several joined with `;`). This module splits a line into styled segments
//! and builds ratatui [`Line`]s from them. Text that only looks like a marker
//! is kept literally.

use ratatui::style::Style;
use ratatui::text::{Line, Span};

use crate::theme::sgr_style;

const OPEN: &str = "{{c:";
const CLOSE: &str = "}}";
const IMAGE_PREFIX: &str = "[IMAGE:data:";

/// A run of text in one style
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Segment {
    /// Style in effect
    pub style: Style,
    /// Text without markers
    pub text: String,
}

/// Split `line` into styled segments
#[must_use]
pub fn parse(line: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut style = Style::default();
    let mut text = String::new();
    let mut rest = line;

    while let Some(start) = rest.find(OPEN) {
        let after = &rest[start + OPEN.len()..];
        let Some(end) = after.find(CLOSE) else {
            break;
        };
        let Some(next) = apply_codes(style, &after[..end]) else {
            // Not a marker; keep the opening brace and move on
            text.push_str(&rest[..start + 1]);
            rest = &rest[start + 1..];
            continue;
        };

        text.push_str(&rest[..start]);
        if !text.is_empty() {
            segments.push(Segment {
                style,
                text: std::mem::take(&mut text),
            });
        }
        style = next;
        rest = &after[end + CLOSE.len()..];
    }

    text.push_str(rest);
    if !text.is_empty() {
        segments.push(Segment { style, text });
    }
    segments
}

/// Style after applying `codes` to `current`; `None` when not numeric
fn apply_codes(current: Style, codes: &str) -> Option<Style> {
    let mut style = current;
    for code in codes.split(';') {
        let code: u8 = code.trim().parse().ok()?;
        style = match sgr_style(code) {
            Some(next) => style.patch(next),
            None if code == 0 => Style::default(),
            None => style,
        };
    }
    Some(style)
}

/// `line` with every marker removed
#[must_use]
pub fn plain(line: &str) -> String {
    parse(line).into_iter().map(|s| s.text).collect()
}

/// Short stand-in for an inline image marker, if `line` is one
#[must_use]
pub fn image_placeholder(line: &str) -> Option<String> {
    let body = line.strip_prefix(IMAGE_PREFIX)?.strip_suffix(']')?;
    let (mime, data) = body.split_once(";base64,")?;
    // base64 packs 3 bytes into every 4 characters
    let bytes = data.len() / 4 * 3;
    Some(format!("[image: {mime}, ~{bytes} bytes]"))
}

/// Styled ratatui line for `line`
#[must_use]
pub fn to_line(line: &str) -> Line<'static> {
    if let Some(placeholder) = image_placeholder(line) {
        return Line::from(Span::styled(
            placeholder,
            Style::default().fg(ratatui::style::Color::DarkGray),
        ));
    }
    Line::from(
        parse(line)
            .into_iter()
            .map(|s| Span::styled(s.text, s.style))
            .collect::<Vec<_>>(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use ratatui::style::Color;

    #[test]
    fn test_plain_text_is_one_segment() {
        assert_eq!(
            parse("uptime"),
            vec![Segment {
                style: Style::default(),
                text: "uptime".to_string()
            }]
        );
        assert!(parse("").is_empty());
    }

    #[test]
    fn test_markers_switch_style() {
        let segments = parse("{{c:32}}[ OK ]{{c:0}} Started");
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].style, Style::default().fg(Color::Green));
        assert_eq!(segments[0].text, "[ OK ]");
        assert_eq!(segments[1].style, Style::default());
        assert_eq!(segments[1].text, " Started");
    }

    #[test]
    fn test_combined_codes() {
        let segments = parse("{{c:1;31}}fail");
        assert_eq!(
            segments[0].style,
            Style::default()
                .add_modifier(ratatui::style::Modifier::BOLD)
                .fg(Color::Red)
        );
    }

    #[test]
    fn test_non_markers_are_literal() {
        assert_eq!(plain("{{c:x}} and {{c:"), "{{c:x}} and {{c:");
        assert_eq!(plain("a {{c:33}}^C{{c:0}}"), "a ^C");
    }

    #[test]
    fn test_image_placeholder() {
        assert_eq!(
            image_placeholder("[IMAGE:data:image/png;base64,aGVsbG8h]").as_deref(),
            Some("[image: image/png, ~6 bytes]")
        );
        assert_eq!(image_placeholder("[IMAGE:nope]"), None);
    }
}
