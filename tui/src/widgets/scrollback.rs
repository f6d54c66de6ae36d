//! Scrollback Widget
//!
//! A borderless terminal history view. Lines are hard-wrapped at the area
//! width the way a terminal wraps them, and the view is anchored to the
//! bottom: an offset of 0 shows the newest output.

use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::text::{Line, Span};
use ratatui::widgets::StatefulWidget;
use unicode_width::UnicodeWidthChar;

use crate::markup;

/// Scroll position of a [`ScrollbackView`]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ScrollbackState {
    /// Rows scrolled up from the bottom (0 = latest)
    pub offset: usize,
    /// Wrapped rows at the last render
    pub total_rows: usize,
}

impl ScrollbackState {
    /// Scroll by delta rows (positive = towards older output)
    pub fn scroll(&mut self, delta: isize) {
        self.offset = self.offset.saturating_add_signed(delta);
    }

    /// Jump to the newest output
    pub fn scroll_to_bottom(&mut self) {
        self.offset = 0;
    }
}

/// Renders marked-up lines into an area, newest at the bottom
pub struct ScrollbackView<'a> {
    lines: &'a [String],
}

impl<'a> ScrollbackView<'a> {
    /// View over `lines`, oldest first
    #[must_use]
    pub fn new(lines: &'a [String]) -> Self {
        Self { lines }
    }
}

impl StatefulWidget for ScrollbackView<'_> {
    type State = ScrollbackState;

    fn render(self, area: Rect, buf: &mut Buffer, state: &mut Self::State) {
        if area.width == 0 || area.height == 0 {
            return;
        }
        let width = usize::from(area.width);
        let height = usize::from(area.height);

        let rows: Vec<Line<'static>> = self
            .lines
            .iter()
            .flat_map(|line| wrap(markup::to_line(line), width))
            .collect();

        state.total_rows = rows.len();
        let max_offset = rows.len().saturating_sub(height);
        state.offset = state.offset.min(max_offset);

        let end = rows.len() - state.offset;
        let start = end.saturating_sub(height);
        for (i, row) in rows[start..end].iter().enumerate() {
            // i < height <= u16::MAX
            #[allow(clippy::cast_possible_truncation)]
            let y = area.y + i as u16;
            buf.set_line(area.x, y, row, area.width);
        }
    }
}

/// Hard-wrap `line` into rows of at most `width` cells
#[must_use]
pub fn wrap(line: Line<'static>, width: usize) -> Vec<Line<'static>> {
    let mut rows = Vec::new();
    let mut row: Vec<Span<'static>> = Vec::new();
    let mut used = 0;

    for span in line.spans {
        let mut chunk = String::new();
        for c in span.content.chars() {
            let w = c.width().unwrap_or(0);
            if used + w > width && used > 0 {
                if !chunk.is_empty() {
                    row.push(Span::styled(std::mem::take(&mut chunk), span.style));
                }
                rows.push(Line::from(std::mem::take(&mut row)));
                used = 0;
            }
            chunk.push(c);
            used += w;
        }
        if !chunk.is_empty() {
            row.push(Span::styled(chunk, span.style));
        }
    }
    rows.push(Line::from(row));
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn text(row: &Line<'_>) -> String {
        row.spans.iter().map(|s| s.content.as_ref()).collect()
    }

    fn rendered(buf: &Buffer, y: u16) -> String {
        (0..buf.area.width)
            .map(|x| buf[(x, y)].symbol().to_string())
            .collect::<String>()
            .trim_end()
            .to_string()
    }

    #[test]
    fn test_wrap_splits_at_width() {
        let rows = wrap(Line::from("abcdefg"), 3);
        let texts: Vec<_> = rows.iter().map(text).collect();
        assert_eq!(texts, vec!["abc", "def", "g"]);
    }

    #[test]
    fn test_wrap_keeps_empty_line() {
        let rows = wrap(Line::from(""), 10);
        assert_eq!(rows.len(), 1);
        assert_eq!(text(&rows[0]), "");
    }

    #[test]
    fn test_wrap_counts_wide_chars() {
        let rows = wrap(Line::from("日本語"), 4);
        let texts: Vec<_> = rows.iter().map(text).collect();
        assert_eq!(texts, vec!["日本", "語"]);
    }

    #[test]
    fn test_renders_newest_at_bottom() {
        let lines: Vec<String> = (1..=5).map(|i| format!("line {i}")).collect();
        let area = Rect::new(0, 0, 10, 3);
        let mut buf = Buffer::empty(area);
        let mut state = ScrollbackState::default();

        ScrollbackView::new(&lines).render(area, &mut buf, &mut state);
        assert_eq!(rendered(&buf, 0), "line 3");
        assert_eq!(rendered(&buf, 2), "line 5");
        assert_eq!(state.total_rows, 5);
    }

    #[test]
    fn test_offset_is_clamped() {
        let lines: Vec<String> = (1..=5).map(|i| format!("line {i}")).collect();
        let area = Rect::new(0, 0, 10, 3);
        let mut buf = Buffer::empty(area);
        let mut state = ScrollbackState {
            offset: 50,
            total_rows: 0,
        };

        ScrollbackView::new(&lines).render(area, &mut buf, &mut state);
        assert_eq!(state.offset, 2);
        assert_eq!(rendered(&buf, 0), "line 1");
    }

    #[test]
    fn test_markers_are_not_drawn() {
        let lines = vec!["{{c:32}}ok{{c:0}}".to_string()];
        let area = Rect::new(0, 0, 10, 1);
        let mut buf = Buffer::empty(area);
        ScrollbackView::new(&lines).render(area, &mut buf, &mut ScrollbackState::default());
        assert_eq!(rendered(&buf, 0), "ok");
    }
}
