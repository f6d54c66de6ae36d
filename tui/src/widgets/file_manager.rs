//! File manager screen
//!
//! A two-panel, Midnight Commander style view that covers the terminal
//! while the session is in file-manager mode. It is a prop: arrow keys move
//! the selection, Tab switches panels, and the surface leaves on F10/Esc.

use ratatui::buffer::Buffer;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, StatefulWidget, Widget};

use crate::theme::{PANEL_BLUE, PANEL_CYAN, PANEL_TEXT, STATUS_BG, STATUS_FG};

/// One listing row
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Entry {
    /// File name (directories end with `/`)
    pub name: &'static str,
    /// Size column
    pub size: &'static str,
    /// Modification time column
    pub modified: &'static str,
}

const fn entry(name: &'static str, size: &'static str, modified: &'static str) -> Entry {
    Entry {
        name,
        size,
        modified,
    }
}

/// Left panel: the home directory
pub const HOME_LISTING: &[Entry] = &[
    entry("/..", "UP--DIR", "Mar 14 09:12"),
    entry("/.cache", "4096", "Mar 14 09:12"),
    entry("/.ssh", "4096", "Feb  2 17:40"),
    entry("/backups", "4096", "Mar 13 03:00"),
    entry("/deploy", "4096", "Mar 11 22:18"),
    entry(".bash_history", "18233", "Mar 14 09:11"),
    entry(".bashrc", "3106", "Oct 15  2024"),
    entry("migrate.sh", "2210", "Mar 11 22:17"),
    entry("notes.txt", "912", "Mar  9 14:02"),
];

/// Right panel: system logs
pub const LOG_LISTING: &[Entry] = &[
    entry("/..", "UP--DIR", "Mar 14 00:00"),
    entry("/apt", "4096", "Mar 12 06:25"),
    entry("/nginx", "4096", "Mar 14 00:00"),
    entry("auth.log", "482113", "Mar 14 09:12"),
    entry("dpkg.log", "104882", "Mar 12 06:25"),
    entry("kern.log", "228104", "Mar 14 08:57"),
    entry("syslog", "1249331", "Mar 14 09:12"),
];

/// Which panel has focus
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Panel {
    /// Home directory
    #[default]
    Left,
    /// Log directory
    Right,
}

/// Selection state
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FileManagerState {
    /// Focused panel
    pub panel: Panel,
    /// Selected row in the left panel
    pub left: usize,
    /// Selected row in the right panel
    pub right: usize,
}

impl FileManagerState {
    /// Move the selection in the focused panel
    pub fn move_selection(&mut self, delta: isize) {
        let (row, len) = match self.panel {
            Panel::Left => (&mut self.left, HOME_LISTING.len()),
            Panel::Right => (&mut self.right, LOG_LISTING.len()),
        };
        *row = row.saturating_add_signed(delta).min(len.saturating_sub(1));
    }

    /// Focus the other panel
    pub fn switch_panel(&mut self) {
        self.panel = match self.panel {
            Panel::Left => Panel::Right,
            Panel::Right => Panel::Left,
        };
    }
}

/// The full-screen file manager
pub struct FileManagerView;

impl StatefulWidget for FileManagerView {
    type State = FileManagerState;

    fn render(self, area: Rect, buf: &mut Buffer, state: &mut Self::State) {
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(3), Constraint::Length(1)])
            .split(area);
        let panels = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(rows[0]);

        render_panel(
            "/root",
            HOME_LISTING,
            (state.panel == Panel::Left).then_some(state.left),
            panels[0],
            buf,
        );
        render_panel(
            "/var/log",
            LOG_LISTING,
            (state.panel == Panel::Right).then_some(state.right),
            panels[1],
            buf,
        );
        key_bar().render(rows[1], buf);
    }
}

fn render_panel(
    title: &str,
    entries: &[Entry],
    selected: Option<usize>,
    area: Rect,
    buf: &mut Buffer,
) {
    let base = Style::default().bg(PANEL_BLUE).fg(PANEL_TEXT);
    let block = Block::default()
        .borders(Borders::ALL)
        .title(format!(" {title} "))
        .style(base);
    let inner = block.inner(area);
    block.render(area, buf);

    let width = usize::from(inner.width);
    let name_width = width.saturating_sub(22);
    for (i, entry) in entries.iter().enumerate().take(usize::from(inner.height)) {
        let style = if selected == Some(i) {
            Style::default().bg(PANEL_CYAN).fg(ratatui::style::Color::Black)
        } else if entry.name.starts_with('/') {
            base.add_modifier(Modifier::BOLD)
        } else {
            base
        };
        let text = format!(
            "{:<name_width$.name_width$}{:>8} {:>12}",
            entry.name, entry.size, entry.modified
        );
        // i < inner.height
        #[allow(clippy::cast_possible_truncation)]
        let y = inner.y + i as u16;
        buf.set_line(inner.x, y, &Line::from(Span::styled(text, style)), inner.width);
    }
}

fn key_bar() -> Line<'static> {
    let keys = [
        ("1", "Help"),
        ("3", "View"),
        ("4", "Edit"),
        ("5", "Copy"),
        ("8", "Delete"),
        ("10", "Quit"),
    ];
    let mut spans = Vec::new();
    for (key, label) in keys {
        spans.push(Span::styled(key, Style::default().fg(STATUS_FG)));
        spans.push(Span::styled(
            format!("{label:<7}"),
            Style::default().bg(STATUS_BG).fg(PANEL_CYAN),
        ));
    }
    Line::from(spans)
}
