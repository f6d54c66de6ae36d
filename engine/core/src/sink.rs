//! Output Sink
//!
//! The interpreter writes through [`OutputSink`] and never sees how lines are
//! displayed. [`Scrollback`] is the in-memory line buffer surfaces render
//! from; [`SharedScrollback`] lets a UI read the buffer while a spawned action
//! writes to it.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

/// Line-oriented output target
pub trait OutputSink: Send {
    /// Add a line at the bottom
    fn append_line(&mut self, line: &str);

    /// Overwrite the bottom line, appending if the buffer is empty
    fn replace_last_line(&mut self, line: &str);

    /// Remove up to `count` lines from the bottom
    fn remove_last_lines(&mut self, count: usize);

    /// Remove every line
    fn clear(&mut self);
}

/// Bounded line buffer
#[derive(Clone, Debug)]
pub struct Scrollback {
    lines: VecDeque<String>,
    capacity: usize,
    revision: u64,
}

impl Scrollback {
    /// Default number of retained lines
    pub const DEFAULT_CAPACITY: usize = 5000;

    /// Create an empty buffer with the default capacity
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }

    /// Create an empty buffer that keeps at most `capacity` lines
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            lines: VecDeque::new(),
            capacity: capacity.max(1),
            revision: 0,
        }
    }

    /// Lines, oldest first
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(String::as_str)
    }

    /// Number of lines held
    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Whether the buffer is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Bottom line
    #[must_use]
    pub fn last(&self) -> Option<&str> {
        self.lines.back().map(String::as_str)
    }

    /// Counter bumped on every mutation, for cheap redraw checks
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Owned copy of the lines
    #[must_use]
    pub fn snapshot(&self) -> Vec<String> {
        self.lines.iter().cloned().collect()
    }
}

impl Default for Scrollback {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputSink for Scrollback {
    fn append_line(&mut self, line: &str) {
        if self.lines.len() == self.capacity {
            self.lines.pop_front();
        }
        self.lines.push_back(line.to_string());
        self.revision += 1;
    }

    fn replace_last_line(&mut self, line: &str) {
        match self.lines.back_mut() {
            Some(last) => {
                line.clone_into(last);
                self.revision += 1;
            }
            None => self.append_line(line),
        }
    }

    fn remove_last_lines(&mut self, count: usize) {
        let keep = self.lines.len().saturating_sub(count);
        self.lines.truncate(keep);
        self.revision += 1;
    }

    fn clear(&mut self) {
        self.lines.clear();
        self.revision += 1;
    }
}

/// Cloneable handle to a [`Scrollback`] behind a mutex
#[derive(Clone, Debug, Default)]
pub struct SharedScrollback {
    inner: Arc<Mutex<Scrollback>>,
}

impl SharedScrollback {
    /// Wrap a buffer
    #[must_use]
    pub fn new(buffer: Scrollback) -> Self {
        Self {
            inner: Arc::new(Mutex::new(buffer)),
        }
    }

    /// Run `f` with the buffer locked
    pub fn with<R>(&self, f: impl FnOnce(&Scrollback) -> R) -> R {
        f(&self.inner.lock())
    }
}

impl OutputSink for SharedScrollback {
    fn append_line(&mut self, line: &str) {
        self.inner.lock().append_line(line);
    }

    fn replace_last_line(&mut self, line: &str) {
        self.inner.lock().replace_last_line(line);
    }

    fn remove_last_lines(&mut self, count: usize) {
        self.inner.lock().remove_last_lines(count);
    }

    fn clear(&mut self) {
        self.inner.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_append_and_replace() {
        let mut buffer = Scrollback::new();
        buffer.append_line("one");
        buffer.append_line("tw");
        buffer.replace_last_line("two");
        assert_eq!(buffer.snapshot(), vec!["one", "two"]);
    }

    #[test]
    fn test_replace_on_empty_appends() {
        let mut buffer = Scrollback::new();
        buffer.replace_last_line("first");
        assert_eq!(buffer.snapshot(), vec!["first"]);
    }

    #[test]
    fn test_remove_more_than_held() {
        let mut buffer = Scrollback::new();
        buffer.append_line("a");
        buffer.append_line("b");
        buffer.remove_last_lines(5);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_capacity_drops_oldest() {
        let mut buffer = Scrollback::with_capacity(2);
        buffer.append_line("a");
        buffer.append_line("b");
        buffer.append_line("c");
        assert_eq!(buffer.snapshot(), vec!["b", "c"]);
    }

    #[test]
    fn test_revision_tracks_mutations() {
        let mut buffer = Scrollback::new();
        let start = buffer.revision();
        buffer.append_line("a");
        buffer.clear();
        assert_eq!(buffer.revision(), start + 2);
    }

    #[test]
    fn test_shared_handle_writes_through() {
        let shared = SharedScrollback::default();
        let mut writer = shared.clone();
        writer.append_line("from task");
        assert_eq!(shared.with(|b| b.last().map(str::to_string)), Some("from task".to_string()));
    }
}
