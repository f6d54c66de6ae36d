//! Widgets

pub mod file_manager;
pub mod scrollback;

pub use file_manager::{FileManagerState, FileManagerView};
pub use scrollback::{ScrollbackState, ScrollbackView};
