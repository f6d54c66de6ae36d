//! Phantom TUI - Terminal surface for phantom-shell
//!
//! A full-screen terminal that looks like an SSH session to a production
//! server. All behavior lives in `phantom-core`; this crate turns key
//! presses into `submit`/`signal` calls and draws the shared scrollback.
//!
//! # Architecture
//!
//! - **App**: Event loop, action gate, session task spawning
//! - **Markup**: `{{c:NN}}` color markers to styled spans
//! - **Widgets**: Wrapping scrollback and the file manager screen
//! - **Theme**: ANSI code to terminal color mapping

pub mod app;
pub mod markup;
pub mod theme;
pub mod widgets;

pub use app::App;
