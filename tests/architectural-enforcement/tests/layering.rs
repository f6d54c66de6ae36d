//! Integration Test: Layering
//!
//! The engine renders nothing. Terminal crates belong to the front end,
//! and the front end reaches session state only through the engine API.

use architectural_enforcement::{report, rust_files, scan};

#[test]
fn test_engine_has_no_terminal_dependencies() {
    let violations: Vec<_> = rust_files("engine/core/src")
        .into_iter()
        .flat_map(|path| {
            scan(&path, |code| {
                code.contains("ratatui::") || code.contains("crossterm::")
            })
        })
        .collect();

    report(
        "Terminal crates used inside the engine:",
        "Emit markup through OutputSink and let the front end style it.",
        &violations,
    );
}

#[test]
fn test_tui_does_not_touch_the_store_directly() {
    let violations: Vec<_> = rust_files("tui/src")
        .into_iter()
        .filter(|path| !path.ends_with("main.rs"))
        .flat_map(|path| {
            scan(&path, |code| {
                code.contains("KeyValueStore") || code.contains("StoreExt")
            })
        })
        .collect();

    report(
        "Front end code reaching into session storage:",
        "Go through Session; only main.rs wires the store.",
        &violations,
    );
}
