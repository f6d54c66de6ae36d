//! Integration Test: Clock Confinement
//!
//! Every delay the engine performs goes through the `Clock` trait so that
//! sequences can run against a virtual clock in tests. Only `clock.rs` may
//! touch a real timer.

use architectural_enforcement::{report, rust_files, scan};

const CLOCK_FILE: &str = "engine/core/src/clock.rs";

fn is_direct_sleep(code: &str) -> bool {
    code.contains("::sleep(") || code.contains("thread::sleep") || code.contains("sleep_until(")
}

#[test]
fn test_engine_sleeps_only_through_clock() {
    let violations: Vec<_> = rust_files("engine/core/src")
        .into_iter()
        .filter(|path| !path.ends_with(CLOCK_FILE))
        .flat_map(|path| scan(&path, is_direct_sleep))
        .collect();

    report(
        "Direct sleep calls found in the engine:",
        "Use Clock::sleep_ms so the interpreter stays testable on a VirtualClock.",
        &violations,
    );
}

#[test]
fn test_tui_never_blocks_the_thread() {
    let violations: Vec<_> = rust_files("tui/src")
        .into_iter()
        .flat_map(|path| scan(&path, |code| code.contains("thread::sleep")))
        .collect();

    report(
        "Blocking sleeps found in the terminal front end:",
        "Use tokio::time::interval for frame pacing.",
        &violations,
    );
}

#[test]
fn test_clock_file_exists() {
    assert!(
        architectural_enforcement::workspace_root().join(CLOCK_FILE).exists(),
        "{CLOCK_FILE} moved; update this test"
    );
}
