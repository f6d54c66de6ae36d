//! Architectural Enforcement
//!
//! Source scanners shared by the integration tests in `tests/`:
//! - Timing goes through the `Clock` seam, never a direct sleep
//! - The core engine stays free of terminal crates
//!
//! Paths are resolved from the workspace root so the tests work from any
//! working directory.

use std::fs;
use std::path::{Path, PathBuf};

/// One offending source line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// File relative to the workspace root
    pub path: PathBuf,
    /// 1-based line number
    pub line: usize,
    /// Trimmed source text
    pub text: String,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{} - {}", self.path.display(), self.line, self.text)
    }
}

/// Workspace root (two levels above this crate)
#[must_use]
pub fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..")
}

/// Every `.rs` file under `dir` (relative to the workspace root)
#[must_use]
pub fn rust_files(dir: &str) -> Vec<PathBuf> {
    let root = workspace_root();
    walkdir::WalkDir::new(root.join(dir))
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.path().extension().and_then(|s| s.to_str()) == Some("rs"))
        .map(|e| {
            e.path()
                .strip_prefix(&root)
                .map_or_else(|_| e.path().to_path_buf(), Path::to_path_buf)
        })
        .collect()
}

/// Lines of `path` whose code (comments stripped) matches `pattern`
///
/// Scanning stops at the first `#[cfg(test)]`; test modules sit at the end
/// of each file in this workspace.
#[must_use]
pub fn scan(path: &Path, pattern: impl Fn(&str) -> bool) -> Vec<Violation> {
    let Ok(content) = fs::read_to_string(workspace_root().join(path)) else {
        return Vec::new();
    };

    content
        .lines()
        .enumerate()
        .take_while(|(_, line)| !line.trim_start().starts_with("#[cfg(test)]"))
        .filter_map(|(idx, line)| {
            let code = line.split("//").next().unwrap_or(line);
            pattern(code).then(|| Violation {
                path: path.to_path_buf(),
                line: idx + 1,
                text: line.trim().to_string(),
            })
        })
        .collect()
}

/// Print violations and panic if there are any
pub fn report(title: &str, hint: &str, violations: &[Violation]) {
    if violations.is_empty() {
        return;
    }
    eprintln!("\n{title}\n");
    for violation in violations {
        eprintln!("  {violation}");
    }
    eprintln!("\n{hint}");
    panic!("\nFound {} violation(s).", violations.len());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workspace_root_has_manifest() {
        assert!(workspace_root().join("Cargo.toml").exists());
    }

    #[test]
    fn test_rust_files_are_relative() {
        let files = rust_files("engine/core/src");
        assert!(!files.is_empty());
        assert!(files.iter().all(|p| p.starts_with("engine/core/src")));
    }
}
