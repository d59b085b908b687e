//! Architectural Enforcement Integration Tests
//!
//! Source-scanning tests that hold the workspace to its structural rules:
//! - Endpoint selection is synchronous and never touches I/O
//! - Library code performs no blocking I/O inside async paths
//!
//! This crate only holds the shared scanning helpers; the rules live under
//! `tests/`.

use std::path::{Path, PathBuf};

/// Root of the workspace this crate sits in
#[must_use]
pub fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..")
}

/// All `.rs` files under `dir`, sorted
#[must_use]
pub fn rust_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(dir)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.path().extension().and_then(|s| s.to_str()) == Some("rs"))
        .map(walkdir::DirEntry::into_path)
        .collect();
    files.sort();
    files
}

/// Non-test code lines of a source file as `(line_number, code)`
///
/// Everything from the first `#[cfg(test)]` on is treated as test code, and
/// comments are stripped.
#[must_use]
pub fn production_lines(content: &str) -> Vec<(usize, &str)> {
    content
        .lines()
        .enumerate()
        .take_while(|(_, line)| line.trim() != "#[cfg(test)]")
        .map(|(idx, line)| (idx + 1, line.split("//").next().unwrap_or(line)))
        .filter(|(_, code)| !code.trim().is_empty())
        .collect()
}

/// Find forbidden patterns in the production part of `path`
#[must_use]
pub fn scan_file(path: &Path, forbidden: &[(&str, &str)]) -> Vec<String> {
    let Ok(content) = std::fs::read_to_string(path) else {
        return Vec::new();
    };

    let mut violations = Vec::new();
    for (line_number, code) in production_lines(&content) {
        for (pattern, reason) in forbidden {
            if code.contains(pattern) {
                violations.push(format!(
                    "{}:{} - {}: {}",
                    path.display(),
                    line_number,
                    reason,
                    code.trim()
                ));
            }
        }
    }
    violations
}

/// Print violations and fail the calling test if there are any
///
/// # Panics
///
/// Panics when `violations` is not empty.
pub fn assert_no_violations(rule: &str, violations: &[String]) {
    if violations.is_empty() {
        return;
    }

    eprintln!("\n❌ {rule}\n");
    for violation in violations {
        eprintln!("  ❌ {violation}");
    }
    panic!("\nFound {} violation(s) of: {rule}", violations.len());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_production_lines_stop_at_test_module() {
        let source = "fn a() {}\n// comment only\nlet x = 1; // trailing\n#[cfg(test)]\nmod tests {}\n";
        let lines = production_lines(source);
        assert_eq!(lines, vec![(1, "fn a() {}"), (3, "let x = 1; ")]);
    }
}
