//! Integration Test: Selection Never Blocks
//!
//! **Policy**: choosing an endpoint is bounded in-memory work. The modules that
//! implement selection must not await, sleep, or perform any I/O. Only the
//! backend call made after selection may suspend.

use architectural_enforcement::{assert_no_violations, rust_files, scan_file, workspace_root};

/// Modules on the selection path
const SELECTION_MODULES: &[&str] = &[
    "endpoint.rs",
    "policy.rs",
    "dispatcher.rs",
    "config.rs",
    "metrics.rs",
    "health.rs",
];

const FORBIDDEN: &[(&str, &str)] = &[
    (".await", "Suspension point in selection code"),
    ("async fn", "Async function in selection code"),
    ("sleep(", "Sleep in selection code"),
    ("std::fs", "File I/O in selection code"),
    ("tokio::fs", "File I/O in selection code"),
    ("std::net", "Network I/O in selection code"),
    ("reqwest", "HTTP client in selection code"),
    ("tokio::sync::Mutex", "Async lock in selection code"),
];

#[test]
fn test_selection_modules_are_synchronous() {
    let routing = workspace_root().join("multicloud/core/src/routing");
    assert!(routing.is_dir(), "routing sources not found at {}", routing.display());

    let mut violations = Vec::new();
    let mut scanned = 0;
    for module in SELECTION_MODULES {
        let path = routing.join(module);
        assert!(path.is_file(), "selection module missing: {}", path.display());
        violations.extend(scan_file(&path, FORBIDDEN));
        scanned += 1;
    }

    assert_eq!(scanned, SELECTION_MODULES.len());
    assert_no_violations("Endpoint selection must be synchronous and I/O free", &violations);
}

#[test]
fn test_no_blocking_io_in_async_backends() {
    let backend = workspace_root().join("multicloud/core/src/backend");
    assert!(backend.is_dir(), "backend sources not found at {}", backend.display());

    let forbidden = [
        ("std::fs", "Blocking file I/O"),
        ("std::net", "Blocking network I/O"),
        ("reqwest::blocking", "Blocking HTTP client"),
        ("std::thread::sleep", "Blocking sleep"),
    ];

    let violations: Vec<String> = rust_files(&backend)
        .iter()
        .flat_map(|path| scan_file(path, &forbidden))
        .collect();

    assert_no_violations("Backends must use async I/O", &violations);
}
