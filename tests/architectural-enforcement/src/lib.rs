//! Architectural Enforcement Integration Tests
//!
//! Source-level rules that keep the streaming core honest:
//! - No `unwrap()`/`expect()` in production code (errors propagate)
//! - Blocking sleeps confined to the blocking session loop
//! - `parking_lot` locks instead of `std::sync` in shared state
//!
//! These tests walk the core crate's sources and fail on violations so
//! regressions are caught before review.

use std::path::PathBuf;

use walkdir::WalkDir;

/// Root of the core crate's sources, relative to this test crate
#[must_use]
pub fn core_src() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../streamer/core/src")
}

/// The non-test portion of a source file
///
/// Unit tests live at the bottom of each module behind `#[cfg(test)]`;
/// everything before that marker is production code.
#[must_use]
pub fn production_portion(source: &str) -> &str {
    match source.find("#[cfg(test)]") {
        Some(idx) => &source[..idx],
        None => source,
    }
}

/// Collect `(path, production source)` for every core source file
#[must_use]
pub fn production_sources() -> Vec<(PathBuf, String)> {
    let mut sources = Vec::new();
    for entry in WalkDir::new(core_src()) {
        let entry = entry.expect("walk core sources");
        if entry.path().extension().is_none_or(|ext| ext != "rs") {
            continue;
        }
        let raw = std::fs::read_to_string(entry.path()).expect("read source file");
        let production = production_portion(&raw).to_string();
        sources.push((entry.path().to_path_buf(), production));
    }
    assert!(!sources.is_empty(), "no core sources found");
    sources
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_unwrap_or_expect_in_production_code() {
        for (path, source) in production_sources() {
            for (line_no, line) in source.lines().enumerate() {
                let code = line.split("//").next().unwrap_or(line);
                assert!(
                    !code.contains(".unwrap()") && !code.contains(".expect("),
                    "{} line {} uses unwrap/expect in production code",
                    path.display(),
                    line_no + 1
                );
            }
        }
    }

    #[test]
    fn test_blocking_sleep_only_in_session_loop() {
        for (path, source) in production_sources() {
            if path.ends_with("streaming/session.rs") {
                continue;
            }
            assert!(
                !source.contains("thread::sleep"),
                "{} blocks a thread outside the session loop",
                path.display()
            );
        }
    }

    #[test]
    fn test_shared_state_uses_parking_lot() {
        for (path, source) in production_sources() {
            assert!(
                !source.contains("std::sync::Mutex") && !source.contains("std::sync::RwLock"),
                "{} uses std locks; shared state here is parking_lot-guarded",
                path.display()
            );
        }
    }

    #[test]
    fn test_sessions_never_read_ahead() {
        // The one-undelivered-chunk property hinges on the per-stream
        // channel staying at capacity 1.
        let engine = std::fs::read_to_string(core_src().join("engine.rs")).expect("engine.rs");
        assert!(
            engine.contains("mpsc::channel(1)"),
            "per-stream channel capacity must stay at 1"
        );
    }
}
